// Catch resolution: the first matching message while a creature is out wins it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::chat::{mention, IncomingMessage};
use crate::creature::Creature;
use crate::metrics;
use crate::scores::ScoreStore;
use crate::spawn::SpawnState;

/// A successful catch.
#[derive(Debug, Clone)]
pub struct Catch {
    pub user_id: String,
    pub creature: Arc<Creature>,
    pub elapsed: Duration,
    /// The user's catch count for this creature after the catch.
    pub count: u64,
    /// Set when the score file could not be written. The catch still counts.
    pub save_error: Option<String>,
}

impl Catch {
    /// Elapsed seconds rounded to two decimals.
    pub fn elapsed_display(&self) -> String {
        format!("{:.2}", self.elapsed.as_secs_f64())
    }

    pub fn announcement(&self) -> String {
        format!(
            "{} caught a {} penguin in **{} seconds**!",
            mention(&self.user_id),
            self.creature.name,
            self.elapsed_display()
        )
    }
}

/// What a message did as a catch attempt.
#[derive(Debug, Clone)]
pub enum CatchOutcome {
    /// Not the catch phrase, or authored by the bot.
    NotAttempted,
    /// Catch phrase, but nothing was out (or someone else got it first).
    Missed,
    Caught(Catch),
}

/// Matches messages against the catch keyword and settles the race.
#[derive(Debug, Clone)]
pub struct CatchResolver {
    keyword: String,
}

impl CatchResolver {
    pub fn new(keyword: &str) -> Self {
        Self {
            keyword: keyword.trim().to_lowercase(),
        }
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// Case-insensitive exact match after trimming surrounding whitespace.
    pub fn is_catch_phrase(&self, content: &str) -> bool {
        content.trim().to_lowercase() == self.keyword
    }

    /// Try to claim the active creature for the message author.
    ///
    /// `SpawnState::try_resolve` decides the winner; the score increment and
    /// save happen only for that winner.
    pub fn resolve(
        &self,
        state: &SpawnState,
        scores: &ScoreStore,
        msg: &IncomingMessage,
        now: Instant,
    ) -> CatchOutcome {
        if msg.from_self || !self.is_catch_phrase(&msg.content) {
            return CatchOutcome::NotAttempted;
        }

        let Some(resolved) = state.try_resolve() else {
            return CatchOutcome::Missed;
        };

        let elapsed = resolved.elapsed_at(now);
        let creature = resolved.creature;
        let (count, saved) = scores.record_catch(&msg.author_id, &creature.name);

        let save_error = match saved {
            Ok(()) => None,
            Err(e) => {
                tracing::error!("Failed to save scores after catch: {e}");
                metrics::SCORE_SAVE_FAILURES_TOTAL.inc();
                Some(e.to_string())
            }
        };

        metrics::CATCHES_TOTAL
            .with_label_values(&[creature.name.as_str()])
            .inc();
        metrics::TIME_TO_CATCH_SECONDS.observe(elapsed.as_secs_f64());
        tracing::info!(
            "{} caught {} after {:.2}s (now {})",
            msg.author_id,
            creature.name,
            elapsed.as_secs_f64(),
            count
        );

        CatchOutcome::Caught(Catch {
            user_id: msg.author_id.clone(),
            creature,
            elapsed,
            count,
            save_error,
        })
    }
}
