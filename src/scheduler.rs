// Spawn scheduler: a background task that tries to spawn a creature at a
// fixed interval.
//
// The interval is drawn once from the configured range when the scheduler is
// built and stays fixed for the life of the process.

use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::bot::{Bot, SpawnTrigger};
use crate::creature::Creature;
use crate::error::SpawnError;
use crate::metrics;

/// Result of one scheduler tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No spawn channel configured yet.
    Idle,
    /// The spawn channel could not be reached; retried next tick.
    Unreachable,
    /// A creature is already out.
    Occupied,
    /// The registry is empty.
    NothingToSpawn,
    Spawned(Arc<Creature>),
}

#[derive(Debug)]
pub struct SpawnScheduler {
    interval: Duration,
    running: AtomicBool,
}

impl SpawnScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            running: AtomicBool::new(false),
        }
    }

    /// Draw the interval (in whole seconds) uniformly from `secs`.
    pub fn with_random_interval<R: Rng + ?Sized>(secs: RangeInclusive<u64>, rng: &mut R) -> Self {
        let interval = Duration::from_secs(rng.gen_range(secs));
        tracing::info!("Spawn interval fixed at {}s", interval.as_secs());
        Self::new(interval)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Start ticking for `bot`: one tick right away, then one per interval on
    /// a background task. Only the first call starts anything; later calls
    /// return false. Also returns false outside a tokio runtime.
    pub fn start(&self, bot: Arc<Bot>) -> bool {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(h) => h,
            Err(e) => {
                tracing::warn!("Cannot start spawn scheduler: {e}");
                return false;
            }
        };
        if self.running.swap(true, Ordering::SeqCst) {
            return false;
        }

        let first = tick(&bot, Instant::now());
        tracing::debug!("First scheduler tick: {first:?}");

        let interval = self.interval;
        handle.spawn(async move {
            tracing::info!("Spawn scheduler started ({}s interval)", interval.as_secs());
            loop {
                tokio::time::sleep(interval).await;
                tick(&bot, Instant::now());
            }
        });
        true
    }
}

/// One scheduler pass: clear an expired spawn, then spawn a random creature
/// into the configured channel if the slot is free.
pub fn tick(bot: &Bot, now: Instant) -> TickOutcome {
    let Some(channel) = bot.spawn_channel() else {
        return TickOutcome::Idle;
    };

    if let Some(ttl) = bot.spawn_timeout() {
        if let Some(expired) = bot.spawn_state().expire(now, ttl) {
            metrics::EXPIRED_SPAWNS_TOTAL.inc();
            tracing::info!(
                "{} expired after {}s uncaught",
                expired.creature.name,
                expired.elapsed_at(now).as_secs()
            );
            bot.say(
                &channel,
                &format!("The {} penguin wandered off...", expired.creature.name),
            );
        }
    }

    if !bot.sink().resolve_channel(&channel) {
        tracing::debug!("Spawn channel {channel} unreachable, skipping tick");
        return TickOutcome::Unreachable;
    }

    if bot.spawn_state().peek().is_active() {
        return TickOutcome::Occupied;
    }

    match bot.spawn_random(&channel, SpawnTrigger::Scheduled, now) {
        Ok(creature) => TickOutcome::Spawned(creature),
        Err(SpawnError::AlreadyActive(_)) => TickOutcome::Occupied,
        Err(SpawnError::EmptyRegistry) => {
            tracing::warn!("Scheduler tick with an empty creature registry");
            TickOutcome::NothingToSpawn
        }
        Err(e) => {
            tracing::debug!("Scheduled spawn skipped: {e}");
            TickOutcome::Unreachable
        }
    }
}
