// Per-user catch counts, persisted to a flat JSON file after every change.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;

use crate::error::StoreError;

/// creature name -> catch count
pub type Catches = BTreeMap<String, u64>;
/// user id -> catches
pub type ScoreMap = BTreeMap<String, Catches>;

/// One row of the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub total: u64,
    pub distinct_creatures: usize,
}

/// Durable score table. The in-memory map is authoritative; the file is
/// rewritten in full on every save.
#[derive(Debug)]
pub struct ScoreStore {
    path: PathBuf,
    scores: Mutex<ScoreMap>,
}

impl ScoreStore {
    /// Load scores from `path`. A missing file yields an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let scores = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!("No score file at {}, starting empty", path.display());
                ScoreMap::new()
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        Ok(Self {
            path,
            scores: Mutex::new(scores),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add one catch in memory and return the new count.
    pub fn increment(&self, user_id: &str, creature: &str) -> u64 {
        let mut scores = self.scores.lock().unwrap();
        bump(&mut scores, user_id, creature)
    }

    /// Write the full table to disk.
    pub fn save(&self) -> Result<(), StoreError> {
        let scores = self.scores.lock().unwrap();
        self.write(&scores)
    }

    /// Increment and save in one step. The returned count reflects the
    /// in-memory increment even when the save fails.
    pub fn record_catch(&self, user_id: &str, creature: &str) -> (u64, Result<(), StoreError>) {
        let mut scores = self.scores.lock().unwrap();
        let count = bump(&mut scores, user_id, creature);
        let saved = self.write(&scores);
        (count, saved)
    }

    pub fn count(&self, user_id: &str, creature: &str) -> u64 {
        let scores = self.scores.lock().unwrap();
        scores
            .get(user_id)
            .and_then(|c| c.get(creature))
            .copied()
            .unwrap_or(0)
    }

    pub fn user_catches(&self, user_id: &str) -> Catches {
        let scores = self.scores.lock().unwrap();
        scores.get(user_id).cloned().unwrap_or_default()
    }

    pub fn total_catches(&self, user_id: &str) -> u64 {
        self.user_catches(user_id).values().sum()
    }

    /// Users ranked by total catches, ties broken by user id.
    pub fn leaderboard(&self, limit: usize) -> Vec<LeaderboardEntry> {
        let scores = self.scores.lock().unwrap();
        let mut entries: Vec<LeaderboardEntry> = scores
            .iter()
            .map(|(user_id, catches)| LeaderboardEntry {
                user_id: user_id.clone(),
                total: catches.values().sum(),
                distinct_creatures: catches.values().filter(|n| **n > 0).count(),
            })
            .collect();
        entries.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.user_id.cmp(&b.user_id)));
        entries.truncate(limit);
        entries
    }

    pub fn snapshot(&self) -> ScoreMap {
        self.scores.lock().unwrap().clone()
    }

    /// Write to a sibling temp file, then rename over the target so a crash
    /// mid-write leaves the previous file intact.
    fn write(&self, scores: &ScoreMap) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(scores)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

fn bump(scores: &mut ScoreMap, user_id: &str, creature: &str) -> u64 {
    let count = scores
        .entry(user_id.to_string())
        .or_default()
        .entry(creature.to_string())
        .or_insert(0);
    *count += 1;
    *count
}
