// Creature definitions and the registry loaded from the creatures directory.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::LoadError;

/// A catchable creature. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Creature {
    pub name: String,
    /// URL or asset reference shown alongside the spawn message.
    pub display_asset: String,
}

impl Creature {
    pub fn new(name: impl Into<String>, display_asset: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_asset: display_asset.into(),
        }
    }

    /// Flavor text posted when this creature spawns.
    pub fn spawn_message(&self, keyword: &str) -> String {
        format!(
            "A {} penguin has appeared! Type `{}` to catch it!",
            self.name, keyword
        )
    }
}

/// On-disk shape of a creature file. Both fields are optional here so a
/// missing field can be reported instead of surfacing as a parse error.
#[derive(Deserialize)]
struct CreatureFile {
    name: Option<String>,
    #[serde(alias = "displayAsset", alias = "image_url")]
    display_asset: Option<String>,
}

/// Parse a single creature definition.
pub fn parse_creature(path: &Path, contents: &str) -> Result<Creature, LoadError> {
    let file: CreatureFile = serde_json::from_str(contents).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let name = non_empty(file.name).ok_or_else(|| LoadError::MissingField {
        path: path.to_path_buf(),
        field: "name",
    })?;
    let display_asset = non_empty(file.display_asset).ok_or_else(|| LoadError::MissingField {
        path: path.to_path_buf(),
        field: "display_asset",
    })?;

    Ok(Creature {
        name,
        display_asset,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// The set of creatures that can spawn. Loaded once at startup and shared
/// read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct CreatureRegistry {
    creatures: Vec<Arc<Creature>>,
}

impl CreatureRegistry {
    /// Build a registry from an explicit list, rejecting duplicate names.
    pub fn from_creatures(creatures: Vec<Creature>) -> Result<Self, LoadError> {
        let mut seen = HashSet::new();
        for c in &creatures {
            if !seen.insert(c.name.clone()) {
                return Err(LoadError::DuplicateName(c.name.clone()));
            }
        }
        Ok(Self {
            creatures: creatures.into_iter().map(Arc::new).collect(),
        })
    }

    /// Scan a directory for `*.json` creature files, in file-name order.
    ///
    /// Malformed units are skipped with a warning. An unreadable directory or
    /// a duplicate name fails the whole load.
    pub fn load_dir(dir: &Path) -> Result<Self, LoadError> {
        let entries = std::fs::read_dir(dir).map_err(|source| LoadError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut paths: Vec<_> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("json"))
            .collect();
        paths.sort();

        let mut creatures = Vec::new();
        for path in paths {
            let contents = match std::fs::read_to_string(&path) {
                Ok(c) => c,
                Err(source) => {
                    tracing::warn!("Skipping creature unit: {}", LoadError::Io { path, source });
                    continue;
                }
            };
            match parse_creature(&path, &contents) {
                Ok(creature) => creatures.push(creature),
                Err(e) => tracing::warn!("Skipping creature unit: {e}"),
            }
        }

        let registry = Self::from_creatures(creatures)?;
        tracing::info!(
            "Loaded {} creatures from {}",
            registry.len(),
            dir.display()
        );
        Ok(registry)
    }

    /// Pick a creature uniformly at random.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Arc<Creature>> {
        self.creatures.choose(rng).cloned()
    }

    pub fn get(&self, name: &str) -> Option<Arc<Creature>> {
        self.creatures.iter().find(|c| c.name == name).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Creature>> {
        self.creatures.iter()
    }

    pub fn len(&self) -> usize {
        self.creatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.creatures.is_empty()
    }
}
