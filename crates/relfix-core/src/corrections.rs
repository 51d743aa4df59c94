//! Validated correction pairs and their persisted JSON report.

use atomicwrites::{AtomicFile, OverwriteBehavior};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::diagnostics::ReconcileStats;
use crate::index::{CanonicalIndex, is_spelling_variant};

#[derive(Debug, Error)]
pub enum CorrectionError {
    #[error("Failed to read corrections file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write corrections file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid corrections file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Inferred from schema variants only.
    Schema,
    /// Confirmed by a compiler diagnostic.
    Confirmed,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionPair {
    pub incorrect: String,
    pub correct: String,
    pub confidence: Confidence,
    #[serde(default)]
    pub occurrences: Vec<Location>,
}

/// Immutable mapping from incorrect identifiers to canonical names.
///
/// Construction guarantees that every `correct` is a canonical relation name,
/// that `incorrect` only differs from it by case or pluralization, and that
/// no `incorrect` is also some pair's `correct`. The last property makes a
/// rewrite with this set idempotent.
#[derive(Debug, Clone, Default)]
pub struct CorrectionSet {
    pairs: BTreeMap<String, CorrectionPair>,
}

impl CorrectionSet {
    pub fn new(pairs: impl IntoIterator<Item = CorrectionPair>, index: &CanonicalIndex) -> Self {
        let mut merged: BTreeMap<String, CorrectionPair> = BTreeMap::new();

        for pair in pairs {
            if !index.is_canonical(&pair.correct) {
                warn!(
                    "Dropping correction '{}' -> '{}': not a relation declared in the schema",
                    pair.incorrect, pair.correct
                );
                continue;
            }
            if !is_spelling_variant(&pair.incorrect, &pair.correct) {
                debug!(
                    "Dropping correction '{}' -> '{}': not a case or plural variant",
                    pair.incorrect, pair.correct
                );
                continue;
            }

            match merged.get_mut(&pair.incorrect) {
                None => {
                    merged.insert(pair.incorrect.clone(), pair);
                }
                Some(existing) if existing.correct == pair.correct => {
                    existing.confidence = existing.confidence.max(pair.confidence);
                    existing.occurrences.extend(pair.occurrences);
                }
                Some(existing) => warn!(
                    "Conflicting corrections for '{}': keeping '{}', ignoring '{}'",
                    pair.incorrect, existing.correct, pair.correct
                ),
            }
        }

        let targets: BTreeSet<String> = merged.values().map(|p| p.correct.clone()).collect();
        merged.retain(|incorrect, _| {
            let keep = !targets.contains(incorrect);
            if !keep {
                warn!("Dropping correction for '{incorrect}': it is also a correction target");
            }
            keep
        });

        for pair in merged.values_mut() {
            pair.occurrences.sort();
            pair.occurrences.dedup();
        }

        Self { pairs: merged }
    }

    pub fn get(&self, incorrect: &str) -> Option<&CorrectionPair> {
        self.pairs.get(incorrect)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.pairs.contains_key(identifier)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CorrectionPair> {
        self.pairs.values()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Pairs ordered by descending occurrence count, then name.
    pub fn by_occurrences(&self) -> Vec<&CorrectionPair> {
        let mut pairs: Vec<_> = self.pairs.values().collect();
        pairs.sort_by(|a, b| {
            b.occurrences
                .len()
                .cmp(&a.occurrences.len())
                .then_with(|| a.incorrect.cmp(&b.incorrect))
        });
        pairs
    }
}

/// Machine-readable output of the reconciliation phase.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorrectionReport {
    pub fixes: Vec<CorrectionPair>,
    #[serde(default)]
    pub stats: Option<ReconcileStats>,
    #[serde(default)]
    pub valid_names: Vec<String>,
}

impl CorrectionReport {
    pub fn new(set: &CorrectionSet, index: &CanonicalIndex, stats: Option<ReconcileStats>) -> Self {
        Self {
            fixes: set.iter().cloned().collect(),
            stats,
            valid_names: index.canonical_names().iter().cloned().collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, CorrectionError> {
        let contents = std::fs::read_to_string(path).map_err(|source| CorrectionError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| CorrectionError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), CorrectionError> {
        let write_err = |source| CorrectionError::Write {
            path: path.to_path_buf(),
            source,
        };
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| write_err(std::io::Error::other(e)))?;
        AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
            .write(|f| {
                f.write_all(contents.as_bytes())?;
                f.write_all(b"\n")?;
                f.flush()
            })
            .map_err(|err| write_err(std::io::Error::other(err.to_string())))
    }

    /// Re-validate persisted pairs against the current schema.
    pub fn into_set(self, index: &CanonicalIndex) -> CorrectionSet {
        CorrectionSet::new(self.fixes, index)
    }
}
