//! Normalization of engine-reported run statistics into solver input.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::budget::error::AllocError;

/// The unit of the values in a [LevelRunSizes] snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeUnit {
    /// Run sizes in bytes, converted to entries by dividing by `key_size`.
    Bytes { key_size: u64 },

    /// Exact entry counts.
    Entries,
}

impl SizeUnit {
    fn name(&self) -> &'static str {
        match self {
            SizeUnit::Bytes { .. } => "size",
            SizeUnit::Entries => "entry count",
        }
    }
}

/// A snapshot of per-level, per-run sizes as reported by the engine.
///
/// The outer vector is indexed by level, the inner one by run. An empty
/// level marks the end of the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelRunSizes {
    /// The unit of every value in `levels`.
    pub unit: SizeUnit,

    /// Raw values, one inner vector per level.
    pub levels: Vec<Vec<i64>>,
}

impl LevelRunSizes {
    /// Wraps run sizes in bytes.
    pub fn bytes(levels: Vec<Vec<i64>>, key_size: u64) -> Self {
        LevelRunSizes {
            unit: SizeUnit::Bytes { key_size },
            levels,
        }
    }

    /// Wraps exact per-run entry counts.
    pub fn entries(levels: Vec<Vec<i64>>) -> Self {
        LevelRunSizes {
            unit: SizeUnit::Entries,
            levels,
        }
    }

    /// Reads a snapshot from JSON.
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Writes the snapshot as JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Sum of every reported value, across all levels.
    ///
    /// For a byte snapshot this is the store's on-disk footprint.
    pub fn total(&self) -> i64 {
        self.levels.iter().flatten().sum()
    }

    /// Flattens the snapshot into per-run entry counts.
    ///
    /// Levels after the first empty one are dropped. Zero-size runs keep
    /// their slot. Any negative value fails the whole call.
    pub fn normalize(&self) -> Result<FlatEntrySequence, AllocError> {
        if let SizeUnit::Bytes { key_size: 0 } = self.unit {
            return Err(AllocError::ZeroKeySize);
        }

        // Validate the whole snapshot before building anything...
        for (level, runs) in self.levels.iter().enumerate() {
            if let Some((run, &value)) = runs.iter().enumerate().find(|(_, v)| **v < 0) {
                return Err(AllocError::NegativeStat {
                    unit: self.unit.name(),
                    level,
                    run,
                    value,
                });
            }
        }

        let mut entries = vec![];
        let mut runs_per_level = vec![];
        for (level, runs) in self.levels.iter().enumerate() {
            if runs.is_empty() {
                let dropped = self.levels[level..].iter().filter(|r| !r.is_empty()).count();
                if dropped > 0 {
                    warn!(
                        level,
                        dropped, "non-empty levels follow an empty level and are ignored"
                    );
                }
                break;
            }
            entries.extend(runs.iter().map(|&v| match self.unit {
                SizeUnit::Bytes { key_size } => v as u64 / key_size,
                SizeUnit::Entries => v as u64,
            }));
            runs_per_level.push(runs.len());
        }

        Ok(FlatEntrySequence {
            entries,
            runs_per_level,
        })
    }
}

/// Statistics for a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub level_index: usize,
    pub run_index: usize,
    pub entry_count: u64,
}

/// Per-run entry counts in level-then-run order, plus the level layout
/// that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FlatEntrySequence {
    entries: Vec<u64>,
    runs_per_level: Vec<usize>,
}

impl FlatEntrySequence {
    /// Builds a sequence from per-level entry counts.
    ///
    /// Like [LevelRunSizes::normalize], this stops at the first empty level.
    pub fn from_levels(levels: &[Vec<u64>]) -> Self {
        let mut seq = FlatEntrySequence::default();
        for runs in levels.iter().take_while(|r| !r.is_empty()) {
            seq.entries.extend_from_slice(runs);
            seq.runs_per_level.push(runs.len());
        }
        seq
    }

    /// Entry counts, one per run.
    pub fn entries(&self) -> &[u64] {
        &self.entries
    }

    /// Number of runs in each represented level.
    pub fn runs_per_level(&self) -> &[usize] {
        &self.runs_per_level
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of entries across every run.
    pub fn total_entries(&self) -> Option<u64> {
        self.entries.iter().try_fold(0u64, |acc, &e| acc.checked_add(e))
    }

    /// Iterates over the runs with their level and position.
    pub fn runs(&self) -> impl Iterator<Item = RunStats> + '_ {
        self.runs_per_level
            .iter()
            .enumerate()
            .flat_map(|(level, &n)| (0..n).map(move |run| (level, run)))
            .zip(self.entries.iter())
            .map(|((level_index, run_index), &entry_count)| RunStats {
                level_index,
                run_index,
                entry_count,
            })
    }
}
