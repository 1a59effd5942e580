use std::f64::consts::LN_2;

use crate::budget::aggregate::LevelFilterConfig;
use crate::storage::conf::*;

/// The filter policy of an open store: a bits-per-key value per level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPolicy {
    /// Explicit per-level values.
    levels: LevelFilterConfig,

    /// Bits per key for levels that `levels` doesn't cover.
    fallback: u64,
}

impl FilterPolicy {
    /// The same bits-per-key on every level.
    pub fn uniform(bits_per_key: u64) -> Self {
        FilterPolicy {
            levels: LevelFilterConfig::default(),
            fallback: bits_per_key,
        }
    }

    /// A policy built from a per-level config.
    ///
    /// Levels deeper than the config reuse its last value, since deeper
    /// levels are never smaller than the last configured one.
    pub fn from_config(config: &LevelFilterConfig) -> Self {
        let fallback = config
            .as_slice()
            .last()
            .copied()
            .unwrap_or(DEFAULT_BITS_PER_KEY);
        FilterPolicy {
            levels: config.clone(),
            fallback,
        }
    }

    /// The bits-per-key for filters on level `level` (0-indexed).
    pub fn bits_per_key(&self, level: usize) -> u64 {
        self.levels.level(level).unwrap_or(self.fallback)
    }
}

impl Default for FilterPolicy {
    fn default() -> Self {
        FilterPolicy::uniform(DEFAULT_BITS_PER_KEY)
    }
}

/// The number of hash functions for a filter with `bits_per_key` bits per key.
///
/// This is `bits_per_key * ln(2)` rounded, kept within `1..=MAX_FILTER_HASHES`.
pub fn num_hashes(bits_per_key: u64) -> u32 {
    let k = (bits_per_key as f64 * LN_2).round();
    (k as u32).clamp(1, MAX_FILTER_HASHES)
}
