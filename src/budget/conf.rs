use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::budget::error::AllocError;

/// The default average number of filter bits per entry.
pub const DEFAULT_BITS_PER_ENTRY: f64 = 10.0;

/// The fraction of the nominal budget actually handed to the solver.
///
/// Reported run sizes include block and index metadata, so sizing the budget
/// from them overestimates the number of real entries.
pub const DEFAULT_METADATA_DISCOUNT: f64 = 0.9;

/// Cost change under which a sweep counts as stalled and the step is halved.
pub const DEFAULT_STALL_TOLERANCE: f64 = 1e-6;

/// The default average entry size (in bytes) when converting run sizes.
pub const DEFAULT_KEY_SIZE: u64 = 16;

/// Where per-run entry counts come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsMode {
    /// Estimate entries from run sizes in bytes.
    Bytes,

    /// Require exact entry counts from the engine.
    ExactCounts,

    /// Use exact counts when the engine has them, sizes otherwise.
    #[default]
    PreferExact,
}

/// How a level deeper than level 0 is collapsed to a single value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeepLevelRule {
    /// Use the level's first run.
    #[default]
    FirstRun,

    /// Use the floored mean over the level's runs, as for level 0.
    Mean,
}

/// Configuration for a [crate::budget::allocator::FilterBudgetAllocator].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocatorConf {
    /// Desired average bits per key across the whole budget.
    pub bits_per_entry: f64,

    /// Scale factor applied to the budget, in `(0, 1]`.
    pub metadata_discount: f64,

    /// Stall threshold for the solver's sweep loop.
    pub stall_tolerance: f64,

    /// Source of the per-run entry counts.
    pub stats_mode: StatsMode,

    /// Average entry size in bytes, used when converting sizes.
    pub key_size: u64,

    /// Collapse rule for levels below level 0.
    pub deep_levels: DeepLevelRule,
}

impl Default for AllocatorConf {
    fn default() -> Self {
        AllocatorConf {
            bits_per_entry: DEFAULT_BITS_PER_ENTRY,
            metadata_discount: DEFAULT_METADATA_DISCOUNT,
            stall_tolerance: DEFAULT_STALL_TOLERANCE,
            stats_mode: StatsMode::default(),
            key_size: DEFAULT_KEY_SIZE,
            deep_levels: DeepLevelRule::default(),
        }
    }
}

impl AllocatorConf {
    /// Parses a configuration from TOML and validates it.
    ///
    /// Missing keys take their default values.
    pub fn from_toml(s: &str) -> Result<Self> {
        let conf: AllocatorConf = toml::from_str(s)?;
        conf.validate()?;
        Ok(conf)
    }

    /// Checks that every value is in range.
    pub fn validate(&self) -> Result<(), AllocError> {
        if !self.bits_per_entry.is_finite() || self.bits_per_entry < 0.0 {
            return Err(AllocError::InvalidConfig(format!(
                "bits_per_entry must be a non-negative number, got {}",
                self.bits_per_entry,
            )));
        }
        if !(self.metadata_discount > 0.0 && self.metadata_discount <= 1.0) {
            return Err(AllocError::InvalidConfig(format!(
                "metadata_discount must be in (0, 1], got {}",
                self.metadata_discount,
            )));
        }
        if !self.stall_tolerance.is_finite() || self.stall_tolerance < 0.0 {
            return Err(AllocError::InvalidConfig(format!(
                "stall_tolerance must be a non-negative number, got {}",
                self.stall_tolerance,
            )));
        }
        if self.key_size == 0 {
            return Err(AllocError::InvalidConfig(
                "key_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
