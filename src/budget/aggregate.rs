//! Maps per-run bits-per-key back onto one value per level.

use serde::{Deserialize, Serialize};

use crate::budget::conf::DeepLevelRule;
use crate::budget::error::AllocError;

/// One Bloom filter bits-per-key value per level, in level order.
///
/// This is what the engine's filter policy is built from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LevelFilterConfig(Vec<u64>);

impl LevelFilterConfig {
    pub fn new(bits_per_key: Vec<u64>) -> Self {
        LevelFilterConfig(bits_per_key)
    }

    /// The same bits-per-key for each of `levels` levels.
    pub fn uniform(bits_per_key: u64, levels: usize) -> Self {
        LevelFilterConfig(vec![bits_per_key; levels])
    }

    /// The bits-per-key for level `level`, if the config covers it.
    pub fn level(&self, level: usize) -> Option<u64> {
        self.0.get(level).copied()
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Collapses per-run values into a [LevelFilterConfig].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LevelAggregator {
    deep_levels: DeepLevelRule,
}

impl LevelAggregator {
    pub fn new(deep_levels: DeepLevelRule) -> Self {
        LevelAggregator { deep_levels }
    }

    /// Aggregates `bits_per_key` (one value per run, level-then-run order)
    /// using the level layout in `runs_per_level`.
    ///
    /// Level 0 always gets the floored mean of its runs.
    pub fn aggregate(
        &self,
        bits_per_key: &[u64],
        runs_per_level: &[usize],
    ) -> Result<LevelFilterConfig, AllocError> {
        let expected: usize = runs_per_level.iter().sum();
        if expected != bits_per_key.len() {
            return Err(AllocError::LayoutMismatch {
                expected,
                actual: bits_per_key.len(),
            });
        }
        if let Some(level) = runs_per_level.iter().position(|&n| n == 0) {
            return Err(AllocError::EmptyLevel(level));
        }

        let mut levels = Vec::with_capacity(runs_per_level.len());
        let mut start = 0;
        for (level, &n) in runs_per_level.iter().enumerate() {
            let runs = &bits_per_key[start..start + n];
            start += n;
            let value = match (level, self.deep_levels) {
                (0, _) | (_, DeepLevelRule::Mean) => floor_mean(runs),
                (_, DeepLevelRule::FirstRun) => runs[0],
            };
            levels.push(value);
        }
        Ok(LevelFilterConfig(levels))
    }
}

fn floor_mean(values: &[u64]) -> u64 {
    let sum: u128 = values.iter().map(|&v| v as u128).sum();
    (sum / values.len() as u128) as u64
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn level_zero_is_averaged() {
        let config = LevelAggregator::default().aggregate(&[4, 6, 3], &[2, 1]).unwrap();
        assert_eq!(config.as_slice(), &[5, 3]);
    }

    #[test]
    fn mean_is_floored() {
        let config = LevelAggregator::default().aggregate(&[4, 5, 8, 2], &[3, 1]).unwrap();
        assert_eq!(config.as_slice(), &[5, 2]);
    }

    #[test]
    fn one_value_per_level() {
        let config = LevelAggregator::default()
            .aggregate(&[20, 18, 15, 11, 8, 4], &[2, 1, 1, 1, 1])
            .unwrap();
        assert_eq!(config.len(), 5);
        assert_eq!(config.as_slice(), &[19, 15, 11, 8, 4]);
    }

    #[test]
    fn deep_levels_first_run_or_mean() {
        let bpk = [9, 9, 8, 2, 3];
        let layout = [1, 2, 2];

        let first = LevelAggregator::new(DeepLevelRule::FirstRun).aggregate(&bpk, &layout).unwrap();
        assert_eq!(first.as_slice(), &[9, 9, 2]);

        let mean = LevelAggregator::new(DeepLevelRule::Mean).aggregate(&bpk, &layout).unwrap();
        assert_eq!(mean.as_slice(), &[9, 8, 2]);
    }

    #[test]
    fn layout_must_cover_every_run() {
        assert_eq!(
            LevelAggregator::default().aggregate(&[1, 2, 3], &[2]),
            Err(AllocError::LayoutMismatch { expected: 2, actual: 3 }),
        );
    }

    #[test]
    fn levels_must_have_runs() {
        assert_eq!(
            LevelAggregator::default().aggregate(&[1, 2], &[1, 0, 1]),
            Err(AllocError::EmptyLevel(1)),
        );
    }

    #[test]
    fn uniform_config() {
        let config = LevelFilterConfig::uniform(2, 7);
        assert_eq!(config.len(), 7);
        assert_eq!(config.level(6), Some(2));
        assert_eq!(config.level(7), None);
    }

    #[test]
    fn serializes_as_a_plain_list() -> anyhow::Result<()> {
        let config = LevelFilterConfig::new(vec![12, 7, 3]);
        let json = serde_json::to_string(&config)?;
        assert_eq!(json, "[12,7,3]");
        assert_eq!(serde_json::from_str::<LevelFilterConfig>(&json)?, config);
        Ok(())
    }
}
