use anyhow::{anyhow, Result};
use tracing::debug;

use crate::budget::aggregate::LevelFilterConfig;
use crate::budget::allocator::{FilterPolicyTarget, StatsSource};
use crate::storage::conf::*;
use crate::storage::level::*;
use crate::storage::policy::*;
use crate::storage::run::*;


/// An in-memory leveled store, used to exercise filter budgeting against
/// something that behaves like a real engine.
///
/// Runs are handed in already built. The tree never merges or compacts
/// them.
pub struct LSMTree {
    /// The levels of the tree. There are always `max_levels` of them,
    /// some possibly empty.
    pub levels: Vec<Level>,

    /// The filter policy new and rebuilt filters are sized with.
    policy: FilterPolicy,
}

impl LSMTree {
    /// Creates an empty LSM Tree with [MAX_LEVELS] levels and the default
    /// filter policy.
    pub fn new() -> Self {
        Self::with_levels(MAX_LEVELS)
    }

    /// Creates an empty LSM Tree with `max_levels` levels.
    pub fn with_levels(max_levels: usize) -> Self {
        LSMTree {
            levels: (0..max_levels).map(Level::new).collect(),
            policy: FilterPolicy::default(),
        }
    }

    /// The currently installed filter policy.
    pub fn policy(&self) -> &FilterPolicy {
        &self.policy
    }

    /// Adds a run of `keys` as the newest run of level `n` (0-indexed).
    ///
    /// The run's filter is built right away under the current policy.
    pub fn add_run(&mut self, n: usize, keys: Vec<Vec<u8>>) -> Result<()> {
        let bits_per_key = self.policy.bits_per_key(n);
        let level = self.levels
            .get_mut(n)
            .ok_or(anyhow!("Level {} not found", n))?;

        let mut run = Run::new(keys);
        run.build_filter(bits_per_key)?;
        level.add_run(run);
        Ok(())
    }

    /// Looks a key up, from the newest run to the oldest.
    pub fn get(&self, key: &[u8]) -> bool {
        self.runs().any(|run| run.may_contain(key) && run.contains(key))
    }

    /// Counts the runs a lookup for `key` has to search.
    ///
    /// A run is searched when its filter can't rule the key out. The count
    /// stops at the first run that holds the key.
    pub fn probe(&self, key: &[u8]) -> usize {
        let mut searched = 0;
        for run in self.runs().filter(|r| r.may_contain(key)) {
            searched += 1;
            if run.contains(key) {
                break;
            }
        }
        searched
    }

    /// The total number of filter bits held across all runs.
    pub fn filter_bits(&self) -> usize {
        self.runs().map(|r| r.filter_bits()).sum()
    }

    /// All runs, from newest to oldest.
    fn runs(&self) -> impl Iterator<Item = &Run> {
        self.levels.iter().flat_map(|l| l.runs.iter())
    }
}

impl Default for LSMTree {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsSource for LSMTree {
    fn per_level_run_sizes(&self) -> Result<Vec<Vec<i64>>> {
        Ok(self.levels.iter().map(|l| l.run_sizes()).collect())
    }

    fn exact_per_level_run_entry_counts(&self) -> Result<Option<Vec<Vec<i64>>>> {
        Ok(Some(self.levels.iter().map(|l| l.run_entry_counts()).collect()))
    }
}

impl FilterPolicyTarget for LSMTree {
    fn set_filter_policy(&mut self, config: &LevelFilterConfig) -> Result<()> {
        if config.len() > self.levels.len() {
            return Err(anyhow!(
                "Filter config covers {} levels but the tree has {}",
                config.len(),
                self.levels.len(),
            ));
        }
        self.policy = FilterPolicy::from_config(config);
        Ok(())
    }

    fn force_filter_materialization(&mut self) -> Result<usize> {
        let mut rebuilt = 0;
        for level in self.levels.iter_mut() {
            let bits_per_key = self.policy.bits_per_key(level.number);
            let n = level.materialize_filters(bits_per_key)?;
            if n > 0 {
                debug!(level = level.number, bits_per_key, rebuilt = n, "rebuilt filters");
            }
            rebuilt += n;
        }
        Ok(rebuilt)
    }
}
