use anyhow::Result;
use tracing::{debug, info};

use crate::budget::aggregate::{LevelAggregator, LevelFilterConfig};
use crate::budget::conf::{AllocatorConf, StatsMode};
use crate::budget::error::AllocError;
use crate::budget::solver::{BitAllocation, BitBudgetSolver};
use crate::budget::stats::{FlatEntrySequence, LevelRunSizes};

/// Read side of a storage engine: a snapshot of its run statistics.
///
/// Each call returns one inner vector per level, in level order. An empty
/// inner vector means no further levels hold data.
pub trait StatsSource {
    /// The size in bytes of every run.
    fn per_level_run_sizes(&self) -> Result<Vec<Vec<i64>>>;

    /// The exact entry count of every run, if the engine tracks it.
    fn exact_per_level_run_entry_counts(&self) -> Result<Option<Vec<Vec<i64>>>> {
        Ok(None)
    }
}

/// Write side of a storage engine: where a filter configuration is applied.
pub trait FilterPolicyTarget {
    /// Installs a per-level filter policy, as done when reopening the store.
    fn set_filter_policy(&mut self, config: &LevelFilterConfig) -> Result<()>;

    /// Rebuilds the filters of every run that lacks one or whose filter
    /// doesn't match the current policy. Returns the number of runs rebuilt.
    fn force_filter_materialization(&mut self) -> Result<usize>;
}

/// Everything computed for one allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterPlan {
    /// The solver input.
    pub entries: FlatEntrySequence,

    /// Filter bits per run.
    pub allocation: BitAllocation,

    /// Whole bits per key per run.
    pub bits_per_key: Vec<u64>,

    /// The per-level configuration handed to the engine.
    pub config: LevelFilterConfig,
}

/// Turns engine statistics into a Monkey-tuned [LevelFilterConfig].
#[derive(Debug, Clone, Default)]
pub struct FilterBudgetAllocator {
    conf: AllocatorConf,
}

impl FilterBudgetAllocator {
    /// Creates an allocator, rejecting out-of-range configuration.
    pub fn new(conf: AllocatorConf) -> Result<Self, AllocError> {
        conf.validate()?;
        Ok(FilterBudgetAllocator { conf })
    }

    pub fn conf(&self) -> &AllocatorConf {
        &self.conf
    }

    /// Reads a statistics snapshot from `source`, following the configured
    /// [StatsMode].
    pub fn snapshot<S: StatsSource + ?Sized>(&self, source: &S) -> Result<LevelRunSizes> {
        let bytes = |source: &S| -> Result<LevelRunSizes> {
            Ok(LevelRunSizes::bytes(source.per_level_run_sizes()?, self.conf.key_size))
        };
        match self.conf.stats_mode {
            StatsMode::Bytes => bytes(source),
            StatsMode::ExactCounts => match source.exact_per_level_run_entry_counts()? {
                Some(counts) => Ok(LevelRunSizes::entries(counts)),
                None => Err(AllocError::ExactCountsUnavailable.into()),
            },
            StatsMode::PreferExact => match source.exact_per_level_run_entry_counts()? {
                Some(counts) => Ok(LevelRunSizes::entries(counts)),
                None => bytes(source),
            },
        }
    }

    /// Computes a plan from an already captured snapshot.
    pub fn plan_from(&self, sizes: &LevelRunSizes) -> Result<FilterPlan, AllocError> {
        let entries = sizes.normalize()?;
        let allocation = BitBudgetSolver::from_conf(&self.conf).solve(entries.entries())?;
        let bits_per_key = allocation.bits_per_key(entries.entries());
        let config = LevelAggregator::new(self.conf.deep_levels)
            .aggregate(&bits_per_key, entries.runs_per_level())?;

        for (run, bpk) in entries.runs().zip(&bits_per_key) {
            debug!(
                level = run.level_index,
                run = run.run_index,
                entries = run.entry_count,
                bits_per_key = bpk,
                "run allocation",
            );
        }
        info!(
            runs = entries.len(),
            budget = allocation.budget(),
            cost = allocation.cost(),
            config = ?config.as_slice(),
            "filter bits allocated",
        );

        Ok(FilterPlan {
            entries,
            allocation,
            bits_per_key,
            config,
        })
    }

    /// Snapshots `source` and computes a plan for it.
    pub fn plan<S: StatsSource + ?Sized>(&self, source: &S) -> Result<FilterPlan> {
        let sizes = self.snapshot(source)?;
        Ok(self.plan_from(&sizes)?)
    }

    /// Computes a plan for `engine`, installs the resulting filter policy
    /// and forces existing runs to rebuild their filters.
    ///
    /// The exclusive borrow keeps the engine's layout fixed between reading
    /// the statistics and applying the configuration.
    pub fn retune<E: StatsSource + FilterPolicyTarget>(&self, engine: &mut E) -> Result<FilterPlan> {
        let plan = self.plan(&*engine)?;
        engine.set_filter_policy(&plan.config)?;
        let rebuilt = engine.force_filter_materialization()?;
        info!(rebuilt, "filters materialized");
        Ok(plan)
    }
}
