use anyhow::Result;

use crate::storage::run::*;


/// A level in the LSM Tree, comprised of zero or more runs.
pub struct Level {
    /// The level number (0 is the first, smallest level).
    pub number: usize,

    /// The runs in this level, newest first.
    pub runs: Vec<Run>,
}

impl Level {
    /// Create a new, empty LSM Tree Level.
    pub fn new(number: usize) -> Self {
        Level {
            number,
            runs: vec![],
        }
    }

    /// Adds a run as the level's newest.
    pub fn add_run(&mut self, run: Run) {
        self.runs.insert(0, run);
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// The size of each run in bytes, in run order.
    pub fn run_sizes(&self) -> Vec<i64> {
        self.runs.iter().map(|r| r.size_bytes() as i64).collect()
    }

    /// The number of entries in each run, in run order.
    pub fn run_entry_counts(&self) -> Vec<i64> {
        self.runs.iter().map(|r| r.len() as i64).collect()
    }

    /// Rebuilds every filter in the level not already sized for
    /// `bits_per_key`. Returns the number of runs rebuilt.
    pub fn materialize_filters(&mut self, bits_per_key: u64) -> Result<usize> {
        let mut rebuilt = 0;
        for run in self.runs.iter_mut().filter(|r| r.needs_filter(bits_per_key)) {
            run.build_filter(bits_per_key)?;
            rebuilt += 1;
        }
        Ok(rebuilt)
    }
}
