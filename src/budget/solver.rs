//! Distributes a fixed bit budget across runs to minimize the summed
//! false-positive cost (Monkey's "Algorithm C").
//!
//! The solver starts with the whole budget on run 0 and then repeatedly
//! sweeps every pair of runs, moving `delta` bits between them whenever
//! that lowers the cost. When a sweep stops making progress, `delta` is
//! halved. The search ends once `delta` drops below one bit.

use tracing::{debug, trace};

use crate::budget::conf::{AllocatorConf, DEFAULT_METADATA_DISCOUNT, DEFAULT_STALL_TOLERANCE};
use crate::budget::cost::run_cost;
use crate::budget::error::AllocError;

/// Per-run filter bits produced by [BitBudgetSolver::solve].
#[derive(Debug, Clone, PartialEq)]
pub struct BitAllocation {
    /// Bits assigned to each run, in level-then-run order.
    bits: Vec<u64>,

    /// The budget the solver started from.
    budget: u64,

    /// Summed false-positive cost of `bits`.
    cost: f64,

    /// Number of sweeps it took to converge.
    sweeps: usize,
}

impl BitAllocation {
    pub fn bits(&self) -> &[u64] {
        &self.bits
    }

    pub fn budget(&self) -> u64 {
        self.budget
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn sweeps(&self) -> usize {
        self.sweeps
    }

    /// Sum of the allocated bits.
    pub fn total(&self) -> u64 {
        self.bits.iter().sum()
    }

    /// Converts the allocation into whole bits per key for each run.
    ///
    /// Runs with no entries get 0.
    pub fn bits_per_key(&self, entries: &[u64]) -> Vec<u64> {
        self.bits
            .iter()
            .zip(entries)
            .map(|(&b, &e)| if e == 0 { 0 } else { b / e })
            .collect()
    }
}

/// Progress report for one completed sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepStep {
    /// 1-based sweep number.
    pub sweep: usize,

    /// The step size used during the sweep.
    pub delta: u64,

    /// Total cost after the sweep.
    pub cost: f64,

    /// Number of exchanges accepted during the sweep.
    pub accepted: usize,
}

/// Computes a cost-minimizing [BitAllocation] for a sequence of runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BitBudgetSolver {
    bits_per_entry: f64,
    metadata_discount: f64,
    stall_tolerance: f64,
}

impl BitBudgetSolver {
    /// Creates a solver targeting `bits_per_entry` bits per key on average,
    /// with the default discount and stall tolerance.
    pub fn new(bits_per_entry: f64) -> Self {
        BitBudgetSolver {
            bits_per_entry,
            metadata_discount: DEFAULT_METADATA_DISCOUNT,
            stall_tolerance: DEFAULT_STALL_TOLERANCE,
        }
    }

    /// Creates a solver from the relevant fields of an [AllocatorConf].
    pub fn from_conf(conf: &AllocatorConf) -> Self {
        BitBudgetSolver {
            bits_per_entry: conf.bits_per_entry,
            metadata_discount: conf.metadata_discount,
            stall_tolerance: conf.stall_tolerance,
        }
    }

    pub fn with_metadata_discount(mut self, discount: f64) -> Self {
        self.metadata_discount = discount;
        self
    }

    pub fn with_stall_tolerance(mut self, tolerance: f64) -> Self {
        self.stall_tolerance = tolerance;
        self
    }

    fn validate(&self) -> Result<(), AllocError> {
        AllocatorConf {
            bits_per_entry: self.bits_per_entry,
            metadata_discount: self.metadata_discount,
            stall_tolerance: self.stall_tolerance,
            ..AllocatorConf::default()
        }
        .validate()
    }

    /// The total number of bits to distribute over `entries`.
    pub fn budget(&self, entries: &[u64]) -> Result<u64, AllocError> {
        self.validate()?;
        let total = entries
            .iter()
            .try_fold(0u64, |acc, &e| acc.checked_add(e))
            .ok_or(AllocError::BudgetOverflow)?;
        let budget = (total as f64 * self.bits_per_entry * self.metadata_discount).floor();

        // `u64::MAX as f64` rounds up to 2^64, which is itself out of range...
        if !budget.is_finite() || budget >= u64::MAX as f64 {
            return Err(AllocError::BudgetOverflow);
        }
        Ok(budget as u64)
    }

    /// Allocates the budget over `entries`, given in level-then-run order.
    pub fn solve(&self, entries: &[u64]) -> Result<BitAllocation, AllocError> {
        self.solve_observed(entries, |_| {})
    }

    /// Like [BitBudgetSolver::solve], but reports every sweep to `observe`.
    pub fn solve_observed<F>(&self, entries: &[u64], mut observe: F) -> Result<BitAllocation, AllocError>
    where
        F: FnMut(&SweepStep),
    {
        if entries.is_empty() {
            return Err(AllocError::NoRuns);
        }
        let budget = self.budget(entries)?;
        let n = entries.len();

        // Everything starts on run 0. Every other run has no bits and so a
        // cost of exactly 1.
        let mut bits = vec![0; n];
        bits[0] = budget;
        let mut cost = (n - 1) as f64 + run_cost(budget, entries[0]);

        let mut delta = budget;
        let mut sweeps = 0;
        while delta >= 1 {
            let step = sweep(bits, entries, delta, cost);
            sweeps += 1;
            trace!(sweep = sweeps, delta, cost = step.cost, accepted = step.accepted);
            observe(&SweepStep {
                sweep: sweeps,
                delta,
                cost: step.cost,
                accepted: step.accepted,
            });

            if step.accepted == 0 || (step.cost - cost).abs() < self.stall_tolerance {
                delta /= 2;
            }
            bits = step.bits;
            cost = step.cost;
        }

        debug!(runs = n, budget, sweeps, cost, "bit budget solved");
        Ok(BitAllocation {
            bits,
            budget,
            cost,
            sweeps,
        })
    }
}

/// The state carried through one pass over every pair of runs.
struct Sweep {
    bits: Vec<u64>,
    cost: f64,
    accepted: usize,
}

impl Sweep {
    /// Moves `delta` bits from `donor` to `recipient` if that strictly
    /// lowers the cost.
    ///
    /// The donor may not go below zero and a run without entries never
    /// receives bits.
    fn exchange(&mut self, entries: &[u64], donor: usize, recipient: usize, delta: u64) {
        if entries[recipient] == 0 || self.bits[donor] < delta {
            return;
        }
        let before = run_cost(self.bits[recipient], entries[recipient])
            + run_cost(self.bits[donor], entries[donor]);
        let after = run_cost(self.bits[recipient] + delta, entries[recipient])
            + run_cost(self.bits[donor] - delta, entries[donor]);
        if after < before {
            self.bits[recipient] += delta;
            self.bits[donor] -= delta;
            self.cost += after - before;
            self.accepted += 1;
        }
    }
}

/// Tries both directions of every pair once, compounding accepted moves.
fn sweep(bits: Vec<u64>, entries: &[u64], delta: u64, cost: f64) -> Sweep {
    let mut state = Sweep {
        bits,
        cost,
        accepted: 0,
    };
    for i in 0..entries.len() {
        for j in i + 1..entries.len() {
            state.exchange(entries, j, i, delta);
            state.exchange(entries, i, j, delta);
        }
    }
    state
}
