//! Property and end-to-end tests for filter bit budgeting.

use anyhow::Result;
use bloombudget_lib::budget::allocator::{FilterBudgetAllocator, FilterPolicyTarget, StatsSource};
use bloombudget_lib::budget::conf::{AllocatorConf, StatsMode};
use bloombudget_lib::budget::cost::run_cost;
use bloombudget_lib::budget::solver::BitBudgetSolver;
use bloombudget_lib::budget::stats::LevelRunSizes;
use bloombudget_lib::storage::lsm::LSMTree;
use proptest::prelude::*;

/// Between one and six runs of up to 20k entries, some possibly empty.
fn entries_strategy() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(prop_oneof![1 => Just(0u64), 6 => 1..20_000u64], 1..6)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn budget_is_conserved(entries in entries_strategy(), bpe in 0.0..12.0f64) {
        let solver = BitBudgetSolver::new(bpe);
        let alloc = solver.solve(&entries).unwrap();
        prop_assert_eq!(alloc.bits().len(), entries.len());
        prop_assert_eq!(alloc.total(), alloc.budget());
        prop_assert_eq!(alloc.budget(), solver.budget(&entries).unwrap());
    }

    #[test]
    fn empty_runs_stay_empty(entries in entries_strategy(), bpe in 0.0..12.0f64) {
        let alloc = BitBudgetSolver::new(bpe).solve(&entries).unwrap();
        for (i, (&b, &e)) in alloc.bits().iter().zip(&entries).enumerate() {
            // Run 0 starts with the whole budget and only keeps it when
            // nobody else can take it...
            if e == 0 && i > 0 {
                prop_assert_eq!(b, 0);
            }
        }
    }

    #[test]
    fn cost_is_monotonic(entries in entries_strategy(), bpe in 0.0..12.0f64) {
        let solver = BitBudgetSolver::new(bpe);
        let budget = solver.budget(&entries).unwrap();
        let mut prev = (entries.len() - 1) as f64 + run_cost(budget, entries[0]);
        let mut ok = true;
        solver.solve_observed(&entries, |step| {
            ok &= step.cost <= prev;
            prev = step.cost;
        }).unwrap();
        prop_assert!(ok);
    }

    #[test]
    fn solving_is_deterministic(entries in entries_strategy(), bpe in 0.0..12.0f64) {
        let solver = BitBudgetSolver::new(bpe);
        prop_assert_eq!(solver.solve(&entries).unwrap(), solver.solve(&entries).unwrap());
    }

    #[test]
    fn one_value_per_level(
        levels in prop::collection::vec(prop::collection::vec(0..5_000i64, 1..4), 1..6),
    ) {
        let sizes = LevelRunSizes::entries(levels.clone());
        let plan = FilterBudgetAllocator::default().plan_from(&sizes).unwrap();
        prop_assert_eq!(plan.config.len(), levels.len());
        prop_assert_eq!(plan.bits_per_key.len(), levels.iter().map(|l| l.len()).sum::<usize>());
    }
}

fn keys(range: std::ops::Range<u32>) -> Vec<Vec<u8>> {
    range.map(|i| i.to_be_bytes().to_vec()).collect()
}

/// Builds a tree shaped like a freshly loaded store: two small runs in
/// level 0 and levels growing by 10x below it.
fn loaded_tree() -> Result<LSMTree> {
    let mut tree = LSMTree::new();
    tree.add_run(0, keys(0..100))?;
    tree.add_run(0, keys(100..200))?;
    tree.add_run(1, keys(200..2_200))?;
    tree.add_run(2, keys(2_200..22_200))?;
    Ok(tree)
}

#[test]
fn retune_installs_skewed_filters() -> Result<()> {
    let mut tree = loaded_tree()?;
    let conf = AllocatorConf {
        bits_per_entry: 5.0,
        ..AllocatorConf::default()
    };
    let plan = FilterBudgetAllocator::new(conf)?.retune(&mut tree)?;

    assert_eq!(plan.entries.entries(), &[100, 100, 2_000, 20_000]);
    assert_eq!(plan.config.len(), 3);
    let levels = plan.config.as_slice();
    assert!(levels[0] > levels[2], "Expected skew towards level 0, got {levels:?}");

    // The tree now follows the new policy...
    for (level, &bpk) in levels.iter().enumerate() {
        assert_eq!(tree.policy().bits_per_key(level), bpk);
        assert!(tree.levels[level]
            .runs
            .iter()
            .all(|r| r.filter_bits_per_key() == Some(bpk)));
    }

    // ...and a second force has nothing left to do.
    assert_eq!(tree.force_filter_materialization()?, 0);

    // No false negatives after the rebuild.
    assert!((0..22_200u32).step_by(97).all(|i| tree.get(&i.to_be_bytes())));
    Ok(())
}

#[test]
fn monkey_beats_uniform_on_absent_keys() -> Result<()> {
    let bits_per_entry = 4;
    let absent = || (1_000_000..1_020_000u32).map(|i| i.to_be_bytes());

    // Uniform baseline: every level gets the same bits per key...
    let mut uniform = loaded_tree()?;
    uniform.set_filter_policy(&bloombudget_lib::budget::aggregate::LevelFilterConfig::uniform(
        bits_per_entry,
        7,
    ))?;
    uniform.force_filter_materialization()?;
    let uniform_probes: usize = absent().map(|k| uniform.probe(&k)).sum();

    // Monkey, with the full budget so both spend the same memory...
    let mut monkey = loaded_tree()?;
    let conf = AllocatorConf {
        bits_per_entry: bits_per_entry as f64,
        metadata_discount: 1.0,
        ..AllocatorConf::default()
    };
    FilterBudgetAllocator::new(conf)?.retune(&mut monkey)?;
    let monkey_probes: usize = absent().map(|k| monkey.probe(&k)).sum();

    assert!(monkey.filter_bits() <= uniform.filter_bits());
    assert!(
        monkey_probes < uniform_probes,
        "Expected fewer wasted probes: monkey {monkey_probes}, uniform {uniform_probes}",
    );
    Ok(())
}

#[test]
fn byte_statistics_drive_the_same_pipeline() -> Result<()> {
    let tree = loaded_tree()?;
    let conf = AllocatorConf {
        stats_mode: StatsMode::Bytes,
        key_size: 4,
        ..AllocatorConf::default()
    };
    let allocator = FilterBudgetAllocator::new(conf)?;
    let sizes = allocator.snapshot(&tree)?;
    assert_eq!(sizes.total(), 22_200 * 4);

    // Keys are exactly 4 bytes, so the estimate is exact...
    let exact = FilterBudgetAllocator::default().plan(&tree)?;
    let estimated = allocator.plan(&tree)?;
    assert_eq!(exact.entries, estimated.entries);
    assert_eq!(exact.config, estimated.config);
    Ok(())
}

#[test]
fn empty_store_cannot_be_planned() {
    let tree = LSMTree::new();
    assert!(tree.per_level_run_sizes().is_ok());
    assert!(FilterBudgetAllocator::default().plan(&tree).is_err());
}
