//! The Monkey false-positive cost model.

use std::f64::consts::LN_2;

/// Expected false-positive probability of a Bloom filter holding `entries`
/// keys in `bits` bits, using the asymptotic `exp(-(bits/entries) * ln(2)^2)`.
///
/// A run without entries has no usable filter and costs 1.
pub fn run_cost(bits: u64, entries: u64) -> f64 {
    if entries == 0 {
        return 1.0;
    }
    (-(bits as f64 / entries as f64) * LN_2 * LN_2).exp()
}

/// Sum of [run_cost] over parallel allocation and entry slices.
pub fn total_cost(bits: &[u64], entries: &[u64]) -> f64 {
    bits.iter()
        .zip(entries)
        .map(|(&b, &e)| run_cost(b, e))
        .sum()
}
