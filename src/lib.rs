//! Monkey-style Bloom filter bit budgeting for leveled LSM trees.
//!
//! [budget] spreads a fixed filter memory budget across runs so that the
//! summed false-positive rate is minimized. [storage] is a small reference
//! store implementing the engine side of that exchange.

pub mod budget;
pub mod storage;
