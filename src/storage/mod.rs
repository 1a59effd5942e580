//! This module holds a minimal in-memory leveled store.
//!
//! It reports run statistics and applies filter policies through the
//! traits in [crate::budget::allocator], so filter budgeting can be run
//! end to end without a real engine.

pub mod conf;
pub mod level;
pub mod lsm;
pub mod policy;
pub mod run;
