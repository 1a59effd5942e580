//! This module handles Bloom filter bit budgeting.
//!
//! Engine statistics flow through [stats], [solver] and [aggregate] in that
//! order. [allocator] wires them together against an engine.

pub mod aggregate;
pub mod allocator;
pub mod conf;
pub mod cost;
pub mod error;
pub mod solver;
pub mod stats;
