//! # Ladera Parallel
//!
//! Execution strategies for per-feature work.
//!
//! Boundaries are independent of each other, so the exposure pipeline hands
//! each one to a worker. Results always come back in input order, whatever
//! order the workers finish in.

pub mod strategy;

pub use strategy::{num_cpus, ParallelStrategy, PoolError, ProcessingMode};
