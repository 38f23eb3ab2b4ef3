//! # strata-test
//!
//! Integration tests for Strata.
//!
//! This crate contains:
//! - Fixtures and fault-injecting page stores
//! - Seeded workload generators with an in-memory model of the expected file
//! - Criterion benchmarks for the object manager

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Test utilities and helpers
pub mod utils;

/// Workload generators
pub mod workload;
