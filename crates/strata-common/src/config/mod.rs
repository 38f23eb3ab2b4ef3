//! Configuration for Strata.

mod storage;

pub use storage::StorageConfig;
