//! Type definitions for Strata.
//!
//! This module contains the identifier types shared across the storage and
//! object layers.

mod ids;

pub use ids::{ExtentNo, FileId, ObjectId, PageId, PageNo, SlotNo, Unique, VolumeId};
