#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

/// A concurrent hash map guarded by one reader-writer lock per bucket.
///
/// This module provides `StripedMap`, which wraps the `StripedTable` and
/// offers a key-value interface with configurable hashers, plus the
/// bucket-by-bucket dump rendering.
pub mod striped_map;

pub mod striped_table;

pub use striped_map::DEFAULT_BUCKET_COUNT;
pub use striped_map::DefaultHashBuilder;
pub use striped_map::StripedMap;
pub use striped_table::StripedTable;
