//! Stream plumbing underneath readers and writers.

pub mod compression;
pub mod glob;
