//! Core domain types for VmBix.

pub mod inventory;
pub mod perf;

pub use inventory::*;
pub use perf::*;
