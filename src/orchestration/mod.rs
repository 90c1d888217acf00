//! Cycle orchestration: chain sync and the end-to-end cycle.

pub mod orchestrator;
pub mod sync;

pub use orchestrator::{CycleReport, Orchestrator};
pub use sync::{AccountSync, ChainSync, SyncTarget};
