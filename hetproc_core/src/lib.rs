//! HetProc Core - Switchable Heterogeneous Processor
//!
//! A host simulates several logical CPU cores. Each logical core can be
//! backed, at any moment, by one of several interchangeable core models: a
//! fast host-accelerated model to fast-forward, a detailed one to measure.
//!
//! This crate keeps the bookkeeping that makes that safe:
//! 1. **Shape**: named configurations that all cover the same logical slots with one ISA
//! 2. **Hand-off**: every slot swaps in one atomic substrate call
//! 3. **Isolation**: every accelerated model runs on its own simulated timeline

pub mod configuration;
pub mod core_handle;
pub mod error;
pub mod models;
pub mod pair;
pub mod processor;

// Re-export key types for convenience
pub use configuration::ConfigurationSet;
pub use core_handle::CoreHandle;
pub use error::ProcessorError;
pub use models::{CoreKind, CoreModel, CoreStepping, FuPool, FunctionalUnit, OpClass, OpDesc};
pub use pair::{CorePairProcessor, START_KEY, SWITCH_KEY};
pub use processor::{Processor, SwitchableProcessor};
