//! Deterministic simulation harness for switchable heterogeneous processors.
//!
//! A [`SimSubstrate`] stands in for the simulation kernel: it owns the core
//! objects, their timelines and the architectural state that moves between
//! models on a switch. A [`Simulator`] incorporates a processor into it,
//! advances it one quantum at a time and hands exit events to registered
//! handlers, which is where switches happen.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                       Simulator                        │
//! │  exit handlers ──► Processor (toggle / switch_to)      │
//! │                        │                               │
//! │                        ▼ perform_atomic_swap           │
//! │  ┌──────────────────────────────────────────────────┐  │
//! │  │ SimSubstrate                                     │  │
//! │  │   timeline0 (shared): atomic / O3 models         │  │
//! │  │   timeline1..N      : one accelerated model each │  │
//! │  │   ChaCha8 host-thread order                      │  │
//! │  └──────────────────────────────────────────────────┘  │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use hetproc_sim::{Experiment, SimConfig, SystemConfig, Workload};
//!
//! let workload = Workload::new("trace", 1_000_000).with_exit_point(100_000);
//! let config = SimConfig::default().with_switches(1);
//!
//! let mut experiment = Experiment::build(SystemConfig::BigLittle, workload, config)?;
//! let report = experiment.run()?;
//! ```

mod config;
mod driver;
mod error;
mod experiment;
mod exporter;
mod substrate;

pub use config::{SimConfig, Workload};
pub use driver::{switch_sequence, toggle_on_exit, ExitAction, ExitHandler, Simulator};
pub use error::SimError;
pub use experiment::{CoreCounts, Experiment, SystemConfig};
pub use exporter::{CoreReport, ExitReason, ExitRecord, RunReport};
pub use substrate::{ArchState, ObjectSummary, QuantumStats, SimSubstrate};
