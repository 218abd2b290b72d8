//! HetProc Substrate Abstraction Layer
//!
//! This crate describes the contract between a switchable heterogeneous
//! processor and the simulation kernel that actually owns simulated time.
//!
//! # Core Concept: The Substrate
//!
//! The processor never executes instructions and never advances a clock.
//! Everything that touches simulated time is delegated to a [`Substrate`]:
//! - Atomic multi-model swaps (`perform_atomic_swap()`)
//! - Timeline isolation for host-accelerated models (`assign_timeline()`)
//! - Board-level memory mode (`set_mem_mode()`)
//!
//! The substrate is handed to the processor once, at incorporation, as an
//! `Arc<S>`. There is no ambient or global simulation handle.
//!
//! # Example
//!
//! ```ignore
//! use hetproc_env::{ModelId, Substrate};
//!
//! fn hand_off<S: Substrate>(substrate: &S, outgoing: &[ModelId], incoming: &[ModelId]) {
//!     let pairs: Vec<_> = outgoing.iter().copied().zip(incoming.iter().copied()).collect();
//!     substrate.perform_atomic_swap(&pairs)?;
//! }
//! ```

mod error;
mod recording;
mod substrate;
mod types;

pub use error::SubstrateError;
pub use recording::{RecordedCalls, RecordingSubstrate};
pub use substrate::Substrate;
pub use types::{ExitTrigger, Isa, MemMode, ModelId, TimelineIndex};
