//! Core substrate trait consumed by switchable processors.

use crate::error::SubstrateError;
use crate::types::{MemMode, ModelId, TimelineIndex};

/// The central interface to the simulation kernel.
///
/// This trait abstracts the kernel so that processors can be driven by the
/// deterministic `SimSubstrate` in `hetproc_sim`, by the recording double in
/// this crate, or by a real kernel binding.
///
/// # Sharing
///
/// All methods take `&self`. Implementations keep their mutable state behind
/// interior mutability and are shared as `Arc<S>` between the board, the run
/// driver and the processor.
///
/// # Atomicity
///
/// `perform_atomic_swap` is all-or-nothing: on error no model has changed
/// state, and no instruction executes on any logical core while it runs.
pub trait Substrate: Send + Sync + 'static {
    /// Replaces every outgoing model with its incoming partner in one step.
    ///
    /// # Arguments
    /// * `pairs` - `(outgoing, incoming)` model pairs, one per logical slot
    ///
    /// # Returns
    /// * `Ok(())` - Every pair was swapped
    /// * `Err(_)` - Nothing was swapped
    fn perform_atomic_swap(&self, pairs: &[(ModelId, ModelId)]) -> Result<(), SubstrateError>;

    /// Binds a model and every sub-object it owns to a timeline.
    ///
    /// Called only while a processor is being incorporated.
    fn assign_timeline(&self, model: ModelId, timeline: TimelineIndex)
        -> Result<(), SubstrateError>;

    /// Prepares the host-acceleration backend shared by all accelerated models.
    fn enable_host_acceleration(&self) -> Result<(), SubstrateError> {
        Ok(())
    }

    /// Returns true if the board's cache hierarchy runs a coherence protocol (Ruby).
    fn uses_ruby(&self) -> bool {
        false
    }

    /// Sets the memory mode of the board's memory system.
    fn set_mem_mode(&self, _mode: MemMode) {}
}
