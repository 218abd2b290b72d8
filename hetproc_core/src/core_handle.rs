//! Handle to one simulate-able core model occupying a logical slot.

use crate::models::CoreModel;
use hetproc_env::{Isa, ModelId};

/// A thin wrapper around one core model.
///
/// The handle references the substrate-owned model through its [`ModelId`]
/// and caches the "accelerated" capability once, at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreHandle {
    slot_id: usize,
    isa: Isa,
    model: ModelId,
    descriptor: CoreModel,
    accelerated: bool,
    switched_out: bool,
    name: String,
}

impl CoreHandle {
    /// Creates a handle for `model` in logical slot `slot_id`.
    ///
    /// The display name defaults to `<model name><slot>`, e.g. `big_kvm0`.
    pub fn new(slot_id: usize, isa: Isa, model: ModelId, descriptor: CoreModel) -> Self {
        let accelerated = descriptor.is_accelerated();
        let name = format!("{}{}", descriptor.name, slot_id);
        Self {
            slot_id,
            isa,
            model,
            descriptor,
            accelerated,
            switched_out: false,
            name,
        }
    }

    /// Overrides the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn slot_id(&self) -> usize {
        self.slot_id
    }

    pub fn isa(&self) -> Isa {
        self.isa
    }

    pub fn model(&self) -> ModelId {
        self.model
    }

    pub fn descriptor(&self) -> &CoreModel {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True if the underlying model executes on the host.
    pub fn is_accelerated(&self) -> bool {
        self.accelerated
    }

    /// True if the handle is not part of the active configuration.
    pub fn is_switched_out(&self) -> bool {
        self.switched_out
    }

    /// Updates the switched-out flag. Has no other effect.
    pub fn set_switched_out(&mut self, switched_out: bool) {
        self.switched_out = switched_out;
    }
}
