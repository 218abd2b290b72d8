//! Named, fixed-shape sets of core handles.

use crate::core_handle::CoreHandle;
use crate::error::ProcessorError;
use hetproc_env::ModelId;
use std::collections::HashSet;

/// One complete assignment of a core model to every logical slot.
///
/// Cores are kept in slot-id order; that order is the wiring order exposed
/// to the rest of the machine and it never changes.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationSet {
    name: String,
    slots: Vec<CoreHandle>,
}

impl ConfigurationSet {
    /// Creates a configuration, sorting the cores by slot id.
    ///
    /// Fails if `cores` is empty or uses a slot id twice.
    pub fn new(name: impl Into<String>, mut cores: Vec<CoreHandle>) -> Result<Self, ProcessorError> {
        let name = name.into();
        if cores.is_empty() {
            return Err(ProcessorError::EmptyConfiguration(name));
        }

        cores.sort_by_key(|core| core.slot_id());
        if let Some(pair) = cores.windows(2).find(|pair| pair[0].slot_id() == pair[1].slot_id()) {
            return Err(ProcessorError::DuplicateSlot {
                configuration: name,
                slot: pair[0].slot_id(),
            });
        }

        Ok(Self { name, slots: cores })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cores in slot-id order.
    pub fn slots(&self) -> &[CoreHandle] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots.iter().map(|core| core.slot_id())
    }

    pub fn models(&self) -> impl Iterator<Item = ModelId> + '_ {
        self.slots.iter().map(|core| core.model())
    }

    pub fn contains_model(&self, model: ModelId) -> bool {
        self.slots.iter().any(|core| core.model() == model)
    }

    /// True if both sets occupy exactly the same logical slots.
    pub fn same_layout(&self, other: &ConfigurationSet) -> bool {
        self.slot_ids().eq(other.slot_ids())
    }

    /// Returns the first model referenced by two handles, if any.
    pub(crate) fn first_duplicate_model<'a>(
        sets: impl IntoIterator<Item = &'a ConfigurationSet>,
    ) -> Option<ModelId> {
        let mut seen = HashSet::new();
        sets.into_iter()
            .flat_map(|set| set.models())
            .find(|model| !seen.insert(*model))
    }

    pub(crate) fn set_switched_out(&mut self, switched_out: bool) {
        for core in &mut self.slots {
            core.set_switched_out(switched_out);
        }
    }
}
