//! Two-configuration processor with a parameterless toggle.

use crate::configuration::ConfigurationSet;
use crate::core_handle::CoreHandle;
use crate::error::ProcessorError;
use crate::models::CoreModel;
use crate::processor::{Processor, SwitchableProcessor};
use hetproc_env::{Isa, MemMode, ModelId, Substrate};
use std::sync::Arc;
use tracing::warn;

/// Key of the configuration the processor starts on.
pub const START_KEY: &str = "start";

/// Key of the configuration `toggle()` switches to first.
pub const SWITCH_KEY: &str = "switch";

/// A switchable processor built from `(start, switch)` core pairs.
///
/// Each pair occupies one logical slot. [`toggle`](Self::toggle) flips
/// between the two configurations.
pub struct CorePairProcessor<S: Substrate> {
    inner: SwitchableProcessor<S>,
    current_is_start: bool,
    mem_mode: MemMode,
}

impl<S: Substrate> CorePairProcessor<S> {
    /// Creates a processor from one `(start, switch)` pair per logical slot.
    pub fn new(pairs: Vec<(CoreHandle, CoreHandle)>) -> Result<Self, ProcessorError> {
        let mem_mode = pairs
            .first()
            .map(|(start, _)| start.descriptor().mem_mode())
            .ok_or_else(|| ProcessorError::EmptyConfiguration(START_KEY.to_string()))?;

        let (start, switch): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        let configurations = vec![
            ConfigurationSet::new(START_KEY, start)?,
            ConfigurationSet::new(SWITCH_KEY, switch)?,
        ];

        Ok(Self {
            inner: SwitchableProcessor::new(configurations, START_KEY)?,
            current_is_start: true,
            mem_mode,
        })
    }

    /// Creates a processor from `(start model, switch model, count)` triples.
    ///
    /// Slots are numbered consecutively across the triples. `instantiate` is
    /// asked for a model reference for every core, start cores first.
    pub fn from_core_types<F>(
        core_types: &[(CoreModel, CoreModel, usize)],
        isa: Isa,
        mut instantiate: F,
    ) -> Result<Self, ProcessorError>
    where
        F: FnMut(&CoreModel, usize) -> ModelId,
    {
        if core_types.iter().any(|(_, _, count)| *count == 0) {
            return Err(ProcessorError::InvalidCoreCount);
        }

        let slots: Vec<(usize, &CoreModel, &CoreModel)> = core_types
            .iter()
            .flat_map(|(start, switch, count)| std::iter::repeat((start, switch)).take(*count))
            .enumerate()
            .map(|(slot, (start, switch))| (slot, start, switch))
            .collect();

        let start: Vec<CoreHandle> = slots
            .iter()
            .map(|&(slot, model, _)| CoreHandle::new(slot, isa, instantiate(model, slot), model.clone()))
            .collect();
        let switch: Vec<CoreHandle> = slots
            .iter()
            .map(|&(slot, _, model)| CoreHandle::new(slot, isa, instantiate(model, slot), model.clone()))
            .collect();

        Self::new(start.into_iter().zip(switch).collect())
    }

    /// Switches to whichever configuration is not active.
    pub fn toggle(&mut self) -> Result<(), ProcessorError> {
        let target = if self.current_is_start { SWITCH_KEY } else { START_KEY };
        self.inner.switch_to(target)?;
        self.current_is_start = !self.current_is_start;
        Ok(())
    }

    pub fn is_on_start(&self) -> bool {
        self.current_is_start
    }

    /// Memory mode requested from the board at incorporation.
    pub fn mem_mode(&self) -> MemMode {
        self.mem_mode
    }

    pub fn processor(&self) -> &SwitchableProcessor<S> {
        &self.inner
    }
}

impl<S: Substrate> Processor for CorePairProcessor<S> {
    type Substrate = S;

    fn isa(&self) -> Isa {
        self.inner.isa()
    }

    fn num_cores(&self) -> usize {
        self.inner.num_cores()
    }

    fn cores(&self) -> &[CoreHandle] {
        self.inner.cores()
    }

    fn incorporate(&mut self, substrate: Arc<S>) -> Result<(), ProcessorError> {
        self.inner.incorporate(Arc::clone(&substrate))?;

        if substrate.uses_ruby() && self.mem_mode == MemMode::Atomic {
            warn!(
                "Using an atomic core with Ruby will result in 'atomic_noncaching' memory mode. \
                 This will skip caching completely."
            );
            self.mem_mode = MemMode::AtomicNoncaching;
        }
        substrate.set_mem_mode(self.mem_mode);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hetproc_env::RecordingSubstrate;

    fn counter() -> impl FnMut(&CoreModel, usize) -> ModelId {
        let mut next = 0;
        move |_, _| {
            next += 1;
            ModelId(next - 1)
        }
    }

    fn kvm_dummy(count: usize) -> CorePairProcessor<RecordingSubstrate> {
        CorePairProcessor::from_core_types(
            &[(CoreModel::big_kvm(), CoreModel::dummy(), count)],
            Isa::X86,
            counter(),
        )
        .unwrap()
    }

    #[test]
    fn test_from_core_types_numbers_slots() {
        let processor: CorePairProcessor<RecordingSubstrate> = CorePairProcessor::from_core_types(
            &[
                (CoreModel::big_kvm(), CoreModel::dummy(), 1),
                (CoreModel::small_kvm(), CoreModel::dummy(), 2),
            ],
            Isa::X86,
            counter(),
        )
        .unwrap();

        let names: Vec<&str> = processor.cores().iter().map(|core| core.name()).collect();
        assert_eq!(names, vec!["big_kvm0", "small_kvm1", "small_kvm2"]);
        assert_eq!(processor.num_cores(), 3);

        let switch = processor.processor().configuration(SWITCH_KEY).unwrap();
        let models: Vec<ModelId> = switch.models().collect();
        assert_eq!(models, vec![ModelId(3), ModelId(4), ModelId(5)]);
    }

    #[test]
    fn test_zero_count_rejected() {
        let result: Result<CorePairProcessor<RecordingSubstrate>, _> = CorePairProcessor::from_core_types(
            &[
                (CoreModel::big_kvm(), CoreModel::dummy(), 2),
                (CoreModel::fp_kvm(), CoreModel::dummy(), 0),
            ],
            Isa::X86,
            counter(),
        );
        assert!(matches!(result, Err(ProcessorError::InvalidCoreCount)));
    }

    #[test]
    fn test_empty_pairs_rejected() {
        let result = CorePairProcessor::<RecordingSubstrate>::new(vec![]);
        assert!(matches!(result, Err(ProcessorError::EmptyConfiguration(_))));
    }

    #[test]
    fn test_toggle_twice_returns_to_start() {
        let mut processor = kvm_dummy(2);
        let substrate = RecordingSubstrate::shared();
        processor.incorporate(substrate.clone()).unwrap();
        let original: Vec<bool> = processor
            .processor()
            .all_cores()
            .map(|core| core.is_switched_out())
            .collect();

        processor.toggle().unwrap();
        assert!(!processor.is_on_start());
        assert_eq!(processor.processor().active_name(), SWITCH_KEY);

        processor.toggle().unwrap();
        assert!(processor.is_on_start());
        assert_eq!(processor.processor().active_name(), START_KEY);

        let restored: Vec<bool> = processor
            .processor()
            .all_cores()
            .map(|core| core.is_switched_out())
            .collect();
        assert_eq!(restored, original);
        assert_eq!(substrate.swap_count(), 2);
    }

    #[test]
    fn test_failed_toggle_keeps_side() {
        let mut processor = kvm_dummy(1);
        let substrate = RecordingSubstrate::shared();
        processor.incorporate(substrate.clone()).unwrap();

        substrate.fail_next_swap("busy");
        assert!(processor.toggle().is_err());
        assert!(processor.is_on_start());

        processor.toggle().unwrap();
        assert!(!processor.is_on_start());
    }

    #[test]
    fn test_toggle_requires_incorporation() {
        let mut processor = kvm_dummy(1);
        assert_eq!(processor.toggle(), Err(ProcessorError::NotIncorporated));
        assert!(processor.is_on_start());
    }

    #[test]
    fn test_mem_mode_from_first_start_core() {
        let mut processor = kvm_dummy(1);
        let substrate = RecordingSubstrate::shared();
        processor.incorporate(substrate.clone()).unwrap();

        assert_eq!(processor.mem_mode(), MemMode::AtomicNoncaching);
        assert_eq!(substrate.calls().mem_mode, Some(MemMode::AtomicNoncaching));
    }

    #[test]
    fn test_atomic_with_ruby_degrades_to_noncaching() {
        let mut processor: CorePairProcessor<RecordingSubstrate> = CorePairProcessor::from_core_types(
            &[(CoreModel::dummy(), CoreModel::big_o3(), 2)],
            Isa::X86,
            counter(),
        )
        .unwrap();
        assert_eq!(processor.mem_mode(), MemMode::Atomic);

        let substrate = Arc::new(RecordingSubstrate::new().with_ruby(true));
        processor.incorporate(substrate.clone()).unwrap();

        assert_eq!(processor.mem_mode(), MemMode::AtomicNoncaching);
        assert_eq!(substrate.calls().mem_mode, Some(MemMode::AtomicNoncaching));
    }

    #[test]
    fn test_atomic_without_ruby_stays_atomic() {
        let mut processor: CorePairProcessor<RecordingSubstrate> = CorePairProcessor::from_core_types(
            &[(CoreModel::dummy(), CoreModel::big_o3(), 1)],
            Isa::X86,
            counter(),
        )
        .unwrap();
        let substrate = RecordingSubstrate::shared();
        processor.incorporate(substrate.clone()).unwrap();

        assert_eq!(substrate.calls().mem_mode, Some(MemMode::Atomic));
    }
}
