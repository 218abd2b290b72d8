//! The switchable heterogeneous processor.
//!
//! A [`SwitchableProcessor`] groups core handles into named configurations
//! that all cover the same logical slots. Exactly one configuration is
//! active. Switching hands every slot over to the target configuration in a
//! single atomic substrate call.
//!
//! # Lifecycle
//!
//! ```text
//! new() ──► incorporate(substrate) ──► switch_to(a) ──► switch_to(b) ──► ...
//!   │              │
//!   │              └─ isolated timelines bound, substrate stored
//!   └─ shape validated, inactive handles switched out
//! ```

use crate::configuration::ConfigurationSet;
use crate::core_handle::CoreHandle;
use crate::error::ProcessorError;
use hetproc_env::{Isa, ModelId, Substrate, TimelineIndex};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

/// What the machine-assembly layer sees of a processor.
pub trait Processor {
    type Substrate: Substrate;

    /// The single ISA every core targets.
    fn isa(&self) -> Isa;

    /// Number of active logical cores.
    fn num_cores(&self) -> usize;

    /// Active cores in slot-id order, used to wire caches and interconnect.
    fn cores(&self) -> &[CoreHandle];

    /// One-time hook called while the machine is assembled.
    fn incorporate(&mut self, substrate: Arc<Self::Substrate>) -> Result<(), ProcessorError>;
}

/// A processor whose cores can be swapped, all at once, for another configuration.
pub struct SwitchableProcessor<S: Substrate> {
    /// Configurations in the order they were supplied
    configurations: Vec<ConfigurationSet>,

    /// Index of the active configuration
    active: usize,

    isa: Isa,

    /// Timeline of every handle, filled at incorporation
    timelines: HashMap<ModelId, TimelineIndex>,

    /// Set once by `incorporate`
    substrate: Option<Arc<S>>,
}

impl<S: Substrate> SwitchableProcessor<S> {
    /// Creates a processor starting on `starting`.
    ///
    /// # Errors
    /// Any configuration error: unknown starting key, duplicate names,
    /// mismatched slot counts or slot ids, more than one ISA, or a model
    /// shared between two handles.
    pub fn new(configurations: Vec<ConfigurationSet>, starting: &str) -> Result<Self, ProcessorError> {
        let mut names = BTreeSet::new();
        for set in &configurations {
            if !names.insert(set.name()) {
                return Err(ProcessorError::DuplicateConfiguration(set.name().to_string()));
            }
        }

        let active = configurations
            .iter()
            .position(|set| set.name() == starting)
            .ok_or_else(|| ProcessorError::UnknownStartingConfiguration(starting.to_string()))?;

        let reference = &configurations[active];
        for set in &configurations {
            if set.len() != reference.len() {
                return Err(ProcessorError::SlotCountMismatch {
                    configuration: set.name().to_string(),
                    expected: reference.len(),
                    found: set.len(),
                });
            }
            if !set.same_layout(reference) {
                return Err(ProcessorError::SlotLayoutMismatch {
                    configuration: set.name().to_string(),
                    reference: reference.name().to_string(),
                });
            }
        }

        let isas: BTreeSet<Isa> = configurations
            .iter()
            .flat_map(|set| set.slots())
            .map(|core| core.isa())
            .collect();
        if isas.len() > 1 {
            return Err(ProcessorError::HeterogeneousIsa {
                isas: isas.into_iter().collect(),
            });
        }
        let isa = reference.slots()[0].isa();

        if let Some(model) = ConfigurationSet::first_duplicate_model(&configurations) {
            return Err(ProcessorError::DuplicateModel(model));
        }

        let mut processor = Self {
            configurations,
            active,
            isa,
            timelines: HashMap::new(),
            substrate: None,
        };
        processor.mark_switched_out();

        debug!(
            "Created switchable processor with {} configurations, starting on '{}'",
            processor.configurations.len(),
            starting
        );
        Ok(processor)
    }

    /// Switches every logical slot to the cores of configuration `name`.
    ///
    /// Slot `i` of the active configuration is paired with slot `i` of the
    /// target. On any error the bookkeeping is left untouched; substrate
    /// errors are returned as they were reported.
    pub fn switch_to(&mut self, name: &str) -> Result<(), ProcessorError> {
        let substrate = Arc::clone(self.substrate.as_ref().ok_or(ProcessorError::NotIncorporated)?);

        let target = self
            .position(name)
            .ok_or_else(|| ProcessorError::UnknownConfiguration(name.to_string()))?;
        if target == self.active {
            return Err(ProcessorError::AlreadyActive(name.to_string()));
        }

        let current = &self.configurations[self.active];
        let next = &self.configurations[target];
        if next.len() != current.len() {
            return Err(ProcessorError::SlotCountMismatch {
                configuration: next.name().to_string(),
                expected: current.len(),
                found: next.len(),
            });
        }

        let pairs: Vec<(ModelId, ModelId)> = current
            .slots()
            .iter()
            .zip(next.slots())
            .map(|(outgoing, incoming)| (outgoing.model(), incoming.model()))
            .collect();

        substrate.perform_atomic_swap(&pairs)?;

        info!("Switched cores '{}' -> '{}' ({} slots)", current.name(), next.name(), pairs.len());

        let previous = self.active;
        self.configurations[previous].set_switched_out(true);
        self.configurations[target].set_switched_out(false);
        self.active = target;
        Ok(())
    }

    /// Name of the active configuration.
    pub fn active_name(&self) -> &str {
        self.configurations[self.active].name()
    }

    pub fn active_configuration(&self) -> &ConfigurationSet {
        &self.configurations[self.active]
    }

    pub fn configuration(&self, name: &str) -> Option<&ConfigurationSet> {
        self.position(name).map(|index| &self.configurations[index])
    }

    /// Configuration names in the order they were supplied.
    pub fn configuration_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.configurations.iter().map(|set| set.name())
    }

    /// Every handle of every configuration.
    pub fn all_cores(&self) -> impl Iterator<Item = &CoreHandle> + '_ {
        self.configurations.iter().flat_map(|set| set.slots())
    }

    pub fn has_accelerated_cores(&self) -> bool {
        self.all_cores().any(|core| core.is_accelerated())
    }

    /// Timeline bound to `model`, once incorporated.
    pub fn timeline_of(&self, model: ModelId) -> Option<TimelineIndex> {
        self.timelines.get(&model).copied()
    }

    pub fn is_incorporated(&self) -> bool {
        self.substrate.is_some()
    }

    pub fn substrate(&self) -> Option<&Arc<S>> {
        self.substrate.as_ref()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.configurations.iter().position(|set| set.name() == name)
    }

    fn mark_switched_out(&mut self) {
        let active = self.active;
        for (index, set) in self.configurations.iter_mut().enumerate() {
            set.set_switched_out(index != active);
        }
    }
}

impl<S: Substrate> Processor for SwitchableProcessor<S> {
    type Substrate = S;

    fn isa(&self) -> Isa {
        self.isa
    }

    /// Only the active configuration counts; switched-out cores are not cores of the machine.
    fn num_cores(&self) -> usize {
        self.configurations[self.active].len()
    }

    fn cores(&self) -> &[CoreHandle] {
        self.configurations[self.active].slots()
    }

    /// Binds every accelerated handle, across all configurations, to its own
    /// isolated timeline and stores the substrate for later switches.
    ///
    /// Timelines are bound to handles, not slots, so they stay valid across
    /// every later switch.
    fn incorporate(&mut self, substrate: Arc<S>) -> Result<(), ProcessorError> {
        if self.substrate.is_some() {
            return Err(ProcessorError::AlreadyIncorporated);
        }

        let mut accelerated: Vec<(ModelId, TimelineIndex)> = Vec::new();
        for (i, core) in self.all_cores().filter(|core| core.is_accelerated()).enumerate() {
            let timeline = TimelineIndex::isolated(i).ok_or(ProcessorError::TimelinesExhausted(i))?;
            accelerated.push((core.model(), timeline));
        }

        let mut timelines: HashMap<ModelId, TimelineIndex> = self
            .all_cores()
            .map(|core| (core.model(), TimelineIndex::DEFAULT))
            .collect();

        if !accelerated.is_empty() {
            substrate.enable_host_acceleration()?;
        }
        // Nothing is stored until every binding succeeded
        for &(model, timeline) in &accelerated {
            substrate.assign_timeline(model, timeline)?;
            timelines.insert(model, timeline);
        }

        self.mark_switched_out();
        self.timelines = timelines;
        self.substrate = Some(substrate);

        info!(
            "Incorporated processor: {} active cores, {} isolated timelines",
            self.num_cores(),
            accelerated.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CoreModel;
    use hetproc_env::{RecordingSubstrate, SubstrateError};
    use proptest::prelude::*;

    fn core(slot: usize, model: u32, descriptor: CoreModel) -> CoreHandle {
        CoreHandle::new(slot, Isa::X86, ModelId(model), descriptor)
    }

    /// {"base": [A0, A1], "alt": [B0, B1]}, A accelerated, B atomic.
    fn base_alt() -> SwitchableProcessor<RecordingSubstrate> {
        let base = ConfigurationSet::new(
            "base",
            vec![core(0, 0, CoreModel::big_kvm()), core(1, 1, CoreModel::big_kvm())],
        )
        .unwrap();
        let alt = ConfigurationSet::new(
            "alt",
            vec![core(0, 2, CoreModel::dummy()), core(1, 3, CoreModel::dummy())],
        )
        .unwrap();
        SwitchableProcessor::new(vec![base, alt], "base").unwrap()
    }

    fn flags(processor: &SwitchableProcessor<RecordingSubstrate>) -> Vec<(ModelId, bool)> {
        processor
            .all_cores()
            .map(|core| (core.model(), core.is_switched_out()))
            .collect()
    }

    fn active_models(processor: &SwitchableProcessor<RecordingSubstrate>) -> Vec<ModelId> {
        processor.cores().iter().map(|core| core.model()).collect()
    }

    #[test]
    fn test_unknown_starting_configuration() {
        let base = ConfigurationSet::new("base", vec![core(0, 0, CoreModel::dummy())]).unwrap();
        let result = SwitchableProcessor::<RecordingSubstrate>::new(vec![base], "missing");
        assert!(matches!(
            result,
            Err(ProcessorError::UnknownStartingConfiguration(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_slot_count_mismatch() {
        let base = ConfigurationSet::new(
            "base",
            vec![core(0, 0, CoreModel::dummy()), core(1, 1, CoreModel::dummy())],
        )
        .unwrap();
        let alt = ConfigurationSet::new("alt", vec![core(0, 2, CoreModel::dummy())]).unwrap();

        let result = SwitchableProcessor::<RecordingSubstrate>::new(vec![base, alt], "base");
        assert!(matches!(
            result,
            Err(ProcessorError::SlotCountMismatch { expected: 2, found: 1, .. })
        ));
    }

    #[test]
    fn test_slot_layout_mismatch() {
        let base = ConfigurationSet::new("base", vec![core(0, 0, CoreModel::dummy())]).unwrap();
        let alt = ConfigurationSet::new("alt", vec![core(5, 1, CoreModel::dummy())]).unwrap();

        let result = SwitchableProcessor::<RecordingSubstrate>::new(vec![base, alt], "base");
        assert!(matches!(result, Err(ProcessorError::SlotLayoutMismatch { .. })));
    }

    #[test]
    fn test_heterogeneous_isa_rejected_across_all_configurations() {
        let base = ConfigurationSet::new("base", vec![core(0, 0, CoreModel::dummy())]).unwrap();
        let alt = ConfigurationSet::new(
            "alt",
            vec![CoreHandle::new(0, Isa::Arm, ModelId(1), CoreModel::dummy())],
        )
        .unwrap();

        let result = SwitchableProcessor::<RecordingSubstrate>::new(vec![base, alt], "base");
        assert!(matches!(
            result,
            Err(ProcessorError::HeterogeneousIsa { isas }) if isas == vec![Isa::X86, Isa::Arm]
        ));
    }

    #[test]
    fn test_duplicate_names_and_models() {
        let a = ConfigurationSet::new("a", vec![core(0, 0, CoreModel::dummy())]).unwrap();
        let a_again = ConfigurationSet::new("a", vec![core(0, 1, CoreModel::dummy())]).unwrap();
        assert!(matches!(
            SwitchableProcessor::<RecordingSubstrate>::new(vec![a.clone(), a_again], "a"),
            Err(ProcessorError::DuplicateConfiguration(_))
        ));

        let shares_model = ConfigurationSet::new("b", vec![core(0, 0, CoreModel::dummy())]).unwrap();
        assert!(matches!(
            SwitchableProcessor::<RecordingSubstrate>::new(vec![a, shares_model], "a"),
            Err(ProcessorError::DuplicateModel(ModelId(0)))
        ));
    }

    #[test]
    fn test_every_configuration_has_active_length() {
        let processor = base_alt();
        for name in processor.configuration_names() {
            assert_eq!(processor.configuration(name).unwrap().len(), processor.num_cores());
        }
        assert_eq!(processor.isa(), Isa::X86);
    }

    #[test]
    fn test_base_alt_scenario() {
        let mut processor = base_alt();
        let substrate = RecordingSubstrate::shared();
        processor.incorporate(substrate.clone()).unwrap();

        assert_eq!(active_models(&processor), vec![ModelId(0), ModelId(1)]);
        assert!(processor.cores().iter().all(|core| !core.is_switched_out()));
        let alt = processor.configuration("alt").unwrap();
        assert!(alt.slots().iter().all(|core| core.is_switched_out()));

        processor.switch_to("alt").unwrap();

        assert_eq!(active_models(&processor), vec![ModelId(2), ModelId(3)]);
        assert_eq!(processor.active_name(), "alt");
        assert_eq!(
            substrate.calls().swaps,
            vec![vec![(ModelId(0), ModelId(2)), (ModelId(1), ModelId(3))]]
        );
    }

    #[test]
    fn test_incorporation_assigns_isolated_timelines() {
        let mut processor = base_alt();
        let substrate = RecordingSubstrate::shared();
        processor.incorporate(substrate.clone()).unwrap();

        let calls = substrate.calls();
        assert_eq!(calls.host_acceleration_requests, 1);
        assert_eq!(
            calls.timelines,
            vec![(ModelId(0), TimelineIndex(1)), (ModelId(1), TimelineIndex(2))]
        );
        assert_eq!(processor.timeline_of(ModelId(0)), Some(TimelineIndex(1)));
        assert_eq!(processor.timeline_of(ModelId(1)), Some(TimelineIndex(2)));
        assert_eq!(processor.timeline_of(ModelId(2)), Some(TimelineIndex::DEFAULT));
        assert_eq!(processor.timeline_of(ModelId(3)), Some(TimelineIndex::DEFAULT));
    }

    #[test]
    fn test_failed_incorporation_can_be_retried() {
        let mut processor = base_alt();
        let substrate = RecordingSubstrate::shared();
        let busy = SubstrateError::TimelineInUse {
            timeline: TimelineIndex(1),
            owner: ModelId(7),
        };
        substrate.fail_next_timeline(busy.clone());

        assert_eq!(
            processor.incorporate(substrate.clone()),
            Err(ProcessorError::Substrate(busy))
        );
        assert!(!processor.is_incorporated());
        assert_eq!(processor.timeline_of(ModelId(0)), None);
        assert_eq!(processor.switch_to("alt"), Err(ProcessorError::NotIncorporated));

        processor.incorporate(substrate.clone()).unwrap();
        assert!(processor.is_incorporated());
        assert_eq!(
            substrate.calls().timelines,
            vec![(ModelId(0), TimelineIndex(1)), (ModelId(1), TimelineIndex(2))]
        );
        processor.switch_to("alt").unwrap();
        assert_eq!(processor.active_name(), "alt");
    }

    #[test]
    fn test_timelines_cover_inactive_configurations() {
        let base = ConfigurationSet::new("base", vec![core(0, 0, CoreModel::dummy())]).unwrap();
        let fast = ConfigurationSet::new("fast", vec![core(0, 1, CoreModel::speed_demon())]).unwrap();
        let faster = ConfigurationSet::new("faster", vec![core(0, 2, CoreModel::fp_kvm())]).unwrap();
        let mut processor = SwitchableProcessor::new(vec![base, fast, faster], "base").unwrap();

        processor.incorporate(RecordingSubstrate::shared()).unwrap();

        let isolated: BTreeSet<TimelineIndex> = processor
            .all_cores()
            .filter(|core| core.is_accelerated())
            .filter_map(|core| processor.timeline_of(core.model()))
            .collect();
        assert_eq!(isolated.len(), 2);
        assert!(!isolated.contains(&TimelineIndex::DEFAULT));
    }

    #[test]
    fn test_no_host_acceleration_without_accelerated_cores() {
        let base = ConfigurationSet::new("base", vec![core(0, 0, CoreModel::dummy())]).unwrap();
        let o3 = ConfigurationSet::new("o3", vec![core(0, 1, CoreModel::big_o3())]).unwrap();
        let mut processor = SwitchableProcessor::new(vec![base, o3], "base").unwrap();
        let substrate = RecordingSubstrate::shared();

        processor.incorporate(substrate.clone()).unwrap();

        assert_eq!(substrate.calls().host_acceleration_requests, 0);
        assert!(substrate.calls().timelines.is_empty());
    }

    #[test]
    fn test_incorporate_twice_rejected() {
        let mut processor = base_alt();
        processor.incorporate(RecordingSubstrate::shared()).unwrap();
        assert_eq!(
            processor.incorporate(RecordingSubstrate::shared()),
            Err(ProcessorError::AlreadyIncorporated)
        );
    }

    #[test]
    fn test_switch_before_incorporation() {
        let mut processor = base_alt();
        assert_eq!(processor.switch_to("alt"), Err(ProcessorError::NotIncorporated));
        assert_eq!(processor.active_name(), "base");
    }

    #[test]
    fn test_switch_to_active_or_unknown_leaves_state() {
        let mut processor = base_alt();
        let substrate = RecordingSubstrate::shared();
        processor.incorporate(substrate.clone()).unwrap();
        let before = flags(&processor);

        assert_eq!(
            processor.switch_to("base"),
            Err(ProcessorError::AlreadyActive("base".into()))
        );
        assert_eq!(
            processor.switch_to("turbo"),
            Err(ProcessorError::UnknownConfiguration("turbo".into()))
        );

        assert_eq!(processor.active_name(), "base");
        assert_eq!(flags(&processor), before);
        assert_eq!(substrate.swap_count(), 0);
    }

    #[test]
    fn test_single_configuration_cannot_switch() {
        let base = ConfigurationSet::new("base", vec![core(0, 0, CoreModel::big_kvm())]).unwrap();
        let mut processor = SwitchableProcessor::new(vec![base], "base").unwrap();
        processor.incorporate(RecordingSubstrate::shared()).unwrap();

        assert!(processor.switch_to("base").is_err());
        assert!(processor.switch_to("alt").is_err());
        assert_eq!(processor.active_name(), "base");
    }

    #[test]
    fn test_substrate_failure_propagated_unchanged() {
        let mut processor = base_alt();
        let substrate = RecordingSubstrate::shared();
        processor.incorporate(substrate.clone()).unwrap();
        let before = flags(&processor);

        substrate.fail_next_swap("cores did not drain");
        let err = processor.switch_to("alt").unwrap_err();

        assert_eq!(
            err,
            ProcessorError::Substrate(SubstrateError::swap_failed("cores did not drain"))
        );
        assert_eq!(err.to_string(), "Swap failed: cores did not drain");
        assert_eq!(processor.active_name(), "base");
        assert_eq!(flags(&processor), before);

        // Bookkeeping is intact, so a retry goes through
        processor.switch_to("alt").unwrap();
        assert_eq!(processor.active_name(), "alt");
    }

    #[test]
    fn test_round_trip_restores_flags() {
        let mut processor = base_alt();
        processor.incorporate(RecordingSubstrate::shared()).unwrap();
        let original = flags(&processor);

        processor.switch_to("alt").unwrap();
        assert_ne!(flags(&processor), original);
        processor.switch_to("base").unwrap();

        assert_eq!(processor.active_name(), "base");
        assert_eq!(flags(&processor), original);
    }

    fn three_way() -> SwitchableProcessor<RecordingSubstrate> {
        let sets = ["warmup", "detailed", "fast"]
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let base = (i * 2) as u32;
                ConfigurationSet::new(
                    *name,
                    vec![
                        core(0, base, CoreModel::small_kvm()),
                        core(1, base + 1, CoreModel::big_o3()),
                    ],
                )
                .unwrap()
            })
            .collect();
        SwitchableProcessor::new(sets, "warmup").unwrap()
    }

    proptest! {
        #[test]
        fn prop_switch_sequences_keep_flags_consistent(targets in proptest::collection::vec(0usize..3, 0..24)) {
            let names = ["warmup", "detailed", "fast"];
            let mut processor = three_way();
            let substrate = RecordingSubstrate::shared();
            processor.incorporate(substrate.clone()).unwrap();

            let mut expected_swaps = 0;
            for target in targets {
                let name = names[target];
                let was_active = processor.active_name() == name;
                let result = processor.switch_to(name);
                prop_assert_eq!(result.is_err(), was_active);
                if !was_active {
                    expected_swaps += 1;
                }

                prop_assert_eq!(processor.active_name(), name);
                for core in processor.all_cores() {
                    let in_active = processor.active_configuration().contains_model(core.model());
                    prop_assert_eq!(core.is_switched_out(), !in_active);
                }
            }
            prop_assert_eq!(substrate.swap_count(), expected_swaps);
        }

        #[test]
        fn prop_x_y_x_restores_original(first in 0usize..3, second in 0usize..3) {
            prop_assume!(first != second);
            let names = ["warmup", "detailed", "fast"];
            let mut processor = three_way();
            processor.incorporate(RecordingSubstrate::shared()).unwrap();
            if names[first] != "warmup" {
                processor.switch_to(names[first]).unwrap();
            }
            let snapshot = flags(&processor);

            processor.switch_to(names[second]).unwrap();
            processor.switch_to(names[first]).unwrap();

            prop_assert_eq!(processor.active_name(), names[first]);
            prop_assert_eq!(flags(&processor), snapshot);
        }
    }
}
