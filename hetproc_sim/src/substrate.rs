//! Simulated kernel implementing `Substrate` for deterministic runs.

use hetproc_core::CoreModel;
use hetproc_env::{MemMode, ModelId, Substrate, SubstrateError, TimelineIndex};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Sub-objects every core object owns. They follow the core onto its timeline.
const CORE_CHILDREN: [&str; 4] = ["isa", "mmu", "interrupts", "tracer"];

/// x86 reset vector.
const RESET_PC: u64 = 0xFFFF_FFF0;

/// Floor for ticks-per-instruction so free instruction classes stay finite.
const MIN_TICKS_PER_INSTRUCTION: f64 = 0.01;

/// Architectural state of one logical core. Moves with the slot on a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchState {
    pub pc: u64,
    pub instructions: u64,
}

impl Default for ArchState {
    fn default() -> Self {
        Self {
            pc: RESET_PC,
            instructions: 0,
        }
    }
}

/// Snapshot of one simulated core object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSummary {
    pub model: ModelId,
    pub path: String,
    pub timeline: TimelineIndex,
    pub running: bool,
    /// Instructions retired while this object was the one executing
    pub instructions: u64,
}

/// Result of one quantum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuantumStats {
    /// Instructions retired across all running models
    pub instructions: u64,

    /// Global timeline tick after the quantum
    pub global_tick: u64,
}

struct SimObject {
    path: String,
    descriptor: CoreModel,
    timeline: TimelineIndex,
    children: Vec<(String, TimelineIndex)>,
    /// Present while the object is executing
    arch: Option<ArchState>,
    retired: u64,
}

struct KernelState {
    objects: BTreeMap<ModelId, SimObject>,
    timelines: BTreeMap<TimelineIndex, u64>,
    next_id: u32,
    booted: bool,
    host_acceleration: bool,
    mem_mode: MemMode,
    swaps: u64,
    pending_failure: Option<String>,
    rng: ChaCha8Rng,
}

impl KernelState {
    fn new(seed: u64) -> Self {
        let mut timelines = BTreeMap::new();
        timelines.insert(TimelineIndex::DEFAULT, 0);
        Self {
            objects: BTreeMap::new(),
            timelines,
            next_id: 0,
            booted: false,
            host_acceleration: false,
            mem_mode: MemMode::Timing,
            swaps: 0,
            pending_failure: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    fn global_tick(&self) -> u64 {
        self.timelines.get(&TimelineIndex::DEFAULT).copied().unwrap_or(0)
    }

    /// Brings every timeline up to the furthest one and returns that tick.
    fn synchronize(&mut self) -> u64 {
        let horizon = self.timelines.values().copied().max().unwrap_or(0);
        for tick in self.timelines.values_mut() {
            *tick = horizon;
        }
        horizon
    }

    fn bind_timeline(&mut self, model: ModelId, timeline: TimelineIndex) -> Result<(), SubstrateError> {
        if !self.objects.contains_key(&model) {
            return Err(SubstrateError::UnknownModel(model));
        }
        if !timeline.is_default() {
            if let Some((owner, _)) = self
                .objects
                .iter()
                .find(|(id, object)| **id != model && object.timeline == timeline)
            {
                return Err(SubstrateError::TimelineInUse {
                    timeline,
                    owner: *owner,
                });
            }
        }

        let start = self.global_tick();
        self.timelines.entry(timeline).or_insert(start);
        if let Some(object) = self.objects.get_mut(&model) {
            object.timeline = timeline;
            for (_, child) in &mut object.children {
                *child = timeline;
            }
        }
        Ok(())
    }

    fn validate_swap(&self, pairs: &[(ModelId, ModelId)]) -> Result<(), SubstrateError> {
        let mut seen = HashSet::new();
        for &(outgoing, incoming) in pairs {
            for model in [outgoing, incoming] {
                if !seen.insert(model) {
                    return Err(SubstrateError::DuplicateModel(model));
                }
            }

            let out = self
                .objects
                .get(&outgoing)
                .ok_or(SubstrateError::UnknownModel(outgoing))?;
            if out.arch.is_none() {
                return Err(SubstrateError::NotRunning(outgoing));
            }

            let inc = self
                .objects
                .get(&incoming)
                .ok_or(SubstrateError::UnknownModel(incoming))?;
            if inc.arch.is_some() {
                return Err(SubstrateError::AlreadyRunning(incoming));
            }
        }
        Ok(())
    }

    fn swap(&mut self, pairs: &[(ModelId, ModelId)]) -> Result<(), SubstrateError> {
        if let Some(reason) = self.pending_failure.take() {
            return Err(SubstrateError::SwapFailed(reason));
        }
        if !self.booted {
            return Err(SubstrateError::NotBooted);
        }
        self.validate_swap(pairs)?;

        // Drain: nothing executes on any timeline while models change hands
        let tick = self.synchronize();
        for &(outgoing, incoming) in pairs {
            let arch = self.objects.get_mut(&outgoing).and_then(|object| object.arch.take());
            if let Some(object) = self.objects.get_mut(&incoming) {
                object.arch = arch;
            }
        }
        self.swaps += 1;

        debug!("Swapped {} models at tick {}", pairs.len(), tick);
        Ok(())
    }

    fn run_quantum(&mut self, ticks: u64, fp_fraction: f64) -> QuantumStats {
        let mut order: Vec<ModelId> = self
            .objects
            .iter()
            .filter(|(_, object)| object.arch.is_some())
            .map(|(id, _)| *id)
            .collect();
        // Host threads of accelerated models are not ordered against each other
        order.shuffle(&mut self.rng);

        let mut retired = 0;
        for model in order {
            let Some(object) = self.objects.get_mut(&model) else {
                continue;
            };

            let advance = if object.timeline.is_default() {
                ticks
            } else {
                ticks + self.rng.gen_range(0..=ticks / 16)
            };
            let tpi = object
                .descriptor
                .ticks_per_instruction(fp_fraction)
                .max(MIN_TICKS_PER_INSTRUCTION);
            let instructions = (advance as f64 / tpi) as u64;

            if let Some(arch) = object.arch.as_mut() {
                arch.instructions += instructions;
                arch.pc = arch.pc.wrapping_add(4 * instructions);
            }
            object.retired += instructions;
            retired += instructions;

            if !object.timeline.is_default() {
                *self.timelines.entry(object.timeline).or_insert(0) += advance;
            }
        }
        *self.timelines.entry(TimelineIndex::DEFAULT).or_insert(0) += ticks;

        QuantumStats {
            instructions: retired,
            global_tick: self.global_tick(),
        }
    }
}

/// Deterministic simulation kernel.
///
/// Core objects are registered with [`instantiate`](Self::instantiate),
/// started with [`boot`](Self::boot) and then advanced one quantum at a
/// time. All host-thread interleaving is drawn from a ChaCha8 RNG seeded
/// with the run seed, so a seed reproduces a run exactly.
pub struct SimSubstrate {
    seed: u64,
    ruby: bool,
    state: Mutex<KernelState>,
}

impl SimSubstrate {
    /// Creates a kernel with a classic cache hierarchy.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            ruby: false,
            state: Mutex::new(KernelState::new(seed)),
        }
    }

    /// Sets whether the board uses a Ruby cache hierarchy.
    pub fn with_ruby(mut self, ruby: bool) -> Self {
        self.ruby = ruby;
        self
    }

    /// Creates an Arc-wrapped kernel for sharing.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }

    /// Registers a core object (and its sub-objects) on the default timeline.
    pub fn instantiate(&self, descriptor: &CoreModel) -> ModelId {
        let mut state = self.state();
        let id = ModelId(state.next_id);
        state.next_id += 1;

        let object = SimObject {
            path: format!("board.cores.{}{}", descriptor.name, id.raw()),
            descriptor: descriptor.clone(),
            timeline: TimelineIndex::DEFAULT,
            children: CORE_CHILDREN
                .iter()
                .map(|child| (child.to_string(), TimelineIndex::DEFAULT))
                .collect(),
            arch: None,
            retired: 0,
        };
        state.objects.insert(id, object);
        id
    }

    /// Starts executing `active` from reset. Every other object stays switched out.
    ///
    /// A machine boots once; later changes to the running set go through swaps.
    pub fn boot(&self, active: &[ModelId]) -> Result<(), SubstrateError> {
        let mut state = self.state();
        if state.booted {
            return Err(SubstrateError::AlreadyBooted);
        }
        for model in active {
            match state.objects.get(model) {
                None => return Err(SubstrateError::UnknownModel(*model)),
                Some(object) if object.arch.is_some() => {
                    return Err(SubstrateError::AlreadyRunning(*model))
                }
                Some(_) => {}
            }
        }
        for model in active {
            if let Some(object) = state.objects.get_mut(model) {
                object.arch = Some(ArchState::default());
            }
        }
        state.booted = true;
        debug!("Booted {} cores", active.len());
        Ok(())
    }

    /// Runs every executing model for `ticks` of simulated time.
    ///
    /// Models on isolated timelines may overshoot by a seeded jitter; the
    /// global timeline advances by exactly `ticks`.
    pub fn run_quantum(&self, ticks: u64, fp_fraction: f64) -> QuantumStats {
        self.state().run_quantum(ticks, fp_fraction)
    }

    /// Serializes all timelines. Returns the common tick.
    pub fn synchronize(&self) -> u64 {
        self.state().synchronize()
    }

    /// Makes the next swap fail with `reason`.
    pub fn fail_next_swap(&self, reason: impl Into<String>) {
        self.state().pending_failure = Some(reason.into());
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Current tick of the global timeline.
    pub fn tick(&self) -> u64 {
        self.state().global_tick()
    }

    pub fn timeline_tick(&self, timeline: TimelineIndex) -> Option<u64> {
        self.state().timelines.get(&timeline).copied()
    }

    pub fn timeline_of(&self, model: ModelId) -> Option<TimelineIndex> {
        self.state().objects.get(&model).map(|object| object.timeline)
    }

    /// Timelines of the sub-objects owned by `model`.
    pub fn child_timelines(&self, model: ModelId) -> Vec<TimelineIndex> {
        self.state()
            .objects
            .get(&model)
            .map(|object| object.children.iter().map(|(_, timeline)| *timeline).collect())
            .unwrap_or_default()
    }

    pub fn is_running(&self, model: ModelId) -> bool {
        self.arch_state(model).is_some()
    }

    pub fn arch_state(&self, model: ModelId) -> Option<ArchState> {
        self.state().objects.get(&model).and_then(|object| object.arch)
    }

    /// Instructions retired by all logical cores since boot.
    pub fn total_instructions(&self) -> u64 {
        self.state()
            .objects
            .values()
            .filter_map(|object| object.arch)
            .map(|arch| arch.instructions)
            .sum()
    }

    pub fn swap_count(&self) -> u64 {
        self.state().swaps
    }

    pub fn host_acceleration_enabled(&self) -> bool {
        self.state().host_acceleration
    }

    pub fn mem_mode(&self) -> MemMode {
        self.state().mem_mode
    }

    pub fn objects(&self) -> Vec<ObjectSummary> {
        self.state()
            .objects
            .iter()
            .map(|(model, object)| ObjectSummary {
                model: *model,
                path: object.path.clone(),
                timeline: object.timeline,
                running: object.arch.is_some(),
                instructions: object.retired,
            })
            .collect()
    }

    fn state(&self) -> MutexGuard<'_, KernelState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Substrate for SimSubstrate {
    fn perform_atomic_swap(&self, pairs: &[(ModelId, ModelId)]) -> Result<(), SubstrateError> {
        self.state().swap(pairs)
    }

    fn assign_timeline(
        &self,
        model: ModelId,
        timeline: TimelineIndex,
    ) -> Result<(), SubstrateError> {
        self.state().bind_timeline(model, timeline)
    }

    fn enable_host_acceleration(&self) -> Result<(), SubstrateError> {
        let mut state = self.state();
        if !state.host_acceleration {
            state.host_acceleration = true;
            debug!("Created host-acceleration VM");
        }
        Ok(())
    }

    fn uses_ruby(&self) -> bool {
        self.ruby
    }

    fn set_mem_mode(&self, mode: MemMode) {
        self.state().mem_mode = mode;
    }
}
