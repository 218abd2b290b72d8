//! Run configuration and workload description.

use crate::error::SimError;
use hetproc_env::{ExitTrigger, Isa};

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Ticks simulated between checks for exit events
    pub quantum_ticks: u64,

    /// Global tick at which the run is cut off
    pub max_ticks: u64,

    /// Whether the board uses a Ruby cache hierarchy
    pub ruby: bool,

    /// ISA of every core on the board
    pub isa: Isa,

    /// Number of exit events that switch the processor before one ends the run
    pub switches: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            quantum_ticks: 10_000,
            max_ticks: 1_000_000_000,
            ruby: true,
            isa: Isa::X86,
            switches: 0,
        }
    }
}

impl SimConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_quantum(mut self, ticks: u64) -> Self {
        self.quantum_ticks = ticks;
        self
    }

    pub fn with_max_ticks(mut self, ticks: u64) -> Self {
        self.max_ticks = ticks;
        self
    }

    pub fn with_ruby(mut self, ruby: bool) -> Self {
        self.ruby = ruby;
        self
    }

    pub fn with_isa(mut self, isa: Isa) -> Self {
        self.isa = isa;
        self
    }

    pub fn with_switches(mut self, switches: usize) -> Self {
        self.switches = switches;
        self
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if self.quantum_ticks == 0 {
            return Err(SimError::config("quantum must be at least one tick"));
        }
        if self.max_ticks < self.quantum_ticks {
            return Err(SimError::config(format!(
                "max ticks {} is shorter than one quantum ({})",
                self.max_ticks, self.quantum_ticks
            )));
        }
        Ok(())
    }
}

/// Guest program run on the board.
///
/// `exit_points` are retired-instruction counts at which the guest raises an
/// exit event (the equivalent of `m5 exit` calls in the benchmark script).
/// Finishing the workload raises one more. `markers` are the guest's other
/// annotations: region-of-interest boundaries and checkpoint requests.
#[derive(Debug, Clone, PartialEq)]
pub struct Workload {
    pub name: String,
    pub instructions: u64,
    pub fp_fraction: f64,
    pub exit_points: Vec<u64>,
    pub markers: Vec<(u64, ExitTrigger)>,
}

impl Workload {
    pub fn new(name: impl Into<String>, instructions: u64) -> Self {
        Self {
            name: name.into(),
            instructions,
            fp_fraction: 0.2,
            exit_points: Vec::new(),
            markers: Vec::new(),
        }
    }

    pub fn with_fp_fraction(mut self, fp_fraction: f64) -> Self {
        self.fp_fraction = fp_fraction;
        self
    }

    pub fn with_exit_point(mut self, instructions: u64) -> Self {
        self.exit_points.push(instructions);
        self.exit_points.sort_unstable();
        self
    }

    pub fn with_work_begin(self, instructions: u64) -> Self {
        self.with_marker(ExitTrigger::WorkBegin, instructions)
    }

    pub fn with_work_end(self, instructions: u64) -> Self {
        self.with_marker(ExitTrigger::WorkEnd, instructions)
    }

    pub fn with_checkpoint(self, instructions: u64) -> Self {
        self.with_marker(ExitTrigger::Checkpoint, instructions)
    }

    fn with_marker(mut self, trigger: ExitTrigger, instructions: u64) -> Self {
        self.markers.push((instructions, trigger));
        self.markers.sort_by_key(|&(at, _)| at);
        self
    }

    /// Every guest-raised event in retirement order. At equal counts,
    /// markers come before exits.
    pub fn schedule(&self) -> Vec<(u64, ExitTrigger)> {
        let mut events = self.markers.clone();
        events.extend(self.exit_points.iter().map(|&at| (at, ExitTrigger::Exit)));
        events.sort_by_key(|&(at, _)| at);
        events
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if self.instructions == 0 {
            return Err(SimError::config(format!("workload '{}' is empty", self.name)));
        }
        if !(0.0..=1.0).contains(&self.fp_fraction) {
            return Err(SimError::config(format!(
                "floating-point fraction {} is outside [0, 1]",
                self.fp_fraction
            )));
        }
        if let Some((point, trigger)) = self.schedule().into_iter().find(|&(p, _)| p >= self.instructions) {
            return Err(SimError::config(format!(
                "{} point {} is past the end of workload '{}'",
                trigger, point, self.name
            )));
        }
        Ok(())
    }
}
