//! Run driver: advances the substrate and dispatches exit events.

use crate::config::{SimConfig, Workload};
use crate::error::SimError;
use crate::exporter::{CoreReport, ExitReason, ExitRecord, RunReport};
use crate::substrate::SimSubstrate;
use hetproc_core::{CorePairProcessor, Processor, SwitchableProcessor};
use hetproc_env::{ExitTrigger, ModelId, Substrate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the driver does after an exit handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitAction {
    Continue,
    Stop,
}

/// Callback invoked when an exit trigger fires.
pub type ExitHandler<P> = Box<dyn FnMut(&mut P) -> Result<ExitAction, SimError>>;

fn default_action(trigger: ExitTrigger) -> ExitAction {
    match trigger {
        ExitTrigger::Exit | ExitTrigger::MaxTick => ExitAction::Stop,
        _ => ExitAction::Continue,
    }
}

/// Handler that toggles a two-configuration processor on each of the first
/// `switches` firings and stops the run on the next one.
pub fn toggle_on_exit<S: Substrate>(switches: usize) -> ExitHandler<CorePairProcessor<S>> {
    if switches == 0 {
        warn!("No processor switch is scheduled; the first exit event ends the run");
    }
    let mut remaining = switches;
    Box::new(move |processor| {
        if remaining == 0 {
            return Ok(ExitAction::Stop);
        }
        remaining -= 1;
        processor.toggle()?;
        Ok(ExitAction::Continue)
    })
}

/// Handler that switches through `names` in order, one per firing, and
/// stops the run once they are exhausted.
pub fn switch_sequence<S: Substrate>(names: Vec<String>) -> ExitHandler<SwitchableProcessor<S>> {
    let mut pending = names.into_iter();
    Box::new(move |processor| match pending.next() {
        Some(name) => {
            processor.switch_to(&name)?;
            Ok(ExitAction::Continue)
        }
        None => Ok(ExitAction::Stop),
    })
}

/// Drives a processor on a [`SimSubstrate`] until an exit event stops it.
pub struct Simulator<P: Processor<Substrate = SimSubstrate>> {
    processor: P,
    substrate: Arc<SimSubstrate>,
    workload: Workload,
    config: SimConfig,
    handlers: HashMap<ExitTrigger, ExitHandler<P>>,
    events: Vec<ExitRecord>,
}

impl<P: Processor<Substrate = SimSubstrate>> Simulator<P> {
    pub fn new(processor: P, substrate: Arc<SimSubstrate>, workload: Workload, config: SimConfig) -> Self {
        Self {
            processor,
            substrate,
            workload,
            config,
            handlers: HashMap::new(),
            events: Vec::new(),
        }
    }

    /// Installs `handler` for `trigger`, replacing any previous one.
    pub fn register_exit_trigger(&mut self, trigger: ExitTrigger, handler: ExitHandler<P>) {
        self.handlers.insert(trigger, handler);
    }

    pub fn with_exit_trigger(mut self, trigger: ExitTrigger, handler: ExitHandler<P>) -> Self {
        self.register_exit_trigger(trigger, handler);
        self
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    pub fn substrate(&self) -> &Arc<SimSubstrate> {
        &self.substrate
    }

    pub fn workload(&self) -> &Workload {
        &self.workload
    }

    /// Incorporates the processor, boots it and runs until stopped.
    ///
    /// Guest events from the workload schedule fire in retirement order; a
    /// handler returning `Stop` for any of them ends the run. `MaxTick`
    /// always ends the run; its handler only observes it.
    pub fn run(&mut self) -> Result<RunReport, SimError> {
        self.config.validate()?;
        self.workload.validate()?;

        self.processor.incorporate(Arc::clone(&self.substrate))?;
        let active: Vec<ModelId> = self.processor.cores().iter().map(|core| core.model()).collect();
        self.substrate.boot(&active)?;
        info!(
            "Running '{}' on {} cores (seed={})",
            self.workload.name,
            active.len(),
            self.config.seed
        );

        let schedule = self.workload.schedule();
        let mut next_event = 0;
        let reason = 'run: loop {
            if self.substrate.tick() >= self.config.max_ticks {
                self.fire(ExitTrigger::MaxTick)?;
                break ExitReason::MaxTick;
            }

            let stats = self
                .substrate
                .run_quantum(self.config.quantum_ticks, self.workload.fp_fraction);
            let retired = self.substrate.total_instructions();
            debug!(
                "tick={} retired={} (+{})",
                stats.global_tick, retired, stats.instructions
            );

            while let Some(&(at, trigger)) = schedule.get(next_event) {
                if retired < at {
                    break;
                }
                next_event += 1;
                if self.fire(trigger)? == ExitAction::Stop {
                    break 'run ExitReason::Exit;
                }
            }

            if retired >= self.workload.instructions {
                break match self.fire(ExitTrigger::Exit)? {
                    ExitAction::Stop => ExitReason::Exit,
                    ExitAction::Continue => ExitReason::WorkloadComplete,
                };
            }
        };

        let report = self.report(reason);
        info!(
            "Run ended at tick {} ({:?}): {} instructions, {} swaps",
            report.final_tick, reason, report.instructions, report.swaps
        );
        Ok(report)
    }

    fn fire(&mut self, trigger: ExitTrigger) -> Result<ExitAction, SimError> {
        let tick = self.substrate.synchronize();
        let action = match self.handlers.get_mut(&trigger) {
            Some(handler) => handler(&mut self.processor)?,
            None => default_action(trigger),
        };

        info!("{} at tick {}: {:?}", trigger, tick, action);
        self.events.push(ExitRecord {
            tick,
            trigger,
            action,
            instructions: self.substrate.total_instructions(),
            active_cores: self
                .processor
                .cores()
                .iter()
                .map(|core| core.name().to_string())
                .collect(),
        });
        Ok(action)
    }

    fn report(&self, exit_reason: ExitReason) -> RunReport {
        let cores = self
            .processor
            .cores()
            .iter()
            .map(|core| CoreReport {
                slot: core.slot_id(),
                name: core.name().to_string(),
                model: core.model(),
                accelerated: core.is_accelerated(),
                timeline: self.substrate.timeline_of(core.model()),
            })
            .collect();

        RunReport {
            system: None,
            workload: self.workload.name.clone(),
            seed: self.config.seed,
            exit_reason,
            final_tick: self.substrate.tick(),
            instructions: self.substrate.total_instructions(),
            swaps: self.substrate.swap_count(),
            mem_mode: self.substrate.mem_mode(),
            host_acceleration: self.substrate.host_acceleration_enabled(),
            events: self.events.clone(),
            cores,
            objects: self.substrate.objects(),
        }
    }
}
