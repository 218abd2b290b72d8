//! JSON run reports.

use crate::driver::ExitAction;
use crate::substrate::ObjectSummary;
use hetproc_env::{ExitTrigger, MemMode, ModelId, TimelineIndex};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// An exit handler (or the default policy) asked to stop
    Exit,
    MaxTick,
    /// The guest retired every instruction
    WorkloadComplete,
}

/// One exit event delivered to the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitRecord {
    pub tick: u64,
    pub trigger: ExitTrigger,
    pub action: ExitAction,
    pub instructions: u64,

    /// Names of the cores active after the handler ran
    pub active_cores: Vec<String>,
}

/// A core active when the run ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreReport {
    pub slot: usize,
    pub name: String,
    pub model: ModelId,
    pub accelerated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline: Option<TimelineIndex>,
}

/// Complete record of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// System preset, when the run was built from one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    pub workload: String,
    pub seed: u64,
    pub exit_reason: ExitReason,
    pub final_tick: u64,
    pub instructions: u64,
    pub swaps: u64,
    pub mem_mode: MemMode,
    pub host_acceleration: bool,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<ExitRecord>,

    pub cores: Vec<CoreReport>,
    pub objects: Vec<ObjectSummary>,
}

impl RunReport {
    /// Number of exit events that led to a switch.
    pub fn switches(&self) -> usize {
        self.events
            .iter()
            .filter(|event| event.trigger == ExitTrigger::Exit && event.action == ExitAction::Continue)
            .count()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = self.to_json()?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
