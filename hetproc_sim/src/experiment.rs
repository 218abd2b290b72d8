//! Board presets built from accelerated/atomic core pairs.

use crate::config::{SimConfig, Workload};
use crate::driver::{toggle_on_exit, Simulator};
use crate::error::SimError;
use crate::exporter::RunReport;
use crate::substrate::SimSubstrate;
use hetproc_core::{CoreModel, CorePairProcessor};
use hetproc_env::ExitTrigger;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Core mix of a board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoreCounts {
    pub big: usize,
    pub small: usize,
    pub int: usize,
    pub fp: usize,
    pub super_slow: usize,
    pub speed_demon: usize,
}

impl CoreCounts {
    pub fn total(&self) -> usize {
        self.big + self.small + self.int + self.fp + self.super_slow + self.speed_demon
    }
}

/// System presets, numbered as in the `SYSTEM_CONFIG` environment variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemConfig {
    /// 0: four big cores
    Homogeneous,

    /// 1: two big cores, four small cores
    BigLittle,

    /// 2: integer and floating-point accelerators only
    IntAndAccel,

    /// 3: one of everything, mostly
    HighHet,

    /// 4: four floating-point cores
    OnlyFloat,

    /// -1: debug preset with very slow cores
    SuperSlow,

    /// -2: debug preset with very fast cores
    SpeedDemon,
}

impl SystemConfig {
    pub fn all() -> Vec<SystemConfig> {
        vec![
            SystemConfig::Homogeneous,
            SystemConfig::BigLittle,
            SystemConfig::IntAndAccel,
            SystemConfig::HighHet,
            SystemConfig::OnlyFloat,
            SystemConfig::SuperSlow,
            SystemConfig::SpeedDemon,
        ]
    }

    pub fn code(&self) -> i32 {
        match self {
            SystemConfig::Homogeneous => 0,
            SystemConfig::BigLittle => 1,
            SystemConfig::IntAndAccel => 2,
            SystemConfig::HighHet => 3,
            SystemConfig::OnlyFloat => 4,
            SystemConfig::SuperSlow => -1,
            SystemConfig::SpeedDemon => -2,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::all().into_iter().find(|system| system.code() == code)
    }

    pub fn name(&self) -> &'static str {
        match self {
            SystemConfig::Homogeneous => "homogeneous",
            SystemConfig::BigLittle => "big_little",
            SystemConfig::IntAndAccel => "int_and_accel",
            SystemConfig::HighHet => "high_het",
            SystemConfig::OnlyFloat => "only_float",
            SystemConfig::SuperSlow => "super_slow",
            SystemConfig::SpeedDemon => "speed_demon",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SystemConfig::Homogeneous => "4 big cores",
            SystemConfig::BigLittle => "2 big cores, 4 small cores",
            SystemConfig::IntAndAccel => "2 integer cores, 2 floating-point cores",
            SystemConfig::HighHet => "1 big, 2 small, 2 integer, 2 floating-point cores",
            SystemConfig::OnlyFloat => "4 floating-point cores",
            SystemConfig::SuperSlow => "4 cores at a tenth of host speed",
            SystemConfig::SpeedDemon => "4 cores at twice host speed",
        }
    }

    /// Debug presets exist to exercise timing extremes.
    pub fn is_debug(&self) -> bool {
        self.code() < 0
    }

    pub fn core_counts(&self) -> CoreCounts {
        match self {
            SystemConfig::Homogeneous => CoreCounts {
                big: 4,
                ..Default::default()
            },
            SystemConfig::BigLittle => CoreCounts {
                big: 2,
                small: 4,
                ..Default::default()
            },
            SystemConfig::IntAndAccel => CoreCounts {
                int: 2,
                fp: 2,
                ..Default::default()
            },
            SystemConfig::HighHet => CoreCounts {
                big: 1,
                small: 2,
                int: 2,
                fp: 2,
                ..Default::default()
            },
            SystemConfig::OnlyFloat => CoreCounts {
                fp: 4,
                ..Default::default()
            },
            SystemConfig::SuperSlow => CoreCounts {
                super_slow: 4,
                ..Default::default()
            },
            SystemConfig::SpeedDemon => CoreCounts {
                speed_demon: 4,
                ..Default::default()
            },
        }
    }

    /// `(start model, switch model, count)` triples; every start model is
    /// host accelerated and switches to the atomic dummy.
    pub fn core_types(&self) -> Vec<(CoreModel, CoreModel, usize)> {
        let counts = self.core_counts();
        [
            (CoreModel::big_kvm(), counts.big),
            (CoreModel::small_kvm(), counts.small),
            (CoreModel::int_kvm(), counts.int),
            (CoreModel::fp_kvm(), counts.fp),
            (CoreModel::super_slow(), counts.super_slow),
            (CoreModel::speed_demon(), counts.speed_demon),
        ]
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(model, count)| (model, CoreModel::dummy(), count))
        .collect()
    }
}

impl fmt::Display for SystemConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

impl FromStr for SystemConfig {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(code) = s.parse::<i32>() {
            return Self::from_code(code).ok_or_else(|| format!("Unknown system config: {}", code));
        }
        match s.to_lowercase().replace('-', "_").as_str() {
            "homogeneous" => Ok(SystemConfig::Homogeneous),
            "big_little" | "biglittle" => Ok(SystemConfig::BigLittle),
            "int_and_accel" => Ok(SystemConfig::IntAndAccel),
            "high_het" | "highhet" => Ok(SystemConfig::HighHet),
            "only_float" => Ok(SystemConfig::OnlyFloat),
            "super_slow" => Ok(SystemConfig::SuperSlow),
            "speed_demon" => Ok(SystemConfig::SpeedDemon),
            _ => Err(format!("Unknown system config: {}", s)),
        }
    }
}

/// A preset board running one workload.
pub struct Experiment {
    system: SystemConfig,
    simulator: Simulator<CorePairProcessor<SimSubstrate>>,
}

impl Experiment {
    /// Instantiates every core of `system` on a fresh substrate and wires
    /// exit events to `config.switches` processor toggles.
    pub fn build(system: SystemConfig, workload: Workload, config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;
        workload.validate()?;

        let substrate = Arc::new(SimSubstrate::new(config.seed).with_ruby(config.ruby));
        let processor = CorePairProcessor::from_core_types(&system.core_types(), config.isa, |model, _| {
            substrate.instantiate(model)
        })?;

        let handler = toggle_on_exit(config.switches);
        let simulator =
            Simulator::new(processor, substrate, workload, config).with_exit_trigger(ExitTrigger::Exit, handler);
        Ok(Self { system, simulator })
    }

    pub fn system(&self) -> SystemConfig {
        self.system
    }

    pub fn simulator(&self) -> &Simulator<CorePairProcessor<SimSubstrate>> {
        &self.simulator
    }

    pub fn run(&mut self) -> Result<RunReport, SimError> {
        let mut report = self.simulator.run()?;
        report.system = Some(self.system.name().to_string());
        Ok(report)
    }
}
