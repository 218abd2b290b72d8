//! Per-core performance-model records.
//!
//! Every core variant is one [`CoreModel`] value: a CPUID stepping, plus
//! either host-execution scale factors (accelerated cores), a functional-unit
//! pool (out-of-order cores), or nothing at all (atomic cores).

use hetproc_env::MemMode;
use serde::{Deserialize, Serialize};

/// CPUID stepping used to tell the core variants apart from inside the guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoreStepping {
    Default = 1,
    BigCore = 2,
    SmallCore = 3,
    IntCore = 4,
    FpCore = 5,
}

impl CoreStepping {
    /// Returns the four CPUID leaf 0000_0001h words (type/family/model/stepping and feature flags).
    pub fn family_model_stepping(&self) -> [u32; 4] {
        [0x0002_0F50 | (*self as u32), 0x0000_0805, 0xEFDB_FBFF, 0x0000_0209]
    }
}

/// Instruction classes a functional unit can execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpClass {
    IntAlu,
    IntMult,
    IntDiv,
    FloatAdd,
    FloatCmp,
    FloatCvt,
    FloatMult,
    FloatMultAcc,
    FloatMisc,
    FloatDiv,
    FloatSqrt,
    SimdAdd,
    SimdAddAcc,
    SimdAlu,
    SimdCmp,
    SimdCvt,
    SimdMisc,
    SimdMult,
    SimdMultAcc,
    SimdMatMultAcc,
    SimdShift,
    SimdShiftAcc,
    SimdDiv,
    SimdSqrt,
    SimdFloatAdd,
    SimdFloatAlu,
    SimdFloatCmp,
    SimdFloatCvt,
    SimdFloatDiv,
    SimdFloatMisc,
    SimdFloatMult,
    SimdFloatMultAcc,
    SimdFloatMatMultAcc,
    SimdFloatSqrt,
    SimdReduceAdd,
    SimdReduceAlu,
    SimdReduceCmp,
    SimdFloatReduceAdd,
    SimdFloatReduceCmp,
    SimdPredAlu,
    MemRead,
    MemWrite,
    FloatMemRead,
    FloatMemWrite,
    IprAccess,
}

/// Every class served by the SIMD unit, all single-cycle and pipelined.
const SIMD_CLASSES: [OpClass; 28] = [
    OpClass::SimdAdd,
    OpClass::SimdAddAcc,
    OpClass::SimdAlu,
    OpClass::SimdCmp,
    OpClass::SimdCvt,
    OpClass::SimdMisc,
    OpClass::SimdMult,
    OpClass::SimdMultAcc,
    OpClass::SimdMatMultAcc,
    OpClass::SimdShift,
    OpClass::SimdShiftAcc,
    OpClass::SimdDiv,
    OpClass::SimdSqrt,
    OpClass::SimdFloatAdd,
    OpClass::SimdFloatAlu,
    OpClass::SimdFloatCmp,
    OpClass::SimdFloatCvt,
    OpClass::SimdFloatDiv,
    OpClass::SimdFloatMisc,
    OpClass::SimdFloatMult,
    OpClass::SimdFloatMultAcc,
    OpClass::SimdFloatMatMultAcc,
    OpClass::SimdFloatSqrt,
    OpClass::SimdReduceAdd,
    OpClass::SimdReduceAlu,
    OpClass::SimdReduceCmp,
    OpClass::SimdFloatReduceAdd,
    OpClass::SimdFloatReduceCmp,
];

/// Latency description of one instruction class on a functional unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpDesc {
    pub class: OpClass,
    /// Cycles from issue to result
    pub latency: u32,
    /// Whether a new op can issue every cycle
    pub pipelined: bool,
}

impl OpDesc {
    /// Single-cycle, pipelined op.
    pub fn new(class: OpClass) -> Self {
        Self {
            class,
            latency: 1,
            pipelined: true,
        }
    }

    /// Sets the latency.
    pub fn with_latency(mut self, latency: u32) -> Self {
        self.latency = latency;
        self
    }

    /// Marks the op as blocking its unit until it completes.
    pub fn unpipelined(mut self) -> Self {
        self.pipelined = false;
        self
    }
}

/// A group of identical functional units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionalUnit {
    pub name: String,
    pub count: u32,
    pub ops: Vec<OpDesc>,
}

impl FunctionalUnit {
    pub fn new(name: impl Into<String>, count: u32, ops: Vec<OpDesc>) -> Self {
        Self {
            name: name.into(),
            count,
            ops,
        }
    }

    /// Returns the description of `class` if this unit executes it.
    pub fn op(&self, class: OpClass) -> Option<&OpDesc> {
        self.ops.iter().find(|op| op.class == class)
    }
}

/// The functional-unit pool of an out-of-order core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuPool {
    pub units: Vec<FunctionalUnit>,
}

impl FuPool {
    /// The wide pool shared by the big and small out-of-order cores.
    pub fn wide() -> Self {
        use OpClass::*;

        Self {
            units: vec![
                FunctionalUnit::new("IntALU", 6, vec![OpDesc::new(IntAlu)]),
                // x86 DIV/IDIV loop over one-bit division microops, so each
                // microop is a single unpipelined cycle.
                FunctionalUnit::new(
                    "IntMultDiv",
                    2,
                    vec![
                        OpDesc::new(IntMult).with_latency(3),
                        OpDesc::new(IntDiv).unpipelined(),
                    ],
                ),
                FunctionalUnit::new(
                    "FP_ALU",
                    4,
                    vec![
                        OpDesc::new(FloatAdd).with_latency(2),
                        OpDesc::new(FloatCmp).with_latency(2),
                        OpDesc::new(FloatCvt).with_latency(2),
                    ],
                ),
                FunctionalUnit::new(
                    "FP_MultDiv",
                    2,
                    vec![
                        OpDesc::new(FloatMult).with_latency(4),
                        OpDesc::new(FloatMultAcc).with_latency(5),
                        OpDesc::new(FloatMisc).with_latency(3),
                        OpDesc::new(FloatDiv).with_latency(12).unpipelined(),
                        OpDesc::new(FloatSqrt).with_latency(24).unpipelined(),
                    ],
                ),
                FunctionalUnit::new(
                    "ReadPort",
                    0,
                    vec![OpDesc::new(MemRead), OpDesc::new(FloatMemRead)],
                ),
                FunctionalUnit::new(
                    "SIMD_Unit",
                    4,
                    SIMD_CLASSES.iter().copied().map(OpDesc::new).collect(),
                ),
                FunctionalUnit::new("PredALU", 1, vec![OpDesc::new(SimdPredAlu)]),
                FunctionalUnit::new(
                    "WritePort",
                    0,
                    vec![OpDesc::new(MemWrite), OpDesc::new(FloatMemWrite)],
                ),
                FunctionalUnit::new(
                    "RdWrPort",
                    4,
                    vec![
                        OpDesc::new(MemRead),
                        OpDesc::new(MemWrite),
                        OpDesc::new(FloatMemRead),
                        OpDesc::new(FloatMemWrite),
                    ],
                ),
                FunctionalUnit::new(
                    "IprPort",
                    1,
                    vec![OpDesc::new(IprAccess).with_latency(3).unpipelined()],
                ),
            ],
        }
    }

    /// Number of units able to execute `class`.
    pub fn units_for(&self, class: OpClass) -> u32 {
        self.units
            .iter()
            .filter(|unit| unit.op(class).is_some())
            .map(|unit| unit.count)
            .sum()
    }

    /// Lowest latency of `class` among the units that are actually present.
    pub fn latency_of(&self, class: OpClass) -> Option<u32> {
        self.units
            .iter()
            .filter(|unit| unit.count > 0)
            .filter_map(|unit| unit.op(class))
            .map(|op| op.latency)
            .min()
    }
}

/// How a core model executes guest instructions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CoreKind {
    /// Runs guest code directly on the host (KVM). Factors scale host time
    /// into simulated time for integer and floating-point work.
    HostAccelerated { host_factor: f64, host_fp_factor: f64 },

    /// Detailed out-of-order pipeline.
    OutOfOrder { fu_pool: FuPool },

    /// Functional one-instruction-per-tick model.
    Atomic,
}

/// One simulate-able core variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreModel {
    pub name: String,
    pub stepping: CoreStepping,
    pub kind: CoreKind,
}

impl CoreModel {
    fn host_accelerated(name: &str, stepping: CoreStepping, host_factor: f64, host_fp_factor: f64) -> Self {
        Self {
            name: name.to_string(),
            stepping,
            kind: CoreKind::HostAccelerated {
                host_factor,
                host_fp_factor,
            },
        }
    }

    pub fn big_kvm() -> Self {
        Self::host_accelerated("big_kvm", CoreStepping::BigCore, 1.0, 1.0)
    }

    pub fn small_kvm() -> Self {
        Self::host_accelerated("small_kvm", CoreStepping::SmallCore, 2.0, 2.0)
    }

    /// Integer-optimised core: floating point is 50x slower than on the host.
    pub fn int_kvm() -> Self {
        Self::host_accelerated("int_kvm", CoreStepping::IntCore, 1.0, 50.0)
    }

    /// Floating-point accelerator: floating point costs no simulated time.
    pub fn fp_kvm() -> Self {
        Self::host_accelerated("fp_kvm", CoreStepping::FpCore, 1.0, 0.0)
    }

    /// Debugging aid, ten times slower than the host.
    pub fn super_slow() -> Self {
        Self::host_accelerated("super_slow", CoreStepping::Default, 10.0, 10.0)
    }

    pub fn speed_demon() -> Self {
        Self::host_accelerated("speed_demon", CoreStepping::Default, 0.5, 0.5)
    }

    pub fn big_o3() -> Self {
        Self {
            name: "big_o3".to_string(),
            stepping: CoreStepping::BigCore,
            kind: CoreKind::OutOfOrder {
                fu_pool: FuPool::wide(),
            },
        }
    }

    pub fn small_o3() -> Self {
        Self {
            name: "small_o3".to_string(),
            stepping: CoreStepping::SmallCore,
            kind: CoreKind::OutOfOrder {
                fu_pool: FuPool::wide(),
            },
        }
    }

    /// Placeholder atomic core used as the switch-to side of a pair.
    pub fn dummy() -> Self {
        Self {
            name: "dummy".to_string(),
            stepping: CoreStepping::Default,
            kind: CoreKind::Atomic,
        }
    }

    /// True if the model executes on the host instead of being timed by the kernel.
    pub fn is_accelerated(&self) -> bool {
        matches!(self.kind, CoreKind::HostAccelerated { .. })
    }

    /// Memory mode this model needs from the board.
    pub fn mem_mode(&self) -> MemMode {
        match self.kind {
            CoreKind::HostAccelerated { .. } => MemMode::AtomicNoncaching,
            CoreKind::OutOfOrder { .. } => MemMode::Timing,
            CoreKind::Atomic => MemMode::Atomic,
        }
    }

    /// Average simulated ticks per retired instruction.
    ///
    /// # Arguments
    /// * `fp_fraction` - Share of floating-point instructions in [0, 1]
    pub fn ticks_per_instruction(&self, fp_fraction: f64) -> f64 {
        let fp = fp_fraction.clamp(0.0, 1.0);
        match &self.kind {
            CoreKind::HostAccelerated {
                host_factor,
                host_fp_factor,
            } => host_factor * (1.0 - fp) + host_fp_factor * fp,
            CoreKind::OutOfOrder { fu_pool } => {
                let int = 1.0 / fu_pool.units_for(OpClass::IntAlu).max(1) as f64;
                let float = fu_pool.latency_of(OpClass::FloatAdd).unwrap_or(1) as f64
                    / fu_pool.units_for(OpClass::FloatAdd).max(1) as f64;
                int * (1.0 - fp) + float * fp
            }
            CoreKind::Atomic => 1.0,
        }
    }
}
