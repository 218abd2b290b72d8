//! Common types for the HetProc substrate abstraction.

use serde::{Deserialize, Serialize};

/// Opaque reference to a simulate-able core model.
///
/// The model itself is owned by the substrate; processors only hold the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelId(pub u32);

impl ModelId {
    /// Creates a ModelId from its raw value.
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "model#{}", self.0)
    }
}

/// Index of an independent simulated-time progression.
///
/// Index 0 is the kernel's shared global timeline. Every host-accelerated
/// model gets its own index starting at 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimelineIndex(pub u32);

impl TimelineIndex {
    /// The shared global timeline.
    pub const DEFAULT: TimelineIndex = TimelineIndex(0);

    /// Returns the `n`-th isolated timeline (never the default one), or
    /// `None` once the index space is exhausted.
    pub fn isolated(n: usize) -> Option<Self> {
        u32::try_from(n).ok()?.checked_add(1).map(Self)
    }

    /// Returns true for the shared global timeline.
    pub fn is_default(&self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for TimelineIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "timeline{}", self.0)
    }
}

/// Instruction-set identity of a core model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Isa {
    X86,
    Arm,
    RiscV,
    Power,
    Mips,
    Sparc,
}

impl Isa {
    /// Returns the ISA name.
    pub fn name(&self) -> &'static str {
        match self {
            Isa::X86 => "x86",
            Isa::Arm => "arm",
            Isa::RiscV => "riscv",
            Isa::Power => "power",
            Isa::Mips => "mips",
            Isa::Sparc => "sparc",
        }
    }
}

impl std::fmt::Display for Isa {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Isa {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "x86" | "x86_64" | "amd64" => Ok(Isa::X86),
            "arm" | "aarch64" | "arm64" => Ok(Isa::Arm),
            "riscv" | "risc-v" | "riscv64" => Ok(Isa::RiscV),
            "power" | "ppc" => Ok(Isa::Power),
            "mips" => Ok(Isa::Mips),
            "sparc" => Ok(Isa::Sparc),
            _ => Err(format!("Unknown ISA: {}", s)),
        }
    }
}

/// Memory-system access mode of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemMode {
    /// Detailed, timed accesses
    Timing,
    /// Functional accesses through the caches
    Atomic,
    /// Functional accesses that bypass the caches entirely
    AtomicNoncaching,
}

impl MemMode {
    /// Returns the mode name.
    pub fn name(&self) -> &'static str {
        match self {
            MemMode::Timing => "timing",
            MemMode::Atomic => "atomic",
            MemMode::AtomicNoncaching => "atomic_noncaching",
        }
    }
}

impl std::fmt::Display for MemMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Named events that hand control from the kernel back to the run driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExitTrigger {
    /// The guest asked to exit (`m5 exit`)
    Exit,
    /// The guest entered its region of interest
    WorkBegin,
    /// The guest left its region of interest
    WorkEnd,
    /// The guest asked for a checkpoint
    Checkpoint,
    /// The tick limit was reached
    MaxTick,
}

impl ExitTrigger {
    /// Returns the trigger name.
    pub fn name(&self) -> &'static str {
        match self {
            ExitTrigger::Exit => "exit",
            ExitTrigger::WorkBegin => "work_begin",
            ExitTrigger::WorkEnd => "work_end",
            ExitTrigger::Checkpoint => "checkpoint",
            ExitTrigger::MaxTick => "max_tick",
        }
    }
}

impl std::fmt::Display for ExitTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolated_timelines_skip_default() {
        assert!(TimelineIndex::DEFAULT.is_default());
        assert_eq!(TimelineIndex::isolated(0), Some(TimelineIndex(1)));
        assert!(TimelineIndex::isolated(0).is_some_and(|t| !t.is_default()));
        assert_eq!(TimelineIndex::isolated(6).map(|t| t.to_string()).as_deref(), Some("timeline7"));
    }

    #[test]
    fn test_isolated_timeline_index_space_is_bounded() {
        let last = u32::MAX as usize;
        assert_eq!(TimelineIndex::isolated(last - 1), Some(TimelineIndex(u32::MAX)));
        assert_eq!(TimelineIndex::isolated(last), None);
    }

    #[test]
    fn test_isa_parse() {
        assert_eq!("X86".parse::<Isa>(), Ok(Isa::X86));
        assert_eq!("aarch64".parse::<Isa>(), Ok(Isa::Arm));
        assert!("vax".parse::<Isa>().is_err());
    }

    #[test]
    fn test_model_id_display() {
        assert_eq!(ModelId::new(7).to_string(), "model#7");
        assert_eq!(ModelId(3).raw(), 3);
    }
}
