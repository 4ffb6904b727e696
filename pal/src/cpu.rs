//! # PE Abstraction
//!
//! Processing-element enumeration and payload dispatch.

/// PE enumeration
pub trait PeTopology: Send + Sync {
    /// Index of the PE executing the caller
    fn current_index(&self) -> usize;

    /// Number of PEs available
    fn pe_count(&self) -> usize;

    /// MPIDR_EL1 value of the PE at `index`
    fn mpidr(&self, index: usize) -> u64;

    /// Write a GIC CPU interface system register on the current PE
    fn write_gic_sysreg(&self, reg: GicSysReg, value: u64);
}

/// Runs a payload on a set of PEs
///
/// `run_on_pes` must not return before every participating PE has finished
/// the payload. Collection code relies on that as its barrier.
pub trait PeDispatcher: Send + Sync {
    /// Invoke `payload(pe_index)` once on each PE in `0..pe_count`
    fn run_on_pes(&self, pe_count: usize, payload: &(dyn Fn(usize) + Sync));
}

/// GIC CPU interface system registers touched by the core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GicSysReg {
    /// ICC_BPR1_EL1
    Bpr1,
    /// ICC_PMR_EL1
    Pmr,
    /// ICC_IGRPEN1_EL1
    Igrpen1,
}

impl GicSysReg {
    /// Architectural register name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bpr1 => "ICC_BPR1_EL1",
            Self::Pmr => "ICC_PMR_EL1",
            Self::Igrpen1 => "ICC_IGRPEN1_EL1",
        }
    }
}

/// MPIDR affinity field masks
pub mod mpidr {
    /// Aff0, bits [7:0]
    pub const AFF0: u64 = 0xFF;
    /// Aff1, bits [15:8]
    pub const AFF1: u64 = 0xFF << 8;
    /// Aff2, bits [23:16]
    pub const AFF2: u64 = 0xFF << 16;
    /// Aff3, bits [39:32]
    pub const AFF3: u64 = 0xFF << 32;
    /// All affinity fields
    pub const AFFINITY_MASK: u64 = AFF0 | AFF1 | AFF2 | AFF3;
}
