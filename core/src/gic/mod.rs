//! # Interrupt Controller
//!
//! The interrupt controller information table, the registry that answers
//! queries over it, and the per-interrupt operations built on both.

pub mod controller;
pub mod intid;
pub mod regs;
pub mod registry;
pub mod table;

pub use controller::Gic;
pub use intid::IntIdRange;
pub use registry::{GicInfo, GicInfoRegistry};
pub use table::{GicHeader, GicInfoTable, GicInfoTableBuilder, GicRecord, GicRecordType, GIC_INFO_TABLE_SIZE};

use crate::info::InfoError;
use acs_pal::PalError;

/// Result type for interrupt controller operations
pub type GicResult<T> = Result<T, GicError>;

/// Interrupt controller errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GicError {
    /// Table could not be created or is missing
    Info(InfoError),
    /// The platform failed a request
    Platform(PalError),
    /// Interrupt id not valid for the requested operation
    InvalidIntId(u32),
    /// Extended SPI id outside `[4096, max]`
    EspiOutOfRange {
        /// Offending id
        int_id: u32,
        /// Largest implemented extended SPI
        max: u32,
    },
    /// Unrecognized attribute code
    UnknownInfo(u32),
}

impl core::fmt::Display for GicError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Info(e) => write!(f, "GIC info table: {}", e),
            Self::Platform(e) => write!(f, "platform: {}", e),
            Self::InvalidIntId(id) => write!(f, "invalid interrupt id {}", id),
            Self::EspiOutOfRange { int_id, max } => {
                write!(f, "extended SPI {} outside [4096, {}]", int_id, max)
            }
            Self::UnknownInfo(code) => write!(f, "unknown GIC info type {}", code),
        }
    }
}

impl From<InfoError> for GicError {
    fn from(e: InfoError) -> Self {
        Self::Info(e)
    }
}

impl From<PalError> for GicError {
    fn from(e: PalError) -> Self {
        Self::Platform(e)
    }
}
