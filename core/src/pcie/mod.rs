//! # PCIe Topology
//!
//! The PCIe information table (ECAM windows and enumerated functions), the
//! registry that owns it, and configuration-space queries on top: capability
//! discovery, port type, and parent root port lookup.

pub mod caps;
pub mod registry;
pub mod table;
pub mod topology;

pub use caps::{Capability, CapabilityIter, CapabilityKind};
pub use registry::PcieRegistry;
pub use table::{PcieHeader, PcieInfoTable, PcieInfoTableBuilder, PcieRecord, PcieRecordType, PCIE_INFO_TABLE_SIZE};
pub use topology::{PortType, Topology};

use crate::info::InfoError;
use acs_pal::PalError;

/// Result type for PCIe operations
pub type PcieResult<T> = Result<T, PcieError>;

/// PCIe errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcieError {
    /// Table could not be created or is missing
    Info(InfoError),
    /// The platform failed a request
    Platform(PalError),
    /// No ECAM window decodes the function
    NoEcam(Bdf),
    /// Config offset outside the 4 KiB function space
    InvalidOffset(u16),
    /// The function has no PCI Express capability
    NotExpress(Bdf),
    /// ECAM segment does not fit the identifier encoding
    SegmentOutOfRange(u16),
}

impl core::fmt::Display for PcieError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Info(e) => write!(f, "PCIe info table: {}", e),
            Self::Platform(e) => write!(f, "platform: {}", e),
            Self::NoEcam(bdf) => write!(f, "no ECAM window for {}", bdf),
            Self::InvalidOffset(off) => write!(f, "config offset {:#x} out of range", off),
            Self::NotExpress(bdf) => write!(f, "{} has no PCIe capability", bdf),
            Self::SegmentOutOfRange(seg) => write!(f, "segment {:#x} above {:#x}", seg, MAX_SEGMENT),
        }
    }
}

impl From<InfoError> for PcieError {
    fn from(e: InfoError) -> Self {
        Self::Info(e)
    }
}

impl From<PalError> for PcieError {
    fn from(e: PalError) -> Self {
        Self::Platform(e)
    }
}

/// Highest segment a [`Bdf`] can carry
pub const MAX_SEGMENT: u16 = 0xFF;

/// Segment/bus/device/function identifier
///
/// Encoded `segment << 24 | bus << 16 | device << 8 | function`. Only eight
/// segment bits fit; tables describing segments above [`MAX_SEGMENT`] are
/// rejected at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Bdf(u32);

impl Bdf {
    /// Build from components; segment, device and function are masked to 8, 5
    /// and 3 bits
    pub const fn new(segment: u16, bus: u8, device: u8, function: u8) -> Self {
        Self(
            ((segment as u32 & 0xFF) << 24)
                | ((bus as u32) << 16)
                | (((device & 0x1F) as u32) << 8)
                | (function & 0x7) as u32,
        )
    }

    /// From the packed encoding
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Packed encoding
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// PCI segment
    pub const fn segment(self) -> u16 {
        (self.0 >> 24) as u16
    }

    /// Bus number
    pub const fn bus(self) -> u8 {
        (self.0 >> 16) as u8
    }

    /// Device number
    pub const fn device(self) -> u8 {
        (self.0 >> 8) as u8 & 0x1F
    }

    /// Function number
    pub const fn function(self) -> u8 {
        self.0 as u8 & 0x7
    }
}

impl core::fmt::Display for Bdf {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{:04x}:{:02x}:{:02x}.{}",
            self.segment(),
            self.bus(),
            self.device(),
            self.function()
        )
    }
}
