//! PCIe information table layout.

use super::Bdf;
use crate::info::{read_u16, read_u32, read_u64, InfoTable, InfoTableBuilder, TableHeader, TableRecord, SENTINEL_TAG};
use acs_pal::PhysAddr;
use alloc::vec::Vec;
use static_assertions::const_assert_eq;

/// Capacity reserved for the table the platform produces
pub const PCIE_INFO_TABLE_SIZE: usize = 16384;

/// Decoded PCIe table
pub type PcieInfoTable = InfoTable<PcieHeader, PcieRecord>;

/// Builder for PCIe tables
pub type PcieInfoTableBuilder = InfoTableBuilder<PcieHeader, PcieRecord>;

/// Record kinds in the PCIe table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PcieRecordType {
    /// ECAM window for a segment and bus range
    Ecam = 1,
    /// Enumerated function
    Function = 2,
}

impl PcieRecordType {
    /// Raw tag value
    pub const fn raw(self) -> u32 {
        self as u32
    }
}

/// PCIe table header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PcieHeader {
    /// Number of ECAM windows
    pub num_ecam: u32,
    /// Number of enumerated functions
    pub num_functions: u32,
}

impl TableHeader for PcieHeader {
    const SIZE: usize = 8;

    fn decode(bytes: &[u8]) -> Self {
        Self { num_ecam: read_u32(bytes, 0), num_functions: read_u32(bytes, 4) }
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.num_ecam.to_le_bytes());
        out.extend_from_slice(&self.num_functions.to_le_bytes());
    }
}

/// One PCIe table record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcieRecord {
    /// Raw type tag, see [`PcieRecordType`]
    pub tag: u32,
    /// Function id (function records)
    pub bdf: Bdf,
    /// ECAM base (ECAM records)
    pub base: PhysAddr,
    /// PCI segment (ECAM records)
    pub segment: u16,
    /// First bus decoded by the window
    pub start_bus: u8,
    /// Last bus decoded by the window
    pub end_bus: u8,
}

impl PcieRecord {
    /// An ECAM window
    pub const fn ecam(base: u64, segment: u16, start_bus: u8, end_bus: u8) -> Self {
        Self {
            tag: PcieRecordType::Ecam.raw(),
            bdf: Bdf::from_raw(0),
            base: PhysAddr::new(base),
            segment,
            start_bus,
            end_bus,
        }
    }

    /// An enumerated function
    pub const fn function(bdf: Bdf) -> Self {
        Self {
            tag: PcieRecordType::Function.raw(),
            bdf,
            base: PhysAddr::NULL,
            segment: bdf.segment(),
            start_bus: 0,
            end_bus: 0,
        }
    }

    /// Whether this ECAM window decodes `bdf`
    pub const fn decodes(&self, bdf: Bdf) -> bool {
        self.tag == PcieRecordType::Ecam.raw()
            && self.segment == bdf.segment()
            && bdf.bus() >= self.start_bus
            && bdf.bus() <= self.end_bus
    }
}

impl TableRecord for PcieRecord {
    const SIZE: usize = 24;

    fn decode(bytes: &[u8]) -> Self {
        Self {
            tag: read_u32(bytes, 0),
            bdf: Bdf::from_raw(read_u32(bytes, 4)),
            base: PhysAddr::new(read_u64(bytes, 8)),
            segment: read_u16(bytes, 16),
            start_bus: bytes[18],
            end_bus: bytes[19],
        }
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.tag.to_le_bytes());
        out.extend_from_slice(&self.bdf.as_u32().to_le_bytes());
        out.extend_from_slice(&self.base.as_u64().to_le_bytes());
        out.extend_from_slice(&self.segment.to_le_bytes());
        out.push(self.start_bus);
        out.push(self.end_bus);
        // reserved
        out.extend_from_slice(&0u32.to_le_bytes());
    }

    fn tag(&self) -> u32 {
        self.tag
    }

    fn sentinel() -> Self {
        Self {
            tag: SENTINEL_TAG,
            bdf: Bdf::from_raw(0),
            base: PhysAddr::NULL,
            segment: 0,
            start_bus: 0,
            end_bus: 0,
        }
    }
}

const_assert_eq!(<PcieHeader as TableHeader>::SIZE, 2 * 4);
const_assert_eq!(<PcieRecord as TableRecord>::SIZE, 4 + 4 + 8 + 2 + 1 + 1 + 4);
