//! Interrupt controller information table layout.

use crate::info::{read_u32, read_u64, InfoTable, InfoTableBuilder, TableHeader, TableRecord, SENTINEL_TAG};
use acs_pal::PhysAddr;
use alloc::vec::Vec;
use static_assertions::const_assert_eq;

/// Capacity reserved for the table the platform produces
pub const GIC_INFO_TABLE_SIZE: usize = 8192;

/// Decoded interrupt controller table
pub type GicInfoTable = InfoTable<GicHeader, GicRecord>;

/// Builder for interrupt controller tables
pub type GicInfoTableBuilder = InfoTableBuilder<GicHeader, GicRecord>;

/// Record kinds in the interrupt controller table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum GicRecordType {
    /// GICv2 CPU interface
    CpuIf = 1,
    /// Distributor
    Distributor = 2,
    /// Redistributor described per PE (GICC structure)
    GiccRedistributor = 3,
    /// Redistributor discovery range (GICR structure)
    GicrRedistributor = 4,
    /// Interrupt translation service
    Its = 5,
    /// GICv2m MSI frame
    MsiFrame = 6,
    /// Virtual interface control (GICH)
    Hypervisor = 7,
}

impl GicRecordType {
    /// Decode a raw tag
    pub const fn from_raw(tag: u32) -> Option<Self> {
        match tag {
            1 => Some(Self::CpuIf),
            2 => Some(Self::Distributor),
            3 => Some(Self::GiccRedistributor),
            4 => Some(Self::GicrRedistributor),
            5 => Some(Self::Its),
            6 => Some(Self::MsiFrame),
            7 => Some(Self::Hypervisor),
            _ => None,
        }
    }

    /// Raw tag value
    pub const fn raw(self) -> u32 {
        self as u32
    }

    /// Short name for diagnostics
    pub const fn name(self) -> &'static str {
        match self {
            Self::CpuIf => "CPUIF",
            Self::Distributor => "GICD",
            Self::GiccRedistributor => "GICC-GICRD",
            Self::GicrRedistributor => "GICR-GICRD",
            Self::Its => "ITS",
            Self::MsiFrame => "MSI frame",
            Self::Hypervisor => "GICH",
        }
    }
}

/// Interrupt controller table header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GicHeader {
    /// Controller version if firmware reports it, 0 otherwise
    pub gic_version: u32,
    /// Number of distributors
    pub num_gicd: u32,
    /// Number of redistributor records
    pub num_gicrd: u32,
    /// Number of ITS blocks
    pub num_its: u32,
    /// Number of GICv2m MSI frames
    pub num_msi_frame: u32,
    /// Number of virtual interface control blocks
    pub num_gich: u32,
}

impl TableHeader for GicHeader {
    const SIZE: usize = 24;

    fn decode(bytes: &[u8]) -> Self {
        Self {
            gic_version: read_u32(bytes, 0),
            num_gicd: read_u32(bytes, 4),
            num_gicrd: read_u32(bytes, 8),
            num_its: read_u32(bytes, 12),
            num_msi_frame: read_u32(bytes, 16),
            num_gich: read_u32(bytes, 20),
        }
    }

    fn encode(&self, out: &mut Vec<u8>) {
        for field in [
            self.gic_version,
            self.num_gicd,
            self.num_gicrd,
            self.num_its,
            self.num_msi_frame,
            self.num_gich,
        ] {
            out.extend_from_slice(&field.to_le_bytes());
        }
    }
}

/// One interrupt controller table record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GicRecord {
    /// Raw type tag, see [`GicRecordType`]
    pub tag: u32,
    /// Firmware entry id (ITS id, frame id, ...)
    pub entry_id: u32,
    /// Base address of the block
    pub base: PhysAddr,
    /// Length of the block in bytes, 0 if unknown
    pub length: u32,
    /// Record flags
    pub flags: u32,
    /// Number of SPIs (MSI frames)
    pub spi_count: u32,
    /// First SPI (MSI frames)
    pub spi_base: u32,
}

impl GicRecord {
    /// A record of `kind` at `base`
    pub const fn new(kind: GicRecordType, base: u64) -> Self {
        Self {
            tag: kind.raw(),
            entry_id: 0,
            base: PhysAddr::new(base),
            length: 0,
            flags: 0,
            spi_count: 0,
            spi_base: 0,
        }
    }

    /// Set the block length
    pub const fn with_length(mut self, length: u32) -> Self {
        self.length = length;
        self
    }

    /// Set the firmware entry id
    pub const fn with_entry_id(mut self, entry_id: u32) -> Self {
        self.entry_id = entry_id;
        self
    }

    /// Set the SPI window (MSI frames)
    pub const fn with_spis(mut self, spi_base: u32, spi_count: u32) -> Self {
        self.spi_base = spi_base;
        self.spi_count = spi_count;
        self
    }

    /// Decoded record kind, `None` for unknown tags
    pub const fn kind(&self) -> Option<GicRecordType> {
        GicRecordType::from_raw(self.tag)
    }
}

impl TableRecord for GicRecord {
    const SIZE: usize = 32;

    fn decode(bytes: &[u8]) -> Self {
        Self {
            tag: read_u32(bytes, 0),
            entry_id: read_u32(bytes, 4),
            base: PhysAddr::new(read_u64(bytes, 8)),
            length: read_u32(bytes, 16),
            flags: read_u32(bytes, 20),
            spi_count: read_u32(bytes, 24),
            spi_base: read_u32(bytes, 28),
        }
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.tag.to_le_bytes());
        out.extend_from_slice(&self.entry_id.to_le_bytes());
        out.extend_from_slice(&self.base.as_u64().to_le_bytes());
        out.extend_from_slice(&self.length.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.spi_count.to_le_bytes());
        out.extend_from_slice(&self.spi_base.to_le_bytes());
    }

    fn tag(&self) -> u32 {
        self.tag
    }

    fn sentinel() -> Self {
        Self {
            tag: SENTINEL_TAG,
            entry_id: 0,
            base: PhysAddr::NULL,
            length: 0,
            flags: 0,
            spi_count: 0,
            spi_base: 0,
        }
    }
}

const_assert_eq!(<GicHeader as TableHeader>::SIZE, 6 * 4);
const_assert_eq!(<GicRecord as TableRecord>::SIZE, 4 + 4 + 8 + 4 * 4);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_layout() {
        let rec = GicRecord::new(GicRecordType::GicrRedistributor, 0x2f10_0000)
            .with_length(0x20_0000)
            .with_entry_id(3);
        let mut raw = Vec::new();
        rec.encode(&mut raw);
        assert_eq!(raw.len(), GicRecord::SIZE);
        assert_eq!(read_u32(&raw, 0), 4);
        assert_eq!(read_u64(&raw, 8), 0x2f10_0000);
        assert_eq!(GicRecord::decode(&raw), rec);
    }

    #[test]
    fn test_unknown_tag_has_no_kind() {
        let mut rec = GicRecord::new(GicRecordType::Its, 0);
        rec.tag = 42;
        assert!(rec.kind().is_none());
        assert_eq!(GicRecordType::from_raw(7), Some(GicRecordType::Hypervisor));
    }
}
