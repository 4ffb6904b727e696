//! # Interrupt Controller Information Registry
//!
//! Owns the decoded interrupt controller table and answers attribute queries
//! over it. Nothing is cached: static facts come from the table, live facts
//! (negotiated version, security configuration) are re-read from the
//! distributor on every call.

use super::regs::{extract_bits, gicd, gicr};
use super::table::{GicHeader, GicInfoTable, GicRecord, GicRecordType, GIC_INFO_TABLE_SIZE};
use super::{GicError, GicResult};
use crate::info::InfoError;
use acs_pal::{FirmwareInterface, GicFirmware, PhysAddr, PlatformAbstraction, RegisterAccess};
use alloc::vec::Vec;
use spin::RwLock;

/// Attributes answered by [`GicInfoRegistry::get_info`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum GicInfo {
    /// Controller architecture version
    Version = 1,
    /// Two security states supported (CTLR.DS)
    SecurityStates = 2,
    /// Affinity routing enabled for the non-secure state
    AffinityNs = 3,
    /// Group 1 enables
    EnableGroup1Ns = 4,
    /// SGI enable bits visible to the non-secure state (redistributor)
    SgiNonSecure = 5,
    /// SGI enable bits visible to the non-secure state (distributor)
    SgiNonSecureLegacy = 6,
    /// Number of ITS blocks
    NumIts = 7,
    /// Number of GICv2m MSI frames
    NumMsiFrame = 8,
}

impl GicInfo {
    /// Decode a raw attribute code
    pub const fn from_raw(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::Version),
            2 => Some(Self::SecurityStates),
            3 => Some(Self::AffinityNs),
            4 => Some(Self::EnableGroup1Ns),
            5 => Some(Self::SgiNonSecure),
            6 => Some(Self::SgiNonSecureLegacy),
            7 => Some(Self::NumIts),
            8 => Some(Self::NumMsiFrame),
            _ => None,
        }
    }
}

/// Registry over the interrupt controller table
#[derive(Debug)]
pub struct GicInfoRegistry {
    table: RwLock<Option<GicInfoTable>>,
}

impl Default for GicInfoRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl GicInfoRegistry {
    /// Create an empty registry
    pub const fn new() -> Self {
        Self { table: RwLock::new(None) }
    }

    /// Take ownership of a table in its platform layout
    ///
    /// Fails on empty or malformed input and when no distributor is
    /// described. A registry holds at most one table; call [`free`] first
    /// to replace it.
    ///
    /// [`free`]: Self::free
    pub fn create(&self, bytes: &[u8]) -> GicResult<()> {
        let mut slot = self.table.write();
        if slot.is_some() {
            return Err(InfoError::AlreadyCreated.into());
        }

        let table = GicInfoTable::from_bytes(bytes).map_err(|e| {
            log::error!("GIC INFO: table rejected: {}", e);
            GicError::from(e)
        })?;

        let header = *table.header();
        log::info!(" GIC INFO: Number of GICD             : {:4}", header.num_gicd);
        log::info!(" GIC INFO: Number of ITS              : {:4}", header.num_its);

        if header.num_gicd == 0 || table.first_of(GicRecordType::Distributor.raw()).is_none() {
            log::error!("GIC INFO: no GICD described. Critical error");
            return Err(InfoError::MissingRequired("GICD").into());
        }

        *slot = Some(table);
        Ok(())
    }

    /// Ask the platform to produce the table, then take ownership of it
    ///
    /// On device-tree platforms the controller bring-up hook runs once the
    /// table is in place.
    pub fn create_from_platform<P: PlatformAbstraction>(&self, platform: &P) -> GicResult<()> {
        let mut buf = Vec::with_capacity(GIC_INFO_TABLE_SIZE);
        platform
            .firmware()
            .create_gic_info_table(&mut buf, GIC_INFO_TABLE_SIZE)
            .map_err(|e| {
                log::error!("GIC INFO: platform could not build the table: {}", e);
                GicError::Platform(e)
            })?;

        self.create(&buf)?;

        if platform.firmware().firmware_type().is_dt() {
            if let Err(e) = platform.gic().init() {
                log::warn!("GIC INFO: platform GIC init failed: {}", e);
            }
        }
        Ok(())
    }

    /// Release the table
    pub fn free(&self) {
        if self.table.write().take().is_some() {
            log::debug!("GIC INFO: table freed");
        }
    }

    /// Whether a table is held
    pub fn is_created(&self) -> bool {
        self.table.read().is_some()
    }

    /// Copy of the table header, `None` before creation
    pub fn header(&self) -> Option<GicHeader> {
        self.with_table(|t| *t.header())
    }

    fn with_table<T>(&self, f: impl FnOnce(&GicInfoTable) -> T) -> Option<T> {
        let guard = self.table.read();
        match guard.as_ref() {
            Some(table) => Some(f(table)),
            None => {
                log::error!("GIC INFO table not available");
                None
            }
        }
    }

    // =========================================================================
    // Base address lookups
    // =========================================================================

    /// Base of the first record of `kind`, [`PhysAddr::NULL`] if absent
    pub fn base_address(&self, kind: GicRecordType) -> PhysAddr {
        let base = self
            .with_table(|t| t.first_of(kind.raw()).map(|r| r.base))
            .flatten();
        match base {
            Some(base) => base,
            None => {
                log::debug!("GIC INFO: no {} entry", kind.name());
                PhysAddr::NULL
            }
        }
    }

    /// Distributor base
    pub fn distributor_base(&self) -> PhysAddr {
        self.base_address(GicRecordType::Distributor)
    }

    /// First redistributor base and its length
    ///
    /// GICC-described redistributors carry no length and report 0.
    pub fn redistributor_base(&self) -> (PhysAddr, u32) {
        self.with_table(|t| {
            t.find(|r| {
                matches!(
                    r.kind(),
                    Some(GicRecordType::GicrRedistributor | GicRecordType::GiccRedistributor)
                )
            })
            .map(|r| match r.kind() {
                Some(GicRecordType::GicrRedistributor) => (r.base, r.length),
                _ => (r.base, 0),
            })
        })
        .flatten()
        .unwrap_or((PhysAddr::NULL, 0))
    }

    /// Virtual interface control base
    pub fn hypervisor_base(&self) -> PhysAddr {
        self.base_address(GicRecordType::Hypervisor)
    }

    /// CPU interface base
    pub fn cpuif_base(&self) -> PhysAddr {
        self.base_address(GicRecordType::CpuIf)
    }

    /// Every record of `kind`, in table order
    pub fn records_of(&self, kind: GicRecordType) -> Vec<GicRecord> {
        self.with_table(|t| t.all_of(kind.raw()).copied().collect())
            .unwrap_or_default()
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    /// Resolve an attribute, 0 before creation
    pub fn get_info(&self, mmio: &impl RegisterAccess, info: GicInfo) -> u32 {
        let Some(header) = self.header() else {
            return 0;
        };
        let dist = self.distributor_base();
        let read_dist = |offset: u64| if dist.is_null() { 0 } else { mmio.read32(dist.add(offset)) };

        match info {
            GicInfo::Version => {
                if header.gic_version != 0 {
                    log::debug!(" GIC INFO: version from firmware {}", header.gic_version);
                    return header.gic_version;
                }
                let pidr2 = read_dist(gicd::PIDR2);
                extract_bits(pidr2, gicd::PIDR2_ARCH_REV)
            }
            GicInfo::SecurityStates => {
                extract_bits(read_dist(gicd::CTLR), gicd::CTLR_DS)
            }
            GicInfo::AffinityNs => {
                extract_bits(read_dist(gicd::CTLR), gicd::CTLR_ARE_NS)
            }
            GicInfo::EnableGroup1Ns => {
                extract_bits(read_dist(gicd::CTLR), gicd::CTLR_ENABLE_GRP1)
            }
            GicInfo::SgiNonSecure => {
                let (rdbase, _) = self.redistributor_base();
                if rdbase.is_null() {
                    log::debug!("GIC INFO: no redistributor described");
                    return 0;
                }
                mmio.read32(rdbase.add(gicr::RD_FRAME_SIZE + gicr::ISENABLER0))
            }
            GicInfo::SgiNonSecureLegacy => read_dist(gicd::ISENABLER),
            GicInfo::NumIts => header.num_its,
            GicInfo::NumMsiFrame => header.num_msi_frame,
        }
    }

    /// Resolve an attribute from its raw code
    pub fn get_info_raw(&self, mmio: &impl RegisterAccess, code: u32) -> GicResult<u32> {
        match GicInfo::from_raw(code) {
            Some(info) => Ok(self.get_info(mmio, info)),
            None => {
                log::error!("GIC Info - type not recognized {}", code);
                Err(GicError::UnknownInfo(code))
            }
        }
    }

    /// Largest interrupt id the distributor implements, 0 without a distributor
    pub fn max_intid(&self, mmio: &impl RegisterAccess) -> u32 {
        let dist = self.distributor_base();
        if dist.is_null() {
            return 0;
        }
        let typer = mmio.read32(dist.add(gicd::TYPER));
        32 * ((typer & gicd::TYPER_IT_LINES) + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gic::table::GicInfoTableBuilder;
    use acs_pal::sim::{SimFirmware, SimMmio, SimPlatform};
    use acs_pal::FirmwareType;

    fn table_bytes(num_gicd: u32) -> Vec<u8> {
        GicInfoTableBuilder::new(GicHeader { num_gicd, num_its: 2, ..GicHeader::default() })
            .record(GicRecord::new(GicRecordType::GiccRedistributor, 0x8000))
            .record(GicRecord::new(GicRecordType::Distributor, 0x1000))
            .record(GicRecord::new(GicRecordType::GicrRedistributor, 0x9000).with_length(0x2_0000))
            .build()
            .to_bytes()
    }

    #[test]
    fn test_lifecycle() {
        let reg = GicInfoRegistry::new();
        assert!(!reg.is_created());
        assert_eq!(reg.create(&[]), Err(GicError::Info(InfoError::NullInput)));

        reg.create(&table_bytes(1)).unwrap();
        assert!(reg.is_created());
        assert_eq!(reg.create(&table_bytes(1)), Err(GicError::Info(InfoError::AlreadyCreated)));

        reg.free();
        assert!(!reg.is_created());
        assert_eq!(reg.distributor_base(), PhysAddr::NULL);
    }

    #[test]
    fn test_zero_distributors_is_fatal() {
        let reg = GicInfoRegistry::new();
        assert_eq!(
            reg.create(&table_bytes(0)),
            Err(GicError::Info(InfoError::MissingRequired("GICD")))
        );
        assert!(!reg.is_created());
    }

    #[test]
    fn test_header_count_without_gicd_record() {
        let bytes = GicInfoTableBuilder::new(GicHeader { num_gicd: 1, num_its: 1, ..GicHeader::default() })
            .record(GicRecord::new(GicRecordType::Its, 0x2_0000))
            .build()
            .to_bytes();
        let reg = GicInfoRegistry::new();
        assert_eq!(reg.create(&bytes), Err(GicError::Info(InfoError::MissingRequired("GICD"))));
        assert!(!reg.is_created());
    }

    #[test]
    fn test_no_reads_without_table() {
        let reg = GicInfoRegistry::new();
        let mmio = SimMmio::new();
        // Registers at the zero page must never be consulted
        mmio.poke(gicd::TYPER, 0x1F);
        mmio.poke(gicd::CTLR, 0xFF);
        assert_eq!(reg.max_intid(&mmio), 0);
        assert_eq!(reg.get_info(&mmio, GicInfo::AffinityNs), 0);
    }

    #[test]
    fn test_missing_redistributor_reads_nothing() {
        let bytes = GicInfoTableBuilder::new(GicHeader { num_gicd: 1, ..GicHeader::default() })
            .record(GicRecord::new(GicRecordType::Distributor, 0x1000))
            .build()
            .to_bytes();
        let reg = GicInfoRegistry::new();
        reg.create(&bytes).unwrap();
        let mmio = SimMmio::new();
        mmio.poke(gicr::RD_FRAME_SIZE + gicr::ISENABLER0, 0xFFFF);
        assert_eq!(reg.get_info(&mmio, GicInfo::SgiNonSecure), 0);
    }

    #[test]
    fn test_base_lookups() {
        let reg = GicInfoRegistry::new();
        reg.create(&table_bytes(1)).unwrap();
        assert_eq!(reg.distributor_base(), PhysAddr::new(0x1000));
        // First redistributor wins; GICC-described ones have no length
        assert_eq!(reg.redistributor_base(), (PhysAddr::new(0x8000), 0));
        assert_eq!(reg.hypervisor_base(), PhysAddr::NULL);
        assert_eq!(reg.cpuif_base(), PhysAddr::NULL);
        assert!(reg.records_of(GicRecordType::Its).is_empty());
        assert_eq!(reg.records_of(GicRecordType::Distributor).len(), 1);
    }

    #[test]
    fn test_live_attributes() {
        let reg = GicInfoRegistry::new();
        reg.create(&table_bytes(1)).unwrap();
        let mmio = SimMmio::new();
        mmio.poke(0x1000 + gicd::PIDR2, 0x3B);
        mmio.poke(0x1000 + gicd::CTLR, 0x53);
        mmio.poke(0x1000 + gicd::TYPER, 0x3);
        mmio.poke(0x1000 + gicd::ISENABLER, 0xFFFF);
        mmio.poke(0x8000 + 0x1_0000 + 0x100, 0xFF);

        assert_eq!(reg.get_info(&mmio, GicInfo::Version), 3);
        assert_eq!(reg.get_info(&mmio, GicInfo::SecurityStates), 1);
        assert_eq!(reg.get_info(&mmio, GicInfo::AffinityNs), 1);
        assert_eq!(reg.get_info(&mmio, GicInfo::EnableGroup1Ns), 3);
        assert_eq!(reg.get_info(&mmio, GicInfo::SgiNonSecure), 0xFF);
        assert_eq!(reg.get_info(&mmio, GicInfo::SgiNonSecureLegacy), 0xFFFF);
        assert_eq!(reg.get_info(&mmio, GicInfo::NumIts), 2);
        assert_eq!(reg.max_intid(&mmio), 128);
    }

    #[test]
    fn test_firmware_version_wins_over_pidr2() {
        let bytes = GicInfoTableBuilder::new(GicHeader { gic_version: 4, num_gicd: 1, ..GicHeader::default() })
            .record(GicRecord::new(GicRecordType::Distributor, 0x1000))
            .build()
            .to_bytes();
        let reg = GicInfoRegistry::new();
        reg.create(&bytes).unwrap();
        let mmio = SimMmio::new();
        mmio.poke(0x1000 + gicd::PIDR2, 0x20);
        assert_eq!(reg.get_info(&mmio, GicInfo::Version), 4);
    }

    #[test]
    fn test_unknown_attribute_code() {
        let reg = GicInfoRegistry::new();
        reg.create(&table_bytes(1)).unwrap();
        let mmio = SimMmio::new();
        assert_eq!(reg.get_info_raw(&mmio, 99), Err(GicError::UnknownInfo(99)));
        assert_eq!(reg.get_info_raw(&mmio, 7), Ok(2));
    }

    #[test]
    fn test_create_from_platform() {
        let platform = SimPlatform::new(1).with_firmware(SimFirmware {
            firmware_type: FirmwareType::DeviceTree,
            gic_table: table_bytes(1),
            ..SimFirmware::default()
        });
        let reg = GicInfoRegistry::new();
        reg.create_from_platform(&platform).unwrap();
        assert_eq!(reg.header().map(|h| h.num_its), Some(2));
    }
}
