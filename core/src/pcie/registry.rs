//! PCIe information registry.

use super::table::{PcieHeader, PcieInfoTable, PcieRecord, PcieRecordType, PCIE_INFO_TABLE_SIZE};
use super::{Bdf, PcieError, PcieResult, MAX_SEGMENT};
use crate::info::InfoError;
use acs_pal::{FirmwareInterface, PlatformAbstraction};
use alloc::vec::Vec;
use spin::RwLock;

/// Registry over the PCIe table
#[derive(Debug)]
pub struct PcieRegistry {
    table: RwLock<Option<PcieInfoTable>>,
}

impl Default for PcieRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PcieRegistry {
    /// Create an empty registry
    pub const fn new() -> Self {
        Self { table: RwLock::new(None) }
    }

    /// Take ownership of a table in its platform layout
    ///
    /// A platform without ECAM is legal; the PCIe checks then skip.
    pub fn create(&self, bytes: &[u8]) -> PcieResult<()> {
        let mut slot = self.table.write();
        if slot.is_some() {
            return Err(InfoError::AlreadyCreated.into());
        }
        let table = PcieInfoTable::from_bytes(bytes).map_err(|e| {
            log::error!("PCIE INFO: table rejected: {}", e);
            PcieError::from(e)
        })?;

        if let Some(ecam) = table.all_of(PcieRecordType::Ecam.raw()).find(|r| r.segment > MAX_SEGMENT) {
            log::error!("PCIE INFO: ECAM segment {:#x} cannot be addressed", ecam.segment);
            return Err(PcieError::SegmentOutOfRange(ecam.segment));
        }

        let header = *table.header();
        log::info!(" PCIE INFO: Number of ECAM regions    : {:4}", header.num_ecam);
        log::info!(" PCIE INFO: Number of functions       : {:4}", header.num_functions);

        *slot = Some(table);
        Ok(())
    }

    /// Ask the platform to produce the table, then take ownership of it
    pub fn create_from_platform<P: PlatformAbstraction>(&self, platform: &P) -> PcieResult<()> {
        let mut buf = Vec::with_capacity(PCIE_INFO_TABLE_SIZE);
        platform
            .firmware()
            .create_pcie_info_table(&mut buf, PCIE_INFO_TABLE_SIZE)
            .map_err(|e| {
                log::error!("PCIE INFO: platform could not build the table: {}", e);
                PcieError::Platform(e)
            })?;
        self.create(&buf)
    }

    /// Release the table
    pub fn free(&self) {
        if self.table.write().take().is_some() {
            log::debug!("PCIE INFO: table freed");
        }
    }

    /// Whether a table is held
    pub fn is_created(&self) -> bool {
        self.table.read().is_some()
    }

    /// Copy of the table header, `None` before creation
    pub fn header(&self) -> Option<PcieHeader> {
        self.table.read().as_ref().map(|t| *t.header())
    }

    /// ECAM window decoding `bdf`
    pub fn ecam_for(&self, bdf: Bdf) -> Option<PcieRecord> {
        self.table.read().as_ref()?.find(|r| r.decodes(bdf)).copied()
    }

    /// Enumerated functions, in table order
    pub fn functions(&self) -> Vec<Bdf> {
        match self.table.read().as_ref() {
            Some(table) => table.all_of(PcieRecordType::Function.raw()).map(|r| r.bdf).collect(),
            None => {
                log::error!("PCIE INFO table not available");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcie::table::PcieInfoTableBuilder;

    #[test]
    fn test_functions_and_windows() {
        let bytes = PcieInfoTableBuilder::new(PcieHeader { num_ecam: 1, num_functions: 2 })
            .record(PcieRecord::ecam(0x4000_0000, 0, 0, 0x0F))
            .record(PcieRecord::function(Bdf::new(0, 0, 1, 0)))
            .record(PcieRecord::function(Bdf::new(0, 1, 0, 0)))
            .build()
            .to_bytes();

        let reg = PcieRegistry::new();
        assert!(reg.functions().is_empty());
        reg.create(&bytes).unwrap();

        assert_eq!(reg.functions(), [Bdf::new(0, 0, 1, 0), Bdf::new(0, 1, 0, 0)]);
        assert_eq!(reg.ecam_for(Bdf::new(0, 2, 0, 0)).map(|r| r.base.as_u64()), Some(0x4000_0000));
        assert!(reg.ecam_for(Bdf::new(0, 0x10, 0, 0)).is_none());

        reg.free();
        assert!(reg.header().is_none());
    }

    #[test]
    fn test_wide_segment_rejected() {
        let table = |segment| {
            PcieInfoTableBuilder::new(PcieHeader { num_ecam: 1, num_functions: 0 })
                .record(PcieRecord::ecam(0x4000_0000, segment, 0, 0xFF))
                .build()
                .to_bytes()
        };

        let reg = PcieRegistry::new();
        assert_eq!(reg.create(&table(0x100)), Err(PcieError::SegmentOutOfRange(0x100)));
        assert!(!reg.is_created());

        reg.create(&table(MAX_SEGMENT)).unwrap();
        assert_eq!(reg.ecam_for(Bdf::new(MAX_SEGMENT, 0x80, 0, 0)).map(|r| r.segment), Some(MAX_SEGMENT));
    }
}
