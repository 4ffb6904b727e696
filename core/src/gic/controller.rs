//! # Interrupt Controller Operations
//!
//! Per-interrupt operations on the distributor: routing, pending/active
//! state, trigger type. Every operation classifies the id first and only then
//! picks a register bank; an id outside every implemented range is rejected
//! without touching hardware.

use super::intid::{IntIdRange, ESPI_START, SPI_END, SPI_START};
use super::regs::{bit_slot, cfg_slot, gicd, icc};
use super::registry::{GicInfo, GicInfoRegistry};
use super::{GicError, GicResult};
use crate::info::InfoError;
use acs_pal::cpu::mpidr;
use acs_pal::{GicFirmware, GicSysReg, PeTopology, PhysAddr, PlatformAbstraction, RegisterAccess, TriggerType};

/// Interrupt controller bound to a platform and a registry
#[derive(Debug)]
pub struct Gic<'a, P: PlatformAbstraction> {
    platform: &'a P,
    registry: &'a GicInfoRegistry,
}

impl<P: PlatformAbstraction> Clone for Gic<'_, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P: PlatformAbstraction> Copy for Gic<'_, P> {}

impl<'a, P: PlatformAbstraction> Gic<'a, P> {
    /// Bind a controller view
    pub const fn new(platform: &'a P, registry: &'a GicInfoRegistry) -> Self {
        Self { platform, registry }
    }

    /// The backing registry
    pub fn registry(&self) -> &'a GicInfoRegistry {
        self.registry
    }

    /// Resolve a registry attribute
    pub fn info(&self, info: GicInfo) -> u32 {
        self.registry.get_info(self.platform.mmio(), info)
    }

    /// Largest interrupt id the distributor implements
    pub fn max_intid(&self) -> u32 {
        self.registry.max_intid(self.platform.mmio())
    }

    /// Classify an id against the platform's implemented ranges
    pub fn classify(&self, int_id: u32) -> IntIdRange {
        IntIdRange::classify(int_id, self.platform.gic())
    }

    /// Distributor base; no register is touched without one
    fn dist(&self) -> GicResult<PhysAddr> {
        if !self.registry.is_created() {
            return Err(InfoError::NotCreated.into());
        }
        let base = self.registry.distributor_base();
        if base.is_null() {
            return Err(InfoError::MissingRequired("GICD").into());
        }
        Ok(base)
    }

    fn read_bit(&self, dist: PhysAddr, bank: u64, index: u32) -> bool {
        let (word, bit) = bit_slot(index);
        let value = self.platform.mmio().read32(dist.add(bank + word));
        (value >> bit) & 1 != 0
    }

    fn write_bit(&self, dist: PhysAddr, bank: u64, index: u32) {
        let (word, bit) = bit_slot(index);
        self.platform.mmio().write32(dist.add(bank + word), 1 << bit);
    }

    // =========================================================================
    // Routing
    // =========================================================================

    /// Route an SPI or extended SPI to the PE with affinity `mpidr`
    ///
    /// SGIs and PPIs are banked per PE and cannot be routed. SPIs must lie
    /// within the distributor's implemented lines.
    pub fn route_to_pe(&self, int_id: u32, mpidr: u64) -> GicResult<()> {
        let dist = self.dist()?;
        let offset = match self.classify(int_id) {
            IntIdRange::Spi if int_id <= self.max_intid() => gicd::IROUTER + 8 * int_id as u64,
            IntIdRange::Espi => gicd::IROUTERE + 8 * (int_id - ESPI_START) as u64,
            range => {
                log::error!("GICD IROUTER: invalid interrupt id {} ({})", int_id, range.as_str());
                return Err(GicError::InvalidIntId(int_id));
            }
        };
        self.platform.mmio().write64(dist.add(offset), mpidr & mpidr::AFFINITY_MASK);
        Ok(())
    }

    // =========================================================================
    // Pending / active state
    // =========================================================================

    /// Whether the interrupt is pending or active
    pub fn get_state(&self, int_id: u32) -> GicResult<bool> {
        let dist = self.dist()?;
        match self.classify(int_id) {
            IntIdRange::Espi => {
                let index = int_id - ESPI_START;
                Ok(self.read_bit(dist, gicd::ISPENDRE, index) | self.read_bit(dist, gicd::ISACTIVERE, index))
            }
            range if range.is_standard() => {
                Ok(self.read_bit(dist, gicd::ISPENDR, int_id) | self.read_bit(dist, gicd::ISACTIVER, int_id))
            }
            range => {
                log::error!("GIC state: id {} ({}) not in a distributor range", int_id, range.as_str());
                Err(GicError::InvalidIntId(int_id))
            }
        }
    }

    /// Clear the pending and active state of an SPI or extended SPI
    pub fn clear(&self, int_id: u32) -> GicResult<()> {
        let dist = self.dist()?;
        match self.classify(int_id) {
            IntIdRange::Espi => {
                self.clear_espi(dist, int_id);
                Ok(())
            }
            _ if (SPI_START..=SPI_END).contains(&int_id) => {
                self.write_bit(dist, gicd::ICPENDR, int_id);
                self.write_bit(dist, gicd::ICACTIVER, int_id);
                Ok(())
            }
            _ => {
                log::error!("GIC clear: invalid interrupt id {}", int_id);
                Err(GicError::InvalidIntId(int_id))
            }
        }
    }

    fn clear_espi(&self, dist: PhysAddr, int_id: u32) {
        let index = int_id - ESPI_START;
        self.write_bit(dist, gicd::ICPENDRE, index);
        self.write_bit(dist, gicd::ICACTIVERE, index);
    }

    // =========================================================================
    // Trigger type
    // =========================================================================

    fn decode_trigger(&self, bank: u64, index: u32) -> GicResult<TriggerType> {
        let (word, bit) = cfg_slot(index);
        let cfg = self.platform.mmio().read32(self.dist()?.add(bank + word));
        if (cfg >> bit) & 1 != 0 {
            Ok(TriggerType::EdgeRising)
        } else {
            Ok(TriggerType::LevelHigh)
        }
    }

    /// Trigger type of a standard interrupt
    pub fn get_trigger_type(&self, int_id: u32) -> GicResult<TriggerType> {
        self.dist()?;
        let max = self.max_intid();
        if int_id > max {
            log::error!("GICD ICFGR: invalid interrupt id {} (max {})", int_id, max);
            return Err(GicError::InvalidIntId(int_id));
        }
        self.decode_trigger(gicd::ICFGR, int_id)
    }

    /// Trigger type of an extended SPI
    ///
    /// Fails when the extended SPI range is not implemented.
    pub fn get_espi_trigger_type(&self, int_id: u32) -> GicResult<TriggerType> {
        let max = self.platform.gic().max_espi();
        if !self.espi_supported() || int_id < ESPI_START || int_id > max {
            log::error!("GICD ICFGRE: invalid extended SPI id {} (max {})", int_id, max);
            return Err(GicError::EspiOutOfRange { int_id, max });
        }
        self.decode_trigger(gicd::ICFGRE, int_id - ESPI_START)
    }

    /// Ask the platform to program a trigger type
    ///
    /// Trigger programming is platform policy, so a refusal is only logged.
    pub fn set_trigger_type(&self, int_id: u32, trigger: TriggerType) {
        if let Err(e) = self.platform.gic().set_trigger(int_id, trigger) {
            log::error!("GIC: setting trigger type {} for id {} failed: {}", trigger.as_str(), int_id, e);
        }
    }

    // =========================================================================
    // Extended ranges
    // =========================================================================

    /// Extended SPI range implemented
    pub fn espi_supported(&self) -> bool {
        self.platform.gic().espi_supported()
    }

    /// Largest extended SPI id
    pub fn max_espi(&self) -> u32 {
        self.platform.gic().max_espi()
    }

    /// Largest extended PPI id
    pub fn max_eppi(&self) -> u32 {
        self.platform.gic().max_eppi()
    }

    /// Is `int_id` an implemented extended SPI
    pub fn is_espi(&self, int_id: u32) -> bool {
        self.platform.gic().is_espi(int_id)
    }

    /// Is `int_id` an implemented extended PPI
    pub fn is_eppi(&self, int_id: u32) -> bool {
        self.platform.gic().is_eppi(int_id)
    }

    // =========================================================================
    // CPU interface
    // =========================================================================

    /// Bring up the CPU interface of the calling PE
    pub fn cpuif_init(&self) {
        let pe = self.platform.pe();
        pe.write_gic_sysreg(GicSysReg::Bpr1, icc::BPR1_INIT);
        pe.write_gic_sysreg(GicSysReg::Pmr, icc::PMR_INIT);
        pe.write_gic_sysreg(GicSysReg::Igrpen1, icc::IGRPEN1_INIT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gic::table::{GicHeader, GicInfoTableBuilder, GicRecord, GicRecordType};
    use acs_pal::sim::{SimGic, SimPlatform};

    const GICD: u64 = 0x1000;

    fn setup(gic: SimGic) -> (SimPlatform, GicInfoRegistry) {
        let platform = SimPlatform::new(2).with_gic(gic);
        let registry = GicInfoRegistry::new();
        let bytes = GicInfoTableBuilder::new(GicHeader { num_gicd: 1, ..GicHeader::default() })
            .record(GicRecord::new(GicRecordType::Distributor, GICD))
            .build()
            .to_bytes();
        registry.create(&bytes).unwrap();
        // 1024 interrupt lines
        platform.mmio.poke(GICD + gicd::TYPER, 0x1F);
        (platform, registry)
    }

    #[test]
    fn test_route_masks_affinity() {
        let (platform, registry) = setup(SimGic::default());
        let gic = Gic::new(&platform, &registry);

        gic.route_to_pe(40, 0xFFFF_FFFF_FFFF_FFFF).unwrap();
        let writes = platform.mmio.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].addr, PhysAddr::new(GICD + 0x6000 + 8 * 40));
        assert_eq!(writes[0].value, 0xFF_00FF_FFFF);
        assert_eq!(writes[0].width, 8);
    }

    #[test]
    fn test_route_rejects_private_ids() {
        let (platform, registry) = setup(SimGic::default());
        let gic = Gic::new(&platform, &registry);
        assert_eq!(gic.route_to_pe(31, 0x1), Err(GicError::InvalidIntId(31)));
        assert!(platform.mmio.writes().is_empty());
    }

    #[test]
    fn test_route_range_checks() {
        let (platform, registry) = setup(SimGic::default().with_espi(5000));
        let gic = Gic::new(&platform, &registry);

        assert_eq!(gic.route_to_pe(1020, 0x1), Err(GicError::InvalidIntId(1020)));
        assert_eq!(gic.route_to_pe(u32::MAX, 0x1), Err(GicError::InvalidIntId(u32::MAX)));
        assert!(platform.mmio.writes().is_empty());

        // Extended SPIs use their own routing bank
        gic.route_to_pe(4096 + 3, 0x1).unwrap();
        let writes = platform.mmio.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].addr, PhysAddr::new(GICD + gicd::IROUTERE + 8 * 3));
    }

    #[test]
    fn test_route_beyond_implemented_lines() {
        let (platform, registry) = setup(SimGic::default());
        // 64 interrupt lines
        platform.mmio.poke(GICD + gicd::TYPER, 0x1);
        let gic = Gic::new(&platform, &registry);
        assert_eq!(gic.route_to_pe(100, 0x1), Err(GicError::InvalidIntId(100)));
        assert_eq!(gic.route_to_pe(4096, 0x1), Err(GicError::InvalidIntId(4096)));
        assert!(platform.mmio.writes().is_empty());
    }

    #[test]
    fn test_no_table_no_register_access() {
        let platform = SimPlatform::new(1).with_gic(SimGic::default().with_espi(5000));
        let registry = GicInfoRegistry::new();
        let gic = Gic::new(&platform, &registry);
        let not_created: GicResult<()> = Err(GicError::Info(InfoError::NotCreated));

        assert_eq!(gic.clear(33), not_created);
        assert_eq!(gic.route_to_pe(40, 0x1), not_created);
        assert_eq!(gic.get_state(40).map(|_| ()), not_created);
        assert_eq!(gic.get_trigger_type(5).map(|_| ()), not_created);
        assert_eq!(gic.get_espi_trigger_type(4096).map(|_| ()), not_created);
        assert_eq!(gic.max_intid(), 0);
        assert!(platform.mmio.writes().is_empty());
    }

    #[test]
    fn test_state_is_pending_or_active() {
        let (platform, registry) = setup(SimGic::default().with_espi(5000));
        let gic = Gic::new(&platform, &registry);

        assert_eq!(gic.get_state(0), Ok(false));
        platform.mmio.poke(GICD + gicd::ISPENDR, 1);
        assert_eq!(gic.get_state(0), Ok(true));

        platform.mmio.poke(GICD + gicd::ISACTIVER, 1 << 31);
        assert_eq!(gic.get_state(31), Ok(true));

        platform.mmio.poke(GICD + gicd::ISPENDR + 4, 1);
        assert_eq!(gic.get_state(32), Ok(true));
        assert_eq!(gic.get_state(33), Ok(false));

        platform.mmio.poke(GICD + gicd::ISACTIVER + 124, 1 << 27);
        assert_eq!(gic.get_state(1019), Ok(true));

        // Extended range indexes from 4096
        assert_eq!(gic.get_state(4096), Ok(false));
        platform.mmio.poke(GICD + gicd::ISACTIVERE, 1);
        assert_eq!(gic.get_state(4096), Ok(true));

        assert_eq!(gic.get_state(1020), Err(GicError::InvalidIntId(1020)));
        assert_eq!(gic.get_state(5001), Err(GicError::InvalidIntId(5001)));
    }

    #[test]
    fn test_last_extended_spi() {
        let (platform, registry) = setup(SimGic::default().with_espi(5000));
        let gic = Gic::new(&platform, &registry);
        // 5000 - 4096 = 904: word 28, bit 8
        let (word, bit) = (4 * 28, 1 << 8);

        assert_eq!(gic.get_state(5000), Ok(false));
        platform.mmio.poke(GICD + gicd::ISPENDRE + word, bit);
        assert_eq!(gic.get_state(5000), Ok(true));
        assert_eq!(gic.get_state(4999), Ok(false));

        gic.clear(5000).unwrap();
        let writes = platform.mmio.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].addr, PhysAddr::new(GICD + gicd::ICPENDRE + word));
        assert_eq!(writes[0].value, bit as u64);
        assert_eq!(writes[1].addr, PhysAddr::new(GICD + gicd::ICACTIVERE + word));
        assert_eq!(writes[1].value, bit as u64);
    }

    #[test]
    fn test_clear_writes_both_banks() {
        let (platform, registry) = setup(SimGic::default().with_espi(5000));
        let gic = Gic::new(&platform, &registry);

        gic.clear(33).unwrap();
        let writes = platform.mmio.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].addr, PhysAddr::new(GICD + gicd::ICPENDR + 4));
        assert_eq!(writes[0].value, 1 << 1);
        assert_eq!(writes[1].addr, PhysAddr::new(GICD + gicd::ICACTIVER + 4));

        platform.mmio.clear_journal();
        gic.clear(4097).unwrap();
        let writes = platform.mmio.writes();
        assert_eq!(writes[0].addr, PhysAddr::new(GICD + gicd::ICPENDRE));
        assert_eq!(writes[0].value, 1 << 1);
        assert_eq!(writes[1].addr, PhysAddr::new(GICD + gicd::ICACTIVERE));

        platform.mmio.clear_journal();
        assert_eq!(gic.clear(31), Err(GicError::InvalidIntId(31)));
        assert_eq!(gic.clear(1020), Err(GicError::InvalidIntId(1020)));
        assert!(platform.mmio.writes().is_empty());
    }

    #[test]
    fn test_trigger_decoding() {
        let (platform, registry) = setup(SimGic::default().with_espi(5000));
        let gic = Gic::new(&platform, &registry);

        // id 35: word 2, upper bit 7
        platform.mmio.poke(GICD + gicd::ICFGR + 8, 1 << 7);
        assert_eq!(gic.get_trigger_type(35), Ok(TriggerType::EdgeRising));
        assert_eq!(gic.get_trigger_type(36), Ok(TriggerType::LevelHigh));
        // Lower bit alone does not make an edge
        platform.mmio.poke(GICD + gicd::ICFGR + 8, 1 << 6);
        assert_eq!(gic.get_trigger_type(35), Ok(TriggerType::LevelHigh));

        assert_eq!(gic.get_trigger_type(1025), Err(GicError::InvalidIntId(1025)));
    }

    #[test]
    fn test_espi_trigger_bounds() {
        let (platform, registry) = setup(SimGic::default().with_espi(5000));
        let gic = Gic::new(&platform, &registry);

        assert_eq!(
            gic.get_espi_trigger_type(4095),
            Err(GicError::EspiOutOfRange { int_id: 4095, max: 5000 })
        );
        assert_eq!(gic.get_espi_trigger_type(4096), Ok(TriggerType::LevelHigh));

        platform.mmio.poke(GICD + gicd::ICFGRE + 4, 1 << 3);
        assert_eq!(gic.get_espi_trigger_type(4096 + 17), Ok(TriggerType::EdgeRising));
        assert!(gic.get_espi_trigger_type(5001).is_err());
    }

    #[test]
    fn test_espi_trigger_needs_espi_support() {
        let mut facts = SimGic::default().with_espi(5000);
        facts.espi_supported = false;
        let (platform, registry) = setup(facts);
        let gic = Gic::new(&platform, &registry);
        assert_eq!(
            gic.get_espi_trigger_type(4096),
            Err(GicError::EspiOutOfRange { int_id: 4096, max: 5000 })
        );
    }

    #[test]
    fn test_cpuif_init() {
        let (platform, registry) = setup(SimGic::default());
        Gic::new(&platform, &registry).cpuif_init();
        assert_eq!(platform.pe.sysreg(GicSysReg::Bpr1), Some(7));
        assert_eq!(platform.pe.sysreg(GicSysReg::Pmr), Some(0xFF));
        assert_eq!(platform.pe.sysreg(GicSysReg::Igrpen1), Some(1));
    }
}
