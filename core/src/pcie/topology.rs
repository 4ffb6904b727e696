//! # Topology Queries
//!
//! Configuration-space access through ECAM and the relationship queries the
//! PCIe checks are written against.

use super::caps::{read16, CapabilityIter, CapabilityKind, CID_PCIECS};
use super::registry::PcieRegistry;
use super::{Bdf, PcieError, PcieResult};
use acs_pal::{PhysAddr, PlatformAbstraction, RegisterAccess};

/// Size of one function's configuration space
pub const CFG_SPACE_SIZE: u16 = 4096;

/// Class code register (revision id in the low byte)
const CLASS_OFFSET: u16 = 0x08;
/// Primary/secondary/subordinate bus numbers (type 1 header)
const BUS_NUMBERS_OFFSET: u16 = 0x18;
/// Host bridge: base class 0x06, subclass 0x00
const CLASS_HOST_BRIDGE: u32 = 0x0600;

/// Device/port type from the PCI Express Capabilities register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortType {
    /// PCI Express endpoint
    Endpoint,
    /// Legacy PCI Express endpoint
    LegacyEndpoint,
    /// Root port of a root complex
    RootPort,
    /// Upstream port of a switch
    SwitchUpstream,
    /// Downstream port of a switch
    SwitchDownstream,
    /// PCI Express to PCI/PCI-X bridge
    PcieToPciBridge,
    /// PCI/PCI-X to PCI Express bridge
    PciToPcieBridge,
    /// Root complex integrated endpoint
    RciEp,
    /// Root complex event collector
    RcEc,
    /// Reserved encoding
    Reserved(u8),
}

impl PortType {
    /// Decode bits [7:4] of the PCI Express Capabilities register
    pub const fn from_field(field: u8) -> Self {
        match field {
            0x0 => Self::Endpoint,
            0x1 => Self::LegacyEndpoint,
            0x4 => Self::RootPort,
            0x5 => Self::SwitchUpstream,
            0x6 => Self::SwitchDownstream,
            0x7 => Self::PcieToPciBridge,
            0x8 => Self::PciToPcieBridge,
            0x9 => Self::RciEp,
            0xA => Self::RcEc,
            other => Self::Reserved(other),
        }
    }
}

/// PCIe topology bound to a platform and a registry
#[derive(Debug)]
pub struct Topology<'a, P: PlatformAbstraction> {
    platform: &'a P,
    registry: &'a PcieRegistry,
}

impl<'a, P: PlatformAbstraction> Topology<'a, P> {
    /// Bind a topology view
    pub const fn new(platform: &'a P, registry: &'a PcieRegistry) -> Self {
        Self { platform, registry }
    }

    /// The backing registry
    pub fn registry(&self) -> &'a PcieRegistry {
        self.registry
    }

    /// Physical address of `offset` in the configuration space of `bdf`
    pub fn cfg_addr(&self, bdf: Bdf, offset: u16) -> PcieResult<PhysAddr> {
        if offset >= CFG_SPACE_SIZE {
            return Err(PcieError::InvalidOffset(offset));
        }
        let ecam = self.registry.ecam_for(bdf).ok_or(PcieError::NoEcam(bdf))?;
        let rel = ((bdf.bus() - ecam.start_bus) as u64) << 20
            | (bdf.device() as u64) << 15
            | (bdf.function() as u64) << 12
            | offset as u64;
        Ok(ecam.base.add(rel))
    }

    /// Read a configuration word; `offset` is rounded down to 4 bytes
    pub fn read_cfg(&self, bdf: Bdf, offset: u16) -> PcieResult<u32> {
        let addr = self.cfg_addr(bdf, offset & !3)?;
        Ok(self.platform.mmio().read32(addr))
    }

    /// Write a configuration word; `offset` is rounded down to 4 bytes
    pub fn write_cfg(&self, bdf: Bdf, offset: u16, value: u32) -> PcieResult<()> {
        let addr = self.cfg_addr(bdf, offset & !3)?;
        self.platform.mmio().write32(addr, value);
        Ok(())
    }

    /// Walk one capability list of `bdf`
    pub fn capabilities(&self, bdf: Bdf, kind: CapabilityKind) -> PcieResult<CapabilityIter<'a, P::Mmio>> {
        let func_base = self.cfg_addr(bdf, 0)?;
        Ok(CapabilityIter::new(self.platform.mmio(), func_base, kind))
    }

    /// Offset of capability `id` in the `kind` list, `None` if absent
    pub fn find_capability(&self, bdf: Bdf, kind: CapabilityKind, id: u16) -> PcieResult<Option<u16>> {
        Ok(self
            .capabilities(bdf, kind)?
            .find(|cap| cap.id == id)
            .map(|cap| cap.offset))
    }

    /// Device/port type of a PCI Express function
    pub fn device_port_type(&self, bdf: Bdf) -> PcieResult<PortType> {
        let cap = self
            .find_capability(bdf, CapabilityKind::Standard, CID_PCIECS)?
            .ok_or(PcieError::NotExpress(bdf))?;
        let func_base = self.cfg_addr(bdf, 0)?;
        let caps_reg = read16(self.platform.mmio(), func_base, cap + 2);
        Ok(PortType::from_field(((caps_reg >> 4) & 0xF) as u8))
    }

    /// Whether `bdf` is a host bridge
    pub fn is_host_bridge(&self, bdf: Bdf) -> PcieResult<bool> {
        let class = self.read_cfg(bdf, CLASS_OFFSET)? >> 16;
        Ok(class == CLASS_HOST_BRIDGE)
    }

    /// Root port whose bus window contains `bdf`, if any
    pub fn parent_root_port(&self, bdf: Bdf) -> PcieResult<Option<Bdf>> {
        for candidate in self.registry.functions() {
            if candidate == bdf || candidate.segment() != bdf.segment() {
                continue;
            }
            if !matches!(self.device_port_type(candidate), Ok(PortType::RootPort)) {
                continue;
            }
            let buses = self.read_cfg(candidate, BUS_NUMBERS_OFFSET)?;
            let secondary = ((buses >> 8) & 0xFF) as u8;
            let subordinate = ((buses >> 16) & 0xFF) as u8;
            if (secondary..=subordinate).contains(&bdf.bus()) {
                log::debug!("PCIe: {} sits below root port {}", bdf, candidate);
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcie::caps::{CID_MSI, STATUS_CAP_LIST};
    use crate::pcie::table::{PcieHeader, PcieInfoTableBuilder, PcieRecord};
    use acs_pal::sim::SimPlatform;

    const ECAM: u64 = 0x4000_0000;

    fn fn_base(bdf: Bdf) -> u64 {
        ECAM + ((bdf.bus() as u64) << 20 | (bdf.device() as u64) << 15 | (bdf.function() as u64) << 12)
    }

    /// Give `bdf` a PCIe capability of `port` type at 0x40, optionally followed by MSI at 0x60
    fn express_function(platform: &SimPlatform, bdf: Bdf, port: u8, msi: bool) {
        let base = fn_base(bdf);
        platform.mmio.poke(base + 0x04, STATUS_CAP_LIST << 16);
        platform.mmio.poke(base + 0x34, 0x40);
        let next = if msi { 0x60 } else { 0 };
        platform.mmio.poke(base + 0x40, ((port as u32) << 20) | (next << 8) | CID_PCIECS as u32);
        if msi {
            platform.mmio.poke(base + 0x60, CID_MSI as u32);
        }
    }

    fn pcie_table(functions: &[Bdf]) -> alloc::vec::Vec<u8> {
        let mut builder = PcieInfoTableBuilder::new(PcieHeader { num_ecam: 1, num_functions: functions.len() as u32 })
            .record(PcieRecord::ecam(ECAM, 0, 0, 0xFF));
        for &bdf in functions {
            builder = builder.record(PcieRecord::function(bdf));
        }
        builder.build().to_bytes()
    }

    #[test]
    fn test_ecam_addressing() {
        let platform = SimPlatform::new(1);
        let registry = PcieRegistry::new();
        let bytes = PcieInfoTableBuilder::new(PcieHeader { num_ecam: 1, num_functions: 0 })
            .record(PcieRecord::ecam(ECAM, 0, 0x10, 0x1F))
            .build()
            .to_bytes();
        registry.create(&bytes).unwrap();
        let topo = Topology::new(&platform, &registry);

        let addr = topo.cfg_addr(Bdf::new(0, 0x11, 2, 3), 0x10).unwrap();
        assert_eq!(addr.as_u64(), ECAM + (1 << 20 | 2 << 15 | 3 << 12 | 0x10));
        assert_eq!(topo.cfg_addr(Bdf::new(0, 0x20, 0, 0), 0), Err(PcieError::NoEcam(Bdf::new(0, 0x20, 0, 0))));
        assert_eq!(topo.cfg_addr(Bdf::new(0, 0x10, 0, 0), 4096), Err(PcieError::InvalidOffset(4096)));
    }

    #[test]
    fn test_port_type_and_host_bridge() {
        let platform = SimPlatform::new(1);
        let registry = PcieRegistry::new();
        let rciep = Bdf::new(0, 0, 1, 0);
        let hb = Bdf::new(0, 0, 0, 0);
        registry.create(&pcie_table(&[hb, rciep])).unwrap();
        express_function(&platform, rciep, 0x9, true);
        platform.mmio.poke(fn_base(hb) + 0x08, 0x0600_0000);
        let topo = Topology::new(&platform, &registry);

        assert_eq!(topo.device_port_type(rciep), Ok(PortType::RciEp));
        assert_eq!(topo.find_capability(rciep, CapabilityKind::Standard, CID_MSI), Ok(Some(0x60)));
        assert_eq!(topo.device_port_type(hb), Err(PcieError::NotExpress(hb)));
        assert_eq!(topo.is_host_bridge(hb), Ok(true));
        assert_eq!(topo.is_host_bridge(rciep), Ok(false));
    }

    #[test]
    fn test_parent_root_port() {
        let platform = SimPlatform::new(1);
        let registry = PcieRegistry::new();
        let rp = Bdf::new(0, 0, 2, 0);
        let ep = Bdf::new(0, 3, 0, 0);
        let orphan = Bdf::new(0, 9, 0, 0);
        registry.create(&pcie_table(&[rp, ep, orphan])).unwrap();
        express_function(&platform, rp, 0x4, false);
        express_function(&platform, ep, 0x0, true);
        // secondary 1, subordinate 4
        platform.mmio.poke(fn_base(rp) + 0x18, 0x0004_0100);
        let topo = Topology::new(&platform, &registry);

        assert_eq!(topo.parent_root_port(ep), Ok(Some(rp)));
        assert_eq!(topo.parent_root_port(orphan), Ok(None));
    }

    #[test]
    fn test_cfg_write_lands_in_function_space() {
        let platform = SimPlatform::new(1);
        let registry = PcieRegistry::new();
        let bdf = Bdf::new(0, 1, 0, 0);
        registry.create(&pcie_table(&[bdf])).unwrap();
        let topo = Topology::new(&platform, &registry);

        topo.write_cfg(bdf, 0x12, 0xCAFE_F00D).unwrap();
        assert_eq!(platform.mmio.peek(fn_base(bdf) + 0x10), 0xCAFE_F00D);
        assert_eq!(topo.read_cfg(bdf, 0x10), Ok(0xCAFE_F00D));
    }
}
