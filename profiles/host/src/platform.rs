//! # Host Platform
//!
//! The simulated register file and table producer from `acs-pal`, with PEs
//! backed by real threads: every payload invocation runs on its own scoped
//! thread and the dispatcher joins them all before returning.

use acs_core::gic::regs::{gicd, gicr};
use acs_core::gic::{GicHeader, GicInfoTableBuilder, GicRecord, GicRecordType};
use acs_core::pcie::caps::{CID_MSI, CID_PCIECS, STATUS_CAP_LIST};
use acs_core::pcie::{Bdf, PcieHeader, PcieInfoTableBuilder, PcieRecord};
use acs_pal::sim::{SimFirmware, SimGic, SimMmio};
use acs_pal::{GicSysReg, PeDispatcher, PeTopology, PlatformAbstraction};
use spin::Mutex;
use std::cell::Cell;
use std::collections::HashMap;

thread_local! {
    static CURRENT_PE: Cell<usize> = const { Cell::new(0) };
}

/// PEs in one affinity-1 cluster
const PES_PER_CLUSTER: usize = 4;

// =============================================================================
// Threaded PEs
// =============================================================================

/// One OS thread per PE, per dispatch
#[derive(Debug)]
pub struct ThreadedPe {
    count: usize,
    sysregs: Mutex<HashMap<(usize, GicSysReg), u64>>,
}

impl ThreadedPe {
    /// Create a dispatcher over `count` PEs
    pub fn new(count: usize) -> Self {
        Self { count, sysregs: Mutex::new(HashMap::new()) }
    }

    /// Value last written to `reg` on PE `index`
    #[cfg(test)]
    pub fn sysreg(&self, index: usize, reg: GicSysReg) -> Option<u64> {
        self.sysregs.lock().get(&(index, reg)).copied()
    }
}

impl PeTopology for ThreadedPe {
    fn current_index(&self) -> usize {
        CURRENT_PE.with(Cell::get)
    }

    fn pe_count(&self) -> usize {
        self.count
    }

    fn mpidr(&self, index: usize) -> u64 {
        let aff0 = (index % PES_PER_CLUSTER) as u64;
        let aff1 = (index / PES_PER_CLUSTER) as u64;
        (1 << 31) | (aff1 << 8) | aff0
    }

    fn write_gic_sysreg(&self, reg: GicSysReg, value: u64) {
        let index = self.current_index();
        log::trace!("PE {}: {} <- {:#x}", index, reg.name(), value);
        self.sysregs.lock().insert((index, reg), value);
    }
}

impl PeDispatcher for ThreadedPe {
    fn run_on_pes(&self, pe_count: usize, payload: &(dyn Fn(usize) + Sync)) {
        std::thread::scope(|scope| {
            for index in 0..pe_count.min(self.count) {
                scope.spawn(move || {
                    CURRENT_PE.with(|pe| pe.set(index));
                    payload(index);
                });
            }
        });
    }
}

// =============================================================================
// Platform
// =============================================================================

/// Simulated registers and tables, threaded PEs
#[derive(Debug)]
pub struct HostPlatform {
    mmio: SimMmio,
    pe: ThreadedPe,
    gic: SimGic,
    firmware: SimFirmware,
}

impl PlatformAbstraction for HostPlatform {
    type Mmio = SimMmio;
    type Pe = ThreadedPe;
    type Gic = SimGic;
    type Firmware = SimFirmware;

    fn mmio(&self) -> &Self::Mmio {
        &self.mmio
    }

    fn pe(&self) -> &Self::Pe {
        &self.pe
    }

    fn gic(&self) -> &Self::Gic {
        &self.gic
    }

    fn firmware(&self) -> &Self::Firmware {
        &self.firmware
    }

    fn name(&self) -> &'static str {
        "host"
    }
}

// =============================================================================
// Demo machine
// =============================================================================

const GICD_BASE: u64 = 0x2f00_0000;
const GICR_BASE: u64 = 0x2f10_0000;
const GICR_LENGTH: u32 = 0x10_0000;
const ITS_BASE: u64 = 0x2f02_0000;
const GICH_BASE: u64 = 0x2c01_0000;
const ECAM_BASE: u64 = 0x4000_0000;

const HOST_BRIDGE: Bdf = Bdf::new(0, 0, 0, 0);
const RCIEP: Bdf = Bdf::new(0, 0, 1, 0);
const ROOT_PORT: Bdf = Bdf::new(0, 0, 2, 0);

/// Device/port type field values
const PORT_TYPE_ROOT_PORT: u32 = 0x4;
const PORT_TYPE_RCIEP: u32 = 0x9;

fn cfg_base(bdf: Bdf) -> u64 {
    ECAM_BASE
        + ((bdf.bus() as u64) << 20 | (bdf.device() as u64) << 15 | (bdf.function() as u64) << 12)
}

fn gic_table() -> Vec<u8> {
    let header = GicHeader {
        gic_version: 3,
        num_gicd: 1,
        num_gicrd: 1,
        num_its: 1,
        num_msi_frame: 0,
        num_gich: 1,
    };
    GicInfoTableBuilder::new(header)
        .record(GicRecord::new(GicRecordType::Distributor, GICD_BASE))
        .record(GicRecord::new(GicRecordType::GicrRedistributor, GICR_BASE).with_length(GICR_LENGTH))
        .record(GicRecord::new(GicRecordType::Its, ITS_BASE).with_entry_id(0))
        .record(GicRecord::new(GicRecordType::Hypervisor, GICH_BASE))
        .build()
        .to_bytes()
}

fn pcie_table() -> Vec<u8> {
    let functions = [HOST_BRIDGE, RCIEP, ROOT_PORT];
    let header = PcieHeader { num_ecam: 1, num_functions: functions.len() as u32 };
    functions
        .iter()
        .fold(
            PcieInfoTableBuilder::new(header).record(PcieRecord::ecam(ECAM_BASE, 0, 0, 0xFF)),
            |builder, &bdf| builder.record(PcieRecord::function(bdf)),
        )
        .build()
        .to_bytes()
}

/// PCI Express capability at 0x40, chained to MSI at 0x60 when asked
fn express_function(mmio: &SimMmio, bdf: Bdf, port_type: u32, msi: bool) {
    let base = cfg_base(bdf);
    mmio.poke(base + 0x04, STATUS_CAP_LIST << 16);
    mmio.poke(base + 0x34, 0x40);
    let next = if msi { 0x60 } else { 0 };
    mmio.poke(base + 0x40, port_type << 20 | next << 8 | CID_PCIECS as u32);
    if msi {
        mmio.poke(base + 0x60, CID_MSI as u32);
    }
}

/// A GICv3 machine with one ITS and a small root complex
///
/// `espi_max` enables the extended SPI range up to that id.
pub fn demo(pe_count: usize, espi_max: Option<u32>) -> HostPlatform {
    let mmio = SimMmio::new();

    // Affinity routing on, group 1 enabled, every SGI visible to non-secure
    mmio.poke(GICD_BASE + gicd::CTLR, 1 << 4 | 0x3);
    mmio.poke(GICD_BASE + gicd::TYPER, 0x1F);
    mmio.poke(GICD_BASE + gicd::PIDR2, 3 << 4);
    mmio.poke(GICR_BASE + gicr::RD_FRAME_SIZE + gicr::ISENABLER0, 0xFFFF);

    mmio.poke(cfg_base(HOST_BRIDGE) + 0x08, 0x0600_0000);
    express_function(&mmio, RCIEP, PORT_TYPE_RCIEP, true);
    express_function(&mmio, ROOT_PORT, PORT_TYPE_ROOT_PORT, false);
    mmio.poke(cfg_base(ROOT_PORT) + 0x18, 0x0001_0100);

    let gic = match espi_max {
        Some(max) => SimGic::default().with_espi(max),
        None => SimGic::default(),
    };

    HostPlatform {
        mmio,
        pe: ThreadedPe::new(pe_count),
        gic,
        firmware: SimFirmware { gic_table: gic_table(), pcie_table: pcie_table(), ..SimFirmware::default() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_threads_see_their_own_index() {
        let pe = ThreadedPe::new(4);
        let seen = AtomicUsize::new(0);
        pe.run_on_pes(4, &|index| {
            assert_eq!(pe.current_index(), index);
            seen.fetch_or(1 << index, Ordering::SeqCst);
        });
        assert_eq!(seen.load(Ordering::SeqCst), 0b1111);
    }

    #[test]
    fn test_dispatch_clamped_to_count() {
        let pe = ThreadedPe::new(2);
        let calls = AtomicUsize::new(0);
        pe.run_on_pes(8, &|_| {
            calls.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_sysregs_are_per_pe() {
        let pe = ThreadedPe::new(2);
        pe.run_on_pes(2, &|index| pe.write_gic_sysreg(GicSysReg::Pmr, index as u64 + 1));
        assert_eq!(pe.sysreg(0, GicSysReg::Pmr), Some(1));
        assert_eq!(pe.sysreg(1, GicSysReg::Pmr), Some(2));
    }

    #[test]
    fn test_mpidr_clusters() {
        let pe = ThreadedPe::new(8);
        assert_eq!(pe.mpidr(5) & 0xFFFF, 1 << 8 | 1);
    }
}
