//! # Simulated Platform
//!
//! An in-memory platform port. Registers are backed by a sparse word store,
//! every write is journaled, and PEs are run one after the other on the
//! calling thread. Used by the unit tests and by the host runner.

use crate::cpu::{GicSysReg, PeDispatcher, PeTopology};
use crate::firmware::{FirmwareInterface, FirmwareType};
use crate::interrupts::{GicFirmware, TriggerType};
use crate::mmio::RegisterAccess;
use crate::{PalError, PalResult, PhysAddr, PlatformAbstraction};
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};
use hashbrown::HashMap;
use spin::Mutex;

/// A journaled register write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegWrite {
    /// Target address
    pub addr: PhysAddr,
    /// Written value
    pub value: u64,
    /// Access width in bytes
    pub width: u8,
}

// =============================================================================
// Register file
// =============================================================================

/// Sparse register file, reads of unwritten words return zero
#[derive(Debug, Default)]
pub struct SimMmio {
    words: Mutex<HashMap<u64, u32>>,
    journal: Mutex<Vec<RegWrite>>,
}

impl SimMmio {
    /// Create an empty register file
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload a register without journaling it
    pub fn poke(&self, addr: u64, value: u32) {
        self.words.lock().insert(addr, value);
    }

    /// Read back a register without going through the trait
    pub fn peek(&self, addr: u64) -> u32 {
        self.words.lock().get(&addr).copied().unwrap_or(0)
    }

    /// All writes issued through [`RegisterAccess`], oldest first
    pub fn writes(&self) -> Vec<RegWrite> {
        self.journal.lock().clone()
    }

    /// Forget journaled writes
    pub fn clear_journal(&self) {
        self.journal.lock().clear();
    }
}

impl RegisterAccess for SimMmio {
    fn read32(&self, addr: PhysAddr) -> u32 {
        self.peek(addr.as_u64())
    }

    fn write32(&self, addr: PhysAddr, value: u32) {
        log::trace!("sim: write32 {:#x} <- {:#x}", addr, value);
        self.words.lock().insert(addr.as_u64(), value);
        self.journal.lock().push(RegWrite { addr, value: value as u64, width: 4 });
    }

    fn write64(&self, addr: PhysAddr, value: u64) {
        log::trace!("sim: write64 {:#x} <- {:#x}", addr, value);
        {
            let mut words = self.words.lock();
            words.insert(addr.as_u64(), value as u32);
            words.insert(addr.as_u64() + 4, (value >> 32) as u32);
        }
        self.journal.lock().push(RegWrite { addr, value, width: 8 });
    }
}

// =============================================================================
// PEs
// =============================================================================

/// Sequential PE model: every "PE" runs on the calling thread in index order
#[derive(Debug)]
pub struct SimPe {
    count: usize,
    current: AtomicUsize,
    invocations: AtomicUsize,
    sysregs: Mutex<HashMap<GicSysReg, u64>>,
}

impl SimPe {
    /// Create a model with `count` PEs
    pub fn new(count: usize) -> Self {
        Self {
            count,
            current: AtomicUsize::new(0),
            invocations: AtomicUsize::new(0),
            sysregs: Mutex::new(HashMap::new()),
        }
    }

    /// Number of payload invocations so far
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    /// Last value written to a GIC system register
    pub fn sysreg(&self, reg: GicSysReg) -> Option<u64> {
        self.sysregs.lock().get(&reg).copied()
    }
}

impl PeTopology for SimPe {
    fn current_index(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    fn pe_count(&self) -> usize {
        self.count
    }

    fn mpidr(&self, index: usize) -> u64 {
        // Four PEs per cluster
        let aff0 = (index % 4) as u64;
        let aff1 = (index / 4) as u64;
        (1 << 31) | (aff1 << 8) | aff0
    }

    fn write_gic_sysreg(&self, reg: GicSysReg, value: u64) {
        self.sysregs.lock().insert(reg, value);
    }
}

impl PeDispatcher for SimPe {
    fn run_on_pes(&self, pe_count: usize, payload: &(dyn Fn(usize) + Sync)) {
        for index in 0..pe_count.min(self.count) {
            self.current.store(index, Ordering::SeqCst);
            self.invocations.fetch_add(1, Ordering::SeqCst);
            payload(index);
        }
        self.current.store(0, Ordering::SeqCst);
    }
}

// =============================================================================
// Interrupt controller facts
// =============================================================================

/// Configurable interrupt controller facts
#[derive(Debug, Clone)]
pub struct SimGic {
    /// Extended SPI range implemented
    pub espi_supported: bool,
    /// Largest extended SPI id
    pub max_espi: u32,
    /// Largest extended PPI id
    pub max_eppi: u32,
    /// Whether `set_trigger` succeeds
    pub trigger_programmable: bool,
    /// Whether the MSI frame description parses
    pub msi_frames_valid: bool,
}

/// First extended SPI id
const ESPI_BASE: u32 = 4096;
/// First extended PPI id
const EPPI_BASE: u32 = 1056;

impl Default for SimGic {
    fn default() -> Self {
        Self {
            espi_supported: false,
            max_espi: 0,
            max_eppi: 0,
            trigger_programmable: true,
            msi_frames_valid: true,
        }
    }
}

impl SimGic {
    /// Enable the extended SPI range up to `max_espi`
    pub fn with_espi(mut self, max_espi: u32) -> Self {
        self.espi_supported = true;
        self.max_espi = max_espi;
        self
    }

    /// Enable the extended PPI range up to `max_eppi`
    pub fn with_eppi(mut self, max_eppi: u32) -> Self {
        self.max_eppi = max_eppi;
        self
    }
}

impl GicFirmware for SimGic {
    fn espi_supported(&self) -> bool {
        self.espi_supported
    }

    fn max_espi(&self) -> u32 {
        self.max_espi
    }

    fn max_eppi(&self) -> u32 {
        self.max_eppi
    }

    fn is_espi(&self, int_id: u32) -> bool {
        self.espi_supported && int_id >= ESPI_BASE && int_id <= self.max_espi
    }

    fn is_eppi(&self, int_id: u32) -> bool {
        self.max_eppi != 0 && int_id >= EPPI_BASE && int_id <= self.max_eppi
    }

    fn set_trigger(&self, _int_id: u32, _trigger: TriggerType) -> PalResult<()> {
        if self.trigger_programmable {
            Ok(())
        } else {
            Err(PalError::NotSupported)
        }
    }

    fn parse_msi_frames(&self) -> PalResult<()> {
        if self.msi_frames_valid {
            Ok(())
        } else {
            Err(PalError::FirmwareTableError)
        }
    }

    fn init(&self) -> PalResult<()> {
        Ok(())
    }
}

// =============================================================================
// Firmware tables
// =============================================================================

/// Firmware producer that hands out pre-serialized tables
#[derive(Debug, Clone)]
pub struct SimFirmware {
    /// Reported firmware type
    pub firmware_type: FirmwareType,
    /// Serialized interrupt controller table
    pub gic_table: Vec<u8>,
    /// Serialized PCIe table
    pub pcie_table: Vec<u8>,
}

impl Default for SimFirmware {
    fn default() -> Self {
        Self {
            firmware_type: FirmwareType::Acpi,
            gic_table: Vec::new(),
            pcie_table: Vec::new(),
        }
    }
}

fn copy_table(src: &[u8], buf: &mut Vec<u8>, capacity: usize) -> PalResult<()> {
    if src.len() > capacity {
        return Err(PalError::BufferTooSmall);
    }
    buf.clear();
    buf.extend_from_slice(src);
    Ok(())
}

impl FirmwareInterface for SimFirmware {
    fn firmware_type(&self) -> FirmwareType {
        self.firmware_type
    }

    fn create_gic_info_table(&self, buf: &mut Vec<u8>, capacity: usize) -> PalResult<()> {
        copy_table(&self.gic_table, buf, capacity)
    }

    fn create_pcie_info_table(&self, buf: &mut Vec<u8>, capacity: usize) -> PalResult<()> {
        copy_table(&self.pcie_table, buf, capacity)
    }
}

// =============================================================================
// Aggregate
// =============================================================================

/// Complete simulated platform
#[derive(Debug)]
pub struct SimPlatform {
    /// Register file
    pub mmio: SimMmio,
    /// PE model
    pub pe: SimPe,
    /// Interrupt controller facts
    pub gic: SimGic,
    /// Table producer
    pub firmware: SimFirmware,
}

impl SimPlatform {
    /// Create a platform with `pe_count` PEs and default facts
    pub fn new(pe_count: usize) -> Self {
        Self {
            mmio: SimMmio::new(),
            pe: SimPe::new(pe_count),
            gic: SimGic::default(),
            firmware: SimFirmware::default(),
        }
    }

    /// Replace the interrupt controller facts
    pub fn with_gic(mut self, gic: SimGic) -> Self {
        self.gic = gic;
        self
    }

    /// Replace the table producer
    pub fn with_firmware(mut self, firmware: SimFirmware) -> Self {
        self.firmware = firmware;
        self
    }
}

impl PlatformAbstraction for SimPlatform {
    type Mmio = SimMmio;
    type Pe = SimPe;
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
        "simulated"
    }
}
