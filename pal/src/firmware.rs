//! # Firmware Interface Abstraction
//!
//! Producers of the information tables. A port walks ACPI or the device tree
//! and serializes what it found into the table layout the core consumes.

use crate::PalResult;
use alloc::vec::Vec;

/// Firmware table producer
pub trait FirmwareInterface: Send + Sync {
    /// Where the hardware description comes from
    fn firmware_type(&self) -> FirmwareType;

    /// Serialize the interrupt controller information table into `buf`
    ///
    /// The buffer is cleared first; at most `capacity` bytes may be written.
    fn create_gic_info_table(&self, buf: &mut Vec<u8>, capacity: usize) -> PalResult<()>;

    /// Serialize the PCIe information table into `buf`
    fn create_pcie_info_table(&self, buf: &mut Vec<u8>, capacity: usize) -> PalResult<()>;
}

/// Firmware type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareType {
    /// ACPI tables
    Acpi,
    /// Device Tree
    DeviceTree,
}

impl FirmwareType {
    /// Is this a device-tree target
    pub const fn is_dt(self) -> bool {
        matches!(self, Self::DeviceTree)
    }
}
