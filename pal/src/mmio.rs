//! # Register Access
//!
//! Memory-mapped register primitives. The core only ever issues accesses at
//! addresses derived from table-resolved base addresses plus
//! architecture-defined offsets.

use crate::PhysAddr;

/// Memory-mapped register access
pub trait RegisterAccess: Send + Sync {
    /// Read a 32-bit register
    fn read32(&self, addr: PhysAddr) -> u32;

    /// Write a 32-bit register
    fn write32(&self, addr: PhysAddr, value: u32);

    /// Write a 64-bit register
    fn write64(&self, addr: PhysAddr, value: u64);
}
