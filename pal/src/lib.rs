//! # ACS PAL - Platform Abstraction Layer
//!
//! This crate defines the traits through which the compliance core talks to
//! the platform. Every platform port (UEFI, Linux driver, bare metal, or the
//! in-memory simulator used by the tests) implements these traits.
//!
//! ## Design Philosophy
//!
//! The PAL is designed to be:
//! - **Narrow**: register access, PE enumeration/dispatch, firmware tables
//! - **Producer-only for tables**: the PAL fills information tables once,
//!   the core owns them read-only afterwards
//! - **Safe**: raw MMIO lives behind [`RegisterAccess`]

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

pub mod cpu;
pub mod firmware;
pub mod interrupts;
pub mod mmio;

// In-memory platform (tests and host runs)
pub mod sim;

pub use cpu::{GicSysReg, PeDispatcher, PeTopology};
pub use firmware::{FirmwareInterface, FirmwareType};
pub use interrupts::{GicFirmware, TriggerType};
pub use mmio::RegisterAccess;

/// Result type for PAL operations
pub type PalResult<T> = Result<T, PalError>;

/// Errors that can be reported by a platform port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PalError {
    /// The operation is not supported on this platform
    NotSupported,
    /// Invalid parameter provided
    InvalidParameter,
    /// Hardware reported an error
    HardwareError,
    /// Firmware description could not be parsed
    FirmwareTableError,
    /// Caller-supplied buffer cannot hold the table
    BufferTooSmall,
    /// Feature not initialized
    NotInitialized,
}

impl core::fmt::Display for PalError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            Self::NotSupported => "operation not supported by platform",
            Self::InvalidParameter => "invalid parameter",
            Self::HardwareError => "hardware error",
            Self::FirmwareTableError => "firmware table parse error",
            Self::BufferTooSmall => "table buffer too small",
            Self::NotInitialized => "platform not initialized",
        };
        f.write_str(msg)
    }
}

/// The aggregate platform trait the compliance core is generic over
///
/// Mirrors the split of the platform into register access, PE management,
/// interrupt-controller firmware facts and firmware table producers.
pub trait PlatformAbstraction: Send + Sync {
    /// Register access type
    type Mmio: RegisterAccess;

    /// PE enumeration and dispatch type
    type Pe: PeTopology + PeDispatcher;

    /// Interrupt controller firmware facts
    type Gic: GicFirmware;

    /// Firmware table producer type
    type Firmware: FirmwareInterface;

    /// Get the register access collaborator
    fn mmio(&self) -> &Self::Mmio;

    /// Get the PE collaborator
    fn pe(&self) -> &Self::Pe;

    /// Get the interrupt controller firmware facts
    fn gic(&self) -> &Self::Gic;

    /// Get the firmware table producer
    fn firmware(&self) -> &Self::Firmware;

    /// Platform name, for the banner
    fn name(&self) -> &'static str;
}

/// Physical address type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct PhysAddr(u64);

impl PhysAddr {
    /// The not-found value returned by base-address lookups
    pub const NULL: Self = Self(0);

    /// Create a new physical address
    #[inline]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Get the raw address value
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// True for the not-found value
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Check if the address is aligned to the given alignment
    #[inline]
    pub const fn is_aligned(self, align: u64) -> bool {
        self.0 % align == 0
    }

    /// Add an offset to the address
    #[inline]
    pub const fn add(self, offset: u64) -> Self {
        Self(self.0.wrapping_add(offset))
    }
}

impl core::fmt::LowerHex for PhysAddr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::LowerHex::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phys_addr() {
        let base = PhysAddr::new(0x2f00_0000);
        assert!(base.is_aligned(0x1_0000));
        assert_eq!(base.add(0x100).as_u64(), 0x2f00_0100);
        assert!(PhysAddr::NULL.is_null());
        assert!(!base.is_null());
    }
}
