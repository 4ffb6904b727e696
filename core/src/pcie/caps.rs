//! # Capability Lists
//!
//! Walks the standard capability list (from the Capabilities Pointer at
//! 0x34) and the extended capability list (from 0x100) of one function.
//!
//! Both walks are bounded so a malformed list cannot loop forever.

use acs_pal::{PhysAddr, RegisterAccess};

/// Status register (upper half of the word at 0x04)
pub const STATUS_OFFSET: u16 = 0x04;
/// Status: capabilities list present
pub const STATUS_CAP_LIST: u32 = 1 << 4;
/// Capabilities Pointer
pub const CAP_PTR_OFFSET: u16 = 0x34;
/// First extended capability
pub const EXT_CAP_START: u16 = 0x100;

/// MSI
pub const CID_MSI: u16 = 0x05;
/// PCI Express
pub const CID_PCIECS: u16 = 0x10;
/// MSI-X
pub const CID_MSIX: u16 = 0x11;

/// Advanced Error Reporting
pub const ECID_AER: u16 = 0x0001;
/// Access Control Services
pub const ECID_ACS: u16 = 0x000D;

/// Which capability list to walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityKind {
    /// Standard list in the first 256 bytes
    Standard,
    /// Extended list from 0x100
    Extended,
}

/// One capability header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capability {
    /// Capability id
    pub id: u16,
    /// Config-space offset of the header
    pub offset: u16,
}

/// Iterator over the capabilities of one function
#[derive(Debug)]
pub struct CapabilityIter<'a, M: RegisterAccess> {
    mmio: &'a M,
    func_base: PhysAddr,
    kind: CapabilityKind,
    next: u16,
    /// Entries left before the list is considered malformed
    remaining: u16,
}

impl<'a, M: RegisterAccess> CapabilityIter<'a, M> {
    /// Standard list bound, same as Linux's `PCI_FIND_CAP_TTL`
    const MAX_CAPS: u16 = 48;
    /// Extended list bound: one header per 8 bytes of extended space
    const MAX_EXT_CAPS: u16 = (4096 - 256) / 8;

    /// Start a walk over the function whose config space begins at `func_base`
    pub fn new(mmio: &'a M, func_base: PhysAddr, kind: CapabilityKind) -> Self {
        let (next, remaining) = match kind {
            CapabilityKind::Standard => {
                let status = mmio.read32(func_base.add(STATUS_OFFSET as u64)) >> 16;
                let first = if status & STATUS_CAP_LIST != 0 {
                    read8(mmio, func_base, CAP_PTR_OFFSET) & 0xFC
                } else {
                    0
                };
                (first, Self::MAX_CAPS)
            }
            CapabilityKind::Extended => (EXT_CAP_START, Self::MAX_EXT_CAPS),
        };
        Self { mmio, func_base, kind, next, remaining }
    }
}

impl<M: RegisterAccess> Iterator for CapabilityIter<'_, M> {
    type Item = Capability;

    fn next(&mut self) -> Option<Capability> {
        if self.next == 0 || self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let offset = self.next;

        match self.kind {
            CapabilityKind::Standard => {
                let id = read8(self.mmio, self.func_base, offset);
                self.next = read8(self.mmio, self.func_base, offset + 1) & 0xFC;
                Some(Capability { id, offset })
            }
            CapabilityKind::Extended => {
                let header = self.mmio.read32(self.func_base.add(offset as u64));
                if header == 0 || header == 0xFFFF_FFFF {
                    self.next = 0;
                    return None;
                }
                self.next = ((header >> 20) & 0xFFC) as u16;
                if self.next != 0 && self.next < EXT_CAP_START {
                    self.next = 0;
                }
                Some(Capability { id: (header & 0xFFFF) as u16, offset })
            }
        }
    }
}

/// Read one byte of config space through aligned word access
pub(crate) fn read8<M: RegisterAccess>(mmio: &M, func_base: PhysAddr, offset: u16) -> u16 {
    let word = mmio.read32(func_base.add((offset & !3) as u64));
    ((word >> ((offset & 3) * 8)) & 0xFF) as u16
}

/// Read two bytes of config space through aligned word access
pub(crate) fn read16<M: RegisterAccess>(mmio: &M, func_base: PhysAddr, offset: u16) -> u16 {
    let word = mmio.read32(func_base.add((offset & !3) as u64));
    ((word >> ((offset & 2) * 8)) & 0xFFFF) as u16
}
