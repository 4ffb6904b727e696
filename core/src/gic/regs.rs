//! Interrupt controller register map.
//!
//! Offsets are relative to the base address resolved from the information
//! table. Only the registers the core touches are listed.

// =============================================================================
// DISTRIBUTOR (GICD)
// =============================================================================

/// Distributor register offsets
pub mod gicd {
    /// Distributor Control Register
    pub const CTLR: u64 = 0x0000;
    /// Interrupt Controller Type Register
    pub const TYPER: u64 = 0x0004;
    /// Interrupt Set-Enable Registers
    pub const ISENABLER: u64 = 0x0100;
    /// Interrupt Set-Pending Registers
    pub const ISPENDR: u64 = 0x0200;
    /// Interrupt Clear-Pending Registers
    pub const ICPENDR: u64 = 0x0280;
    /// Interrupt Set-Active Registers
    pub const ISACTIVER: u64 = 0x0300;
    /// Interrupt Clear-Active Registers
    pub const ICACTIVER: u64 = 0x0380;
    /// Interrupt Configuration Registers
    pub const ICFGR: u64 = 0x0C00;
    /// Extended SPI Set-Pending Registers
    pub const ISPENDRE: u64 = 0x1200;
    /// Extended SPI Clear-Pending Registers
    pub const ICPENDRE: u64 = 0x1400;
    /// Extended SPI Set-Active Registers
    pub const ISACTIVERE: u64 = 0x1600;
    /// Extended SPI Clear-Active Registers
    pub const ICACTIVERE: u64 = 0x1800;
    /// Extended SPI Configuration Registers
    pub const ICFGRE: u64 = 0x3000;
    /// Interrupt Routing Registers (64-bit, one per SPI)
    pub const IROUTER: u64 = 0x6000;
    /// Extended SPI Routing Registers (64-bit, one per extended SPI)
    pub const IROUTERE: u64 = 0x8000;
    /// Peripheral ID2 Register
    pub const PIDR2: u64 = 0xFFE8;

    /// CTLR: Disable Security
    pub const CTLR_DS: (u32, u32) = (6, 6);
    /// CTLR: Affinity routing enable, non-secure
    pub const CTLR_ARE_NS: (u32, u32) = (4, 4);
    /// CTLR: Group 1 enables
    pub const CTLR_ENABLE_GRP1: (u32, u32) = (0, 1);
    /// PIDR2: architecture revision
    pub const PIDR2_ARCH_REV: (u32, u32) = (4, 7);
    /// TYPER: ITLinesNumber
    pub const TYPER_IT_LINES: u32 = 0x1F;
}

// =============================================================================
// REDISTRIBUTOR (GICR)
// =============================================================================

/// Redistributor register offsets
pub mod gicr {
    /// Size of the RD_base frame; SGI_base follows it
    pub const RD_FRAME_SIZE: u64 = 0x1_0000;
    /// SGI/PPI Set-Enable Register 0 (in SGI_base)
    pub const ISENABLER0: u64 = 0x0100;
}

// =============================================================================
// CPU INTERFACE SYSTEM REGISTERS
// =============================================================================

/// Reset values written by CPU interface bring-up
pub mod icc {
    /// Binary point: no preemption
    pub const BPR1_INIT: u64 = 7;
    /// Priority mask: let everything through
    pub const PMR_INIT: u64 = 0xFF;
    /// Group 1 enable
    pub const IGRPEN1_INIT: u64 = 1;
}

/// Extract bits `[lo, hi]` (inclusive) of `word`
#[inline]
pub const fn extract_bits(word: u32, field: (u32, u32)) -> u32 {
    let (lo, hi) = field;
    let width = hi - lo + 1;
    if width >= 32 {
        word >> lo
    } else {
        (word >> lo) & ((1 << width) - 1)
    }
}

/// Word offset and bit position for a one-bit-per-interrupt array
#[inline]
pub const fn bit_slot(index: u32) -> (u64, u32) {
    ((index / 32) as u64 * 4, index % 32)
}

/// Word offset and bit position of the upper configuration bit for a
/// two-bits-per-interrupt array
#[inline]
pub const fn cfg_slot(index: u32) -> (u64, u32) {
    ((index / 16) as u64 * 4, 2 * (index % 16) + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bits() {
        assert_eq!(extract_bits(0x0000_0030, gicd::PIDR2_ARCH_REV), 3);
        assert_eq!(extract_bits(0x40, gicd::CTLR_DS), 1);
        assert_eq!(extract_bits(0x3, gicd::CTLR_ENABLE_GRP1), 3);
        assert_eq!(extract_bits(0xFFFF_FFFF, (0, 31)), 0xFFFF_FFFF);
    }

    #[test]
    fn test_slots() {
        assert_eq!(bit_slot(0), (0, 0));
        assert_eq!(bit_slot(31), (0, 31));
        assert_eq!(bit_slot(32), (4, 0));
        assert_eq!(bit_slot(1019), (124, 27));
        assert_eq!(cfg_slot(15), (0, 31));
        assert_eq!(cfg_slot(16), (4, 1));
    }
}
