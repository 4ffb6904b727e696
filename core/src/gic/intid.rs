//! Interrupt identifier classification.
//!
//! The standard ranges are architectural constants. The extended ranges exist
//! only when the platform says so, so classification consults the platform's
//! facts before falling back to the fixed ranges.

use acs_pal::GicFirmware;

/// Last SGI
pub const SGI_END: u32 = 15;
/// Last PPI
pub const PPI_END: u32 = 31;
/// First SPI
pub const SPI_START: u32 = 32;
/// Last SPI
pub const SPI_END: u32 = 1019;
/// First extended PPI
pub const EPPI_START: u32 = 1056;
/// Last architecturally possible extended PPI
pub const EPPI_END: u32 = 1119;
/// First extended SPI
pub const ESPI_START: u32 = 4096;
/// Last architecturally possible extended SPI
pub const ESPI_END: u32 = 5119;

/// Range an interrupt id falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntIdRange {
    /// Software generated, 0-15
    Sgi,
    /// Private peripheral, 16-31
    Ppi,
    /// Shared peripheral, 32-1019
    Spi,
    /// Extended private peripheral (platform-reported)
    Eppi,
    /// Extended shared peripheral (platform-reported)
    Espi,
    /// Special, reserved, or an extended id the platform does not implement
    Unknown,
}

impl IntIdRange {
    /// Classify `int_id` against the platform's implemented ranges
    pub fn classify(int_id: u32, facts: &impl GicFirmware) -> Self {
        if facts.is_espi(int_id) {
            return Self::Espi;
        }
        if facts.is_eppi(int_id) {
            return Self::Eppi;
        }
        match int_id {
            0..=SGI_END => Self::Sgi,
            16..=PPI_END => Self::Ppi,
            SPI_START..=SPI_END => Self::Spi,
            _ => Self::Unknown,
        }
    }

    /// Handled by the distributor's standard bit arrays
    pub const fn is_standard(self) -> bool {
        matches!(self, Self::Sgi | Self::Ppi | Self::Spi)
    }

    /// Short name for diagnostics
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sgi => "SGI",
            Self::Ppi => "PPI",
            Self::Spi => "SPI",
            Self::Eppi => "EPPI",
            Self::Espi => "ESPI",
            Self::Unknown => "unknown",
        }
    }
}
