//! # Interrupt Controller Firmware Facts
//!
//! Facts about the interrupt controller that only the platform knows:
//! whether the extended ranges exist, their bounds, and trigger policy.

use crate::PalResult;

/// Interrupt trigger type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerType {
    /// Level-sensitive, active high
    LevelHigh,
    /// Edge-triggered, rising edge
    EdgeRising,
}

impl TriggerType {
    /// Short name for reports
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LevelHigh => "level-high",
            Self::EdgeRising => "edge-rising",
        }
    }
}

/// Interrupt controller facts supplied by the platform
pub trait GicFirmware: Send + Sync {
    /// Is the extended SPI range implemented
    fn espi_supported(&self) -> bool;

    /// Largest implemented extended SPI id (0 if none)
    fn max_espi(&self) -> u32;

    /// Largest implemented extended PPI id (0 if none)
    fn max_eppi(&self) -> u32;

    /// Is `int_id` an implemented extended SPI
    fn is_espi(&self, int_id: u32) -> bool;

    /// Is `int_id` an implemented extended PPI
    fn is_eppi(&self, int_id: u32) -> bool;

    /// Program the trigger type of an interrupt
    ///
    /// Trigger configuration is platform policy (it may be fixed by firmware
    /// tables), so ports are free to refuse.
    fn set_trigger(&self, int_id: u32, trigger: TriggerType) -> PalResult<()>;

    /// Parse the auxiliary description of legacy MSI frames
    fn parse_msi_frames(&self) -> PalResult<()>;

    /// Platform-specific controller bring-up (device-tree targets)
    fn init(&self) -> PalResult<()>;
}
