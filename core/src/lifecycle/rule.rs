//! Rule and module identifiers.
//!
//! A rule id is `module base + index`. Module bases are multiples of 100, so
//! the owning module of any rule is its id rounded down to the hundred.

/// Module id bases
pub mod module {
    /// Processing element
    pub const PE: u32 = 0;
    /// Interrupt controller
    pub const GIC: u32 = 100;
    /// Generic timer
    pub const TIMER: u32 = 200;
    /// Watchdog
    pub const WATCHDOG: u32 = 300;
    /// PCIe
    pub const PCIE: u32 = 400;
    /// Wakeup semantics
    pub const WAKEUP: u32 = 500;
    /// Peripherals
    pub const PERIPHERAL: u32 = 600;
    /// SMMU
    pub const SMMU: u32 = 700;
    /// Memory map
    pub const MEMORY: u32 = 800;
    /// PCIe exerciser
    pub const EXERCISER: u32 = 900;

    /// Module ids per block
    pub const STRIDE: u32 = 100;

    /// Human name of a module base
    pub const fn name(base: u32) -> &'static str {
        match base {
            PE => "PE",
            GIC => "GIC",
            TIMER => "Timer",
            WATCHDOG => "Watchdog",
            PCIE => "PCIe",
            WAKEUP => "Wakeup",
            PERIPHERAL => "Peripheral",
            SMMU => "SMMU",
            MEMORY => "Memory",
            EXERCISER => "Exerciser",
            _ => "Unknown",
        }
    }
}

/// Numeric rule identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct RuleId(u32);

impl RuleId {
    /// Rule `index` of module `base`
    pub const fn new(base: u32, index: u32) -> Self {
        Self(base + index)
    }

    /// From the raw number
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw number
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Owning module base
    pub const fn module(self) -> u32 {
        (self.0 / module::STRIDE) * module::STRIDE
    }
}

impl core::fmt::Display for RuleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:4}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_of_rule() {
        assert_eq!(RuleId::new(module::GIC, 3).module(), module::GIC);
        assert_eq!(RuleId::from_raw(416).module(), module::PCIE);
        assert_eq!(RuleId::from_raw(7).module(), module::PE);
        assert_eq!(module::name(RuleId::from_raw(910).module()), "Exerciser");
    }
}
