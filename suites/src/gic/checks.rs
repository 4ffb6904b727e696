//! Interrupt controller check bodies.

use acs_core::gic::intid::{ESPI_START, SPI_START};
use acs_core::gic::regs::gicd;
use acs_core::gic::{Gic, GicInfo, GicRecordType};
use acs_core::lifecycle::{module, PeContext, PeScope, Rule, RuleId, Status};
use acs_pal::cpu::mpidr;
use acs_pal::{PeTopology, PlatformAbstraction, RegisterAccess};

/// ITS blocks are 64 KiB aligned
const ITS_ALIGN: u64 = 0x1_0000;
/// MSI frames are 4 KiB aligned
const MSI_FRAME_ALIGN: u64 = 0x1000;
/// Minimum number of SGIs the non-secure state must own
const MIN_NS_SGIS: u32 = 8;

// =============================================================================
// Operating system view
// =============================================================================

/// GIC version
pub const G001: Rule = Rule {
    id: RuleId::new(module::GIC, 1),
    reference: "B_GIC_01",
    description: "Check GIC version",
    scope: PeScope::All,
};

/// Extended SPI state and trigger readback
pub const G002: Rule = Rule {
    id: RuleId::new(module::GIC, 2),
    reference: "B_GIC_02",
    description: "Check extended SPI trigger readback",
    scope: PeScope::Primary,
};

/// Affinity routing
pub const G003: Rule = Rule {
    id: RuleId::new(module::GIC, 3),
    reference: "B_GIC_03",
    description: "Check affinity routing enabled",
    scope: PeScope::Primary,
};

/// Non-secure SGIs
pub const G004: Rule = Rule {
    id: RuleId::new(module::GIC, 4),
    reference: "B_GIC_04",
    description: "Check non-secure SGIs",
    scope: PeScope::Primary,
};

pub(crate) fn version<P: PlatformAbstraction>(gic: &Gic<'_, P>, pe: &PeContext<'_>) {
    let version = gic.info(GicInfo::Version);
    if version < 2 {
        log::error!("       PE {}: GIC version {} is below v2", pe.index(), version);
        pe.fail(1);
    } else {
        log::debug!("       PE {}: GIC version {}", pe.index(), version);
        pe.pass();
    }
}

pub(crate) fn espi_trigger<P: PlatformAbstraction>(gic: &Gic<'_, P>, pe: &PeContext<'_>) {
    if !gic.espi_supported() {
        log::debug!("       extended SPI range not implemented");
        pe.skip();
        return;
    }

    let mut failures = 0;
    for int_id in ESPI_START..=gic.max_espi() {
        if gic.get_espi_trigger_type(int_id).is_err() {
            failures += 1;
            continue;
        }
        if gic.clear(int_id).is_err() || gic.get_state(int_id) != Ok(false) {
            log::error!("       extended SPI {} still outstanding after clear", int_id);
            failures += 1;
        }
    }
    pe.set(Status::from_failures(failures));
}

pub(crate) fn affinity_routing<P: PlatformAbstraction>(platform: &P, gic: &Gic<'_, P>, pe: &PeContext<'_>) {
    if gic.info(GicInfo::AffinityNs) == 0 {
        log::error!("       affinity routing disabled for the non-secure state");
        pe.fail(1);
        return;
    }

    let target = platform.pe().mpidr(pe.index());
    if gic.route_to_pe(SPI_START, target).is_err() {
        pe.error();
        return;
    }
    let router = gic.registry().distributor_base().add(gicd::IROUTER + 8 * SPI_START as u64);
    let readback = platform.mmio().read32(router) as u64;
    if readback != target & mpidr::AFFINITY_MASK & 0xFFFF_FFFF {
        log::error!("       IROUTER readback {:#x}, expected {:#x}", readback, target);
        pe.fail(1);
    } else {
        pe.pass();
    }
}

pub(crate) fn ns_sgis<P: PlatformAbstraction>(gic: &Gic<'_, P>, pe: &PeContext<'_>) {
    let enables = gic.info(GicInfo::SgiNonSecure) & 0xFFFF;
    let count = enables.count_ones();
    if count < MIN_NS_SGIS {
        log::error!("       only {} non-secure SGIs", count);
        pe.fail(1);
    } else {
        pe.pass();
    }
}

// =============================================================================
// Hypervisor view
// =============================================================================

/// Virtual interface control block
pub const HYP001: Rule = Rule {
    id: RuleId::new(module::GIC, 51),
    reference: "B_GIC_HYP_01",
    description: "Check virtual interface presence",
    scope: PeScope::Primary,
};

pub(crate) fn virtual_interface<P: PlatformAbstraction>(gic: &Gic<'_, P>, pe: &PeContext<'_>) {
    if gic.registry().hypervisor_base().is_null() {
        log::error!("       no GICH block described");
        pe.fail(1);
    } else {
        pe.pass();
    }
}

// =============================================================================
// GICv2m
// =============================================================================

/// MSI frame description
pub const V2M001: Rule = Rule {
    id: RuleId::new(module::GIC, 11),
    reference: "B_GICv2m_01",
    description: "Check MSI frame description",
    scope: PeScope::Primary,
};

pub(crate) fn msi_frames<P: PlatformAbstraction>(gic: &Gic<'_, P>, pe: &PeContext<'_>) {
    let frames = gic.registry().records_of(GicRecordType::MsiFrame);
    let expected = gic.info(GicInfo::NumMsiFrame) as usize;

    let mut failures = 0;
    if frames.len() != expected {
        log::error!("       {} MSI frame records, header says {}", frames.len(), expected);
        failures += 1;
    }
    for frame in &frames {
        if frame.base.is_null() || !frame.base.is_aligned(MSI_FRAME_ALIGN) || frame.spi_count == 0 {
            log::error!("       MSI frame {} at {:#x} malformed", frame.entry_id, frame.base);
            failures += 1;
        }
    }
    pe.set(Status::from_failures(failures));
}

// =============================================================================
// ITS
// =============================================================================

/// ITS description
pub const ITS001: Rule = Rule {
    id: RuleId::new(module::GIC, 21),
    reference: "ITS_01",
    description: "Check ITS description",
    scope: PeScope::Primary,
};

pub(crate) fn its_blocks<P: PlatformAbstraction>(gic: &Gic<'_, P>, pe: &PeContext<'_>) {
    let blocks = gic.registry().records_of(GicRecordType::Its);
    let expected = gic.info(GicInfo::NumIts) as usize;

    let mut failures = 0;
    if blocks.len() != expected {
        log::error!("       {} ITS records, header says {}", blocks.len(), expected);
        failures += 1;
    }
    for its in &blocks {
        if its.base.is_null() || !its.base.is_aligned(ITS_ALIGN) {
            log::error!("       ITS {} base {:#x} not 64 KiB aligned", its.entry_id, its.base);
            failures += 1;
        }
    }
    pe.set(Status::from_failures(failures));
}
