//! PCIe check bodies.

use acs_core::lifecycle::{module, PeContext, PeScope, Rule, RuleId, Status};
use acs_core::pcie::caps::{CID_MSI, CID_MSIX};
use acs_core::pcie::{CapabilityKind, PortType, Topology};
use acs_pal::PlatformAbstraction;

/// ECAM description
pub const P001: Rule = Rule {
    id: RuleId::new(module::PCIE, 1),
    reference: "PCI_IN_01",
    description: "Check ECAM presence",
    scope: PeScope::Primary,
};

/// MSI or MSI-X on integrated endpoints
pub const P016: Rule = Rule {
    id: RuleId::new(module::PCIE, 16),
    reference: "RE_INT_1",
    description: "Check MSI and MSI-X support rule",
    scope: PeScope::Primary,
};

pub(crate) fn ecam_present<P: PlatformAbstraction>(topo: &Topology<'_, P>, pe: &PeContext<'_>) {
    let registry = topo.registry();
    let Some(header) = registry.header() else {
        pe.error();
        return;
    };
    if header.num_ecam == 0 {
        log::error!("       no ECAM region described");
        pe.fail(1);
        return;
    }

    let orphans = registry
        .functions()
        .into_iter()
        .filter(|&bdf| registry.ecam_for(bdf).is_none())
        .inspect(|bdf| log::error!("       function {} outside every ECAM window", bdf))
        .count();
    pe.set(Status::from_failures(orphans as u32));
}

pub(crate) fn rciep_msi<P: PlatformAbstraction>(topo: &Topology<'_, P>, pe: &PeContext<'_>) {
    let mut endpoints = 0;
    let mut failures = 0;

    for bdf in topo.registry().functions() {
        if matches!(topo.is_host_bridge(bdf), Ok(true)) {
            continue;
        }
        if topo.device_port_type(bdf) != Ok(PortType::RciEp) {
            continue;
        }
        endpoints += 1;

        let has = |id| matches!(topo.find_capability(bdf, CapabilityKind::Standard, id), Ok(Some(_)));
        if !has(CID_MSI) && !has(CID_MSIX) {
            log::error!("       RCiEP {} supports neither MSI nor MSI-X", bdf);
            failures += 1;
        }
    }

    if endpoints == 0 {
        log::debug!("       no RCiEP found");
        pe.skip();
    } else {
        pe.set(Status::from_failures(failures));
    }
}
