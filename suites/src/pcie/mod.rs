//! # PCIe Batch
//!
//! Operating-system view PCIe rules. The batch needs a created PCIe
//! registry; without one every rule is reported as skip.

pub mod checks;

use acs_core::lifecycle::{module, Status, SwViews, TestController};
use acs_core::pcie::Topology;
use acs_core::report::ResultCollector;
use acs_pal::PlatformAbstraction;

/// Run the PCIe batch and fold its rules by dominance
pub fn execute_tests<'a, P: PlatformAbstraction>(
    ctl: &TestController<'a, P>,
    topo: Topology<'a, P>,
    collector: &mut ResultCollector,
) -> Status {
    let config = ctl.config();
    if config.is_module_skipped(module::PCIE) {
        log::info!("\n       USER Override - Skipping all PCIe tests");
        return Status::Skip;
    }
    if !topo.registry().is_created() {
        log::info!("\n       No PCIe information, Skipping all PCIe tests");
        return Status::Skip;
    }
    if !config.runs_view(SwViews::OS) {
        return Status::Skip;
    }

    log::info!("\n      *** Starting PCIe tests ***");
    log::info!("\nOperating System View:");

    let reports = [
        ctl.execute(&checks::P001, &|pe| checks::ecam_present(&topo, pe)),
        ctl.execute(&checks::P016, &|pe| checks::rciep_msi(&topo, pe)),
    ];
    let status = Status::fold(reports.iter().map(|r| r.status));
    for report in reports {
        collector.add(report);
    }

    if status.is_pass() {
        log::info!("\n       All PCIe tests passed");
    } else {
        log::info!("\n      *** One or more PCIe tests have failed or been skipped ***");
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use acs_core::lifecycle::RunConfig;
    use acs_core::pcie::caps::{CID_MSIX, CID_PCIECS, STATUS_CAP_LIST};
    use acs_core::pcie::{Bdf, PcieHeader, PcieInfoTableBuilder, PcieRecord, PcieRegistry};
    use acs_pal::sim::{SimFirmware, SimPlatform};

    const ECAM: u64 = 0x5000_0000;
    const RCIEP: u8 = 0x9;
    const ROOT_PORT: u8 = 0x4;

    fn base(bdf: Bdf) -> u64 {
        ECAM + ((bdf.bus() as u64) << 20 | (bdf.device() as u64) << 15 | (bdf.function() as u64) << 12)
    }

    /// PCIe capability at 0x40, optionally chained to `extra` at 0x50
    fn express(platform: &SimPlatform, bdf: Bdf, port: u8, extra: Option<u16>) {
        let b = base(bdf);
        platform.mmio.poke(b + 0x04, STATUS_CAP_LIST << 16);
        platform.mmio.poke(b + 0x34, 0x40);
        let next = if extra.is_some() { 0x50 } else { 0 };
        platform.mmio.poke(b + 0x40, (port as u32) << 20 | next << 8 | CID_PCIECS as u32);
        if let Some(id) = extra {
            platform.mmio.poke(b + 0x50, id as u32);
        }
    }

    fn platform(ecam: bool, functions: &[Bdf]) -> SimPlatform {
        let header = PcieHeader { num_ecam: ecam as u32, num_functions: functions.len() as u32 };
        let mut builder = PcieInfoTableBuilder::new(header);
        if ecam {
            builder = builder.record(PcieRecord::ecam(ECAM, 0, 0, 0x7F));
        }
        for &bdf in functions {
            builder = builder.record(PcieRecord::function(bdf));
        }
        SimPlatform::new(1).with_firmware(SimFirmware {
            pcie_table: builder.build().to_bytes(),
            ..SimFirmware::default()
        })
    }

    fn run(platform: &SimPlatform, config: &RunConfig) -> (Status, ResultCollector) {
        let registry = PcieRegistry::new();
        registry.create_from_platform(platform).unwrap();
        let ctl = TestController::new(platform, config);
        let mut collector = ResultCollector::new();
        let status = execute_tests(&ctl, Topology::new(platform, &registry), &mut collector);
        (status, collector)
    }

    #[test]
    fn test_rciep_with_msix_passes() {
        let host_bridge = Bdf::new(0, 0, 0, 0);
        let rciep = Bdf::new(0, 0, 1, 0);
        let platform = platform(true, &[host_bridge, rciep]);
        platform.mmio.poke(base(host_bridge) + 0x08, 0x0600_0000);
        express(&platform, rciep, RCIEP, Some(CID_MSIX));

        let (status, collector) = run(&platform, &RunConfig::new());
        assert_eq!(status, Status::Pass);
        assert_eq!(collector.get(checks::P016.id).map(|r| r.status), Some(Status::Pass));
    }

    #[test]
    fn test_rciep_without_msi_fails() {
        let a = Bdf::new(0, 0, 1, 0);
        let b = Bdf::new(0, 0, 2, 0);
        let platform = platform(true, &[a, b]);
        express(&platform, a, RCIEP, None);
        express(&platform, b, RCIEP, None);

        let (status, collector) = run(&platform, &RunConfig::new());
        assert_eq!(status, Status::Fail(2));
        assert_eq!(collector.get(checks::P001.id).map(|r| r.status), Some(Status::Pass));
    }

    #[test]
    fn test_no_rciep_skips() {
        let port = Bdf::new(0, 0, 1, 0);
        let platform = platform(true, &[port]);
        express(&platform, port, ROOT_PORT, None);

        let (_, collector) = run(&platform, &RunConfig::new());
        assert_eq!(collector.get(checks::P016.id).map(|r| r.status), Some(Status::Skip));
    }

    #[test]
    fn test_function_outside_ecam_fails() {
        let platform = platform(true, &[Bdf::new(0, 0x80, 0, 0)]);
        let (_, collector) = run(&platform, &RunConfig::new());
        assert_eq!(collector.get(checks::P001.id).map(|r| r.status), Some(Status::Fail(1)));
    }

    #[test]
    fn test_missing_ecam_fails() {
        let platform = platform(false, &[]);
        let (status, _) = run(&platform, &RunConfig::new());
        assert_eq!(status, Status::Fail(1));
    }

    #[test]
    fn test_skip_and_missing_registry() {
        let platform = platform(true, &[]);
        let (status, collector) = run(&platform, &RunConfig::new().skip(module::PCIE));
        assert_eq!(status, Status::Skip);
        assert!(collector.is_empty());

        let registry = PcieRegistry::new();
        let config = RunConfig::new();
        let ctl = TestController::new(&platform, &config);
        let mut collector = ResultCollector::new();
        assert_eq!(execute_tests(&ctl, Topology::new(&platform, &registry), &mut collector), Status::Skip);
        assert!(collector.is_empty());
    }
}
