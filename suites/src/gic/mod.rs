//! # Interrupt Controller Batch
//!
//! Runs every interrupt controller rule in stages:
//!
//! ```text
//! NotStarted -> RunningStandard -> [RunningLegacyFrames] -> [RunningTranslationService] -> Done
//! ```
//!
//! The bracketed stages are entered only when their detection check succeeds. The batch
//! status folds every rule run by dominance and is reported once at `Done`.

pub mod checks;

use acs_core::gic::{Gic, GicInfo};
use acs_core::lifecycle::{module, Payload, Rule, Status, SwViews, TestController};
use acs_core::report::ResultCollector;
use acs_pal::{FirmwareInterface, GicFirmware, PeDispatcher, PeTopology, PlatformAbstraction};
use alloc::vec::Vec;

/// Batch stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Nothing ran yet
    NotStarted,
    /// Always-present rules
    RunningStandard,
    /// GICv2m MSI frame rules
    RunningLegacyFrames,
    /// ITS rules
    RunningTranslationService,
    /// Batch complete
    Done,
}

/// Outcome of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRun {
    /// Folded status
    pub status: Status,
    /// Stages entered, in order
    pub stages: Vec<Stage>,
}

struct Batch<'c, 'a, P: PlatformAbstraction> {
    ctl: &'c TestController<'a, P>,
    collector: &'c mut ResultCollector,
    stages: Vec<Stage>,
    status: Option<Status>,
}

impl<'c, 'a, P: PlatformAbstraction> Batch<'c, 'a, P> {
    fn enter(&mut self, stage: Stage) {
        log::trace!("GIC batch: {:?}", stage);
        self.stages.push(stage);
    }

    fn run(&mut self, rule: &Rule, body: &Payload<'_>) {
        let report = self.ctl.execute(rule, body);
        self.status = Some(match self.status {
            Some(status) => status.merge(report.status),
            None => report.status,
        });
        self.collector.add(report);
    }

    fn finish(mut self) -> BatchRun {
        self.enter(Stage::Done);
        let status = self.status.unwrap_or(Status::Skip);
        if status.is_pass() {
            log::info!("\n       All GIC tests passed");
        } else {
            log::info!("\n      *** One or more GIC tests have failed or been skipped ***");
        }
        BatchRun { status, stages: self.stages }
    }
}

/// Run the interrupt controller batch
///
/// Returns skip without running anything when the GIC module is in the skip
/// list.
pub fn execute_tests<'a, P: PlatformAbstraction>(
    ctl: &TestController<'a, P>,
    gic: Gic<'a, P>,
    collector: &mut ResultCollector,
) -> BatchRun {
    let config = ctl.config();
    if config.is_module_skipped(module::GIC) {
        log::info!("\n       USER Override - Skipping all GIC tests");
        return BatchRun { status: Status::Skip, stages: Vec::new() };
    }

    let platform = ctl.platform();
    let mut batch = Batch { ctl, collector, stages: Vec::new(), status: None };
    batch.enter(Stage::NotStarted);

    let pe_count = platform.pe().pe_count();
    platform.pe().run_on_pes(pe_count, &|_| gic.cpuif_init());

    batch.enter(Stage::RunningStandard);
    let version = gic.info(GicInfo::Version);

    if config.runs_view(SwViews::OS) {
        log::info!("\nOperating System View:");
        batch.run(&checks::G001, &|pe| checks::version(&gic, pe));
        batch.run(&checks::G002, &|pe| checks::espi_trigger(&gic, pe));
        if version > 2 {
            batch.run(&checks::G003, &|pe| checks::affinity_routing(platform, &gic, pe));
            batch.run(&checks::G004, &|pe| checks::ns_sgis(&gic, pe));
        }
    }

    if config.runs_view(SwViews::HYP) {
        log::info!("\nHypervisor View:");
        batch.run(&checks::HYP001, &|pe| checks::virtual_interface(&gic, pe));
    }

    // GICv2m, only when frames are described
    let num_msi_frame = gic.info(GicInfo::NumMsiFrame);
    if version != 2 || num_msi_frame == 0 {
        log::info!("\n       No GICv2m, Skipping all GICv2m tests");
    } else if let Err(e) = platform.gic().parse_msi_frames() {
        log::info!("\n       GICv2m info mismatch ({}), Skipping all GICv2m tests", e);
    } else {
        batch.enter(Stage::RunningLegacyFrames);
        log::info!("\n      *** Starting GICv2m tests ***");
        if config.runs_view(SwViews::OS) {
            batch.run(&checks::V2M001, &|pe| checks::msi_frames(&gic, pe));
        }
    }

    // ITS, only when blocks are described
    if gic.info(GicInfo::NumIts) == 0 || platform.firmware().firmware_type().is_dt() {
        log::debug!("\n       No ITS, Skipping all ITS tests");
    } else {
        batch.enter(Stage::RunningTranslationService);
        log::info!("\n      *** Starting ITS tests ***");
        if config.runs_view(SwViews::OS) {
            batch.run(&checks::ITS001, &|pe| checks::its_blocks(&gic, pe));
        }
    }

    batch.finish()
}
