//! # ACS Host Runner
//!
//! Runs the compliance checks against the demo platform and prints the
//! summary. Exits non-zero when any rule failed or errored.

mod platform;

use acs_core::gic::GicInfoRegistry;
use acs_core::lifecycle::config::DEFAULT_VERBOSITY;
use acs_core::lifecycle::{RunConfig, Status, SwViews, TestController};
use acs_core::pcie::PcieRegistry;
use acs_core::report::ResultCollector;
use acs_suites::{run_all, Registries};
use clap::Parser;
use log::LevelFilter;
use std::process::ExitCode;

/// Command-line options
#[derive(Debug, Parser)]
#[command(name = "acs-host", about = "Run the architecture compliance checks on a simulated platform", version)]
struct Cli {
    /// Print level: 1 is the most verbose, 5 prints errors only
    #[arg(short = 'v', default_value_t = DEFAULT_VERBOSITY)]
    verbosity: u8,

    /// Rule or module ids to skip, comma separated (e.g. 100,401)
    #[arg(long, value_delimiter = ',')]
    skip: Vec<u32>,

    /// Run the operating system view
    #[arg(long)]
    os: bool,

    /// Run the hypervisor view
    #[arg(long)]
    hyp: bool,

    /// Run the platform security view
    #[arg(long)]
    ps: bool,

    /// Number of PEs on the simulated platform
    #[arg(long = "pe", default_value_t = 4)]
    pe_count: usize,

    /// Enable the extended SPI range up to this interrupt id
    #[arg(long = "espi-max")]
    espi_max: Option<u32>,
}

impl Cli {
    /// Views selected on the command line, all of them if none was given
    fn views(&self) -> SwViews {
        let mut views = SwViews::empty();
        views.set(SwViews::OS, self.os);
        views.set(SwViews::HYP, self.hyp);
        views.set(SwViews::PS, self.ps);
        if views.is_empty() {
            SwViews::all()
        } else {
            views
        }
    }

    fn run_config(&self) -> RunConfig {
        RunConfig::new()
            .skip_all(self.skip.iter().copied())
            .views(self.views())
            .verbosity(self.verbosity)
    }
}

fn init_logger(level: LevelFilter) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).format_timestamp(None).format_target(false);
    let _ = builder.try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = cli.run_config();
    init_logger(config.log_level());

    let platform = platform::demo(cli.pe_count.max(1), cli.espi_max);

    let gic = GicInfoRegistry::new();
    if let Err(e) = gic.create_from_platform(&platform) {
        log::error!("interrupt controller information unavailable: {}", e);
        return ExitCode::FAILURE;
    }
    let pcie = PcieRegistry::new();
    if let Err(e) = pcie.create_from_platform(&platform) {
        log::warn!("PCIe information unavailable: {}", e);
    }

    let ctl = TestController::new(&platform, &config);
    let mut collector = ResultCollector::new();
    let status = run_all(&ctl, Registries { gic: &gic, pcie: &pcie }, &mut collector);

    println!("{}", collector.summary());

    pcie.free();
    gic.free();

    match status {
        Status::Fail(_) | Status::Error => ExitCode::FAILURE,
        Status::Pass | Status::Skip => ExitCode::SUCCESS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_views_default_to_all() {
        let cli = Cli::try_parse_from(["acs-host"]).unwrap();
        assert_eq!(cli.views(), SwViews::all());
        assert_eq!(cli.run_config(), RunConfig::new());
    }

    #[test]
    fn test_options() {
        let cli = Cli::try_parse_from(["acs-host", "-v", "1", "--skip", "100,401", "--hyp", "--espi-max", "4127"])
            .unwrap();
        let config = cli.run_config();
        assert_eq!(config.skip_list(), &[100, 401]);
        assert_eq!(config.selected_views(), SwViews::HYP);
        assert_eq!(config.log_level(), LevelFilter::Trace);
        assert_eq!(cli.espi_max, Some(4127));
    }

    #[test]
    fn test_demo_platform_passes() {
        let platform = platform::demo(2, Some(4127));
        let gic = GicInfoRegistry::new();
        gic.create_from_platform(&platform).unwrap();
        let pcie = PcieRegistry::new();
        pcie.create_from_platform(&platform).unwrap();

        let config = RunConfig::new().views(SwViews::OS | SwViews::HYP);
        let ctl = TestController::new(&platform, &config);
        let mut collector = ResultCollector::new();
        let status = run_all(&ctl, Registries { gic: &gic, pcie: &pcie }, &mut collector);

        assert_eq!(status, Status::Pass);
        let summary = collector.summary();
        assert_eq!(summary.totals.failed, 0);
        assert_eq!(summary.totals.errors, 0);
    }
}
