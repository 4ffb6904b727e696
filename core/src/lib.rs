//! # ACS Core
//!
//! The information model and orchestration engine of the compliance suite.
//!
//! ## Layout
//!
//! - [`info`]: generic self-describing tables (header, tagged records,
//!   sentinel)
//! - [`gic`]: interrupt controller table, registry and per-interrupt
//!   operations
//! - [`pcie`]: PCIe table, registry and topology queries
//! - [`lifecycle`]: skip/view configuration, per-PE result slots and the
//!   test controller
//! - [`report`]: result collection and the run summary
//!
//! Everything talks to hardware through [`acs_pal::PlatformAbstraction`].

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

extern crate alloc;

pub mod gic;
pub mod info;
pub mod lifecycle;
pub mod pcie;
pub mod report;


pub use info::{InfoError, InfoResult, InfoTable};
pub use lifecycle::{Rule, RuleId, RunConfig, Status, SwViews, TestController};
pub use report::{ResultCollector, RuleReport, RunSummary};
