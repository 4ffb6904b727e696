//! # Run Configuration
//!
//! Skip list, software views and print level. Built once at startup and never
//! changed during the run.

use super::rule::RuleId;
use alloc::vec::Vec;
use bitflags::bitflags;
use log::LevelFilter;

bitflags! {
    /// Software views a run executes
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SwViews: u8 {
        /// Operating system view
        const OS = 1 << 0;
        /// Hypervisor view
        const HYP = 1 << 1;
        /// Platform security view
        const PS = 1 << 2;
    }
}

impl SwViews {
    /// Parse a view name
    pub fn parse_view(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("os") {
            Some(Self::OS)
        } else if name.eq_ignore_ascii_case("hyp") {
            Some(Self::HYP)
        } else if name.eq_ignore_ascii_case("ps") {
            Some(Self::PS)
        } else {
            None
        }
    }
}

/// Default print level: test progress
pub const DEFAULT_VERBOSITY: u8 = 3;

/// Map a numeric print level to a log filter
///
/// 1 is the most verbose, 5 prints errors only.
pub const fn level_filter(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 | 1 => LevelFilter::Trace,
        2 => LevelFilter::Debug,
        3 => LevelFilter::Info,
        4 => LevelFilter::Warn,
        _ => LevelFilter::Error,
    }
}

/// Immutable run configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    skip: Vec<u32>,
    views: SwViews,
    verbosity: u8,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            skip: Vec::new(),
            views: SwViews::all(),
            verbosity: DEFAULT_VERBOSITY,
        }
    }
}

impl RunConfig {
    /// Create with defaults: nothing skipped, every view, info level
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule or module id to the skip list
    pub fn skip(mut self, id: u32) -> Self {
        if !self.skip.contains(&id) {
            self.skip.push(id);
        }
        self
    }

    /// Add several ids to the skip list
    pub fn skip_all(self, ids: impl IntoIterator<Item = u32>) -> Self {
        ids.into_iter().fold(self, Self::skip)
    }

    /// Select the views to run
    pub fn views(mut self, views: SwViews) -> Self {
        self.views = views;
        self
    }

    /// Set the print level
    pub fn verbosity(mut self, level: u8) -> Self {
        self.verbosity = level;
        self
    }

    /// Parse a firmware-style command line
    ///
    /// Recognized tokens: `skip=100,401`, `views=os,hyp`, `verbosity=3`.
    /// Unknown tokens and malformed values are ignored.
    pub fn from_cmdline(cmdline: &str) -> Self {
        let mut cfg = Self::default();
        for token in cmdline.split_whitespace() {
            if let Some(value) = token.strip_prefix("skip=") {
                cfg = cfg.skip_all(value.split(',').filter_map(|id| id.trim().parse().ok()));
            } else if let Some(value) = token.strip_prefix("views=") {
                let views = value
                    .split(',')
                    .filter_map(SwViews::parse_view)
                    .fold(SwViews::empty(), |acc, v| acc | v);
                if !views.is_empty() {
                    cfg.views = views;
                }
            } else if let Some(value) = token.strip_prefix("verbosity=") {
                if let Ok(level) = value.parse() {
                    cfg.verbosity = level;
                }
            }
        }
        cfg
    }

    /// Skip list, in insertion order
    pub fn skip_list(&self) -> &[u32] {
        &self.skip
    }

    /// Selected views
    pub fn selected_views(&self) -> SwViews {
        self.views
    }

    /// Whether `view` runs
    pub fn runs_view(&self, view: SwViews) -> bool {
        self.views.contains(view)
    }

    /// Numeric print level
    pub fn print_level(&self) -> u8 {
        self.verbosity
    }

    /// Log filter for the print level
    pub fn log_level(&self) -> LevelFilter {
        level_filter(self.verbosity)
    }

    /// Whether a whole module is skipped
    pub fn is_module_skipped(&self, module_base: u32) -> bool {
        self.skip.contains(&module_base)
    }

    /// Whether `rule` is skipped, by exact id or by its module
    pub fn is_skipped(&self, rule: RuleId) -> bool {
        self.skip.contains(&rule.as_u32()) || self.is_module_skipped(rule.module())
    }
}
