//! Run Results & Reporting
//!
//! Collects every rule's final status and summarizes the run.

use crate::lifecycle::rule::{module, RuleId};
use crate::lifecycle::status::Status;
use alloc::vec::Vec;

// =============================================================================
// Result Types
// =============================================================================

/// Final report of one rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleReport {
    /// Rule id
    pub rule: RuleId,
    /// Architecture rule reference, e.g. `RE_INT_1`
    pub reference: &'static str,
    /// One-line description
    pub description: &'static str,
    /// Consolidated status
    pub status: Status,
}

impl core::fmt::Display for RuleReport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} : {:<10} : {}", self.rule, self.reference, self.status)
    }
}

/// Totals over a set of rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Totals {
    /// Rules reported
    pub total: u32,
    /// Rules that passed
    pub passed: u32,
    /// Rules that failed
    pub failed: u32,
    /// Rules skipped
    pub skipped: u32,
    /// Rules that could not complete
    pub errors: u32,
}

impl Totals {
    fn add(&mut self, status: Status) {
        self.total += 1;
        match status {
            Status::Pass => self.passed += 1,
            Status::Fail(_) => self.failed += 1,
            Status::Skip => self.skipped += 1,
            Status::Error => self.errors += 1,
        }
    }
}

/// Summary of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Totals over every rule
    pub totals: Totals,
    /// Totals per module base, in first-seen order
    pub modules: Vec<(u32, Totals)>,
    /// All statuses folded by dominance
    pub overall: Status,
}

impl core::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        writeln!(f, "-------------------------------------------------------")?;
        for (base, t) in &self.modules {
            writeln!(
                f,
                " {:<10} total {:3}  pass {:3}  fail {:3}  skip {:3}  error {:3}",
                module::name(*base),
                t.total,
                t.passed,
                t.failed,
                t.skipped,
                t.errors
            )?;
        }
        writeln!(f, "-------------------------------------------------------")?;
        writeln!(f, " Total Tests run  = {:4}", self.totals.total)?;
        writeln!(f, " Tests Passed     = {:4}", self.totals.passed)?;
        writeln!(f, " Tests Failed     = {:4}", self.totals.failed)?;
        writeln!(f, " Tests Skipped    = {:4}", self.totals.skipped)?;
        writeln!(f, " Tests Errored    = {:4}", self.totals.errors)?;
        write!(f, " Overall          : {}", self.overall)
    }
}

// =============================================================================
// Result Collection
// =============================================================================

/// Result collector
#[derive(Debug, Default)]
pub struct ResultCollector {
    results: Vec<RuleReport>,
}

impl ResultCollector {
    /// Create new collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a report
    pub fn add(&mut self, report: RuleReport) {
        self.results.push(report);
    }

    /// Get number of results
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Reports in the order they were added
    pub fn results(&self) -> &[RuleReport] {
        &self.results
    }

    /// Report of `rule`, if it ran
    pub fn get(&self, rule: RuleId) -> Option<&RuleReport> {
        self.results.iter().find(|r| r.rule == rule)
    }

    /// Summarize everything collected so far
    pub fn summary(&self) -> RunSummary {
        let mut totals = Totals::default();
        let mut modules: Vec<(u32, Totals)> = Vec::new();

        for report in &self.results {
            totals.add(report.status);
            let base = report.rule.module();
            match modules.iter_mut().find(|(m, _)| *m == base) {
                Some((_, t)) => t.add(report.status),
                None => {
                    let mut t = Totals::default();
                    t.add(report.status);
                    modules.push((base, t));
                }
            }
        }

        RunSummary {
            totals,
            modules,
            overall: Status::fold(self.results.iter().map(|r| r.status)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(rule: u32, status: Status) -> RuleReport {
        RuleReport { rule: RuleId::from_raw(rule), reference: "X", description: "", status }
    }

    #[test]
    fn test_summary_counts_per_module() {
        let mut collector = ResultCollector::new();
        collector.add(report(101, Status::Pass));
        collector.add(report(102, Status::Skip));
        collector.add(report(416, Status::Fail(3)));

        let summary = collector.summary();
        assert_eq!(summary.totals.total, 3);
        assert_eq!(summary.totals.failed, 1);
        assert_eq!(summary.modules.len(), 2);
        assert_eq!(summary.modules[0].0, module::GIC);
        assert_eq!(summary.modules[0].1.skipped, 1);
        assert_eq!(summary.overall, Status::Fail(3));
        assert_eq!(collector.get(RuleId::from_raw(416)).map(|r| r.status), Some(Status::Fail(3)));
    }

    #[test]
    fn test_empty_run_is_skip() {
        assert_eq!(ResultCollector::new().summary().overall, Status::Skip);
    }
}
