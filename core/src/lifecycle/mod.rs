//! # Test Lifecycle
//!
//! Every rule goes through the same four steps:
//!
//! 1. [`TestController::initialize`] consults the skip list and prepares one
//!    result slot per participating PE.
//! 2. [`TestController::dispatch`] runs the check body once per PE through the
//!    platform's dispatcher. Each PE writes only its own slot.
//! 3. [`TestController::collect_and_check`] folds the slots into one status.
//! 4. [`TestController::report`] emits the rule's line.
//!
//! [`TestController::execute`] chains the four for the common case.

pub mod config;
pub mod rule;
pub mod slots;
pub mod status;

pub use config::{RunConfig, SwViews};
pub use rule::{module, RuleId};
pub use slots::{PeContext, ResultSlots};
pub use status::Status;

use crate::report::RuleReport;
use acs_pal::{PeDispatcher, PeTopology, PlatformAbstraction};
use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use spin::RwLock;

/// Result type for lifecycle operations
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Lifecycle errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleError {
    /// The rule was never initialized
    NotInitialized(RuleId),
    /// The rule is in skip state and must not run
    Skipped(RuleId),
}

impl core::fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotInitialized(rule) => write!(f, "rule {} not initialized", rule),
            Self::Skipped(rule) => write!(f, "rule {} is skipped", rule),
        }
    }
}

/// Result of [`TestController::initialize`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The rule may be dispatched
    Proceed,
    /// The rule is skipped and will not be dispatched
    Skip,
}

/// How many PEs a rule runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeScope {
    /// The primary PE only
    Primary,
    /// Every PE the platform reports
    All,
}

/// Static description of one rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    /// Rule id
    pub id: RuleId,
    /// Architecture rule reference
    pub reference: &'static str,
    /// One-line description
    pub description: &'static str,
    /// PEs the rule runs on
    pub scope: PeScope,
}

/// Check body: invoked once per participating PE
pub type Payload<'p> = dyn Fn(&PeContext<'_>) + Sync + 'p;

#[derive(Debug)]
struct RuleRun {
    description: &'static str,
    reference: &'static str,
    skipped: bool,
    slots: Arc<ResultSlots>,
    status: Option<Status>,
}

/// Drives rules through their lifecycle on one platform
#[derive(Debug)]
pub struct TestController<'a, P: PlatformAbstraction> {
    platform: &'a P,
    config: &'a RunConfig,
    runs: RwLock<BTreeMap<RuleId, RuleRun>>,
}

impl<'a, P: PlatformAbstraction> TestController<'a, P> {
    /// Create a controller
    pub fn new(platform: &'a P, config: &'a RunConfig) -> Self {
        Self { platform, config, runs: RwLock::new(BTreeMap::new()) }
    }

    /// The run configuration
    pub fn config(&self) -> &'a RunConfig {
        self.config
    }

    /// The platform
    pub fn platform(&self) -> &'a P {
        self.platform
    }

    /// Number of PEs a scope resolves to
    pub fn pe_count_for(&self, scope: PeScope) -> usize {
        match scope {
            PeScope::Primary => 1,
            PeScope::All => self.platform.pe().pe_count(),
        }
    }

    /// Start a rule
    ///
    /// Re-initializing a rule discards its previous run.
    pub fn initialize(&self, rule: RuleId, description: &'static str, pe_count: usize) -> Disposition {
        let available = self.platform.pe().pe_count();
        let pe_count = if pe_count > available {
            log::warn!("rule {}: {} PEs requested, {} available", rule, pe_count, available);
            available
        } else {
            pe_count
        };

        log::info!("{} : {}", rule, description);

        let skipped = self.config.is_skipped(rule);
        self.runs.write().insert(
            rule,
            RuleRun {
                description,
                reference: "",
                skipped,
                slots: Arc::new(ResultSlots::new(rule, pe_count)),
                status: None,
            },
        );

        if skipped {
            log::debug!("rule {}: in skip list", rule);
            Disposition::Skip
        } else {
            Disposition::Proceed
        }
    }

    /// Run `payload` on PEs `0..pe_count`
    ///
    /// Refuses rules that were not initialized or are skipped; the payload is
    /// never invoked in that case.
    pub fn dispatch(&self, rule: RuleId, pe_count: usize, payload: &Payload<'_>) -> LifecycleResult<()> {
        let slots = {
            let runs = self.runs.read();
            let run = runs.get(&rule).ok_or(LifecycleError::NotInitialized(rule))?;
            if run.skipped {
                return Err(LifecycleError::Skipped(rule));
            }
            Arc::clone(&run.slots)
        };

        let pe_count = pe_count.min(slots.len());
        log::trace!("rule {}: dispatching on {} PEs", rule, pe_count);
        self.platform.pe().run_on_pes(pe_count, &|index| {
            payload(&PeContext::new(index, &slots));
        });
        Ok(())
    }

    /// Fold the first `pe_count` slots into the rule's status
    ///
    /// A skipped rule reports skip; a rule that was never initialized
    /// reports error.
    pub fn collect_and_check(&self, rule: RuleId, pe_count: usize, reference: &'static str) -> Status {
        let mut runs = self.runs.write();
        let Some(run) = runs.get_mut(&rule) else {
            log::error!("rule {}: collected before initialization", rule);
            return Status::Error;
        };

        let status = if run.skipped {
            Status::Skip
        } else {
            Status::fold(run.slots.collect(pe_count))
        };

        match status {
            Status::Fail(n) => log::error!("rule {} ({}): {} failure(s)", rule, reference, n),
            Status::Error => log::error!("rule {} ({}): error", rule, reference),
            _ => log::debug!("rule {} ({}): {}", rule, reference, status),
        }

        run.reference = reference;
        run.status = Some(status);
        status
    }

    /// Emit the rule's report line
    ///
    /// Idempotent. Returns `None` if the rule was never collected.
    pub fn report(&self, rule: RuleId) -> Option<RuleReport> {
        let runs = self.runs.read();
        let run = runs.get(&rule)?;
        let report = RuleReport {
            rule,
            reference: run.reference,
            description: run.description,
            status: run.status?,
        };
        match report.status {
            Status::Pass | Status::Skip => log::info!("       Result:  {}", report),
            Status::Fail(_) | Status::Error => log::error!("       Result:  {}", report),
        }
        Some(report)
    }

    /// Report the rule and drop its bookkeeping
    pub fn finish(&self, rule: RuleId) -> Option<RuleReport> {
        let report = self.report(rule);
        self.runs.write().remove(&rule);
        report
    }

    /// Run a rule end to end
    pub fn execute(&self, rule: &Rule, payload: &Payload<'_>) -> RuleReport {
        let pe_count = self.pe_count_for(rule.scope);
        if self.initialize(rule.id, rule.description, pe_count) == Disposition::Proceed {
            if let Err(e) = self.dispatch(rule.id, pe_count, payload) {
                log::error!("{}", e);
            }
        }
        let status = self.collect_and_check(rule.id, pe_count, rule.reference);
        self.finish(rule.id).unwrap_or(RuleReport {
            rule: rule.id,
            reference: rule.reference,
            description: rule.description,
            status,
        })
    }
}
