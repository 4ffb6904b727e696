//! # Per-PE Result Slots
//!
//! One atomic word per participating PE. A slot starts pending and accepts
//! exactly one write, from the PE that owns it. A second write is a harness
//! bug in the check body; it is detected and the slot is forced to error.

use super::rule::RuleId;
use super::status::{self, Status, PENDING};
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU32, Ordering};

/// Result slots for one rule run
#[derive(Debug)]
pub struct ResultSlots {
    rule: RuleId,
    slots: Vec<AtomicU32>,
}

impl ResultSlots {
    /// `pe_count` pending slots for `rule`
    pub fn new(rule: RuleId, pe_count: usize) -> Self {
        Self {
            rule,
            slots: (0..pe_count).map(|_| AtomicU32::new(PENDING)).collect(),
        }
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// No PE participates
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Record the outcome of PE `index`
    ///
    /// Returns `false` if the slot was already written (it now holds an
    /// error) or if `index` is out of range.
    pub fn record(&self, index: usize, outcome: Status) -> bool {
        let Some(slot) = self.slots.get(index) else {
            log::error!("rule {}: PE index {} has no result slot", self.rule, index);
            return false;
        };
        match slot.compare_exchange(PENDING, status::encode(outcome), Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => true,
            Err(previous) => {
                log::error!(
                    "rule {}: PE {} wrote its result twice (had {:?}, got {:?})",
                    self.rule,
                    index,
                    status::decode(previous),
                    outcome
                );
                slot.store(status::encode(Status::Error), Ordering::Release);
                false
            }
        }
    }

    /// Outcome of PE `index`, `None` while pending
    pub fn outcome(&self, index: usize) -> Option<Status> {
        self.slots
            .get(index)
            .and_then(|slot| status::decode(slot.load(Ordering::Acquire)))
    }

    /// Outcomes of the first `count` PEs; a PE that never wrote counts as error
    pub fn collect(&self, count: usize) -> Vec<Status> {
        (0..count.min(self.slots.len()))
            .map(|index| match self.outcome(index) {
                Some(outcome) => outcome,
                None => {
                    log::warn!("rule {}: PE {} did not report", self.rule, index);
                    Status::Error
                }
            })
            .collect()
    }
}

/// Handle a check body receives for one PE
#[derive(Debug, Clone, Copy)]
pub struct PeContext<'a> {
    index: usize,
    slots: &'a ResultSlots,
}

impl<'a> PeContext<'a> {
    /// Context of PE `index`
    pub fn new(index: usize, slots: &'a ResultSlots) -> Self {
        Self { index, slots }
    }

    /// Index of the PE running the body
    pub fn index(&self) -> usize {
        self.index
    }

    /// Rule being run
    pub fn rule(&self) -> RuleId {
        self.slots.rule
    }

    /// Record an outcome for this PE
    pub fn set(&self, outcome: Status) {
        self.slots.record(self.index, outcome);
    }

    /// Record a pass
    pub fn pass(&self) {
        self.set(Status::Pass);
    }

    /// Record `count` failures
    pub fn fail(&self, count: u32) {
        self.set(Status::Fail(count.max(1)));
    }

    /// Record a skip
    pub fn skip(&self) {
        self.set(Status::Skip);
    }

    /// Record an error
    pub fn error(&self) {
        self.set(Status::Error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_write_per_slot() {
        let slots = ResultSlots::new(RuleId::from_raw(101), 2);
        assert!(slots.record(0, Status::Pass));
        assert_eq!(slots.outcome(0), Some(Status::Pass));
        assert_eq!(slots.outcome(1), None);

        // Second write poisons the slot
        assert!(!slots.record(0, Status::Pass));
        assert_eq!(slots.outcome(0), Some(Status::Error));
    }

    #[test]
    fn test_unwritten_slot_collects_as_error() {
        let slots = ResultSlots::new(RuleId::from_raw(101), 3);
        PeContext::new(0, &slots).pass();
        PeContext::new(2, &slots).fail(2);
        assert_eq!(slots.collect(3), [Status::Pass, Status::Error, Status::Fail(2)]);
    }

    #[test]
    fn test_collect_stops_at_count() {
        let slots = ResultSlots::new(RuleId::from_raw(101), 4);
        PeContext::new(0, &slots).pass();
        PeContext::new(1, &slots).pass();
        assert_eq!(slots.collect(2), [Status::Pass, Status::Pass]);
        assert_eq!(slots.collect(8).len(), 4);
    }

    #[test]
    fn test_out_of_range_index() {
        let slots = ResultSlots::new(RuleId::from_raw(101), 1);
        assert!(!slots.record(1, Status::Pass));
        assert!(slots.outcome(1).is_none());
    }
}
