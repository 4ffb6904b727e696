//! Rule outcomes and their consolidation.

/// Outcome of a rule on one PE, or of a rule as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// All checks held
    Pass,
    /// `n` checks failed
    Fail(u32),
    /// Not applicable or not run
    Skip,
    /// The check itself could not complete
    Error,
}

impl Status {
    /// Dominance rank: error > fail > skip > pass
    const fn rank(self) -> u8 {
        match self {
            Self::Pass => 0,
            Self::Skip => 1,
            Self::Fail(_) => 2,
            Self::Error => 3,
        }
    }

    /// Combine two outcomes; failures add up
    pub const fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::Fail(a), Self::Fail(b)) => Self::Fail(a.saturating_add(b)),
            _ if other.rank() > self.rank() => other,
            _ => self,
        }
    }

    /// Fold a set of outcomes; an empty set is a skip
    pub fn fold(outcomes: impl IntoIterator<Item = Status>) -> Self {
        outcomes
            .into_iter()
            .reduce(Self::merge)
            .unwrap_or(Self::Skip)
    }

    /// Pass, or fail with a count of `failures`
    pub const fn from_failures(failures: u32) -> Self {
        if failures == 0 {
            Self::Pass
        } else {
            Self::Fail(failures)
        }
    }

    /// Is this a pass
    pub const fn is_pass(self) -> bool {
        matches!(self, Self::Pass)
    }

    /// Report label
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail(_) => "FAIL",
            Self::Skip => "SKIPPED",
            Self::Error => "ERROR",
        }
    }
}

impl core::fmt::Display for Status {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Fail(n) => write!(f, "FAIL ({})", n),
            other => f.write_str(other.as_str()),
        }
    }
}

// =============================================================================
// Slot encoding
// =============================================================================
//
// bits [31:28] state, bits [27:0] failure count

const STATE_SHIFT: u32 = 28;
const COUNT_MASK: u32 = (1 << STATE_SHIFT) - 1;

/// Encoding of a slot nobody wrote yet
pub const PENDING: u32 = 0;

const STATE_PASS: u32 = 1;
const STATE_FAIL: u32 = 2;
const STATE_SKIP: u32 = 3;
const STATE_ERROR: u32 = 4;

/// Pack an outcome into a slot word
pub const fn encode(status: Status) -> u32 {
    match status {
        Status::Pass => STATE_PASS << STATE_SHIFT,
        Status::Fail(n) => {
            let n = if n > COUNT_MASK { COUNT_MASK } else { n };
            (STATE_FAIL << STATE_SHIFT) | n
        }
        Status::Skip => STATE_SKIP << STATE_SHIFT,
        Status::Error => STATE_ERROR << STATE_SHIFT,
    }
}

/// Unpack a slot word; `None` while pending
pub const fn decode(raw: u32) -> Option<Status> {
    match raw >> STATE_SHIFT {
        STATE_PASS => Some(Status::Pass),
        STATE_FAIL => Some(Status::Fail(raw & COUNT_MASK)),
        STATE_SKIP => Some(Status::Skip),
        STATE_ERROR => Some(Status::Error),
        // Unknown states are treated like an unwritten slot
        _ => None,
    }
}
