//! Transaction oracle, see procarray.c / TransactionIdIsInProgress &co.
//!
//! The real transaction manager lives outside this crate; this module only
//! defines the capability it must expose to the visibility core, plus a
//! small in-memory reference implementation so the crate can be exercised
//! without one.

use std::collections::HashMap;
use std::sync::RwLock;

use super::snapshot::Snapshot;
use super::xid::Xid;

/// The four-way classification every predicate ultimately switches on.
/// `Aborted` is never asked for directly; it is inferred as "none of the
/// other three".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XactOutcome {
    Current,
    InProgress,
    Committed,
    Aborted,
}

/// Capabilities the visibility core needs from the transaction manager.
/// Implementations must be internally consistent for the duration of one
/// predicate call, but need not be linearizable across calls (§4.A).
pub trait TransactionOracle {
    fn is_current(&self, xid: Xid) -> bool;
    fn is_in_progress(&self, xid: Xid) -> bool;
    fn did_commit(&self, xid: Xid) -> bool;

    fn precedes(&self, xid: Xid, horizon: Xid) -> bool {
        xid.precedes(horizon)
    }

    fn xid_in_snapshot(&self, xid: Xid, snapshot: &Snapshot) -> bool {
        snapshot.xid_in_snapshot(xid)
    }

    /// Aborted is inferred, never reported directly by the backing store.
    fn outcome(&self, xid: Xid) -> XactOutcome {
        if !xid.is_valid() {
            // an invalid xid only ever shows up for a frozen/all-visible
            // tuple, which callers short-circuit before asking the oracle.
            return XactOutcome::Committed;
        }
        if self.is_current(xid) {
            XactOutcome::Current
        } else if self.is_in_progress(xid) {
            XactOutcome::InProgress
        } else if self.did_commit(xid) {
            XactOutcome::Committed
        } else {
            XactOutcome::Aborted
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum XactState {
    Active,
    Committed,
    Aborted,
}

/// Reference oracle: tracks xid -> state in a map, plus which xid (if any)
/// is "the current transaction" for this call. No WAL/log-record
/// bookkeeping, since WAL construction is out of scope.
#[derive(Debug, Default)]
pub struct InMemoryOracle {
    states: RwLock<HashMap<Xid, XactState>>,
    current: Option<Xid>,
}

impl InMemoryOracle {
    pub fn new(current: Xid) -> Self {
        Self { states: RwLock::new(HashMap::new()), current: Some(current) }
    }

    pub fn without_current() -> Self {
        Self { states: RwLock::new(HashMap::new()), current: None }
    }

    pub fn mark_active(&self, xid: Xid) {
        self.states.write().unwrap().insert(xid, XactState::Active);
    }

    pub fn mark_committed(&self, xid: Xid) {
        self.states.write().unwrap().insert(xid, XactState::Committed);
    }

    pub fn mark_aborted(&self, xid: Xid) {
        self.states.write().unwrap().insert(xid, XactState::Aborted);
    }

    pub fn current_xid(&self) -> Option<Xid> {
        self.current
    }
}

impl TransactionOracle for InMemoryOracle {
    fn is_current(&self, xid: Xid) -> bool {
        self.current == Some(xid)
    }

    fn is_in_progress(&self, xid: Xid) -> bool {
        matches!(self.states.read().unwrap().get(&xid), Some(XactState::Active))
    }

    fn did_commit(&self, xid: Xid) -> bool {
        matches!(self.states.read().unwrap().get(&xid), Some(XactState::Committed))
    }
}

#[cfg(test)]
mod oracle_tests {
    use super::*;

    #[test]
    fn unknown_xid_is_aborted_by_inference() {
        let oracle = InMemoryOracle::without_current();
        assert_eq!(oracle.outcome(Xid::from(7)), XactOutcome::Aborted);
    }

    #[test]
    fn current_xid_wins_over_recorded_state() {
        let oracle = InMemoryOracle::new(Xid::from(42));
        oracle.mark_committed(Xid::from(42));
        // is_current is checked first by `outcome`, so even a
        // (nonsensically) committed current xid reports as Current.
        assert_eq!(oracle.outcome(Xid::from(42)), XactOutcome::Current);
    }

    #[test]
    fn tracks_in_progress_committed_and_aborted() {
        let oracle = InMemoryOracle::without_current();
        oracle.mark_active(Xid::from(1));
        oracle.mark_committed(Xid::from(2));
        oracle.mark_aborted(Xid::from(3));

        assert_eq!(oracle.outcome(Xid::from(1)), XactOutcome::InProgress);
        assert_eq!(oracle.outcome(Xid::from(2)), XactOutcome::Committed);
        assert_eq!(oracle.outcome(Xid::from(3)), XactOutcome::Aborted);
    }
}
