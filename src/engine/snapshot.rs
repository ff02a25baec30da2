//! MVCC snapshot representation, see tqual.h / SnapshotData.

use super::xid::{Cid, Xid};

/// A classic MVCC snapshot: every xid in `[xmin, xmax)` that is not in
/// `xip` has already committed or aborted as of the snapshot; every xid
/// `>= xmax` is "in the future" relative to it.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub xmin: Xid,
    pub xmax: Xid,
    pub xip: Vec<Xid>,
    /// The command id of the statement issuing the scan; a tuple produced
    /// by the current transaction at `cid >= curcid` is the effect of a
    /// later (or the same, not-yet-visible) command and must be hidden.
    pub curcid: Cid,
}

impl Snapshot {
    pub fn new(xmin: Xid, xmax: Xid, xip: Vec<Xid>, curcid: Cid) -> Self {
        Self { xmin, xmax, xip, curcid }
    }

    /// True iff `xid` was still in progress as of this snapshot, i.e. not
    /// yet visible to it. Mirrors XidInMVCCSnapshot.
    pub fn xid_in_snapshot(&self, xid: Xid) -> bool {
        if xid.precedes(self.xmin) {
            return false;
        }
        if !xid.precedes(self.xmax) {
            return true;
        }
        self.xip.contains(&xid)
    }
}
