//! Undo chain walker, see `GetTupleFromUndo` / `UndoTupleSatisfiesUpdate` /
//! the chain-walking half of `ZHeapTupleSatisfiesMVCC` in ztqual.c.
//!
//! The two entry points differ only in how they decide whether a tuple's
//! last writer is "not yet visible to the caller": MVCC mode asks the
//! snapshot, update mode asks the oracle directly whether the writer is
//! still in progress. Everything else — slot switching, the frozen/horizon
//! shortcut, invalid-slot identity resolution, the per-class decision
//! tables — is shared, so both are thin wrappers around one `walk` loop.

use anyhow::Result;

use super::oracle::TransactionOracle;
use super::page::{get_cid, PageAccess, Tuple, TupleId, TupleKind};
use super::snapshot::Snapshot;
use super::undo::{UndoPtr, UndoReader, UndoRecordType};
use super::xid::{Cid, Xid};

/// Bounds both the outer chain walk and the inner invalid-slot resolution
/// loop. A well-formed chain never approaches this; it exists so a corrupt
/// or cyclic one fails loud instead of spinning forever (§4.D property 5).
const MAX_CHAIN_STEPS: usize = 10_000;

/// What distinguishes `GetTupleFromUndo` from `UndoTupleSatisfiesUpdate`:
/// the "is this writer not yet visible" test, and the curcid it is compared
/// against.
#[derive(Clone, Copy)]
pub enum WalkMode<'a> {
    Mvcc(&'a Snapshot),
    Update(Cid),
}

impl<'a> WalkMode<'a> {
    pub(crate) fn curcid(&self) -> Cid {
        match self {
            WalkMode::Mvcc(snapshot) => snapshot.curcid,
            WalkMode::Update(curcid) => *curcid,
        }
    }

    pub(crate) fn not_yet_visible(&self, oracle: &dyn TransactionOracle, xid: Xid) -> bool {
        match self {
            WalkMode::Mvcc(snapshot) => oracle.xid_in_snapshot(xid, snapshot),
            WalkMode::Update(_) => oracle.is_in_progress(xid),
        }
    }
}

/// Result of walking back through undo: the resolved prior tuple (if any),
/// the ctid an `UPDATE` record pointed at along the way (only meaningful in
/// `Update` mode), and whether any step along the way was an in-place
/// update or a lock-only record.
#[derive(Debug, Default)]
pub struct WalkOutcome {
    pub tuple: Option<Tuple>,
    pub ctid: Option<TupleId>,
    pub in_place_or_locked: bool,
}

/// `(xid, cid, urec_ptr)` resolved for a tuple, per §4.E.
#[derive(Debug, Clone, Copy)]
pub struct Identity {
    pub xid: Xid,
    pub cid: Cid,
    pub urec_ptr: UndoPtr,
}

impl Identity {
    fn invalid(urec_ptr: UndoPtr) -> Self {
        Self { xid: Xid::INVALID, cid: Cid::INVALID, urec_ptr }
    }
}

/// Walks invalid-slot records from `urec_ptr` until the first one typed
/// `InvalidXactSlot`, mirroring the do-while in `ZHeapTupleSatisfiesMVCC`
/// that resolves a tuple's *own* header when its slot was reused. No xid
/// comparison: the first boundary found is the tuple's own.
fn resolve_entry_identity(
    reader: &dyn UndoReader,
    tid: TupleId,
    mut urec_ptr: UndoPtr,
) -> Result<Identity> {
    for _ in 0..MAX_CHAIN_STEPS {
        let urec = match reader.fetch(urec_ptr, tid, None)? {
            Some(r) => r,
            None => return Ok(Identity::invalid(urec_ptr)),
        };
        let identity = Identity { xid: urec.prev_xid, cid: urec.prev_cid, urec_ptr: urec.blkprev };
        if urec.rec_type == UndoRecordType::InvalidXactSlot {
            return Ok(identity);
        }
        urec_ptr = urec.blkprev;
    }
    Ok(Identity::invalid(urec_ptr))
}

/// Walks invalid-slot records mid-chain, exiting only once both the record
/// is typed `InvalidXactSlot` *and* its xid matches the one already being
/// tracked by the outer walk — a slot can be reused more than once, so the
/// boundary for this particular writer may not be the first one found.
fn resolve_invalid_slot_identity(
    reader: &dyn UndoReader,
    horizon: Xid,
    tid: TupleId,
    mut urec_ptr: UndoPtr,
    tracked_xid: Xid,
) -> Result<Identity> {
    for _ in 0..MAX_CHAIN_STEPS {
        let urec = match reader.fetch(urec_ptr, tid, None)? {
            Some(r) => r,
            None => return Ok(Identity::invalid(urec_ptr)),
        };
        if urec.prev_xid.precedes(horizon) {
            return Ok(Identity::invalid(urec_ptr));
        }
        let identity = Identity { xid: urec.prev_xid, cid: urec.prev_cid, urec_ptr: urec.blkprev };
        if urec.rec_type == UndoRecordType::InvalidXactSlot && identity.xid == tracked_xid {
            return Ok(identity);
        }
        urec_ptr = urec.blkprev;
    }
    Ok(Identity::invalid(urec_ptr))
}

/// §4.E's opening step, shared by every predicate: resolve the starting
/// `(xid, cid, urec_ptr)` for `tuple` before any visibility logic runs.
pub fn resolve_tuple_identity(
    tuple: &Tuple,
    page: &dyn PageAccess,
    oracle: &dyn TransactionOracle,
    reader: &dyn UndoReader,
) -> Result<Identity> {
    if tuple.slot().is_frozen() {
        return Ok(Identity::invalid(UndoPtr::INVALID));
    }
    if tuple.infomask.is_invalid_xact_slot() {
        let seed = page.slot_undo_ptr(tuple.slot());
        return resolve_entry_identity(reader, tuple.self_id, seed);
    }
    let xid = page.raw_xid(tuple);
    let cid = get_cid(oracle.is_current(xid), page.current_cid(xid, tuple.self_id));
    let urec_ptr = page.raw_undo_ptr(tuple);
    Ok(Identity { xid, cid, urec_ptr })
}

/// The outcome of classifying one tuple version against the current
/// transaction/snapshot state, shared between the entry-level predicates
/// and every step of the chain walk (the two are the same decision table,
/// just applied to a different tuple — see `ZHeapTupleSatisfiesMVCC`'s own
/// body, which inlines this exact table for the tuple it started with
/// before ever calling `GetTupleFromUndo`).
pub(crate) enum Decision {
    /// This version is the answer; stop here.
    Visible,
    /// This version is not visible and there is no earlier one to try.
    Invisible,
    /// Not visible yet; keep walking back through undo.
    Recurse,
}

pub(crate) fn decide(kind: TupleKind, is_current: bool, not_yet_visible: bool, committed: bool, cid: Cid, curcid: Cid) -> Decision {
    match kind {
        // mirrors the LockOnly/InPlaceUpdated arm below with Visible and
        // Invisible swapped: a deleted tuple's "effect applied" case means
        // the row is truly gone (Invisible), not that the on-page image is
        // the answer. `walk` never reaches this arm — a DELETE/UPDATE undo
        // record always ends a chain — only the entry-level predicates call
        // `decide` with this kind.
        TupleKind::Deleted => {
            if is_current {
                if cid.0 >= curcid.0 {
                    Decision::Recurse
                } else {
                    Decision::Invisible
                }
            } else if not_yet_visible {
                Decision::Recurse
            } else if committed {
                Decision::Invisible
            } else {
                Decision::Recurse
            }
        }
        TupleKind::LockOnly | TupleKind::InPlaceUpdated => {
            if is_current {
                if matches!(kind, TupleKind::LockOnly) {
                    Decision::Visible
                } else if cid.0 >= curcid.0 {
                    Decision::Recurse
                } else {
                    Decision::Visible
                }
            } else if not_yet_visible {
                Decision::Recurse
            } else if committed {
                Decision::Visible
            } else {
                // aborted: the in-place/lock effect didn't happen, but the
                // slot may still hold an earlier writer's work underneath.
                Decision::Recurse
            }
        }
        TupleKind::Root => {
            if is_current {
                if cid.0 >= curcid.0 {
                    Decision::Invisible
                } else {
                    Decision::Visible
                }
            } else if not_yet_visible {
                Decision::Invisible
            } else if committed {
                Decision::Visible
            } else {
                Decision::Invisible
            }
        }
    }
}

/// Classifies a tuple already known to be frozen-or-ancient: always visible
/// (invariant 4), short-circuiting before the decision table above, which
/// has nothing to say about frozen tuples.
pub(crate) fn past_horizon(slot_frozen: bool, oracle: &dyn TransactionOracle, xid: Xid, horizon: Xid) -> bool {
    slot_frozen || oracle.precedes(xid, horizon)
}

/// Core chain walk shared by `get_from_undo` and `undo_satisfies_update`.
/// `identity` is the already-resolved `(xid, cid, urec_ptr)` of the tuple
/// the caller is trying to look past (its own version is never returned;
/// the walk starts from `identity.urec_ptr`, i.e. one step further back).
pub fn walk(
    oracle: &dyn TransactionOracle,
    reader: &dyn UndoReader,
    page: &dyn PageAccess,
    horizon: Xid,
    mode: WalkMode,
    tid: TupleId,
    start_slot: super::page::TransactionSlot,
    mut urec_ptr: UndoPtr,
) -> Result<WalkOutcome> {
    let mut out = WalkOutcome::default();
    let mut prev_xid = Xid::INVALID;
    // per §4.D: "prev_trans_slot_id initialized from the starting tuple's
    // slot", not from the first undo step — the very first hop must be able
    // to detect a slot switch relative to the tuple's own slot.
    let mut prev_slot = Some(start_slot);

    for _ in 0..MAX_CHAIN_STEPS {
        let mut maybe_urec = reader.fetch(urec_ptr, tid, Some(prev_xid))?;
        while let Some(r) = maybe_urec.as_ref() {
            if r.rec_type != UndoRecordType::InvalidXactSlot {
                break;
            }
            urec_ptr = r.blkprev;
            maybe_urec = reader.fetch(urec_ptr, tid, Some(prev_xid))?;
        }
        let urec = match maybe_urec {
            Some(r) => r,
            None => return Ok(out),
        };

        let trans_slot = urec.trans_slot;
        let mut next_urec_ptr = urec.blkprev;
        let mut xid = urec.prev_xid;
        let mut cid = urec.prev_cid;
        let undo_tup = Tuple::new(tid, urec.infomask, trans_slot, bytes::Bytes::new());

        if matches!(mode, WalkMode::Update(_)) {
            out.ctid = Some(match urec.rec_type {
                UndoRecordType::Update { ctid } => ctid,
                _ => undo_tup.self_id,
            });
        }

        let kind = undo_tup.kind();
        if matches!(kind, TupleKind::Deleted) {
            // a DELETE/UPDATE record should never appear mid-chain: those
            // end a chain at the page level, never get re-undone past.
            return Ok(out);
        }
        if matches!(kind, TupleKind::InPlaceUpdated | TupleKind::LockOnly) {
            out.in_place_or_locked = true;
        }

        if !trans_slot.is_frozen() && trans_slot != prev_slot.unwrap_or(trans_slot) {
            next_urec_ptr = page.slot_undo_ptr(trans_slot);
        }

        if !trans_slot.is_frozen() && !oracle.precedes(xid, horizon) {
            if undo_tup.infomask.is_invalid_xact_slot() {
                let identity = resolve_invalid_slot_identity(reader, horizon, tid, next_urec_ptr, xid)?;
                xid = identity.xid;
                cid = identity.cid;
                next_urec_ptr = identity.urec_ptr;
            } else {
                cid = get_cid(oracle.is_current(xid), page.current_cid(xid, tid));
            }
        }

        if past_horizon(trans_slot.is_frozen(), oracle, xid, horizon) {
            out.tuple = Some(undo_tup);
            return Ok(out);
        }

        let is_current = oracle.is_current(xid);
        let not_yet_visible = mode.not_yet_visible(oracle, xid);
        let committed = oracle.did_commit(xid);

        match decide(kind, is_current, not_yet_visible, committed, cid, mode.curcid()) {
            Decision::Visible => {
                out.tuple = Some(undo_tup);
                return Ok(out);
            }
            Decision::Invisible => return Ok(out),
            Decision::Recurse => {
                prev_xid = xid;
                prev_slot = Some(trans_slot);
                urec_ptr = next_urec_ptr;
            }
        }
    }

    log::warn!("undo chain exceeded {} steps at {:?}, treating as invisible", MAX_CHAIN_STEPS, tid);
    Ok(out)
}

/// §4.C `get_ctid(tuple, buffer, out)`: for `UPDATED` tuples, the moved-to
/// pointer comes from the undo record at `urec_ptr`, which is already the
/// record this tuple's own mutation wrote (`resolve_tuple_identity` has
/// walked past any `InvalidXactSlot` headers by the time callers get here).
/// `None` if the record is missing or carries no `ctid` (a plain `DELETE`).
pub fn fetch_ctid(reader: &dyn UndoReader, tid: TupleId, urec_ptr: UndoPtr) -> Result<Option<TupleId>> {
    Ok(reader.fetch(urec_ptr, tid, None)?.and_then(|r| r.rec_type.ctid()))
}

/// `GetTupleFromUndo`: walk back through undo under a snapshot, returning
/// the first version visible to it, if any.
pub fn get_from_undo(
    oracle: &dyn TransactionOracle,
    reader: &dyn UndoReader,
    page: &dyn PageAccess,
    horizon: Xid,
    snapshot: &Snapshot,
    tid: TupleId,
    start_slot: super::page::TransactionSlot,
    urec_ptr: UndoPtr,
) -> Result<Option<Tuple>> {
    Ok(walk(oracle, reader, page, horizon, WalkMode::Mvcc(snapshot), tid, start_slot, urec_ptr)?.tuple)
}

/// `UndoTupleSatisfiesUpdate`: walk back through undo resolving whether an
/// update/delete/lock attempt should proceed, reporting the ctid chain it
/// crossed along the way and whether any in-place/lock step was involved.
pub fn undo_satisfies_update(
    oracle: &dyn TransactionOracle,
    reader: &dyn UndoReader,
    page: &dyn PageAccess,
    horizon: Xid,
    curcid: Cid,
    tid: TupleId,
    start_slot: super::page::TransactionSlot,
    urec_ptr: UndoPtr,
) -> Result<WalkOutcome> {
    walk(oracle, reader, page, horizon, WalkMode::Update(curcid), tid, start_slot, urec_ptr)
}
