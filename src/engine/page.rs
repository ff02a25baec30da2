//! Page opaque area and tuple header accessors, see zheapam.h / ZHeapTupleHeaderData.
//!
//! Pure functions over a pinned page: nothing here performs I/O or talks to
//! the oracle or undo reader. `PageOpaque` stands in for the real page's
//! slot table; a real integration would replace it with accessors over an
//! actual buffer (§6).

use std::collections::HashMap;

use bytes::Bytes;

use super::undo::UndoPtr;
use super::xid::{Cid, Xid};

/// `(block, offset)`, stable across in-place updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TupleId {
    pub block: u32,
    pub offset: u16,
}

impl TupleId {
    pub fn new(block: u32, offset: u16) -> Self {
        Self { block, offset }
    }
}

/// A page's transaction slot index, or the distinguished frozen sentinel
/// meaning "older than any live snapshot, fully visible" (invariant 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionSlot {
    Frozen,
    Slot(u8),
}

impl TransactionSlot {
    pub fn is_frozen(self) -> bool {
        matches!(self, TransactionSlot::Frozen)
    }
}

/// One entry of a page's slot table: the latest xid to touch the row(s)
/// under this slot, and that xid's most recent undo pointer.
#[derive(Debug, Clone, Copy)]
pub struct TransactionSlotEntry {
    pub xid: Xid,
    pub undo_ptr: UndoPtr,
}

/// Fixed-arity per-page footer holding the slot table (§3).
#[derive(Debug, Clone, Default)]
pub struct PageOpaque {
    pub slots: Vec<TransactionSlotEntry>,
}

impl PageOpaque {
    pub fn new(slots: Vec<TransactionSlotEntry>) -> Self {
        Self { slots }
    }

    fn entry(&self, slot: TransactionSlot) -> Option<&TransactionSlotEntry> {
        match slot {
            TransactionSlot::Frozen => None,
            TransactionSlot::Slot(ix) => self.slots.get(ix as usize),
        }
    }
}

/// Infomask bitset, see the `ZHEAP_*` flags in htup_details.h. Mutually
/// informative: `DELETED`/`UPDATED` end a chain, `INPLACE_UPDATED` and
/// `XID_LOCK_ONLY` continue it, `INVALID_XACT_SLOT` marks a stale slot
/// reference that must be resolved through undo before anything else.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Infomask(u8);

impl Infomask {
    pub const DELETED: u8 = 1 << 0;
    pub const UPDATED: u8 = 1 << 1;
    pub const INPLACE_UPDATED: u8 = 1 << 2;
    pub const XID_LOCK_ONLY: u8 = 1 << 3;
    pub const INVALID_XACT_SLOT: u8 = 1 << 4;

    pub fn empty() -> Self {
        Infomask(0)
    }

    pub fn from_bits(bits: u8) -> Self {
        Infomask(bits)
    }

    pub fn with(mut self, flag: u8) -> Self {
        self.0 |= flag;
        self
    }

    pub fn contains(self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    pub fn is_deleted(self) -> bool {
        self.contains(Self::DELETED)
    }

    pub fn is_updated(self) -> bool {
        self.contains(Self::UPDATED)
    }

    pub fn is_inplace_updated(self) -> bool {
        self.contains(Self::INPLACE_UPDATED)
    }

    pub fn is_lock_only(self) -> bool {
        self.contains(Self::XID_LOCK_ONLY)
    }

    pub fn is_invalid_xact_slot(self) -> bool {
        self.contains(Self::INVALID_XACT_SLOT)
    }
}

impl std::fmt::Debug for Infomask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut flags = Vec::new();
        if self.is_deleted() {
            flags.push("DELETED");
        }
        if self.is_updated() {
            flags.push("UPDATED");
        }
        if self.is_inplace_updated() {
            flags.push("INPLACE_UPDATED");
        }
        if self.is_lock_only() {
            flags.push("XID_LOCK_ONLY");
        }
        if self.is_invalid_xact_slot() {
            flags.push("INVALID_XACT_SLOT");
        }
        write!(f, "Infomask({})", flags.join("|"))
    }
}

/// The tagged-variant view of (infomask, operation) recommended by the
/// design notes, so the decision tables in the walker/predicates can match
/// exhaustively instead of re-testing flag bits everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TupleKind {
    Root,
    InPlaceUpdated,
    LockOnly,
    Deleted,
}

/// A physical tuple: a row version with its self-identifier, infomask,
/// slot reference, and opaque row payload. The xid of a tuple produced
/// mid-walk is *not* stored here — it is tracked by the walker loop, since
/// the whole point of slot indirection is that the header itself doesn't
/// carry it (§3).
#[derive(Debug, Clone)]
pub struct Tuple {
    pub self_id: TupleId,
    pub infomask: Infomask,
    pub slot: TransactionSlot,
    pub row: Bytes,
}

impl Tuple {
    pub fn new(self_id: TupleId, infomask: Infomask, slot: TransactionSlot, row: Bytes) -> Self {
        Self { self_id, infomask, slot, row }
    }

    /// §4.C `slot(tuple)`.
    pub fn slot(&self) -> TransactionSlot {
        self.slot
    }

    pub fn kind(&self) -> TupleKind {
        if self.infomask.is_deleted() || self.infomask.is_updated() {
            TupleKind::Deleted
        } else if self.infomask.is_inplace_updated() {
            TupleKind::InPlaceUpdated
        } else if self.infomask.is_lock_only() {
            TupleKind::LockOnly
        } else {
            TupleKind::Root
        }
    }
}

/// §4.C `raw_xid(tuple, opaque)`. Undefined (returns `Xid::INVALID`) when
/// the tuple's slot carries `INVALID_XACT_SLOT`: callers must not trust it
/// in that case and instead walk undo (invariant 5).
pub fn raw_xid(tuple: &Tuple, opaque: &PageOpaque) -> Xid {
    if tuple.infomask.is_invalid_xact_slot() {
        return Xid::INVALID;
    }
    opaque.entry(tuple.slot).map(|e| e.xid).unwrap_or(Xid::INVALID)
}

/// §4.C `raw_undo_ptr(tuple, opaque)`.
pub fn raw_undo_ptr(tuple: &Tuple, opaque: &PageOpaque) -> UndoPtr {
    if tuple.infomask.is_invalid_xact_slot() {
        return UndoPtr::INVALID;
    }
    opaque.entry(tuple.slot).map(|e| e.undo_ptr).unwrap_or(UndoPtr::INVALID)
}

/// The slot's own, always-current undo pointer — used by the walker's
/// slot-switch step (invariant 2), independent of what a stale tuple
/// thinks its undo pointer is.
pub fn slot_undo_ptr(slot: TransactionSlot, opaque: &PageOpaque) -> UndoPtr {
    opaque.entry(slot).map(|e| e.undo_ptr).unwrap_or(UndoPtr::INVALID)
}

/// §4.C `get_cid(tuple, buffer)`: only meaningful when the tuple's xid is
/// the caller's own current transaction, otherwise invalid.
pub fn get_cid(is_current: bool, current_cid: Cid) -> Cid {
    if is_current {
        current_cid
    } else {
        Cid::INVALID
    }
}

/// The bundle the design notes call for: "an accessor object exposing only
/// the four needed operations (slot table, raw xid, raw undo pointer,
/// current-tx cid)". The walker and predicates take `&dyn PageAccess`
/// instead of threading `&PageOpaque` plus a separate cid lookup everywhere.
pub trait PageAccess {
    fn opaque(&self) -> &PageOpaque;

    /// Stands in for `ZHeapTupleGetCid(tuple, buffer)`: the current
    /// transaction's own cid for its latest mutation of `tid`, independent
    /// of what got persisted to undo (a real buffer tracks this locally,
    /// per-pin, for exactly this reason).
    fn current_cid(&self, xid: Xid, tid: TupleId) -> Cid;

    fn raw_xid(&self, tuple: &Tuple) -> Xid {
        raw_xid(tuple, self.opaque())
    }

    fn raw_undo_ptr(&self, tuple: &Tuple) -> UndoPtr {
        raw_undo_ptr(tuple, self.opaque())
    }

    fn slot_undo_ptr(&self, slot: TransactionSlot) -> UndoPtr {
        slot_undo_ptr(slot, self.opaque())
    }
}

/// Reference page pin: a slot table plus the per-tuple local cid cache a
/// real buffer pin would carry for the current transaction's own writes.
#[derive(Debug, Default)]
pub struct PinnedPage {
    pub opaque: PageOpaque,
    local_cids: HashMap<(Xid, TupleId), Cid>,
}

impl PinnedPage {
    pub fn new(opaque: PageOpaque) -> Self {
        Self { opaque, local_cids: HashMap::new() }
    }

    pub fn record_local_cid(&mut self, xid: Xid, tid: TupleId, cid: Cid) {
        self.local_cids.insert((xid, tid), cid);
    }
}

impl PageAccess for PinnedPage {
    fn opaque(&self) -> &PageOpaque {
        &self.opaque
    }

    fn current_cid(&self, xid: Xid, tid: TupleId) -> Cid {
        self.local_cids.get(&(xid, tid)).copied().unwrap_or(Cid::INVALID)
    }
}
