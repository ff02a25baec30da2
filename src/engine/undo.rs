//! Undo record reader, see undorecord.h / UndoFetchRecord.
//!
//! The undo log itself lives outside this crate (§1); this module defines
//! the unpacked record shape and the fetch/release contract the walker
//! relies on, plus a small in-memory reference log for tests and the demo
//! CLI.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use derivative::Derivative;
use log::trace;

use super::page::{Infomask, TransactionSlot, TupleId};
use super::xid::{Cid, Xid};
use crate::util;

/// Opaque pointer into the undo log. 0 means "no further undo" (end of
/// chain / InvalidUndoRecPtr).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Derivative)]
#[derivative(Debug)]
pub struct UndoPtr(#[derivative(Debug(format_with = "util::fmt_addr"))] pub u64);

impl UndoPtr {
    pub const INVALID: UndoPtr = UndoPtr(0);

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl From<u64> for UndoPtr {
    fn from(v: u64) -> Self {
        UndoPtr(v)
    }
}

/// The kind of mutation an undo record reverses. `InvalidXactSlot` carries
/// no tuple image: it exists purely to preserve the pre-reuse identity of a
/// slot that has since been recycled (invariant 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoRecordType {
    Insert,
    InplaceUpdate,
    Update { ctid: TupleId },
    Delete,
    LockOnly,
    InvalidXactSlot,
}

impl UndoRecordType {
    pub fn ctid(&self) -> Option<TupleId> {
        match self {
            UndoRecordType::Update { ctid } => Some(*ctid),
            _ => None,
        }
    }
}

/// An unpacked undo record: a reverse-delta plus just enough transaction
/// bookkeeping to keep walking the chain.
#[derive(Debug, Clone)]
pub struct UndoRecord {
    pub rec_type: UndoRecordType,
    pub prev_xid: Xid,
    pub prev_cid: Cid,
    pub blkprev: UndoPtr,
    /// The transaction slot that produced this undo record, used by the
    /// walker to detect a slot switch (invariant 2).
    pub trans_slot: TransactionSlot,
    /// Infomask the reconstructed tuple should carry after this record is
    /// applied (CopyTupleFromUndoRecord).
    pub infomask: Infomask,
}

/// `fetch`/`release` contract consumed by the walker. `fetch` returning
/// `Ok(None)` means "discarded", a structured outcome, not an error;
/// `Err` is reserved for genuine I/O failure (§7).
///
/// There is no explicit `release`: a fetched `UndoRecord` is owned by
/// whoever holds it and is freed by ordinary `Drop` the moment it falls out
/// of scope, per the RAII option named in the design notes.
pub trait UndoReader {
    fn fetch(
        &self,
        ptr: UndoPtr,
        tid: TupleId,
        expected_prev_xid: Option<Xid>,
    ) -> Result<Option<UndoRecord>>;
}

/// Reference undo log: an append-only map keyed by pointer, plus a
/// truncation mark below which records are reported as discarded.
#[derive(Debug, Default)]
pub struct InMemoryUndoLog {
    records: RwLock<HashMap<UndoPtr, UndoRecord>>,
    discarded_below: RwLock<UndoPtr>,
}

impl InMemoryUndoLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record at `ptr`, overwriting nothing (the log is
    /// append-only from the caller's perspective).
    pub fn insert(&self, ptr: UndoPtr, record: UndoRecord) {
        self.records.write().unwrap().insert(ptr, record);
    }

    pub fn truncate_below(&self, horizon: UndoPtr) {
        *self.discarded_below.write().unwrap() = horizon;
    }

    fn is_discarded(&self, ptr: UndoPtr) -> bool {
        let mark = *self.discarded_below.read().unwrap();
        mark.is_valid() && ptr.0 < mark.0
    }
}

impl UndoReader for InMemoryUndoLog {
    fn fetch(
        &self,
        ptr: UndoPtr,
        _tid: TupleId,
        _expected_prev_xid: Option<Xid>,
    ) -> Result<Option<UndoRecord>> {
        if !ptr.is_valid() || self.is_discarded(ptr) {
            trace!("undo fetch {:?} -> discarded/end-of-chain", ptr);
            return Ok(None);
        }
        let found = self.records.read().unwrap().get(&ptr).cloned();
        trace!("undo fetch {:?} -> {:?}", ptr, found.as_ref().map(|r| r.rec_type));
        Ok(found)
    }
}
