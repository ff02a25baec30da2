//! Synthetic fixtures for exercising the visibility core without a real
//! transaction manager, undo log, or buffer pool (§2.A of the design doc).
//!
//! A `DemoConfig` is loaded from a small JSON file and turned into an
//! in-memory page, undo log, oracle, and snapshot — everything the six
//! predicates need, built from data instead of a live engine. This is the
//! only place in the crate that reads an external file; every unit and
//! integration test builds its fixtures in-process instead.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::engine::oracle::InMemoryOracle;
use crate::engine::page::{Infomask, PageOpaque, PinnedPage, TransactionSlot, TransactionSlotEntry, Tuple, TupleId};
use crate::engine::snapshot::Snapshot;
use crate::engine::undo::{InMemoryUndoLog, UndoPtr, UndoRecord, UndoRecordType};
use crate::engine::xid::{Cid, Xid};

#[derive(Debug, Deserialize)]
pub struct DemoConfig {
    /// `RecentGlobalXmin`, always a plain value per §9, never ambient state.
    pub horizon: u32,
    /// The xid of "our own" transaction, if any tuple in the fixture is
    /// meant to be seen as self-authored.
    pub current_xid: Option<u32>,
    pub snapshot: SnapshotFixture,
    #[serde(default)]
    pub xacts: HashMap<u32, XactStateFixture>,
    pub page: PageFixture,
    #[serde(default)]
    pub undo: HashMap<u64, UndoRecordFixture>,
    pub tuple: TupleFixture,
    #[serde(default)]
    pub local_cids: Vec<LocalCidFixture>,
}

#[derive(Debug, Deserialize)]
pub struct SnapshotFixture {
    pub xmin: u32,
    pub xmax: u32,
    #[serde(default)]
    pub xip: Vec<u32>,
    pub curcid: u32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XactStateFixture {
    Active,
    Committed,
    Aborted,
}

#[derive(Debug, Deserialize)]
pub struct PageFixture {
    pub slots: Vec<SlotFixture>,
}

#[derive(Debug, Deserialize)]
pub struct SlotFixture {
    pub xid: u32,
    pub undo_ptr: u64,
}

#[derive(Debug, Deserialize)]
pub struct UndoRecordFixture {
    #[serde(rename = "type")]
    pub rec_type: UndoRecordTypeFixture,
    pub prev_xid: u32,
    #[serde(default)]
    pub prev_cid: Option<u32>,
    #[serde(default)]
    pub blkprev: u64,
    pub trans_slot: SlotRefFixture,
    #[serde(default)]
    pub infomask: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UndoRecordTypeFixture {
    Insert,
    InplaceUpdate,
    Update { block: u32, offset: u16 },
    Delete,
    LockOnly,
    InvalidXactSlot,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SlotRefFixture {
    Frozen(FrozenTag),
    Slot(u8),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrozenTag {
    Frozen,
}

#[derive(Debug, Deserialize)]
pub struct TupleFixture {
    pub block: u32,
    pub offset: u16,
    #[serde(default)]
    pub infomask: Vec<String>,
    pub slot: SlotRefFixture,
}

#[derive(Debug, Deserialize)]
pub struct LocalCidFixture {
    pub xid: u32,
    pub block: u32,
    pub offset: u16,
    pub cid: u32,
}

fn parse_infomask(flags: &[String]) -> Infomask {
    let mut mask = Infomask::empty();
    for flag in flags {
        mask = match flag.as_str() {
            "DELETED" => mask.with(Infomask::DELETED),
            "UPDATED" => mask.with(Infomask::UPDATED),
            "INPLACE_UPDATED" => mask.with(Infomask::INPLACE_UPDATED),
            "XID_LOCK_ONLY" => mask.with(Infomask::XID_LOCK_ONLY),
            "INVALID_XACT_SLOT" => mask.with(Infomask::INVALID_XACT_SLOT),
            other => panic!("unknown infomask flag in fixture: {other}"),
        };
    }
    mask
}

fn parse_slot(slot: &SlotRefFixture) -> TransactionSlot {
    match slot {
        SlotRefFixture::Frozen(_) => TransactionSlot::Frozen,
        SlotRefFixture::Slot(ix) => TransactionSlot::Slot(*ix),
    }
}

/// Everything a predicate call needs, built from one [`DemoConfig`].
pub struct Built {
    pub oracle: InMemoryOracle,
    pub undo_log: InMemoryUndoLog,
    pub page: PinnedPage,
    pub tuple: Tuple,
    pub snapshot: Snapshot,
    pub horizon: Xid,
}

impl DemoConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("reading fixture file {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing fixture file {}", path.display()))
    }

    pub fn build(&self) -> Built {
        let oracle = match self.current_xid {
            Some(xid) => InMemoryOracle::new(Xid::from(xid)),
            None => InMemoryOracle::without_current(),
        };
        for (xid, state) in &self.xacts {
            match state {
                XactStateFixture::Active => oracle.mark_active(Xid::from(*xid)),
                XactStateFixture::Committed => oracle.mark_committed(Xid::from(*xid)),
                XactStateFixture::Aborted => oracle.mark_aborted(Xid::from(*xid)),
            }
        }

        let undo_log = InMemoryUndoLog::new();
        for (ptr, rec) in &self.undo {
            let rec_type = match &rec.rec_type {
                UndoRecordTypeFixture::Insert => UndoRecordType::Insert,
                UndoRecordTypeFixture::InplaceUpdate => UndoRecordType::InplaceUpdate,
                UndoRecordTypeFixture::Update { block, offset } => {
                    UndoRecordType::Update { ctid: TupleId::new(*block, *offset) }
                }
                UndoRecordTypeFixture::Delete => UndoRecordType::Delete,
                UndoRecordTypeFixture::LockOnly => UndoRecordType::LockOnly,
                UndoRecordTypeFixture::InvalidXactSlot => UndoRecordType::InvalidXactSlot,
            };
            undo_log.insert(
                UndoPtr::from(*ptr),
                UndoRecord {
                    rec_type,
                    prev_xid: Xid::from(rec.prev_xid),
                    prev_cid: rec.prev_cid.map(Cid::from).unwrap_or(Cid::INVALID),
                    blkprev: UndoPtr::from(rec.blkprev),
                    trans_slot: parse_slot(&rec.trans_slot),
                    infomask: parse_infomask(&rec.infomask),
                },
            );
        }

        let slots = self.page.slots.iter().map(|s| TransactionSlotEntry { xid: Xid::from(s.xid), undo_ptr: UndoPtr::from(s.undo_ptr) }).collect();
        let mut page = PinnedPage::new(PageOpaque::new(slots));
        for local in &self.local_cids {
            page.record_local_cid(Xid::from(local.xid), TupleId::new(local.block, local.offset), Cid::from(local.cid));
        }

        let tuple = Tuple::new(
            TupleId::new(self.tuple.block, self.tuple.offset),
            parse_infomask(&self.tuple.infomask),
            parse_slot(&self.tuple.slot),
            bytes::Bytes::new(),
        );

        let snapshot = Snapshot::new(
            Xid::from(self.snapshot.xmin),
            Xid::from(self.snapshot.xmax),
            self.snapshot.xip.iter().copied().map(Xid::from).collect(),
            Cid::from(self.snapshot.curcid),
        );

        Built { oracle, undo_log, page, tuple, snapshot, horizon: Xid::from(self.horizon) }
    }
}

#[cfg(test)]
mod fixture_tests {
    use super::*;
    use crate::engine::oracle::TransactionOracle;

    #[test]
    fn loads_a_minimal_fixture_and_builds_reference_collaborators() {
        let json = r#"{
            "horizon": 100,
            "current_xid": null,
            "snapshot": {"xmin": 10, "xmax": 1000, "xip": [50], "curcid": 5},
            "xacts": {"80": "committed"},
            "page": {"slots": [{"xid": 80, "undo_ptr": 5}]},
            "undo": {},
            "tuple": {"block": 3, "offset": 9, "infomask": [], "slot": 0}
        }"#;
        let dir = std::env::temp_dir().join(format!("vis-core-fixture-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("fixture.json");
        fs::write(&path, json).unwrap();

        let config = DemoConfig::load(&path).unwrap();
        let built = config.build();
        assert_eq!(built.horizon, Xid::from(100));
        assert!(built.oracle.did_commit(Xid::from(80)));
        assert_eq!(built.tuple.self_id, TupleId::new(3, 9));

        fs::remove_file(&path).ok();
        fs::remove_dir(&dir).ok();
    }
}
