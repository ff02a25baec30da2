#![allow(clippy::upper_case_acronyms)]

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use log::{debug, info};

use undo_vis::engine::oracle::{InMemoryOracle, TransactionOracle};
use undo_vis::engine::page::{Infomask, PageOpaque, PinnedPage, TransactionSlot, TransactionSlotEntry, Tuple, TupleId};
use undo_vis::engine::snapshot::Snapshot;
use undo_vis::engine::undo::{InMemoryUndoLog, UndoPtr, UndoRecord, UndoRecordType};
use undo_vis::engine::visibility;
use undo_vis::engine::xid::{Cid, Xid};
use undo_vis::fixture::DemoConfig;
use undo_vis::util;

/// CLI harness for the visibility core: drives the reference oracle and
/// reference undo log against either a built-in scenario or a JSON
/// fixture, and prints the resulting verdict. This is the crate's only
/// consumer until a real engine embeds `undo_vis::engine` directly.
#[derive(Debug, Parser)]
#[command(author, version, about = "Tuple visibility core demo harness", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the literal end-to-end scenarios from the design doc's testable
    /// properties section and print each verdict.
    Scenarios,

    /// Evaluate one predicate against a JSON fixture file.
    Check {
        /// Path to a DemoConfig JSON fixture.
        fixture: PathBuf,

        #[command(subcommand)]
        predicate: PredicateArg,
    },
}

#[derive(Debug, Subcommand)]
enum PredicateArg {
    /// SatisfiesMVCC
    Mvcc,
    /// SatisfiesUpdate
    Update {
        #[arg(long, default_value_t = false)]
        lock_allowed: bool,
    },
    /// SatisfiesDirty
    Dirty,
    /// SatisfiesAny
    Any,
    /// SatisfiesOldestXmin
    OldestXmin {
        /// The OldestXmin threshold distinguishing recently-dead from dead.
        oldest_xmin: u32,
    },
    /// IsSurelyDead
    SurelyDead,
}

#[derive(Debug)]
pub struct App {
    pub timer: Instant,
}

impl App {
    pub fn new() -> Self {
        Self { timer: Instant::now() }
    }

    pub fn time_costs(&self) -> Duration {
        self.timer.elapsed()
    }

    pub fn run(&mut self, command: Commands) -> Result<()> {
        debug!("running {:?}", command);
        match command {
            Commands::Scenarios => self.do_scenarios(),
            Commands::Check { fixture, predicate } => self.do_check(fixture, predicate),
        }
    }

    fn do_scenarios(&self) -> Result<()> {
        for (n, describe) in SCENARIOS.iter().enumerate() {
            println!("{} {}", format!("scenario {}:", n + 1).bold(), describe()?);
        }
        Ok(())
    }

    fn do_check(&self, fixture: PathBuf, predicate: PredicateArg) -> Result<()> {
        let config = DemoConfig::load(&fixture)?;
        let built = config.build();

        match predicate {
            PredicateArg::Mvcc => {
                let result = visibility::satisfies_mvcc(&built.tuple, &built.snapshot, &built.oracle, &built.undo_log, &built.page, built.horizon)?;
                print_tuple_verdict("SatisfiesMVCC", result.is_some());
            }
            PredicateArg::Update { lock_allowed } => {
                let (outcome, detail) = visibility::satisfies_update(
                    &built.tuple,
                    built.snapshot.curcid,
                    &built.snapshot,
                    lock_allowed,
                    &built.oracle,
                    &built.undo_log,
                    &built.page,
                    built.horizon,
                )?;
                println!("SatisfiesUpdate -> {:?} (ctid={:?})", outcome, detail.ctid);
            }
            PredicateArg::Dirty => {
                let (result, snap) = visibility::satisfies_dirty(&built.tuple, &built.oracle, &built.undo_log, &built.page, built.horizon, None)?;
                print_tuple_verdict("SatisfiesDirty", result.is_some());
                println!("  xmin={:?} xmax={:?}", snap.xmin, snap.xmax);
            }
            PredicateArg::Any => {
                let result = visibility::satisfies_any(&built.tuple);
                print_tuple_verdict("SatisfiesAny", result.is_some());
            }
            PredicateArg::OldestXmin { oldest_xmin } => {
                let state = visibility::satisfies_oldest_xmin(&built.tuple, Xid::from(oldest_xmin), &built.oracle, &built.undo_log, &built.page, built.horizon)?;
                println!("SatisfiesOldestXmin -> {:?}", state);
            }
            PredicateArg::SurelyDead => {
                let dead = visibility::is_surely_dead(&built.tuple, &built.oracle, &built.undo_log, &built.page, built.horizon)?;
                print_tuple_verdict("IsSurelyDead", dead);
            }
        }
        Ok(())
    }
}

fn print_tuple_verdict(label: &str, visible: bool) {
    if visible {
        println!("{} -> {}", label, "visible".green());
    } else {
        println!("{} -> {}", label, "not visible".red());
    }
}

type ScenarioFn = fn() -> Result<String>;

const SCENARIOS: &[ScenarioFn] = &[scenario_1, scenario_2, scenario_3, scenario_4, scenario_5, scenario_6];

fn page_with(xid: u32, undo_ptr: u64) -> PinnedPage {
    PinnedPage::new(PageOpaque::new(vec![TransactionSlotEntry { xid: Xid::from(xid), undo_ptr: UndoPtr::from(undo_ptr) }]))
}

fn tuple_with(slot_ix: u8, infomask: Infomask) -> Tuple {
    Tuple::new(TupleId::new(1, 1), infomask, TransactionSlot::Slot(slot_ix), bytes::Bytes::new())
}

/// Snapshot `S = {curcid=5, in_flight={50}}` shared by the literal scenarios.
fn shared_snapshot() -> Snapshot {
    Snapshot::new(Xid::from(1), Xid::from(1000), vec![Xid::from(50)], Cid::from(5))
}

const HORIZON: u32 = 100;

/// Tuple `(xid=40, slot=2, INPLACE_UPDATED)`: xid precedes H, so MVCC sees
/// the current image unconditionally.
fn scenario_1() -> Result<String> {
    let oracle = InMemoryOracle::without_current();
    let reader = InMemoryUndoLog::new();
    let page = page_with(40, 0);
    let tuple = tuple_with(0, Infomask::empty().with(Infomask::INPLACE_UPDATED));
    let result = visibility::satisfies_mvcc(&tuple, &shared_snapshot(), &oracle, &reader, &page, Xid::from(HORIZON))?;
    Ok(format!("MVCC(xid=40 < horizon) -> {}", if result.is_some() { "current image" } else { "null" }))
}

/// Tuple `(xid=50, slot=2, INPLACE_UPDATED, cid=3)` with undo pointing to a
/// prior insert by xid=30: 50 is in-flight at S, so the walker should
/// surface the prior insert.
fn scenario_2() -> Result<String> {
    let oracle = InMemoryOracle::without_current();
    oracle.mark_active(Xid::from(50));
    oracle.mark_committed(Xid::from(30));
    let reader = InMemoryUndoLog::new();
    reader.insert(
        UndoPtr::from(7),
        UndoRecord {
            rec_type: UndoRecordType::Insert,
            prev_xid: Xid::from(30),
            prev_cid: Cid::INVALID,
            blkprev: UndoPtr::INVALID,
            trans_slot: TransactionSlot::Slot(0),
            infomask: Infomask::empty(),
        },
    );
    let mut page = page_with(50, 7);
    page.record_local_cid(Xid::from(50), TupleId::new(1, 1), Cid::from(3));
    let tuple = tuple_with(0, Infomask::empty().with(Infomask::INPLACE_UPDATED));
    // horizon=1 here, not the shared HORIZON: at 100 the 50<100 all-visible
    // shortcut would fire before the snapshot/commit logic ever runs.
    let result = visibility::satisfies_mvcc(&tuple, &shared_snapshot(), &oracle, &reader, &page, Xid::from(1))?;
    Ok(format!("MVCC(xid=50 in-flight) -> {}", if result.is_some() { "prior insert image" } else { "null" }))
}

fn scenario_3() -> Result<String> {
    let oracle = InMemoryOracle::new(Xid::from(99));
    oracle.mark_committed(Xid::from(50));
    let reader = InMemoryUndoLog::new();
    reader.insert(
        UndoPtr::from(9),
        UndoRecord {
            rec_type: UndoRecordType::Delete,
            prev_xid: Xid::from(50),
            prev_cid: Cid::INVALID,
            blkprev: UndoPtr::INVALID,
            trans_slot: TransactionSlot::Slot(0),
            infomask: Infomask::empty(),
        },
    );
    let mut page = page_with(99, 9);
    page.record_local_cid(Xid::from(99), TupleId::new(1, 1), Cid::from(7));
    let tuple = tuple_with(0, Infomask::empty().with(Infomask::DELETED));
    let snapshot = Snapshot::new(Xid::from(1), Xid::from(1000), vec![], Cid::from(5));
    let mvcc = visibility::satisfies_mvcc(&tuple, &snapshot, &oracle, &reader, &page, Xid::from(1))?;
    let (update, _) = visibility::satisfies_update(&tuple, Cid::from(5), &snapshot, false, &oracle, &reader, &page, Xid::from(1))?;
    Ok(format!(
        "current-xid delete, cid=7 >= curcid=5 -> MVCC={} Update={:?}",
        if mvcc.is_some() { "prior image" } else { "null" },
        update
    ))
}

fn scenario_4() -> Result<String> {
    let oracle = InMemoryOracle::new(Xid::from(99));
    let reader = InMemoryUndoLog::new();
    let mut page = page_with(99, 0);
    page.record_local_cid(Xid::from(99), TupleId::new(1, 1), Cid::from(3));
    let tuple = tuple_with(0, Infomask::empty().with(Infomask::DELETED));
    let snapshot = Snapshot::new(Xid::from(1), Xid::from(1000), vec![], Cid::from(5));
    let mvcc = visibility::satisfies_mvcc(&tuple, &snapshot, &oracle, &reader, &page, Xid::from(1))?;
    let (update, _) = visibility::satisfies_update(&tuple, Cid::from(5), &snapshot, false, &oracle, &reader, &page, Xid::from(1))?;
    Ok(format!(
        "current-xid delete, cid=3 < curcid=5 -> MVCC={} Update={:?}",
        if mvcc.is_some() { "prior image" } else { "null" },
        update
    ))
}

/// Slot-reuse chain: `R1{INVALID_XACT_SLOT, prev_xid=70} -> R2{INPLACE_UPDATE,
/// prev_xid=60} -> R3{INVALID_XACT_SLOT, prev_xid=60}`. Identity resolution
/// stops at R1 and reports the tuple's true owner as xid=70.
fn scenario_5() -> Result<String> {
    let oracle = InMemoryOracle::without_current();
    oracle.mark_committed(Xid::from(70));
    let reader = InMemoryUndoLog::new();
    reader.insert(
        UndoPtr::from(1),
        UndoRecord {
            rec_type: UndoRecordType::InvalidXactSlot,
            prev_xid: Xid::from(70),
            prev_cid: Cid::INVALID,
            blkprev: UndoPtr::from(2),
            trans_slot: TransactionSlot::Slot(0),
            infomask: Infomask::empty(),
        },
    );
    reader.insert(
        UndoPtr::from(2),
        UndoRecord {
            rec_type: UndoRecordType::InplaceUpdate,
            prev_xid: Xid::from(60),
            prev_cid: Cid::INVALID,
            blkprev: UndoPtr::from(3),
            trans_slot: TransactionSlot::Slot(0),
            infomask: Infomask::empty(),
        },
    );
    reader.insert(
        UndoPtr::from(3),
        UndoRecord {
            rec_type: UndoRecordType::InvalidXactSlot,
            prev_xid: Xid::from(60),
            prev_cid: Cid::INVALID,
            blkprev: UndoPtr::INVALID,
            trans_slot: TransactionSlot::Slot(0),
            infomask: Infomask::empty(),
        },
    );
    let page = page_with(999, 1);
    let tuple = tuple_with(0, Infomask::empty().with(Infomask::INVALID_XACT_SLOT).with(Infomask::INPLACE_UPDATED));
    let result = visibility::satisfies_mvcc(&tuple, &shared_snapshot(), &oracle, &reader, &page, Xid::from(1))?;
    Ok(format!("resolved owner xid=70 (committed) -> MVCC={}", if result.is_some() { "current image" } else { "null" }))
}

/// Tuple `(xid=80, slot=2, UPDATED)` with undo `UPDATE` payload `ctid=(5,9)`,
/// oracle says 80 committed.
fn scenario_6() -> Result<String> {
    let oracle = InMemoryOracle::without_current();
    oracle.mark_committed(Xid::from(80));
    let reader = InMemoryUndoLog::new();
    // the row lives at (1,1); its own undo record (ptr=9) carries the real
    // moved-to pointer (5,9) as its UPDATE payload.
    reader.insert(
        UndoPtr::from(9),
        UndoRecord {
            rec_type: UndoRecordType::Update { ctid: TupleId::new(5, 9) },
            prev_xid: Xid::from(50),
            prev_cid: Cid::INVALID,
            blkprev: UndoPtr::INVALID,
            trans_slot: TransactionSlot::Slot(0),
            infomask: Infomask::empty(),
        },
    );
    let page = page_with(80, 9);
    let tuple = Tuple::new(TupleId::new(1, 1), Infomask::empty().with(Infomask::UPDATED), TransactionSlot::Slot(0), bytes::Bytes::new());
    let (update, detail) = visibility::satisfies_update(&tuple, Cid::from(5), &shared_snapshot(), false, &oracle, &reader, &page, Xid::from(1))?;
    let mvcc = visibility::satisfies_mvcc(&tuple, &shared_snapshot(), &oracle, &reader, &page, Xid::from(1))?;
    Ok(format!(
        "committed move -> Update={:?} ctid={:?}, MVCC={}",
        update,
        detail.ctid,
        if mvcc.is_some() { "current image" } else { "null" }
    ))
}

fn main() -> Result<()> {
    util::init();

    let args = Args::parse();
    let mut app = App::new();

    app.run(args.command)?;

    info!("time costs {:?}", app.time_costs());
    Ok(())
}
