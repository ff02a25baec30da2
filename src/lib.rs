#![allow(clippy::upper_case_acronyms)]

//! Tuple visibility core for a multi-version storage engine that keeps row
//! versions in an undo log rather than in-place dead-tuple chains.
//!
//! The reusable surface is [`engine::visibility`]; [`fixture`] and the
//! `main.rs` CLI harness exist only to exercise it standalone, since the
//! real transaction manager, undo log, and buffer pool this crate is meant
//! to sit inside all live outside it.

pub mod engine;
pub mod fixture;
pub mod util;
