//! Row readers over immutable micro blocks of sorted rows.
//!
//! Start with [`storage::MicroBlockReader`] for positional access and bound
//! searches, or [`storage::MicroBlockGetReader`] and
//! [`storage::MultiVersionGetReader`] for point lookups and lock checks.

#![warn(missing_docs)]

pub mod primitives;
pub mod storage;
pub mod types;

pub use types::{MicroBlockError, Result, TransId};
