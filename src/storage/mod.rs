//! Micro block reading.
//!
//! A micro block is the smallest unit of sorted row storage: a fixed header,
//! encoded rows in key order, and an offset index over them. This module
//! parses blocks, decodes rows, and answers point lookups, positional reads,
//! bound searches, and MVCC lock checks against them.

/// Block header, row index, and block assembly.
pub mod block;

/// Row headers, cells, values, and row decoders.
pub mod row;

/// Key comparison and collations.
pub mod compare;

/// Column projection from stored to requested columns.
pub mod column_map;

/// Multi-version metadata and the transaction-state authority seam.
pub mod mvcc;

/// Scan and point-lookup readers.
pub mod reader;

pub use block::{BlockBuilder, BlockHeader, BlockView};
pub use column_map::ColumnMap;
pub use compare::{Collation, CollationComparator, DefaultKeyComparator, KeyComparator};
pub use mvcc::{
    LockState, MultiVersionInfo, MultiVersionLayout, TransStateAuthority,
    UNCOMMITTED_TRANS_VERSION,
};
pub use reader::{
    ExistState, MicroBlockGetReader, MicroBlockReader, MultiVersionGetReader, ReaderOptions,
    ReaderStats, ReaderStatsSnapshot,
};
pub use row::{
    ColumnType, MultiVersionRowFlag, RowDecode, RowDecoder, RowFlag, RowHeader, RowStoreKind,
    Rowkey, StoreRow, Value,
};
