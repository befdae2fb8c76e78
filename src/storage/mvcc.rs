use serde::Serialize;

use crate::storage::row::{ColumnType, MultiVersionRowFlag, RowDecode, Rowkey, Value};
use crate::types::{MicroBlockError, Result, TransId};

/// Version reported for a row whose transaction has not committed.
pub const UNCOMMITTED_TRANS_VERSION: i64 = i64::MAX;

/// Layout of the reserved multi-version columns that follow the rowkey.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub enum MultiVersionLayout {
    /// Only the negated transaction version is stored.
    Legacy,
    /// Negated transaction version followed by the negated sql sequence.
    #[default]
    V3,
}

impl MultiVersionLayout {
    /// Number of reserved columns appended to the rowkey.
    pub fn extra_rowkey_count(self) -> usize {
        match self {
            Self::Legacy => 1,
            Self::V3 => 2,
        }
    }

    /// Store index of the transaction version column.
    pub fn trans_version_col_idx(self, rowkey_count: usize) -> usize {
        rowkey_count
    }

    /// Store index of the sql sequence column, if the layout has one.
    pub fn sql_sequence_col_idx(self, rowkey_count: usize) -> Option<usize> {
        match self {
            Self::Legacy => None,
            Self::V3 => Some(rowkey_count + 1),
        }
    }
}

/// Version metadata decoded from one row.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct MultiVersionInfo {
    /// Multi-version flag set of the row.
    pub flag: MultiVersionRowFlag,
    /// Owning transaction recorded in the row header.
    pub trans_id: TransId,
    /// Commit version, or [`UNCOMMITTED_TRANS_VERSION`].
    pub trans_version: i64,
    /// Statement sequence of an uncommitted write, zero otherwise.
    pub sql_sequence: i64,
}

/// Outcome of a lock check.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct LockState {
    /// `0` when no conflicting row exists, the commit version of a committed
    /// row, or [`UNCOMMITTED_TRANS_VERSION`] unless the authority refines it.
    pub trans_version: i64,
    /// Set by the authority when another transaction holds the row.
    pub is_locked: bool,
    /// Transaction holding the lock, when `is_locked`.
    pub lock_trans_id: TransId,
}

/// Transaction-state authority consulted for uncommitted rows.
///
/// Implementations may block; errors are propagated to the caller unchanged.
pub trait TransStateAuthority {
    /// Decides visibility of a row written by `owning_trans` at
    /// `sql_sequence` for `reading_trans`, updating `lock_state` in place.
    fn check_row_locked(
        &self,
        rowkey: &Rowkey<'_>,
        reading_trans: TransId,
        owning_trans: TransId,
        sql_sequence: i64,
        lock_state: &mut LockState,
    ) -> Result<()>;
}

/// Restores a column stored negated so that ascending order is descending
/// version order.
pub(crate) fn restore_negated(cell: Value<'_>) -> Result<i64> {
    let raw = cell
        .as_int()
        .ok_or(MicroBlockError::Corruption("multi-version column is not an integer"))?;
    raw.checked_neg()
        .ok_or(MicroBlockError::Corruption("multi-version column overflows on negation"))
}

/// Decodes the row header and reserved columns of `row`. Magic rows report
/// a zero version and sequence without reading the reserved columns.
///
/// The decoder is reset before and after, regardless of outcome.
pub(crate) fn decode_multi_version_info<'a, D: RowDecode<'a>>(
    decoder: &mut D,
    row: &'a [u8],
    column_count: usize,
    version_col_idx: usize,
    sql_sequence_col_idx: Option<usize>,
) -> Result<MultiVersionInfo> {
    decoder.reset();
    let result = read_multi_version_info(
        decoder,
        row,
        column_count,
        version_col_idx,
        sql_sequence_col_idx,
    );
    decoder.reset();
    result
}

fn read_multi_version_info<'a, D: RowDecode<'a>>(
    decoder: &mut D,
    row: &'a [u8],
    column_count: usize,
    version_col_idx: usize,
    sql_sequence_col_idx: Option<usize>,
) -> Result<MultiVersionInfo> {
    let header = decoder.setup(row, column_count)?;
    let flag = header.mv_flag;
    let (trans_version, sql_sequence) = if flag.is_magic_row() {
        // Boundary marker; its reserved columns carry no version.
        (0, 0)
    } else if !flag.is_uncommitted() {
        let version = decoder.read_column(ColumnType::Int, version_col_idx)?;
        (restore_negated(version)?, 0)
    } else {
        let sql_sequence = match sql_sequence_col_idx {
            // Blocks written before the sql sequence column existed.
            None => 0,
            Some(idx) => restore_negated(decoder.read_column(ColumnType::Int, idx)?)?,
        };
        (UNCOMMITTED_TRANS_VERSION, sql_sequence)
    };
    Ok(MultiVersionInfo {
        flag,
        trans_id: header.trans_id,
        trans_version,
        sql_sequence,
    })
}
