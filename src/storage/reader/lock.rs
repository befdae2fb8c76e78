use tracing::{debug, trace};

use crate::storage::block::BlockView;
use crate::storage::mvcc::{decode_multi_version_info, LockState, MultiVersionLayout, TransStateAuthority};
use crate::storage::reader::ReaderStats;
use crate::storage::row::{RowDecoder, Rowkey};
use crate::types::{MicroBlockError, Result, TransId};

/// Resolves the lock state of the row at `row_idx`, the newest version of
/// `rowkey`.
///
/// Committed rows report their commit version without consulting the
/// authority; magic rows report the default state.
#[allow(clippy::too_many_arguments)]
pub(crate) fn resolve_lock_state<'a>(
    block: &BlockView<'a>,
    decoder: &mut RowDecoder<'a>,
    row_idx: usize,
    rowkey: &Rowkey<'_>,
    reading_trans: TransId,
    layout: MultiVersionLayout,
    authority: &dyn TransStateAuthority,
    stats: Option<&ReaderStats>,
) -> Result<LockState> {
    if !rowkey.is_valid() {
        return Err(MicroBlockError::InvalidArgument("invalid rowkey"));
    }
    let column_count = block.header().column_count as usize;
    let version_col = layout.trans_version_col_idx(rowkey.len());
    let sql_sequence_col = layout.sql_sequence_col_idx(rowkey.len());
    if version_col >= column_count || sql_sequence_col.is_some_and(|idx| idx >= column_count) {
        return Err(MicroBlockError::InvalidArgument(
            "multi-version columns exceed block column count",
        ));
    }
    let row = block.row(row_idx)?;
    let info = decode_multi_version_info(decoder, row, column_count, version_col, sql_sequence_col)?;
    if info.flag.is_magic_row() {
        trace!(target: "sombra_microblock::lock", row_idx, "lock.magic_row");
        return Ok(LockState::default());
    }
    let mut lock_state = LockState {
        trans_version: info.trans_version,
        ..LockState::default()
    };
    if !info.flag.is_uncommitted() {
        trace!(
            target: "sombra_microblock::lock",
            row_idx,
            trans_version = info.trans_version,
            "lock.committed"
        );
        return Ok(lock_state);
    }
    if let Some(stats) = stats {
        stats.inc_authority_calls();
    }
    debug!(
        target: "sombra_microblock::lock",
        row_idx,
        reading_trans = %reading_trans,
        owning_trans = %info.trans_id,
        sql_sequence = info.sql_sequence,
        "lock.delegate"
    );
    authority.check_row_locked(
        rowkey,
        reading_trans,
        info.trans_id,
        info.sql_sequence,
        &mut lock_state,
    )?;
    Ok(lock_state)
}
