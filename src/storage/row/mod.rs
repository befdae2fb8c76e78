//! Row layout: headers, cells, decoders, and materialised rows.

mod cell;
mod decoder;
mod header;
mod value;

pub use cell::encode_cell;
pub use decoder::{FlatRowDecoder, RowDecode, RowDecoder, SparseRowDecoder};
pub use header::{MultiVersionRowFlag, RowFlag, RowHeader, RowStoreKind, ROW_HEADER_LEN};
pub use value::{ColumnType, Rowkey, Value, INLINE_KEY_CELLS};

use crate::types::TransId;

/// Encodes a full row (header followed by its body) for `header.store_kind`.
///
/// Sparse rows omit null cells.
pub fn encode_row(header: &RowHeader, cells: &[Value<'_>]) -> Vec<u8> {
    debug_assert_eq!(header.column_count as usize, cells.len());
    let mut out = Vec::with_capacity(ROW_HEADER_LEN + cells.len() * 4);
    out.extend_from_slice(&header.encode());
    match header.store_kind {
        RowStoreKind::Flat => {
            for cell in cells {
                encode_cell(cell, &mut out);
            }
        }
        RowStoreKind::Sparse => {
            let present = cells.iter().filter(|cell| !cell.is_null()).count();
            out.extend_from_slice(&(present as u16).to_be_bytes());
            for (idx, cell) in cells.iter().enumerate() {
                if cell.is_null() {
                    continue;
                }
                out.extend_from_slice(&(idx as u16).to_be_bytes());
                encode_cell(cell, &mut out);
            }
        }
    }
    out
}

/// A row materialised from a block, borrowing its variable-length cells.
#[derive(Clone, Debug, PartialEq)]
pub struct StoreRow<'a> {
    /// Row action.
    pub row_flag: RowFlag,
    /// Multi-version flag set.
    pub mv_flag: MultiVersionRowFlag,
    /// Owning transaction recorded in the row header.
    pub trans_id: TransId,
    /// Output cells, one per requested column.
    pub cells: Vec<Value<'a>>,
    /// Set when the row is the first row of its micro block.
    pub micro_first: bool,
}

impl<'a> StoreRow<'a> {
    /// Builds a row from its header and projected cells.
    pub fn new(header: &RowHeader, cells: Vec<Value<'a>>) -> Self {
        Self {
            row_flag: header.row_flag,
            mv_flag: header.mv_flag,
            trans_id: header.trans_id,
            cells,
            micro_first: false,
        }
    }
}
