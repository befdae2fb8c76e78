//! Readers over one micro block.
//!
//! [`MicroBlockReader`] is bound to a single block and serves positional
//! access and bound searches. [`MicroBlockGetReader`] and
//! [`MultiVersionGetReader`] serve point lookups and are reusable across
//! blocks.

mod get;
mod locate;
mod lock;
mod options;
mod scan;
mod stats;

pub use get::{ExistState, MicroBlockGetReader, MultiVersionGetReader};
pub use options::ReaderOptions;
pub use scan::MicroBlockReader;
pub use stats::{ReaderStats, ReaderStatsSnapshot};

use crate::storage::column_map::ColumnMap;
use crate::storage::row::{RowDecode, RowDecoder, StoreRow, Value};
use crate::types::Result;

/// Decodes `row` and projects it through `column_map`.
pub(crate) fn project_row<'a>(
    decoder: &mut RowDecoder<'a>,
    row: &'a [u8],
    column_map: &ColumnMap,
) -> Result<StoreRow<'a>> {
    decoder.reset();
    let header = decoder.setup(row, column_map.store_count())?;
    let types = column_map.store_types();
    let cells = column_map
        .projections()
        .iter()
        .map(|projection| match projection {
            Some(idx) => decoder.read_column(types[*idx], *idx),
            None => Ok(Value::Null),
        })
        .collect::<Result<Vec<_>>>();
    decoder.reset();
    Ok(StoreRow::new(&header, cells?))
}
