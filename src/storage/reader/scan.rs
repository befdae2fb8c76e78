use tracing::{debug, trace, warn};

use crate::storage::block::BlockView;
use crate::storage::column_map::ColumnMap;
use crate::storage::compare::{KeyComparator, KeyPrefixComparator};
use crate::storage::mvcc::{decode_multi_version_info, MultiVersionInfo};
use crate::storage::reader::locate::RowProbe;
use crate::storage::reader::{project_row, ReaderOptions};
use crate::storage::row::{RowDecoder, RowHeader, Rowkey, StoreRow};
use crate::types::{MicroBlockError, Result};

struct ScanState<'a> {
    block: BlockView<'a>,
    column_map: &'a ColumnMap,
    decoder: RowDecoder<'a>,
}

/// Positional reader bound to one block at a time.
///
/// `init` attaches a block and a column map; `reset` detaches them so the
/// instance can be initialised again.
pub struct MicroBlockReader<'a> {
    options: ReaderOptions,
    state: Option<ScanState<'a>>,
}

impl<'a> MicroBlockReader<'a> {
    /// Creates an uninitialised reader.
    pub fn new(options: ReaderOptions) -> Self {
        Self {
            options,
            state: None,
        }
    }

    /// Attaches `block`, projected through `column_map`.
    pub fn init(&mut self, block: &'a [u8], column_map: &'a ColumnMap) -> Result<()> {
        if self.state.is_some() {
            return Err(MicroBlockError::AlreadyInitialized);
        }
        if !column_map.is_valid() {
            return Err(MicroBlockError::InvalidArgument("invalid column map"));
        }
        let view = BlockView::parse(block, self.options.verify_row_index).inspect_err(|err| {
            warn!(target: "sombra_microblock::scan", error = %err, "reader.init_failed");
        })?;
        let header = view.header();
        if let Some(expected) = self.options.expected_row_store {
            if header.row_store != expected {
                return Err(MicroBlockError::InvalidArgument(
                    "block row store does not match reader",
                ));
            }
        }
        debug!(
            target: "sombra_microblock::scan",
            row_count = header.row_count,
            column_count = header.column_count,
            row_store = ?header.row_store,
            multi_version = header.multi_version,
            "reader.init"
        );
        self.state = Some(ScanState {
            decoder: RowDecoder::new(header.row_store),
            block: view,
            column_map,
        });
        Ok(())
    }

    /// Detaches the current block.
    pub fn reset(&mut self) {
        self.state = None;
    }

    /// Returns `true` while a block is attached.
    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// First row position.
    pub fn begin(&self) -> Result<usize> {
        self.state()?;
        Ok(0)
    }

    /// One past the last row position.
    pub fn end(&self) -> Result<usize> {
        self.row_count()
    }

    /// Number of rows in the attached block.
    pub fn row_count(&self) -> Result<usize> {
        Ok(self.state()?.block.row_count())
    }

    /// Materialises the row at `index`.
    pub fn get_row(&mut self, index: usize) -> Result<StoreRow<'a>> {
        let state = self.state_mut()?;
        let mut row = read_row(state, index)?;
        if index == 0 {
            row.micro_first = true;
        }
        if let Some(stats) = self.options.stats_ref() {
            stats.add_rows_materialized(1);
        }
        Ok(row)
    }

    /// Materialises up to `capacity` rows from `begin` toward `end`
    /// (exclusive) into `out`, returning how many were written.
    ///
    /// `begin > end` walks backwards, in which case `end` may be `-1`. Only
    /// the first written row may carry `micro_first`, and only when `begin`
    /// is the first row of the block. On error `out` is left as it was.
    pub fn get_rows(
        &mut self,
        begin: i64,
        end: i64,
        capacity: usize,
        out: &mut Vec<StoreRow<'a>>,
    ) -> Result<usize> {
        let state = self.state_mut()?;
        let row_count = state.block.row_count() as i64;
        let forward_ok = begin < end && begin >= 0 && end <= row_count;
        let backward_ok = begin > end && end >= -1 && begin < row_count;
        if !(forward_ok || backward_ok) || capacity == 0 {
            return Err(MicroBlockError::InvalidArgument("invalid row range"));
        }
        let step = if begin < end { 1 } else { -1 };
        let first = out.len();
        let mut index = begin;
        while index != end && out.len() - first < capacity {
            let row = match read_row(state, index as usize) {
                Ok(row) => row,
                Err(err) => {
                    warn!(target: "sombra_microblock::scan", index, error = %err, "get_rows.failed");
                    out.truncate(first);
                    return Err(err);
                }
            };
            out.push(row);
            index += step;
        }
        let written = out.len() - first;
        if let Some(head) = out.get_mut(first) {
            head.micro_first = begin == 0;
        }
        if let Some(stats) = self.options.stats_ref() {
            stats.add_rows_materialized(written as u64);
        }
        trace!(target: "sombra_microblock::scan", begin, end, written, "get_rows.done");
        Ok(written)
    }

    /// First position in `[begin, end)` whose row is `>= key` when
    /// `lower_bound`, `> key` otherwise, paired with whether an equal row was
    /// probed.
    pub fn find_bound(
        &mut self,
        key: &Rowkey<'_>,
        lower_bound: bool,
        begin: usize,
        end: usize,
    ) -> Result<(usize, bool)> {
        let state = self
            .state
            .as_mut()
            .ok_or(MicroBlockError::NotInitialized)?;
        let comparator = self
            .options
            .comparator
            .as_deref()
            .map(|cmp| cmp as &dyn KeyComparator);
        let stats = self.options.stats_ref();
        let types = state.column_map.store_types();
        let prefix = KeyPrefixComparator::new(types, comparator, stats);
        let mut probe = RowProbe::new(&state.block, &mut state.decoder, prefix, types.len(), stats);
        probe.bound(key, lower_bound, begin, end)
    }

    /// Header of the row at `row_idx`; the row body is not decoded.
    pub fn row_header(&self, row_idx: usize) -> Result<RowHeader> {
        let row = self.state()?.block.row(row_idx)?;
        RowHeader::decode(row)
    }

    /// Version metadata of the row at `row_idx`, reading the negated
    /// version from `version_col_idx` and, for uncommitted rows, the negated
    /// sql sequence from `sql_sequence_col_idx`.
    pub fn multi_version_info(
        &mut self,
        row_idx: usize,
        version_col_idx: usize,
        sql_sequence_col_idx: Option<usize>,
    ) -> Result<MultiVersionInfo> {
        let state = self.state_mut()?;
        let store_count = state.column_map.store_count();
        if version_col_idx >= store_count
            || sql_sequence_col_idx.is_some_and(|idx| idx >= store_count)
        {
            return Err(MicroBlockError::InvalidArgument(
                "multi-version column out of range",
            ));
        }
        let row = state.block.row(row_idx)?;
        decode_multi_version_info(
            &mut state.decoder,
            row,
            store_count,
            version_col_idx,
            sql_sequence_col_idx,
        )
    }

    /// Options this reader was built with.
    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    fn state(&self) -> Result<&ScanState<'a>> {
        self.state.as_ref().ok_or(MicroBlockError::NotInitialized)
    }

    fn state_mut(&mut self) -> Result<&mut ScanState<'a>> {
        self.state.as_mut().ok_or(MicroBlockError::NotInitialized)
    }
}

impl Default for MicroBlockReader<'_> {
    fn default() -> Self {
        Self::new(ReaderOptions::default())
    }
}

fn read_row<'a>(state: &mut ScanState<'a>, index: usize) -> Result<StoreRow<'a>> {
    let row = state.block.row(index)?;
    project_row(&mut state.decoder, row, state.column_map)
}
