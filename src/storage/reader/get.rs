use serde::Serialize;
use tracing::{trace, warn};

use crate::storage::block::BlockView;
use crate::storage::column_map::ColumnMap;
use crate::storage::compare::{KeyComparator, KeyPrefixComparator};
use crate::storage::mvcc::{LockState, TransStateAuthority};
use crate::storage::reader::locate::{LocateMode, Located, RowProbe};
use crate::storage::reader::lock::resolve_lock_state;
use crate::storage::reader::{project_row, ReaderOptions};
use crate::storage::row::{
    ColumnType, RowDecode, RowDecoder, RowHeader, Rowkey, StoreRow, Value,
};
use crate::types::{MicroBlockError, Result, TransId};

/// Outcome of an existence probe.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ExistState {
    /// The key is present and its row is not a deletion marker.
    pub exists: bool,
    /// The key is present at all.
    pub found: bool,
}

/// Per-operation state. Cleared at the start of every top-level call.
#[derive(Debug, Default)]
struct GetState {
    row_idx: Option<usize>,
}

impl GetState {
    fn begin_operation(&mut self) {
        self.row_idx = None;
    }
}

/// Shared machinery of the two point-lookup readers.
#[derive(Debug)]
struct GetCore {
    mode: LocateMode,
    options: ReaderOptions,
    state: GetState,
}

impl GetCore {
    fn new(mode: LocateMode, options: ReaderOptions) -> Self {
        Self {
            mode,
            options,
            state: GetState::default(),
        }
    }

    fn open<'a>(&mut self, block: &'a [u8]) -> Result<BlockView<'a>> {
        self.state.begin_operation();
        let view = BlockView::parse(block, self.options.verify_row_index)?;
        if let Some(expected) = self.options.expected_row_store {
            if view.header().row_store != expected {
                return Err(MicroBlockError::InvalidArgument(
                    "block row store does not match reader",
                ));
            }
        }
        Ok(view)
    }

    fn locate<'a>(
        &mut self,
        view: &BlockView<'a>,
        decoder: &mut RowDecoder<'a>,
        rowkey: &Rowkey<'_>,
        types: &[ColumnType],
        comparator: Option<&dyn KeyComparator>,
    ) -> Result<Located<'a>> {
        let stats = self.options.stats_ref();
        let prefix = KeyPrefixComparator::new(types, comparator, stats);
        let mut probe = RowProbe::new(view, decoder, prefix, types.len(), stats);
        let located = probe.locate(rowkey, self.mode).inspect_err(|err| {
            if !err.is_not_found() {
                warn!(target: "sombra_microblock::get", error = %err, "locate.failed");
            }
        })?;
        self.state.row_idx = Some(located.row_idx);
        Ok(located)
    }

    fn get_row<'a>(
        &mut self,
        block: &'a [u8],
        rowkey: &Rowkey<'_>,
        column_map: &ColumnMap,
        comparator: Option<&dyn KeyComparator>,
    ) -> Result<StoreRow<'a>> {
        if !column_map.is_valid() {
            return Err(MicroBlockError::InvalidArgument("invalid column map"));
        }
        let view = self.open(block)?;
        let mut decoder = RowDecoder::new(view.header().row_store);
        let located = self.locate(
            &view,
            &mut decoder,
            rowkey,
            column_map.store_types(),
            comparator,
        )?;
        let row = project_row(&mut decoder, located.row, column_map)?;
        if let Some(stats) = self.options.stats_ref() {
            stats.add_rows_materialized(1);
        }
        Ok(row)
    }

    fn get_full_row<'a>(
        &mut self,
        block: &'a [u8],
        rowkey: &Rowkey<'_>,
        types: &[ColumnType],
        comparator: Option<&dyn KeyComparator>,
    ) -> Result<StoreRow<'a>> {
        let view = self.open(block)?;
        let mut decoder = RowDecoder::new(view.header().row_store);
        let located = self.locate(&view, &mut decoder, rowkey, types, comparator)?;
        let header = decoder.setup(located.row, types.len())?;
        let cells = types
            .iter()
            .map(|ty| decoder.read_next(*ty))
            .collect::<Result<Vec<Value<'a>>>>();
        decoder.reset();
        if let Some(stats) = self.options.stats_ref() {
            stats.add_rows_materialized(1);
        }
        Ok(StoreRow::new(&header, cells?))
    }

    fn exists_row(
        &mut self,
        block: &[u8],
        rowkey: &Rowkey<'_>,
        types: &[ColumnType],
        comparator: Option<&dyn KeyComparator>,
    ) -> Result<ExistState> {
        let view = self.open(block)?;
        let mut decoder = RowDecoder::new(view.header().row_store);
        match self.locate(&view, &mut decoder, rowkey, types, comparator) {
            Ok(located) => {
                let header = RowHeader::decode(located.row)?;
                Ok(ExistState {
                    exists: !header.row_flag.is_delete(),
                    found: true,
                })
            }
            Err(err) if err.is_not_found() => Ok(ExistState::default()),
            Err(err) => Err(err),
        }
    }

    fn locate_row_index(
        &mut self,
        block: &[u8],
        rowkey: &Rowkey<'_>,
        types: &[ColumnType],
        comparator: Option<&dyn KeyComparator>,
    ) -> Result<usize> {
        let view = self.open(block)?;
        let mut decoder = RowDecoder::new(view.header().row_store);
        self.locate(&view, &mut decoder, rowkey, types, comparator)
            .map(|located| located.row_idx)
    }
}

/// Point-lookup reader for blocks whose keys are unique.
///
/// The reader holds no block; every call parses the block it is given, so
/// one instance serves any number of blocks.
#[derive(Debug)]
pub struct MicroBlockGetReader {
    core: GetCore,
}

impl MicroBlockGetReader {
    /// Creates a reader with `options`.
    pub fn new(options: ReaderOptions) -> Self {
        Self {
            core: GetCore::new(LocateMode::Exact, options),
        }
    }

    /// Finds `rowkey` and projects its row through `column_map`.
    pub fn get_row<'a>(
        &mut self,
        block: &'a [u8],
        rowkey: &Rowkey<'_>,
        column_map: &ColumnMap,
        comparator: Option<&dyn KeyComparator>,
    ) -> Result<StoreRow<'a>> {
        self.core.get_row(block, rowkey, column_map, comparator)
    }

    /// Finds `rowkey` and decodes every stored column.
    pub fn get_full_row<'a>(
        &mut self,
        block: &'a [u8],
        rowkey: &Rowkey<'_>,
        types: &[ColumnType],
        comparator: Option<&dyn KeyComparator>,
    ) -> Result<StoreRow<'a>> {
        self.core.get_full_row(block, rowkey, types, comparator)
    }

    /// Reports whether `rowkey` is present and live.
    pub fn exists_row(
        &mut self,
        block: &[u8],
        rowkey: &Rowkey<'_>,
        types: &[ColumnType],
        comparator: Option<&dyn KeyComparator>,
    ) -> Result<ExistState> {
        self.core.exists_row(block, rowkey, types, comparator)
    }

    /// Position of `rowkey` in `block`.
    pub fn locate_row_index(
        &mut self,
        block: &[u8],
        rowkey: &Rowkey<'_>,
        types: &[ColumnType],
        comparator: Option<&dyn KeyComparator>,
    ) -> Result<usize> {
        self.core.locate_row_index(block, rowkey, types, comparator)
    }

    /// Lock checks need version metadata, which single-version blocks lack.
    pub fn check_row_locked(
        &mut self,
        _authority: &dyn TransStateAuthority,
        _reading_trans: TransId,
        _block: &[u8],
        _rowkey: &Rowkey<'_>,
        _types: &[ColumnType],
        _comparator: Option<&dyn KeyComparator>,
    ) -> Result<LockState> {
        self.core.state.begin_operation();
        Err(MicroBlockError::Unsupported(
            "lock check requires a multi-version block",
        ))
    }

    /// Position matched by the most recent successful lookup.
    pub fn last_row_index(&self) -> Option<usize> {
        self.core.state.row_idx
    }
}

impl Default for MicroBlockGetReader {
    fn default() -> Self {
        Self::new(ReaderOptions::default())
    }
}

/// Point-lookup reader for multi-version blocks.
///
/// Rows of one key are stored newest version first; lookups land on the
/// newest version and treat a lone magic row as absent.
#[derive(Debug)]
pub struct MultiVersionGetReader {
    core: GetCore,
}

impl MultiVersionGetReader {
    /// Creates a reader with `options`.
    pub fn new(options: ReaderOptions) -> Self {
        Self {
            core: GetCore::new(LocateMode::FirstVersion, options),
        }
    }

    /// Finds the newest version of `rowkey` and projects it through
    /// `column_map`.
    pub fn get_row<'a>(
        &mut self,
        block: &'a [u8],
        rowkey: &Rowkey<'_>,
        column_map: &ColumnMap,
        comparator: Option<&dyn KeyComparator>,
    ) -> Result<StoreRow<'a>> {
        self.core.get_row(block, rowkey, column_map, comparator)
    }

    /// Finds the newest version of `rowkey` and decodes every stored column.
    pub fn get_full_row<'a>(
        &mut self,
        block: &'a [u8],
        rowkey: &Rowkey<'_>,
        types: &[ColumnType],
        comparator: Option<&dyn KeyComparator>,
    ) -> Result<StoreRow<'a>> {
        self.core.get_full_row(block, rowkey, types, comparator)
    }

    /// Reports whether the newest version of `rowkey` is present and live.
    pub fn exists_row(
        &mut self,
        block: &[u8],
        rowkey: &Rowkey<'_>,
        types: &[ColumnType],
        comparator: Option<&dyn KeyComparator>,
    ) -> Result<ExistState> {
        self.core.exists_row(block, rowkey, types, comparator)
    }

    /// Position of the newest version of `rowkey`.
    pub fn locate_row_index(
        &mut self,
        block: &[u8],
        rowkey: &Rowkey<'_>,
        types: &[ColumnType],
        comparator: Option<&dyn KeyComparator>,
    ) -> Result<usize> {
        self.core.locate_row_index(block, rowkey, types, comparator)
    }

    /// Lock state of `rowkey` as seen by `reading_trans`.
    ///
    /// A key absent from the block reports `trans_version == 0`. Uncommitted
    /// rows are delegated to `authority`.
    pub fn check_row_locked(
        &mut self,
        authority: &dyn TransStateAuthority,
        reading_trans: TransId,
        block: &[u8],
        rowkey: &Rowkey<'_>,
        types: &[ColumnType],
        comparator: Option<&dyn KeyComparator>,
    ) -> Result<LockState> {
        let view = self.open_multi_version(block)?;
        let mut decoder = RowDecoder::new(view.header().row_store);
        let located = match self
            .core
            .locate(&view, &mut decoder, rowkey, types, comparator)
        {
            Ok(located) => located,
            Err(err) if err.is_not_found() => {
                trace!(target: "sombra_microblock::lock", key = %rowkey, "lock.absent");
                return Ok(LockState::default());
            }
            Err(err) => return Err(err),
        };
        resolve_lock_state(
            &view,
            &mut decoder,
            located.row_idx,
            rowkey,
            reading_trans,
            self.core.options.multi_version_layout,
            authority,
            self.core.options.stats_ref(),
        )
    }

    /// Lock state of the row at a position already found by
    /// [`Self::locate_row_index`].
    pub fn check_row_locked_at(
        &mut self,
        authority: &dyn TransStateAuthority,
        reading_trans: TransId,
        block: &[u8],
        row_idx: usize,
        rowkey: &Rowkey<'_>,
    ) -> Result<LockState> {
        let view = self.open_multi_version(block)?;
        let mut decoder = RowDecoder::new(view.header().row_store);
        self.core.state.row_idx = Some(row_idx);
        resolve_lock_state(
            &view,
            &mut decoder,
            row_idx,
            rowkey,
            reading_trans,
            self.core.options.multi_version_layout,
            authority,
            self.core.options.stats_ref(),
        )
    }

    /// Position matched by the most recent successful lookup.
    pub fn last_row_index(&self) -> Option<usize> {
        self.core.state.row_idx
    }

    fn open_multi_version<'a>(&mut self, block: &'a [u8]) -> Result<BlockView<'a>> {
        let view = self.core.open(block)?;
        if !view.header().multi_version {
            return Err(MicroBlockError::Unsupported(
                "lock check requires a multi-version block",
            ));
        }
        if let Some(stats) = self.core.options.stats_ref() {
            stats.inc_lock_checks();
        }
        Ok(view)
    }
}

impl Default for MultiVersionGetReader {
    fn default() -> Self {
        Self::new(ReaderOptions::default())
    }
}
