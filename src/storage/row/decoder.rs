use smallvec::SmallVec;

use crate::primitives::bytes::buf::ByteCursor;
use crate::storage::row::cell::{decode_cell, skip_cell};
use crate::storage::row::header::{RowHeader, RowStoreKind, ROW_HEADER_LEN};
use crate::storage::row::value::{ColumnType, Value};
use crate::types::{MicroBlockError, Result};

const INLINE_COLUMNS: usize = 16;

/// Decoding capability over a single encoded row.
///
/// A decoder is set up on one row at a time and keeps a cursor into it, so
/// key prefixes can be decoded column by column without touching the rest of
/// the row. `reset` returns the decoder to its idle state; every `setup`
/// implies a reset.
pub trait RowDecode<'a> {
    /// Points the decoder at `row`. `column_count` is the number of columns
    /// the block schema stores; rows written before a column was added decode
    /// the missing trailing columns as null.
    fn setup(&mut self, row: &'a [u8], column_count: usize) -> Result<RowHeader>;

    /// Header of the row the decoder is set up on.
    fn row_header(&self) -> Result<RowHeader>;

    /// Decodes column `idx` as `ty`.
    fn read_column(&mut self, ty: ColumnType, idx: usize) -> Result<Value<'a>>;

    /// Decodes the column following the last one returned by `read_next`.
    fn read_next(&mut self, ty: ColumnType) -> Result<Value<'a>>;

    /// Clears the cursor so the instance can be reused.
    fn reset(&mut self);

    /// Decodes the first `count` columns into `out`.
    fn read_key_prefix(
        &mut self,
        types: &[ColumnType],
        count: usize,
        out: &mut Vec<Value<'a>>,
    ) -> Result<()> {
        if count > types.len() {
            return Err(MicroBlockError::InvalidArgument(
                "key prefix longer than column types",
            ));
        }
        for ty in &types[..count] {
            out.push(self.read_next(*ty)?);
        }
        Ok(())
    }
}

/// Decoder for rows that store every column in schema order.
#[derive(Debug, Default)]
pub struct FlatRowDecoder<'a> {
    row: &'a [u8],
    header: Option<RowHeader>,
    column_count: usize,
    starts: SmallVec<[usize; INLINE_COLUMNS]>,
    next: usize,
}

impl<'a> FlatRowDecoder<'a> {
    /// Creates an idle decoder.
    pub fn new() -> Self {
        Self::default()
    }

    fn seek(&mut self, idx: usize) -> Result<()> {
        while self.starts.len() <= idx {
            let last = self.starts[self.starts.len() - 1];
            let mut cur = ByteCursor::at(self.row, last);
            skip_cell(&mut cur)?;
            self.starts.push(cur.offset());
        }
        Ok(())
    }
}

impl<'a> RowDecode<'a> for FlatRowDecoder<'a> {
    fn setup(&mut self, row: &'a [u8], column_count: usize) -> Result<RowHeader> {
        self.reset();
        let header = RowHeader::decode(row)?;
        if header.store_kind != RowStoreKind::Flat {
            return Err(MicroBlockError::Corruption("row store kind mismatch"));
        }
        self.row = row;
        self.header = Some(header);
        self.column_count = column_count;
        self.starts.push(ROW_HEADER_LEN);
        Ok(header)
    }

    fn row_header(&self) -> Result<RowHeader> {
        self.header.ok_or(MicroBlockError::NotInitialized)
    }

    fn read_column(&mut self, ty: ColumnType, idx: usize) -> Result<Value<'a>> {
        let header = self.row_header()?;
        if idx >= self.column_count {
            return Err(MicroBlockError::InvalidArgument(
                "column index beyond schema",
            ));
        }
        if idx >= header.column_count as usize {
            return Ok(Value::Null);
        }
        self.seek(idx)?;
        let mut cur = ByteCursor::at(self.row, self.starts[idx]);
        let value = decode_cell(&mut cur, ty)?;
        if self.starts.len() == idx + 1 {
            self.starts.push(cur.offset());
        }
        Ok(value)
    }

    fn read_next(&mut self, ty: ColumnType) -> Result<Value<'a>> {
        let value = self.read_column(ty, self.next)?;
        self.next += 1;
        Ok(value)
    }

    fn reset(&mut self) {
        self.row = &[];
        self.header = None;
        self.column_count = 0;
        self.starts.clear();
        self.next = 0;
    }
}

/// Decoder for rows that store only non-null columns as `(id, cell)` pairs.
///
/// Body layout: `present:u16` followed by `present` entries of
/// `column_id:u16 | cell`, ids strictly ascending. Entries are scanned lazily
/// and only as far as the highest column requested so far.
#[derive(Debug, Default)]
pub struct SparseRowDecoder<'a> {
    row: &'a [u8],
    header: Option<RowHeader>,
    column_count: usize,
    present: usize,
    entries: SmallVec<[(u16, usize); INLINE_COLUMNS]>,
    scan_off: usize,
    next: usize,
}

impl<'a> SparseRowDecoder<'a> {
    /// Creates an idle decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scans entries until column `id` is found or passed; returns its cell offset.
    fn find(&mut self, id: u16) -> Result<Option<usize>> {
        if let Ok(pos) = self.entries.binary_search_by_key(&id, |entry| entry.0) {
            return Ok(Some(self.entries[pos].1));
        }
        if matches!(self.entries.last(), Some(&(last, _)) if last > id) {
            return Ok(None);
        }
        while self.entries.len() < self.present {
            let mut cur = ByteCursor::at(self.row, self.scan_off);
            let entry_id = cur.read_u16_be()?;
            if matches!(self.entries.last(), Some(&(prev, _)) if entry_id <= prev) {
                return Err(MicroBlockError::Corruption(
                    "sparse column ids not ascending",
                ));
            }
            let cell_off = cur.offset();
            skip_cell(&mut cur)?;
            self.entries.push((entry_id, cell_off));
            self.scan_off = cur.offset();
            if entry_id == id {
                return Ok(Some(cell_off));
            }
            if entry_id > id {
                return Ok(None);
            }
        }
        Ok(None)
    }
}

impl<'a> RowDecode<'a> for SparseRowDecoder<'a> {
    fn setup(&mut self, row: &'a [u8], column_count: usize) -> Result<RowHeader> {
        self.reset();
        let header = RowHeader::decode(row)?;
        if header.store_kind != RowStoreKind::Sparse {
            return Err(MicroBlockError::Corruption("row store kind mismatch"));
        }
        let mut cur = ByteCursor::at(row, ROW_HEADER_LEN);
        let present = cur.read_u16_be()? as usize;
        if present > header.column_count as usize {
            return Err(MicroBlockError::Corruption(
                "sparse row stores more columns than declared",
            ));
        }
        self.row = row;
        self.header = Some(header);
        self.column_count = column_count;
        self.present = present;
        self.scan_off = cur.offset();
        Ok(header)
    }

    fn row_header(&self) -> Result<RowHeader> {
        self.header.ok_or(MicroBlockError::NotInitialized)
    }

    fn read_column(&mut self, ty: ColumnType, idx: usize) -> Result<Value<'a>> {
        let header = self.row_header()?;
        if idx >= self.column_count {
            return Err(MicroBlockError::InvalidArgument(
                "column index beyond schema",
            ));
        }
        if idx >= header.column_count as usize {
            return Ok(Value::Null);
        }
        let id = u16::try_from(idx)
            .map_err(|_| MicroBlockError::InvalidArgument("column index exceeds u16"))?;
        match self.find(id)? {
            Some(off) => decode_cell(&mut ByteCursor::at(self.row, off), ty),
            None => Ok(Value::Null),
        }
    }

    fn read_next(&mut self, ty: ColumnType) -> Result<Value<'a>> {
        let value = self.read_column(ty, self.next)?;
        self.next += 1;
        Ok(value)
    }

    fn reset(&mut self) {
        self.row = &[];
        self.header = None;
        self.column_count = 0;
        self.present = 0;
        self.entries.clear();
        self.scan_off = 0;
        self.next = 0;
    }
}

/// Row decoder selected once per block from its row store kind.
#[derive(Debug)]
pub enum RowDecoder<'a> {
    /// Flat rows.
    Flat(FlatRowDecoder<'a>),
    /// Sparse rows.
    Sparse(SparseRowDecoder<'a>),
}

impl<'a> RowDecoder<'a> {
    /// Creates the decoder variant for `kind`.
    pub fn new(kind: RowStoreKind) -> Self {
        match kind {
            RowStoreKind::Flat => Self::Flat(FlatRowDecoder::new()),
            RowStoreKind::Sparse => Self::Sparse(SparseRowDecoder::new()),
        }
    }

    /// Store kind this decoder handles.
    pub fn kind(&self) -> RowStoreKind {
        match self {
            Self::Flat(_) => RowStoreKind::Flat,
            Self::Sparse(_) => RowStoreKind::Sparse,
        }
    }
}

impl<'a> RowDecode<'a> for RowDecoder<'a> {
    fn setup(&mut self, row: &'a [u8], column_count: usize) -> Result<RowHeader> {
        match self {
            Self::Flat(d) => d.setup(row, column_count),
            Self::Sparse(d) => d.setup(row, column_count),
        }
    }

    fn row_header(&self) -> Result<RowHeader> {
        match self {
            Self::Flat(d) => d.row_header(),
            Self::Sparse(d) => d.row_header(),
        }
    }

    fn read_column(&mut self, ty: ColumnType, idx: usize) -> Result<Value<'a>> {
        match self {
            Self::Flat(d) => d.read_column(ty, idx),
            Self::Sparse(d) => d.read_column(ty, idx),
        }
    }

    fn read_next(&mut self, ty: ColumnType) -> Result<Value<'a>> {
        match self {
            Self::Flat(d) => d.read_next(ty),
            Self::Sparse(d) => d.read_next(ty),
        }
    }

    fn reset(&mut self) {
        match self {
            Self::Flat(d) => d.reset(),
            Self::Sparse(d) => d.reset(),
        }
    }
}
