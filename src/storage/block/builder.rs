use crate::storage::block::header::{
    BlockHeader, MICRO_BLOCK_FORMAT_VERSION, MICRO_BLOCK_HEADER_LEN, ROW_INDEX_ENTRY_LEN,
};
use crate::storage::row::{encode_row, RowHeader, RowStoreKind, Value};

/// Assembles a block from pre-sorted rows for tests and tooling.
///
/// Rows are appended in the order given; the builder does not sort or check
/// key order.
#[derive(Debug)]
pub struct BlockBuilder {
    kind: RowStoreKind,
    column_count: u16,
    multi_version: bool,
    data: Vec<u8>,
    offsets: Vec<i32>,
}

impl BlockBuilder {
    /// Starts a block whose rows use `kind` and store `column_count` columns.
    pub fn new(kind: RowStoreKind, column_count: u16) -> Self {
        Self {
            kind,
            column_count,
            multi_version: false,
            data: Vec::new(),
            offsets: vec![0],
        }
    }

    /// Marks the block as multi-version.
    pub fn multi_version(mut self, enabled: bool) -> Self {
        self.multi_version = enabled;
        self
    }

    /// Appends an already encoded row.
    pub fn push_raw(&mut self, row: &[u8]) -> &mut Self {
        self.data.extend_from_slice(row);
        self.offsets.push(self.data.len() as i32);
        self
    }

    /// Encodes and appends a row; the header's store kind and column count
    /// are taken from the builder and the cell slice.
    pub fn push(&mut self, header: RowHeader, cells: &[Value<'_>]) -> &mut Self {
        let mut header = header;
        header.store_kind = self.kind;
        header.column_count = cells.len() as u16;
        let row = encode_row(&header, cells);
        self.push_raw(&row)
    }

    /// Number of rows appended so far.
    pub fn row_count(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Writes header, row data, and index into one buffer.
    pub fn finish(self) -> Vec<u8> {
        let header_size = MICRO_BLOCK_HEADER_LEN;
        let row_index_offset = header_size + self.data.len();
        let header = BlockHeader {
            version: MICRO_BLOCK_FORMAT_VERSION,
            header_size: header_size as u16,
            column_count: self.column_count,
            row_store: self.kind,
            multi_version: self.multi_version,
            row_count: self.row_count() as u32,
            row_index_offset: row_index_offset as u32,
        };
        let mut out =
            Vec::with_capacity(row_index_offset + self.offsets.len() * ROW_INDEX_ENTRY_LEN);
        out.extend_from_slice(&header.encode());
        out.extend_from_slice(&self.data);
        for offset in &self.offsets {
            out.extend_from_slice(&offset.to_be_bytes());
        }
        out
    }
}
