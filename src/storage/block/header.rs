use serde::Serialize;

use crate::storage::row::RowStoreKind;
use crate::types::{MicroBlockError, Result};

/// Magic bytes at the start of every micro block.
pub const MICRO_BLOCK_MAGIC: [u8; 4] = *b"MBLK";
/// Current block format version.
pub const MICRO_BLOCK_FORMAT_VERSION: u16 = 1;
/// Minimum encoded header length in bytes.
pub const MICRO_BLOCK_HEADER_LEN: usize = 24;
/// Size of one row index entry.
pub const ROW_INDEX_ENTRY_LEN: usize = 4;

const MAGIC_OFFSET: usize = 0;
const VERSION_OFFSET: usize = 4;
const HEADER_SIZE_OFFSET: usize = 6;
const COLUMN_COUNT_OFFSET: usize = 8;
const ROW_STORE_OFFSET: usize = 10;
const ATTR_OFFSET: usize = 11;
const ROW_COUNT_OFFSET: usize = 12;
const ROW_INDEX_OFFSET_OFFSET: usize = 16;

const ATTR_MULTI_VERSION: u8 = 0x01;

/// Fixed header at the start of a micro block.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct BlockHeader {
    /// Format version.
    pub version: u16,
    /// Bytes before the row data begins.
    pub header_size: u16,
    /// Number of stored columns per row.
    pub column_count: u16,
    /// Row layout used by every row in the block.
    pub row_store: RowStoreKind,
    /// Whether rows carry trailing multi-version key columns.
    pub multi_version: bool,
    /// Number of physical rows.
    pub row_count: u32,
    /// Byte offset of the row index from the start of the block.
    pub row_index_offset: u32,
}

impl BlockHeader {
    /// Decodes and validates the header against the buffer it was read from.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.is_empty() {
            return Err(MicroBlockError::InvalidArgument("empty micro block buffer"));
        }
        if buf.len() < MICRO_BLOCK_HEADER_LEN {
            return Err(MicroBlockError::InvalidArgument(
                "micro block shorter than header",
            ));
        }
        if buf[MAGIC_OFFSET..MAGIC_OFFSET + 4] != MICRO_BLOCK_MAGIC {
            return Err(MicroBlockError::InvalidArgument("micro block magic mismatch"));
        }
        let version = read_u16(buf, VERSION_OFFSET);
        if version != MICRO_BLOCK_FORMAT_VERSION {
            return Err(MicroBlockError::InvalidArgument(
                "unsupported micro block version",
            ));
        }
        let header_size = read_u16(buf, HEADER_SIZE_OFFSET);
        let column_count = read_u16(buf, COLUMN_COUNT_OFFSET);
        let row_store = RowStoreKind::from_u8(buf[ROW_STORE_OFFSET])
            .map_err(|_| MicroBlockError::InvalidArgument("unknown row store kind"))?;
        let multi_version = buf[ATTR_OFFSET] & ATTR_MULTI_VERSION != 0;
        let row_count = read_u32(buf, ROW_COUNT_OFFSET);
        let row_index_offset = read_u32(buf, ROW_INDEX_OFFSET_OFFSET);

        if (header_size as usize) < MICRO_BLOCK_HEADER_LEN {
            return Err(MicroBlockError::InvalidArgument(
                "micro block header_size smaller than header",
            ));
        }
        if column_count == 0 {
            return Err(MicroBlockError::InvalidArgument(
                "micro block without columns",
            ));
        }
        let index_start = row_index_offset as usize;
        if index_start > buf.len() {
            return Err(MicroBlockError::InvalidArgument(
                "row index offset beyond buffer",
            ));
        }
        if (header_size as usize) > index_start
            || (row_count > 0 && header_size as usize == index_start)
        {
            return Err(MicroBlockError::InvalidArgument(
                "row data region inverted or empty",
            ));
        }
        let index_len = (row_count as usize)
            .checked_add(1)
            .and_then(|n| n.checked_mul(ROW_INDEX_ENTRY_LEN))
            .ok_or(MicroBlockError::InvalidArgument("row index length overflow"))?;
        if index_start
            .checked_add(index_len)
            .map_or(true, |end| end > buf.len())
        {
            return Err(MicroBlockError::InvalidArgument(
                "row index exceeds buffer",
            ));
        }
        Ok(Self {
            version,
            header_size,
            column_count,
            row_store,
            multi_version,
            row_count,
            row_index_offset,
        })
    }

    /// Encodes the header into its fixed-size prefix.
    pub fn encode(&self) -> [u8; MICRO_BLOCK_HEADER_LEN] {
        let mut buf = [0u8; MICRO_BLOCK_HEADER_LEN];
        buf[MAGIC_OFFSET..MAGIC_OFFSET + 4].copy_from_slice(&MICRO_BLOCK_MAGIC);
        buf[VERSION_OFFSET..VERSION_OFFSET + 2].copy_from_slice(&self.version.to_be_bytes());
        buf[HEADER_SIZE_OFFSET..HEADER_SIZE_OFFSET + 2]
            .copy_from_slice(&self.header_size.to_be_bytes());
        buf[COLUMN_COUNT_OFFSET..COLUMN_COUNT_OFFSET + 2]
            .copy_from_slice(&self.column_count.to_be_bytes());
        buf[ROW_STORE_OFFSET] = self.row_store.as_u8();
        buf[ATTR_OFFSET] = if self.multi_version {
            ATTR_MULTI_VERSION
        } else {
            0
        };
        buf[ROW_COUNT_OFFSET..ROW_COUNT_OFFSET + 4].copy_from_slice(&self.row_count.to_be_bytes());
        buf[ROW_INDEX_OFFSET_OFFSET..ROW_INDEX_OFFSET_OFFSET + 4]
            .copy_from_slice(&self.row_index_offset.to_be_bytes());
        buf
    }

    /// Length of the row data region.
    pub fn data_len(&self) -> usize {
        self.row_index_offset as usize - self.header_size as usize
    }
}

/// View over the `row_count + 1` big-endian `i32` row offsets.
#[derive(Clone, Copy, Debug)]
pub struct RowIndex<'a> {
    raw: &'a [u8],
}

impl<'a> RowIndex<'a> {
    /// Number of entries, including the trailing sentinel.
    pub fn len(&self) -> usize {
        self.raw.len() / ROW_INDEX_ENTRY_LEN
    }

    /// Returns `true` when the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Offset stored at `idx`, relative to the start of row data.
    pub fn get(&self, idx: usize) -> Result<i32> {
        if idx >= self.len() {
            return Err(MicroBlockError::InvalidArgument(
                "row index entry out of range",
            ));
        }
        let off = idx * ROW_INDEX_ENTRY_LEN;
        let bytes = &self.raw[off..off + ROW_INDEX_ENTRY_LEN];
        Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

/// Bounds-checked view over a parsed micro block.
///
/// Every row span is produced by [`BlockView::row`], which validates the
/// position and its offsets before slicing.
#[derive(Clone, Copy, Debug)]
pub struct BlockView<'a> {
    header: BlockHeader,
    data: &'a [u8],
    index: RowIndex<'a>,
}

impl<'a> BlockView<'a> {
    /// Parses `buf`. With `verify_index` every offset is checked up front;
    /// otherwise only the first entry and the sentinel are, and each row
    /// access validates its own span.
    pub fn parse(buf: &'a [u8], verify_index: bool) -> Result<Self> {
        let header = BlockHeader::parse(buf)?;
        let data = &buf[header.header_size as usize..header.row_index_offset as usize];
        let index_start = header.row_index_offset as usize;
        let index_end = index_start + (header.row_count as usize + 1) * ROW_INDEX_ENTRY_LEN;
        let index = RowIndex {
            raw: &buf[index_start..index_end],
        };
        let view = Self {
            header,
            data,
            index,
        };
        if index.get(0)? < 0 {
            return Err(MicroBlockError::InvalidArgument("negative row offset"));
        }
        let sentinel = index.get(header.row_count as usize)?;
        if sentinel as i64 != data.len() as i64 {
            return Err(MicroBlockError::InvalidArgument(
                "row index sentinel does not match data length",
            ));
        }
        if verify_index {
            let mut prev = index.get(0)?;
            for idx in 1..index.len() {
                let cur = index.get(idx)?;
                if cur < prev {
                    return Err(MicroBlockError::InvalidArgument(
                        "row index offsets decrease",
                    ));
                }
                prev = cur;
            }
        }
        Ok(view)
    }

    /// Decoded block header.
    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    /// Number of physical rows.
    pub fn row_count(&self) -> usize {
        self.header.row_count as usize
    }

    /// Row data region.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Row offset index.
    pub fn row_index(&self) -> RowIndex<'a> {
        self.index
    }

    /// Offset of row `idx` relative to the data region, `idx ∈ [0, row_count]`.
    pub fn offset(&self, idx: usize) -> Result<usize> {
        let raw = self.index.get(idx)?;
        usize::try_from(raw).map_err(|_| MicroBlockError::InvalidArgument("negative row offset"))
    }

    /// Byte span of row `idx`, `idx ∈ [0, row_count)`.
    pub fn row(&self, idx: usize) -> Result<&'a [u8]> {
        if idx >= self.row_count() {
            return Err(MicroBlockError::InvalidArgument("row index out of range"));
        }
        let start = self.offset(idx)?;
        let end = self.offset(idx + 1)?;
        if start > end || end > self.data.len() {
            return Err(MicroBlockError::InvalidArgument(
                "row offsets out of order",
            ));
        }
        Ok(&self.data[start..end])
    }
}

fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([buf[offset], buf[offset + 1]])
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}
