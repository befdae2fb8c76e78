use serde::Serialize;

use crate::primitives::bytes::buf::ByteCursor;
use crate::types::{MicroBlockError, Result, TransId};

/// Length of the encoded [`RowHeader`] in bytes.
pub const ROW_HEADER_LEN: usize = 16;

/// Physical row layout used by a block and all of its rows.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
pub enum RowStoreKind {
    /// Every column is stored in schema order.
    Flat = 1,
    /// Only non-null columns are stored, each tagged with its column id.
    Sparse = 2,
}

impl RowStoreKind {
    /// Converts a byte value to a store kind.
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::Flat),
            2 => Ok(Self::Sparse),
            _ => Err(MicroBlockError::Corruption("unknown row store kind")),
        }
    }

    /// Byte representation.
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Action recorded for a physical row.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
pub enum RowFlag {
    /// Placeholder for a row that does not exist.
    NotExist = 0,
    /// Live row.
    Exist = 1,
    /// Deletion marker.
    Delete = 2,
}

impl RowFlag {
    /// Converts a byte value to a row flag.
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::NotExist),
            1 => Ok(Self::Exist),
            2 => Ok(Self::Delete),
            _ => Err(MicroBlockError::Corruption("unknown row flag")),
        }
    }

    /// Returns `true` for deletion markers.
    pub fn is_delete(self) -> bool {
        self == Self::Delete
    }
}

/// Multi-version bit flags carried by every row header.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize)]
pub struct MultiVersionRowFlag(pub u8);

impl MultiVersionRowFlag {
    /// Row was produced by compaction and holds a full image.
    pub const COMPACTED: u8 = 0x01;
    /// Last physical row of its logical key.
    pub const LAST: u8 = 0x02;
    /// Row was written by a transaction that had not committed.
    pub const UNCOMMITTED: u8 = 0x04;
    /// Synthetic boundary row; never live data.
    pub const MAGIC: u8 = 0x08;
    /// First physical row of its logical key.
    pub const FIRST: u8 = 0x10;

    /// Builds a flag set from raw bits.
    pub const fn new(bits: u8) -> Self {
        Self(bits)
    }

    /// Raw bits.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns the flag set with `bits` added.
    pub const fn with(self, bits: u8) -> Self {
        Self(self.0 | bits)
    }

    /// Row is uncommitted.
    pub fn is_uncommitted(self) -> bool {
        self.0 & Self::UNCOMMITTED != 0
    }

    /// Row is a boundary marker.
    pub fn is_magic_row(self) -> bool {
        self.0 & Self::MAGIC != 0
    }

    /// Row holds a compacted image.
    pub fn is_compacted(self) -> bool {
        self.0 & Self::COMPACTED != 0
    }

    /// Row is the last version of its key.
    pub fn is_last_multi_version_row(self) -> bool {
        self.0 & Self::LAST != 0
    }

    /// Row is the first version of its key.
    pub fn is_first_multi_version_row(self) -> bool {
        self.0 & Self::FIRST != 0
    }
}

/// Fixed-size header at the start of every row.
///
/// Layout: `row_flag:u8 | mv_flag:u8 | store_kind:u8 | reserved:u8 |
/// column_count:u16 | reserved:u16 | trans_id:u64`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct RowHeader {
    /// Row action.
    pub row_flag: RowFlag,
    /// Multi-version flag set.
    pub mv_flag: MultiVersionRowFlag,
    /// Layout of the row body.
    pub store_kind: RowStoreKind,
    /// Number of columns physically written for this row.
    pub column_count: u16,
    /// Owning transaction; meaningful for uncommitted rows.
    pub trans_id: TransId,
}

impl RowHeader {
    /// Header for a committed live row.
    pub fn new(store_kind: RowStoreKind, column_count: u16) -> Self {
        Self {
            row_flag: RowFlag::Exist,
            mv_flag: MultiVersionRowFlag::default(),
            store_kind,
            column_count,
            trans_id: TransId::NONE,
        }
    }

    /// Sets the row flag.
    pub fn row_flag(mut self, flag: RowFlag) -> Self {
        self.row_flag = flag;
        self
    }

    /// Sets the multi-version flag set.
    pub fn mv_flag(mut self, flag: MultiVersionRowFlag) -> Self {
        self.mv_flag = flag;
        self
    }

    /// Sets the owning transaction.
    pub fn trans_id(mut self, trans_id: TransId) -> Self {
        self.trans_id = trans_id;
        self
    }

    /// Encodes the header into a fixed array.
    pub fn encode(&self) -> [u8; ROW_HEADER_LEN] {
        let mut buf = [0u8; ROW_HEADER_LEN];
        buf[0] = self.row_flag as u8;
        buf[1] = self.mv_flag.bits();
        buf[2] = self.store_kind.as_u8();
        buf[4..6].copy_from_slice(&self.column_count.to_be_bytes());
        buf[8..16].copy_from_slice(&self.trans_id.0.to_be_bytes());
        buf
    }

    /// Decodes the header at the start of `row`.
    pub fn decode(row: &[u8]) -> Result<Self> {
        if row.len() < ROW_HEADER_LEN {
            return Err(MicroBlockError::Corruption("row shorter than row header"));
        }
        let mut cur = ByteCursor::new(row);
        let row_flag = RowFlag::from_u8(cur.read_u8()?)?;
        let mv_flag = MultiVersionRowFlag(cur.read_u8()?);
        let store_kind = RowStoreKind::from_u8(cur.read_u8()?)?;
        cur.take(1)?;
        let column_count = cur.read_u16_be()?;
        cur.take(2)?;
        let trans_id = TransId(cur.read_u64_be()?);
        Ok(Self {
            row_flag,
            mv_flag,
            store_kind,
            column_count,
            trans_id,
        })
    }
}
