use crate::storage::row::ColumnType;
use crate::types::{MicroBlockError, Result};

/// Maps the columns a caller requests onto the columns a block stores.
///
/// A projection of `None` requests a column the block does not store; it is
/// materialised as null.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnMap {
    store_types: Vec<ColumnType>,
    rowkey_count: usize,
    projections: Vec<Option<usize>>,
}

impl ColumnMap {
    /// Creates a map, validating projections against the stored columns.
    pub fn new(
        store_types: Vec<ColumnType>,
        rowkey_count: usize,
        projections: Vec<Option<usize>>,
    ) -> Result<Self> {
        let map = Self {
            store_types,
            rowkey_count,
            projections,
        };
        if !map.is_valid() {
            return Err(MicroBlockError::InvalidArgument("invalid column map"));
        }
        Ok(map)
    }

    /// Requests every stored column in store order.
    pub fn full(store_types: Vec<ColumnType>, rowkey_count: usize) -> Result<Self> {
        let projections = (0..store_types.len()).map(Some).collect();
        Self::new(store_types, rowkey_count, projections)
    }

    /// Returns `true` when the map can drive a reader.
    pub fn is_valid(&self) -> bool {
        !self.store_types.is_empty()
            && self.rowkey_count <= self.store_types.len()
            && self
                .projections
                .iter()
                .flatten()
                .all(|idx| *idx < self.store_types.len())
    }

    /// Number of stored columns.
    pub fn store_count(&self) -> usize {
        self.store_types.len()
    }

    /// Number of requested output columns.
    pub fn request_count(&self) -> usize {
        self.projections.len()
    }

    /// Number of leading key columns (multi-version columns included).
    pub fn rowkey_count(&self) -> usize {
        self.rowkey_count
    }

    /// Types of the stored columns.
    pub fn store_types(&self) -> &[ColumnType] {
        &self.store_types
    }

    /// Requested projections.
    pub fn projections(&self) -> &[Option<usize>] {
        &self.projections
    }
}
