use std::cmp::Ordering;

use smallvec::SmallVec;

use crate::storage::reader::ReaderStats;
use crate::storage::row::{ColumnType, RowDecode, Rowkey, Value, INLINE_KEY_CELLS};
use crate::types::{MicroBlockError, Result};

/// Pluggable per-column comparison between a decoded cell and a key cell.
pub trait KeyComparator {
    /// Three-way comparison of `decoded` (from the row) against `target`
    /// (from the search key) for key column `column_idx`.
    fn compare(&self, decoded: &Value<'_>, target: &Value<'_>, column_idx: usize)
        -> Result<Ordering>;
}

/// Built-in type-aware comparison ignoring collation.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultKeyComparator;

impl KeyComparator for DefaultKeyComparator {
    fn compare(
        &self,
        decoded: &Value<'_>,
        target: &Value<'_>,
        _column_idx: usize,
    ) -> Result<Ordering> {
        Ok(decoded.compare(target))
    }
}

/// String collation applied to a key column.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Collation {
    /// Bytewise comparison.
    #[default]
    Binary,
    /// Unicode lowercase folding before comparison.
    Utf8CaseInsensitive,
}

/// Comparator applying a collation per key column; columns past the
/// configured list use [`Collation::Binary`].
#[derive(Clone, Debug, Default)]
pub struct CollationComparator {
    collations: SmallVec<[Collation; INLINE_KEY_CELLS]>,
}

impl CollationComparator {
    /// Creates a comparator from per-column collations.
    pub fn new(collations: impl IntoIterator<Item = Collation>) -> Self {
        Self {
            collations: collations.into_iter().collect(),
        }
    }
}

impl KeyComparator for CollationComparator {
    fn compare(
        &self,
        decoded: &Value<'_>,
        target: &Value<'_>,
        column_idx: usize,
    ) -> Result<Ordering> {
        let collation = self
            .collations
            .get(column_idx)
            .copied()
            .unwrap_or_default();
        match (collation, decoded, target) {
            (Collation::Utf8CaseInsensitive, Value::Str(a), Value::Str(b)) => Ok(a
                .chars()
                .flat_map(char::to_lowercase)
                .cmp(b.chars().flat_map(char::to_lowercase))),
            _ => Ok(decoded.compare(target)),
        }
    }
}

/// Compares the leading key columns of an encoded row against a rowkey.
///
/// This is the single comparison primitive shared by the point locators and
/// the bound finder. Columns are decoded one at a time and decoding stops at
/// the first non-equal column.
#[derive(Clone, Copy)]
pub(crate) struct KeyPrefixComparator<'c> {
    types: &'c [ColumnType],
    comparator: Option<&'c dyn KeyComparator>,
    stats: Option<&'c ReaderStats>,
}

impl<'c> KeyPrefixComparator<'c> {
    pub(crate) fn new(
        types: &'c [ColumnType],
        comparator: Option<&'c dyn KeyComparator>,
        stats: Option<&'c ReaderStats>,
    ) -> Self {
        Self {
            types,
            comparator,
            stats,
        }
    }

    /// Orders `row` relative to `key` on the first `compare_count` columns.
    pub(crate) fn compare_row<'a, D: RowDecode<'a>>(
        &self,
        decoder: &mut D,
        row: &'a [u8],
        column_count: usize,
        key: &Rowkey<'_>,
        compare_count: usize,
    ) -> Result<Ordering> {
        if compare_count > key.len() || compare_count > self.types.len() {
            return Err(MicroBlockError::InvalidArgument(
                "compare column count exceeds key or schema",
            ));
        }
        decoder.setup(row, column_count)?;
        if let Some(stats) = self.stats {
            stats.inc_probes();
        }
        for (idx, target) in key.cells()[..compare_count].iter().enumerate() {
            let cell = decoder.read_next(self.types[idx])?;
            let ord = match self.comparator {
                Some(cmp) => cmp.compare(&cell, target, idx)?,
                None => cell.compare(target),
            };
            if let Some(stats) = self.stats {
                stats.inc_column_compares();
            }
            if ord != Ordering::Equal {
                return Ok(ord);
            }
        }
        Ok(Ordering::Equal)
    }
}
