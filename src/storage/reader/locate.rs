//! Binary searches over the row index.
//!
//! Every search funnels through [`RowProbe::compare`], which orders the row at
//! a position against a key on the key's leading columns. Point lookups and
//! bound searches differ only in how they move on each ordering.

use std::cmp::Ordering;

use tracing::trace;

use crate::storage::block::BlockView;
use crate::storage::compare::KeyPrefixComparator;
use crate::storage::reader::ReaderStats;
use crate::storage::row::{RowDecode, RowDecoder, RowHeader, Rowkey};
use crate::types::{MicroBlockError, Result};

/// How a point lookup resolves equal keys.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum LocateMode {
    /// Keys are unique; return the first equal row probed.
    Exact,
    /// Keys repeat once per version; return the leftmost equal row.
    FirstVersion,
}

/// A row found by a point lookup.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Located<'a> {
    pub(crate) row: &'a [u8],
    pub(crate) row_idx: usize,
}

/// Key comparison against rows of one block.
pub(crate) struct RowProbe<'r, 'a, 'c> {
    block: &'r BlockView<'a>,
    decoder: &'r mut RowDecoder<'a>,
    prefix: KeyPrefixComparator<'c>,
    column_count: usize,
    stats: Option<&'c ReaderStats>,
}

impl<'r, 'a, 'c> RowProbe<'r, 'a, 'c> {
    pub(crate) fn new(
        block: &'r BlockView<'a>,
        decoder: &'r mut RowDecoder<'a>,
        prefix: KeyPrefixComparator<'c>,
        column_count: usize,
        stats: Option<&'c ReaderStats>,
    ) -> Self {
        Self {
            block,
            decoder,
            prefix,
            column_count,
            stats,
        }
    }

    /// Orders the row at `row_idx` against `key` on `key.len()` columns.
    pub(crate) fn compare(&mut self, row_idx: usize, key: &Rowkey<'_>) -> Result<Ordering> {
        let row = self.block.row(row_idx)?;
        let ord = self
            .prefix
            .compare_row(&mut *self.decoder, row, self.column_count, key, key.len());
        self.decoder.reset();
        ord
    }

    /// Point lookup over the whole block.
    pub(crate) fn locate(&mut self, key: &Rowkey<'_>, mode: LocateMode) -> Result<Located<'a>> {
        if !key.is_valid() {
            return Err(MicroBlockError::InvalidArgument("invalid rowkey"));
        }
        if key.len() > self.column_count {
            return Err(MicroBlockError::InvalidArgument(
                "rowkey wider than column schema",
            ));
        }
        if let Some(stats) = self.stats {
            stats.inc_searches();
        }
        let result = match mode {
            LocateMode::Exact => self.locate_exact(key),
            LocateMode::FirstVersion => self.locate_first_version(key),
        };
        if let (Err(MicroBlockError::NotFound), Some(stats)) = (&result, self.stats) {
            stats.inc_not_found();
        }
        result
    }

    fn locate_exact(&mut self, key: &Rowkey<'_>) -> Result<Located<'a>> {
        let mut low: isize = 0;
        let mut high = self.block.row_count() as isize - 1;
        while low <= high {
            let middle = low + ((high - low) >> 1);
            match self.compare(middle as usize, key)? {
                Ordering::Equal => {
                    let row_idx = middle as usize;
                    trace!(target: "sombra_microblock::locate", row_idx, "locate.hit");
                    return Ok(Located {
                        row: self.block.row(row_idx)?,
                        row_idx,
                    });
                }
                Ordering::Less => low = middle + 1,
                Ordering::Greater => high = middle - 1,
            }
        }
        trace!(target: "sombra_microblock::locate", key = %key, "locate.miss");
        Err(MicroBlockError::NotFound)
    }

    fn locate_first_version(&mut self, key: &Rowkey<'_>) -> Result<Located<'a>> {
        let mut low: isize = 0;
        let mut high = self.block.row_count() as isize - 1;
        let mut found = false;
        while low <= high {
            let middle = low + ((high - low) >> 1);
            match self.compare(middle as usize, key)? {
                Ordering::Equal => {
                    found = true;
                    high = middle - 1;
                }
                Ordering::Less => low = middle + 1,
                Ordering::Greater => high = middle - 1,
            }
        }
        if !found {
            trace!(target: "sombra_microblock::locate", key = %key, "locate.miss");
            return Err(MicroBlockError::NotFound);
        }
        let row_idx = low as usize;
        let row = self.block.row(row_idx)?;
        if RowHeader::decode(row)?.mv_flag.is_magic_row() {
            trace!(target: "sombra_microblock::locate", row_idx, "locate.magic_row");
            return Err(MicroBlockError::NotFound);
        }
        trace!(target: "sombra_microblock::locate", row_idx, "locate.hit");
        Ok(Located { row, row_idx })
    }

    /// First position in `[begin, end)` whose row is `>= key` (lower) or
    /// `> key` (upper), and whether an equal row was probed on the way.
    pub(crate) fn bound(
        &mut self,
        key: &Rowkey<'_>,
        lower: bool,
        begin: usize,
        end: usize,
    ) -> Result<(usize, bool)> {
        if !key.is_valid() {
            return Err(MicroBlockError::InvalidArgument("invalid rowkey"));
        }
        if key.len() > self.column_count {
            return Err(MicroBlockError::InvalidArgument(
                "rowkey wider than column schema",
            ));
        }
        if begin >= end || end > self.block.row_count() {
            return Err(MicroBlockError::InvalidArgument("bound range out of order"));
        }
        if let Some(stats) = self.stats {
            stats.inc_searches();
            stats.inc_bound_searches();
        }
        let mut equal = false;
        let (mut lo, mut hi) = (begin, end);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let ord = self.compare(mid, key)?;
            if ord == Ordering::Equal {
                equal = true;
            }
            let go_right = if lower {
                ord == Ordering::Less
            } else {
                ord != Ordering::Greater
            };
            if go_right {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        trace!(
            target: "sombra_microblock::bound",
            lower,
            begin,
            end,
            row_idx = lo,
            equal,
            "bound.done"
        );
        Ok((lo, equal))
    }
}
