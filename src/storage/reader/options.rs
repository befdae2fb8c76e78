use std::fmt;
use std::sync::Arc;

use crate::storage::compare::KeyComparator;
use crate::storage::mvcc::MultiVersionLayout;
use crate::storage::reader::ReaderStats;
use crate::storage::row::RowStoreKind;

/// Configuration shared by the scan and get readers.
#[derive(Clone)]
pub struct ReaderOptions {
    /// Whether every row index entry is checked when a block is opened.
    pub verify_row_index: bool,
    /// Row store kind blocks must use; `None` accepts either.
    pub expected_row_store: Option<RowStoreKind>,
    /// Layout of the reserved multi-version columns.
    pub multi_version_layout: MultiVersionLayout,
    /// Comparator used by the scan reader's bound search.
    pub comparator: Option<Arc<dyn KeyComparator + Send + Sync>>,
    /// Optional shared statistics sink.
    pub stats: Option<Arc<ReaderStats>>,
}

impl ReaderOptions {
    /// Creates options with default settings.
    pub fn new() -> Self {
        Self {
            verify_row_index: true,
            expected_row_store: None,
            multi_version_layout: MultiVersionLayout::V3,
            comparator: None,
            stats: None,
        }
    }

    /// Enables or disables the full row index check at open.
    pub fn verify_row_index(mut self, enabled: bool) -> Self {
        self.verify_row_index = enabled;
        self
    }

    /// Requires blocks to use `kind`.
    pub fn expected_row_store(mut self, kind: RowStoreKind) -> Self {
        self.expected_row_store = Some(kind);
        self
    }

    /// Sets the multi-version column layout.
    pub fn multi_version_layout(mut self, layout: MultiVersionLayout) -> Self {
        self.multi_version_layout = layout;
        self
    }

    /// Sets the comparator used by bound searches.
    pub fn comparator(mut self, comparator: Arc<dyn KeyComparator + Send + Sync>) -> Self {
        self.comparator = Some(comparator);
        self
    }

    /// Attaches a statistics sink.
    pub fn stats(mut self, stats: Arc<ReaderStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub(crate) fn stats_ref(&self) -> Option<&ReaderStats> {
        self.stats.as_deref()
    }
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReaderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderOptions")
            .field("verify_row_index", &self.verify_row_index)
            .field("expected_row_store", &self.expected_row_store)
            .field("multi_version_layout", &self.multi_version_layout)
            .field("comparator", &self.comparator.is_some())
            .field("stats", &self.stats.is_some())
            .finish()
    }
}
