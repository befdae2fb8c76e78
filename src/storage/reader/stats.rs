use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use serde::Serialize;

/// Snapshot of reader statistics at a point in time.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReaderStatsSnapshot {
    /// Number of point lookups and bound searches started
    pub searches: u64,
    /// Number of rows probed by a binary search
    pub probes: u64,
    /// Number of key columns compared
    pub column_compares: u64,
    /// Number of lookups that ended in NotFound
    pub not_found: u64,
    /// Number of bound searches performed
    pub bound_searches: u64,
    /// Number of rows materialised into output rows
    pub rows_materialized: u64,
    /// Number of lock checks performed
    pub lock_checks: u64,
    /// Number of lock checks delegated to the transaction-state authority
    pub authority_calls: u64,
}

/// Thread-safe counters shared by readers through an `Arc`.
#[derive(Default, Debug)]
pub struct ReaderStats {
    searches: AtomicU64,
    probes: AtomicU64,
    column_compares: AtomicU64,
    not_found: AtomicU64,
    bound_searches: AtomicU64,
    rows_materialized: AtomicU64,
    lock_checks: AtomicU64,
    authority_calls: AtomicU64,
}

impl ReaderStats {
    /// Returns the number of searches started.
    pub fn searches(&self) -> u64 {
        self.searches.load(AtomicOrdering::Relaxed)
    }

    /// Returns the number of rows probed.
    pub fn probes(&self) -> u64 {
        self.probes.load(AtomicOrdering::Relaxed)
    }

    /// Returns the number of key column comparisons.
    pub fn column_compares(&self) -> u64 {
        self.column_compares.load(AtomicOrdering::Relaxed)
    }

    /// Returns the number of lookups that missed.
    pub fn not_found(&self) -> u64 {
        self.not_found.load(AtomicOrdering::Relaxed)
    }

    /// Returns the number of bound searches.
    pub fn bound_searches(&self) -> u64 {
        self.bound_searches.load(AtomicOrdering::Relaxed)
    }

    /// Returns the number of rows materialised.
    pub fn rows_materialized(&self) -> u64 {
        self.rows_materialized.load(AtomicOrdering::Relaxed)
    }

    /// Returns the number of lock checks.
    pub fn lock_checks(&self) -> u64 {
        self.lock_checks.load(AtomicOrdering::Relaxed)
    }

    /// Returns the number of authority delegations.
    pub fn authority_calls(&self) -> u64 {
        self.authority_calls.load(AtomicOrdering::Relaxed)
    }

    pub(crate) fn inc_searches(&self) {
        self.searches.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_probes(&self) {
        self.probes.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_column_compares(&self) {
        self.column_compares.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_not_found(&self) {
        self.not_found.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_bound_searches(&self) {
        self.bound_searches.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn add_rows_materialized(&self, rows: u64) {
        self.rows_materialized
            .fetch_add(rows, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_lock_checks(&self) {
        self.lock_checks.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_authority_calls(&self) {
        self.authority_calls
            .fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Creates a snapshot of all current statistics.
    pub fn snapshot(&self) -> ReaderStatsSnapshot {
        ReaderStatsSnapshot {
            searches: self.searches(),
            probes: self.probes(),
            column_compares: self.column_compares(),
            not_found: self.not_found(),
            bound_searches: self.bound_searches(),
            rows_materialized: self.rows_materialized(),
            lock_checks: self.lock_checks(),
            authority_calls: self.authority_calls(),
        }
    }

    /// Emits current statistics to the tracing infrastructure.
    pub fn emit_tracing(&self) {
        let snapshot = self.snapshot();
        tracing::info!(
            target: "sombra_microblock::stats",
            searches = snapshot.searches,
            probes = snapshot.probes,
            column_compares = snapshot.column_compares,
            not_found = snapshot.not_found,
            bound_searches = snapshot.bound_searches,
            rows_materialized = snapshot.rows_materialized,
            lock_checks = snapshot.lock_checks,
            authority_calls = snapshot.authority_calls,
            "reader stats snapshot"
        );
    }
}
