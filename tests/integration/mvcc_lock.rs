#![allow(missing_docs)]

use std::cell::RefCell;
use std::sync::Arc;

use sombra_microblock::storage::{
    BlockBuilder, ColumnMap, ColumnType, LockState, MicroBlockReader, MultiVersionGetReader,
    MultiVersionLayout, MultiVersionRowFlag, ReaderOptions, ReaderStats, RowHeader, RowStoreKind,
    Rowkey, TransStateAuthority, Value, UNCOMMITTED_TRANS_VERSION,
};
use sombra_microblock::{MicroBlockError, Result, TransId};

const KEY_TYPES: [ColumnType; 1] = [ColumnType::Int];
const V3_TYPES: [ColumnType; 4] = [
    ColumnType::Int,
    ColumnType::Int,
    ColumnType::Int,
    ColumnType::Str,
];

#[derive(Debug, Clone, PartialEq)]
struct AuthorityCall {
    rowkey: String,
    reading: TransId,
    owner: TransId,
    sql_sequence: i64,
}

/// Records every delegation and reports the row locked unless the reader
/// owns it.
#[derive(Default)]
struct RecordingAuthority {
    calls: RefCell<Vec<AuthorityCall>>,
}

impl TransStateAuthority for RecordingAuthority {
    fn check_row_locked(
        &self,
        rowkey: &Rowkey<'_>,
        reading_trans: TransId,
        owning_trans: TransId,
        sql_sequence: i64,
        lock_state: &mut LockState,
    ) -> Result<()> {
        self.calls.borrow_mut().push(AuthorityCall {
            rowkey: rowkey.to_string(),
            reading: reading_trans,
            owner: owning_trans,
            sql_sequence,
        });
        if reading_trans != owning_trans {
            lock_state.is_locked = true;
            lock_state.lock_trans_id = owning_trans;
        }
        Ok(())
    }
}

struct FailingAuthority;

impl TransStateAuthority for FailingAuthority {
    fn check_row_locked(
        &self,
        _rowkey: &Rowkey<'_>,
        _reading_trans: TransId,
        owning_trans: TransId,
        _sql_sequence: i64,
        _lock_state: &mut LockState,
    ) -> Result<()> {
        Err(MicroBlockError::TransState(format!(
            "transaction {owning_trans} state unavailable"
        )))
    }
}

fn committed() -> RowHeader {
    RowHeader::new(RowStoreKind::Flat, 4)
}

fn v3_row(
    builder: &mut BlockBuilder,
    header: RowHeader,
    key: i64,
    stored_version: i64,
    stored_seq: i64,
    payload: &'static str,
) {
    builder.push(
        header,
        &[
            Value::Int(key),
            Value::Int(stored_version),
            Value::Int(stored_seq),
            Value::Str(payload),
        ],
    );
}

/// Key 5 at versions 100 and 90 followed by its magic row, an uncommitted
/// key 6 written by transaction 42 at sql sequence 7, and a key 8 that only
/// has a magic row.
fn scenario_b() -> Vec<u8> {
    let mut builder = BlockBuilder::new(RowStoreKind::Flat, 4).multi_version(true);
    let first = MultiVersionRowFlag::new(MultiVersionRowFlag::FIRST);
    v3_row(&mut builder, committed().mv_flag(first), 5, -100, 0, "v100");
    v3_row(&mut builder, committed(), 5, -90, 0, "v90");
    v3_row(
        &mut builder,
        committed().mv_flag(MultiVersionRowFlag::new(
            MultiVersionRowFlag::MAGIC | MultiVersionRowFlag::LAST,
        )),
        5,
        0,
        0,
        "",
    );
    v3_row(
        &mut builder,
        RowHeader::new(RowStoreKind::Flat, 4)
            .mv_flag(MultiVersionRowFlag::new(MultiVersionRowFlag::UNCOMMITTED))
            .trans_id(TransId(42)),
        6,
        -i64::MAX,
        -7,
        "pending",
    );
    v3_row(
        &mut builder,
        committed().mv_flag(MultiVersionRowFlag::new(MultiVersionRowFlag::MAGIC)),
        8,
        0,
        0,
        "",
    );
    builder.finish()
}

#[test]
fn locate_lands_on_newest_version() {
    let block = scenario_b();
    let mut reader = MultiVersionGetReader::default();
    let idx = reader
        .locate_row_index(&block, &Rowkey::int(5), &KEY_TYPES, None)
        .expect("key 5");
    assert_eq!(idx, 0);

    let row = reader
        .get_full_row(&block, &Rowkey::int(5), &V3_TYPES, None)
        .expect("newest version");
    assert_eq!(row.cells[3], Value::Str("v100"));

    let err = reader
        .locate_row_index(&block, &Rowkey::int(8), &KEY_TYPES, None)
        .expect_err("magic only");
    assert!(err.is_not_found());
}

#[test]
fn committed_row_reports_version_without_authority() {
    let block = scenario_b();
    let authority = RecordingAuthority::default();
    let mut reader = MultiVersionGetReader::default();
    let state = reader
        .check_row_locked(&authority, TransId(9), &block, &Rowkey::int(5), &KEY_TYPES, None)
        .expect("lock check");
    assert_eq!(state.trans_version, 100);
    assert!(!state.is_locked);
    assert!(authority.calls.borrow().is_empty());
}

#[test]
fn uncommitted_row_delegates_with_sql_sequence() {
    let block = scenario_b();
    let authority = RecordingAuthority::default();
    let stats = Arc::new(ReaderStats::default());
    let mut reader = MultiVersionGetReader::new(ReaderOptions::new().stats(Arc::clone(&stats)));

    let state = reader
        .check_row_locked(&authority, TransId(9), &block, &Rowkey::int(6), &KEY_TYPES, None)
        .expect("lock check");
    assert_eq!(state.trans_version, UNCOMMITTED_TRANS_VERSION);
    assert!(state.is_locked);
    assert_eq!(state.lock_trans_id, TransId(42));
    assert_eq!(
        authority.calls.borrow().as_slice(),
        &[AuthorityCall {
            rowkey: "(6)".to_owned(),
            reading: TransId(9),
            owner: TransId(42),
            sql_sequence: 7,
        }]
    );

    let own = reader
        .check_row_locked(&authority, TransId(42), &block, &Rowkey::int(6), &KEY_TYPES, None)
        .expect("own lock check");
    assert!(!own.is_locked);

    let snap = stats.snapshot();
    assert_eq!(snap.lock_checks, 2);
    assert_eq!(snap.authority_calls, 2);
}

#[test]
fn absent_and_magic_keys_report_zero_version() {
    let block = scenario_b();
    let authority = RecordingAuthority::default();
    let mut reader = MultiVersionGetReader::default();
    for key in [3, 7, 8, 9] {
        let state = reader
            .check_row_locked(&authority, TransId(1), &block, &Rowkey::int(key), &KEY_TYPES, None)
            .expect("lock check");
        assert_eq!(state, LockState::default(), "key {key}");
    }
    assert!(authority.calls.borrow().is_empty());
}

#[test]
fn check_at_known_position_matches_lookup() {
    let block = scenario_b();
    let authority = RecordingAuthority::default();
    let mut reader = MultiVersionGetReader::default();
    let key = Rowkey::int(6);
    let idx = reader
        .locate_row_index(&block, &key, &KEY_TYPES, None)
        .expect("locate");
    let at = reader
        .check_row_locked_at(&authority, TransId(9), &block, idx, &key)
        .expect("check at");
    let looked_up = reader
        .check_row_locked(&authority, TransId(9), &block, &key, &KEY_TYPES, None)
        .expect("check");
    assert_eq!(at, looked_up);
    assert_eq!(reader.last_row_index(), Some(idx));
}

#[test]
fn check_at_magic_row_reports_no_conflict() {
    let mut builder = BlockBuilder::new(RowStoreKind::Flat, 4).multi_version(true);
    let first = MultiVersionRowFlag::new(MultiVersionRowFlag::FIRST);
    v3_row(&mut builder, committed().mv_flag(first), 5, -100, 0, "v100");
    builder.push(
        committed().mv_flag(MultiVersionRowFlag::new(
            MultiVersionRowFlag::MAGIC | MultiVersionRowFlag::LAST,
        )),
        &[Value::Int(5), Value::Null, Value::Null, Value::Null],
    );
    let block = builder.finish();
    let authority = RecordingAuthority::default();
    let mut reader = MultiVersionGetReader::default();

    let state = reader
        .check_row_locked_at(&authority, TransId(9), &block, 1, &Rowkey::int(5))
        .expect("magic row");
    assert_eq!(state, LockState::default());
    assert!(authority.calls.borrow().is_empty());

    let newest = reader
        .check_row_locked_at(&authority, TransId(9), &block, 0, &Rowkey::int(5))
        .expect("newest version");
    assert_eq!(newest.trans_version, 100);

    let layout = MultiVersionLayout::V3;
    let map = ColumnMap::full(V3_TYPES.to_vec(), 1 + layout.extra_rowkey_count()).expect("map");
    let mut scan = MicroBlockReader::default();
    scan.init(&block, &map).expect("init");
    let info = scan
        .multi_version_info(1, layout.trans_version_col_idx(1), layout.sql_sequence_col_idx(1))
        .expect("magic info");
    assert!(info.flag.is_magic_row());
    assert_eq!((info.trans_version, info.sql_sequence), (0, 0));
}

#[test]
fn authority_errors_propagate_unchanged() {
    let block = scenario_b();
    let mut reader = MultiVersionGetReader::default();
    let err = reader
        .check_row_locked(
            &FailingAuthority,
            TransId(9),
            &block,
            &Rowkey::int(6),
            &KEY_TYPES,
            None,
        )
        .expect_err("authority failure");
    match err {
        MicroBlockError::TransState(msg) => assert!(msg.contains("42"), "{msg}"),
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn legacy_layout_has_no_sql_sequence() {
    let mut builder = BlockBuilder::new(RowStoreKind::Flat, 3).multi_version(true);
    builder.push(
        RowHeader::new(RowStoreKind::Flat, 3)
            .mv_flag(MultiVersionRowFlag::new(MultiVersionRowFlag::UNCOMMITTED))
            .trans_id(TransId(11)),
        &[Value::Int(1), Value::Int(-i64::MAX), Value::Str("x")],
    );
    builder.push(
        RowHeader::new(RowStoreKind::Flat, 3),
        &[Value::Int(2), Value::Int(-55), Value::Str("y")],
    );
    let block = builder.finish();
    let authority = RecordingAuthority::default();
    let mut reader = MultiVersionGetReader::new(
        ReaderOptions::new().multi_version_layout(MultiVersionLayout::Legacy),
    );

    reader
        .check_row_locked(&authority, TransId(3), &block, &Rowkey::int(1), &KEY_TYPES, None)
        .expect("uncommitted");
    assert_eq!(authority.calls.borrow()[0].sql_sequence, 0);

    let state = reader
        .check_row_locked(&authority, TransId(3), &block, &Rowkey::int(2), &KEY_TYPES, None)
        .expect("committed");
    assert_eq!(state.trans_version, 55);
}

#[test]
fn stored_minimum_version_is_corruption() {
    let mut builder = BlockBuilder::new(RowStoreKind::Flat, 4).multi_version(true);
    v3_row(&mut builder, committed(), 1, i64::MIN, 0, "bad");
    let block = builder.finish();
    let mut reader = MultiVersionGetReader::default();
    let err = reader
        .check_row_locked(
            &RecordingAuthority::default(),
            TransId(1),
            &block,
            &Rowkey::int(1),
            &KEY_TYPES,
            None,
        )
        .expect_err("overflow");
    assert!(matches!(err, MicroBlockError::Corruption(_)));
}

#[test]
fn lock_check_requires_multi_version_block() {
    let mut builder = BlockBuilder::new(RowStoreKind::Flat, 4);
    v3_row(&mut builder, committed(), 1, -1, 0, "plain");
    let block = builder.finish();
    let mut reader = MultiVersionGetReader::default();
    let err = reader
        .check_row_locked(
            &RecordingAuthority::default(),
            TransId(1),
            &block,
            &Rowkey::int(1),
            &KEY_TYPES,
            None,
        )
        .expect_err("single-version block");
    assert!(matches!(err, MicroBlockError::Unsupported(_)));
}

#[test]
fn scan_reader_exposes_version_metadata() {
    let block = scenario_b();
    let layout = MultiVersionLayout::V3;
    let map = ColumnMap::full(V3_TYPES.to_vec(), 1 + layout.extra_rowkey_count()).expect("map");
    let mut reader = MicroBlockReader::default();
    reader.init(&block, &map).expect("init");

    let version_col = layout.trans_version_col_idx(1);
    let seq_col = layout.sql_sequence_col_idx(1);
    let info = reader
        .multi_version_info(1, version_col, seq_col)
        .expect("row 1");
    assert_eq!(info.trans_version, 90);
    assert_eq!(info.sql_sequence, 0);
    assert_eq!(reader.multi_version_info(1, version_col, seq_col).expect("again"), info);

    let pending = reader
        .multi_version_info(3, version_col, seq_col)
        .expect("row 3");
    assert!(pending.flag.is_uncommitted());
    assert_eq!(pending.trans_version, UNCOMMITTED_TRANS_VERSION);
    assert_eq!(pending.sql_sequence, 7);
    assert_eq!(pending.trans_id, TransId(42));

    let header = reader.row_header(2).expect("magic header");
    assert!(header.mv_flag.is_magic_row());
    assert!(header.mv_flag.is_last_multi_version_row());
    assert_eq!(reader.row_header(2).expect("again"), header);
    assert!(matches!(
        reader.row_header(5),
        Err(MicroBlockError::InvalidArgument(_))
    ));
}
