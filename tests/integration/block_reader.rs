#![allow(missing_docs)]

use std::sync::Arc;

use sombra_microblock::storage::{
    BlockBuilder, Collation, CollationComparator, ColumnMap, ColumnType, ExistState,
    MicroBlockGetReader, MicroBlockReader, MultiVersionGetReader, ReaderOptions, ReaderStats,
    RowFlag, RowHeader, RowStoreKind, Rowkey, Value,
};
use sombra_microblock::MicroBlockError;

const TYPES: [ColumnType; 3] = [ColumnType::Int, ColumnType::Str, ColumnType::Float];

fn build(kind: RowStoreKind, rows: &[(i64, RowFlag, Option<&'static str>)]) -> Vec<u8> {
    let mut builder = BlockBuilder::new(kind, TYPES.len() as u16);
    for (key, flag, name) in rows {
        let name = name.map(Value::Str).unwrap_or(Value::Null);
        builder.push(
            RowHeader::new(kind, TYPES.len() as u16).row_flag(*flag),
            &[Value::Int(*key), name, Value::Float(*key as f64 / 2.0)],
        );
    }
    builder.finish()
}

fn scenario_a(kind: RowStoreKind) -> Vec<u8> {
    build(
        kind,
        &[
            (10, RowFlag::Exist, Some("ten")),
            (20, RowFlag::Exist, Some("twenty")),
            (30, RowFlag::Exist, None),
        ],
    )
}

#[test]
fn point_lookup_finds_present_keys() {
    for kind in [RowStoreKind::Flat, RowStoreKind::Sparse] {
        let block = scenario_a(kind);
        let mut reader = MicroBlockGetReader::default();
        assert_eq!(
            reader
                .locate_row_index(&block, &Rowkey::int(20), &TYPES, None)
                .expect("locate 20"),
            1
        );
        let err = reader
            .locate_row_index(&block, &Rowkey::int(15), &TYPES, None)
            .expect_err("15 is absent");
        assert!(err.is_not_found(), "{kind:?}: {err}");

        let row = reader
            .get_full_row(&block, &Rowkey::int(30), &TYPES, None)
            .expect("get 30");
        assert_eq!(row.cells, vec![Value::Int(30), Value::Null, Value::Float(15.0)]);
    }
}

#[test]
fn exists_row_reports_deleted_and_absent() {
    let block = build(
        RowStoreKind::Flat,
        &[
            (1, RowFlag::Exist, Some("a")),
            (2, RowFlag::Delete, None),
            (3, RowFlag::Exist, Some("c")),
        ],
    );
    let mut reader = MicroBlockGetReader::default();
    let deleted = reader
        .exists_row(&block, &Rowkey::int(2), &TYPES, None)
        .expect("deleted");
    assert_eq!(
        deleted,
        ExistState {
            exists: false,
            found: true
        }
    );
    let absent = reader
        .exists_row(&block, &Rowkey::int(9), &TYPES, None)
        .expect("absent");
    assert_eq!(absent, ExistState::default());
    let live = reader
        .exists_row(&block, &Rowkey::int(3), &TYPES, None)
        .expect("live");
    assert!(live.exists && live.found);
}

#[test]
fn get_reader_is_reusable_across_blocks() {
    let first = scenario_a(RowStoreKind::Flat);
    let second = build(RowStoreKind::Sparse, &[(7, RowFlag::Exist, Some("seven"))]);
    let map = ColumnMap::new(TYPES.to_vec(), 1, vec![Some(1)]).expect("map");
    let mut reader = MicroBlockGetReader::default();

    let row = reader
        .get_row(&first, &Rowkey::int(10), &map, None)
        .expect("first block");
    assert_eq!(row.cells, vec![Value::Str("ten")]);
    assert_eq!(reader.last_row_index(), Some(0));

    let row = reader
        .get_row(&second, &Rowkey::int(7), &map, None)
        .expect("second block");
    assert_eq!(row.cells, vec![Value::Str("seven")]);
    assert_eq!(reader.last_row_index(), Some(0));

    assert!(reader
        .get_row(&second, &Rowkey::int(10), &map, None)
        .expect_err("miss")
        .is_not_found());
    assert_eq!(reader.last_row_index(), None);
}

#[test]
fn scan_reader_materialises_ranges_in_both_directions() {
    let block = build(
        RowStoreKind::Sparse,
        &[
            (1, RowFlag::Exist, Some("a")),
            (2, RowFlag::Exist, None),
            (3, RowFlag::Exist, Some("c")),
            (4, RowFlag::Exist, Some("d")),
        ],
    );
    let map = ColumnMap::new(TYPES.to_vec(), 1, vec![Some(0), Some(1), None]).expect("map");
    let mut reader = MicroBlockReader::default();
    reader.init(&block, &map).expect("init");
    assert_eq!(reader.begin().expect("begin"), 0);
    assert_eq!(reader.end().expect("end"), 4);

    let mut rows = Vec::new();
    let written = reader.get_rows(1, 4, 2, &mut rows).expect("forward");
    assert_eq!(written, 2);
    assert_eq!(rows[0].cells, vec![Value::Int(2), Value::Null, Value::Null]);
    assert_eq!(rows[1].cells, vec![Value::Int(3), Value::Str("c"), Value::Null]);
    assert!(!rows[0].micro_first);

    rows.clear();
    let written = reader.get_rows(3, -1, 16, &mut rows).expect("reverse");
    assert_eq!(written, 4);
    let keys: Vec<_> = rows.iter().map(|row| row.cells[0]).collect();
    assert_eq!(
        keys,
        vec![Value::Int(4), Value::Int(3), Value::Int(2), Value::Int(1)]
    );

    let first = reader.get_row(0).expect("row 0");
    assert!(first.micro_first);
    assert!(matches!(
        reader.get_row(4),
        Err(MicroBlockError::InvalidArgument(_))
    ));
}

#[test]
fn rows_written_before_schema_growth_read_null() {
    let mut builder = BlockBuilder::new(RowStoreKind::Flat, 2);
    builder.push(RowHeader::new(RowStoreKind::Flat, 2), &[Value::Int(1), Value::Str("x")]);
    let block = builder.finish();
    let wider = ColumnMap::full(
        vec![ColumnType::Int, ColumnType::Str, ColumnType::Bool],
        1,
    )
    .expect("map");
    let mut reader = MicroBlockReader::default();
    reader.init(&block, &wider).expect("init");
    let row = reader.get_row(0).expect("row");
    assert_eq!(row.cells, vec![Value::Int(1), Value::Str("x"), Value::Null]);
}

#[test]
fn bound_search_uses_configured_comparator() {
    let types = [ColumnType::Str];
    let mut builder = BlockBuilder::new(RowStoreKind::Flat, 1);
    for name in ["apple", "Banana", "cherry"] {
        builder.push(RowHeader::new(RowStoreKind::Flat, 1), &[Value::Str(name)]);
    }
    let block = builder.finish();
    let map = ColumnMap::full(types.to_vec(), 1).expect("map");
    let options = ReaderOptions::new().comparator(Arc::new(CollationComparator::new([
        Collation::Utf8CaseInsensitive,
    ])));
    let mut reader = MicroBlockReader::new(options);
    reader.init(&block, &map).expect("init");
    let key = Rowkey::new([Value::Str("BANANA")]);
    assert_eq!(reader.find_bound(&key, true, 0, 3).expect("lower"), (1, true));
    assert_eq!(reader.find_bound(&key, false, 0, 3).expect("upper"), (2, true));

    let collation = CollationComparator::new([Collation::Utf8CaseInsensitive]);
    let mut getter = MicroBlockGetReader::default();
    let row = getter
        .get_full_row(&block, &Rowkey::new([Value::Str("CHERRY")]), &types, Some(&collation))
        .expect("case-insensitive hit");
    assert_eq!(row.cells, vec![Value::Str("cherry")]);
}

#[test]
fn shared_stats_accumulate_across_readers() {
    let stats = Arc::new(ReaderStats::default());
    let options = ReaderOptions::new().stats(Arc::clone(&stats));
    let block = scenario_a(RowStoreKind::Flat);
    let mut single = MicroBlockGetReader::new(options.clone());
    let mut multi = MultiVersionGetReader::new(options);

    single
        .get_full_row(&block, &Rowkey::int(10), &TYPES, None)
        .expect("hit");
    let _ = multi.exists_row(&block, &Rowkey::int(11), &TYPES, None);

    let snap = stats.snapshot();
    assert_eq!(snap.searches, 2);
    assert_eq!(snap.not_found, 1);
    assert_eq!(snap.rows_materialized, 1);
    assert!(snap.probes >= 2);
    assert!(snap.column_compares >= snap.probes);
    stats.emit_tracing();
}

#[test]
fn malformed_blocks_are_rejected() {
    let mut reader = MicroBlockGetReader::default();
    assert!(matches!(
        reader.exists_row(&[], &Rowkey::int(1), &TYPES, None),
        Err(MicroBlockError::InvalidArgument(_))
    ));

    let mut block = scenario_a(RowStoreKind::Flat);
    let len = block.len();
    block[len - 1] ^= 0x01;
    assert!(matches!(
        reader.exists_row(&block, &Rowkey::int(1), &TYPES, None),
        Err(MicroBlockError::InvalidArgument(_))
    ));

    let block = scenario_a(RowStoreKind::Flat);
    assert!(matches!(
        reader.exists_row(&block, &Rowkey::new([]), &TYPES, None),
        Err(MicroBlockError::InvalidArgument(_))
    ));
}
