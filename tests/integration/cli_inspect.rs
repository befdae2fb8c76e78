#![allow(missing_docs)]

use std::fs;
use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value as JsonValue;
use sombra_microblock::storage::{
    BlockBuilder, MultiVersionRowFlag, RowFlag, RowHeader, RowStoreKind, Value,
};
use sombra_microblock::TransId;
use tempfile::TempDir;

fn write_block(dir: &TempDir, name: &str, block: &[u8]) -> PathBuf {
    let path = dir.path().join(format!("{name}.mblk"));
    fs::write(&path, block).expect("write block");
    path
}

fn people_block() -> Vec<u8> {
    let mut builder = BlockBuilder::new(RowStoreKind::Flat, 3);
    for (id, name, flag) in [
        (1, "ada", RowFlag::Exist),
        (2, "grace", RowFlag::Delete),
        (4, "alan", RowFlag::Exist),
    ] {
        builder.push(
            RowHeader::new(RowStoreKind::Flat, 3).row_flag(flag),
            &[Value::Int(id), Value::Str(name), Value::Bytes(&[0xab, 0xcd])],
        );
    }
    builder.finish()
}

fn parse_json(stdout: &[u8]) -> JsonValue {
    serde_json::from_slice(stdout).expect("json output")
}

#[test]
fn header_reports_block_layout() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_block(&dir, "people", &people_block());
    let output = cargo_bin_cmd!("mblock-inspect")
        .args(["--format", "json", "header"])
        .arg(&path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json = parse_json(&output);
    assert_eq!(json["row_count"], 3);
    assert_eq!(json["column_count"], 3);
    assert_eq!(json["row_store"], "Flat");
    assert_eq!(json["multi_version"], false);
}

#[test]
fn rows_prints_every_row_in_text() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_block(&dir, "people", &people_block());
    let output = cargo_bin_cmd!("mblock-inspect")
        .arg("rows")
        .arg(&path)
        .args(["--types", "int,str,bytes"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf8");
    assert_eq!(text.lines().count(), 3);
    assert!(text.contains("ada"));
    assert!(text.contains("0xabcd"));
    assert!(text.lines().next().expect("first line").contains("first"));
}

#[test]
fn rows_in_reverse_as_json() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_block(&dir, "people", &people_block());
    let output = cargo_bin_cmd!("mblock-inspect")
        .args(["--format", "json", "rows"])
        .arg(&path)
        .args(["--types", "int,str,bytes", "--reverse"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json = parse_json(&output);
    let positions: Vec<_> = json
        .as_array()
        .expect("array")
        .iter()
        .map(|row| row["position"].as_u64().expect("position"))
        .collect();
    assert_eq!(positions, vec![2, 1, 0]);
}

#[test]
fn get_distinguishes_live_deleted_and_absent() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_block(&dir, "people", &people_block());
    let lookup = |key: &str| {
        let output = cargo_bin_cmd!("mblock-inspect")
            .args(["--format", "json", "get"])
            .arg(&path)
            .args(["--types", "int,str,bytes", "--key", key])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        parse_json(&output)
    };

    let live = lookup("4");
    assert_eq!(live["exists"]["exists"], true);
    assert_eq!(live["row_index"], 2);
    assert_eq!(live["row"]["cells"][1], "alan");

    let deleted = lookup("2");
    assert_eq!(deleted["exists"]["exists"], false);
    assert_eq!(deleted["exists"]["found"], true);

    let absent = lookup("3");
    assert_eq!(absent["exists"]["found"], false);
    assert!(absent["row"].is_null());
}

#[test]
fn bound_reports_position_and_equality() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_block(&dir, "people", &people_block());
    let output = cargo_bin_cmd!("mblock-inspect")
        .args(["--format", "json", "bound"])
        .arg(&path)
        .args(["--types", "int,str,bytes", "--key", "2", "--upper"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json = parse_json(&output);
    assert_eq!(json["row_index"], 2);
    assert_eq!(json["equal"], true);
    assert_eq!(json["lower_bound"], false);
}

#[test]
fn mvcc_decodes_uncommitted_row() {
    let mut builder = BlockBuilder::new(RowStoreKind::Flat, 4).multi_version(true);
    builder.push(
        RowHeader::new(RowStoreKind::Flat, 4)
            .mv_flag(MultiVersionRowFlag::new(MultiVersionRowFlag::UNCOMMITTED))
            .trans_id(TransId(42)),
        &[Value::Int(6), Value::Int(-i64::MAX), Value::Int(-7), Value::Str("x")],
    );
    let dir = TempDir::new().expect("tempdir");
    let path = write_block(&dir, "versions", &builder.finish());
    let output = cargo_bin_cmd!("mblock-inspect")
        .args(["--format", "json", "mvcc"])
        .arg(&path)
        .args(["--types", "int,int,int,str", "--rowkey-count", "1", "--row", "0"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json = parse_json(&output);
    assert_eq!(json["info"]["trans_version"], i64::MAX);
    assert_eq!(json["info"]["sql_sequence"], 7);
    assert_eq!(json["info"]["trans_id"], 42);
}

#[test]
fn corrupt_block_fails_with_message() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_block(&dir, "junk", b"not a micro block at all");
    let output = cargo_bin_cmd!("mblock-inspect")
        .arg("header")
        .arg(&path)
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(output).expect("utf8");
    assert!(stderr.contains("magic"), "{stderr}");
}
