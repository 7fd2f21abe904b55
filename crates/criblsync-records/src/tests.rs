use std::collections::HashMap;
use std::fs;

use polars::prelude::{DataType, ParquetReader, SerReader};
use serde_json::json;

use crate::directory::{write_directory_csv, DirectoryRecord};
use crate::errors::RecordError;
use crate::ndjson::{parse_ndjson, ResultRecord};
use crate::table::TableBuilder;
use crate::writer::{write_table, TableFormat};

fn record(value: serde_json::Value) -> ResultRecord {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("fixture is not an object: {other}"),
    }
}

#[test]
fn ndjson_skips_blank_lines_and_empty_objects() {
    let body = "{\"a\":1}\n\n   \n{}\n{\"a\":2,\"b\":\"x\"}\nnull\n";
    let records = parse_ndjson(body).expect("ndjson parse failed");

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].get("a"), Some(&json!(1)));
    assert_eq!(records[1].get("a"), Some(&json!(2)));
    assert_eq!(records[1].get("b"), Some(&json!("x")));
}

#[test]
fn ndjson_reports_line_of_invalid_json() {
    let body = "{\"a\":1}\n\n{not json}\n";
    match parse_ndjson(body) {
        Err(RecordError::Ndjson { line, .. }) => assert_eq!(line, 3),
        other => panic!("expected NDJSON error, got {other:?}"),
    }
}

#[test]
fn ndjson_skips_non_object_lines() {
    let body = "{\"a\":1}\n42\n[]\n[1,2]\nfalse\n\"\"\n\"text\"\n{\"a\":2}\n";
    let records = parse_ndjson(body).expect("non-object lines must not abort the parse");

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].get("a"), Some(&json!(1)));
    assert_eq!(records[1].get("a"), Some(&json!(2)));
}

#[test]
fn ndjson_empty_body_yields_no_records() {
    assert!(parse_ndjson("").expect("parse").is_empty());
    assert!(parse_ndjson("\n\n").expect("parse").is_empty());
}

#[test]
fn table_drops_administrative_columns() {
    let records = vec![
        record(json!({"host": "a", "isFinished": true, "offset": 0, "job": {"id": "j1"}})),
        record(json!({"host": "b", "totalEventCount": 2, "persistedEventCount": 2})),
    ];

    let table = TableBuilder::new("events").build(&records).expect("build failed");

    assert_eq!(table.name, "events");
    assert_eq!(table.column_names(), vec!["host"]);
    assert_eq!(table.height(), 2);
}

#[test]
fn dropping_absent_column_is_a_noop() {
    let records = vec![record(json!({"a": 1, "b": "x"}))];

    let table = TableBuilder::new("t")
        .drop_columns(["missing", "also_missing"])
        .build(&records)
        .expect("build failed");

    assert_eq!(table.column_names(), vec!["a", "b"]);
    assert_eq!(table.height(), 1);
}

#[test]
fn rows_with_only_empty_fields_are_dropped() {
    let records = vec![
        record(json!({"a": null, "b": ""})),
        record(json!({"a": null, "b": "kept"})),
        record(json!({"offset": 10})),
        record(json!({"a": 0})),
    ];

    let table = TableBuilder::new("t").build(&records).expect("build failed");

    assert_eq!(table.height(), 2);
    let b = table.frame.column("b").expect("b column");
    let b = b.str().expect("b is text");
    assert_eq!(b.get(0), Some("kept"));
    assert_eq!(b.get(1), None);
    let a = table.frame.column("a").expect("a column");
    assert_eq!(a.i64().expect("a is integer").get(1), Some(0));
}

#[test]
fn columns_follow_first_seen_order() {
    let records = vec![
        record(json!({"zeta": 1, "alpha": 2})),
        record(json!({"mid": 3, "zeta": 4})),
    ];

    let table = TableBuilder::new("t").build(&records).expect("build failed");
    assert_eq!(table.column_names(), vec!["zeta", "alpha", "mid"]);
}

#[test]
fn column_types_follow_json_values() {
    let records = vec![
        record(json!({"count": 1, "ratio": 1, "flag": true, "mixed": 1, "nested": {"k": 1}})),
        record(json!({"count": 2, "ratio": 0.5, "flag": false, "mixed": "two", "nested": [1, 2]})),
    ];

    let table = TableBuilder::new("t").build(&records).expect("build failed");
    let frame = &table.frame;

    assert_eq!(frame.column("count").unwrap().dtype(), &DataType::Int64);
    assert_eq!(frame.column("ratio").unwrap().dtype(), &DataType::Float64);
    assert_eq!(frame.column("flag").unwrap().dtype(), &DataType::Boolean);
    assert_eq!(frame.column("mixed").unwrap().dtype(), &DataType::String);

    let mixed = frame.column("mixed").unwrap();
    let mixed = mixed.str().unwrap();
    assert_eq!(mixed.get(0), Some("1"));
    assert_eq!(mixed.get(1), Some("two"));

    let nested = frame.column("nested").unwrap();
    let nested = nested.str().unwrap();
    assert_eq!(nested.get(0), Some("{\"k\":1}"));
    assert_eq!(nested.get(1), Some("[1,2]"));
}

#[test]
fn table_from_no_records_is_empty() {
    let table = TableBuilder::new("empty").build(&[]).expect("build failed");
    assert_eq!(table.height(), 0);
    assert!(table.column_names().is_empty());
}

#[test]
fn table_writes_csv_with_header() {
    let records = vec![record(json!({"a": 1, "b": "x"})), record(json!({"a": 2, "b": "y"}))];
    let table = TableBuilder::new("report").build(&records).expect("build failed");

    let dir = tempfile::tempdir().expect("tempdir");
    let path = TableFormat::Csv.output_path(dir.path(), &table);
    assert!(path.ends_with("report.csv"));

    write_table(&table, &path, TableFormat::Csv).expect("write failed");
    let written = fs::read_to_string(&path).expect("read back");
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines, vec!["a,b", "1,x", "2,y"]);
}

#[test]
fn table_writes_parquet_that_reads_back() {
    let records = vec![
        record(json!({"host": "a", "count": 1, "ok": true})),
        record(json!({"host": "b", "count": 2, "ok": false})),
    ];
    let table = TableBuilder::new("report").build(&records).expect("build failed");

    let dir = tempfile::tempdir().expect("tempdir");
    let path = TableFormat::Parquet.output_path(dir.path(), &table);
    assert!(path.ends_with("report.parquet"));

    write_table(&table, &path, TableFormat::Parquet).expect("write failed");
    let file = fs::File::open(&path).expect("open parquet");
    let read = ParquetReader::new(file).finish().expect("read parquet");

    assert_eq!(read.get_column_names(), table.frame.get_column_names());
    assert!(read.equals(&table.frame));
}

#[test]
fn table_writes_json_lines() {
    let records = vec![
        record(json!({"host": "a", "count": 1})),
        record(json!({"host": "b", "count": 2})),
    ];
    let table = TableBuilder::new("report").build(&records).expect("build failed");

    let dir = tempfile::tempdir().expect("tempdir");
    let path = TableFormat::Json.output_path(dir.path(), &table);
    assert!(path.ends_with("report.ndjson"));

    write_table(&table, &path, TableFormat::Json).expect("write failed");
    let written = fs::read_to_string(&path).expect("read back");
    let rows: Vec<serde_json::Value> = written
        .lines()
        .map(|line| serde_json::from_str(line).expect("line is JSON"))
        .collect();

    assert_eq!(
        rows,
        vec![json!({"host": "a", "count": 1}), json!({"host": "b", "count": 2})]
    );
}

#[test]
fn builder_exposes_dropped_columns() {
    let default = TableBuilder::new("t");
    assert_eq!(
        default.dropped_columns().to_vec(),
        vec!["isFinished", "offset", "persistedEventCount", "totalEventCount", "job"]
    );

    let custom = default.drop_columns(["host"]);
    assert_eq!(custom.dropped_columns().to_vec(), vec!["host"]);
}

#[test]
fn table_format_parses_known_names() {
    assert_eq!("CSV".parse::<TableFormat>().unwrap(), TableFormat::Csv);
    assert_eq!("parquet".parse::<TableFormat>().unwrap(), TableFormat::Parquet);
    assert_eq!("jsonl".parse::<TableFormat>().unwrap(), TableFormat::Json);
    assert!(matches!(
        "xlsx".parse::<TableFormat>(),
        Err(RecordError::UnknownFormat(_))
    ));
}

#[test]
fn directory_csv_has_header_when_empty() {
    let mut buffer = Vec::new();
    write_directory_csv(&mut buffer, &[]).expect("write failed");

    let text = String::from_utf8(buffer).expect("utf8");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        vec!["sAMAccountName,DisplayName,EmailAddress,Department,Title"]
    );
}

#[test]
fn directory_csv_writes_one_row_per_record() {
    let records = vec![
        DirectoryRecord {
            account_name: "jdoe".into(),
            display_name: "Doe, Jane".into(),
            email_address: "jdoe@example.com".into(),
            department: "Ops".into(),
            title: String::new(),
        },
        DirectoryRecord {
            account_name: "svc".into(),
            ..Default::default()
        },
    ];

    let mut buffer = Vec::new();
    write_directory_csv(&mut buffer, &records).expect("write failed");
    let text = String::from_utf8(buffer).expect("utf8");
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1], "jdoe,\"Doe, Jane\",jdoe@example.com,Ops,");
    assert_eq!(lines[2], "svc,,,,");
}

#[test]
fn directory_attributes_match_case_insensitively() {
    let mut attributes = HashMap::new();
    attributes.insert("samaccountname".to_string(), vec!["jdoe".to_string()]);
    attributes.insert("displayName".to_string(), vec!["Jane".to_string(), "J".to_string()]);
    attributes.insert("title".to_string(), Vec::new());

    let record = DirectoryRecord::from_attributes(&attributes);
    assert_eq!(record.account_name, "jdoe");
    assert_eq!(record.display_name, "Jane");
    assert_eq!(record.email_address, "");
    assert_eq!(record.title, "");
}
