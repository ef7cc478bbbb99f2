//! Unit tests for schema files and field projection

use serde_json::json;
use std::fs;
use tempfile::TempDir;
use vuln_data_downloader::schema::{project, ColumnSpec, FieldKey, Schema, SchemaError};

#[test]
fn test_load_from_file_skips_comments_and_blank_lines() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("columns.schema");
    fs::write(
        &path,
        "# NVD export\nrow:null\n\ncveId:cve,id\n  score : cve,metrics,cvssMetricV31,0,cvssData,baseScore\n",
    )
    .unwrap();

    let schema = Schema::load(&path).unwrap();
    assert_eq!(schema.column_names(), vec!["row", "cveId", "score"]);
    assert!(schema.has_row_index());
    match &schema.columns()[2].spec {
        ColumnSpec::FieldPath(path) => {
            assert_eq!(path.len(), 6);
            assert_eq!(path[3], FieldKey::Index(0));
            assert_eq!(path[5], FieldKey::Key("baseScore".to_string()));
        }
        other => panic!("unexpected spec {other:?}"),
    }
}

#[test]
fn test_load_missing_file_is_load_error() {
    let temp_dir = TempDir::new().unwrap();
    let err = Schema::load(temp_dir.path().join("nope.schema")).unwrap_err();
    assert!(matches!(err, SchemaError::Load { .. }));
}

#[test]
fn test_format_errors_report_line_numbers() {
    let cases = [
        ("a:null\nno separator\n", 2),
        ("a:null\n:cve,id\n", 2),
        ("a:cve,,id\n", 1),
        ("a:null\nb:null,cve\n", 2),
        ("id:cve,id\nx:null\nid:cve,sourceIdentifier\n", 3),
    ];

    for (text, expected_line) in cases {
        match Schema::parse(text) {
            Err(SchemaError::Format { line, .. }) => {
                assert_eq!(line, expected_line, "wrong line for {text:?}")
            }
            other => panic!("expected format error for {text:?}, got {other:?}"),
        }
    }
}

#[test]
fn test_default_schema_description_round_trips() {
    let schema = Schema::default_nvd();
    let text = schema.to_description();
    assert!(text.starts_with("index:null\ncveId:cve,id\n"));
    assert_eq!(Schema::parse(&text).unwrap(), schema);
}

#[test]
fn test_projection_is_absent_iff_a_step_fails() {
    let record = json!({
        "cve": {
            "id": "CVE-2021-44228",
            "metrics": { "cvssMetricV31": [{ "cvssData": { "baseScore": 10.0 } }] },
            "weaknesses": []
        }
    });
    let key = |k: &str| FieldKey::Key(k.to_string());

    assert_eq!(
        project(&record, &[key("cve"), key("id")]),
        Some(&json!("CVE-2021-44228"))
    );
    assert_eq!(
        project(
            &record,
            &[key("cve"), key("metrics"), key("cvssMetricV31"), FieldKey::Index(0), key("cvssData"), key("baseScore")]
        ),
        Some(&json!(10.0))
    );
    assert_eq!(project(&record, &[]), Some(&record));

    // missing key, out of range, index into object, key into array, step past a scalar
    assert!(project(&record, &[key("cve"), key("missing")]).is_none());
    assert!(project(&record, &[key("cve"), key("weaknesses"), FieldKey::Index(0)]).is_none());
    assert!(project(&record, &[key("cve"), FieldKey::Index(0)]).is_none());
    assert!(project(&record, &[key("cve"), key("metrics"), key("cvssMetricV31"), key("0")]).is_none());
    assert!(project(&record, &[key("cve"), key("id"), key("deeper")]).is_none());
}
