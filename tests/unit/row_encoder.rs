//! Unit tests for cell rendering and row encoding

use serde_json::json;
use vuln_data_downloader::output::csv::{render_cell, EncodingError, RowEncoder};
use vuln_data_downloader::Schema;

#[test]
fn test_render_cell_rules() {
    assert_eq!(render_cell(None), "");
    assert_eq!(render_cell(Some(&json!(null))), "");
    assert_eq!(render_cell(Some(&json!(""))), "");
    assert_eq!(render_cell(Some(&json!([]))), "");
    assert_eq!(render_cell(Some(&json!({}))), "");

    assert_eq!(render_cell(Some(&json!(9.8))), "9.8");
    assert_eq!(render_cell(Some(&json!(7))), "7");
    assert_eq!(render_cell(Some(&json!("3.1"))), "3.1");
    assert_eq!(render_cell(Some(&json!("HIGH"))), "\"HIGH\"");
    assert_eq!(render_cell(Some(&json!("say \"hi\""))), "\"say \"\"hi\"\"\"");
    assert_eq!(render_cell(Some(&json!("a,b"))), "\"a,b\"");
    assert_eq!(render_cell(Some(&json!(true))), "\"true\"");
    assert_eq!(render_cell(Some(&json!(["x"]))), "\"[\"\"x\"\"]\"");
}

#[test]
fn test_counter_advances_once_per_row_with_index_columns() {
    let schema = Schema::parse("a:null\nid:cve,id\nb:null\n").unwrap();
    let encoder = RowEncoder::new(&schema);
    let mut counter = 1;

    let first = encoder.encode_record(&json!({ "cve": { "id": "CVE-1" } }), &mut counter);
    let second = encoder.encode_record(&json!({}), &mut counter);

    assert_eq!(first, vec!["1", "\"CVE-1\"", "1"]);
    assert_eq!(second, vec!["2", "", "2"]);
    assert_eq!(counter, 3);
}

#[test]
fn test_counter_untouched_without_index_column() {
    let schema = Schema::parse("id:cve,id\n").unwrap();
    let encoder = RowEncoder::new(&schema);
    let mut counter = 41;

    encoder.encode_record(&json!({ "cve": { "id": "CVE-1" } }), &mut counter);
    assert_eq!(counter, 41);
}

#[test]
fn test_encode_page_requires_collection_list() {
    let schema = Schema::default_nvd();
    let encoder = RowEncoder::new(&schema);
    let mut counter = 1;

    let missing = encoder.encode_page(&json!({ "totalResults": 0 }), &mut counter);
    assert!(matches!(missing, Err(EncodingError::MissingCollection(_))));

    let wrong = encoder.encode_page(&json!({ "vulnerabilities": { "a": 1 } }), &mut counter);
    assert!(matches!(wrong, Err(EncodingError::NotACollection { .. })));

    let empty = encoder
        .encode_page(&json!({ "vulnerabilities": [] }), &mut counter)
        .unwrap();
    assert!(empty.is_empty());
    assert_eq!(counter, 1);
}

#[test]
fn test_encoded_rows_always_have_every_column() {
    let schema = Schema::default_nvd();
    let encoder = RowEncoder::new(&schema);
    let mut counter = 1;

    let rows = encoder
        .encode_page(
            &json!({ "vulnerabilities": [{ "cve": { "id": "CVE-2020-0001" } }, "not an object", 5] }),
            &mut counter,
        )
        .unwrap();

    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.len() == 12));
    assert_eq!(rows[2][0], "3");
    assert!(rows[2][1..].iter().all(String::is_empty));
}
