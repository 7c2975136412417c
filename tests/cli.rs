mod common;

use assert_cmd::Command;
use common::{LEDGER_FIELDS_YAML, TestWorkspace};
use predicates::{prelude::PredicateBooleanExt, str::contains};
use serde_json::Value;

fn sheet_ingest() -> Command {
    Command::cargo_bin("sheet-ingest").expect("binary exists")
}

fn init_ledger(workspace: &TestWorkspace) {
    let fields = workspace.write("ledger-fields.yaml", LEDGER_FIELDS_YAML);
    sheet_ingest()
        .args([
            "init",
            "-s",
            workspace.path_str(),
            "-t",
            "ledger",
            "-f",
            fields.to_str().unwrap(),
            "--capacity",
            "5",
        ])
        .assert()
        .success();
}

fn submit(workspace: &TestWorkspace, name: &str, body: &str) -> Value {
    let submission = workspace.write(name, body);
    let output = sheet_ingest()
        .args([
            "submit",
            "-s",
            workspace.path_str(),
            "-t",
            "ledger",
            "-i",
            submission.to_str().unwrap(),
        ])
        .output()
        .expect("run submit");
    assert!(output.status.success(), "submit failed: {output:?}");
    serde_json::from_slice(&output.stdout).expect("json response")
}

#[test]
fn init_creates_table_and_field_config() {
    let workspace = TestWorkspace::new();
    init_ledger(&workspace);
    let table = workspace.read("ledger.csv");
    let mut lines = table.lines();
    assert_eq!(
        lines.next(),
        Some("\"ID\",\"Date\",\"Description\",\"Amount\",\"Category\"")
    );
    assert_eq!(lines.count(), 5);
    assert!(workspace.read("ledger.fields.yaml").contains("fieldName: date"));
}

#[test]
fn submit_orders_rows_by_date() {
    let workspace = TestWorkspace::new();
    init_ledger(&workspace);

    let first = submit(
        &workspace,
        "a.json",
        r#"{"records": [{"id": "1", "date": "2024-01-10", "amount": 5}]}"#,
    );
    assert_eq!(first["status"], "success");
    assert_eq!(first["insert_position"], 0);
    assert_eq!(first["placement"], "empty_table");

    submit(
        &workspace,
        "b.json",
        r#"{"records": [{"id": "2", "date": "20/01/2024"}]}"#,
    );
    let third = submit(
        &workspace,
        "c.json",
        r#"{"records": [{"id": "3", "date": "2024-01-15"}]}"#,
    );
    assert_eq!(third["insert_position"], 1);
    assert_eq!(third["rows_inserted"], 1);
    assert_eq!(third["cells_updated"], 5);

    sheet_ingest()
        .args(["preview", "-s", workspace.path_str(), "-t", "ledger"])
        .assert()
        .success()
        .stdout(contains("0  1").and(contains("1  3")).and(contains("2  2")));
}

#[test]
fn locate_does_not_modify_the_table() {
    let workspace = TestWorkspace::new();
    init_ledger(&workspace);
    submit(
        &workspace,
        "a.json",
        r#"{"records": [{"id": "1", "date": "2024-01-10"}, {"id": "2", "date": "2024-01-20"}]}"#,
    );
    let before = workspace.read("ledger.csv");
    let probe = workspace.write("p.json", r#"{"records": [{"id": "9", "date": "2024-01-12"}]}"#);

    let output = sheet_ingest()
        .args([
            "locate",
            "-s",
            workspace.path_str(),
            "-t",
            "ledger",
            "-i",
            probe.to_str().unwrap(),
        ])
        .output()
        .expect("run locate");
    assert!(output.status.success());
    let plan: Value = serde_json::from_slice(&output.stdout).expect("plan json");
    assert_eq!(plan["plan"]["position"], 1);
    assert_eq!(plan["plan"]["boundary"], 2);
    assert_eq!(plan["plan"]["sort_column"], 1);
    assert_eq!(workspace.read("ledger.csv"), before);
}

#[test]
fn submit_reports_structured_failure_for_empty_batch() {
    let workspace = TestWorkspace::new();
    init_ledger(&workspace);
    let submission = workspace.write("empty.json", r#"{"records": []}"#);
    sheet_ingest()
        .args([
            "submit",
            "-s",
            workspace.path_str(),
            "-t",
            "ledger",
            "-i",
            submission.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stdout(contains("\"status\": \"failure\"").and(contains("empty_batch")))
        .stderr(contains("no records"));
}

#[test]
fn submit_reads_sectioned_submission_from_stdin() {
    let workspace = TestWorkspace::new();
    workspace.write(
        "sales.fields.yaml",
        r#"fields:
  - {fieldName: date, label: Date, type: date, order: 1, section: header, repeatAcrossRows: true}
  - {fieldName: customer, label: Customer, type: text, order: 2, section: header}
  - {fieldName: product, label: Product, type: dropdown, order: 3, section: lineitem}
  - {fieldName: qty, label: Qty, type: number, order: 4, section: lineitem}
"#,
    );
    workspace.write("sales.csv", "Date,Customer,Product,Qty\n");
    sheet_ingest()
        .args([
            "submit",
            "-s",
            workspace.path_str(),
            "-t",
            "sales",
            "-i",
            "-",
            "--format",
            "table",
        ])
        .write_stdin(
            r#"{"header": {"date": "2024-03-05", "customer": "C-9"},
                "line_items": [{"product": "A", "qty": 1}, {"product": "B", "qty": 2}]}"#,
        )
        .assert()
        .success()
        .stdout(contains("rows_inserted").and(contains("success")));

    let table = workspace.read("sales.csv");
    assert!(table.contains("\"2024-03-05\",\"C-9\",\"A\",\"1\""));
    assert!(table.contains("\"2024-03-05\",\"\",\"B\",\"2\""));
}

#[test]
fn fields_lists_mapping_status() {
    let workspace = TestWorkspace::new();
    workspace.write("t.csv", "A,B\n");
    workspace.write(
        "t.fields.yaml",
        r#"- {fieldName: when, type: date, order: 2}
- {fieldName: posted, type: date, order: 2}
- {fieldName: name, type: text, order: 1}
- {fieldName: name, type: text, order: 2}
- {fieldName: extra, type: text, order: 7}
- {fieldName: junk, type: text, order: abc}
"#,
    );
    let output = sheet_ingest()
        .args(["fields", "-s", workspace.path_str(), "-t", "t"])
        .output()
        .expect("run fields");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("utf8 output");
    assert_eq!(stdout.matches("sort column").count(), 1);
    assert_eq!(stdout.matches("overridden").count(), 1);
    assert!(stdout.contains("out of range"));
    assert!(stdout.contains("invalid order"));
    assert!(stdout.contains("2 (B)"));
}

#[test]
fn missing_store_fails_cleanly() {
    let workspace = TestWorkspace::new();
    let absent = workspace.path().join("absent");
    sheet_ingest()
        .args(["preview", "-s", absent.to_str().unwrap(), "-t", "ledger"])
        .assert()
        .failure()
        .stderr(contains("error:"));
}

#[test]
fn init_rejects_oversized_order() {
    let workspace = TestWorkspace::new();
    let fields = workspace.write(
        "wide.fields.yaml",
        "- {fieldName: a, type: text, order: 4000000000000}\n",
    );
    sheet_ingest()
        .args([
            "init",
            "-s",
            workspace.path_str(),
            "-t",
            "wide",
            "-f",
            fields.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(contains("limited to"));
    assert!(!workspace.path().join("wide.csv").exists());
}
