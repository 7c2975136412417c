mod common;

use common::{LEDGER_FIELDS_YAML, TestWorkspace, ledger_fields, strings};
use encoding_rs::UTF_8;
use sheet_ingest::{
    batch::{Record, Submission},
    csv_store::{CsvTableStore, open_store},
    error::GatewayError,
    gateway::{TableGateway, TableId},
    ingest::{IngestOptions, ingest},
    observe::RecordingObserver,
};

fn ledger_store(workspace: &TestWorkspace, csv: &str) -> (CsvTableStore, TableId) {
    workspace.write("ledger.csv", csv);
    workspace.write("ledger.fields.yaml", LEDGER_FIELDS_YAML);
    (CsvTableStore::new(workspace.path()), TableId::new("ledger"))
}

#[test]
fn reads_header_fields_and_pads_short_rows() {
    let workspace = TestWorkspace::new();
    let (store, table) = ledger_store(
        &workspace,
        "ID,Date,Description,Amount,Category\n1,2024-01-10\n,,,,\n",
    );
    let fields = store.read_fields(&table).unwrap();
    assert_eq!(fields, ledger_fields_with_required());

    let snapshot = store.read_table(&table).unwrap();
    assert_eq!(snapshot.width(), 5);
    assert_eq!(snapshot.rows[0], strings(&["1", "2024-01-10", "", "", ""]));
    assert_eq!(snapshot.boundary(), 1);
    assert_eq!(store.allocated_rows(&table).unwrap(), 2);
}

#[test]
fn empty_line_in_file_bounds_the_populated_region() {
    let workspace = TestWorkspace::new();
    let (mut store, table) = ledger_store(
        &workspace,
        "ID,Date,Description,Amount,Category\n1,2024-01-10\n\nold,2023-01-01\n",
    );
    let snapshot = store.read_table(&table).unwrap();
    assert_eq!(snapshot.allocated_rows(), 3);
    assert_eq!(snapshot.boundary(), 1);

    let report = ingest(
        &mut store,
        &table,
        &Submission::flat(vec![Record::from([("id", "2"), ("date", "2024-01-20")])]),
        &IngestOptions::default(),
        &mut RecordingObserver::default(),
    )
    .unwrap();
    assert_eq!(report.insert_position, 1);
    let snapshot = store.read_table(&table).unwrap();
    assert_eq!(snapshot.boundary(), 2);
    assert_eq!(snapshot.rows[3][0], "old");
}

fn ledger_fields_with_required() -> Vec<sheet_ingest::fields::FieldConfig> {
    let mut fields = ledger_fields();
    fields[1].required = true;
    fields
}

#[test]
fn gap_and_write_persist_to_disk() {
    let workspace = TestWorkspace::new();
    let (mut store, table) = ledger_store(
        &workspace,
        "ID,Date,Description,Amount,Category\n1,2024-01-10,,,\n2,2024-01-20,,,\n",
    );
    store.open_gap(&table, 1, 1).unwrap();
    let cells = store
        .write_rows(&table, 1, &[strings(&["3", "2024-01-15", "", "5", ""])])
        .unwrap();
    assert_eq!(cells, 5);

    let reopened = CsvTableStore::new(workspace.path());
    let snapshot = reopened.read_table(&table).unwrap();
    let ids = snapshot
        .data_rows()
        .iter()
        .map(|row| row[0].as_str())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["1", "3", "2"]);
}

#[test]
fn ensure_capacity_appends_blank_rows_that_survive_reload() {
    let workspace = TestWorkspace::new();
    let (mut store, table) = ledger_store(&workspace, "ID,Date,Description,Amount,Category\n");
    store.ensure_capacity(&table, 4).unwrap();
    store.ensure_capacity(&table, 2).unwrap();
    assert_eq!(store.allocated_rows(&table).unwrap(), 4);
    let contents = workspace.read("ledger.csv");
    assert_eq!(contents.lines().count(), 5);
}

#[test]
fn write_past_capacity_is_rejected() {
    let workspace = TestWorkspace::new();
    let (mut store, table) = ledger_store(&workspace, "ID,Date,Description,Amount,Category\n");
    let err = store
        .write_rows(&table, 0, &[strings(&["1", "2024-01-01", "", "", ""])])
        .unwrap_err();
    assert!(matches!(err, GatewayError::OutOfRange { allocated: 0, .. }));
}

#[test]
fn missing_table_and_fields_are_reported() {
    let workspace = TestWorkspace::new();
    let store = CsvTableStore::new(workspace.path());
    let table = TableId::new("nowhere");
    assert!(matches!(
        store.read_table(&table),
        Err(GatewayError::TableNotFound(_))
    ));
    assert!(matches!(
        store.read_fields(&table),
        Err(GatewayError::TableNotFound(_))
    ));
}

#[test]
fn create_table_derives_header_and_capacity() {
    let workspace = TestWorkspace::new();
    let store = CsvTableStore::new(workspace.path());
    let table = TableId::new("ledger");
    store.create_table(&table, &ledger_fields(), 3).unwrap();

    let snapshot = store.read_table(&table).unwrap();
    assert_eq!(
        snapshot.header,
        strings(&["ID", "Date", "Description", "Amount", "Category"])
    );
    assert_eq!(snapshot.allocated_rows(), 3);
    assert_eq!(snapshot.boundary(), 0);
    assert_eq!(store.read_fields(&table).unwrap(), ledger_fields());
    assert!(store.create_table(&table, &ledger_fields(), 3).is_err());
}

#[test]
fn tsv_tables_use_tab_delimiter() {
    let workspace = TestWorkspace::new();
    workspace.write("ledger.tsv", "ID\tDate\n1\t2024-01-10\n");
    workspace.write(
        "ledger.fields.json",
        r#"[{"fieldName": "id", "type": "text", "order": 1},
            {"fieldName": "date", "type": "date", "order": 2}]"#,
    );
    let mut store = open_store(workspace.path(), None, UTF_8).unwrap();
    let table = TableId::new("ledger");
    let report = ingest(
        &mut store,
        &table,
        &Submission::flat(vec![Record::from([("id", "2"), ("date", "2024-01-11")])]),
        &IngestOptions::default(),
        &mut RecordingObserver::default(),
    )
    .unwrap();
    assert_eq!(report.insert_position, 1);
    assert!(workspace.read("ledger.tsv").contains("\"2\"\t\"2024-01-11\""));
}

#[test]
fn full_pipeline_keeps_file_sorted() {
    let workspace = TestWorkspace::new();
    let (mut store, table) = ledger_store(
        &workspace,
        "ID,Date,Description,Amount,Category\n1,2024-01-10,,,\n2,2024-01-20,,,\n3,2024-01-30,,,\n",
    );
    for (id, date) in [("4", "25/01/2024"), ("5", "2024-01-12"), ("6", "45306")] {
        ingest(
            &mut store,
            &table,
            &Submission::flat(vec![Record::from([("id", id), ("date", date)])]),
            &IngestOptions::default(),
            &mut RecordingObserver::default(),
        )
        .unwrap();
    }
    let snapshot = store.read_table(&table).unwrap();
    let ids = snapshot
        .data_rows()
        .iter()
        .map(|row| row[0].clone())
        .collect::<Vec<_>>();
    // 45306 is 2024-01-15.
    assert_eq!(ids, strings(&["1", "5", "6", "2", "4", "3"]));
    assert!(snapshot.allocated_rows() >= 106);
}

#[test]
fn open_store_rejects_missing_directory() {
    let workspace = TestWorkspace::new();
    assert!(open_store(&workspace.path().join("absent"), None, UTF_8).is_err());
}
