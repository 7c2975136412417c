#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use sheet_ingest::fields::{FieldConfig, FieldType, Section};
use tempfile::{TempDir, tempdir};

/// Scratch table store that cleans up automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn path_str(&self) -> &str {
        self.path().to_str().expect("utf-8 temp path")
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, contents).expect("write temp file contents");
        path
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.temp_dir.path().join(name)).expect("read temp file")
    }
}

pub fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Five-column general ledger: id, date, description, amount, category.
pub fn ledger_fields() -> Vec<FieldConfig> {
    vec![
        FieldConfig::new("id", FieldType::Text, 1).with_label("ID"),
        FieldConfig::new("date", FieldType::Date, 2).with_label("Date"),
        FieldConfig::new("description", FieldType::Textarea, 3).with_label("Description"),
        FieldConfig::new("amount", FieldType::Number, 4).with_label("Amount"),
        FieldConfig::new("category", FieldType::Dropdown, 5).with_label("Category"),
    ]
}

pub fn ledger_header() -> Vec<String> {
    strings(&["ID", "Date", "Description", "Amount", "Category"])
}

/// Sales form: date, customer and note in the header, product and qty per item.
pub fn sales_fields() -> Vec<FieldConfig> {
    vec![
        FieldConfig::new("date", FieldType::Date, 1)
            .with_label("Date")
            .in_section(Section::Header),
        FieldConfig::new("customer", FieldType::Text, 2)
            .with_label("Customer")
            .in_section(Section::Header),
        FieldConfig::new("note", FieldType::Textarea, 3)
            .with_label("Note")
            .in_section(Section::Header),
        FieldConfig::new("product", FieldType::Dropdown, 4)
            .with_label("Product")
            .in_section(Section::LineItem),
        FieldConfig::new("qty", FieldType::Number, 5)
            .with_label("Qty")
            .in_section(Section::LineItem),
    ]
}

pub const LEDGER_FIELDS_YAML: &str = r#"fields:
  - fieldName: id
    label: ID
    type: text
    order: 1
  - fieldName: date
    label: Date
    type: date
    order: 2
    required: true
  - fieldName: description
    label: Description
    type: textarea
    order: 3
  - fieldName: amount
    label: Amount
    type: number
    order: 4
  - fieldName: category
    label: Category
    type: dropdown
    order: 5
"#;
