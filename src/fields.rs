//! Field configuration model and persistence.
//!
//! A table's field list describes, for every logical form field, which column
//! of the destination table it lands in (`order`, 1-based), what kind of input
//! produced it, and whether it belongs to the once-per-submission header or to
//! the repeatable line items.
//!
//! Field lists are stored as YAML (or JSON, by extension) next to the table and
//! are re-read for every submission.

use std::{
    fmt,
    fs,
    path::Path,
    str::FromStr,
};

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Number,
    Date,
    Dropdown,
    Checkbox,
    Textarea,
    Image,
    Period,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::Dropdown => "dropdown",
            FieldType::Checkbox => "checkbox",
            FieldType::Textarea => "textarea",
            FieldType::Image => "image",
            FieldType::Period => "period",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Header,
    LineItem,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Header => "header",
            Section::LineItem => "lineitem",
        }
    }
}

impl FromStr for Section {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "header" => Ok(Section::Header),
            "lineitem" | "line_item" | "line-item" => Ok(Section::LineItem),
            other => Err(anyhow!("Unknown section '{other}'")),
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `order` attribute exactly as configured.
///
/// Configuration sheets are hand-edited, so the value may be a number, a
/// numeric string, or junk. The raw text is kept so diagnostics can echo it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOrder(String);

impl FieldOrder {
    pub fn new(raw: impl Into<String>) -> Self {
        FieldOrder(raw.into())
    }

    pub fn raw(&self) -> &str {
        &self.0
    }

    /// The configured 1-based position, if the raw value is an integer.
    pub fn position(&self) -> Option<i64> {
        self.0.trim().parse::<i64>().ok()
    }

    /// Zero-based destination column, if it falls inside `0..width`.
    pub fn column_index(&self, width: usize) -> Option<usize> {
        let index = self.position()?.checked_sub(1)?;
        let index = usize::try_from(index).ok()?;
        (index < width).then_some(index)
    }
}

impl From<i64> for FieldOrder {
    fn from(value: i64) -> Self {
        FieldOrder(value.to_string())
    }
}

impl From<i32> for FieldOrder {
    fn from(value: i32) -> Self {
        FieldOrder(value.to_string())
    }
}

impl From<&str> for FieldOrder {
    fn from(value: &str) -> Self {
        FieldOrder(value.to_string())
    }
}

impl fmt::Display for FieldOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for FieldOrder {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.position() {
            Some(position) => serializer.serialize_i64(position),
            None => serializer.serialize_str(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for FieldOrder {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawOrder {
            Int(i64),
            Float(f64),
            Text(String),
        }

        match RawOrder::deserialize(deserializer)? {
            RawOrder::Int(value) => Ok(FieldOrder(value.to_string())),
            RawOrder::Float(value) => Ok(FieldOrder(value.to_string())),
            RawOrder::Text(value) => Ok(FieldOrder(value)),
        }
    }
}

fn deserialize_section<'de, D>(deserializer: D) -> Result<Option<Section>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => Section::from_str(value)
            .map(Some)
            .map_err(|err| de::Error::custom(err.to_string())),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldConfig {
    #[serde(alias = "field_name", alias = "name")]
    pub field_name: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub order: FieldOrder,
    #[serde(
        default,
        deserialize_with = "deserialize_section",
        skip_serializing_if = "Option::is_none"
    )]
    pub section: Option<Section>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, alias = "repeat_across_rows", skip_serializing_if = "is_false")]
    pub repeat_across_rows: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl FieldConfig {
    pub fn new(field_name: &str, field_type: FieldType, order: impl Into<FieldOrder>) -> Self {
        FieldConfig {
            field_name: field_name.to_string(),
            label: field_name.to_string(),
            field_type,
            order: order.into(),
            section: None,
            required: false,
            repeat_across_rows: false,
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn in_section(mut self, section: Section) -> Self {
        self.section = Some(section);
        self
    }

    pub fn repeating(mut self) -> Self {
        self.repeat_across_rows = true;
        self
    }

    pub fn display_label(&self) -> &str {
        if self.label.trim().is_empty() {
            &self.field_name
        } else {
            &self.label
        }
    }
}

/// Top-level document wrapper; a bare list is accepted as well.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FieldDocument {
    Wrapped { fields: Vec<FieldConfig> },
    Bare(Vec<FieldConfig>),
}

impl FieldDocument {
    fn into_fields(self) -> Vec<FieldConfig> {
        match self {
            FieldDocument::Wrapped { fields } | FieldDocument::Bare(fields) => fields,
        }
    }
}

#[derive(Serialize)]
struct FieldDocumentOut<'a> {
    fields: &'a [FieldConfig],
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

pub fn parse_fields_yaml(contents: &str) -> Result<Vec<FieldConfig>> {
    let document: FieldDocument =
        serde_yaml::from_str(contents).context("Parsing field configuration YAML")?;
    Ok(document.into_fields())
}

pub fn parse_fields_json(contents: &str) -> Result<Vec<FieldConfig>> {
    let document: FieldDocument =
        serde_json::from_str(contents).context("Parsing field configuration JSON")?;
    Ok(document.into_fields())
}

pub fn load_fields(path: &Path) -> Result<Vec<FieldConfig>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("Opening field config {path:?}"))?;
    let parsed = if is_json(path) {
        parse_fields_json(&contents)
    } else {
        parse_fields_yaml(&contents)
    };
    parsed.with_context(|| format!("Loading field config {path:?}"))
}

pub fn fields_to_yaml(fields: &[FieldConfig]) -> Result<String> {
    serde_yaml::to_string(&FieldDocumentOut { fields }).context("Serializing field configuration")
}

pub fn save_fields(fields: &[FieldConfig], path: &Path) -> Result<()> {
    let rendered = if is_json(path) {
        serde_json::to_string_pretty(&FieldDocumentOut { fields })
            .context("Serializing field configuration")?
    } else {
        fields_to_yaml(fields)?
    };
    fs::write(path, rendered).with_context(|| format!("Writing field config {path:?}"))
}

/// Widest header a table may be created with (column `ZZZ` in spreadsheet
/// lettering).
pub const MAX_COLUMNS: usize = 18_278;

/// Header labels for a fresh table: each field's label at column `order - 1`.
pub fn header_from_fields(fields: &[FieldConfig]) -> Result<Vec<String>> {
    let widest = fields
        .iter()
        .filter_map(|field| field.order.position().map(|position| (field, position)))
        .filter(|(_, position)| *position > 0)
        .max_by_key(|(_, position)| *position);
    let width = match widest {
        None => 0,
        Some((field, position)) => match usize::try_from(position) {
            Ok(width) if width <= MAX_COLUMNS => width,
            _ => bail!(
                "Field '{}' has order {} but tables are limited to {} columns",
                field.field_name,
                position,
                MAX_COLUMNS
            ),
        },
    };
    let mut header = vec![String::new(); width];
    for field in fields {
        if let Some(index) = field.order.column_index(width) {
            if header[index].is_empty() {
                header[index] = field.display_label().to_string();
            }
        }
    }
    Ok(header)
}
