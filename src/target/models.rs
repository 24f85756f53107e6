//! Smartsheet REST wire model.
//!
//! Only the fields the migration touches are modeled. Serialization follows
//! the API's camelCase convention; optional fields are omitted when unset so
//! create/update payloads stay minimal.

use serde::{Deserialize, Serialize};

/// Smartsheet cell format descriptor for currency (2 decimals, $ symbol).
pub const CURRENCY_FORMAT: &str = ",,,,,,,,,,,13,2,1,2,,";

/// Column types, including the system-owned ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColumnType {
    TextNumber,
    Date,
    Datetime,
    Checkbox,
    ContactList,
    MultiContactList,
    Picklist,
    MultiPicklist,
    Predecessor,
    Duration,
    AutoNumber,
    CreatedDate,
    ModifiedDate,
    CreatedBy,
    ModifiedBy,
}

impl ColumnType {
    /// System columns are target-owned; their cells are never written.
    pub fn is_system(&self) -> bool {
        matches!(
            self,
            Self::AutoNumber
                | Self::CreatedDate
                | Self::ModifiedDate
                | Self::CreatedBy
                | Self::ModifiedBy
        )
    }
}

/// A contact (project owner, work resource). At least one of the two fields
/// is present — fully empty contacts are dropped during transformation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Contact {
    pub fn new(name: Option<String>, email: Option<String>) -> Option<Self> {
        let name = name.filter(|s| !s.trim().is_empty());
        let email = email.filter(|s| !s.trim().is_empty());
        if name.is_none() && email.is_none() {
            None
        } else {
            Some(Self { name, email })
        }
    }
}

/// Multi-value cell payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "objectType")]
pub enum ObjectValue {
    #[serde(rename = "MULTI_CONTACT")]
    MultiContact { values: Vec<Contact> },
    #[serde(rename = "MULTI_PICKLIST")]
    MultiPicklist { values: Vec<String> },
}

/// A single cell in a row payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    pub column_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_value: Option<ObjectValue>,
    /// `false` enables lenient validation: the write tolerates values the
    /// picklist has not caught up to yet (read-after-write lag on freshly
    /// populated reference sheets).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
}

impl Cell {
    pub fn text(column_id: u64, value: impl Into<String>) -> Self {
        Self::value(column_id, serde_json::Value::String(value.into()))
    }

    pub fn number(column_id: u64, value: f64) -> Self {
        let n = serde_json::Number::from_f64(value)
            .unwrap_or_else(|| serde_json::Number::from(0));
        Self::value(column_id, serde_json::Value::Number(n))
    }

    pub fn checkbox(column_id: u64, value: bool) -> Self {
        Self::value(column_id, serde_json::Value::Bool(value))
    }

    pub fn value(column_id: u64, value: serde_json::Value) -> Self {
        Self {
            column_id,
            value: Some(value),
            object_value: None,
            strict: None,
        }
    }

    pub fn contact(column_id: u64, contact: Contact) -> Self {
        // Email is the canonical contact value; name-only contacts fall back
        // to the display name.
        Self {
            column_id,
            value: contact
                .email
                .or(contact.name)
                .map(serde_json::Value::String),
            object_value: None,
            strict: None,
        }
    }

    pub fn multi_contact(column_id: u64, values: Vec<Contact>) -> Self {
        Self {
            column_id,
            value: None,
            object_value: Some(ObjectValue::MultiContact { values }),
            strict: None,
        }
    }

    pub fn multi_picklist(column_id: u64, values: Vec<String>) -> Self {
        Self {
            column_id,
            value: None,
            object_value: Some(ObjectValue::MultiPicklist { values }),
            strict: None,
        }
    }

    /// Mark the write lenient (`strict: false`).
    pub fn lenient(mut self) -> Self {
        self.strict = Some(false);
        self
    }
}

/// A row payload. `id` is set on reads and updates, absent on creates;
/// exactly one location hint (`parent_id` / `to_bottom`) is set on creates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_number: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_bottom: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn at_bottom(cells: Vec<Cell>) -> Self {
        Self {
            to_bottom: Some(true),
            cells,
            ..Default::default()
        }
    }

    pub fn under_parent(parent_id: u64, cells: Vec<Cell>) -> Self {
        Self {
            parent_id: Some(parent_id),
            to_bottom: Some(true),
            cells,
            ..Default::default()
        }
    }

    /// The cell for a given column, if present.
    pub fn cell(&self, column_id: u64) -> Option<&Cell> {
        self.cells.iter().find(|c| c.column_id == column_id)
    }
}

/// Auto-number display format. Only the prefix is used here; the fill
/// pattern is fixed to four digits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoNumberFormat {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
}

impl AutoNumberFormat {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(format!("{}-", prefix.into())),
            fill: Some("0000".into()),
        }
    }
}

/// Cross-sheet picklist source: options come from a column in a reference
/// sheet (a PMO Standards sheet) instead of a literal list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSheetRef {
    pub sheet_id: u64,
    pub column_id: u64,
}

/// A column, both as read from the API and as a creation spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub title: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_number_format: Option<AutoNumberFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_sheet_ref: Option<SourceSheetRef>,
    /// `true` when cell values must match the option list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<bool>,
}

impl Column {
    pub fn new(title: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            id: None,
            title: title.into(),
            column_type,
            primary: None,
            index: None,
            hidden: None,
            options: None,
            auto_number_format: None,
            format: None,
            source_sheet_ref: None,
            validation: None,
        }
    }

    pub fn primary(mut self) -> Self {
        self.primary = Some(true);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = Some(true);
        self
    }

    pub fn at_index(mut self, index: i64) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_auto_number(mut self, prefix: &str) -> Self {
        self.auto_number_format = Some(AutoNumberFormat::with_prefix(prefix));
        self
    }

    pub fn currency(mut self) -> Self {
        self.format = Some(CURRENCY_FORMAT.into());
        self
    }
}

/// A sheet with columns and (when fetched with rows) its rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sheet {
    pub id: u64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permalink: Option<String>,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub rows: Vec<Row>,
}

impl Sheet {
    /// Exact-title column lookup.
    pub fn column_by_title(&self, title: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.title == title)
    }

    /// The primary column. Every sheet has exactly one.
    pub fn primary_column(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.primary == Some(true))
    }
}

/// Creation spec for a sheet.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetSpec {
    pub name: String,
    pub columns: Vec<Column>,
}

/// A workspace. Uniquely identified by name within the tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: u64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permalink: Option<String>,
    /// Caller's access level (`OWNER`, `ADMIN`, `EDITOR`, ...), when the API
    /// reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_level: Option<String>,
}

/// Lightweight listing entry for a workspace child.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetInfo {
    pub id: u64,
    pub name: String,
}
