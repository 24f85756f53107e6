//! Custom field discovery, column planning, and value resolution.

use crate::source::models::{field_type, CustomFieldDef};
use crate::target::models::{Cell, ColumnType};
use crate::transform::dates::to_target_date;
use crate::transform::duration::{parse_hours, to_work_text};
use crate::transform::sanitize::sanitize_name;
use std::collections::HashMap;

/// Column-title prefix for all custom fields.
const TITLE_PREFIX: &str = "Custom - ";

/// Hard cap on the full column title.
const MAX_TITLE_LEN: usize = 50;

/// A custom field that earned a column: at least one entity carries a
/// non-empty value for it.
#[derive(Debug, Clone)]
pub struct PlannedCustomColumn {
    pub def: CustomFieldDef,
    pub title: String,
    pub column_type: ColumnType,
}

/// A resolved custom field cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum CustomValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Date(String),
    Multi(Vec<String>),
    Empty,
}

impl CustomValue {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Multi(v) => v.is_empty(),
            _ => false,
        }
    }
}

/// Expand an internal property name for display: strip the `Custom_` prefix
/// and split camel-case and letter/digit boundaries.
pub fn expand_internal_name(internal: &str) -> String {
    let stripped = internal
        .strip_prefix("Custom_")
        .unwrap_or(internal);

    let mut out = String::with_capacity(stripped.len() + 8);
    let mut prev: Option<char> = None;
    for c in stripped.chars() {
        if c == '_' {
            if !out.ends_with(' ') {
                out.push(' ');
            }
            prev = Some(' ');
            continue;
        }
        if let Some(p) = prev {
            let camel = c.is_ascii_uppercase() && p.is_ascii_lowercase();
            let to_digit = c.is_ascii_digit() && p.is_ascii_alphabetic();
            let from_digit = c.is_ascii_alphabetic() && p.is_ascii_digit();
            if (camel || to_digit || from_digit) && !out.ends_with(' ') {
                out.push(' ');
            }
        }
        out.push(c);
        prev = Some(c);
    }
    out.trim().to_string()
}

/// The human label for a field: display name when present, expanded internal
/// name otherwise.
pub fn field_label(def: &CustomFieldDef) -> String {
    def.display_name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| expand_internal_name(&def.internal_name))
}

/// Full column title: `Custom - <label>`, sanitized and capped at 50 chars.
pub fn column_title(def: &CustomFieldDef) -> String {
    let label = sanitize_name(&field_label(def));
    let mut title = format!("{TITLE_PREFIX}{label}");
    if title.chars().count() > MAX_TITLE_LEN {
        title = title.chars().take(MAX_TITLE_LEN).collect();
        title = title.trim_end().to_string();
    }
    title
}

/// Map the source field-type code to a target column type.
pub fn column_type_for(def: &CustomFieldDef) -> ColumnType {
    if def.has_lookup() {
        return if def.is_multi_select {
            ColumnType::MultiPicklist
        } else {
            ColumnType::Picklist
        };
    }
    if def.is_formula() {
        // Formula results materialize as static values.
        return ColumnType::TextNumber;
    }
    match def.field_type {
        field_type::DATE | field_type::START | field_type::FINISH => ColumnType::Date,
        field_type::FLAG => ColumnType::Checkbox,
        // Number, cost, duration, and text all land in TEXT_NUMBER; cost
        // additionally gets the currency column format.
        _ => ColumnType::TextNumber,
    }
}

/// Whether the column spec should carry the currency format.
pub fn is_currency(def: &CustomFieldDef) -> bool {
    !def.has_lookup() && def.field_type == field_type::COST
}

/// Discover the columns to create: unique fields (by id) that at least one
/// entity carries a non-empty value for. Fields present on entities but
/// absent from the schema get a synthetic text definition.
pub fn plan_columns(
    defs: &[CustomFieldDef],
    entity_values: &[Vec<(String, serde_json::Value)>],
) -> Vec<PlannedCustomColumn> {
    let by_internal: HashMap<&str, &CustomFieldDef> = defs
        .iter()
        .map(|d| (d.internal_name.as_str(), d))
        .collect();

    let mut seen_ids: Vec<String> = Vec::new();
    let mut planned: Vec<PlannedCustomColumn> = Vec::new();

    for values in entity_values {
        for (internal, value) in values {
            let def = match by_internal.get(internal.as_str()) {
                Some(def) => (*def).clone(),
                None => synthetic_def(internal),
            };
            if seen_ids.contains(&def.id) {
                continue;
            }
            if resolve_value(&def, value).is_empty() {
                continue;
            }
            seen_ids.push(def.id.clone());
            planned.push(PlannedCustomColumn {
                title: column_title(&def),
                column_type: column_type_for(&def),
                def,
            });
        }
    }

    planned.sort_by(|a, b| a.title.cmp(&b.title));
    planned
}

fn synthetic_def(internal: &str) -> CustomFieldDef {
    CustomFieldDef {
        id: internal.to_string(),
        internal_name: internal.to_string(),
        display_name: None,
        field_type: field_type::TEXT,
        is_multi_select: false,
        is_multiline: false,
        formula: None,
        entity_type: None,
        lookup_entries: None,
    }
}

/// Resolve a raw entity value against the field definition.
///
/// Lookup fields carry either an entry-id string or `{results: [entryId,…]}`;
/// entry ids are replaced by display values, unresolved ids pass through
/// unchanged with a warning.
pub fn resolve_value(def: &CustomFieldDef, raw: &serde_json::Value) -> CustomValue {
    if raw.is_null() {
        return CustomValue::Empty;
    }

    if def.has_lookup() {
        return resolve_lookup(def, raw);
    }

    match def.field_type {
        field_type::FLAG => match raw {
            serde_json::Value::Bool(b) => CustomValue::Bool(*b),
            serde_json::Value::Number(n) => CustomValue::Bool(n.as_i64() == Some(1)),
            serde_json::Value::String(s) => {
                CustomValue::Bool(s.eq_ignore_ascii_case("true") || s == "1")
            }
            _ => CustomValue::Empty,
        },
        field_type::DATE | field_type::START | field_type::FINISH => match raw.as_str() {
            Some(s) if !s.trim().is_empty() => match to_target_date(s) {
                Ok(date) => CustomValue::Date(date),
                Err(err) => {
                    tracing::warn!(field = %def.internal_name, %err, "dropping unparseable date value");
                    CustomValue::Empty
                }
            },
            _ => CustomValue::Empty,
        },
        field_type::DURATION => match raw.as_str() {
            Some(s) if !s.trim().is_empty() => match parse_hours(s) {
                Ok(hours) => CustomValue::Text(to_work_text(hours)),
                Err(_) => CustomValue::Text(s.to_string()),
            },
            _ => number_or_text(raw),
        },
        field_type::NUMBER | field_type::COST => number_or_text(raw),
        _ => match raw {
            serde_json::Value::String(s) if s.trim().is_empty() => CustomValue::Empty,
            serde_json::Value::String(s) => CustomValue::Text(s.clone()),
            other => number_or_text(other),
        },
    }
}

fn number_or_text(raw: &serde_json::Value) -> CustomValue {
    match raw {
        serde_json::Value::Number(n) => {
            CustomValue::Number(n.as_f64().unwrap_or_default())
        }
        serde_json::Value::String(s) if s.trim().is_empty() => CustomValue::Empty,
        serde_json::Value::String(s) => match s.parse::<f64>() {
            Ok(n) => CustomValue::Number(n),
            Err(_) => CustomValue::Text(s.clone()),
        },
        serde_json::Value::Bool(b) => CustomValue::Bool(*b),
        _ => CustomValue::Empty,
    }
}

fn resolve_lookup(def: &CustomFieldDef, raw: &serde_json::Value) -> CustomValue {
    let map = def.lookup_map();
    let resolve_one = |id: &str| -> String {
        match map.get(id) {
            Some(display) => (*display).to_string(),
            None => {
                tracing::warn!(
                    field = %def.internal_name,
                    entry = id,
                    "lookup entry not found; passing value through unchanged"
                );
                id.to_string()
            }
        }
    };

    match raw {
        serde_json::Value::String(s) if s.trim().is_empty() => CustomValue::Empty,
        serde_json::Value::String(s) => {
            if def.is_multi_select {
                CustomValue::Multi(vec![resolve_one(s)])
            } else {
                CustomValue::Text(resolve_one(s))
            }
        }
        serde_json::Value::Object(obj) => match obj.get("results").and_then(|r| r.as_array()) {
            Some(entries) => {
                let values: Vec<String> = entries
                    .iter()
                    .filter_map(|e| e.as_str())
                    .map(resolve_one)
                    .collect();
                if values.is_empty() {
                    CustomValue::Empty
                } else if def.is_multi_select {
                    CustomValue::Multi(values)
                } else {
                    CustomValue::Text(values.join(", "))
                }
            }
            None => CustomValue::Empty,
        },
        serde_json::Value::Array(entries) => {
            let values: Vec<String> = entries
                .iter()
                .filter_map(|e| e.as_str())
                .map(resolve_one)
                .collect();
            if values.is_empty() {
                CustomValue::Empty
            } else {
                CustomValue::Multi(values)
            }
        }
        _ => CustomValue::Empty,
    }
}

/// Build the cell for a resolved value, or None when empty. Picklist-bound
/// cells write lenient.
pub fn cell_for(planned: &PlannedCustomColumn, column_id: u64, value: CustomValue) -> Option<Cell> {
    if value.is_empty() {
        return None;
    }
    let cell = match value {
        CustomValue::Text(s) => {
            let cell = Cell::text(column_id, s);
            if planned.column_type == ColumnType::Picklist {
                cell.lenient()
            } else {
                cell
            }
        }
        CustomValue::Number(n) => Cell::number(column_id, n),
        CustomValue::Bool(b) => Cell::checkbox(column_id, b),
        CustomValue::Date(d) => Cell::text(column_id, d),
        CustomValue::Multi(v) => Cell::multi_picklist(column_id, v).lenient(),
        CustomValue::Empty => unreachable!(),
    };
    Some(cell)
}
