//! Resource row construction.

use crate::source::models::Resource;
use crate::target::models::{Cell, Row};
use crate::transform::columns::titles;
use crate::transform::contacts::resource_contact;
use crate::transform::custom_fields::{cell_for, resolve_value, PlannedCustomColumn};
use crate::transform::task::date_cell;
use crate::transform::ColumnMap;

/// `max_units` 1.0 → `"100%"`.
pub fn max_units_text(units: f64) -> String {
    format!("{}%", (units * 100.0).round() as i64)
}

/// Build the row for a resource. Resources load flat and unordered.
pub fn resource_row(
    resource: &Resource,
    cols: &ColumnMap,
    custom_columns: &[PlannedCustomColumn],
) -> Row {
    let mut cells: Vec<Cell> = Vec::new();

    if let Some(id) = cols.get(titles::RESOURCE_NAME) {
        cells.push(Cell::text(id, resource.name.clone()));
    }
    if let Some(id) = cols.get(titles::SOURCE_ID) {
        cells.push(Cell::text(id, resource.id.clone()));
    }
    if let Some(id) = cols.get(titles::CONTACT) {
        if let Some(contact) = resource_contact(resource) {
            cells.push(Cell::contact(id, contact));
        }
    }
    if let Some(id) = cols.get(titles::RESOURCE_TYPE) {
        cells.push(Cell::text(id, resource.resource_type.label()).lenient());
    }
    if let (Some(id), Some(units)) = (cols.get(titles::MAX_UNITS), resource.max_units) {
        cells.push(Cell::text(id, max_units_text(units)));
    }
    // Rates are numeric cells; the currency rendering is column format, so a
    // "$..." string here would break sorting and sums.
    for (title, value) in [
        (titles::STANDARD_RATE, resource.standard_rate),
        (titles::OVERTIME_RATE, resource.overtime_rate),
        (titles::COST_PER_USE, resource.cost_per_use),
    ] {
        if let (Some(id), Some(v)) = (cols.get(title), value) {
            cells.push(Cell::number(id, v));
        }
    }
    if let (Some(id), Some(dept)) = (cols.get(titles::DEPARTMENT), resource.department.as_deref()) {
        if !dept.trim().is_empty() {
            cells.push(Cell::text(id, dept).lenient());
        }
    }
    if let (Some(id), Some(code)) = (cols.get(titles::CODE), resource.code.as_deref()) {
        cells.push(Cell::text(id, code));
    }
    if let Some(id) = cols.get(titles::ACTIVE) {
        cells.push(Cell::checkbox(id, resource.is_active));
    }
    if let Some(id) = cols.get(titles::GENERIC) {
        cells.push(Cell::checkbox(id, resource.is_generic));
    }
    cells.extend(date_cell(
        cols,
        titles::PO_CREATED,
        resource.created_at.as_deref(),
    ));
    cells.extend(date_cell(
        cols,
        titles::PO_MODIFIED,
        resource.modified_at.as_deref(),
    ));

    let customs = resource.custom_fields();
    for planned in custom_columns {
        let Some(id) = cols.get(&planned.title) else {
            continue;
        };
        let Some((_, raw)) = customs
            .iter()
            .find(|(name, _)| *name == planned.def.internal_name)
        else {
            continue;
        };
        cells.extend(cell_for(planned, id, resolve_value(&planned.def, raw)));
    }

    Row::at_bottom(cells)
}
