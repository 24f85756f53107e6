//! Task row construction.

use crate::source::models::ProjectTask;
use crate::target::models::{Cell, Row};
use crate::transform::assignments::{assignment_cells, TaskAssignments};
use crate::transform::columns::titles;
use crate::transform::custom_fields::{cell_for, resolve_value, PlannedCustomColumn};
use crate::transform::dates::to_target_date;
use crate::transform::duration::{parse_hours, to_project_days, to_work_text};
use crate::transform::priority::priority_label_or_default;
use crate::transform::ColumnMap;

/// Task status derived from percent complete.
pub fn status_label(percent_complete: Option<f64>) -> &'static str {
    match percent_complete {
        Some(p) if p >= 100.0 => "Complete",
        Some(p) if p > 0.0 => "In Progress",
        _ => "Not Started",
    }
}

/// A date cell, degrading unparseable source values to an absent cell.
pub(crate) fn date_cell(cols: &ColumnMap, title: &str, value: Option<&str>) -> Option<Cell> {
    let raw = value?;
    let id = cols.get(title)?;
    match to_target_date(raw) {
        Ok(date) => Some(Cell::text(id, date)),
        Err(err) => {
            tracing::warn!(column = title, %err, "dropping unparseable date cell");
            None
        }
    }
}

pub(crate) fn work_cell(cols: &ColumnMap, title: &str, value: Option<&str>) -> Option<Cell> {
    let raw = value?;
    let id = cols.get(title)?;
    match parse_hours(raw) {
        Ok(hours) => Some(Cell::text(id, to_work_text(hours))),
        Err(err) => {
            tracing::warn!(column = title, %err, "dropping unparseable work cell");
            None
        }
    }
}

/// Build the load-time row for a task. Parent linkage and predecessors are
/// applied by the loader: the parent once the ancestor's row id exists, and
/// predecessors in a second pass once every row number is known.
pub fn task_row(
    task: &ProjectTask,
    cols: &ColumnMap,
    assignments: Option<&TaskAssignments>,
    custom_columns: &[PlannedCustomColumn],
) -> Row {
    let mut cells: Vec<Cell> = Vec::new();

    if let Some(id) = cols.get(titles::TASK_NAME) {
        cells.push(Cell::text(id, task.name.clone()));
    }
    if let Some(id) = cols.get(titles::SOURCE_ID) {
        cells.push(Cell::text(id, task.id.clone()));
    }
    if let Some(id) = cols.get(titles::STATUS) {
        cells.push(Cell::text(id, status_label(task.percent_complete)).lenient());
    }
    if let Some(id) = cols.get(titles::PRIORITY) {
        cells.push(Cell::text(id, priority_label_or_default(task.priority)).lenient());
    }
    cells.extend(date_cell(cols, titles::START_DATE, task.start.as_deref()));
    cells.extend(date_cell(cols, titles::FINISH_DATE, task.finish.as_deref()));

    if let (Some(id), Some(raw)) = (cols.get(titles::DURATION), task.duration.as_deref()) {
        match parse_hours(raw) {
            Ok(hours) => cells.push(Cell::number(id, to_project_days(hours))),
            Err(err) => {
                tracing::warn!(task = %task.id, %err, "dropping unparseable duration");
            }
        }
    }
    cells.extend(work_cell(cols, titles::WORK, task.work.as_deref()));
    cells.extend(work_cell(
        cols,
        titles::ACTUAL_WORK,
        task.actual_work.as_deref(),
    ));

    if let (Some(id), Some(p)) = (cols.get(titles::PERCENT_COMPLETE), task.percent_complete) {
        cells.push(Cell::number(id, p));
    }
    if let Some(id) = cols.get(titles::MILESTONE) {
        cells.push(Cell::checkbox(id, task.is_milestone));
    }
    if let (Some(id), Some(ct)) = (cols.get(titles::CONSTRAINT_TYPE), task.constraint_type) {
        cells.push(Cell::text(id, ct.abbreviation()).lenient());
    }
    cells.extend(date_cell(
        cols,
        titles::CONSTRAINT_DATE,
        task.constraint_date.as_deref(),
    ));
    cells.extend(date_cell(cols, titles::DEADLINE, task.deadline.as_deref()));

    if let (Some(id), Some(notes)) = (cols.get(titles::NOTES), task.notes.as_deref()) {
        if !notes.trim().is_empty() {
            cells.push(Cell::text(id, notes));
        }
    }

    cells.extend(date_cell(cols, titles::PO_CREATED, task.created_at.as_deref()));
    cells.extend(date_cell(
        cols,
        titles::PO_MODIFIED,
        task.modified_at.as_deref(),
    ));

    if let Some(group) = assignments {
        cells.extend(assignment_cells(group, cols.as_map()));
    }

    let customs = task.custom_fields();
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::models::{Column, ColumnType, Sheet};
    use crate::transform::columns::task_columns;
    use std::collections::BTreeMap;

    fn sheet_map() -> ColumnMap {
        let mut columns = task_columns("TST");
        for (i, c) in columns.iter_mut().enumerate() {
            c.id = Some(100 + i as u64);
        }
        ColumnMap::from_sheet(&Sheet {
            id: 1,
            name: "Tasks".into(),
            permalink: None,
            columns,
            rows: vec![],
        })
    }

    fn task() -> ProjectTask {
        ProjectTask {
            id: "t-guid".into(),
            project_id: "p".into(),
            parent_id: None,
            name: "Design review".into(),
            outline_level: 0,
            task_index: 1,
            start: Some("2024-03-15T09:00:00Z".into()),
            finish: Some("2024-03-20T17:00:00Z".into()),
            duration: Some("PT36H".into()),
            work: Some("PT40H".into()),
            actual_work: None,
            percent_complete: Some(50.0),
            priority: Some(800),
            is_milestone: false,
            notes: Some("kickoff notes".into()),
            constraint_type: crate::source::models::ConstraintType::from_code(4),
            constraint_date: Some("2024-03-14T00:00:00Z".into()),
            deadline: None,
            predecessors: None,
            created_at: Some("2024-01-01T00:00:00Z".into()),
            modified_at: Some("2024-02-01T00:00:00Z".into()),
            extra: BTreeMap::new(),
        }
    }

    fn cell_value<'a>(row: &'a Row, cols: &ColumnMap, title: &str) -> Option<&'a serde_json::Value> {
        row.cell(cols.get(title).unwrap()).and_then(|c| c.value.as_ref())
    }

    #[test]
    fn test_status_derivation() {
        assert_eq!(status_label(Some(0.0)), "Not Started");
        assert_eq!(status_label(Some(100.0)), "Complete");
        assert_eq!(status_label(Some(37.0)), "In Progress");
        assert_eq!(status_label(None), "Not Started");
    }

    #[test]
    fn test_row_carries_dual_id_and_dual_dates() {
        let cols = sheet_map();
        let row = task_row(&task(), &cols, None, &[]);
        assert_eq!(
            cell_value(&row, &cols, titles::SOURCE_ID).unwrap(),
            "t-guid"
        );
        assert_eq!(
            cell_value(&row, &cols, titles::PO_CREATED).unwrap(),
            "2024-01-01"
        );
        assert_eq!(
            cell_value(&row, &cols, titles::PO_MODIFIED).unwrap(),
            "2024-02-01"
        );
    }

    #[test]
    fn test_scalar_mappings() {
        let cols = sheet_map();
        let row = task_row(&task(), &cols, None, &[]);
        assert_eq!(cell_value(&row, &cols, titles::STATUS).unwrap(), "In Progress");
        assert_eq!(cell_value(&row, &cols, titles::PRIORITY).unwrap(), "Very High");
        assert_eq!(cell_value(&row, &cols, titles::START_DATE).unwrap(), "2024-03-15");
        assert_eq!(cell_value(&row, &cols, titles::DURATION).unwrap(), 4.5);
        assert_eq!(cell_value(&row, &cols, titles::WORK).unwrap(), "40h");
        assert_eq!(
            cell_value(&row, &cols, titles::CONSTRAINT_TYPE).unwrap(),
            "SNET"
        );
    }

    #[test]
    fn test_status_and_priority_write_lenient() {
        let cols = sheet_map();
        let row = task_row(&task(), &cols, None, &[]);
        let status = row.cell(cols.get(titles::STATUS).unwrap()).unwrap();
        assert_eq!(status.strict, Some(false));
    }

    #[test]
    fn test_bad_date_degrades_to_missing_cell() {
        let cols = sheet_map();
        let mut t = task();
        t.start = Some("not-a-date".into());
        let row = task_row(&t, &cols, None, &[]);
        assert!(row.cell(cols.get(titles::START_DATE).unwrap()).is_none());
        // The rest of the row still builds.
        assert!(row.cell(cols.get(titles::TASK_NAME).unwrap()).is_some());
    }

    #[test]
    fn test_system_columns_never_written() {
        let cols = sheet_map();
        let row = task_row(&task(), &cols, None, &[]);
        assert!(row.cell(cols.get(titles::SYS_CREATED).unwrap()).is_none());
        assert!(row.cell(cols.get(titles::ROW_ID).unwrap()).is_none());
    }

    #[test]
    fn test_custom_field_cell_included() {
        use crate::source::models::{field_type, CustomFieldDef};
        use crate::transform::custom_fields::PlannedCustomColumn;

        let mut columns = task_columns("TST");
        columns.push(Column::new("Custom - Risk", ColumnType::TextNumber));
        for (i, c) in columns.iter_mut().enumerate() {
            c.id = Some(100 + i as u64);
        }
        let cols = ColumnMap::from_sheet(&Sheet {
            id: 1,
            name: "Tasks".into(),
            permalink: None,
            columns,
            rows: vec![],
        });

        let planned = PlannedCustomColumn {
            title: "Custom - Risk".into(),
            column_type: ColumnType::TextNumber,
            def: CustomFieldDef {
                id: "cf".into(),
                internal_name: "Custom_Risk".into(),
                display_name: Some("Risk".into()),
                field_type: field_type::TEXT,
                is_multi_select: false,
                is_multiline: false,
                formula: None,
                entity_type: Some("Task".into()),
                lookup_entries: None,
            },
        };
        let mut t = task();
        t.extra
            .insert("Custom_Risk".into(), serde_json::json!("High"));
        let row = task_row(&t, &cols, None, &[planned]);
        assert_eq!(cell_value(&row, &cols, "Custom - Risk").unwrap(), "High");
    }
}
