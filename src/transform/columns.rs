//! Static column skeletons for the three project sheets.
//!
//! Every entity sheet carries the dual-ID pair (readable auto-number plus a
//! hidden source-guid cell, the canonical rerun key) and the dual-date
//! pattern (user-settable DATE columns holding source timestamps, plus the
//! target-owned CREATED/MODIFIED system columns).

use crate::target::models::{Column, ColumnType};

/// Column titles shared between the builders and the row loaders.
pub mod titles {
    // Tasks sheet
    pub const TASK_NAME: &str = "Task Name";
    pub const ROW_ID: &str = "ID";
    pub const SOURCE_ID: &str = "Source Id";
    pub const STATUS: &str = "Status";
    pub const PRIORITY: &str = "Priority";
    pub const START_DATE: &str = "Start Date";
    pub const FINISH_DATE: &str = "Finish Date";
    pub const DURATION: &str = "Duration";
    pub const WORK: &str = "Work";
    pub const ACTUAL_WORK: &str = "Actual Work";
    pub const PERCENT_COMPLETE: &str = "% Complete";
    pub const MILESTONE: &str = "Milestone";
    pub const CONSTRAINT_TYPE: &str = "Constraint Type";
    pub const CONSTRAINT_DATE: &str = "Constraint Date";
    pub const DEADLINE: &str = "Deadline";
    pub const PREDECESSORS: &str = "Predecessors";
    pub const NOTES: &str = "Notes";

    // Resources sheet
    pub const RESOURCE_NAME: &str = "Resource Name";
    pub const CONTACT: &str = "Contact";
    pub const RESOURCE_TYPE: &str = "Type";
    pub const MAX_UNITS: &str = "Max Units";
    pub const STANDARD_RATE: &str = "Standard Rate";
    pub const OVERTIME_RATE: &str = "Overtime Rate";
    pub const COST_PER_USE: &str = "Cost Per Use";
    pub const DEPARTMENT: &str = "Department";
    pub const CODE: &str = "Code";
    pub const ACTIVE: &str = "Active";
    pub const GENERIC: &str = "Generic";

    // Summary sheet
    pub const FIELD: &str = "Field";
    pub const VALUE: &str = "Value";

    // Dual-date pattern
    pub const PO_CREATED: &str = "Project Online Created Date";
    pub const PO_MODIFIED: &str = "Project Online Modified Date";
    pub const SYS_CREATED: &str = "Created Date";
    pub const SYS_MODIFIED: &str = "Modified Date";
    pub const SYS_CREATED_BY: &str = "Created By";
    pub const SYS_MODIFIED_BY: &str = "Modified By";
}

use titles::*;

/// Auto-number prefix for the summary sheet ID column.
pub const SUMMARY_ID_PREFIX: &str = "Project";

fn dual_date_columns() -> Vec<Column> {
    vec![
        Column::new(PO_CREATED, ColumnType::Date),
        Column::new(PO_MODIFIED, ColumnType::Date),
    ]
}

fn system_columns() -> Vec<Column> {
    vec![
        Column::new(SYS_CREATED, ColumnType::CreatedDate),
        Column::new(SYS_MODIFIED, ColumnType::ModifiedDate),
        Column::new(SYS_CREATED_BY, ColumnType::CreatedBy),
        Column::new(SYS_MODIFIED_BY, ColumnType::ModifiedBy),
    ]
}

/// Summary sheet: key-value rows describing the project.
pub fn summary_columns() -> Vec<Column> {
    let mut cols = vec![
        Column::new(FIELD, ColumnType::TextNumber).primary(),
        Column::new(VALUE, ColumnType::TextNumber),
        Column::new(ROW_ID, ColumnType::AutoNumber).with_auto_number(SUMMARY_ID_PREFIX),
    ];
    cols.extend(dual_date_columns());
    cols.extend(system_columns());
    cols
}

/// Tasks sheet static skeleton. Assignment and custom-field columns are
/// discovered per project and added afterwards.
pub fn task_columns(prefix: &str) -> Vec<Column> {
    let mut cols = vec![
        Column::new(TASK_NAME, ColumnType::TextNumber).primary(),
        Column::new(ROW_ID, ColumnType::AutoNumber).with_auto_number(prefix),
        Column::new(SOURCE_ID, ColumnType::TextNumber).hidden(),
        Column::new(STATUS, ColumnType::Picklist),
        Column::new(PRIORITY, ColumnType::Picklist),
        Column::new(START_DATE, ColumnType::Date),
        Column::new(FINISH_DATE, ColumnType::Date),
        Column::new(DURATION, ColumnType::Duration),
        Column::new(WORK, ColumnType::TextNumber),
        Column::new(ACTUAL_WORK, ColumnType::TextNumber),
        Column::new(PERCENT_COMPLETE, ColumnType::TextNumber),
        Column::new(MILESTONE, ColumnType::Checkbox),
        Column::new(CONSTRAINT_TYPE, ColumnType::Picklist),
        Column::new(CONSTRAINT_DATE, ColumnType::Date),
        Column::new(DEADLINE, ColumnType::Date),
        Column::new(PREDECESSORS, ColumnType::Predecessor),
        Column::new(NOTES, ColumnType::TextNumber),
    ];
    cols.extend(dual_date_columns());
    cols.extend(system_columns());
    cols
}

/// Resources sheet static skeleton.
pub fn resource_columns(prefix: &str) -> Vec<Column> {
    let mut cols = vec![
        Column::new(RESOURCE_NAME, ColumnType::TextNumber).primary(),
        Column::new(ROW_ID, ColumnType::AutoNumber).with_auto_number(prefix),
        Column::new(SOURCE_ID, ColumnType::TextNumber).hidden(),
        Column::new(CONTACT, ColumnType::ContactList),
        Column::new(RESOURCE_TYPE, ColumnType::Picklist),
        Column::new(MAX_UNITS, ColumnType::TextNumber),
        Column::new(STANDARD_RATE, ColumnType::TextNumber).currency(),
        Column::new(OVERTIME_RATE, ColumnType::TextNumber).currency(),
        Column::new(COST_PER_USE, ColumnType::TextNumber).currency(),
        Column::new(DEPARTMENT, ColumnType::Picklist),
        Column::new(CODE, ColumnType::TextNumber),
        Column::new(ACTIVE, ColumnType::Checkbox),
        Column::new(GENERIC, ColumnType::Checkbox),
    ];
    cols.extend(dual_date_columns());
    cols.extend(system_columns());
    cols
}
