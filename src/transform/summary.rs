//! Project summary sheet rows (key-value pairs).

use crate::source::models::Project;
use crate::target::models::{Cell, Row};
use crate::transform::columns::titles;
use crate::transform::dates::to_target_date;
use crate::transform::duration::{parse_hours, to_project_days};
use crate::transform::priority::priority_label_or_default;
use crate::transform::ColumnMap;

/// Field labels, in sheet order.
pub mod fields {
    pub const NAME: &str = "Project Name";
    pub const DESCRIPTION: &str = "Description";
    pub const OWNER: &str = "Owner";
    pub const OWNER_EMAIL: &str = "Owner Email";
    pub const STATUS: &str = "Status";
    pub const TYPE: &str = "Type";
    pub const PRIORITY: &str = "Priority";
    pub const START: &str = "Start Date";
    pub const FINISH: &str = "Finish Date";
    pub const PERCENT_COMPLETE: &str = "% Complete";
    pub const DURATION_DAYS: &str = "Duration (days)";
    pub const SOURCE_ID: &str = "Project Online ID";
}

/// Build the key-value rows describing one project. The first row (the
/// project name) additionally carries the source created/modified dates.
pub fn summary_rows(project: &Project, cols: &ColumnMap) -> Vec<Row> {
    let field_col = cols.get(titles::FIELD);
    let value_col = cols.get(titles::VALUE);
    let (Some(field_col), Some(value_col)) = (field_col, value_col) else {
        tracing::warn!("summary sheet is missing its Field/Value columns");
        return Vec::new();
    };

    let date_of = |raw: &Option<String>| -> Option<String> {
        raw.as_deref().and_then(|s| match to_target_date(s) {
            Ok(d) => Some(d),
            Err(err) => {
                tracing::warn!(%err, "dropping unparseable project date");
                None
            }
        })
    };

    let mut pairs: Vec<(&str, Option<String>)> = vec![
        (fields::NAME, Some(project.name.clone())),
        (fields::DESCRIPTION, project.description.clone()),
        (fields::OWNER, project.owner.clone()),
        (fields::OWNER_EMAIL, project.owner_email.clone()),
        (fields::STATUS, project.status.clone()),
        (fields::TYPE, project.project_type.clone()),
        (
            fields::PRIORITY,
            Some(priority_label_or_default(project.priority).to_string()),
        ),
        (fields::START, date_of(&project.start)),
        (fields::FINISH, date_of(&project.finish)),
        (
            fields::PERCENT_COMPLETE,
            project.percent_complete.map(|p| format!("{p}")),
        ),
        (
            fields::DURATION_DAYS,
            project.duration.as_deref().and_then(|d| {
                parse_hours(d)
                    .map(|h| to_project_days(h).to_string())
                    .ok()
            }),
        ),
        (fields::SOURCE_ID, Some(project.id.clone())),
    ];

    let mut rows = Vec::new();
    for (i, (field, value)) in pairs.drain(..).enumerate() {
        let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
            continue;
        };
        let mut cells = vec![
            Cell::text(field_col, field),
            if field == fields::PRIORITY || field == fields::STATUS {
                Cell::text(value_col, value).lenient()
            } else {
                Cell::text(value_col, value)
            },
        ];
        if i == 0 {
            if let (Some(id), Some(date)) = (cols.get(titles::PO_CREATED), date_of(&project.created_at))
            {
                cells.push(Cell::text(id, date));
            }
            if let (Some(id), Some(date)) =
                (cols.get(titles::PO_MODIFIED), date_of(&project.modified_at))
            {
                cells.push(Cell::text(id, date));
            }
        }
        rows.push(Row::at_bottom(cells));
    }
    rows
}
