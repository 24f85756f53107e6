//! Assignment → column mapping: the column-type polymorphism rule.
//!
//! Assignments collapse into per-task columns, grouped by the assigned
//! resource's kind. The dispatch is a sum type so the invariant — people get
//! contact columns, non-people get picklist columns — is total by
//! construction: there is no code path that pairs `Work` with a picklist.

use crate::source::models::{Assignment, Resource, ResourceType};
use crate::target::models::{Cell, Column, ColumnType, Contact};
use crate::transform::contacts::resource_contact;
use std::collections::{BTreeSet, HashMap};

/// The three assignment-derived columns, one per resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignmentColumnKind {
    TeamMembers,
    Equipment,
    CostCenters,
}

impl AssignmentColumnKind {
    pub const ALL: [Self; 3] = [Self::TeamMembers, Self::Equipment, Self::CostCenters];

    /// The dispatch: which column a resource kind lands in.
    pub fn for_resource(resource_type: ResourceType) -> Self {
        match resource_type {
            ResourceType::Work => Self::TeamMembers,
            ResourceType::Material => Self::Equipment,
            ResourceType::Cost => Self::CostCenters,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::TeamMembers => "Team Members",
            Self::Equipment => "Equipment",
            Self::CostCenters => "Cost Centers",
        }
    }

    /// People are contacts; everything else is a picklist.
    pub fn column_type(&self) -> ColumnType {
        match self {
            Self::TeamMembers => ColumnType::MultiContactList,
            Self::Equipment | Self::CostCenters => ColumnType::MultiPicklist,
        }
    }
}

/// A task's assignments, grouped per column.
#[derive(Debug, Default)]
pub struct TaskAssignments {
    pub team_members: Vec<Contact>,
    pub equipment: Vec<String>,
    pub cost_centers: Vec<String>,
}

impl TaskAssignments {
    pub fn is_empty(&self) -> bool {
        self.team_members.is_empty() && self.equipment.is_empty() && self.cost_centers.is_empty()
    }
}

/// Group every task's assignments by resource kind.
///
/// Assignments referencing an unknown resource are skipped with a warning —
/// the task still loads, just without that member.
pub fn group_by_task(
    assignments: &[Assignment],
    resources: &HashMap<String, Resource>,
) -> HashMap<String, TaskAssignments> {
    let mut grouped: HashMap<String, TaskAssignments> = HashMap::new();
    for assignment in assignments {
        let Some(resource) = resources.get(&assignment.resource_id) else {
            tracing::warn!(
                assignment_id = %assignment.id,
                resource_id = %assignment.resource_id,
                "assignment references an unknown resource"
            );
            continue;
        };
        let entry = grouped.entry(assignment.task_id.clone()).or_default();
        match AssignmentColumnKind::for_resource(resource.resource_type) {
            AssignmentColumnKind::TeamMembers => {
                if let Some(contact) = resource_contact(resource) {
                    if !entry.team_members.contains(&contact) {
                        entry.team_members.push(contact);
                    }
                }
            }
            AssignmentColumnKind::Equipment => {
                if !entry.equipment.contains(&resource.name) {
                    entry.equipment.push(resource.name.clone());
                }
            }
            AssignmentColumnKind::CostCenters => {
                if !entry.cost_centers.contains(&resource.name) {
                    entry.cost_centers.push(resource.name.clone());
                }
            }
        }
    }
    grouped
}

/// Column specs for the kinds this project's assignments actually use.
/// Picklist options are the discovered non-people resource names, sorted.
pub fn assignment_columns(
    assignments: &[Assignment],
    resources: &HashMap<String, Resource>,
) -> Vec<Column> {
    let mut used: BTreeSet<&str> = BTreeSet::new();
    let mut equipment: BTreeSet<String> = BTreeSet::new();
    let mut cost_centers: BTreeSet<String> = BTreeSet::new();

    for assignment in assignments {
        let Some(resource) = resources.get(&assignment.resource_id) else {
            continue;
        };
        let kind = AssignmentColumnKind::for_resource(resource.resource_type);
        used.insert(kind.title());
        match kind {
            AssignmentColumnKind::Equipment => {
                equipment.insert(resource.name.clone());
            }
            AssignmentColumnKind::CostCenters => {
                cost_centers.insert(resource.name.clone());
            }
            AssignmentColumnKind::TeamMembers => {}
        }
    }

    AssignmentColumnKind::ALL
        .into_iter()
        .filter(|kind| used.contains(kind.title()))
        .map(|kind| {
            let column = Column::new(kind.title(), kind.column_type());
            match kind {
                AssignmentColumnKind::TeamMembers => column,
                AssignmentColumnKind::Equipment => {
                    column.with_options(equipment.iter().cloned().collect())
                }
                AssignmentColumnKind::CostCenters => {
                    column.with_options(cost_centers.iter().cloned().collect())
                }
            }
        })
        .collect()
}

/// Cells for one task's groups, against the sheet's column-id map.
pub fn assignment_cells(
    task_assignments: &TaskAssignments,
    column_ids: &HashMap<String, u64>,
) -> Vec<Cell> {
    let mut cells = Vec::new();
    if !task_assignments.team_members.is_empty() {
        if let Some(&id) = column_ids.get(AssignmentColumnKind::TeamMembers.title()) {
            cells.push(Cell::multi_contact(id, task_assignments.team_members.clone()));
        }
    }
    if !task_assignments.equipment.is_empty() {
        if let Some(&id) = column_ids.get(AssignmentColumnKind::Equipment.title()) {
            cells.push(Cell::multi_picklist(id, task_assignments.equipment.clone()).lenient());
        }
    }
    if !task_assignments.cost_centers.is_empty() {
        if let Some(&id) = column_ids.get(AssignmentColumnKind::CostCenters.title()) {
            cells.push(Cell::multi_picklist(id, task_assignments.cost_centers.clone()).lenient());
        }
    }
    cells
}
