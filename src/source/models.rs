//! Project Online OData entity models.
//!
//! Field names follow the ProjectData feed conventions (PascalCase, entity
//! prefixes). Custom field values ride along as flattened extra properties
//! named `Custom_...`; the typed fields capture everything else the
//! transformation needs. Dates stay strings here — parsing is the
//! transformation layer's job.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// One page of an OData result set. The next-link is absent on the last page.
#[derive(Debug, Clone, Deserialize)]
pub struct ODataPage<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(
        default,
        alias = "@odata.nextLink",
        alias = "odata.nextLink",
        rename = "@odata.nextLink"
    )]
    pub next_link: Option<String>,
}

/// Prefix custom field properties carry in every entity payload.
pub const CUSTOM_FIELD_PREFIX: &str = "Custom_";

fn custom_values(extra: &BTreeMap<String, serde_json::Value>) -> Vec<(String, serde_json::Value)> {
    extra
        .iter()
        .filter(|(k, v)| k.starts_with(CUSTOM_FIELD_PREFIX) && !v.is_null())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// A project header.
#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    #[serde(rename = "ProjectId")]
    pub id: String,
    #[serde(rename = "ProjectName")]
    pub name: String,
    #[serde(rename = "ProjectDescription", default)]
    pub description: Option<String>,
    #[serde(rename = "ProjectOwnerName", default)]
    pub owner: Option<String>,
    #[serde(rename = "ProjectOwnerEmail", default)]
    pub owner_email: Option<String>,
    #[serde(rename = "ProjectStartDate", default)]
    pub start: Option<String>,
    #[serde(rename = "ProjectFinishDate", default)]
    pub finish: Option<String>,
    #[serde(rename = "ProjectStatus", default)]
    pub status: Option<String>,
    #[serde(rename = "ProjectType", default)]
    pub project_type: Option<String>,
    #[serde(rename = "ProjectPriority", default)]
    pub priority: Option<i64>,
    #[serde(rename = "ProjectPercentCompleted", default)]
    pub percent_complete: Option<f64>,
    #[serde(rename = "ProjectDuration", default)]
    pub duration: Option<String>,
    #[serde(rename = "ProjectCreatedDate", default)]
    pub created_at: Option<String>,
    #[serde(rename = "ProjectModifiedDate", default)]
    pub modified_at: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Project {
    /// Custom field properties (`Custom_...`) present on this entity.
    pub fn custom_fields(&self) -> Vec<(String, serde_json::Value)> {
        custom_values(&self.extra)
    }
}

/// Scheduling constraint types, in source code order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintType {
    AsSoonAsPossible,
    AsLateAsPossible,
    MustStartOn,
    MustFinishOn,
    StartNoEarlierThan,
    StartNoLaterThan,
    FinishNoEarlierThan,
    FinishNoLaterThan,
}

impl ConstraintType {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::AsSoonAsPossible),
            1 => Some(Self::AsLateAsPossible),
            2 => Some(Self::MustStartOn),
            3 => Some(Self::MustFinishOn),
            4 => Some(Self::StartNoEarlierThan),
            5 => Some(Self::StartNoLaterThan),
            6 => Some(Self::FinishNoEarlierThan),
            7 => Some(Self::FinishNoLaterThan),
            _ => None,
        }
    }

    /// The abbreviation used by the reference picklist.
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Self::AsSoonAsPossible => "ASAP",
            Self::AsLateAsPossible => "ALAP",
            Self::StartNoEarlierThan => "SNET",
            Self::StartNoLaterThan => "SNLT",
            Self::FinishNoEarlierThan => "FNET",
            Self::FinishNoLaterThan => "FNLT",
            Self::MustStartOn => "MSO",
            Self::MustFinishOn => "MFO",
        }
    }
}

impl<'de> Deserialize<'de> for ConstraintType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        match &raw {
            serde_json::Value::Number(n) => n
                .as_i64()
                .and_then(Self::from_code)
                .ok_or_else(|| serde::de::Error::custom(format!("unknown constraint code {n}"))),
            serde_json::Value::String(s) => {
                let upper = s.to_uppercase();
                [
                    Self::AsSoonAsPossible,
                    Self::AsLateAsPossible,
                    Self::MustStartOn,
                    Self::MustFinishOn,
                    Self::StartNoEarlierThan,
                    Self::StartNoLaterThan,
                    Self::FinishNoEarlierThan,
                    Self::FinishNoLaterThan,
                ]
                .into_iter()
                .find(|c| c.abbreviation() == upper)
                .ok_or_else(|| serde::de::Error::custom(format!("unknown constraint {s}")))
            }
            other => Err(serde::de::Error::custom(format!(
                "constraint must be a code or abbreviation, got {other}"
            ))),
        }
    }
}

/// A task within a project. `outline_level` and `task_index` drive hierarchy
/// reconstruction.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectTask {
    #[serde(rename = "TaskId")]
    pub id: String,
    #[serde(rename = "ProjectId")]
    pub project_id: String,
    #[serde(rename = "ParentTaskId", default)]
    pub parent_id: Option<String>,
    #[serde(rename = "TaskName")]
    pub name: String,
    #[serde(rename = "TaskOutlineLevel", default)]
    pub outline_level: u32,
    #[serde(rename = "TaskIndex", default)]
    pub task_index: i64,
    #[serde(rename = "TaskStartDate", default)]
    pub start: Option<String>,
    #[serde(rename = "TaskFinishDate", default)]
    pub finish: Option<String>,
    #[serde(rename = "TaskDuration", default)]
    pub duration: Option<String>,
    #[serde(rename = "TaskWork", default)]
    pub work: Option<String>,
    #[serde(rename = "TaskActualWork", default)]
    pub actual_work: Option<String>,
    #[serde(rename = "TaskPercentCompleted", default)]
    pub percent_complete: Option<f64>,
    #[serde(rename = "TaskPriority", default)]
    pub priority: Option<i64>,
    #[serde(rename = "TaskIsMilestone", default)]
    pub is_milestone: bool,
    #[serde(rename = "TaskNotes", default)]
    pub notes: Option<String>,
    #[serde(rename = "TaskConstraintType", default)]
    pub constraint_type: Option<ConstraintType>,
    #[serde(rename = "TaskConstraintDate", default)]
    pub constraint_date: Option<String>,
    #[serde(rename = "TaskDeadline", default)]
    pub deadline: Option<String>,
    /// Serialized predecessor relations, e.g. `"3FS+2d,7SS"` keyed by task
    /// index or guid depending on tenant.
    #[serde(rename = "TaskPredecessors", default)]
    pub predecessors: Option<String>,
    #[serde(rename = "TaskCreatedDate", default)]
    pub created_at: Option<String>,
    #[serde(rename = "TaskModifiedDate", default)]
    pub modified_at: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ProjectTask {
    pub fn custom_fields(&self) -> Vec<(String, serde_json::Value)> {
        custom_values(&self.extra)
    }
}

/// Resource kinds. The column-type polymorphism dispatches on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ResourceType {
    Work,
    Material,
    Cost,
}

impl ResourceType {
    /// Numeric codes follow the interchange-format convention
    /// (0 material, 1 work, 2 cost).
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Material),
            1 => Some(Self::Work),
            2 => Some(Self::Cost),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Work => "Work",
            Self::Material => "Material",
            Self::Cost => "Cost",
        }
    }
}

impl<'de> Deserialize<'de> for ResourceType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        match &raw {
            serde_json::Value::String(s) => match s.to_lowercase().as_str() {
                "work" => Ok(Self::Work),
                "material" => Ok(Self::Material),
                "cost" => Ok(Self::Cost),
                other => Err(serde::de::Error::custom(format!(
                    "unknown resource type {other:?}"
                ))),
            },
            serde_json::Value::Number(n) => n
                .as_i64()
                .and_then(Self::from_code)
                .ok_or_else(|| serde::de::Error::custom(format!("unknown resource type code {n}"))),
            other => Err(serde::de::Error::custom(format!(
                "resource type must be a name or code, got {other}"
            ))),
        }
    }
}

/// An enterprise resource.
#[derive(Debug, Clone, Deserialize)]
pub struct Resource {
    #[serde(rename = "ResourceId")]
    pub id: String,
    #[serde(rename = "ResourceName")]
    pub name: String,
    #[serde(rename = "ResourceEmailAddress", default)]
    pub email: Option<String>,
    #[serde(rename = "ResourceType")]
    pub resource_type: ResourceType,
    #[serde(rename = "ResourceMaxUnits", default)]
    pub max_units: Option<f64>,
    #[serde(rename = "ResourceStandardRate", default)]
    pub standard_rate: Option<f64>,
    #[serde(rename = "ResourceOvertimeRate", default)]
    pub overtime_rate: Option<f64>,
    #[serde(rename = "ResourceCostPerUse", default)]
    pub cost_per_use: Option<f64>,
    #[serde(rename = "ResourceDepartments", default)]
    pub department: Option<String>,
    #[serde(rename = "ResourceCode", default)]
    pub code: Option<String>,
    #[serde(rename = "ResourceIsActive", default = "default_true")]
    pub is_active: bool,
    #[serde(rename = "ResourceIsGeneric", default)]
    pub is_generic: bool,
    #[serde(rename = "ResourceCreatedDate", default)]
    pub created_at: Option<String>,
    #[serde(rename = "ResourceModifiedDate", default)]
    pub modified_at: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_true() -> bool {
    true
}

impl Resource {
    pub fn custom_fields(&self) -> Vec<(String, serde_json::Value)> {
        custom_values(&self.extra)
    }
}

/// A task-resource assignment. Collapsed into per-task columns by the
/// transformation, never loaded as rows.
#[derive(Debug, Clone, Deserialize)]
pub struct Assignment {
    #[serde(rename = "AssignmentId")]
    pub id: String,
    #[serde(rename = "TaskId")]
    pub task_id: String,
    #[serde(rename = "ResourceId")]
    pub resource_id: String,
    #[serde(rename = "ProjectId")]
    pub project_id: String,
    #[serde(rename = "AssignmentWork", default)]
    pub work: Option<String>,
    #[serde(rename = "AssignmentActualWork", default)]
    pub actual_work: Option<String>,
    #[serde(rename = "AssignmentUnits", default)]
    pub units: Option<f64>,
    #[serde(rename = "AssignmentCost", default)]
    pub cost: Option<f64>,
    #[serde(rename = "AssignmentStartDate", default)]
    pub start: Option<String>,
    #[serde(rename = "AssignmentFinishDate", default)]
    pub finish: Option<String>,
    #[serde(rename = "AssignmentPercentWorkCompleted", default)]
    pub percent_work_complete: Option<f64>,
    #[serde(rename = "AssignmentNotes", default)]
    pub notes: Option<String>,
}

/// Custom field type codes used by the source schema.
pub mod field_type {
    pub const DATE: i64 = 4;
    pub const DURATION: i64 = 6;
    pub const COST: i64 = 9;
    pub const NUMBER: i64 = 15;
    pub const FLAG: i64 = 17;
    pub const TEXT: i64 = 21;
    pub const FINISH: i64 = 27;
    pub const START: i64 = 28;
}

/// One entry of a lookup table.
#[derive(Debug, Clone, Deserialize)]
pub struct LookupEntry {
    #[serde(rename = "EntryId")]
    pub entry_id: String,
    #[serde(rename = "Value")]
    pub value: String,
}

/// Custom field schema metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomFieldDef {
    #[serde(rename = "CustomFieldId")]
    pub id: String,
    /// Internal property name, e.g. `Custom_000039b78bbe4ceb82c4fa8c0c400284`.
    #[serde(rename = "InternalName")]
    pub internal_name: String,
    #[serde(rename = "DisplayName", default)]
    pub display_name: Option<String>,
    #[serde(rename = "FieldType")]
    pub field_type: i64,
    #[serde(rename = "IsMultiSelect", default)]
    pub is_multi_select: bool,
    #[serde(rename = "IsMultiline", default)]
    pub is_multiline: bool,
    #[serde(rename = "Formula", default)]
    pub formula: Option<String>,
    /// The entity the field is attached to: `Project`, `Task`, or `Resource`.
    #[serde(rename = "EntityType", default)]
    pub entity_type: Option<String>,
    #[serde(rename = "LookupEntries", default)]
    pub lookup_entries: Option<Vec<LookupEntry>>,
}

impl CustomFieldDef {
    pub fn has_lookup(&self) -> bool {
        self.lookup_entries.as_ref().is_some_and(|e| !e.is_empty())
    }

    pub fn is_formula(&self) -> bool {
        self.formula.as_ref().is_some_and(|f| !f.trim().is_empty())
    }

    /// entryId → display value map for value resolution.
    pub fn lookup_map(&self) -> std::collections::HashMap<&str, &str> {
        self.lookup_entries
            .iter()
            .flatten()
            .map(|e| (e.entry_id.as_str(), e.value.as_str()))
            .collect()
    }
}
