use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, str::FromStr};

use crate::error::{KeyParseError, RecordError};

/// The three categories of tracked work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Requirement,
    Task,
    Incident,
}

/// Remote field names that differ per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMap {
    pub id: &'static str,
    pub type_name: &'static str,
    pub status: &'static str,
    pub priority: &'static str,
}

const NAME_FIELD: &str = "Name";
const PROJECT_NAME_FIELD: &str = "ProjectName";
const PROJECT_ID_FIELD: &str = "ProjectId";
const DESCRIPTION_FIELD: &str = "Description";

impl Category {
    /// Every category, in storage order.
    pub const ALL: [Self; 3] = [Self::Requirement, Self::Task, Self::Incident];

    /// Header display order: tasks first, requirements last.
    pub const HEADER_ORDER: [Self; 3] = [Self::Task, Self::Incident, Self::Requirement];

    /// Two-letter shorthand used in labels and composite keys.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Requirement => "RQ",
            Self::Task => "TK",
            Self::Incident => "IN",
        }
    }

    /// Inverse of [`Category::token`]. Case-insensitive.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "RQ" => Some(Self::Requirement),
            "TK" => Some(Self::Task),
            "IN" => Some(Self::Incident),
            _ => None,
        }
    }

    /// Artifact type name as used in Spira page URLs.
    #[must_use]
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::Requirement => "Requirement",
            Self::Task => "Task",
            Self::Incident => "Incident",
        }
    }

    /// REST collection path segment.
    #[must_use]
    pub const fn collection(self) -> &'static str {
        match self {
            Self::Requirement => "requirements",
            Self::Task => "tasks",
            Self::Incident => "incidents",
        }
    }

    const fn header_title(self) -> &'static str {
        match self {
            Self::Requirement => "REQUIREMENTS",
            Self::Task => "TASKS",
            Self::Incident => "INCIDENTS",
        }
    }

    /// Category-specific remote field names.
    #[must_use]
    pub const fn fields(self) -> FieldMap {
        match self {
            Self::Requirement => FieldMap {
                id: "RequirementId",
                type_name: "RequirementTypeName",
                status: "StatusName",
                priority: "ImportanceName",
            },
            Self::Incident => FieldMap {
                id: "IncidentId",
                type_name: "IncidentTypeName",
                status: "IncidentStatusName",
                priority: "PriorityName",
            },
            Self::Task => FieldMap {
                id: "TaskId",
                type_name: "TaskTypeName",
                status: "TaskStatusName",
                priority: "TaskPriorityName",
            },
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Requirement => 0,
            Self::Task => 1,
            Self::Incident => 2,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

impl FromStr for Category {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(category) = Self::from_token(s) {
            return Ok(category);
        }
        match s.trim().to_ascii_lowercase().as_str() {
            "requirement" | "requirements" => Ok(Self::Requirement),
            "task" | "tasks" => Ok(Self::Task),
            "incident" | "incidents" => Ok(Self::Incident),
            _ => Err(KeyParseError { raw: s.to_string() }),
        }
    }
}

/// One value per category, indexed by [`Category`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerCategory<T> {
    slots: [T; 3],
}

impl<T> PerCategory<T> {
    pub fn from_fn(mut f: impl FnMut(Category) -> T) -> Self {
        Self {
            slots: Category::ALL.map(&mut f),
        }
    }

    #[must_use]
    pub const fn get(&self, category: Category) -> &T {
        &self.slots[category.index()]
    }

    pub const fn get_mut(&mut self, category: Category) -> &mut T {
        &mut self.slots[category.index()]
    }

    pub fn set(&mut self, category: Category, value: T) {
        self.slots[category.index()] = value;
    }

    /// True when `pred` holds for all three categories.
    pub fn all(&self, pred: impl Fn(&T) -> bool) -> bool {
        self.slots.iter().all(pred)
    }

    /// True when `pred` holds for at least one category.
    pub fn any(&self, pred: impl Fn(&T) -> bool) -> bool {
        self.slots.iter().any(pred)
    }
}

/// Parsed `TOKEN:ID` composite key, e.g. `TK:42`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ArtifactKey {
    pub category: Category,
    pub item_id: i64,
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.category.token(), self.item_id)
    }
}

impl FromStr for ArtifactKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || KeyParseError { raw: s.to_string() };
        let (token, id) = s.trim().split_once(':').ok_or_else(bad)?;
        let category = Category::from_token(token).ok_or_else(bad)?;
        let item_id: i64 = id.trim().parse().map_err(|_| bad())?;
        if item_id <= 0 {
            return Err(bad());
        }
        Ok(Self { category, item_id })
    }
}

/// Field values for a real work item, before invariants are checked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemFields {
    pub name: String,
    pub project_id: i64,
    pub project_name: String,
    pub item_id: i64,
    pub description: String,
    pub priority: String,
    pub status: String,
    pub subtype: String,
}

/// A work item or a synthetic category header.
///
/// Instances are never mutated after construction; a refresh builds a whole
/// new generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    display_name: String,
    category: Category,
    project_id: i64,
    project_name: String,
    item_id: i64,
    description: String,
    priority_label: String,
    status_label: String,
    subtype: String,
    is_header: bool,
    expandable: bool,
}

impl Artifact {
    /// Build a real item. `item_id` must be positive.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::BadId`] when `item_id <= 0`.
    pub fn item(category: Category, fields: ItemFields) -> Result<Self, RecordError> {
        if fields.item_id <= 0 {
            return Err(RecordError::BadId {
                field: category.fields().id,
            });
        }
        Ok(Self {
            display_name: fields.name,
            category,
            project_id: fields.project_id,
            project_name: fields.project_name,
            item_id: fields.item_id,
            description: fields.description,
            priority_label: fields.priority,
            status_label: fields.status,
            subtype: fields.subtype,
            is_header: false,
            expandable: false,
        })
    }

    /// Build the header for `category` over `child_count` items.
    #[must_use]
    pub fn header(category: Category, child_count: usize) -> Self {
        Self {
            display_name: format!("{} ({child_count})", category.header_title()),
            category,
            project_id: 0,
            project_name: String::new(),
            item_id: 0,
            description: String::new(),
            priority_label: String::new(),
            status_label: String::new(),
            subtype: "header".to_string(),
            is_header: true,
            expandable: child_count > 0,
        }
    }

    /// Map one loosely-typed remote record through the category field table.
    ///
    /// # Errors
    ///
    /// Fails when the record is not an object or lacks a positive id.
    pub fn from_record(category: Category, record: &Value) -> Result<Self, RecordError> {
        let obj = record.as_object().ok_or(RecordError::NotAnObject)?;
        let map = category.fields();
        let text = |field: &str| {
            obj.get(field)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let item_id = obj
            .get(map.id)
            .and_then(as_integer)
            .ok_or(RecordError::BadId { field: map.id })?;

        Self::item(
            category,
            ItemFields {
                name: text(NAME_FIELD),
                project_id: obj.get(PROJECT_ID_FIELD).and_then(as_integer).unwrap_or(0),
                project_name: text(PROJECT_NAME_FIELD),
                item_id,
                description: text(DESCRIPTION_FIELD),
                priority: text(map.priority),
                status: text(map.status),
                subtype: text(map.type_name),
            },
        )
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[must_use]
    pub const fn category(&self) -> Category {
        self.category
    }

    #[must_use]
    pub const fn project_id(&self) -> i64 {
        self.project_id
    }

    #[must_use]
    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    #[must_use]
    pub const fn item_id(&self) -> i64 {
        self.item_id
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn priority_label(&self) -> &str {
        &self.priority_label
    }

    #[must_use]
    pub fn status_label(&self) -> &str {
        &self.status_label
    }

    #[must_use]
    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    #[must_use]
    pub const fn is_header(&self) -> bool {
        self.is_header
    }

    #[must_use]
    pub const fn expandable(&self) -> bool {
        self.expandable
    }

    /// Composite key for items; `None` for headers.
    #[must_use]
    pub const fn key(&self) -> Option<ArtifactKey> {
        if self.is_header {
            None
        } else {
            Some(ArtifactKey {
                category: self.category,
                item_id: self.item_id,
            })
        }
    }

    /// `TOKEN:ID` text, e.g. `IN:7`.
    #[must_use]
    pub fn composite_key(&self) -> String {
        format!("{}:{}", self.category.token(), self.item_id)
    }

    /// Tree label: `Name - [TK:3]` for items, `TASKS (2)` for headers.
    #[must_use]
    pub fn label(&self) -> String {
        if self.is_header {
            self.display_name.clone()
        } else {
            format!("{} - [{}]", self.display_name, self.composite_key())
        }
    }

    #[must_use]
    pub fn tooltip(&self) -> String {
        if self.is_header {
            format!("Click to expand/collapse {}s", self.category.type_name())
        } else {
            format!("{} | {}", self.project_name, self.composite_key())
        }
    }

    /// Spira page for this item: `{base}/{project}/{Type}/{id}.aspx`.
    #[must_use]
    pub fn detail_url(&self, base_url: &str) -> Option<String> {
        if self.is_header {
            return None;
        }
        Some(format!(
            "{}/{}/{}/{}.aspx",
            base_url.trim_end_matches('/'),
            self.project_id,
            self.category.type_name(),
            self.item_id
        ))
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn token_mapping_is_total_and_reversible() {
        for category in Category::ALL {
            assert_eq!(Category::from_token(category.token()), Some(category));
        }
        assert_eq!(Category::Requirement.token(), "RQ");
        assert_eq!(Category::Task.token(), "TK");
        assert_eq!(Category::Incident.token(), "IN");
        assert_eq!(Category::from_token("tk"), Some(Category::Task));
        assert_eq!(Category::from_token("XX"), None);
    }

    #[test]
    fn requirement_record_uses_requirement_field_names() {
        let record = json!({
            "Name": "Add Spira integration",
            "RequirementId": 12,
            "ProjectId": 1,
            "ProjectName": "Library Information System",
            "Description": "<p>desc</p>",
            "ImportanceName": "1 - Critical",
            "StatusName": "In Progress",
            "RequirementTypeName": "Feature",
            "PriorityName": "ignored",
        });
        let artifact = Artifact::from_record(Category::Requirement, &record).expect("valid");
        assert_eq!(artifact.item_id(), 12);
        assert_eq!(artifact.priority_label(), "1 - Critical");
        assert_eq!(artifact.status_label(), "In Progress");
        assert_eq!(artifact.subtype(), "Feature");
        assert!(!artifact.is_header());
        assert!(!artifact.expandable());
    }

    #[test]
    fn task_and_incident_records_map_their_own_fields() {
        let task = json!({
            "Name": "Have lunch", "TaskId": 3, "ProjectId": 2, "ProjectName": "P",
            "TaskPriorityName": "low", "TaskStatusName": "Not Started", "TaskTypeName": "Development",
        });
        let task = Artifact::from_record(Category::Task, &task).expect("valid task");
        assert_eq!(task.priority_label(), "low");
        assert_eq!(task.status_label(), "Not Started");
        assert_eq!(task.subtype(), "Development");

        let incident = json!({
            "Name": "So broken", "IncidentId": 7, "ProjectId": 2, "ProjectName": "P",
            "PriorityName": "2 - High", "IncidentStatusName": "Assigned", "IncidentTypeName": "Bug",
        });
        let incident = Artifact::from_record(Category::Incident, &incident).expect("valid incident");
        assert_eq!(incident.priority_label(), "2 - High");
        assert_eq!(incident.status_label(), "Assigned");
        assert_eq!(incident.subtype(), "Bug");
    }

    #[test]
    fn missing_optional_fields_become_empty() {
        let record = json!({ "TaskId": 9, "Description": null });
        let artifact = Artifact::from_record(Category::Task, &record).expect("valid");
        assert_eq!(artifact.display_name(), "");
        assert_eq!(artifact.description(), "");
        assert_eq!(artifact.project_id(), 0);
    }

    #[test]
    fn record_without_positive_id_is_rejected() {
        let missing = json!({ "Name": "x" });
        assert_eq!(
            Artifact::from_record(Category::Incident, &missing),
            Err(RecordError::BadId { field: "IncidentId" })
        );
        let zero = json!({ "TaskId": 0 });
        assert!(Artifact::from_record(Category::Task, &zero).is_err());
        assert_eq!(
            Artifact::from_record(Category::Task, &json!([1, 2])),
            Err(RecordError::NotAnObject)
        );
    }

    #[test]
    fn header_invariants() {
        let empty = Artifact::header(Category::Task, 0);
        assert!(empty.is_header());
        assert_eq!(empty.item_id(), 0);
        assert!(!empty.expandable());
        assert_eq!(empty.display_name(), "TASKS (0)");
        assert_eq!(empty.key(), None);
        assert_eq!(empty.detail_url("http://x"), None);

        let full = Artifact::header(Category::Incident, 4);
        assert!(full.expandable());
        assert_eq!(full.label(), "INCIDENTS (4)");
        assert_eq!(full.tooltip(), "Click to expand/collapse Incidents");
    }

    #[test]
    fn item_presentation() {
        let artifact = Artifact::item(
            Category::Incident,
            ItemFields {
                name: "Cannot log in".into(),
                project_id: 1,
                project_name: "Sample".into(),
                item_id: 7,
                ..ItemFields::default()
            },
        )
        .expect("valid");
        assert_eq!(artifact.label(), "Cannot log in - [IN:7]");
        assert_eq!(artifact.tooltip(), "Sample | IN:7");
        assert_eq!(
            artifact.detail_url("https://demo/SpiraPlan/").as_deref(),
            Some("https://demo/SpiraPlan/1/Incident/7.aspx")
        );
    }

    #[test]
    fn artifact_key_parses_and_displays() {
        let key: ArtifactKey = "tk:42".parse().expect("valid key");
        assert_eq!(key.category, Category::Task);
        assert_eq!(key.item_id, 42);
        assert_eq!(key.to_string(), "TK:42");

        assert!("TK".parse::<ArtifactKey>().is_err());
        assert!("ZZ:1".parse::<ArtifactKey>().is_err());
        assert!("RQ:abc".parse::<ArtifactKey>().is_err());
        assert!("RQ:0".parse::<ArtifactKey>().is_err());
    }

    #[test]
    fn category_parses_names_and_tokens() {
        assert_eq!("incidents".parse::<Category>(), Ok(Category::Incident));
        assert_eq!("RQ".parse::<Category>(), Ok(Category::Requirement));
        assert!("epic".parse::<Category>().is_err());
    }

    #[test]
    fn per_category_indexes_by_category() {
        let mut slots = PerCategory::from_fn(|c| c == Category::Task);
        assert!(*slots.get(Category::Task));
        assert!(!slots.all(|v| *v));
        assert!(slots.any(|v| *v));
        slots.set(Category::Requirement, true);
        *slots.get_mut(Category::Incident) = true;
        assert!(slots.all(|v| *v));
    }
}
