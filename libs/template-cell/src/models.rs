// libs/template-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==============================================================================
// CATALOG MODELS
// ==============================================================================

/// Whether a catalog entry is an exercise task or a meal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Task,
    Meal,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Task => write!(f, "task"),
            ItemKind::Meal => write!(f, "meal"),
        }
    }
}

/// One task/meal definition in the shared catalog. Authoring these is a
/// separate admin concern; templates only reference them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanItem {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub multimedia_link: Option<String>,
    pub kind: ItemKind,
}

// ==============================================================================
// TEMPLATE MODELS
// ==============================================================================

/// Template header row as stored in `schedule_templates`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub id: Uuid,
    pub title: String,
    pub number_of_weeks: i32,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// One row of `template_entries`: item X, `times_per_week` times in week N.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateEntryRecord {
    pub id: Uuid,
    pub template_id: Uuid,
    pub week_number: i32,
    pub item_id: Uuid,
    pub item_kind: ItemKind,
    pub times_per_week: i32,
    pub repetition_count: Option<i32>,
}

/// In-memory template: header plus entries grouped by week, the shape the
/// schedule expander consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleTemplate {
    pub id: Uuid,
    pub title: String,
    pub number_of_weeks: i32,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub weeks: Vec<TemplateWeek>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateWeek {
    pub week_number: i32,
    pub entries: Vec<TemplateEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateEntry {
    pub item_id: Uuid,
    pub item_kind: ItemKind,
    pub times_per_week: i32,
    pub repetition_count: Option<i32>,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTemplateRequest {
    pub title: String,
    pub number_of_weeks: i32,
    pub weeks: Vec<CreateTemplateWeek>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTemplateWeek {
    pub week_number: i32,
    pub entries: Vec<CreateTemplateEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTemplateEntry {
    pub item_id: Uuid,
    pub times_per_week: i32,
    pub repetition_count: Option<i32>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum TemplateError {
    #[error("Template not found")]
    NotFound,

    #[error("Unknown catalog item: {0}")]
    ItemNotFound(Uuid),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unauthorized access to template")]
    Unauthorized,

    #[error("Database error: {0}")]
    DatabaseError(String),
}
