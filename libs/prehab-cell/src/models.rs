// libs/prehab-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use template_cell::models::ItemKind;

// ==============================================================================
// CORE PREHAB MODELS
// ==============================================================================

/// One patient's enrollment into a schedule template, bounded by an
/// initiation date and a target surgery date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prehab {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub created_by: Uuid,
    pub template_id: Uuid,
    pub init_date: NaiveDate,
    pub surgery_date: NaiveDate,
    pub number_of_weeks: i32,
    pub status: PrehabStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Prehab {
    pub fn expected_end_date(&self) -> NaiveDate {
        self.init_date + Duration::days(self.number_of_weeks as i64 * 7)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PrehabStatus {
    Pending,
    Active,
    Completed,
    Cancelled,
}

impl fmt::Display for PrehabStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrehabStatus::Pending => write!(f, "pending"),
            PrehabStatus::Active => write!(f, "active"),
            PrehabStatus::Completed => write!(f, "completed"),
            PrehabStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl PrehabStatus {
    /// Valid next statuses from the current one. Completed and Cancelled are
    /// terminal.
    pub fn valid_transitions(&self) -> Vec<PrehabStatus> {
        match self {
            PrehabStatus::Pending => vec![PrehabStatus::Active, PrehabStatus::Cancelled],
            PrehabStatus::Active => vec![PrehabStatus::Completed, PrehabStatus::Cancelled],
            PrehabStatus::Completed => vec![],
            PrehabStatus::Cancelled => vec![],
        }
    }
}

// ==============================================================================
// SCHEDULED ITEM MODELS
// ==============================================================================

/// One concrete, dated occurrence of a task or meal for a patient, produced
/// by the schedule expander. Never deleted; completion history feeds the
/// statistics aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledItem {
    pub id: Uuid,
    pub prehab_id: Uuid,
    pub week_number: i32,
    pub day_number: i32,
    pub item_id: Uuid,
    pub item_kind: ItemKind,
    /// Insertion order assigned at expansion time; the listing sort key.
    pub sequence: i32,
    pub expected_repetitions: Option<i32>,
    pub actual_repetitions: Option<i32>,
    pub status: ScheduledItemStatus,
    pub finished_date: Option<DateTime<Utc>>,
    pub was_difficult: bool,
    pub patient_notes: Option<String>,
    pub seen_by_doctor: bool,
    pub doctor_notes: Option<String>,
    pub scheduled_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScheduledItemStatus {
    Pending,
    Completed,
    NotCompleted,
}

impl fmt::Display for ScheduledItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduledItemStatus::Pending => write!(f, "pending"),
            ScheduledItemStatus::Completed => write!(f, "completed"),
            ScheduledItemStatus::NotCompleted => write!(f, "not_completed"),
        }
    }
}

impl ScheduledItemStatus {
    /// Completed and NotCompleted are terminal; an item is only ever marked
    /// done once.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScheduledItemStatus::Completed | ScheduledItemStatus::NotCompleted)
    }
}

/// Expander output: a scheduled item before it has a row, an owner or a
/// lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledItemDraft {
    pub week_number: i32,
    pub day_number: i32,
    pub item_id: Uuid,
    pub item_kind: ItemKind,
    pub sequence: i32,
    pub expected_repetitions: Option<i32>,
    pub scheduled_date: NaiveDate,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePrehabRequest {
    pub patient_id: Uuid,
    pub template_id: Uuid,
    pub init_date: NaiveDate,
    pub surgery_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePrehabStatusRequest {
    pub status: PrehabStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrehabSearchQuery {
    pub patient_id: Option<Uuid>,
    pub status: Option<PrehabStatus>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

/// Adherence report for a patient's plan, computed against the current date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrehabReport {
    pub patient_id: Uuid,
    pub prehab_id: Uuid,
    pub prehab_week_number: i32,
    pub prehab_start_date: NaiveDate,
    pub prehab_expected_end_date: NaiveDate,
    pub surgery_day: NaiveDate,
    /// Signed day count relative to the surgery date; None while the
    /// countdown is non-positive.
    pub days_until_surgery: Option<i64>,
    pub total_activities: usize,
    pub total_activities_until_now: usize,
    pub activities_done: usize,
    pub activities_with_difficulty: usize,
    pub activities_not_done: usize,
    pub prehab_status: PrehabStatus,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum PrehabError {
    #[error("Prehab not found")]
    NotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Template not found")]
    TemplateNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Prehab cannot be modified in current status: {0}")]
    InvalidStatusTransition(PrehabStatus),

    #[error("Unauthorized access to prehab")]
    Unauthorized,

    #[error("Concurrent update lost: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
