// libs/progress-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use prehab_cell::models::ScheduledItemStatus;

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

/// Patient report on one scheduled item. `completed = false` still closes the
/// item (as NotCompleted); an item is only ever reported once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkDoneRequest {
    pub completed: bool,
    pub difficulties: bool,
    pub notes: Option<String>,
    pub actual_repetitions: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkSeenRequest {
    pub seen: bool,
    pub doctor_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkSeenBulkRequest {
    pub prehab_id: Uuid,
    pub seen: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSearchQuery {
    pub patient_id: Option<Uuid>,
    pub prehab_id: Option<Uuid>,
    pub status: Option<ScheduledItemStatus>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum ProgressError {
    #[error("Scheduled item not found")]
    NotFound,

    #[error("Prehab not found")]
    PrehabNotFound,

    #[error("This activity was already marked as done")]
    AlreadyDone,

    #[error("Concurrent update lost: {0}")]
    Conflict(String),

    #[error("Unauthorized access to scheduled item")]
    Unauthorized,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
