//! Consultation request models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::db::sqlite_text_enum;

pub const MIN_COMPLAINT_LEN: usize = 3;
pub const MAX_COMPLAINT_LEN: usize = 2000;

/// Lifecycle of a consultation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl ConsultationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationStatus::Pending => "pending",
            ConsultationStatus::InProgress => "in_progress",
            ConsultationStatus::Completed => "completed",
            ConsultationStatus::Cancelled => "cancelled",
        }
    }

    /// Members may cancel while a request is still open.
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            ConsultationStatus::Pending | ConsultationStatus::InProgress
        )
    }
}

impl std::fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConsultationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ConsultationStatus::Pending),
            "in_progress" => Ok(ConsultationStatus::InProgress),
            "completed" => Ok(ConsultationStatus::Completed),
            "cancelled" => Ok(ConsultationStatus::Cancelled),
            _ => Err(format!("Invalid consultation status: {}", s)),
        }
    }
}

sqlite_text_enum!(ConsultationStatus);

/// Consultation request entity from database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Consultation {
    pub id: String,
    pub membership_id: String,
    pub person_id: String,
    pub chief_complaint: String,
    pub status: ConsultationStatus,
    pub clinician_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub cancelled_at: Option<String>,
    pub completed_at: Option<String>,
}

/// Request to open a consultation.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateConsultationRequest {
    /// Covered person the consultation is for.
    pub person_id: String,
    pub chief_complaint: String,
}

/// Query parameters for the clinician queue.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsultationQueueQuery {
    pub status: Option<ConsultationStatus>,
}
