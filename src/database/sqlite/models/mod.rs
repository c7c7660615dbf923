
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};

/// One execution of the ingestion pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct IngestRun {
    pub id: String,
    pub source: String,
    pub status: RunStatus,
    pub started_at: NaiveDateTime,
    pub finished_at: Option<NaiveDateTime>,
    pub ward_count: i64,
    pub embedded_count: i64,
    pub skipped_count: i64,
    pub pruned_count: i64,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for RunStatus {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            RunStatus::Running => write!(f, "Running"),
            RunStatus::Completed => write!(f, "Completed"),
            RunStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// Counters written when a run completes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunCounts {
    pub ward_count: i64,
    pub embedded_count: i64,
    pub skipped_count: i64,
    pub pruned_count: i64,
}

impl IngestRun {
    #[inline]
    pub fn is_running(&self) -> bool {
        self.status == RunStatus::Running
    }

    #[inline]
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    #[inline]
    pub fn is_failed(&self) -> bool {
        self.status == RunStatus::Failed
    }

    /// Wall-clock duration, once the run has finished
    #[inline]
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|finished| finished - self.started_at)
    }

    #[inline]
    pub fn counts(&self) -> RunCounts {
        RunCounts {
            ward_count: self.ward_count,
            embedded_count: self.embedded_count,
            skipped_count: self.skipped_count,
            pruned_count: self.pruned_count,
        }
    }
}
