pub mod json_store;
pub mod memory;
pub mod schema;

use std::io;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::engine::badges::Badge;
use crate::session::assessment::AssessmentType;
use crate::store::schema::{
    AttemptRecord, BadgeRecord, DomainMasteryRecord, DomainScoreRecord, ExportData, NewAttempt,
    UserProgressRecord,
};

pub use json_store::JsonStore;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("corrupt store data: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid user id '{0}'")]
    InvalidUser(String),
    #[error("unknown quiz attempt {0}")]
    UnknownAttempt(Uuid),
    #[error(
        "progress for '{user_id}' was updated concurrently (expected revision {expected}, found {found})"
    )]
    Conflict {
        user_id: String,
        expected: u64,
        found: u64,
    },
    #[error("Unsupported export version: {found} (expected {expected})")]
    UnsupportedExportVersion { found: u32, expected: u32 },
    #[error("Import failed during {stage}: {source}")]
    Import {
        stage: &'static str,
        source: io::Error,
    },
}

/// Persistence for quiz attempts and everything derived from them.
///
/// Writes either succeed or return an error; the one tolerated conflict is
/// re-earning a badge, which `earn_badge` reports as `Ok(None)`.
pub trait ProgressStore {
    fn append_attempt(&self, attempt: NewAttempt) -> Result<AttemptRecord, StoreError>;

    fn append_domain_score(&self, user_id: &str, score: DomainScoreRecord) -> Result<(), StoreError>;

    /// Newest first, optionally restricted to one assessment type.
    fn attempts(
        &self,
        user_id: &str,
        assessment: Option<AssessmentType>,
    ) -> Result<Vec<AttemptRecord>, StoreError>;

    /// Ordered by domain code.
    fn domain_scores(&self, user_id: &str, attempt_id: Uuid) -> Result<Vec<DomainScoreRecord>, StoreError>;

    fn load_progress(&self, user_id: &str) -> Result<Option<UserProgressRecord>, StoreError>;

    /// Stores `record` only if its `revision` matches the stored one and
    /// returns the stored copy with the revision bumped.
    fn upsert_progress(&self, record: &UserProgressRecord) -> Result<UserProgressRecord, StoreError>;

    fn upsert_mastery(
        &self,
        user_id: &str,
        domain_code: &str,
        domain_name: &str,
        score_percentage: f64,
    ) -> Result<DomainMasteryRecord, StoreError>;

    /// Ordered by domain code.
    fn mastery(&self, user_id: &str) -> Result<Vec<DomainMasteryRecord>, StoreError>;

    fn earn_badge(
        &self,
        user_id: &str,
        badge: &Badge,
        earned_at: DateTime<Utc>,
    ) -> Result<Option<BadgeRecord>, StoreError>;

    /// Oldest first.
    fn badges(&self, user_id: &str) -> Result<Vec<BadgeRecord>, StoreError>;

    fn export_user(&self, user_id: &str) -> Result<ExportData, StoreError>;

    /// Replace everything stored for `data.user_id`. Rejects unknown export
    /// versions and leaves existing data untouched on failure.
    fn import_user(&self, data: &ExportData) -> Result<(), StoreError>;
}

pub(crate) fn sort_domain_records<T>(records: &mut [T], code: impl Fn(&T) -> &str) {
    use crate::engine::domain::Domain;
    records.sort_by(|a, b| {
        let (ca, cb) = (code(a), code(b));
        (Domain::from_code(ca), ca).cmp(&(Domain::from_code(cb), cb))
    });
}

pub(crate) fn validate_user_id(user_id: &str) -> Result<(), StoreError> {
    let valid = !user_id.is_empty()
        && user_id.len() <= 64
        && !user_id.starts_with('.')
        && user_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidUser(user_id.to_string()))
    }
}
