use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::badges::Badge;
use crate::engine::domain::MasteryStatus;
use crate::session::assessment::AssessmentType;
use crate::store::StoreError;

pub const SCHEMA_VERSION: u32 = 1;
pub const EXPORT_VERSION: u32 = 1;

// --- Records ---

/// Attempt fields supplied by the caller; the store assigns id and score.
#[derive(Clone, Debug, PartialEq)]
pub struct NewAttempt {
    pub user_id: String,
    pub assessment_type: AssessmentType,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub time_taken_seconds: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub id: Uuid,
    pub user_id: String,
    pub assessment_type: AssessmentType,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub score_percentage: f64,
    pub time_taken_seconds: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl AttemptRecord {
    pub fn from_new(attempt: NewAttempt) -> Self {
        let score_percentage = if attempt.total_questions == 0 {
            0.0
        } else {
            attempt.correct_answers as f64 / attempt.total_questions as f64 * 100.0
        };
        Self {
            id: Uuid::new_v4(),
            user_id: attempt.user_id,
            assessment_type: attempt.assessment_type,
            total_questions: attempt.total_questions,
            correct_answers: attempt.correct_answers,
            score_percentage,
            time_taken_seconds: attempt.time_taken_seconds,
            started_at: attempt.started_at,
            completed_at: attempt.completed_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DomainScoreRecord {
    pub quiz_attempt_id: Uuid,
    pub domain_code: String,
    pub domain_name: String,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub score_percentage: f64,
}

impl DomainScoreRecord {
    pub fn new(
        quiz_attempt_id: Uuid,
        domain_code: &str,
        domain_name: &str,
        correct_answers: u32,
        total_questions: u32,
    ) -> Self {
        let score_percentage = if total_questions == 0 {
            0.0
        } else {
            correct_answers as f64 / total_questions as f64 * 100.0
        };
        Self {
            quiz_attempt_id,
            domain_code: domain_code.to_string(),
            domain_name: domain_name.to_string(),
            total_questions,
            correct_answers,
            score_percentage,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserProgressRecord {
    pub user_id: String,
    pub total_attempts: u32,
    pub total_correct: u32,
    pub total_questions: u32,
    pub overall_percentage: f64,
    pub current_xp: u32,
    pub current_level: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
    #[serde(default)]
    pub last_completed_at: Option<DateTime<Utc>>,
    /// Incremented by the store on every successful upsert.
    #[serde(default)]
    pub revision: u64,
    pub updated_at: DateTime<Utc>,
}

impl UserProgressRecord {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            total_attempts: 0,
            total_correct: 0,
            total_questions: 0,
            overall_percentage: 0.0,
            current_xp: 0,
            current_level: 1,
            current_streak: 0,
            longest_streak: 0,
            last_completed_at: None,
            revision: 0,
            updated_at: Utc::now(),
        }
    }

    /// Conditional upsert: `incoming` must carry the revision currently
    /// stored (0 when nothing is stored yet).
    pub fn merge_into(
        stored: Option<&UserProgressRecord>,
        incoming: &UserProgressRecord,
    ) -> Result<UserProgressRecord, StoreError> {
        let found = stored.map_or(0, |s| s.revision);
        if found != incoming.revision {
            return Err(StoreError::Conflict {
                user_id: incoming.user_id.clone(),
                expected: incoming.revision,
                found,
            });
        }
        let mut merged = incoming.clone();
        merged.revision = found + 1;
        merged.updated_at = Utc::now();
        Ok(merged)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DomainMasteryRecord {
    pub user_id: String,
    pub domain_code: String,
    pub domain_name: String,
    pub average_percentage: f64,
    #[serde(default)]
    pub attempts_counted: u32,
    pub status: MasteryStatus,
    pub updated_at: DateTime<Utc>,
}

impl DomainMasteryRecord {
    /// Fold one more domain score into the running average.
    pub fn merged(
        previous: Option<&DomainMasteryRecord>,
        user_id: &str,
        domain_code: &str,
        domain_name: &str,
        score_percentage: f64,
    ) -> Self {
        let (sum, count) = previous.map_or((0.0, 0), |p| {
            let count = p.weight();
            (p.average_percentage * count as f64, count)
        });
        let attempts_counted = count + 1;
        let average_percentage = (sum + score_percentage) / attempts_counted as f64;
        Self {
            user_id: user_id.to_string(),
            domain_code: domain_code.to_string(),
            domain_name: domain_name.to_string(),
            average_percentage,
            attempts_counted,
            status: MasteryStatus::from_percentage(average_percentage),
            updated_at: Utc::now(),
        }
    }

    /// Scores behind the stored average. Records written without a count
    /// but with an average stand for one score.
    fn weight(&self) -> u32 {
        if self.attempts_counted == 0 && self.average_percentage != 0.0 {
            1
        } else {
            self.attempts_counted
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeRecord {
    pub user_id: String,
    pub badge_name: String,
    pub badge_icon: String,
    pub earned_at: DateTime<Utc>,
}

impl BadgeRecord {
    pub fn new(user_id: &str, badge: &Badge, earned_at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            badge_name: badge.name.clone(),
            badge_icon: badge.icon.clone(),
            earned_at,
        }
    }
}

// --- Persisted Files ---

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressData {
    pub schema_version: u32,
    pub progress: Option<UserProgressRecord>,
}

impl Default for ProgressData {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            progress: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttemptHistoryData {
    pub schema_version: u32,
    pub attempts: Vec<AttemptRecord>,
    pub domain_scores: Vec<DomainScoreRecord>,
}

impl Default for AttemptHistoryData {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            attempts: Vec::new(),
            domain_scores: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MasteryData {
    pub schema_version: u32,
    pub domains: Vec<DomainMasteryRecord>,
}

impl Default for MasteryData {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            domains: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BadgeData {
    pub schema_version: u32,
    pub badges: Vec<BadgeRecord>,
}

impl Default for BadgeData {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            badges: Vec::new(),
        }
    }
}

/// One user's complete data set, as written by `export`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportData {
    pub acpquiz_export_version: u32,
    pub exported_at: DateTime<Utc>,
    pub user_id: String,
    pub progress: ProgressData,
    pub history: AttemptHistoryData,
    pub mastery: MasteryData,
    pub badges: BadgeData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_upsert_needs_revision_zero() {
        let incoming = UserProgressRecord::new("ana");
        let merged = UserProgressRecord::merge_into(None, &incoming).unwrap();
        assert_eq!(merged.revision, 1);

        let mut stale = incoming.clone();
        stale.revision = 3;
        assert!(UserProgressRecord::merge_into(None, &stale).is_err());
    }

    #[test]
    fn test_stale_revision_conflicts() {
        let stored = UserProgressRecord::merge_into(None, &UserProgressRecord::new("ana")).unwrap();
        let mut ok = stored.clone();
        ok.current_xp = 40;
        let merged = UserProgressRecord::merge_into(Some(&stored), &ok).unwrap();
        assert_eq!(merged.revision, 2);
        assert_eq!(merged.current_xp, 40);

        // Another writer still holding revision 1 loses.
        let err = UserProgressRecord::merge_into(Some(&merged), &ok).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { expected: 1, found: 2, .. }));
    }

    #[test]
    fn test_mastery_running_average() {
        let first = DomainMasteryRecord::merged(None, "ana", "II", "Value-Driven Delivery", 100.0);
        assert_eq!(first.attempts_counted, 1);
        assert_eq!(first.status, MasteryStatus::Mastered);

        let second = DomainMasteryRecord::merged(Some(&first), "ana", "II", "Value-Driven Delivery", 50.0);
        assert_eq!(second.attempts_counted, 2);
        assert!((second.average_percentage - 75.0).abs() < 1e-9);
        assert_eq!(second.status, MasteryStatus::InProgress);
    }

    #[test]
    fn test_mastery_without_count_keeps_its_average() {
        let legacy: DomainMasteryRecord = serde_json::from_str(
            r#"{
                "user_id": "ana",
                "domain_code": "III",
                "domain_name": "Stakeholder Engagement",
                "average_percentage": 90.0,
                "status": "MASTERED",
                "updated_at": "2025-03-01T09:00:00Z"
            }"#,
        )
        .unwrap();
        assert_eq!(legacy.attempts_counted, 0);

        let next = DomainMasteryRecord::merged(Some(&legacy), "ana", "III", "Stakeholder Engagement", 70.0);
        assert_eq!(next.attempts_counted, 2);
        assert!((next.average_percentage - 80.0).abs() < 1e-9);
        assert_eq!(next.status, MasteryStatus::Mastered);
    }

    #[test]
    fn test_attempt_score_is_derived() {
        let now = Utc::now();
        let record = AttemptRecord::from_new(NewAttempt {
            user_id: "ana".to_string(),
            assessment_type: AssessmentType::Checkpoint,
            total_questions: 8,
            correct_answers: 6,
            time_taken_seconds: 300,
            started_at: now,
            completed_at: now,
        });
        assert!((record.score_percentage - 75.0).abs() < 1e-9);

        let empty = DomainScoreRecord::new(record.id, "I", "Agile Principles & Mindset", 0, 0);
        assert_eq!(empty.score_percentage, 0.0);
    }
}
