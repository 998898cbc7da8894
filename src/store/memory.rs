use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::engine::badges::Badge;
use crate::session::assessment::AssessmentType;
use crate::store::schema::{
    AttemptHistoryData, AttemptRecord, BadgeData, BadgeRecord, DomainMasteryRecord,
    DomainScoreRecord, EXPORT_VERSION, ExportData, MasteryData, NewAttempt, ProgressData,
    UserProgressRecord,
};
use crate::store::{ProgressStore, StoreError, sort_domain_records, validate_user_id};

#[derive(Default)]
struct UserData {
    progress: Option<UserProgressRecord>,
    attempts: Vec<AttemptRecord>,
    domain_scores: Vec<DomainScoreRecord>,
    mastery: Vec<DomainMasteryRecord>,
    badges: Vec<BadgeRecord>,
}

/// Process-local store with the same semantics as `JsonStore`.
#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<String, UserData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_user<R>(
        &self,
        user_id: &str,
        f: impl FnOnce(&mut UserData) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        validate_user_id(user_id)?;
        let mut users = self.lock();
        f(users.entry(user_id.to_string()).or_default())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, UserData>> {
        self.users.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ProgressStore for MemoryStore {
    fn append_attempt(&self, attempt: NewAttempt) -> Result<AttemptRecord, StoreError> {
        let user_id = attempt.user_id.clone();
        self.with_user(&user_id, |data| {
            let record = AttemptRecord::from_new(attempt);
            data.attempts.push(record.clone());
            Ok(record)
        })
    }

    fn append_domain_score(&self, user_id: &str, score: DomainScoreRecord) -> Result<(), StoreError> {
        self.with_user(user_id, |data| {
            if !data.attempts.iter().any(|a| a.id == score.quiz_attempt_id) {
                return Err(StoreError::UnknownAttempt(score.quiz_attempt_id));
            }
            data.domain_scores.push(score);
            Ok(())
        })
    }

    fn attempts(
        &self,
        user_id: &str,
        assessment: Option<AssessmentType>,
    ) -> Result<Vec<AttemptRecord>, StoreError> {
        self.with_user(user_id, |data| {
            let mut attempts: Vec<AttemptRecord> = data
                .attempts
                .iter()
                .filter(|a| assessment.is_none_or(|kind| a.assessment_type == kind))
                .cloned()
                .collect();
            attempts.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
            Ok(attempts)
        })
    }

    fn domain_scores(&self, user_id: &str, attempt_id: Uuid) -> Result<Vec<DomainScoreRecord>, StoreError> {
        self.with_user(user_id, |data| {
            let mut scores: Vec<DomainScoreRecord> = data
                .domain_scores
                .iter()
                .filter(|s| s.quiz_attempt_id == attempt_id)
                .cloned()
                .collect();
            sort_domain_records(&mut scores, |s| s.domain_code.as_str());
            Ok(scores)
        })
    }

    fn load_progress(&self, user_id: &str) -> Result<Option<UserProgressRecord>, StoreError> {
        self.with_user(user_id, |data| Ok(data.progress.clone()))
    }

    fn upsert_progress(&self, record: &UserProgressRecord) -> Result<UserProgressRecord, StoreError> {
        self.with_user(&record.user_id, |data| {
            let merged = UserProgressRecord::merge_into(data.progress.as_ref(), record)?;
            data.progress = Some(merged.clone());
            Ok(merged)
        })
    }

    fn upsert_mastery(
        &self,
        user_id: &str,
        domain_code: &str,
        domain_name: &str,
        score_percentage: f64,
    ) -> Result<DomainMasteryRecord, StoreError> {
        self.with_user(user_id, |data| {
            let idx = data.mastery.iter().position(|d| d.domain_code == domain_code);
            let merged = DomainMasteryRecord::merged(
                idx.map(|i| &data.mastery[i]),
                user_id,
                domain_code,
                domain_name,
                score_percentage,
            );
            match idx {
                Some(i) => data.mastery[i] = merged.clone(),
                None => data.mastery.push(merged.clone()),
            }
            Ok(merged)
        })
    }

    fn mastery(&self, user_id: &str) -> Result<Vec<DomainMasteryRecord>, StoreError> {
        self.with_user(user_id, |data| {
            let mut domains = data.mastery.clone();
            sort_domain_records(&mut domains, |d| d.domain_code.as_str());
            Ok(domains)
        })
    }

    fn earn_badge(
        &self,
        user_id: &str,
        badge: &Badge,
        earned_at: DateTime<Utc>,
    ) -> Result<Option<BadgeRecord>, StoreError> {
        self.with_user(user_id, |data| {
            if data.badges.iter().any(|b| b.badge_name == badge.name) {
                return Ok(None);
            }
            let record = BadgeRecord::new(user_id, badge, earned_at);
            data.badges.push(record.clone());
            Ok(Some(record))
        })
    }

    fn badges(&self, user_id: &str) -> Result<Vec<BadgeRecord>, StoreError> {
        self.with_user(user_id, |data| {
            let mut badges = data.badges.clone();
            badges.sort_by(|a, b| a.earned_at.cmp(&b.earned_at));
            Ok(badges)
        })
    }

    fn export_user(&self, user_id: &str) -> Result<ExportData, StoreError> {
        self.with_user(user_id, |data| {
            Ok(ExportData {
                acpquiz_export_version: EXPORT_VERSION,
                exported_at: Utc::now(),
                user_id: user_id.to_string(),
                progress: ProgressData {
                    progress: data.progress.clone(),
                    ..ProgressData::default()
                },
                history: AttemptHistoryData {
                    attempts: data.attempts.clone(),
                    domain_scores: data.domain_scores.clone(),
                    ..AttemptHistoryData::default()
                },
                mastery: MasteryData {
                    domains: data.mastery.clone(),
                    ..MasteryData::default()
                },
                badges: BadgeData {
                    badges: data.badges.clone(),
                    ..BadgeData::default()
                },
            })
        })
    }

    fn import_user(&self, export: &ExportData) -> Result<(), StoreError> {
        if export.acpquiz_export_version != EXPORT_VERSION {
            return Err(StoreError::UnsupportedExportVersion {
                found: export.acpquiz_export_version,
                expected: EXPORT_VERSION,
            });
        }
        self.with_user(&export.user_id, |data| {
            *data = UserData {
                progress: export.progress.progress.clone(),
                attempts: export.history.attempts.clone(),
                domain_scores: export.history.domain_scores.clone(),
                mastery: export.mastery.domains.clone(),
                badges: export.badges.badges.clone(),
            };
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::badges::BadgeKind;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_users_are_isolated() {
        let store = MemoryStore::new();
        store.upsert_progress(&UserProgressRecord::new("ana")).unwrap();
        assert!(store.load_progress("ana").unwrap().is_some());
        assert!(store.load_progress("ben").unwrap().is_none());
    }

    #[test]
    fn test_badge_earned_once() {
        let store = MemoryStore::new();
        let badge = BadgeKind::DomainMaster("VI".to_string()).to_badge();
        assert!(store.earn_badge("ana", &badge, Utc::now()).unwrap().is_some());
        assert!(store.earn_badge("ana", &badge, Utc::now()).unwrap().is_none());
        assert_eq!(store.badges("ana").unwrap().len(), 1);
    }

    #[test]
    fn test_concurrent_upserts_one_wins() {
        let store = Arc::new(MemoryStore::new());
        let base = store.upsert_progress(&UserProgressRecord::new("ana")).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                let mut record = base.clone();
                record.current_xp = i * 10;
                thread::spawn(move || store.upsert_progress(&record).is_ok())
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(wins, 1);
        assert_eq!(store.load_progress("ana").unwrap().unwrap().revision, 2);
    }

    #[test]
    fn test_export_import_replaces_user_data() {
        let source = MemoryStore::new();
        let mut progress = UserProgressRecord::new("ana");
        progress.current_xp = 130;
        source.upsert_progress(&progress).unwrap();
        source
            .earn_badge("ana", &BadgeKind::FirstStep.to_badge(), Utc::now())
            .unwrap();
        let export = source.export_user("ana").unwrap();

        let target = MemoryStore::new();
        target
            .earn_badge("ana", &BadgeKind::SpeedDemon.to_badge(), Utc::now())
            .unwrap();
        target.import_user(&export).unwrap();

        assert_eq!(target.load_progress("ana").unwrap().unwrap().current_xp, 130);
        let names: Vec<String> = target
            .badges("ana")
            .unwrap()
            .into_iter()
            .map(|b| b.badge_name)
            .collect();
        assert_eq!(names, vec!["First Step".to_string()]);

        let mut future = export.clone();
        future.acpquiz_export_version = EXPORT_VERSION + 1;
        assert!(matches!(
            target.import_user(&future),
            Err(StoreError::UnsupportedExportVersion { .. })
        ));
    }

    #[test]
    fn test_unknown_attempt_rejected() {
        let store = MemoryStore::new();
        let err = store
            .append_domain_score("ana", DomainScoreRecord::new(Uuid::new_v4(), "I", "x", 1, 1))
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownAttempt(_)));
    }
}
