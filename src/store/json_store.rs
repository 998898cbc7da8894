use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::badges::Badge;
use crate::session::assessment::AssessmentType;
use crate::store::schema::{
    AttemptHistoryData, AttemptRecord, BadgeData, BadgeRecord, DomainMasteryRecord,
    DomainScoreRecord, EXPORT_VERSION, ExportData, MasteryData, NewAttempt, ProgressData,
    UserProgressRecord,
};
use crate::store::{ProgressStore, StoreError, sort_domain_records, validate_user_id};

const PROGRESS_FILE: &str = "progress.json";
const HISTORY_FILE: &str = "attempts.json";
const MASTERY_FILE: &str = "mastery.json";
const BADGES_FILE: &str = "badges.json";
const LOCK_FILE: &str = ".lock";
/// Present while an import is swapping files; lists the files the import
/// created that had no original.
const IMPORT_MARKER: &str = ".import-pending";

const USER_FILES: [&str; 4] = [PROGRESS_FILE, HISTORY_FILE, MASTERY_FILE, BADGES_FILE];

/// One directory per user under `<base>/users/`, one JSON document per
/// record kind. Every read-modify-write holds an exclusive lock on the
/// user's lock file, so concurrent processes cannot lose each other's writes.
pub struct JsonStore {
    base_dir: PathBuf,
}

impl JsonStore {
    pub fn new() -> Result<Self, StoreError> {
        let base_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("acpquiz");
        Self::with_base_dir(base_dir)
    }

    pub fn with_base_dir(base_dir: PathBuf) -> Result<Self, StoreError> {
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn user_dir(&self, user_id: &str) -> Result<PathBuf, StoreError> {
        validate_user_id(user_id)?;
        Ok(self.base_dir.join("users").join(user_id))
    }

    fn load<T: DeserializeOwned + Default>(dir: &Path, name: &str) -> Result<T, StoreError> {
        let path = dir.join(name);
        if !path.exists() {
            return Ok(T::default());
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save<T: Serialize>(dir: &Path, name: &str, data: &T) -> Result<(), StoreError> {
        let path = dir.join(name);
        let tmp_path = path.with_extension("tmp");

        let json = serde_json::to_string_pretty(data)?;
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;

        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    /// Run `f` on the user's directory while holding the user's lock.
    fn with_lock<R>(
        &self,
        user_id: &str,
        f: impl FnOnce(&Path) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let dir = self.user_dir(user_id)?;
        fs::create_dir_all(&dir)?;
        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))?;
        lock_file.lock_exclusive()?;
        let result = f(&dir);
        // Dropping the handle releases the lock.
        drop(lock_file);
        result
    }

    /// Repair whatever an interrupted import or save left behind. Returns
    /// whether anything needed repair.
    ///
    /// With the import marker present the swap never finished, so every
    /// backup is put back and files the import created are removed. Without
    /// it the swap completed and only backups whose original is missing are
    /// restored; the rest are deleted. Stale temp files are always removed.
    pub fn check_interrupted_import(&self, user_id: &str) -> Result<bool, StoreError> {
        self.with_lock(user_id, |dir| {
            let mut found = false;
            let marker = dir.join(IMPORT_MARKER);
            let rolling_back = marker.exists();
            let created: Vec<String> = if rolling_back {
                found = true;
                fs::read_to_string(&marker)
                    .ok()
                    .and_then(|content| serde_json::from_str(&content).ok())
                    .unwrap_or_default()
            } else {
                Vec::new()
            };

            for name in USER_FILES {
                let path = dir.join(name);
                let bak_path = path.with_extension("json.bak");
                if bak_path.exists() {
                    found = true;
                    if rolling_back || !path.exists() {
                        warn!(path = %path.display(), "restoring backup from interrupted import");
                        fs::rename(&bak_path, &path)?;
                    } else {
                        warn!(path = %bak_path.display(), "removing leftover import backup");
                        fs::remove_file(&bak_path)?;
                    }
                } else if rolling_back && created.iter().any(|c| c == name) && path.exists() {
                    found = true;
                    fs::remove_file(&path)?;
                }

                for tmp_path in [path.with_extension("json.tmp"), path.with_extension("tmp")] {
                    if tmp_path.exists() {
                        found = true;
                        debug!(path = %tmp_path.display(), "removing stale temp file");
                        fs::remove_file(&tmp_path)?;
                    }
                }
            }

            if rolling_back {
                fs::remove_file(&marker)?;
            }
            Ok(found)
        })
    }
}

impl ProgressStore for JsonStore {
    /// Bundle everything stored for `user_id`.
    fn export_user(&self, user_id: &str) -> Result<ExportData, StoreError> {
        self.with_lock(user_id, |dir| {
            Ok(ExportData {
                acpquiz_export_version: EXPORT_VERSION,
                exported_at: Utc::now(),
                user_id: user_id.to_string(),
                progress: Self::load(dir, PROGRESS_FILE)?,
                history: Self::load(dir, HISTORY_FILE)?,
                mastery: Self::load(dir, MASTERY_FILE)?,
                badges: Self::load(dir, BADGES_FILE)?,
            })
        })
    }

    /// Replace a user's data with an export, all files or none.
    ///
    /// Stage phase: write every file as `.json.tmp`; any failure removes the
    /// staged files and leaves the originals alone.
    /// Commit phase: move each original to `.json.bak`, then the staged file
    /// into place. A failure restores the backups of everything committed so
    /// far. The import marker brackets this phase so a crash inside it can
    /// be rolled back by `check_interrupted_import`. Backups are deleted once
    /// all files are in place.
    fn import_user(&self, data: &ExportData) -> Result<(), StoreError> {
        if data.acpquiz_export_version != EXPORT_VERSION {
            return Err(StoreError::UnsupportedExportVersion {
                found: data.acpquiz_export_version,
                expected: EXPORT_VERSION,
            });
        }

        let files: Vec<(&str, String)> = vec![
            (PROGRESS_FILE, serde_json::to_string_pretty(&data.progress)?),
            (HISTORY_FILE, serde_json::to_string_pretty(&data.history)?),
            (MASTERY_FILE, serde_json::to_string_pretty(&data.mastery)?),
            (BADGES_FILE, serde_json::to_string_pretty(&data.badges)?),
        ];

        self.with_lock(&data.user_id, |dir| {
            let mut staged: Vec<PathBuf> = Vec::new();
            for (name, json) in &files {
                let tmp_path = dir.join(name).with_extension("json.tmp");
                let write = || -> std::io::Result<()> {
                    let mut file = fs::File::create(&tmp_path)?;
                    file.write_all(json.as_bytes())?;
                    file.sync_all()
                };
                if let Err(source) = write() {
                    for tmp in &staged {
                        let _ = fs::remove_file(tmp);
                    }
                    return Err(StoreError::Import {
                        stage: "staging",
                        source,
                    });
                }
                staged.push(tmp_path);
            }

            let marker = dir.join(IMPORT_MARKER);
            let created: Vec<&str> = files
                .iter()
                .map(|(name, _)| *name)
                .filter(|name| !dir.join(name).exists())
                .collect();
            let write_marker = || -> std::io::Result<()> {
                let mut file = fs::File::create(&marker)?;
                file.write_all(serde_json::to_string(&created)?.as_bytes())?;
                file.sync_all()
            };
            if let Err(source) = write_marker() {
                let _ = fs::remove_file(&marker);
                for tmp in &staged {
                    let _ = fs::remove_file(tmp);
                }
                return Err(StoreError::Import {
                    stage: "commit (marker)",
                    source,
                });
            }

            // (final_path, bak_path, had_original)
            let mut committed: Vec<(PathBuf, PathBuf, bool)> = Vec::new();
            let rollback = |committed: &[(PathBuf, PathBuf, bool)]| {
                for (final_path, bak_path, had_original) in committed {
                    if *had_original {
                        let _ = fs::rename(bak_path, final_path);
                    } else {
                        let _ = fs::remove_file(final_path);
                    }
                }
                let _ = fs::remove_file(&marker);
            };

            for (i, (name, _)) in files.iter().enumerate() {
                let final_path = dir.join(name);
                let bak_path = final_path.with_extension("json.bak");
                let had_original = final_path.exists();

                if had_original && let Err(source) = fs::rename(&final_path, &bak_path) {
                    rollback(&committed);
                    for tmp in &staged {
                        let _ = fs::remove_file(tmp);
                    }
                    return Err(StoreError::Import {
                        stage: "commit (backup)",
                        source,
                    });
                }

                if let Err(source) = fs::rename(&staged[i], &final_path) {
                    if had_original {
                        let _ = fs::rename(&bak_path, &final_path);
                    }
                    rollback(&committed);
                    for tmp in &staged[i..] {
                        let _ = fs::remove_file(tmp);
                    }
                    return Err(StoreError::Import {
                        stage: "commit (rename)",
                        source,
                    });
                }

                committed.push((final_path, bak_path, had_original));
            }

            if let Err(source) = fs::remove_file(&marker) {
                rollback(&committed);
                return Err(StoreError::Import {
                    stage: "commit (marker)",
                    source,
                });
            }
            for (_, bak_path, had_original) in &committed {
                if *had_original {
                    let _ = fs::remove_file(bak_path);
                }
            }
            info!(user = %data.user_id, "imported user data");
            Ok(())
        })
    }

    fn append_attempt(&self, attempt: NewAttempt) -> Result<AttemptRecord, StoreError> {
        let user_id = attempt.user_id.clone();
        self.with_lock(&user_id, |dir| {
            let mut history: AttemptHistoryData = Self::load(dir, HISTORY_FILE)?;
            let record = AttemptRecord::from_new(attempt);
            history.attempts.push(record.clone());
            Self::save(dir, HISTORY_FILE, &history)?;
            debug!(attempt = %record.id, "appended quiz attempt");
            Ok(record)
        })
    }

    fn append_domain_score(&self, user_id: &str, score: DomainScoreRecord) -> Result<(), StoreError> {
        self.with_lock(user_id, |dir| {
            let mut history: AttemptHistoryData = Self::load(dir, HISTORY_FILE)?;
            if !history.attempts.iter().any(|a| a.id == score.quiz_attempt_id) {
                return Err(StoreError::UnknownAttempt(score.quiz_attempt_id));
            }
            history.domain_scores.push(score);
            Self::save(dir, HISTORY_FILE, &history)
        })
    }

    fn attempts(
        &self,
        user_id: &str,
        assessment: Option<AssessmentType>,
    ) -> Result<Vec<AttemptRecord>, StoreError> {
        let history: AttemptHistoryData =
            self.with_lock(user_id, |dir| Self::load(dir, HISTORY_FILE))?;
        let mut attempts: Vec<AttemptRecord> = history
            .attempts
            .into_iter()
            .filter(|a| assessment.is_none_or(|kind| a.assessment_type == kind))
            .collect();
        attempts.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(attempts)
    }

    fn domain_scores(&self, user_id: &str, attempt_id: Uuid) -> Result<Vec<DomainScoreRecord>, StoreError> {
        let history: AttemptHistoryData =
            self.with_lock(user_id, |dir| Self::load(dir, HISTORY_FILE))?;
        let mut scores: Vec<DomainScoreRecord> = history
            .domain_scores
            .into_iter()
            .filter(|s| s.quiz_attempt_id == attempt_id)
            .collect();
        sort_domain_records(&mut scores, |s| s.domain_code.as_str());
        Ok(scores)
    }

    fn load_progress(&self, user_id: &str) -> Result<Option<UserProgressRecord>, StoreError> {
        let data: ProgressData = self.with_lock(user_id, |dir| Self::load(dir, PROGRESS_FILE))?;
        Ok(data.progress)
    }

    fn upsert_progress(&self, record: &UserProgressRecord) -> Result<UserProgressRecord, StoreError> {
        self.with_lock(&record.user_id, |dir| {
            let mut data: ProgressData = Self::load(dir, PROGRESS_FILE)?;
            let merged = UserProgressRecord::merge_into(data.progress.as_ref(), record)?;
            data.progress = Some(merged.clone());
            Self::save(dir, PROGRESS_FILE, &data)?;
            debug!(user = %merged.user_id, revision = merged.revision, "upserted progress");
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
        self.with_lock(user_id, |dir| {
            let mut data: MasteryData = Self::load(dir, MASTERY_FILE)?;
            let idx = data.domains.iter().position(|d| d.domain_code == domain_code);
            let merged = DomainMasteryRecord::merged(
                idx.map(|i| &data.domains[i]),
                user_id,
                domain_code,
                domain_name,
                score_percentage,
            );
            match idx {
                Some(i) => data.domains[i] = merged.clone(),
                None => data.domains.push(merged.clone()),
            }
            Self::save(dir, MASTERY_FILE, &data)?;
            Ok(merged)
        })
    }

    fn mastery(&self, user_id: &str) -> Result<Vec<DomainMasteryRecord>, StoreError> {
        let data: MasteryData = self.with_lock(user_id, |dir| Self::load(dir, MASTERY_FILE))?;
        let mut domains = data.domains;
        sort_domain_records(&mut domains, |d| d.domain_code.as_str());
        Ok(domains)
    }

    fn earn_badge(
        &self,
        user_id: &str,
        badge: &Badge,
        earned_at: DateTime<Utc>,
    ) -> Result<Option<BadgeRecord>, StoreError> {
        self.with_lock(user_id, |dir| {
            let mut data: BadgeData = Self::load(dir, BADGES_FILE)?;
            if data.badges.iter().any(|b| b.badge_name == badge.name) {
                debug!(badge = %badge.name, "badge already earned");
                return Ok(None);
            }
            let record = BadgeRecord::new(user_id, badge, earned_at);
            data.badges.push(record.clone());
            Self::save(dir, BADGES_FILE, &data)?;
            Ok(Some(record))
        })
    }

    fn badges(&self, user_id: &str) -> Result<Vec<BadgeRecord>, StoreError> {
        let data: BadgeData = self.with_lock(user_id, |dir| Self::load(dir, BADGES_FILE))?;
        let mut badges = data.badges;
        badges.sort_by(|a, b| a.earned_at.cmp(&b.earned_at));
        Ok(badges)
    }
}
