use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::engine::badges::EXAM_READY_PERCENTAGE;
use crate::engine::progress::{AttemptContext, ProgressState, ProgressUpdate, apply_attempt};
use crate::engine::scoring::{self, LevelProgress};
use crate::engine::streak::{StreakState, calendar_days_between};
use crate::session::assessment::AssessmentType;
use crate::session::question::QuestionBank;
use crate::session::quiz::QuizState;
use crate::session::result::QuizResult;
use crate::store::schema::{
    AttemptRecord, BadgeRecord, DomainMasteryRecord, DomainScoreRecord, ExportData, NewAttempt,
    UserProgressRecord,
};
use crate::store::{JsonStore, ProgressStore};

/// Everything that changed when a quiz was recorded.
#[derive(Clone, Debug)]
pub struct CompletionReport {
    pub attempt: AttemptRecord,
    pub update: ProgressUpdate,
    pub progress: UserProgressRecord,
    pub level_progress: LevelProgress,
    /// Badges actually inserted by the store.
    pub awarded: Vec<BadgeRecord>,
    pub mastery: Vec<DomainMasteryRecord>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProgressSummary {
    pub user_id: String,
    pub total_attempts: u32,
    pub total_correct: u32,
    pub total_questions: u32,
    pub overall_percentage: f64,
    pub xp: u32,
    pub level: u32,
    pub level_name: &'static str,
    pub level_progress: LevelProgress,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub badges_earned: usize,
    pub last_completed_at: Option<DateTime<Utc>>,
}

pub struct App {
    pub config: Config,
    store: Box<dyn ProgressStore>,
    rng: SmallRng,
}

impl App {
    /// Open the on-disk store under the configured data directory.
    pub fn new(config: Config) -> Result<Self> {
        let store = JsonStore::with_base_dir(config.data_path())
            .with_context(|| format!("opening data directory {}", config.data_dir))?;
        if store.check_interrupted_import(&config.user_id)? {
            warn!(user = %config.user_id, "repaired files left by an interrupted import or save");
        }
        Ok(Self::with_store(config, Box::new(store)))
    }

    pub fn with_store(config: Config, store: Box<dyn ProgressStore>) -> Self {
        Self {
            config,
            store,
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.config.user_id
    }

    /// Configured file, then configured URL, then the bundled sample bank.
    pub fn load_bank(&self) -> Result<QuestionBank> {
        if let Some(path) = &self.config.question_bank_path {
            debug!(%path, "loading question bank from file");
            return QuestionBank::from_file(Path::new(path))
                .with_context(|| format!("loading question bank {path}"));
        }
        if let Some(url) = &self.config.question_bank_url {
            let cache = self.config.bank_cache_path();
            match QuestionBank::fetch(url, &cache) {
                Ok(bank) => return Ok(bank),
                Err(e) => warn!(error = %e, "falling back to bundled question bank"),
            }
        }
        Ok(QuestionBank::bundled()?)
    }

    pub fn start_quiz(&mut self, bank: &QuestionBank, kind: AssessmentType) -> Result<QuizState> {
        let questions = bank.draw(kind, self.config.shuffle_questions, &mut self.rng)?;
        info!(assessment = kind.id(), questions = questions.len(), "starting quiz");
        let mut quiz = QuizState::new(kind, questions, self.config.seconds_per_question);
        quiz.start();
        Ok(quiz)
    }

    /// Score a finished quiz and persist the attempt, its domain scores,
    /// mastery, any new badges and finally the updated progress.
    ///
    /// Progress is written last and only if no other update landed since it
    /// was loaded, so XP and totals never count an attempt that is not stored.
    pub fn finish_quiz(&self, result: &QuizResult) -> Result<CompletionReport> {
        let user_id = self.user_id();
        let now = result.completed_at;

        let stored = self.store.load_progress(user_id)?;
        let base = stored.unwrap_or_else(|| UserProgressRecord::new(user_id));
        let is_first_quiz = base.total_attempts == 0;
        let days_passed = base
            .last_completed_at
            .map(|last| calendar_days_between(last, now, self.config.utc_offset_minutes));

        let earned: BTreeSet<String> = self
            .store
            .badges(user_id)?
            .into_iter()
            .map(|b| b.badge_name)
            .collect();
        let state = ProgressState::new(
            base.current_xp,
            StreakState::new(base.current_streak, base.longest_streak),
            earned,
        );
        let ctx = AttemptContext {
            days_passed,
            streak_bonus_min_days: self.config.streak_bonus_min_days,
            mock_exams_ready: self.mock_exams_ready(result)?,
        };
        let update = apply_attempt(&state, &result.outcome(is_first_quiz), ctx);

        let attempt = self.store.append_attempt(NewAttempt {
            user_id: user_id.to_string(),
            assessment_type: result.assessment,
            total_questions: result.total_questions,
            correct_answers: result.correct,
            time_taken_seconds: result.elapsed_secs,
            started_at: result.started_at,
            completed_at: now,
        })?;

        let mut mastery = Vec::new();
        for domain in result.domains.iter().filter(|d| d.total > 0) {
            self.store.append_domain_score(
                user_id,
                DomainScoreRecord::new(
                    attempt.id,
                    &domain.code,
                    &domain.name,
                    domain.correct,
                    domain.total,
                ),
            )?;
            mastery.push(self.store.upsert_mastery(
                user_id,
                &domain.code,
                &domain.name,
                domain.percentage(),
            )?);
        }

        let mut awarded = Vec::new();
        for badge in &update.new_badges {
            if let Some(inserted) = self.store.earn_badge(user_id, badge, now)? {
                awarded.push(inserted);
            }
        }

        let mut record = base;
        record.total_attempts += 1;
        record.total_correct += result.correct;
        record.total_questions += result.total_questions;
        record.overall_percentage = if record.total_questions == 0 {
            0.0
        } else {
            record.total_correct as f64 / record.total_questions as f64 * 100.0
        };
        record.current_xp = update.state.xp;
        record.current_level = update.state.level;
        record.current_streak = update.state.streak.current;
        record.longest_streak = update.state.streak.longest;
        record.last_completed_at = Some(now);
        let progress = self.store.upsert_progress(&record)?;

        info!(
            user = %user_id,
            assessment = result.assessment.id(),
            score = result.score_percentage(),
            xp_earned = update.xp_earned,
            level = update.state.level,
            streak = update.state.streak.current,
            badges = awarded.len(),
            "recorded quiz attempt"
        );

        Ok(CompletionReport {
            attempt,
            level_progress: scoring::xp_for_next_level(update.state.xp),
            update,
            progress,
            awarded,
            mastery,
        })
    }

    /// Both mock exams passed at the exam-ready mark, counting `result`.
    fn mock_exams_ready(&self, result: &QuizResult) -> Result<bool> {
        for kind in [AssessmentType::MockExam1, AssessmentType::MockExam2] {
            if result.assessment == kind && result.score_percentage() >= EXAM_READY_PERCENTAGE {
                continue;
            }
            let passed = self
                .store
                .attempts(self.user_id(), Some(kind))?
                .iter()
                .any(|a| a.score_percentage >= EXAM_READY_PERCENTAGE);
            if !passed {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Stored totals with level data re-derived from XP.
    pub fn summary(&self) -> Result<ProgressSummary> {
        let user_id = self.user_id();
        let progress = self
            .store
            .load_progress(user_id)?
            .unwrap_or_else(|| UserProgressRecord::new(user_id));
        let level_progress = scoring::xp_for_next_level(progress.current_xp);
        Ok(ProgressSummary {
            user_id: user_id.to_string(),
            total_attempts: progress.total_attempts,
            total_correct: progress.total_correct,
            total_questions: progress.total_questions,
            overall_percentage: progress.overall_percentage,
            xp: progress.current_xp,
            level: level_progress.level,
            level_name: scoring::level_name(level_progress.level),
            level_progress,
            current_streak: progress.current_streak,
            longest_streak: progress.longest_streak,
            badges_earned: self.store.badges(user_id)?.len(),
            last_completed_at: progress.last_completed_at,
        })
    }

    pub fn history(&self, filter: Option<AssessmentType>) -> Result<Vec<AttemptRecord>> {
        Ok(self.store.attempts(self.user_id(), filter)?)
    }

    pub fn attempt_domains(&self, attempt: &AttemptRecord) -> Result<Vec<DomainScoreRecord>> {
        Ok(self.store.domain_scores(self.user_id(), attempt.id)?)
    }

    pub fn badges(&self) -> Result<Vec<BadgeRecord>> {
        Ok(self.store.badges(self.user_id())?)
    }

    pub fn mastery(&self) -> Result<Vec<DomainMasteryRecord>> {
        Ok(self.store.mastery(self.user_id())?)
    }

    pub fn export_to(&self, path: &Path) -> Result<ExportData> {
        let data = self.store.export_user(self.user_id())?;
        let json = serde_json::to_string_pretty(&data)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, json).with_context(|| format!("writing export {}", path.display()))?;
        info!(path = %path.display(), attempts = data.history.attempts.len(), "exported user data");
        Ok(data)
    }

    pub fn import_from(&self, path: &Path) -> Result<ExportData> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading export {}", path.display()))?;
        let data: ExportData = serde_json::from_str(&content)
            .with_context(|| format!("parsing export {}", path.display()))?;
        if data.user_id != self.user_id() {
            bail!(
                "export belongs to user '{}'; rerun with --user {}",
                data.user_id,
                data.user_id
            );
        }
        self.store.import_user(&data)?;
        Ok(data)
    }
}
