use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::engine::badges::{self, Badge, BadgeContext, DomainPercentage};
use crate::engine::difficulty::Difficulty;
use crate::engine::scoring;
use crate::engine::streak::StreakState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnsweredQuestion {
    pub correct: bool,
    pub difficulty: Difficulty,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainTally {
    pub code: String,
    pub correct: u32,
    pub total: u32,
}

impl DomainTally {
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.correct as f64 / self.total as f64 * 100.0
    }
}

/// Everything the engine needs to know about one completed quiz.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttemptOutcome {
    pub total_questions: u32,
    pub correct: u32,
    pub answers: Vec<AnsweredQuestion>,
    pub domains: Vec<DomainTally>,
    pub elapsed_secs: u64,
    pub is_first_quiz: bool,
}

impl AttemptOutcome {
    pub fn score_percentage(&self) -> f64 {
        if self.total_questions == 0 {
            return 0.0;
        }
        self.correct as f64 / self.total_questions as f64 * 100.0
    }

    pub fn badge_context(&self) -> BadgeContext {
        BadgeContext {
            score_percentage: self.score_percentage(),
            domain_scores: self
                .domains
                .iter()
                .filter(|d| d.total > 0)
                .map(|d| DomainPercentage {
                    code: d.code.clone(),
                    percentage: d.percentage(),
                })
                .collect(),
            elapsed_secs: self.elapsed_secs,
            is_first_quiz: self.is_first_quiz,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    pub xp: u32,
    pub level: u32,
    pub streak: StreakState,
    pub badges: BTreeSet<String>,
}

impl ProgressState {
    pub fn new(xp: u32, streak: StreakState, badges: BTreeSet<String>) -> Self {
        Self {
            xp,
            level: scoring::level_from_xp(xp),
            streak,
            badges,
        }
    }
}

/// Knobs and history facts supplied by the caller alongside an attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttemptContext {
    /// Calendar days since the previous completion; `None` for the first one.
    pub days_passed: Option<i64>,
    pub streak_bonus_min_days: u32,
    pub mock_exams_ready: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub xp_earned: u32,
    pub streak_bonus: bool,
    pub leveled_up: bool,
    pub state: ProgressState,
    pub new_badges: Vec<Badge>,
}

pub fn apply_attempt(
    state: &ProgressState,
    outcome: &AttemptOutcome,
    ctx: AttemptContext,
) -> ProgressUpdate {
    let streak = state.streak.after_completion(ctx.days_passed);
    let streak_bonus = streak.current >= ctx.streak_bonus_min_days;

    let xp_earned = scoring::attempt_xp(
        outcome.answers.iter().map(|a| (a.correct, a.difficulty)),
        streak_bonus,
    );
    let xp = state.xp.saturating_add(xp_earned);
    let level = scoring::level_from_xp(xp);

    let mut new_badges = badges::evaluate_badges(&outcome.badge_context(), &state.badges);
    let mut earned = state.badges.clone();
    earned.extend(new_badges.iter().map(|b| b.name.clone()));

    let milestones = badges::evaluate_milestones(streak.current, ctx.mock_exams_ready, &earned);
    earned.extend(milestones.iter().map(|b| b.name.clone()));
    new_badges.extend(milestones);

    ProgressUpdate {
        xp_earned,
        streak_bonus,
        leveled_up: level > scoring::level_from_xp(state.xp),
        state: ProgressState {
            xp,
            level,
            streak,
            badges: earned,
        },
        new_badges,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answers(pairs: &[(bool, Difficulty)]) -> Vec<AnsweredQuestion> {
        pairs.iter()
            .map(|&(correct, difficulty)| AnsweredQuestion {
                correct,
                difficulty,
            })
            .collect()
    }

    fn outcome(first: bool) -> AttemptOutcome {
        AttemptOutcome {
            total_questions: 4,
            correct: 3,
            answers: answers(&[
                (true, Difficulty::Bronze),
                (true, Difficulty::Gold),
                (false, Difficulty::Platinum),
                (true, Difficulty::Silver),
            ]),
            domains: vec![
                DomainTally {
                    code: "I".to_string(),
                    correct: 2,
                    total: 2,
                },
                DomainTally {
                    code: "II".to_string(),
                    correct: 1,
                    total: 2,
                },
                DomainTally {
                    code: "III".to_string(),
                    correct: 0,
                    total: 0,
                },
            ],
            elapsed_secs: 20_000,
            is_first_quiz: first,
        }
    }

    fn ctx(days_passed: Option<i64>) -> AttemptContext {
        AttemptContext {
            days_passed,
            streak_bonus_min_days: 2,
            mock_exams_ready: false,
        }
    }

    #[test]
    fn test_first_attempt() {
        let update = apply_attempt(&ProgressState::default(), &outcome(true), ctx(None));
        assert_eq!(update.xp_earned, 50);
        assert!(!update.streak_bonus);
        assert_eq!(update.state.xp, 50);
        assert_eq!(update.state.level, 1);
        assert!(!update.leveled_up);
        assert_eq!(update.state.streak, StreakState::new(1, 1));

        let names: Vec<&str> = update.new_badges.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["First Step", "Domain Master I"]);
        assert!(update.state.badges.contains("First Step"));
    }

    #[test]
    fn test_next_day_attempt_gets_streak_bonus_and_levels_up() {
        let state = ProgressState::new(80, StreakState::new(1, 1), BTreeSet::new());
        let update = apply_attempt(&state, &outcome(false), ctx(Some(1)));
        assert!(update.streak_bonus);
        assert_eq!(update.xp_earned, 65);
        assert_eq!(update.state.xp, 145);
        assert_eq!(update.state.level, 2);
        assert!(update.leveled_up);
        assert_eq!(update.state.streak, StreakState::new(2, 2));
    }

    #[test]
    fn test_input_state_is_untouched() {
        let state = ProgressState::new(10, StreakState::new(3, 3), BTreeSet::new());
        let before = state.clone();
        let _ = apply_attempt(&state, &outcome(false), ctx(Some(5)));
        assert_eq!(state, before);
    }

    #[test]
    fn test_fifth_day_earns_persistent_learner() {
        let state = ProgressState::new(500, StreakState::new(4, 4), BTreeSet::new());
        let update = apply_attempt(&state, &outcome(false), ctx(Some(1)));
        assert!(update.new_badges.iter().any(|b| b.name == "Persistent Learner"));

        let again = apply_attempt(&update.state, &outcome(false), ctx(Some(0)));
        assert!(again.new_badges.is_empty());
    }

    #[test]
    fn test_untouched_domains_do_not_reach_badges() {
        let ctx = outcome(false).badge_context();
        let codes: Vec<&str> = ctx.domain_scores.iter().map(|d| d.code.as_str()).collect();
        assert_eq!(codes, vec!["I", "II"]);
        assert!((ctx.score_percentage - 75.0).abs() < 1e-9);
    }
}
