use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::engine::domain::{Domain, MASTERY_THRESHOLD};

/// Finishing under this many seconds earns Speed Demon, whatever the
/// assessment length.
pub const SPEED_DEMON_SECS: u64 = 150 * 60;
pub const PERSISTENT_STREAK_DAYS: u32 = 5;
pub const EXAM_READY_PERCENTAGE: f64 = 80.0;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Badge {
    pub name: String,
    pub icon: String,
}

// --- Badge Kinds ---

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BadgeKind {
    FirstStep,
    PerfectScore,
    SpeedDemon,
    DomainMaster(String),
    PersistentLearner,
    ExamReady,
}

impl BadgeKind {
    pub fn name(&self) -> String {
        match self {
            BadgeKind::FirstStep => "First Step".to_string(),
            BadgeKind::PerfectScore => "Perfect Score".to_string(),
            BadgeKind::SpeedDemon => "Speed Demon".to_string(),
            BadgeKind::DomainMaster(code) => format!("Domain Master {code}"),
            BadgeKind::PersistentLearner => "Persistent Learner".to_string(),
            BadgeKind::ExamReady => "Exam Ready".to_string(),
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            BadgeKind::FirstStep => "👣",
            BadgeKind::PerfectScore => "💯",
            BadgeKind::SpeedDemon => "⚡",
            BadgeKind::DomainMaster(_) => "🏆",
            BadgeKind::PersistentLearner => "🔥",
            BadgeKind::ExamReady => "🎯",
        }
    }

    pub fn description(&self) -> String {
        match self {
            BadgeKind::FirstStep => "Complete your first quiz".to_string(),
            BadgeKind::PerfectScore => "Score 100% on any quiz".to_string(),
            BadgeKind::SpeedDemon => "Complete a mock exam in under 2.5 hours".to_string(),
            BadgeKind::DomainMaster(code) => format!("Score 80%+ in Domain {code}"),
            BadgeKind::PersistentLearner => "Maintain a 5-day study streak".to_string(),
            BadgeKind::ExamReady => "Score 80%+ on both mock exams".to_string(),
        }
    }

    pub fn to_badge(&self) -> Badge {
        Badge {
            name: self.name(),
            icon: self.icon().to_string(),
        }
    }
}

/// Every badge a user can earn, in display order.
pub fn catalog() -> Vec<BadgeKind> {
    let mut kinds = vec![BadgeKind::FirstStep];
    kinds.extend(
        Domain::all()
            .iter()
            .map(|d| BadgeKind::DomainMaster(d.code().to_string())),
    );
    kinds.extend([
        BadgeKind::PerfectScore,
        BadgeKind::SpeedDemon,
        BadgeKind::PersistentLearner,
        BadgeKind::ExamReady,
    ]);
    kinds
}

// --- Evaluation ---

#[derive(Clone, Debug, PartialEq)]
pub struct DomainPercentage {
    pub code: String,
    pub percentage: f64,
}

/// What the badge rules look at for one completed attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct BadgeContext {
    pub score_percentage: f64,
    pub domain_scores: Vec<DomainPercentage>,
    pub elapsed_secs: u64,
    pub is_first_quiz: bool,
}

struct Awards<'a> {
    earned: &'a BTreeSet<String>,
    awarded: Vec<Badge>,
}

impl<'a> Awards<'a> {
    fn new(earned: &'a BTreeSet<String>) -> Self {
        Self {
            earned,
            awarded: Vec::new(),
        }
    }

    fn grant_if(&mut self, qualifies: bool, kind: BadgeKind) {
        if !qualifies {
            return;
        }
        let name = kind.name();
        let already = self.earned.contains(&name) || self.awarded.iter().any(|b| b.name == name);
        if !already {
            self.awarded.push(kind.to_badge());
        }
    }
}

/// Badges newly earned by one attempt. Never returns a name already in
/// `earned`, so re-running with the merged set yields nothing new.
pub fn evaluate_badges(context: &BadgeContext, earned: &BTreeSet<String>) -> Vec<Badge> {
    let mut awards = Awards::new(earned);

    awards.grant_if(context.is_first_quiz, BadgeKind::FirstStep);
    awards.grant_if(
        (context.score_percentage - 100.0).abs() < f64::EPSILON,
        BadgeKind::PerfectScore,
    );
    awards.grant_if(context.elapsed_secs < SPEED_DEMON_SECS, BadgeKind::SpeedDemon);

    for domain in &context.domain_scores {
        awards.grant_if(
            domain.percentage >= MASTERY_THRESHOLD,
            BadgeKind::DomainMaster(domain.code.trim().to_string()),
        );
    }

    awards.awarded
}

/// Badges that depend on accumulated history rather than a single attempt.
pub fn evaluate_milestones(
    current_streak: u32,
    mock_exams_ready: bool,
    earned: &BTreeSet<String>,
) -> Vec<Badge> {
    let mut awards = Awards::new(earned);
    awards.grant_if(
        current_streak >= PERSISTENT_STREAK_DAYS,
        BadgeKind::PersistentLearner,
    );
    awards.grant_if(mock_exams_ready, BadgeKind::ExamReady);
    awards.awarded
}
