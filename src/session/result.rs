use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::progress::{AnsweredQuestion, AttemptOutcome, DomainTally};
use crate::session::assessment::AssessmentType;
use crate::session::quiz::QuizState;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DomainResult {
    pub code: String,
    pub name: String,
    pub correct: u32,
    pub total: u32,
}

impl DomainResult {
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.correct as f64 / self.total as f64 * 100.0
    }
}

/// A finished quiz, ready to be scored and stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuizResult {
    pub assessment: AssessmentType,
    pub total_questions: u32,
    pub correct: u32,
    pub elapsed_secs: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    #[serde(default)]
    pub timed_out: bool,
    pub domains: Vec<DomainResult>,
    pub answers: Vec<AnsweredQuestion>,
}

impl QuizResult {
    pub fn from_quiz(quiz: &QuizState) -> Self {
        let elapsed_secs = quiz.elapsed_secs();
        let elapsed = Duration::milliseconds(quiz.elapsed().as_millis() as i64);
        // Wall-clock end follows the quiz clock, so a timed-out quiz ends at its limit.
        let (started_at, completed_at) = match quiz.started_at_utc {
            Some(start) => (start, start + elapsed),
            None => {
                let now = Utc::now();
                (now - elapsed, now)
            }
        };

        let domains = quiz
            .domain_tallies()
            .into_iter()
            .map(|tally| DomainResult {
                name: quiz.domain_name(&tally.code),
                code: tally.code,
                correct: tally.correct,
                total: tally.total,
            })
            .collect();

        Self {
            assessment: quiz.assessment,
            total_questions: quiz.questions.len() as u32,
            correct: quiz.correct_count() as u32,
            elapsed_secs,
            started_at,
            completed_at,
            timed_out: quiz.timed_out,
            domains,
            answers: quiz.answered_questions(),
        }
    }

    pub fn score_percentage(&self) -> f64 {
        if self.total_questions == 0 {
            return 0.0;
        }
        self.correct as f64 / self.total_questions as f64 * 100.0
    }

    pub fn outcome(&self, is_first_quiz: bool) -> AttemptOutcome {
        AttemptOutcome {
            total_questions: self.total_questions,
            correct: self.correct,
            answers: self.answers.clone(),
            domains: self
                .domains
                .iter()
                .map(|d| DomainTally {
                    code: d.code.clone(),
                    correct: d.correct,
                    total: d.total,
                })
                .collect(),
            elapsed_secs: self.elapsed_secs,
            is_first_quiz,
        }
    }
}
