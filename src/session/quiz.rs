use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::engine::domain::Domain;
use crate::engine::progress::{AnsweredQuestion, DomainTally};
use crate::session::assessment::AssessmentType;
use crate::session::question::{AnswerOption, Question};

pub struct QuizState {
    pub assessment: AssessmentType,
    pub questions: Vec<Question>,
    pub answers: Vec<Option<AnswerOption>>,
    pub cursor: usize,
    pub time_limit: Duration,
    pub started_at: Option<Instant>,
    pub finished_at: Option<Instant>,
    pub started_at_utc: Option<DateTime<Utc>>,
    pub timed_out: bool,
}

impl QuizState {
    pub fn new(assessment: AssessmentType, questions: Vec<Question>, seconds_per_question: u32) -> Self {
        let time_limit = Duration::from_secs(questions.len() as u64 * seconds_per_question as u64);
        Self {
            assessment,
            answers: vec![None; questions.len()],
            questions,
            cursor: 0,
            time_limit,
            started_at: None,
            finished_at: None,
            started_at_utc: None,
            timed_out: false,
        }
    }

    pub fn start(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
            self.started_at_utc = Some(Utc::now());
        }
    }

    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn is_complete(&self) -> bool {
        self.finished_at.is_some()
    }

    pub fn current(&self) -> Option<&Question> {
        self.questions.get(self.cursor)
    }

    pub fn current_answer(&self) -> Option<AnswerOption> {
        self.answers.get(self.cursor).copied().flatten()
    }

    pub fn is_last(&self) -> bool {
        self.cursor + 1 >= self.questions.len()
    }

    /// Lock in an answer for the current question. Returns whether it was
    /// correct, or `None` if the question was already answered or the quiz is
    /// not running.
    pub fn answer(&mut self, option: AnswerOption) -> Option<bool> {
        if !self.is_started() || self.is_complete() {
            return None;
        }
        let slot = self.answers.get_mut(self.cursor)?;
        if slot.is_some() {
            return None;
        }
        *slot = Some(option);
        self.questions
            .get(self.cursor)
            .map(|q| q.is_correct(option))
    }

    /// Move forward; finishing from the last question completes the quiz.
    pub fn next(&mut self) {
        if self.is_complete() {
            return;
        }
        if self.is_last() {
            self.finish();
        } else {
            self.cursor += 1;
        }
    }

    pub fn previous(&mut self) {
        if !self.is_complete() {
            self.cursor = self.cursor.saturating_sub(1);
        }
    }

    /// Stops the clock. The recorded end never lies past the deadline, so a
    /// late finish counts as exactly the time limit.
    pub fn finish(&mut self) {
        if self.finished_at.is_some() {
            return;
        }
        self.start();
        let now = Instant::now();
        self.finished_at = Some(match self.deadline() {
            Some(deadline) if deadline < now => deadline,
            _ => now,
        });
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.started_at.map(|start| start + self.time_limit)
    }

    /// Completes the quiz once the time limit has run out.
    pub fn check_timeout(&mut self) -> bool {
        if !self.is_complete() && self.is_started() && self.remaining().is_zero() {
            self.timed_out = true;
            self.finish();
        }
        self.timed_out
    }

    pub fn elapsed(&self) -> Duration {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => end.duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed().as_secs()
    }

    pub fn remaining(&self) -> Duration {
        self.time_limit.saturating_sub(self.elapsed())
    }

    pub fn answered_count(&self) -> usize {
        self.answers.iter().filter(|a| a.is_some()).count()
    }

    pub fn correct_count(&self) -> usize {
        self.graded().filter(|(_, correct)| *correct).count()
    }

    /// Unanswered questions count against the overall score.
    pub fn score_percentage(&self) -> f64 {
        if self.questions.is_empty() {
            return 0.0;
        }
        self.correct_count() as f64 / self.questions.len() as f64 * 100.0
    }

    pub fn progress(&self) -> f64 {
        if self.questions.is_empty() {
            return 0.0;
        }
        (self.cursor + 1).min(self.questions.len()) as f64 / self.questions.len() as f64
    }

    fn graded(&self) -> impl Iterator<Item = (&Question, bool)> {
        self.questions
            .iter()
            .zip(&self.answers)
            .filter_map(|(q, a)| a.map(|option| (q, q.is_correct(option))))
    }

    pub fn answered_questions(&self) -> Vec<AnsweredQuestion> {
        self.graded()
            .map(|(q, correct)| AnsweredQuestion {
                correct,
                difficulty: q.difficulty,
            })
            .collect()
    }

    /// Per-domain tallies over answered questions, known domains first in
    /// exam order.
    pub fn domain_tallies(&self) -> Vec<DomainTally> {
        let mut tallies: BTreeMap<(Domain, String), DomainTally> = BTreeMap::new();
        for (q, correct) in self.graded() {
            let code = q.domain_code.trim().to_string();
            let tally = tallies
                .entry((Domain::from_code(&code), code.clone()))
                .or_insert_with(|| DomainTally {
                    code,
                    correct: 0,
                    total: 0,
                });
            tally.total += 1;
            if correct {
                tally.correct += 1;
            }
        }
        tallies.into_values().collect()
    }

    /// Bank-provided display name for a domain code seen in this quiz.
    pub fn domain_name(&self, code: &str) -> String {
        self.questions
            .iter()
            .find(|q| q.domain_code.trim() == code)
            .map(|q| q.domain_name().to_string())
            .unwrap_or_else(|| Domain::from_code(code).name().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::difficulty::Difficulty;
    use crate::session::question::QuestionOptions;

    fn question(id: u32, domain: &str, correct: &str, difficulty: Difficulty) -> Question {
        Question {
            id,
            question_number: id,
            source_file: String::new(),
            assessment_type: "Mini-Test".to_string(),
            stem: format!("Question {id}?"),
            options: QuestionOptions {
                a: "a".to_string(),
                b: "b".to_string(),
                c: "c".to_string(),
                d: "d".to_string(),
            },
            correct_answer: correct.to_string(),
            correct_text: String::new(),
            explanation: String::new(),
            domain: String::new(),
            domain_code: domain.to_string(),
            difficulty,
            difficulty_order: 0,
        }
    }

    fn quiz() -> QuizState {
        QuizState::new(
            AssessmentType::MiniTest,
            vec![
                question(1, "II", "A", Difficulty::Bronze),
                question(2, "I", "B", Difficulty::Gold),
                question(3, "II", "C", Difficulty::Silver),
            ],
            90,
        )
    }

    #[test]
    fn test_new_quiz() {
        let q = quiz();
        assert_eq!(q.time_limit, Duration::from_secs(270));
        assert!(!q.is_started());
        assert!(!q.is_complete());
        assert_eq!(q.elapsed_secs(), 0);
        assert_eq!(q.answered_count(), 0);
    }

    #[test]
    fn test_cannot_answer_before_start() {
        let mut q = quiz();
        assert_eq!(q.answer(AnswerOption::A), None);
        assert_eq!(q.answered_count(), 0);
    }

    #[test]
    fn test_answers_are_locked() {
        let mut q = quiz();
        q.start();
        assert_eq!(q.answer(AnswerOption::A), Some(true));
        assert_eq!(q.answer(AnswerOption::B), None);
        assert_eq!(q.current_answer(), Some(AnswerOption::A));
        assert_eq!(q.correct_count(), 1);
    }

    #[test]
    fn test_navigation_and_finish() {
        let mut q = quiz();
        q.start();
        q.previous();
        assert_eq!(q.cursor, 0);
        q.answer(AnswerOption::A);
        q.next();
        q.answer(AnswerOption::D);
        q.previous();
        assert_eq!(q.cursor, 0);
        assert_eq!(q.answer(AnswerOption::C), None);
        q.next();
        q.next();
        assert!(q.is_last());
        assert!(!q.is_complete());
        q.next();
        assert!(q.is_complete());
        assert!(!q.timed_out);
        assert_eq!(q.answer(AnswerOption::C), None);
    }

    #[test]
    fn test_unanswered_count_against_score() {
        let mut q = quiz();
        q.start();
        q.answer(AnswerOption::A);
        q.finish();
        assert!((q.score_percentage() - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(q.answered_questions().len(), 1);
    }

    #[test]
    fn test_domain_tallies_cover_answered_only() {
        let mut q = quiz();
        q.start();
        q.answer(AnswerOption::A);
        q.next();
        q.answer(AnswerOption::A);
        q.finish();

        let tallies = q.domain_tallies();
        assert_eq!(
            tallies,
            vec![
                DomainTally {
                    code: "I".to_string(),
                    correct: 0,
                    total: 1,
                },
                DomainTally {
                    code: "II".to_string(),
                    correct: 1,
                    total: 1,
                },
            ]
        );
        assert_eq!(q.domain_name("I"), "Agile Principles & Mindset");
    }

    #[test]
    fn test_zero_time_limit_times_out() {
        let mut q = QuizState::new(
            AssessmentType::MiniTest,
            vec![question(1, "I", "A", Difficulty::Bronze)],
            0,
        );
        assert!(!q.check_timeout());
        q.start();
        assert!(q.check_timeout());
        assert!(q.is_complete());
        assert_eq!(q.answer(AnswerOption::A), None);
    }

    #[test]
    fn test_timeout_records_the_limit_not_the_late_input() {
        let mut q = QuizState::new(
            AssessmentType::MiniTest,
            vec![question(1, "I", "A", Difficulty::Bronze)],
            1,
        );
        q.start();
        q.started_at = Instant::now().checked_sub(Duration::from_millis(3200));

        assert!(q.check_timeout());
        assert!(q.timed_out);
        assert_eq!(q.elapsed(), q.time_limit);
        assert_eq!(q.elapsed_secs(), 1);
        assert_eq!(q.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_late_quit_is_clamped_to_limit() {
        let mut q = QuizState::new(
            AssessmentType::MiniTest,
            vec![question(1, "I", "A", Difficulty::Bronze)],
            1,
        );
        q.start();
        q.started_at = Instant::now().checked_sub(Duration::from_secs(5));
        q.finish();
        assert_eq!(q.elapsed(), Duration::from_secs(1));
    }

    #[test]
    fn test_empty_quiz_progress() {
        let q = QuizState::new(AssessmentType::MiniTest, Vec::new(), 90);
        assert!(q.is_last());
        assert_eq!(q.progress(), 0.0);
        assert_eq!(q.score_percentage(), 0.0);
    }
}
