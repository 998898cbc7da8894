use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use rand::Rng;
use rand::seq::SliceRandom;
use rust_embed::Embed;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::engine::difficulty::Difficulty;
use crate::engine::domain::Domain;
use crate::session::assessment::AssessmentType;

#[derive(Embed)]
#[folder = "assets/"]
struct BankAssets;

const BUNDLED_BANK: &str = "questions.json";

#[derive(Debug, Error)]
pub enum BankError {
    #[error("failed to read question bank: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid question bank: {0}")]
    Json(#[from] serde_json::Error),
    #[error("bundled question bank is missing")]
    MissingBundled,
    #[error("failed to download question bank from {0}")]
    Fetch(String),
    #[error("no questions for assessment '{0}'")]
    NoQuestions(&'static str),
}

// --- Answer Options ---

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AnswerOption {
    A,
    B,
    C,
    D,
}

impl AnswerOption {
    pub fn from_char(ch: char) -> Option<Self> {
        match ch.to_ascii_uppercase() {
            'A' => Some(AnswerOption::A),
            'B' => Some(AnswerOption::B),
            'C' => Some(AnswerOption::C),
            'D' => Some(AnswerOption::D),
            _ => None,
        }
    }

    pub fn letter(self) -> char {
        match self {
            AnswerOption::A => 'A',
            AnswerOption::B => 'B',
            AnswerOption::C => 'C',
            AnswerOption::D => 'D',
        }
    }

    pub fn all() -> [AnswerOption; 4] {
        [AnswerOption::A, AnswerOption::B, AnswerOption::C, AnswerOption::D]
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOptions {
    #[serde(rename = "A")]
    pub a: String,
    #[serde(rename = "B")]
    pub b: String,
    #[serde(rename = "C")]
    pub c: String,
    #[serde(rename = "D")]
    pub d: String,
}

impl QuestionOptions {
    pub fn text(&self, option: AnswerOption) -> &str {
        match option {
            AnswerOption::A => &self.a,
            AnswerOption::B => &self.b,
            AnswerOption::C => &self.c,
            AnswerOption::D => &self.d,
        }
    }
}

// --- Questions ---

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: u32,
    pub question_number: u32,
    #[serde(default)]
    pub source_file: String,
    pub assessment_type: String,
    pub stem: String,
    pub options: QuestionOptions,
    pub correct_answer: String,
    #[serde(default)]
    pub correct_text: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub domain: String,
    pub domain_code: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub difficulty_order: u32,
}

impl Question {
    /// Correct option, or `None` when the bank entry holds something other
    /// than a single A-D letter.
    pub fn correct_option(&self) -> Option<AnswerOption> {
        let mut chars = self.correct_answer.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) => AnswerOption::from_char(ch),
            _ => None,
        }
    }

    pub fn is_correct(&self, answer: AnswerOption) -> bool {
        self.correct_option() == Some(answer)
    }

    pub fn domain_kind(&self) -> Domain {
        Domain::from_code(&self.domain_code)
    }

    /// Display name of the domain, preferring the bank's own text.
    pub fn domain_name(&self) -> &str {
        if self.domain.trim().is_empty() {
            self.domain_kind().name()
        } else {
            &self.domain
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankMetadata {
    #[serde(default)]
    pub exam: String,
    #[serde(default)]
    pub total_exam_questions: u32,
    #[serde(default)]
    pub time_limit_minutes: u32,
    #[serde(default)]
    pub domains: u32,
    #[serde(default)]
    pub generated: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankSummary {
    #[serde(default)]
    pub total_questions: u32,
    #[serde(default)]
    pub by_assessment_type: BTreeMap<String, u32>,
    #[serde(default)]
    pub by_domain: BTreeMap<String, u32>,
    #[serde(default)]
    pub by_difficulty: BTreeMap<String, u32>,
    #[serde(default)]
    pub metadata: BankMetadata,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionBank {
    #[serde(default)]
    pub summary: BankSummary,
    pub questions: Vec<Question>,
}

impl QuestionBank {
    pub fn from_json(json: &str) -> Result<Self, BankError> {
        let bank: QuestionBank = serde_json::from_str(json)?;
        debug!(questions = bank.questions.len(), "parsed question bank");
        Ok(bank)
    }

    pub fn from_file(path: &Path) -> Result<Self, BankError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Sample bank compiled into the binary.
    pub fn bundled() -> Result<Self, BankError> {
        let file = BankAssets::get(BUNDLED_BANK).ok_or(BankError::MissingBundled)?;
        let content = std::str::from_utf8(file.data.as_ref())
            .map_err(|_| BankError::MissingBundled)?;
        Self::from_json(content)
    }

    /// Download a bank, keeping a copy at `cache_path`. Falls back to the
    /// cached copy when the download fails.
    pub fn fetch(url: &str, cache_path: &Path) -> Result<Self, BankError> {
        match fetch_url(url) {
            Some(body) => {
                let bank = Self::from_json(&body)?;
                if let Some(parent) = cache_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                if let Err(e) = fs::write(cache_path, &body) {
                    warn!(error = %e, "could not cache downloaded question bank");
                }
                Ok(bank)
            }
            None if cache_path.exists() => {
                warn!(%url, "download failed, using cached question bank");
                Self::from_file(cache_path)
            }
            None => Err(BankError::Fetch(url.to_string())),
        }
    }

    /// Questions of one assessment in bank order.
    pub fn for_assessment(&self, kind: AssessmentType) -> Vec<Question> {
        let mut questions: Vec<Question> = self
            .questions
            .iter()
            .filter(|q| q.assessment_type.trim() == kind.bank_name())
            .cloned()
            .collect();
        questions.sort_by_key(|q| q.question_number);
        questions
    }

    pub fn draw<R: Rng + ?Sized>(
        &self,
        kind: AssessmentType,
        shuffle: bool,
        rng: &mut R,
    ) -> Result<Vec<Question>, BankError> {
        let mut questions = self.for_assessment(kind);
        if questions.is_empty() {
            return Err(BankError::NoQuestions(kind.id()));
        }
        if shuffle {
            questions.shuffle(rng);
        }
        Ok(questions)
    }
}

#[cfg(feature = "network")]
fn fetch_url(url: &str) -> Option<String> {
    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .ok()?;
    let response = client.get(url).send().ok()?;
    if response.status().is_success() {
        response.text().ok()
    } else {
        None
    }
}

#[cfg(not(feature = "network"))]
fn fetch_url(_url: &str) -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    const SMALL_BANK: &str = r#"{
        "questions": [
            {
                "id": 2, "question_number": 2, "assessment_type": "Mini-Test",
                "stem": "Second?", "options": {"A": "a", "B": "b", "C": "c", "D": "d"},
                "correct_answer": "B", "domain_code": "II", "difficulty": "Gold"
            },
            {
                "id": 1, "question_number": 1, "assessment_type": "Mini-Test",
                "stem": "First?", "options": {"A": "a", "B": "b", "C": "c", "D": "d"},
                "correct_answer": "a", "domain": "Agile Principles & Mindset",
                "domain_code": "I", "difficulty": "Obsidian"
            },
            {
                "id": 3, "question_number": 1, "assessment_type": "Checkpoint",
                "stem": "Other?", "options": {"A": "a", "B": "b", "C": "c", "D": "d"},
                "correct_answer": "AB", "domain_code": "IX", "difficulty": "Bronze"
            }
        ]
    }"#;

    #[test]
    fn test_parse_with_missing_optional_fields() {
        let bank = QuestionBank::from_json(SMALL_BANK).unwrap();
        assert_eq!(bank.questions.len(), 3);
        assert_eq!(bank.summary, BankSummary::default());
        assert_eq!(bank.questions[1].difficulty, Difficulty::Unknown);
    }

    #[test]
    fn test_filter_by_assessment_in_bank_order() {
        let bank = QuestionBank::from_json(SMALL_BANK).unwrap();
        let mini = bank.for_assessment(AssessmentType::MiniTest);
        let ids: Vec<u32> = mini.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(bank.for_assessment(AssessmentType::MockExam1).is_empty());
    }

    #[test]
    fn test_draw_empty_assessment_is_an_error() {
        let bank = QuestionBank::from_json(SMALL_BANK).unwrap();
        let mut rng = SmallRng::seed_from_u64(7);
        let err = bank
            .draw(AssessmentType::MockExam2, false, &mut rng)
            .unwrap_err();
        assert!(err.to_string().contains("mock-exam-2"));
    }

    #[test]
    fn test_draw_shuffled_keeps_all_questions() {
        let bank = QuestionBank::from_json(SMALL_BANK).unwrap();
        let mut rng = SmallRng::seed_from_u64(7);
        let mut ids: Vec<u32> = bank
            .draw(AssessmentType::MiniTest, true, &mut rng)
            .unwrap()
            .iter()
            .map(|q| q.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_correct_option_parsing() {
        let bank = QuestionBank::from_json(SMALL_BANK).unwrap();
        let q = &bank.questions;
        assert_eq!(q[0].correct_option(), Some(AnswerOption::B));
        assert_eq!(q[1].correct_option(), Some(AnswerOption::A));
        assert_eq!(q[2].correct_option(), None);
        assert!(!q[2].is_correct(AnswerOption::A));
    }

    #[test]
    fn test_domain_name_fallback() {
        let bank = QuestionBank::from_json(SMALL_BANK).unwrap();
        assert_eq!(bank.questions[0].domain_name(), "Value-Driven Delivery");
        assert_eq!(bank.questions[1].domain_name(), "Agile Principles & Mindset");
        assert_eq!(bank.questions[2].domain_kind(), Domain::Unknown);
    }

    #[test]
    fn test_bundled_bank_covers_every_assessment() {
        let bank = QuestionBank::bundled().unwrap();
        for &kind in AssessmentType::all() {
            assert!(
                !bank.for_assessment(kind).is_empty(),
                "no bundled questions for {}",
                kind.id()
            );
        }
        assert!(bank.questions.iter().all(|q| q.correct_option().is_some()));
    }

    #[test]
    fn test_fetch_falls_back_to_cache() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = dir.path().join("bank.json");
        fs::write(&cache, SMALL_BANK).unwrap();
        // Port 9 (discard) on localhost refuses connections.
        let bank = QuestionBank::fetch("http://127.0.0.1:9/bank.json", &cache).unwrap();
        assert_eq!(bank.questions.len(), 3);

        let missing = dir.path().join("none.json");
        assert!(QuestionBank::fetch("http://127.0.0.1:9/bank.json", &missing).is_err());
    }
}
