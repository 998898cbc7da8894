use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssessmentType {
    MiniTest,
    Checkpoint,
    CrossDomain,
    #[serde(rename = "mock-exam-1")]
    MockExam1,
    #[serde(rename = "mock-exam-2")]
    MockExam2,
}

impl AssessmentType {
    /// Identifier used on the command line and in stored attempts.
    pub fn id(self) -> &'static str {
        match self {
            AssessmentType::MiniTest => "mini-test",
            AssessmentType::Checkpoint => "checkpoint",
            AssessmentType::CrossDomain => "cross-domain",
            AssessmentType::MockExam1 => "mock-exam-1",
            AssessmentType::MockExam2 => "mock-exam-2",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id.trim() {
            "mini-test" => Some(AssessmentType::MiniTest),
            "checkpoint" => Some(AssessmentType::Checkpoint),
            "cross-domain" => Some(AssessmentType::CrossDomain),
            "mock-exam-1" => Some(AssessmentType::MockExam1),
            "mock-exam-2" => Some(AssessmentType::MockExam2),
            _ => None,
        }
    }

    /// `assessment_type` value used by the question bank.
    pub fn bank_name(self) -> &'static str {
        match self {
            AssessmentType::MiniTest => "Mini-Test",
            AssessmentType::Checkpoint => "Checkpoint",
            AssessmentType::CrossDomain => "Cross-Domain",
            AssessmentType::MockExam1 => "Mock Exam 1",
            AssessmentType::MockExam2 => "Mock Exam 2",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AssessmentType::MiniTest => "Mini-Test (20Q)",
            AssessmentType::Checkpoint => "Checkpoint (60Q)",
            AssessmentType::CrossDomain => "Cross-Domain (40Q)",
            AssessmentType::MockExam1 => "Mock Exam 1 — Boss Round 1 (120Q)",
            AssessmentType::MockExam2 => "Mock Exam 2 — Boss Round 2 Final (120Q)",
        }
    }

    pub fn nominal_minutes(self) -> u32 {
        match self {
            AssessmentType::MiniTest => 30,
            AssessmentType::Checkpoint => 90,
            AssessmentType::CrossDomain => 120,
            AssessmentType::MockExam1 | AssessmentType::MockExam2 => 180,
        }
    }

    pub fn is_mock_exam(self) -> bool {
        matches!(self, AssessmentType::MockExam1 | AssessmentType::MockExam2)
    }

    pub fn all() -> &'static [AssessmentType] {
        &[
            AssessmentType::MiniTest,
            AssessmentType::Checkpoint,
            AssessmentType::CrossDomain,
            AssessmentType::MockExam1,
            AssessmentType::MockExam2,
        ]
    }
}

impl std::str::FromStr for AssessmentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_id(s).ok_or_else(|| {
            let known: Vec<&str> = Self::all().iter().map(|a| a.id()).collect();
            format!("unknown assessment type '{s}' (expected one of: {})", known.join(", "))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_round_trip() {
        for &kind in AssessmentType::all() {
            assert_eq!(AssessmentType::from_id(kind.id()), Some(kind));
        }
    }

    #[test]
    fn test_serde_matches_cli_ids() {
        for &kind in AssessmentType::all() {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.id()));
        }
    }

    #[test]
    fn test_unknown_id_error_lists_options() {
        let err = "final-boss".parse::<AssessmentType>().unwrap_err();
        assert!(err.contains("final-boss"));
        assert!(err.contains("mock-exam-2"));
    }

    #[test]
    fn test_only_mock_exams_are_mock() {
        let mocks: Vec<_> = AssessmentType::all()
            .iter()
            .filter(|a| a.is_mock_exam())
            .collect();
        assert_eq!(mocks.len(), 2);
    }
}
