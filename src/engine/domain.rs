use serde::{Deserialize, Serialize};

pub const MASTERY_THRESHOLD: f64 = 80.0;

// --- Domain ---

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Domain {
    I,
    II,
    III,
    IV,
    V,
    VI,
    VII,
    Unknown,
}

impl Domain {
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "I" => Domain::I,
            "II" => Domain::II,
            "III" => Domain::III,
            "IV" => Domain::IV,
            "V" => Domain::V,
            "VI" => Domain::VI,
            "VII" => Domain::VII,
            _ => Domain::Unknown,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Domain::I => "I",
            Domain::II => "II",
            Domain::III => "III",
            Domain::IV => "IV",
            Domain::V => "V",
            Domain::VI => "VI",
            Domain::VII => "VII",
            Domain::Unknown => "?",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Domain::I => "Agile Principles & Mindset",
            Domain::II => "Value-Driven Delivery",
            Domain::III => "Stakeholder Engagement",
            Domain::IV => "Team Performance",
            Domain::V => "Adaptive Planning",
            Domain::VI => "Problem Detection & Resolution",
            Domain::VII => "Continuous Improvement",
            Domain::Unknown => "Unknown Domain",
        }
    }

    /// Share of the real exam, in percent.
    pub fn weight(self) -> u8 {
        match self {
            Domain::I => 16,
            Domain::II => 20,
            Domain::III => 17,
            Domain::IV => 16,
            Domain::V => 12,
            Domain::VI => 10,
            Domain::VII => 9,
            Domain::Unknown => 0,
        }
    }

    pub fn all() -> &'static [Domain] {
        &[
            Domain::I,
            Domain::II,
            Domain::III,
            Domain::IV,
            Domain::V,
            Domain::VI,
            Domain::VII,
        ]
    }
}

// --- Mastery ---

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MasteryStatus {
    Mastered,
    InProgress,
}

impl MasteryStatus {
    pub fn from_percentage(average_percentage: f64) -> Self {
        if average_percentage >= MASTERY_THRESHOLD {
            MasteryStatus::Mastered
        } else {
            MasteryStatus::InProgress
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MasteryStatus::Mastered => "MASTERED",
            MasteryStatus::InProgress => "IN_PROGRESS",
        }
    }
}
