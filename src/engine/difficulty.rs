use serde::{Deserialize, Serialize};

pub const XP_PER_CORRECT: u32 = 10;

const FALLBACK_COLOR: &str = "#999999";
const FALLBACK_LABEL: &str = "Unknown";

/// Question difficulty tier as tagged in the question bank.
///
/// Unrecognized tier names parse to `Unknown` instead of failing, so a typo in
/// the bank only costs display metadata and falls back to the base XP award.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Difficulty {
    Unknown,
    Bronze,
    Silver,
    Gold,
    Platinum,
}

pub struct TierDefinition {
    pub tier: Difficulty,
    pub name: &'static str,
    pub rank: u8,
    pub xp: u32,
    pub color: &'static str,
    pub label: &'static str,
}

pub const TIERS: &[TierDefinition] = &[
    TierDefinition {
        tier: Difficulty::Bronze,
        name: "Bronze",
        rank: 1,
        xp: 10,
        color: "#CD7F32",
        label: "Foundational",
    },
    TierDefinition {
        tier: Difficulty::Silver,
        name: "Silver",
        rank: 2,
        xp: 15,
        color: "#C0C0C0",
        label: "Intermediate",
    },
    TierDefinition {
        tier: Difficulty::Gold,
        name: "Gold",
        rank: 3,
        xp: 25,
        color: "#FFD700",
        label: "Advanced",
    },
    TierDefinition {
        tier: Difficulty::Platinum,
        name: "Platinum",
        rank: 4,
        xp: 40,
        color: "#E5E4E2",
        label: "Expert",
    },
];

impl Difficulty {
    pub fn from_name(name: &str) -> Self {
        let name = name.trim();
        TIERS
            .iter()
            .find(|def| def.name.eq_ignore_ascii_case(name))
            .map(|def| def.tier)
            .unwrap_or(Difficulty::Unknown)
    }

    pub fn definition(self) -> Option<&'static TierDefinition> {
        TIERS.iter().find(|def| def.tier == self)
    }

    pub fn name(self) -> &'static str {
        self.definition().map_or(FALLBACK_LABEL, |def| def.name)
    }

    /// 1 (Bronze) through 4 (Platinum); 0 for unknown tiers.
    pub fn rank(self) -> u8 {
        self.definition().map_or(0, |def| def.rank)
    }

    pub fn xp_award(self) -> u32 {
        self.definition().map_or(XP_PER_CORRECT, |def| def.xp)
    }

    pub fn color(self) -> &'static str {
        self.definition().map_or(FALLBACK_COLOR, |def| def.color)
    }

    pub fn label(self) -> &'static str {
        self.definition().map_or(FALLBACK_LABEL, |def| def.label)
    }
}

impl From<String> for Difficulty {
    fn from(name: String) -> Self {
        Difficulty::from_name(&name)
    }
}

impl From<Difficulty> for String {
    fn from(tier: Difficulty) -> Self {
        tier.name().to_string()
    }
}

pub fn difficulty_color(name: &str) -> &'static str {
    Difficulty::from_name(name).color()
}

pub fn difficulty_label(name: &str) -> &'static str {
    Difficulty::from_name(name).label()
}
