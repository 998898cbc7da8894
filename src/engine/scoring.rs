use crate::engine::difficulty::Difficulty;

pub const STREAK_BONUS_XP: u32 = 5;

/// Minimum cumulative XP for each level; index `i` gates level `i + 1`.
pub const LEVEL_THRESHOLDS: [u32; 15] = [
    0, 100, 250, 500, 850, 1250, 1700, 2200, 2750, 3350, 4000, 4700, 5450, 6250, 7100,
];

pub const MAX_LEVEL: u32 = LEVEL_THRESHOLDS.len() as u32;

const LEVEL_NAMES: [&str; 15] = [
    "Agile Apprentice",
    "Agile Practitioner",
    "Agile Specialist",
    "Agile Coordinator",
    "Agile Manager",
    "Agile Strategist",
    "Agile Coach",
    "Agile Mentor",
    "Agile Champion",
    "Agile Master",
    "Agile Authority",
    "Agile Visionary",
    "Agile Sage",
    "Agile Legend",
    "PMI-ACP Champion",
];

pub fn calculate_xp(correct: bool, difficulty: Difficulty, streak_bonus: bool) -> u32 {
    if !correct {
        return 0;
    }
    let bonus = if streak_bonus { STREAK_BONUS_XP } else { 0 };
    difficulty.xp_award() + bonus
}

/// Total XP for one attempt given `(correct, difficulty)` per answered question.
pub fn attempt_xp<I>(answers: I, streak_bonus: bool) -> u32
where
    I: IntoIterator<Item = (bool, Difficulty)>,
{
    answers
        .into_iter()
        .map(|(correct, difficulty)| calculate_xp(correct, difficulty, streak_bonus))
        .sum()
}

pub fn level_from_xp(total_xp: u32) -> u32 {
    LEVEL_THRESHOLDS
        .iter()
        .rposition(|&threshold| total_xp >= threshold)
        .map_or(1, |idx| idx as u32 + 1)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelProgress {
    pub level: u32,
    /// XP still missing before the next level; 0 at the top level.
    pub needed: u32,
    /// XP earned since the current level's floor. Keeps growing past the
    /// last threshold.
    pub progress: u32,
    pub next_level: u32,
}

impl LevelProgress {
    /// Fill of the current level band in `[0, 1]`.
    pub fn ratio(&self) -> f64 {
        let band = self.progress + self.needed;
        if self.needed == 0 || band == 0 {
            return 1.0;
        }
        (self.progress as f64 / band as f64).clamp(0.0, 1.0)
    }
}

pub fn xp_for_next_level(total_xp: u32) -> LevelProgress {
    let level = level_from_xp(total_xp);
    let floor = LEVEL_THRESHOLDS[(level - 1) as usize];
    let ceiling = LEVEL_THRESHOLDS
        .get(level as usize)
        .copied()
        .unwrap_or(LEVEL_THRESHOLDS[LEVEL_THRESHOLDS.len() - 1]);

    LevelProgress {
        level,
        needed: ceiling.saturating_sub(total_xp),
        progress: total_xp - floor,
        next_level: (level + 1).min(MAX_LEVEL),
    }
}

pub fn level_name(level: u32) -> &'static str {
    let idx = (level.saturating_sub(1) as usize).min(LEVEL_NAMES.len() - 1);
    LEVEL_NAMES[idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_TIERS: [Difficulty; 5] = [
        Difficulty::Bronze,
        Difficulty::Silver,
        Difficulty::Gold,
        Difficulty::Platinum,
        Difficulty::Unknown,
    ];

    #[test]
    fn test_incorrect_answer_earns_nothing() {
        for tier in ALL_TIERS {
            assert_eq!(calculate_xp(false, tier, false), 0);
            assert_eq!(calculate_xp(false, tier, true), 0);
        }
    }

    #[test]
    fn test_correct_answer_awards_tier_xp() {
        assert_eq!(calculate_xp(true, Difficulty::Bronze, false), 10);
        assert_eq!(calculate_xp(true, Difficulty::Silver, false), 15);
        assert_eq!(calculate_xp(true, Difficulty::Gold, false), 25);
        assert_eq!(calculate_xp(true, Difficulty::Platinum, false), 40);
        assert_eq!(calculate_xp(true, Difficulty::Unknown, false), 10);
    }

    #[test]
    fn test_streak_bonus_stacks_on_top() {
        assert_eq!(calculate_xp(true, Difficulty::Platinum, true), 45);
        assert_eq!(calculate_xp(true, Difficulty::Bronze, true), 15);
    }

    #[test]
    fn test_attempt_xp_sums_answers() {
        let answers = vec![
            (true, Difficulty::Bronze),
            (false, Difficulty::Platinum),
            (true, Difficulty::Gold),
        ];
        assert_eq!(attempt_xp(answers.clone(), false), 35);
        assert_eq!(attempt_xp(answers, true), 45);
    }

    #[test]
    fn test_level_boundaries() {
        assert_eq!(level_from_xp(0), 1);
        assert_eq!(level_from_xp(99), 1);
        assert_eq!(level_from_xp(100), 2);
        assert_eq!(level_from_xp(249), 2);
        assert_eq!(level_from_xp(7099), 14);
        assert_eq!(level_from_xp(7100), 15);
        assert_eq!(level_from_xp(999_999), 15);
    }

    #[test]
    fn test_level_is_monotonic() {
        let mut prev = level_from_xp(0);
        for xp in (0..8000).step_by(7) {
            let level = level_from_xp(xp);
            assert!(level >= prev, "level dropped at {xp} XP");
            prev = level;
        }
    }

    #[test]
    fn test_next_level_progress_mid_band() {
        let p = xp_for_next_level(300);
        assert_eq!(p.level, 3);
        assert_eq!(p.needed, 200);
        assert_eq!(p.progress, 50);
        assert_eq!(p.next_level, 4);
        assert!((p.ratio() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_next_level_at_exact_threshold() {
        let p = xp_for_next_level(100);
        assert_eq!(p.level, 2);
        assert_eq!(p.needed, 150);
        assert_eq!(p.progress, 0);
        assert_eq!(p.ratio(), 0.0);
    }

    #[test]
    fn test_needed_never_negative_at_max_level() {
        let p = xp_for_next_level(9000);
        assert_eq!(p.level, MAX_LEVEL);
        assert_eq!(p.needed, 0);
        assert_eq!(p.progress, 1900);
        assert_eq!(p.next_level, MAX_LEVEL);
        assert_eq!(p.ratio(), 1.0);

        for xp in (0..10_000).step_by(13) {
            let p = xp_for_next_level(xp);
            assert_eq!(p.level, level_from_xp(xp));
            assert!(p.progress + LEVEL_THRESHOLDS[(p.level - 1) as usize] == xp);
        }
    }

    #[test]
    fn test_level_names_clamp() {
        assert_eq!(level_name(1), "Agile Apprentice");
        assert_eq!(level_name(10), "Agile Master");
        assert_eq!(level_name(15), "PMI-ACP Champion");
        assert_eq!(level_name(99), "PMI-ACP Champion");
        assert_eq!(level_name(0), "Agile Apprentice");
    }

    #[test]
    fn test_thresholds_strictly_increase() {
        assert!(LEVEL_THRESHOLDS.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(LEVEL_THRESHOLDS[0], 0);
    }
}
