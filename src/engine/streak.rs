use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakState {
    pub current: u32,
    pub longest: u32,
}

impl StreakState {
    pub fn new(current: u32, longest: u32) -> Self {
        Self { current, longest }
    }

    /// Streak after a completed quiz. `days_passed` is `None` when this is the
    /// user's first completion ever.
    pub fn after_completion(self, days_passed: Option<i64>) -> Self {
        match days_passed {
            None => Self {
                current: 1,
                longest: self.longest.max(1),
            },
            // A recorded completion with a zero streak means the stored state
            // predates streak tracking; today still counts.
            Some(_) if self.current == 0 => Self::new(1, self.longest.max(1)),
            Some(days) => update_streak(self.current, self.longest, days),
        }
    }
}

pub fn update_streak(current: u32, longest: u32, days_passed: i64) -> StreakState {
    match days_passed {
        1 => {
            let current = current + 1;
            StreakState {
                current,
                longest: longest.max(current),
            }
        }
        d if d > 1 => StreakState {
            current: 1,
            longest,
        },
        // Same calendar day (or a clock running backwards): no change.
        _ => StreakState { current, longest },
    }
}

/// Local calendar date of a UTC instant for a fixed offset in minutes.
pub fn local_date(at: DateTime<Utc>, utc_offset_minutes: i32) -> NaiveDate {
    (at + Duration::minutes(utc_offset_minutes as i64)).date_naive()
}

/// Whole calendar days from `last` to `now`, compared as local dates.
pub fn calendar_days_between(
    last: DateTime<Utc>,
    now: DateTime<Utc>,
    utc_offset_minutes: i32,
) -> i64 {
    let last_date = local_date(last, utc_offset_minutes);
    let now_date = local_date(now, utc_offset_minutes);
    now_date.signed_duration_since(last_date).num_days()
}
