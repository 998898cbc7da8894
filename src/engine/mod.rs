pub mod badges;
pub mod difficulty;
pub mod domain;
pub mod progress;
pub mod scoring;
pub mod streak;

pub use progress::{AttemptContext, AttemptOutcome, ProgressState, ProgressUpdate, apply_attempt};
