pub mod progress_bar;
pub mod question_view;
pub mod result_view;
pub mod stats_view;
