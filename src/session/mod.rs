pub mod assessment;
pub mod input;
pub mod question;
pub mod quiz;
pub mod result;
