pub mod matching;
pub mod submission;
