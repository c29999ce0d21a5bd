//! Wire types exchanged with the quiz backend and the presentation-safe views
//! handed to the UI shell.

pub mod attempt;
pub mod quiz;
pub mod roster;
pub mod view;

pub type QuizId = i64;
pub type QuestionId = i64;
pub type AlternativeId = i64;
pub type AttemptId = i64;
pub type SubjectId = i64;
