pub mod attempt_timing;
pub mod quiz_api;
pub mod randomization;
pub mod reconciler;
pub mod responses;
pub mod submission;
pub mod view_mode;
