//! Emailed reports: the run summary and the booked-meetings digest.

pub mod meetings;
pub mod summary;

pub use meetings::MeetingReporter;
pub use summary::{summarize, PipelineSummary, SummaryReporter};
