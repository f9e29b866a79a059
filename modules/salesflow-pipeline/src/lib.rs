pub mod calendar;
pub mod discovery;
pub mod enrichment;
pub mod mailer;
pub mod outreach;
pub mod pipeline;
pub mod proposal;
pub mod render;
pub mod report;
pub mod reviewer;
pub mod stats;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
pub mod workflows;
pub mod writer;
