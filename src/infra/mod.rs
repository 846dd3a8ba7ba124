pub mod aws;
pub mod classifier;
pub mod mailer;
pub mod queue;
pub mod records;
pub mod storage;
