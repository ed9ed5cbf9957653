//! Run state: the record of the last provisioning run.

pub mod record;
pub mod store;

pub use record::{RunRecord, RunRecordBuilder, StepRecord};
pub use store::{StateStore, LAST_RUN_FILE};
