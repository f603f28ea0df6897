pub mod spec;
pub mod store;
pub mod worker;

pub use spec::{RenderJobSpec, parse_job};
pub use store::{InMemoryResultStore, ProgressSink, ResultSink, ResultStore, TaskSnapshot, TaskState};
pub use worker::{CancelOutcome, JobWorker, RetryPolicy};
