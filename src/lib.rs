#![forbid(unsafe_code)]

pub mod audio;
pub mod cleanup;
pub mod cost;
pub mod encode;
pub mod engine;
pub mod error;
pub mod fit;
pub mod frame;
pub mod job;
pub mod media;
pub mod model;
pub mod subtitle;

pub use cost::{CostBreakdown, CostCalculator, CostConfig, UsageMetrics};
pub use engine::{CancelToken, RenderControl, RenderEngine, RenderFailure};
pub use error::{ReelforgeError, ReelforgeResult};
pub use job::{
    InMemoryResultStore, JobWorker, RenderJobSpec, ResultStore, RetryPolicy, TaskState, parse_job,
};
pub use model::{
    AudioTimestamps, RenderJob, RenderProgress, RenderResult, RenderSettings, RenderStage,
    SceneData, SceneKind, TransitionKind, VideoScript, WordTimestamp,
};
