pub mod error;
pub mod pool;
pub mod queue;

pub use error::PipelineError;
pub use pool::{SettleGauge, TaskExecutor, TaskSubmitter, WorkerPool};
pub use queue::{Priority, TaskQueue};
