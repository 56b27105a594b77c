use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("queue closed")]
    Closed,
    #[error("task execution failed: {0}")]
    Execution(String),
    #[error("internal error: {0}")]
    Internal(String),
}
