use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("no tokio runtime is available to drive timers: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}
