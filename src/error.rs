use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur during a pipeline run
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A strict-reject queue refused a push; recoverable, queue state stays consistent
    #[error("queue \"{0}\" is full")]
    QueueFull(String),

    /// A consumer exhausted its miss budget without ever finding work
    #[error("consumer {consumer} starved after {misses} consecutive empty polls")]
    Starved { consumer: usize, misses: u64 },

    /// A work unit failed inside the process collaborator
    #[error("work unit failed: {0}")]
    Process(String),

    /// A run is already in progress on this driver
    #[error("pipeline is already running")]
    AlreadyRunning,

    /// A worker thread panicked
    #[error("thread error: {0}")]
    ThreadError(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}
