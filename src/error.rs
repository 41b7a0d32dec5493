use thiserror::Error;

/// Errors surfaced by the scheduling pipeline.
///
/// Configuration problems fail fast at the point of use; they are never
/// papered over with a guessed default.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("targetRetention must be strictly between 0 and 1, got {0}")]
    InvalidTargetRetention(f64),

    #[error("algorithm {0} does not support training")]
    TrainingUnsupported(String),
}
