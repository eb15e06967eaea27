//! Error types for the BiasLens core library.
//!
//! Uses `thiserror` for public API error types. Each failure class the pipeline
//! can raise has its own sub-enum so callers can branch on a stable kind.

use uuid::Uuid;

use crate::types::EvaluationStatus;

/// Top-level error type for the BiasLens core library.
#[derive(Debug, thiserror::Error)]
pub enum BiasLensError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Insufficient data: {0}")]
    InsufficientData(#[from] InsufficientDataError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Not found: {what} '{id}'")]
    NotFound { what: &'static str, id: String },

    #[error("Evaluation {id} was cancelled")]
    Cancelled { id: Uuid },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Rejected inputs, detected at the entry of the offending operation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Unknown bias type: {name}")]
    UnknownBiasType { name: String },

    #[error("Iteration count {value} outside allowed range {min}..={max}")]
    IterationCountOutOfRange { value: u32, min: u32, max: u32 },

    #[error("Invalid recommendation mode: {mode} (expected technical, simplified or both)")]
    InvalidMode { mode: String },

    #[error("At least one bias type is required")]
    NoBiasTypes,

    #[error("Too many bias types: {count} (at most {max})")]
    TooManyBiasTypes { count: usize, max: usize },

    #[error("Invalid target system name: {reason}")]
    InvalidTarget { reason: String },

    #[error("Invalid zone thresholds: green {green} must not exceed yellow {yellow}")]
    InvalidThresholds { green: f64, yellow: f64 },

    #[error("Finding {finding} does not belong to evaluation {evaluation}")]
    ForeignFinding { finding: Uuid, evaluation: Uuid },

    #[error("Invalid baseline name: {reason}")]
    InvalidBaselineName { reason: String },

    #[error("Evaluation {id} is listed more than once")]
    DuplicateEvaluation { id: Uuid },

    #[error("Page limit {value} outside allowed range 1..={max}")]
    PageLimitOutOfRange { value: usize, max: usize },
}

/// Operations invoked on an evaluation in the wrong lifecycle state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StateError {
    #[error("Evaluation {id} is {status}, only pending evaluations can be executed")]
    NotPending { id: Uuid, status: EvaluationStatus },

    #[error("Evaluation {id} is {status}, a completed evaluation is required")]
    NotCompleted { id: Uuid, status: EvaluationStatus },

    #[error("Evaluation {id} is already being executed")]
    AlreadyRunning { id: Uuid },

    #[error("Cannot replace existing {what} '{id}'")]
    AlreadyExists { what: &'static str, id: String },

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition {
        from: EvaluationStatus,
        to: EvaluationStatus,
    },
}

/// Not enough samples to compute an aggregate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InsufficientDataError {
    #[error("No findings to aggregate")]
    NoFindings,

    #[error("Baseline requires at least {required} evaluations, got {got}")]
    BaselineSamples { required: usize, got: usize },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration load error: {message}")]
    Load { message: String },
}

/// Stable error identity for callers translating errors into user messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    State,
    InsufficientData,
    Config,
    NotFound,
    Cancelled,
    Io,
    Serialization,
}

impl BiasLensError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BiasLensError::Validation(_) => ErrorKind::Validation,
            BiasLensError::State(_) => ErrorKind::State,
            BiasLensError::InsufficientData(_) => ErrorKind::InsufficientData,
            BiasLensError::Config(_) => ErrorKind::Config,
            BiasLensError::NotFound { .. } => ErrorKind::NotFound,
            BiasLensError::Cancelled { .. } => ErrorKind::Cancelled,
            BiasLensError::Io(_) => ErrorKind::Io,
            BiasLensError::Serialization(_) => ErrorKind::Serialization,
        }
    }

    pub fn not_found(what: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            what,
            id: id.to_string(),
        }
    }
}

/// A type alias for results using the top-level `BiasLensError`.
pub type Result<T> = std::result::Result<T, BiasLensError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_validation() {
        let err = BiasLensError::Validation(ValidationError::UnknownBiasType {
            name: "unknown_type".into(),
        });
        assert_eq!(
            err.to_string(),
            "Validation error: Unknown bias type: unknown_type"
        );
    }

    #[test]
    fn test_error_display_iteration_range() {
        let err = ValidationError::IterationCountOutOfRange {
            value: 5,
            min: 10,
            max: 100,
        };
        assert_eq!(
            err.to_string(),
            "Iteration count 5 outside allowed range 10..=100"
        );
    }

    #[test]
    fn test_error_display_state() {
        let id = Uuid::nil();
        let err = BiasLensError::State(StateError::NotPending {
            id,
            status: EvaluationStatus::Completed,
        });
        assert_eq!(
            err.to_string(),
            format!(
                "State error: Evaluation {id} is completed, only pending evaluations can be executed"
            )
        );
    }

    #[test]
    fn test_error_display_already_exists() {
        let err: BiasLensError = StateError::AlreadyExists {
            what: "baseline",
            id: "prod".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::State);
        assert_eq!(
            err.to_string(),
            "State error: Cannot replace existing baseline 'prod'"
        );
    }

    #[test]
    fn test_error_display_insufficient_data() {
        let err: BiasLensError = InsufficientDataError::BaselineSamples {
            required: 2,
            got: 1,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Insufficient data: Baseline requires at least 2 evaluations, got 1"
        );
    }

    #[test]
    fn test_error_kind() {
        let err: BiasLensError = InsufficientDataError::NoFindings.into();
        assert_eq!(err.kind(), ErrorKind::InsufficientData);

        let err: BiasLensError = StateError::AlreadyRunning { id: Uuid::nil() }.into();
        assert_eq!(err.kind(), ErrorKind::State);

        let err = BiasLensError::not_found("evaluation", "abc");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "Not found: evaluation 'abc'");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: BiasLensError = io_err.into();
        assert!(matches!(err, BiasLensError::Io(_)));
    }

    #[test]
    fn test_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: BiasLensError = serde_err.into();
        assert!(matches!(err, BiasLensError::Serialization(_)));
    }
}
