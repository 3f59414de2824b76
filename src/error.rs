//! Error kinds reported by the calibration core.
//!
//! Guard failures (`InvalidVoltageInput`, `ForceLimitExceeded`, `NotReset`,
//! `UnknownProfile`) are returned synchronously and never change session state.
//! `SourceFailure` is only ever recorded on the snapshot by the sampling worker.

#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    #[error("invalid voltage input for {field}: {value:?} is not a number")]
    InvalidVoltageInput { field: &'static str, value: String },

    #[error("requested force {requested} N exceeds the limit of {max} N")]
    ForceLimitExceeded { requested: f64, max: f64 },

    #[error("reading source failed: {0}")]
    SourceFailure(String),

    #[error("unknown connector profile {0:?}")]
    UnknownProfile(String),

    #[error("session is stopped; reset before starting a new run")]
    NotReset,

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error(transparent)]
    Worker(#[from] anyhow::Error),
}

pub type CalibrationResult<T> = Result<T, CalibrationError>;
