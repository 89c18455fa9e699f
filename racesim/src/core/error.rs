use thiserror::Error;

/// Errors that reject a race configuration at initialization. They are fatal to the race attempt
/// and never retried internally.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The racer list handed to initialize was empty
    #[error("a race requires at least one racer")]
    NoRacers,

    /// Race duration was zero, negative or not a finite number
    #[error("race duration must be a positive number of minutes, got {duration_minutes}")]
    InvalidDuration { duration_minutes: f64 },

    /// Two racers share the same key
    #[error("racer key '{key}' is used more than once")]
    DuplicateRacerKey { key: String },

    /// A tunable simulation constant is outside of its valid range
    #[error("invalid simulation constant {name}: {reason}")]
    InvalidConstant { name: &'static str, reason: String },
}
