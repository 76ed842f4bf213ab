use thiserror::Error;

/// Why a weather payload was rejected. The event is dropped and the previous
/// snapshot stays on screen.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("payload is missing field `{0}`")]
    MissingField(String),
    #[error("payload field `{key}` is not a {expected}")]
    WrongType { key: String, expected: &'static str },
    #[error("payload field `{key}` is out of range: {value}")]
    OutOfRange { key: String, value: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown timezone `{0}`")]
    InvalidTimezone(String),
}
