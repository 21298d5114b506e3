//! Error taxonomy for the randomization engine.
//!
//! Every failure is a caller-fixable input problem and is returned at the point
//! of detection. Nothing in the engine retries or substitutes a default number.

/// Errors raised by the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or invalid configuration: absent keys, non-positive stratum
    /// sizes, a stratum with no weight, `R < 1`, an out-of-range `alpha`.
    #[error("configuration error: {0}")]
    Config(String),

    /// A treated count that cannot be drawn from its stratum.
    #[error("assignment error: {0}")]
    Assignment(String),

    /// An arm or stratum lacks the observations a mean or variance needs.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub(crate) fn assignment(msg: impl Into<String>) -> Self {
        Self::Assignment(msg.into())
    }

    pub(crate) fn insufficient(msg: impl Into<String>) -> Self {
        Self::InsufficientData(msg.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Config(format!("failed to parse configuration JSON: {e}"))
    }
}

/// Result alias used by every fallible engine operation.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_kind() {
        let e = Error::config("R_fisher must be >= 1");
        assert_eq!(e.to_string(), "configuration error: R_fisher must be >= 1");
        let e = Error::insufficient("empty treated arm");
        assert!(e.to_string().starts_with("insufficient data"));
    }

    #[test]
    fn test_json_error_maps_to_config() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Config(_)));
    }
}
