//! Domain error types.

/// Top-level error type for scalptrader.
#[derive(Debug, thiserror::Error)]
pub enum TraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    /// A trade intent that violates the position lifecycle (double open,
    /// close while flat, zero size). Only the single attempt is aborted.
    #[error("invalid intent: {reason}")]
    InvalidIntent { reason: String },

    #[error("engine for {market} already completed")]
    EngineCompleted { market: String },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("no candles for {market}")]
    NoData { market: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TraderError {
    pub(crate) fn invalid_intent(reason: impl Into<String>) -> Self {
        TraderError::InvalidIntent {
            reason: reason.into(),
        }
    }

    pub(crate) fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        TraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// A single unreadable record rather than a failing source.
    pub fn is_bad_record(&self) -> bool {
        match self {
            TraderError::Data { .. } => true,
            TraderError::Csv(e) => !e.is_io_error(),
            _ => false,
        }
    }
}

impl From<&TraderError> for std::process::ExitCode {
    fn from(err: &TraderError) -> Self {
        let code: u8 = match err {
            TraderError::Io(_) | TraderError::Csv(_) => 1,
            TraderError::ConfigParse { .. }
            | TraderError::ConfigMissing { .. }
            | TraderError::ConfigInvalid { .. } => 2,
            TraderError::InvalidIntent { .. } | TraderError::EngineCompleted { .. } => 4,
            TraderError::Data { .. } | TraderError::NoData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::ExitCode;

    #[test]
    fn config_errors_map_to_exit_code_two() {
        let err = TraderError::config_invalid("risk", "leverage", "must be positive");
        assert_eq!(ExitCode::from(&err), ExitCode::from(2));
        assert_eq!(
            err.to_string(),
            "invalid config value [risk] leverage: must be positive"
        );
    }

    #[test]
    fn invalid_intent_message() {
        let err = TraderError::invalid_intent("position already open");
        assert_eq!(err.to_string(), "invalid intent: position already open");
        assert_eq!(ExitCode::from(&err), ExitCode::from(4));
    }

    #[test]
    fn data_errors_map_to_exit_code_five() {
        let err = TraderError::NoData {
            market: "BTCUSDT".into(),
        };
        assert_eq!(ExitCode::from(&err), ExitCode::from(5));
    }
}
