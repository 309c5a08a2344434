//! Domain error types.

/// Top-level error type for regimetrader.
#[derive(Debug, thiserror::Error)]
pub enum RegimetraderError {
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

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("insufficient data for {context}: have {bars} bars, need {minimum}")]
    InsufficientData {
        context: String,
        bars: usize,
        minimum: usize,
    },

    #[error("data gap at bar {index}: open_time {current} does not follow {previous}")]
    DataGap {
        index: usize,
        previous: String,
        current: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RegimetraderError {
    pub fn invalid(name: &str, reason: impl Into<String>) -> Self {
        RegimetraderError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&RegimetraderError> for std::process::ExitCode {
    fn from(err: &RegimetraderError) -> Self {
        let code: u8 = match err {
            RegimetraderError::Io(_) | RegimetraderError::Json(_) => 1,
            RegimetraderError::ConfigParse { .. }
            | RegimetraderError::ConfigMissing { .. }
            | RegimetraderError::ConfigInvalid { .. }
            | RegimetraderError::InvalidParameter { .. } => 2,
            RegimetraderError::InsufficientData { .. }
            | RegimetraderError::DataGap { .. }
            | RegimetraderError::Data { .. }
            | RegimetraderError::Csv(_) => 5,
        };
        std::process::ExitCode::from(code)
    }
}
