use thiserror::Error;

/// Failures of the decode / resample capabilities. Always recoverable per chunk.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to probe format: {0}")]
    Probe(String),
    #[error("no audio track found")]
    NoTrack,
    #[error("sample rate not found")]
    MissingSampleRate,
    #[error("decoder error: {0}")]
    Codec(String),
    #[error("chunk produced no samples")]
    Empty,
    #[error("resampling failed: {0}")]
    Resample(String),
}

/// Failures talking to the fingerprint extraction / search services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("service returned status {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("service message: {0}")]
    Message(String),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("stream returned status {0}")]
    Status(u16),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Session lifecycle errors. Only bootstrap failures are fatal.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("trigger bootstrap failed: {0}")]
    Bootstrap(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
