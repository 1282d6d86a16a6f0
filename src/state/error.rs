#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("failed to read state {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("state {path} is {size} bytes, above the {limit} byte limit")]
    TooLarge { path: String, size: u64, limit: u64 },
    #[error("failed to parse state {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("state {path} failed validation: {reason}")]
    Invalid { path: String, reason: String },
    #[error("failed to encode state: {source}")]
    Encode {
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write state {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
