use std::path::PathBuf;
use thiserror::Error;

/// Phrases the catalog uses when it throttles us.
const RATE_LIMIT_INDICATORS: [&str; 5] = [
    "429",
    "rate limit",
    "Rate limit",
    "too many requests",
    "Too Many Requests",
];

/// Central error type for the pack engine.
/// Every module returns `Result<T, PackError>`.
#[derive(Debug, Error)]
pub enum PackError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Catalog returned HTTP {status_code}: {message}")]
    Remote { status_code: u16, message: String },

    #[error("Batch hash lookup failed: {source}")]
    Lookup {
        #[source]
        source: Box<PackError>,
    },

    // ── Parse ───────────────────────────────────────────
    #[error("Failed to parse {path:?}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Unknown update source '{source_name}' in {path:?}")]
    UnknownUpdateSource { path: PathBuf, source_name: String },

    #[error("TOML encode error: {0}")]
    TomlEncode(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── Domain ──────────────────────────────────────────
    #[error("{0}")]
    Validation(String),

    #[error("No compatible files found for version {version_id}")]
    NoCompatibleFile { version_id: String },

    #[error("Unsupported hash format: {0}")]
    UnsupportedHashFormat(String),

    #[error("Unsupported project type: {0}")]
    UnsupportedProjectType(String),

    #[error("Cannot find mod '{0}'")]
    ModNotFound(String),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type PackResult<T> = Result<T, PackError>;

impl From<std::io::Error> for PackError {
    fn from(source: std::io::Error) -> Self {
        PackError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

impl PackError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PackError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        PackError::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// True when the catalog asked us to slow down.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            PackError::Remote {
                status_code: 429, ..
            } => true,
            PackError::Http(err) if err.status().map(|s| s.as_u16()) == Some(429) => true,
            other => {
                let message = other.to_string();
                RATE_LIMIT_INDICATORS
                    .iter()
                    .any(|indicator| message.contains(indicator))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_429_is_rate_limited() {
        let err = PackError::Remote {
            status_code: 429,
            message: String::new(),
        };
        assert!(err.is_rate_limited());
    }

    #[test]
    fn message_indicators_are_rate_limited() {
        let err = PackError::Remote {
            status_code: 503,
            message: "Too Many Requests, slow down".into(),
        };
        assert!(err.is_rate_limited());
        assert!(PackError::Other("hit the rate limit".into()).is_rate_limited());
    }

    #[test]
    fn ordinary_failures_are_not_rate_limited() {
        let err = PackError::Remote {
            status_code: 404,
            message: "project not found".into(),
        };
        assert!(!err.is_rate_limited());
    }
}
