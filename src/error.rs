//! Error types for denyblock.

use thiserror::Error;

/// Error type for denyblock operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Input does not parse as `a.b.c.d[/n]` with octets 0-255 and n 0-32
    #[error("malformed CIDR: {0}")]
    MalformedCidr(String),

    /// A deny statement whose CIDR could not be parsed (strict indexing only)
    #[error("malformed deny rule on line {line}: {text}")]
    MalformedRuleLine { line: usize, text: String },

    /// A raw chunk that is not a 0-8 character string of `0`/`1` bits
    #[error("malformed chunk: {0}")]
    MalformedChunk(String),

    /// Chunks that do not form one contiguous prefix
    #[error("inconsistent chunk sequence: {0}")]
    InconsistentChunks(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Download error
    #[error("download error: {0}")]
    Download(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("HTTP {status} fetching {url}")]
    Http { url: String, status: u16 },

    /// Bot keyword other than `google`, `bing` or `ddg`
    #[error("unknown bot: {0}")]
    UnknownBot(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for denyblock operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::MalformedCidr("1.2.3/8".to_string());
        assert_eq!(err.to_string(), "malformed CIDR: 1.2.3/8");

        let err = Error::MalformedRuleLine {
            line: 7,
            text: "deny 300.1.1.1/8;".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "malformed deny rule on line 7: deny 300.1.1.1/8;"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
