use cdrtool_core::MappingError;
use thiserror::Error;

/// Longest response body excerpt kept in a [`RepoError::Request`].
const BODY_EXCERPT: usize = 512;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("request to {url} failed with status {status}: {body}")]
    Request {
        url: String,
        status: u16,
        body: String,
    },

    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response from {url}: {reason}")]
    Parse { url: String, reason: String },

    #[error("envelope creation rejected: {}", .errors.join("; "))]
    Clone { errors: Vec<String> },

    #[error("upload of {file} failed: {reason}")]
    Upload { file: String, reason: String },

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RepoError {
    /// A non-success response, keeping only the head of the body.
    pub fn request(url: impl Into<String>, status: u16, body: &str) -> Self {
        let body = match body.char_indices().nth(BODY_EXCERPT) {
            Some((cut, _)) => format!("{}...", &body[..cut]),
            None => body.to_string(),
        };
        Self::Request {
            url: url.into(),
            status,
            body,
        }
    }

    pub fn parse(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_error_truncates_body() {
        let body = "x".repeat(2000);
        let err = RepoError::request("http://h/api", 500, &body);
        let RepoError::Request { body, status, .. } = err else {
            panic!("expected request error");
        };
        assert_eq!(status, 500);
        assert_eq!(body.len(), BODY_EXCERPT + 3);
        assert!(body.ends_with("..."));
    }

    #[test]
    fn clone_error_lists_server_errors() {
        let err = RepoError::Clone {
            errors: vec!["http response 403".into(), "no rights".into()],
        };
        assert_eq!(
            err.to_string(),
            "envelope creation rejected: http response 403; no rights"
        );
    }
}
