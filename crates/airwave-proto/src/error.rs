use thiserror::Error;

/// Failure of a single backend operation.
///
/// Callers surface these as transient notices; none of them are fatal.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("not signed in")]
    Unauthenticated,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("backend error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BackendError>;

impl BackendError {
    /// Map an HTTP status and the response's message onto an error variant.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => BackendError::Unauthenticated,
            404 => BackendError::NotFound(message),
            409 => BackendError::Conflict(message),
            _ => BackendError::Api { status, message },
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        BackendError::Validation(message.into())
    }

    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, BackendError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert!(BackendError::from_status(401, "jwt expired").is_unauthenticated());
        assert!(BackendError::from_status(403, "denied").is_unauthenticated());
        assert!(matches!(
            BackendError::from_status(404, "nope"),
            BackendError::NotFound(m) if m == "nope"
        ));
        assert!(matches!(
            BackendError::from_status(409, "dup"),
            BackendError::Conflict(_)
        ));
        assert!(matches!(
            BackendError::from_status(500, "boom"),
            BackendError::Api { status: 500, .. }
        ));
    }

    #[test]
    fn validation_displays_message_only() {
        let e = BackendError::validation("Comment cannot be empty");
        assert_eq!(e.to_string(), "Comment cannot be empty");
    }
}
