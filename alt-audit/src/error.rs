//! Error types for export and download requests.

use thiserror::Error;

/// Why a request was refused before any work was done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum AuthorizationFailure {
    /// The anti-forgery token is missing, stale or bound to another action/session.
    InvalidNonce,
    /// The caller lacks the capability required for the action.
    MissingCapability,
}

impl AuthorizationFailure {
    /// User-facing denial message.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::InvalidNonce => "Security check failed.",
            Self::MissingCapability => "You do not have permission to perform this action.",
        }
    }
}

/// Request-level failure of an export or download.
///
/// Per-record scan failures never reach this type: they are logged and the
/// record is skipped.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExportError {
    /// Failed capability or anti-forgery check. No scan was performed.
    #[error("{}", .0.message())]
    Authorization(AuthorizationFailure),
    /// The requested report does not exist.
    #[error("{0}")]
    NotFound(String),
    /// Malformed filename or extension on the download path.
    #[error("{0}")]
    Validation(String),
    /// Anything that went wrong inside a scanner or the report writer.
    #[error("export failed: {0:#}")]
    UnexpectedScan(#[source] anyhow::Error),
}

/// Coarse class of an [`ExportError`], for callers mapping failures to statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    Authorization,
    NotFound,
    Validation,
    Unexpected,
}

impl ExportError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Authorization(_) => ErrorKind::Authorization,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Validation(_) => ErrorKind::Validation,
            Self::UnexpectedScan(_) => ErrorKind::Unexpected,
        }
    }

    /// Message safe to show to the caller.
    ///
    /// Unexpected failures are collapsed to a generic message; details only go to the log.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::UnexpectedScan(_) => "An error occurred during export.".to_owned(),
            other => other.to_string(),
        }
    }
}

impl From<AuthorizationFailure> for ExportError {
    fn from(failure: AuthorizationFailure) -> Self {
        Self::Authorization(failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_message_is_explicit() {
        let err = ExportError::from(AuthorizationFailure::InvalidNonce);
        assert_eq!(err.user_message(), "Security check failed.");
        assert_eq!(err.kind(), ErrorKind::Authorization);

        let err = ExportError::from(AuthorizationFailure::MissingCapability);
        assert!(err.user_message().contains("permission"));
    }

    #[test]
    fn test_unexpected_error_is_generic_for_users() {
        let err = ExportError::UnexpectedScan(anyhow::anyhow!("disk full at /var/reports"));
        assert_eq!(err.user_message(), "An error occurred during export.");
        assert!(err.to_string().contains("disk full"));
        assert_eq!(err.kind(), ErrorKind::Unexpected);
    }
}
