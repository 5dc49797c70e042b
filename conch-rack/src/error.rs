//! Error taxonomy for backend calls and view-model operations.

/// Everything a backend call or a rack operation can fail with.
#[derive(Debug, thiserror::Error)]
pub enum ConchError {
    /// Session missing or expired. Gated calls turn this into a redirect.
    #[error("unauthorized")]
    Unauthorized,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    /// The rack a session was opened for is not the one currently held.
    #[error("rack {0} is not loaded")]
    RackNotLoaded(String),
    #[error("no workspace available for this account")]
    NoWorkspace,
    #[error("invalid backend url: {0}")]
    InvalidUrl(String),
}

impl ConchError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ConchError::Unauthorized)
    }

    /// Not-found and conflict answers are legitimate empty state, not failures.
    pub fn is_empty_state(&self) -> bool {
        matches!(self, ConchError::NotFound(_) | ConchError::Conflict(_))
    }
}

pub type Result<T, E = ConchError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_helpers() {
        assert!(ConchError::Unauthorized.is_unauthorized());
        assert!(ConchError::Conflict("device has no location".into()).is_empty_state());
        assert!(ConchError::NotFound("/device/x/location".into()).is_empty_state());
        let status = ConchError::Status { status: 500, url: "/rack".into() };
        assert!(!status.is_empty_state());
        assert!(!status.is_unauthorized());
    }
}
