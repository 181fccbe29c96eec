use thiserror::Error;

/// Failure kinds surfaced by one dispatch, one poll tick, or one auxiliary query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("{0}")]
    Validation(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("backend error: {0}")]
    Backend(String),
}

impl ControllerError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    /// Message without the kind prefix, as shown in `ConnectionState::error_message`.
    pub fn message(&self) -> &str {
        match self {
            Self::Validation(message) | Self::Transport(message) | Self::Backend(message) => {
                message
            }
        }
    }
}

impl From<reqwest::Error> for ControllerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Transport(format!("malformed response body: {err}"))
        } else if err.is_timeout() {
            Self::Transport(format!("request timed out: {err}"))
        } else {
            Self::Transport(err.to_string())
        }
    }
}
