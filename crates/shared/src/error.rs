use serde::{Deserialize, Serialize};

/// Top-level `status` field carried by every backend response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Success,
    Error,
    #[serde(other)]
    Unknown,
}

impl ResponseStatus {
    pub fn is_success(self) -> bool {
        self == ResponseStatus::Success
    }
}

/// Error body the backend returns alongside non-2xx results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub status: ResponseStatus,
    #[serde(default)]
    pub message: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            message: message.into(),
        }
    }
}
