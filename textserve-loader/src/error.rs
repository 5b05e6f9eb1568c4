use thiserror::Error;

/// Errors that can occur while configuring an instance or resolving its artifacts
#[derive(Debug, Error)]
pub enum LoaderError {
    /// Invalid instance or artifact configuration
    #[error("Invalid config: {0}\n⚙️ Check compute_kind, model_identifier and vocabulary_identifier settings")]
    InvalidConfig(String),

    /// Artifact not found at the specified location
    #[error("Artifact not found: {0}\n📁 Verify the path exists and is readable. For HuggingFace: check repo name and filename, or disable offline mode")]
    NotFound(String),

    /// Network error while talking to the HuggingFace hub
    #[error("Network error: {0}\n🌐 Check internet connection and HuggingFace availability")]
    Network(String),

    /// Download gave up after exhausting retries
    #[error("Download failed: {0}")]
    Download(String),

    /// I/O error during file operations
    #[error("I/O error: {0}\n💾 Check file permissions and storage availability")]
    Io(#[from] std::io::Error),
}

impl LoaderError {
    /// Create a new configuration error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Check if this error is retriable
    pub fn is_retriable(&self) -> bool {
        matches!(self, LoaderError::Network(_) | LoaderError::Io(_))
    }
}

// Convert from HuggingFace hub errors
impl From<hf_hub::api::tokio::ApiError> for LoaderError {
    fn from(err: hf_hub::api::tokio::ApiError) -> Self {
        let err_str = format!("{}", err);
        if err_str.contains("not found") || err_str.contains("404") {
            LoaderError::NotFound(format!("HuggingFace resource not found: {}", err))
        } else {
            LoaderError::Network(format!("HuggingFace API error: {}", err))
        }
    }
}
