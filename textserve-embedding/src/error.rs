use crate::pooling::PoolingError;
use thiserror::Error;

/// Failure carried in the response of a single request slot.
///
/// These never escape a pipeline as `Err`; they are always written into the
/// slot they belong to.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RequestError {
    /// A named input tensor is missing, has the wrong dtype, shape or values
    #[error("Invalid request input: {0}")]
    Input(String),

    /// Tokenized text is longer than the fixed maximum
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The aggregate forward pass for the batch this request was part of failed
    #[error("Batch execution failed: {0}")]
    BatchExecution(String),

    /// The pooled vector for this request could not be normalized
    #[error("Degenerate embedding: {0}")]
    Degenerate(String),
}

impl RequestError {
    pub fn input<S: Into<String>>(message: S) -> Self {
        Self::Input(message.into())
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    pub fn batch_execution<S: Into<String>>(message: S) -> Self {
        Self::BatchExecution(message.into())
    }

    pub fn degenerate<S: Into<String>>(message: S) -> Self {
        Self::Degenerate(message.into())
    }

    /// Stable machine-readable tag for the error family
    pub fn kind(&self) -> &'static str {
        match self {
            RequestError::Input(_) => "input",
            RequestError::Validation(_) => "validation",
            RequestError::BatchExecution(_) => "batch_execution",
            RequestError::Degenerate(_) => "degenerate",
        }
    }

    /// The message without the family prefix
    pub fn message(&self) -> &str {
        match self {
            RequestError::Input(m)
            | RequestError::Validation(m)
            | RequestError::BatchExecution(m)
            | RequestError::Degenerate(m) => m,
        }
    }
}

/// Errors raised while setting up or driving a model or vocabulary
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Error from artifact resolution
    #[error("Loader error: {0}")]
    Loader(#[from] textserve_loader::LoaderError),

    /// Error raised by the encoder model
    #[error("Model error: {0}")]
    Model(String),

    /// Error loading or using the vocabulary
    #[error("Vocabulary error: {0}")]
    Vocabulary(String),

    /// Error stacking request tensors into a batch
    #[error("Tensor shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// Error pooling hidden states
    #[error("Pooling error: {0}")]
    Pooling(#[from] PoolingError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error when the hidden width doesn't match the configured embedding width
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl EmbeddingError {
    /// Create a new model error
    pub fn model<S: Into<String>>(message: S) -> Self {
        Self::Model(message.into())
    }

    /// Create a new vocabulary error
    pub fn vocabulary<S: Into<String>>(message: S) -> Self {
        Self::Vocabulary(message.into())
    }

    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration(message.into())
    }
}

/// Result type alias for setup-time operations
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;
