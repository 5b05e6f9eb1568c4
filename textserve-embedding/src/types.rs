use crate::error::EmbeddingError;
use serde::{Deserialize, Serialize};

/// Default name of the token id input of an embedding request.
///
/// Not to be confused with [`TOKENIZED_IDS`], the tokenizer's output tensor.
pub const EMBED_INPUT_IDS: &str = "input_ids";
/// Default name of the attention mask input of an embedding request
pub const EMBED_ATTENTION_MASK: &str = "attention_mask";
/// Output of an embedding response, shape (1, D), f32
pub const EMBEDDING: &str = "EMBEDDING";
/// String input of a tokenization request
pub const INPUT_TEXT: &str = "INPUT_TEXT";
/// Output of a tokenization response, shape (n, max_length), i64.
///
/// The wire name is `INPUT_IDS`; the embedding inputs use [`EMBED_INPUT_IDS`].
pub const TOKENIZED_IDS: &str = "INPUT_IDS";

/// Configuration for the embedding pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Fixed sequence length L every request must carry
    pub sequence_length: usize,
    /// Largest number of requests run through the model in one forward pass
    pub max_batch_size: usize,
    /// Expected hidden width; checked against the model output when set
    pub embedding_dimension: Option<usize>,
    /// Name of the token id input tensor
    pub input_ids_name: String,
    /// Name of the attention mask input tensor
    pub attention_mask_name: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            sequence_length: 512,
            max_batch_size: 64,
            embedding_dimension: None,
            input_ids_name: EMBED_INPUT_IDS.to_string(),
            attention_mask_name: EMBED_ATTENTION_MASK.to_string(),
        }
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<(), EmbeddingError> {
        if self.sequence_length == 0 {
            return Err(EmbeddingError::configuration(
                "Sequence length must be greater than 0",
            ));
        }

        if self.sequence_length > 8192 {
            return Err(EmbeddingError::configuration(format!(
                "Sequence length {} exceeds the supported maximum of 8192",
                self.sequence_length
            )));
        }

        validate_batch_size(self.max_batch_size)?;

        if self.embedding_dimension == Some(0) {
            return Err(EmbeddingError::configuration(
                "Embedding dimension must be greater than 0",
            ));
        }

        if self.input_ids_name.is_empty() || self.attention_mask_name.is_empty() {
            return Err(EmbeddingError::configuration("Input tensor names cannot be empty"));
        }

        if self.input_ids_name == self.attention_mask_name {
            return Err(EmbeddingError::configuration(
                "input_ids and attention_mask must use different tensor names",
            ));
        }

        Ok(())
    }
}

/// Configuration for the tokenization pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenizerConfig {
    /// Fixed output length; longer texts are rejected, never truncated
    pub max_length: usize,
    /// Id written into padding positions
    pub pad_id: i64,
    /// Whether the vocabulary adds its special tokens (BOS/EOS) while encoding
    pub add_special_tokens: bool,
    /// Largest number of requests handled per execute call
    pub max_batch_size: usize,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            max_length: 64,
            pad_id: 0,
            add_special_tokens: true,
            max_batch_size: 64,
        }
    }
}

impl TokenizerConfig {
    pub fn validate(&self) -> Result<(), EmbeddingError> {
        if self.max_length == 0 {
            return Err(EmbeddingError::configuration(
                "Max length must be greater than 0",
            ));
        }

        if self.pad_id < 0 {
            return Err(EmbeddingError::configuration("Pad id cannot be negative"));
        }

        validate_batch_size(self.max_batch_size)
    }
}

fn validate_batch_size(batch_size: usize) -> Result<(), EmbeddingError> {
    if batch_size == 0 {
        return Err(EmbeddingError::configuration(
            "Batch size must be greater than 0",
        ));
    }

    if batch_size > 1024 {
        return Err(EmbeddingError::configuration(format!(
            "Batch size is too large: {}. Maximum is 1024",
            batch_size
        )));
    }

    Ok(())
}
