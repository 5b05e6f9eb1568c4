//! Fixed-length tokenization of raw text.

use crate::error::{EmbeddingError, EmbeddingResult, RequestError};
use crate::tensor::{InferenceRequest, InferenceTensor};
use crate::types::{TokenizerConfig, TOKENIZED_IDS};
use crate::validate::{RequestValidator, TextInputValidator};
use ndarray::{Array1, Array2};
use std::path::Path;
use std::sync::Arc;
use textserve_loader::{ArtifactLoader, InstanceConfig};
use tokenizers::Tokenizer;
use tracing::{debug, info};

/// Number of characters of an offending text quoted in error messages
const TEXT_PREVIEW_CHARS: usize = 64;

/// Maps text to token ids without padding or truncation
pub trait Vocabulary: Send + Sync {
    fn encode(&self, text: &str, add_special_tokens: bool) -> EmbeddingResult<Vec<u32>>;
}

impl<V: Vocabulary + ?Sized> Vocabulary for Arc<V> {
    fn encode(&self, text: &str, add_special_tokens: bool) -> EmbeddingResult<Vec<u32>> {
        (**self).encode(text, add_special_tokens)
    }
}

/// A HuggingFace `tokenizer.json` vocabulary
pub struct HfVocabulary {
    tokenizer: Tokenizer,
}

impl HfVocabulary {
    pub fn from_file<P: AsRef<Path>>(path: P) -> EmbeddingResult<Self> {
        let path = path.as_ref();
        let tokenizer = Tokenizer::from_file(path).map_err(|e| {
            EmbeddingError::vocabulary(format!(
                "Failed to load tokenizer from {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_tokenizer(tokenizer)
    }

    /// Padding and truncation are switched off so the natural token count is
    /// visible to the length check.
    pub fn from_tokenizer(mut tokenizer: Tokenizer) -> EmbeddingResult<Self> {
        tokenizer.with_padding(None);
        tokenizer
            .with_truncation(None)
            .map_err(|e| EmbeddingError::vocabulary(format!("Failed to disable truncation: {}", e)))?;
        Ok(Self { tokenizer })
    }

    /// Resolve the instance's vocabulary file and load it
    pub async fn load(config: &InstanceConfig) -> EmbeddingResult<Self> {
        let resolved = ArtifactLoader::from_config(config)
            .resolve_vocabulary(config)
            .await?;
        info!("Loading vocabulary from {}", resolved.path.display());
        Self::from_file(&resolved.path)
    }

    pub fn vocab_size(&self) -> usize {
        self.tokenizer.get_vocab_size(true)
    }
}

impl Vocabulary for HfVocabulary {
    fn encode(&self, text: &str, add_special_tokens: bool) -> EmbeddingResult<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(text, add_special_tokens)
            .map_err(|e| EmbeddingError::vocabulary(format!("Failed to encode text: {}", e)))?;
        Ok(encoding.get_ids().to_vec())
    }
}

/// Turns text into sequences of exactly `max_length` ids.
///
/// Short sequences are right-padded with `pad_id`. A text whose natural token
/// count exceeds `max_length` is rejected; it is never truncated.
pub struct TokenizerAdapter<V: Vocabulary> {
    vocabulary: V,
    config: TokenizerConfig,
    validator: TextInputValidator,
}

impl<V: Vocabulary> TokenizerAdapter<V> {
    pub fn new(vocabulary: V, config: TokenizerConfig) -> EmbeddingResult<Self> {
        config.validate()?;
        Ok(Self {
            vocabulary,
            config,
            validator: TextInputValidator,
        })
    }

    pub fn config(&self) -> &TokenizerConfig {
        &self.config
    }

    pub fn vocabulary(&self) -> &V {
        &self.vocabulary
    }

    pub fn max_length(&self) -> usize {
        self.config.max_length
    }

    pub fn tokenize(&self, text: &str) -> Result<Array1<i64>, RequestError> {
        let tokens = self
            .vocabulary
            .encode(text, self.config.add_special_tokens)
            .map_err(|e| RequestError::input(format!("failed to tokenize text: {}", e)))?;

        if tokens.len() > self.config.max_length {
            return Err(RequestError::validation(format!(
                "text {:?} has {} tokens which exceeds max of {}",
                preview(text),
                tokens.len(),
                self.config.max_length
            )));
        }

        let mut ids = Array1::from_elem(self.config.max_length, self.config.pad_id);
        for (slot, &token) in ids.iter_mut().zip(&tokens) {
            *slot = i64::from(token);
        }
        Ok(ids)
    }

    /// Tokenize every text of a request into an `(n, max_length)` tensor.
    /// One overlong text fails the whole request.
    pub fn tokenize_request(
        &self,
        slot: usize,
        request: &InferenceRequest,
    ) -> Result<InferenceTensor, RequestError> {
        let texts = self.validator.validate(slot, request)?;

        let mut ids = Array2::from_elem((texts.len(), self.config.max_length), self.config.pad_id);
        for (mut row, text) in ids.rows_mut().into_iter().zip(&texts) {
            row.assign(&self.tokenize(text)?);
        }

        debug!("Slot {}: tokenized {} texts", slot, texts.len());
        Ok(InferenceTensor::int64(TOKENIZED_IDS, ids.into_dyn()))
    }

    /// All-zero `(1, max_length)` stand-in sent with every failed response
    pub fn placeholder(&self) -> InferenceTensor {
        InferenceTensor::int64(
            TOKENIZED_IDS,
            Array2::<i64>::zeros((1, self.config.max_length)).into_dyn(),
        )
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() <= TEXT_PREVIEW_CHARS {
        text.to_string()
    } else {
        let head: String = text.chars().take(TEXT_PREVIEW_CHARS).collect();
        format!("{}...", head)
    }
}
