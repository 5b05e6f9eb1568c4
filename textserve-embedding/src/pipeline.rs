//! The two request pipelines.
//!
//! Both take the whole list of requests of one call and return exactly one
//! response per request, in the same order. Nothing escapes as an error: every
//! problem ends up in the response of the slot it belongs to.

use crate::batch::{BatchAssembler, ValidatedEntry};
use crate::dispatch::ResponseSlots;
use crate::error::{EmbeddingResult, RequestError};
use crate::model::{EncoderModel, ModelInvoker};
use crate::pooling::Postprocessor;
use crate::tensor::{InferenceRequest, InferenceResponse};
use crate::tokenize::{HfVocabulary, TokenizerAdapter, Vocabulary};
use crate::types::{EmbeddingConfig, TokenizerConfig};
use crate::validate::{EmbeddingInputValidator, RequestValidator};
use ndarray::Array1;
use textserve_loader::{ExecutionTarget, InstanceConfig};
use tracing::{debug, info, warn};
use ulid::Ulid;

pub const EMBEDDING_PIPELINE_NAME: &str = "embedding_model";
pub const TOKENIZATION_PIPELINE_NAME: &str = "text_tokenize";

/// Anything that turns a list of requests into one response per request
pub trait BatchExecutor: Send + Sync {
    fn name(&self) -> &str;

    /// Largest number of requests one `execute` call should be given
    fn max_batch_size(&self) -> usize;

    fn execute(&self, requests: &[InferenceRequest]) -> Vec<InferenceResponse>;
}

/// Validate, batch, embed, pool and dispatch.
///
/// Invalid requests fail on their own. Once the valid requests are batched,
/// a failure of the forward pass fails every one of them.
pub struct EmbeddingPipeline<M: EncoderModel> {
    name: String,
    config: EmbeddingConfig,
    validator: EmbeddingInputValidator,
    assembler: BatchAssembler,
    invoker: ModelInvoker<M>,
    postprocessor: Postprocessor,
}

impl<M: EncoderModel> EmbeddingPipeline<M> {
    pub fn new(model: M, target: ExecutionTarget, config: EmbeddingConfig) -> EmbeddingResult<Self> {
        config.validate()?;

        info!(
            "Embedding pipeline ready on {:?} at {:?} precision (sequence length {})",
            target.device, target.precision, config.sequence_length
        );

        Ok(Self {
            name: EMBEDDING_PIPELINE_NAME.to_string(),
            validator: EmbeddingInputValidator::new(&config),
            assembler: BatchAssembler::new(config.sequence_length),
            invoker: ModelInvoker::new(model, target, config.embedding_dimension),
            postprocessor: Postprocessor::new(),
            config,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn config(&self) -> &EmbeddingConfig {
        &self.config
    }

    pub fn target(&self) -> ExecutionTarget {
        self.invoker.target()
    }

    /// Runs the model once over the valid entries. Any error is batch-fatal.
    fn embed_batch(
        &self,
        entries: Vec<ValidatedEntry>,
    ) -> EmbeddingResult<Vec<Result<Array1<f32>, RequestError>>> {
        let batch = self.assembler.assemble(entries)?;
        let output = self.invoker.invoke(&batch)?;
        Ok(self.postprocessor.process(output, batch.attention_mask())?)
    }
}

impl<M: EncoderModel> BatchExecutor for EmbeddingPipeline<M> {
    fn name(&self) -> &str {
        &self.name
    }

    fn max_batch_size(&self) -> usize {
        self.config.max_batch_size
    }

    fn execute(&self, requests: &[InferenceRequest]) -> Vec<InferenceResponse> {
        let batch_id = Ulid::new();
        info!(
            "{}.execute received {} requests (batch {})",
            self.name,
            requests.len(),
            batch_id
        );

        let mut slots = ResponseSlots::new(requests.len());
        let mut entries = Vec::with_capacity(requests.len());

        for (slot, request) in requests.iter().enumerate() {
            match self.validator.validate(slot, request) {
                Ok(entry) => entries.push(entry),
                Err(error) => {
                    debug!("Batch {} slot {}: {}", batch_id, slot, error);
                    slots.fill(slot, InferenceResponse::failure(error));
                }
            }
        }

        if entries.is_empty() {
            debug!("Batch {}: no valid requests, skipping the model", batch_id);
            let responses = slots.into_responses();
            log_summary(batch_id, &responses);
            return responses;
        }

        let mapping: Vec<usize> = entries.iter().map(|entry| entry.slot).collect();

        match self.embed_batch(entries) {
            Ok(embeddings) => slots.fill_embeddings(&mapping, embeddings),
            Err(error) => {
                warn!(
                    "Batch {}: forward pass over {} requests failed: {}",
                    batch_id,
                    mapping.len(),
                    error
                );
                slots.fail_batch(&mapping, &error);
            }
        }

        let responses = slots.into_responses();
        log_summary(batch_id, &responses);
        responses
    }
}

/// Tokenize each request's text into a fixed-length id tensor.
///
/// Every failed response carries a zeroed `(1, max_length)` placeholder.
pub struct TokenizationPipeline<V: Vocabulary> {
    name: String,
    adapter: TokenizerAdapter<V>,
}

impl<V: Vocabulary> TokenizationPipeline<V> {
    pub fn new(vocabulary: V, config: TokenizerConfig) -> EmbeddingResult<Self> {
        Ok(Self {
            name: TOKENIZATION_PIPELINE_NAME.to_string(),
            adapter: TokenizerAdapter::new(vocabulary, config)?,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn adapter(&self) -> &TokenizerAdapter<V> {
        &self.adapter
    }
}

impl TokenizationPipeline<HfVocabulary> {
    /// Resolve and load the instance's vocabulary
    pub async fn load(instance: &InstanceConfig, config: TokenizerConfig) -> EmbeddingResult<Self> {
        instance.validate()?;
        let vocabulary = HfVocabulary::load(instance).await?;
        Self::new(vocabulary, config)
    }
}

impl<V: Vocabulary> BatchExecutor for TokenizationPipeline<V> {
    fn name(&self) -> &str {
        &self.name
    }

    fn max_batch_size(&self) -> usize {
        self.adapter.config().max_batch_size
    }

    fn execute(&self, requests: &[InferenceRequest]) -> Vec<InferenceResponse> {
        let batch_id = Ulid::new();
        info!(
            "{}.execute received {} requests (batch {})",
            self.name,
            requests.len(),
            batch_id
        );

        let mut slots = ResponseSlots::new(requests.len());

        for (slot, request) in requests.iter().enumerate() {
            let response = match self.adapter.tokenize_request(slot, request) {
                Ok(ids) => InferenceResponse::success(ids),
                Err(error) => {
                    debug!("Batch {} slot {}: {}", batch_id, slot, error);
                    InferenceResponse::failure_with_placeholder(error, self.adapter.placeholder())
                }
            };
            slots.fill(slot, response);
        }

        let responses = slots.into_responses();
        log_summary(batch_id, &responses);
        responses
    }
}

fn log_summary(batch_id: Ulid, responses: &[InferenceResponse]) {
    let succeeded = responses.iter().filter(|r| r.is_success()).count();
    debug!(
        "Batch {} complete: {} succeeded, {} failed",
        batch_id,
        succeeded,
        responses.len() - succeeded
    );
}
