//! # textserve-embedding
//!
//! Batched inference serving for text embedding and tokenization. A call hands
//! over a list of independent requests and gets back exactly one response per
//! request, in the same order, however many of them fail.
//!
//! ## Features
//!
//! - Per-request validation: a malformed request fails alone
//! - One model forward pass per batch of valid requests
//! - Masked mean pooling with L2 normalization, always f32 output
//! - Fixed-length tokenization that rejects overlong text instead of truncating
//! - Chunked processing of long request lists
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ndarray::{Array2, Array3};
//! use textserve_embedding::{
//!     BatchExecutor, EmbeddingConfig, EmbeddingError, EmbeddingPipeline, EncoderModel,
//!     HiddenStates, InferenceRequest, InferenceTensor, RawModelOutput,
//! };
//! use textserve_loader::ExecutionTarget;
//!
//! struct MyEncoder;
//!
//! impl EncoderModel for MyEncoder {
//!     fn forward(
//!         &self,
//!         input_ids: &Array2<i64>,
//!         _attention_mask: &Array2<i64>,
//!     ) -> Result<RawModelOutput, EmbeddingError> {
//!         let (rows, seq) = input_ids.dim();
//!         Ok(RawModelOutput::new(HiddenStates::Full(Array3::ones((rows, seq, 1024)))))
//!     }
//! }
//!
//! # fn example() -> Result<(), EmbeddingError> {
//! let pipeline = EmbeddingPipeline::new(MyEncoder, ExecutionTarget::cpu(), EmbeddingConfig::default())?;
//!
//! let request = InferenceRequest::default()
//!     .with_tensor(InferenceTensor::int64("input_ids", Array2::<i64>::ones((1, 512)).into_dyn()))
//!     .with_tensor(InferenceTensor::int64("attention_mask", Array2::<i64>::ones((1, 512)).into_dyn()));
//!
//! let responses = pipeline.execute(&[request]);
//! assert_eq!(responses.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod pooling;
pub mod processor;
pub mod tensor;
pub mod tokenize;
pub mod types;
pub mod validate;

// Re-export public API
pub use batch::{Batch, BatchAssembler, ValidatedEntry};
pub use dispatch::ResponseSlots;
pub use error::{EmbeddingError, EmbeddingResult, RequestError};
pub use model::{EncoderModel, HiddenStates, ModelInvoker, RawModelOutput};
pub use pipeline::{BatchExecutor, EmbeddingPipeline, TokenizationPipeline};
pub use pooling::{l2_normalize, masked_mean_pool, PoolingError, Postprocessor};
pub use processor::BatchProcessor;
pub use tensor::{InferenceRequest, InferenceResponse, InferenceTensor, TensorData};
pub use tokenize::{HfVocabulary, TokenizerAdapter, Vocabulary};
pub use types::{
    EmbeddingConfig, TokenizerConfig, EMBED_ATTENTION_MASK, EMBEDDING, EMBED_INPUT_IDS, INPUT_TEXT,
    TOKENIZED_IDS,
};
