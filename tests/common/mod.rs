#![allow(dead_code)]

use half::f16;
use ndarray::{Array2, Array3};
use std::sync::Once;
use tempfile::TempDir;
use textserve_workspace::embedding::{
    EmbeddingConfig, EmbeddingError, EmbeddingPipeline, EmbeddingResult, EncoderModel,
    HiddenStates, InferenceRequest, InferenceResponse, InferenceTensor, RawModelOutput,
    Vocabulary, EMBED_ATTENTION_MASK, EMBEDDING, EMBED_INPUT_IDS, INPUT_TEXT,
};
use textserve_workspace::loader::ExecutionTarget;

/// Test utilities and common setup functions

pub const SEQ: usize = 8;

static INIT: Once = Once::new();

/// Initialize logging once for all tests
pub fn init_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing_subscriber::filter::LevelFilter::WARN)
            .with_test_writer()
            .try_init();
    });
}

pub const WORD_LEVEL_TOKENIZER: &str = r#"{
    "version": "1.0",
    "truncation": null,
    "padding": null,
    "added_tokens": [],
    "normalizer": null,
    "pre_tokenizer": { "type": "Whitespace" },
    "post_processor": null,
    "decoder": null,
    "model": {
        "type": "WordLevel",
        "vocab": { "[UNK]": 0, "a": 1, "photo": 2, "of": 3, "cat": 4, "dog": 5 },
        "unk_token": "[UNK]"
    }
}"#;

/// Hidden state at (row, position) is `[id, position + 1, 1]`, so every pooled
/// vector is non-zero and depends only on the unmasked ids.
pub struct PositionalModel;

impl EncoderModel for PositionalModel {
    fn forward(
        &self,
        input_ids: &Array2<i64>,
        _attention_mask: &Array2<i64>,
    ) -> Result<RawModelOutput, EmbeddingError> {
        Ok(RawModelOutput::new(HiddenStates::Full(positional_states(input_ids))))
    }
}

/// Same states as [`PositionalModel`], returned at half precision
pub struct HalfPositionalModel;

impl EncoderModel for HalfPositionalModel {
    fn forward(
        &self,
        input_ids: &Array2<i64>,
        _attention_mask: &Array2<i64>,
    ) -> Result<RawModelOutput, EmbeddingError> {
        Ok(RawModelOutput::new(HiddenStates::Half(
            positional_states(input_ids).mapv(f16::from_f32),
        )))
    }
}

fn positional_states(input_ids: &Array2<i64>) -> Array3<f32> {
    let (rows, seq) = input_ids.dim();
    Array3::from_shape_fn((rows, seq, 3), |(r, p, h)| match h {
        0 => input_ids[[r, p]] as f32,
        1 => (p + 1) as f32,
        _ => 1.0,
    })
}

/// Always fails the forward pass
pub struct FailingModel(pub &'static str);

impl EncoderModel for FailingModel {
    fn forward(&self, _: &Array2<i64>, _: &Array2<i64>) -> Result<RawModelOutput, EmbeddingError> {
        Err(EmbeddingError::model(self.0))
    }
}

/// One token per whitespace-separated word, no special tokens
pub struct WordVocabulary;

impl Vocabulary for WordVocabulary {
    fn encode(&self, text: &str, _add_special_tokens: bool) -> EmbeddingResult<Vec<u32>> {
        Ok(text.split_whitespace().map(|w| w.len() as u32).collect())
    }
}

pub fn embedding_config() -> EmbeddingConfig {
    EmbeddingConfig {
        sequence_length: SEQ,
        embedding_dimension: Some(3),
        ..Default::default()
    }
}

pub fn pipeline<M: EncoderModel>(model: M) -> EmbeddingPipeline<M> {
    match EmbeddingPipeline::new(model, ExecutionTarget::cpu(), embedding_config()) {
        Ok(pipeline) => pipeline,
        Err(e) => panic!("test pipeline config is invalid: {}", e),
    }
}

/// A `(1, len)` embedding request
pub fn embedding_request(ids: &[i64], mask: &[i64]) -> InferenceRequest {
    InferenceRequest::default()
        .with_tensor(row_tensor(EMBED_INPUT_IDS, ids))
        .with_tensor(row_tensor(EMBED_ATTENTION_MASK, mask))
}

/// A valid request whose first `active` positions are real tokens
pub fn valid_request(seed: i64, active: usize) -> InferenceRequest {
    let ids: Vec<i64> = (0..SEQ as i64).map(|p| seed + p).collect();
    let mask: Vec<i64> = (0..SEQ).map(|p| i64::from(p < active)).collect();
    embedding_request(&ids, &mask)
}

fn row_tensor(name: &str, values: &[i64]) -> InferenceTensor {
    let array = Array2::from_shape_vec((1, values.len()), values.to_vec())
        .unwrap_or_else(|e| panic!("bad test tensor: {}", e));
    InferenceTensor::int64(name, array.into_dyn())
}

pub fn text_request(text: &str) -> InferenceRequest {
    InferenceRequest::default().with_tensor(InferenceTensor::text(INPUT_TEXT, &[text]))
}

/// The `(1, D)` embedding of a successful response, flattened
pub fn embedding_of(response: &InferenceResponse) -> Option<Vec<f32>> {
    if !response.is_success() {
        return None;
    }
    let tensor = response.output(EMBEDDING)?;
    let array = tensor.as_float32().ok()?;
    Some(array.iter().copied().collect())
}

pub fn l2_norm(values: &[f32]) -> f32 {
    values.iter().map(|v| v * v).sum::<f32>().sqrt()
}

pub fn vocabulary_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {}", e));
    std::fs::write(dir.path().join("tokenizer.json"), WORD_LEVEL_TOKENIZER)
        .unwrap_or_else(|e| panic!("write tokenizer.json: {}", e));
    dir
}
