//! Per-request input extraction and checking.
//!
//! A validator looks at one request at a time and either produces the typed
//! input the rest of the pipeline needs or a [`RequestError`] for that slot
//! alone. Nothing a validator does can affect a sibling request.

use crate::batch::ValidatedEntry;
use crate::error::RequestError;
use crate::tensor::InferenceRequest;
use crate::types::{EmbeddingConfig, INPUT_TEXT};
use ndarray::{Array1, ArrayD};

/// Core validation trait that all request validators implement
pub trait RequestValidator {
    type Output;

    fn validate(&self, slot: usize, request: &InferenceRequest) -> Result<Self::Output, RequestError>;
}

/// Extracts `input_ids` and `attention_mask` from an embedding request.
///
/// Both tensors must be int64 with shape `(1, L)` or `(L,)` for the configured
/// sequence length L. Ids must be non-negative and the mask binary with at
/// least one active position.
#[derive(Debug, Clone)]
pub struct EmbeddingInputValidator {
    input_ids_name: String,
    attention_mask_name: String,
    sequence_length: usize,
}

impl EmbeddingInputValidator {
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            input_ids_name: config.input_ids_name.clone(),
            attention_mask_name: config.attention_mask_name.clone(),
            sequence_length: config.sequence_length,
        }
    }

    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    fn extract_row(
        &self,
        request: &InferenceRequest,
        name: &str,
    ) -> Result<Array1<i64>, RequestError> {
        let array = request.tensor_by_name(name)?.as_int64()?;
        to_row(name, array, self.sequence_length)
    }
}

impl RequestValidator for EmbeddingInputValidator {
    type Output = ValidatedEntry;

    fn validate(&self, slot: usize, request: &InferenceRequest) -> Result<ValidatedEntry, RequestError> {
        let ids_shape = request.tensor_by_name(&self.input_ids_name)?.shape();
        let mask_shape = request.tensor_by_name(&self.attention_mask_name)?.shape();
        if ids_shape != mask_shape {
            return Err(RequestError::input(format!(
                "'{}' has shape {:?} but '{}' has shape {:?}",
                self.input_ids_name, ids_shape, self.attention_mask_name, mask_shape
            )));
        }

        let input_ids = self.extract_row(request, &self.input_ids_name)?;
        let attention_mask = self.extract_row(request, &self.attention_mask_name)?;

        if let Some(position) = input_ids.iter().position(|&id| id < 0) {
            return Err(RequestError::input(format!(
                "'{}' contains negative token id {} at position {}",
                self.input_ids_name, input_ids[position], position
            )));
        }

        if let Some(position) = attention_mask.iter().position(|&m| m != 0 && m != 1) {
            return Err(RequestError::input(format!(
                "'{}' must be binary, found {} at position {}",
                self.attention_mask_name, attention_mask[position], position
            )));
        }

        if attention_mask.iter().all(|&m| m == 0) {
            return Err(RequestError::input(format!(
                "'{}' has no active positions",
                self.attention_mask_name
            )));
        }

        Ok(ValidatedEntry {
            slot,
            input_ids,
            attention_mask,
        })
    }
}

/// Flatten a `(1, L)` or `(L,)` tensor into one row of length L
fn to_row(name: &str, array: &ArrayD<i64>, sequence_length: usize) -> Result<Array1<i64>, RequestError> {
    let shape_ok = match array.shape() {
        [len] => *len == sequence_length,
        [1, len] => *len == sequence_length,
        _ => false,
    };

    if !shape_ok {
        return Err(RequestError::input(format!(
            "input tensor '{}' has shape {:?}, expected [1, {}]",
            name,
            array.shape(),
            sequence_length
        )));
    }

    Ok(array.iter().copied().collect())
}

/// Extracts the texts of a tokenization request's `INPUT_TEXT` tensor.
///
/// Every element of the flattened string tensor must be valid UTF-8 and there
/// must be at least one.
#[derive(Debug, Clone, Default)]
pub struct TextInputValidator;

impl RequestValidator for TextInputValidator {
    type Output = Vec<String>;

    fn validate(&self, _slot: usize, request: &InferenceRequest) -> Result<Vec<String>, RequestError> {
        let elements = request.tensor_by_name(INPUT_TEXT)?.as_bytes()?;

        if elements.is_empty() {
            return Err(RequestError::input(format!(
                "input tensor '{}' contains no text",
                INPUT_TEXT
            )));
        }

        elements
            .iter()
            .enumerate()
            .map(|(i, bytes)| {
                String::from_utf8(bytes.clone()).map_err(|e| {
                    RequestError::input(format!(
                        "element {} of '{}' is not valid UTF-8: {}",
                        i, INPUT_TEXT, e
                    ))
                })
            })
            .collect()
    }
}
