use crate::error::RequestError;
use crate::tensor::{InferenceResponse, InferenceTensor};
use crate::types::EMBEDDING;
use ndarray::{Array1, Axis};
use std::fmt::Display;
use tracing::error;

/// One response slot per incoming request, each written exactly once.
///
/// The first write to a slot wins; later writes are refused and logged.
/// Slots still empty when the responses are taken out are filled with an
/// error, so the returned list always has one response per request.
#[derive(Debug)]
pub struct ResponseSlots {
    slots: Vec<Option<InferenceResponse>>,
}

impl ResponseSlots {
    pub fn new(len: usize) -> Self {
        Self {
            slots: vec![None; len],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns false if the slot does not exist or was already written
    pub fn fill(&mut self, slot: usize, response: InferenceResponse) -> bool {
        match self.slots.get_mut(slot) {
            Some(entry @ None) => {
                *entry = Some(response);
                true
            }
            Some(Some(_)) => {
                error!("Response slot {} written twice; keeping the first response", slot);
                false
            }
            None => {
                error!("Response slot {} out of range for {} requests", slot, self.slots.len());
                false
            }
        }
    }

    pub fn is_filled(&self, slot: usize) -> bool {
        matches!(self.slots.get(slot), Some(Some(_)))
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Place per-row embeddings using the batch row -> slot mapping
    pub fn fill_embeddings(
        &mut self,
        mapping: &[usize],
        embeddings: Vec<Result<Array1<f32>, RequestError>>,
    ) {
        if mapping.len() != embeddings.len() {
            error!(
                "Batch mapping has {} rows but {} embeddings were produced",
                mapping.len(),
                embeddings.len()
            );
        }

        for (&slot, embedding) in mapping.iter().zip(embeddings) {
            let response = match embedding {
                Ok(vector) => InferenceResponse::success(InferenceTensor::float32(
                    EMBEDDING,
                    vector.insert_axis(Axis(0)).into_dyn(),
                )),
                Err(error) => InferenceResponse::failure(error),
            };
            self.fill(slot, response);
        }
    }

    /// Fail every slot of a batch with one uniform message naming the cause
    pub fn fail_batch(&mut self, mapping: &[usize], cause: &dyn Display) {
        let error = RequestError::batch_execution(format!(
            "error embedding the batch of {} requests; check your input and/or try again. {}",
            mapping.len(),
            cause
        ));

        for &slot in mapping {
            self.fill(slot, InferenceResponse::failure(error.clone()));
        }
    }

    pub fn into_responses(self) -> Vec<InferenceResponse> {
        self.slots
            .into_iter()
            .enumerate()
            .map(|(slot, response)| {
                response.unwrap_or_else(|| {
                    error!("No response was produced for slot {}", slot);
                    InferenceResponse::failure(RequestError::batch_execution(
                        "no response was produced for this request",
                    ))
                })
            })
            .collect()
    }
}
