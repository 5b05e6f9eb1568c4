use crate::batch::Batch;
use crate::error::EmbeddingError;
use half::f16;
use ndarray::{Array2, Array3};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use textserve_loader::{ExecutionTarget, Precision};
use tracing::debug;

/// Last hidden states of a forward pass, shape (batch, L, H), at the precision
/// the model ran with
#[derive(Debug, Clone, PartialEq)]
pub enum HiddenStates {
    Half(Array3<f16>),
    Full(Array3<f32>),
}

impl HiddenStates {
    pub fn dim(&self) -> (usize, usize, usize) {
        match self {
            HiddenStates::Half(a) => a.dim(),
            HiddenStates::Full(a) => a.dim(),
        }
    }

    pub fn precision(&self) -> Precision {
        match self {
            HiddenStates::Half(_) => Precision::Half,
            HiddenStates::Full(_) => Precision::Full,
        }
    }

    /// Upcast to f32
    pub fn into_full(self) -> Array3<f32> {
        match self {
            HiddenStates::Half(a) => a.mapv(f16::to_f32),
            HiddenStates::Full(a) => a,
        }
    }
}

/// Raw output of one forward pass over a batch
#[derive(Debug, Clone, PartialEq)]
pub struct RawModelOutput {
    pub last_hidden_state: HiddenStates,
}

impl RawModelOutput {
    pub fn new(last_hidden_state: HiddenStates) -> Self {
        Self { last_hidden_state }
    }
}

/// A pretrained encoder, loaded once for a fixed device and precision.
///
/// Implementations must run in inference mode: no gradient tracking, no
/// dropout, and no mutation of weights. One call sees the whole batch.
pub trait EncoderModel: Send + Sync {
    fn forward(
        &self,
        input_ids: &Array2<i64>,
        attention_mask: &Array2<i64>,
    ) -> Result<RawModelOutput, EmbeddingError>;
}

impl<M: EncoderModel + ?Sized> EncoderModel for Arc<M> {
    fn forward(
        &self,
        input_ids: &Array2<i64>,
        attention_mask: &Array2<i64>,
    ) -> Result<RawModelOutput, EmbeddingError> {
        (**self).forward(input_ids, attention_mask)
    }
}

/// Runs a single forward pass per batch and checks what comes back.
///
/// Any failure here, including a panic inside the model, is reported as one
/// error for the whole batch.
pub struct ModelInvoker<M: EncoderModel> {
    model: M,
    target: ExecutionTarget,
    embedding_dimension: Option<usize>,
}

impl<M: EncoderModel> ModelInvoker<M> {
    pub fn new(model: M, target: ExecutionTarget, embedding_dimension: Option<usize>) -> Self {
        Self {
            model,
            target,
            embedding_dimension,
        }
    }

    pub fn target(&self) -> ExecutionTarget {
        self.target
    }

    pub fn invoke(&self, batch: &Batch) -> Result<RawModelOutput, EmbeddingError> {
        if batch.is_empty() {
            return Err(EmbeddingError::model("refusing to run the model on an empty batch"));
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.model.forward(batch.input_ids(), batch.attention_mask())
        }));

        let output = match result {
            Ok(output) => output?,
            Err(payload) => {
                return Err(EmbeddingError::model(format!(
                    "model panicked during forward pass: {}",
                    panic_message(payload.as_ref())
                )))
            }
        };

        self.check_output(batch, &output)?;

        if output.last_hidden_state.precision() != self.target.precision {
            debug!(
                "Model returned {:?} hidden states while configured for {:?}",
                output.last_hidden_state.precision(),
                self.target.precision
            );
        }

        Ok(output)
    }

    fn check_output(&self, batch: &Batch, output: &RawModelOutput) -> Result<(), EmbeddingError> {
        let (rows, seq, width) = output.last_hidden_state.dim();

        if rows != batch.len() || seq != batch.sequence_length() || width == 0 {
            return Err(EmbeddingError::model(format!(
                "model returned hidden states of shape ({}, {}, {}) for a batch of shape ({}, {})",
                rows,
                seq,
                width,
                batch.len(),
                batch.sequence_length()
            )));
        }

        match self.embedding_dimension {
            Some(expected) if expected != width => Err(EmbeddingError::DimensionMismatch {
                expected,
                actual: width,
            }),
            _ => Ok(()),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
