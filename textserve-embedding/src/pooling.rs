//! Masked mean pooling and L2 normalization of encoder hidden states.

use crate::error::RequestError;
use crate::model::RawModelOutput;
use ndarray::{Array1, Array2, ArrayView2, ArrayView3, Axis};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PoolingError {
    #[error("hidden states {hidden:?} do not match attention mask {mask:?}")]
    ShapeMismatch {
        hidden: (usize, usize, usize),
        mask: (usize, usize),
    },

    #[error("attention mask row {row} has no active positions")]
    EmptyMask { row: usize },
}

/// Average each row's hidden vectors over the positions where the mask is 1.
///
/// Padding positions are excluded from both the sum and the divisor, so the
/// result for a row does not depend on how much padding it carries.
pub fn masked_mean_pool(
    hidden: ArrayView3<f32>,
    mask: ArrayView2<i64>,
) -> Result<Array2<f32>, PoolingError> {
    let (rows, seq, width) = hidden.dim();
    if mask.dim() != (rows, seq) {
        return Err(PoolingError::ShapeMismatch {
            hidden: hidden.dim(),
            mask: mask.dim(),
        });
    }

    let mut pooled = Array2::<f32>::zeros((rows, width));

    for (row, (states, row_mask)) in hidden
        .outer_iter()
        .zip(mask.outer_iter())
        .enumerate()
    {
        let mut sum = pooled.row_mut(row);
        let mut count = 0usize;

        for (position, &m) in row_mask.iter().enumerate() {
            if m == 1 {
                sum += &states.row(position);
                count += 1;
            }
        }

        if count == 0 {
            return Err(PoolingError::EmptyMask { row });
        }

        sum /= count as f32;
    }

    Ok(pooled)
}

/// Scale a vector to unit Euclidean length.
///
/// A zero or non-finite norm cannot be normalized and is reported rather than
/// replaced with an arbitrary vector.
pub fn l2_normalize(vector: Array1<f32>) -> Result<Array1<f32>, RequestError> {
    let norm = vector.dot(&vector).sqrt();

    if norm == 0.0 || !norm.is_finite() {
        return Err(RequestError::degenerate(format!(
            "pooled vector has norm {} and cannot be normalized",
            norm
        )));
    }

    Ok(vector / norm)
}

/// Turns raw model output into one normalized f32 embedding per batch row
#[derive(Debug, Clone, Default)]
pub struct Postprocessor;

impl Postprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Returns one entry per batch row, in row order. A row that cannot be
    /// normalized fails on its own; a shape problem fails the whole batch.
    pub fn process(
        &self,
        output: RawModelOutput,
        attention_mask: &Array2<i64>,
    ) -> Result<Vec<Result<Array1<f32>, RequestError>>, PoolingError> {
        let hidden = output.last_hidden_state.into_full();
        let pooled = masked_mean_pool(hidden.view(), attention_mask.view())?;

        Ok(pooled
            .axis_iter(Axis(0))
            .map(|row| l2_normalize(row.to_owned()))
            .collect())
    }
}
