use ndarray::{stack, Array1, Array2, ArrayView1, Axis, ShapeError};

/// A request that passed validation, still tied to its original slot
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedEntry {
    /// 0-based position of the request in the incoming batch
    pub slot: usize,
    pub input_ids: Array1<i64>,
    pub attention_mask: Array1<i64>,
}

/// The valid requests of one call, concatenated along the batch dimension.
///
/// Row `i` of both tensors belongs to the request at `slots()[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    input_ids: Array2<i64>,
    attention_mask: Array2<i64>,
    slots: Vec<usize>,
}

impl Batch {
    pub fn input_ids(&self) -> &Array2<i64> {
        &self.input_ids
    }

    pub fn attention_mask(&self) -> &Array2<i64> {
        &self.attention_mask
    }

    /// Row -> original slot mapping
    pub fn slots(&self) -> &[usize] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn sequence_length(&self) -> usize {
        self.input_ids.ncols()
    }
}

/// Concatenates validated entries, in arrival order, into one [`Batch`]
#[derive(Debug, Clone)]
pub struct BatchAssembler {
    sequence_length: usize,
}

impl BatchAssembler {
    pub fn new(sequence_length: usize) -> Self {
        Self { sequence_length }
    }

    /// Fails only if an entry's length differs from the configured L, which the
    /// embedding validator already rules out.
    pub fn assemble(&self, entries: Vec<ValidatedEntry>) -> Result<Batch, ShapeError> {
        if entries.is_empty() {
            return Ok(Batch {
                input_ids: Array2::zeros((0, self.sequence_length)),
                attention_mask: Array2::zeros((0, self.sequence_length)),
                slots: Vec::new(),
            });
        }

        let ids: Vec<ArrayView1<i64>> = entries.iter().map(|e| e.input_ids.view()).collect();
        let masks: Vec<ArrayView1<i64>> = entries.iter().map(|e| e.attention_mask.view()).collect();

        let input_ids = stack(Axis(0), &ids)?;
        let attention_mask = stack(Axis(0), &masks)?;

        if input_ids.ncols() != self.sequence_length {
            return Err(ShapeError::from_kind(ndarray::ErrorKind::IncompatibleShape));
        }

        Ok(Batch {
            input_ids,
            attention_mask,
            slots: entries.iter().map(|e| e.slot).collect(),
        })
    }
}
