//! Named tensors and the request/response envelopes exchanged with the
//! hosting runtime.

use crate::error::RequestError;
use ndarray::{Array1, ArrayD, IxDyn, ShapeError};

/// Payload of a named tensor
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    Int64(ArrayD<i64>),
    Float32(ArrayD<f32>),
    /// Raw byte strings, e.g. UTF-8 encoded text
    Bytes(ArrayD<Vec<u8>>),
}

impl TensorData {
    pub fn dtype(&self) -> &'static str {
        match self {
            TensorData::Int64(_) => "int64",
            TensorData::Float32(_) => "float32",
            TensorData::Bytes(_) => "bytes",
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            TensorData::Int64(a) => a.shape(),
            TensorData::Float32(a) => a.shape(),
            TensorData::Bytes(a) => a.shape(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InferenceTensor {
    name: String,
    data: TensorData,
}

impl InferenceTensor {
    pub fn new(name: impl Into<String>, data: TensorData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn int64(name: impl Into<String>, array: ArrayD<i64>) -> Self {
        Self::new(name, TensorData::Int64(array))
    }

    pub fn float32(name: impl Into<String>, array: ArrayD<f32>) -> Self {
        Self::new(name, TensorData::Float32(array))
    }

    /// Build an int64 tensor from a flat buffer in row-major order
    pub fn int64_from_vec(
        name: impl Into<String>,
        shape: &[usize],
        values: Vec<i64>,
    ) -> Result<Self, ShapeError> {
        Ok(Self::int64(name, ArrayD::from_shape_vec(IxDyn(shape), values)?))
    }

    /// Build a one-dimensional string tensor holding UTF-8 encoded texts
    pub fn text<S: AsRef<str>>(name: impl Into<String>, texts: &[S]) -> Self {
        Self::bytes(
            name,
            texts.iter().map(|t| t.as_ref().as_bytes().to_vec()).collect(),
        )
    }

    /// Build a one-dimensional string tensor from raw, undecoded byte strings
    pub fn bytes(name: impl Into<String>, elements: Vec<Vec<u8>>) -> Self {
        Self::new(name, TensorData::Bytes(Array1::from(elements).into_dyn()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &TensorData {
        &self.data
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn as_int64(&self) -> Result<&ArrayD<i64>, RequestError> {
        match &self.data {
            TensorData::Int64(a) => Ok(a),
            other => Err(self.dtype_error("int64", other)),
        }
    }

    pub fn as_float32(&self) -> Result<&ArrayD<f32>, RequestError> {
        match &self.data {
            TensorData::Float32(a) => Ok(a),
            other => Err(self.dtype_error("float32", other)),
        }
    }

    pub fn as_bytes(&self) -> Result<&ArrayD<Vec<u8>>, RequestError> {
        match &self.data {
            TensorData::Bytes(a) => Ok(a),
            other => Err(self.dtype_error("bytes", other)),
        }
    }

    fn dtype_error(&self, expected: &str, actual: &TensorData) -> RequestError {
        RequestError::input(format!(
            "input tensor '{}' has dtype {}, expected {}",
            self.name,
            actual.dtype(),
            expected
        ))
    }
}

/// One client request: an ordered set of named input tensors
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InferenceRequest {
    tensors: Vec<InferenceTensor>,
}

impl InferenceRequest {
    pub fn new(tensors: Vec<InferenceTensor>) -> Self {
        Self { tensors }
    }

    pub fn with_tensor(mut self, tensor: InferenceTensor) -> Self {
        self.tensors.push(tensor);
        self
    }

    pub fn tensors(&self) -> &[InferenceTensor] {
        &self.tensors
    }

    /// Look up an input by name. The first tensor with the name wins.
    pub fn tensor_by_name(&self, name: &str) -> Result<&InferenceTensor, RequestError> {
        self.tensors
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| {
                RequestError::input(format!("input tensor '{}' not found in request", name))
            })
    }
}

/// Exactly one of these is produced per request slot
#[derive(Debug, Clone, PartialEq)]
pub enum InferenceResponse {
    Success {
        outputs: Vec<InferenceTensor>,
    },
    Failure {
        error: RequestError,
        /// Correctly shaped stand-in output, for callers that rely on output shapes
        placeholder: Option<InferenceTensor>,
    },
}

impl InferenceResponse {
    pub fn success(output: InferenceTensor) -> Self {
        Self::Success {
            outputs: vec![output],
        }
    }

    pub fn failure(error: RequestError) -> Self {
        Self::Failure {
            error,
            placeholder: None,
        }
    }

    pub fn failure_with_placeholder(error: RequestError, placeholder: InferenceTensor) -> Self {
        Self::Failure {
            error,
            placeholder: Some(placeholder),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, InferenceResponse::Success { .. })
    }

    pub fn error(&self) -> Option<&RequestError> {
        match self {
            InferenceResponse::Success { .. } => None,
            InferenceResponse::Failure { error, .. } => Some(error),
        }
    }

    /// Named output of the response, including a failure's placeholder
    pub fn output(&self, name: &str) -> Option<&InferenceTensor> {
        match self {
            InferenceResponse::Success { outputs } => outputs.iter().find(|t| t.name == name),
            InferenceResponse::Failure { placeholder, .. } => {
                placeholder.as_ref().filter(|t| t.name == name)
            }
        }
    }
}
