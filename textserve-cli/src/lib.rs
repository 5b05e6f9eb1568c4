pub mod jsonl_writer;
pub mod tokenize;

pub use jsonl_writer::{JsonlError, JsonlWriter, TokenizationRecord};
pub use tokenize::{run_tokenize, validate_tokenize_args, TokenizeArgs, TokenizeSummary};

use thiserror::Error;

/// Failures the binary maps to dedicated exit codes
#[derive(Error, Debug)]
pub enum CliError {
    /// Bad arguments or input files
    #[error("{0}")]
    Validation(String),

    /// The vocabulary could not be resolved or loaded
    #[error("{0}")]
    Loading(String),
}

impl CliError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn loading(message: impl Into<String>) -> Self {
        Self::Loading(message.into())
    }
}

/// 2 for validation errors, 3 for loading errors, 1 for anything else
pub fn exit_code(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<CliError>() {
        Some(CliError::Validation(_)) => 2,
        Some(CliError::Loading(_)) => 3,
        None => 1,
    }
}
