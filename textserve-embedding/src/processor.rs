use crate::pipeline::BatchExecutor;
use crate::tensor::{InferenceRequest, InferenceResponse};
use std::sync::Arc;
use tracing::debug;

/// Feeds an arbitrarily long list of requests to an executor in chunks
pub struct BatchProcessor<E: BatchExecutor> {
    executor: Arc<E>,
    batch_size: usize,
}

impl<E: BatchExecutor> BatchProcessor<E> {
    /// Create a new batch processor with the given executor and batch size
    pub fn new(executor: Arc<E>, batch_size: usize) -> Self {
        Self {
            executor,
            batch_size: batch_size.max(1),
        }
    }

    /// Create a processor using the executor's own batch size limit
    pub fn with_default_batch_size(executor: Arc<E>) -> Self {
        let batch_size = executor.max_batch_size();
        Self::new(executor, batch_size)
    }

    /// Run every request and return the responses in request order.
    ///
    /// Each chunk is a separate `execute` call, so a batch-fatal failure in one
    /// chunk leaves the other chunks untouched.
    pub fn process_batch(&self, requests: &[InferenceRequest]) -> Vec<InferenceResponse> {
        let mut responses = Vec::with_capacity(requests.len());

        for (index, chunk) in requests.chunks(self.batch_size).enumerate() {
            debug!(
                "Processing chunk {} of {} requests with {}",
                index,
                chunk.len(),
                self.executor.name()
            );
            responses.extend(self.executor.execute(chunk));
        }

        responses
    }

    pub fn executor(&self) -> &Arc<E> {
        &self.executor
    }

    /// Get the configured batch size
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Set a new batch size for processing; zero is raised to one
    pub fn set_batch_size(&mut self, batch_size: usize) {
        self.batch_size = batch_size.max(1);
    }
}
