use crate::error::LoaderError;
use crate::types::RetryConfig;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

const RETRIABLE_PATTERNS: &[&str] = &[
    "500",
    "internal server error",
    "502",
    "bad gateway",
    "503",
    "service unavailable",
    "504",
    "gateway timeout",
    "429",
    "too many requests",
    "connection",
    "timeout",
    "network",
];

const FATAL_PATTERNS: &[&str] = &[
    "404",
    "not found",
    "403",
    "forbidden",
    "401",
    "unauthorized",
];

/// Downloads an artifact file from the hub, retrying transient failures with
/// exponential backoff
pub async fn download_with_retry(
    repo_api: &hf_hub::api::tokio::ApiRepo,
    filename: &str,
    repo: &str,
    retry_config: &RetryConfig,
) -> Result<PathBuf, LoaderError> {
    let mut attempt = 0;
    let mut delay = retry_config.initial_delay_ms;

    loop {
        let error = match repo_api.get(filename).await {
            Ok(path) => {
                if attempt > 0 {
                    info!("Downloaded {} from {} after {} retries", filename, repo, attempt);
                }
                return Ok(path);
            }
            Err(e) => e,
        };

        if attempt >= retry_config.max_retries || !is_retriable_error(&error) {
            return Err(LoaderError::Download(format_download_error(
                filename, repo, &error, attempt,
            )));
        }

        attempt += 1;
        warn!(
            "Download attempt {} failed for '{}': {}. Retrying in {}ms...",
            attempt, filename, error, delay
        );
        tokio::time::sleep(Duration::from_millis(delay)).await;
        delay = next_delay(delay, retry_config);
    }
}

/// Next backoff delay in milliseconds, capped at `max_delay_ms`
pub fn next_delay(delay_ms: u64, retry_config: &RetryConfig) -> u64 {
    (((delay_ms as f64) * retry_config.backoff_multiplier) as u64).min(retry_config.max_delay_ms)
}

/// Classifies a hub error by its message. Server-side and network failures are
/// retriable, client errors are not, and anything unrecognised is retried.
pub fn is_retriable_error(error: &dyn std::error::Error) -> bool {
    let error_msg = error.to_string().to_lowercase();

    if RETRIABLE_PATTERNS.iter().any(|p| error_msg.contains(p)) {
        return true;
    }

    !FATAL_PATTERNS.iter().any(|p| error_msg.contains(p))
}

/// Formats a download failure with guidance matching the kind of failure
pub fn format_download_error(
    filename: &str,
    repo: &str,
    error: &dyn std::error::Error,
    retries_attempted: u32,
) -> String {
    let error_msg = error.to_string().to_lowercase();

    let guidance = if error_msg.contains("404") || error_msg.contains("not found") {
        "📁 File not found. Verify the filename exists in the repository at https://huggingface.co/"
    } else if error_msg.contains("403") || error_msg.contains("forbidden") {
        "🔒 Access forbidden. The repository may be private or gated."
    } else if error_msg.contains("429") || error_msg.contains("too many requests") {
        "⏱️ Rate limited by HuggingFace. Wait a few minutes and try again."
    } else if ["500", "502", "503", "504"].iter().any(|c| error_msg.contains(c)) {
        "🏥 Server error on HuggingFace. Try again in a few minutes."
    } else {
        "🌐 Network error. Check your internet connection and try again."
    };

    format!(
        "Failed to download '{}' from repository '{}' after {} retries: {}\n{}\n💡 Pre-populate the hub cache and run offline to avoid downloads at startup",
        filename, repo, retries_attempted, error, guidance
    )
}
