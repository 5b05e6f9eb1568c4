use crate::error::LoaderError;
use crate::retry::download_with_retry;
use crate::types::RetryConfig;
use hf_hub::api::tokio::ApiBuilder;
use hf_hub::Cache;
use std::path::PathBuf;
use tracing::{debug, info};

/// Looks a file up in the local HuggingFace hub cache without touching the network
pub fn cached_file(repo: &str, filename: &str) -> Option<PathBuf> {
    Cache::default().model(repo.to_string()).get(filename)
}

/// Resolves a file in a HuggingFace repository to a local path.
///
/// The hub cache is consulted first. In offline mode a cache miss is an error;
/// otherwise the file is downloaded with retry. The returned flag is true when
/// the file was served from the cache.
pub async fn resolve_huggingface_file(
    repo: &str,
    filename: &str,
    offline: bool,
    retry_config: &RetryConfig,
) -> Result<(PathBuf, bool), LoaderError> {
    if let Some(path) = cached_file(repo, filename) {
        debug!("Found {} for {} in hub cache: {}", filename, repo, path.display());
        return Ok((path, true));
    }

    if offline {
        return Err(LoaderError::NotFound(format!(
            "'{}' from '{}' is not in the local hub cache and offline mode is enabled",
            filename, repo
        )));
    }

    info!("Downloading {} from HuggingFace repository {}", filename, repo);

    let api = ApiBuilder::new().with_progress(false).build()?;
    let repo_api = api.model(repo.to_string());
    let path = download_with_retry(&repo_api, filename, repo, retry_config).await?;

    info!("Downloaded {} to {}", filename, path.display());
    Ok((path, false))
}
