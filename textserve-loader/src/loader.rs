use crate::error::LoaderError;
use crate::huggingface::resolve_huggingface_file;
use crate::types::{ArtifactSource, InstanceConfig, ResolvedArtifact, RetryConfig};
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Default vocabulary file shipped alongside HuggingFace tokenizers
pub const TOKENIZER_FILENAME: &str = "tokenizer.json";

/// Resolves pretrained artifact identifiers to local files
#[derive(Debug, Clone)]
pub struct ArtifactLoader {
    offline: bool,
    retry_config: RetryConfig,
}

impl ArtifactLoader {
    /// Create a loader with an explicit network policy
    pub fn new(offline: bool, retry_config: RetryConfig) -> Self {
        Self {
            offline,
            retry_config,
        }
    }

    /// Create a loader following an instance configuration
    pub fn from_config(config: &InstanceConfig) -> Self {
        Self::new(config.offline, config.retry_config.clone())
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    /// Resolve the instance's vocabulary file
    pub async fn resolve_vocabulary(
        &self,
        config: &InstanceConfig,
    ) -> Result<ResolvedArtifact, LoaderError> {
        self.resolve(&config.vocabulary_identifier, TOKENIZER_FILENAME)
            .await
    }

    /// Resolve a source to a local file. `default_filename` is used when the
    /// source does not name a file explicitly.
    pub async fn resolve(
        &self,
        source: &ArtifactSource,
        default_filename: &str,
    ) -> Result<ResolvedArtifact, LoaderError> {
        let start_time = Instant::now();
        source.validate()?;

        let filename = source.filename().unwrap_or(default_filename).to_string();

        let (path, cache_hit) = match source {
            ArtifactSource::HuggingFace { repo, .. } => {
                resolve_huggingface_file(repo, &filename, self.offline, &self.retry_config)
                    .await?
            }
            ArtifactSource::Local { folder, .. } => {
                (Self::resolve_local_file(folder, &filename).await?, true)
            }
        };

        let resolve_time = start_time.elapsed();
        info!(
            "Resolved {} from {} in {:?} (cache hit: {})",
            filename, source, resolve_time, cache_hit
        );

        Ok(ResolvedArtifact {
            source: source.clone(),
            path,
            filename,
            resolve_time,
            cache_hit,
        })
    }

    async fn resolve_local_file(
        folder: &Path,
        filename: &str,
    ) -> Result<std::path::PathBuf, LoaderError> {
        let path = folder.join(filename);
        let metadata = tokio::fs::metadata(&path).await.map_err(|e| {
            LoaderError::NotFound(format!("{}: {}", path.display(), e))
        })?;

        if !metadata.is_file() {
            return Err(LoaderError::InvalidConfig(format!(
                "Path is not a file: {}",
                path.display()
            )));
        }

        Ok(path)
    }
}

impl Default for ArtifactLoader {
    fn default() -> Self {
        Self::new(true, RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_resolve_local_default_filename() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join(TOKENIZER_FILENAME), "{}").unwrap();

        let loader = ArtifactLoader::default();
        let source = ArtifactSource::Local {
            folder: temp_dir.path().to_path_buf(),
            filename: None,
        };

        let resolved = loader.resolve(&source, TOKENIZER_FILENAME).await.unwrap();
        assert_eq!(resolved.filename, TOKENIZER_FILENAME);
        assert_eq!(resolved.path, temp_dir.path().join(TOKENIZER_FILENAME));
        assert!(resolved.cache_hit);
    }

    #[tokio::test]
    async fn test_resolve_local_missing_default_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let loader = ArtifactLoader::default();
        let source = ArtifactSource::Local {
            folder: temp_dir.path().to_path_buf(),
            filename: None,
        };

        let result = loader.resolve(&source, TOKENIZER_FILENAME).await;
        assert!(matches!(result, Err(LoaderError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_resolve_directory_is_not_a_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(temp_dir.path().join("nested")).unwrap();

        let loader = ArtifactLoader::default();
        let source = ArtifactSource::Local {
            folder: temp_dir.path().to_path_buf(),
            filename: None,
        };

        let result = loader.resolve(&source, "nested").await;
        assert!(matches!(result, Err(LoaderError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_resolve_rejects_invalid_source() {
        let loader = ArtifactLoader::default();
        let source = ArtifactSource::Local {
            folder: PathBuf::from("/non/existent/path"),
            filename: None,
        };

        assert!(loader.resolve(&source, TOKENIZER_FILENAME).await.is_err());
    }

    #[test]
    fn test_loader_follows_instance_config() {
        let mut config = InstanceConfig::default();
        config.offline = false;
        assert!(!ArtifactLoader::from_config(&config).is_offline());
        assert!(ArtifactLoader::default().is_offline());
    }
}
