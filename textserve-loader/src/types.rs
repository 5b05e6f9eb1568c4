use crate::error::LoaderError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// A pretrained artifact file resolved to a local path
#[derive(Debug, Clone)]
pub struct ResolvedArtifact {
    /// The source the artifact was resolved from
    pub source: ArtifactSource,
    /// Local path of the resolved file
    pub path: PathBuf,
    /// The filename within the source
    pub filename: String,
    /// Time taken to resolve (and possibly download) the file
    pub resolve_time: Duration,
    /// Whether the file came from the local hub cache without a download
    pub cache_hit: bool,
}

/// Configuration for artifact download retry logic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay between retries in milliseconds
    pub initial_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000, // 1 second
            backoff_multiplier: 2.0,
            max_delay_ms: 30000, // 30 seconds
        }
    }
}

/// Represents different sources from which pretrained artifacts can be resolved
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ArtifactSource {
    /// Resolve from a HuggingFace repository
    HuggingFace {
        /// Repository name (e.g., "intfloat/e5-large-v2")
        repo: String,
        /// Optional specific filename to resolve
        filename: Option<String>,
    },
    /// Resolve from the local filesystem
    Local {
        /// Path to the folder containing the artifact
        folder: PathBuf,
        /// Optional specific filename to resolve
        filename: Option<String>,
    },
}

impl ArtifactSource {
    /// Interpret an identifier the way the CLI does: anything that contains a
    /// '/' and is not an existing path names a HuggingFace repository.
    pub fn parse(identifier: &str, filename: Option<String>) -> Self {
        if identifier.contains('/') && !Path::new(identifier).exists() {
            ArtifactSource::HuggingFace {
                repo: identifier.to_string(),
                filename,
            }
        } else {
            ArtifactSource::Local {
                folder: PathBuf::from(identifier),
                filename,
            }
        }
    }

    /// The explicitly requested filename, if any
    pub fn filename(&self) -> Option<&str> {
        match self {
            ArtifactSource::HuggingFace { filename, .. } | ArtifactSource::Local { filename, .. } => {
                filename.as_deref()
            }
        }
    }

    /// Validate that the artifact source configuration is valid
    pub fn validate(&self) -> Result<(), LoaderError> {
        if let Some(f) = self.filename() {
            if f.is_empty() {
                return Err(LoaderError::invalid_config("Filename cannot be empty"));
            }
        }

        match self {
            ArtifactSource::HuggingFace { repo, .. } => {
                if repo.is_empty() {
                    return Err(LoaderError::invalid_config(
                        "HuggingFace repo name cannot be empty",
                    ));
                }

                if !repo.contains('/') {
                    return Err(LoaderError::invalid_config(
                        "HuggingFace repo must be in format 'org/repo'",
                    ));
                }

                if repo
                    .chars()
                    .any(|c| !c.is_alphanumeric() && !"-_./".contains(c))
                {
                    return Err(LoaderError::invalid_config(
                        "Invalid characters in HuggingFace repo name",
                    ));
                }

                Ok(())
            }
            ArtifactSource::Local { folder, filename } => {
                if !folder.exists() {
                    return Err(LoaderError::NotFound(format!(
                        "Local folder does not exist: {}",
                        folder.display()
                    )));
                }

                if !folder.is_dir() {
                    return Err(LoaderError::InvalidConfig(format!(
                        "Path is not a directory: {}",
                        folder.display()
                    )));
                }

                if let Some(f) = filename {
                    let full_path = folder.join(f);
                    if !full_path.is_file() {
                        return Err(LoaderError::NotFound(format!(
                            "Artifact file does not exist: {}",
                            full_path.display()
                        )));
                    }
                }

                Ok(())
            }
        }
    }
}

impl std::fmt::Display for ArtifactSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactSource::HuggingFace { repo, .. } => write!(f, "hf://{}", repo),
            ArtifactSource::Local { folder, .. } => write!(f, "{}", folder.display()),
        }
    }
}

/// Requested kind of compute for an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComputeKind {
    /// Run on an accelerator at reduced precision when one is available
    Accelerated,
    /// Run on general-purpose compute at full precision
    GeneralPurpose,
}

impl ComputeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComputeKind::Accelerated => "accelerated",
            ComputeKind::GeneralPurpose => "general-purpose",
        }
    }
}

impl std::fmt::Display for ComputeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComputeKind {
    type Err = LoaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accelerated" | "gpu" | "kind_gpu" => Ok(ComputeKind::Accelerated),
            "general-purpose" | "general_purpose" | "cpu" | "kind_cpu" => {
                Ok(ComputeKind::GeneralPurpose)
            }
            other => Err(LoaderError::InvalidConfig(format!(
                "Unknown compute kind '{}', expected 'accelerated' or 'general-purpose'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Device {
    Cpu,
    Accelerator,
}

/// Numeric precision the model runs at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Precision {
    /// 16-bit floats
    Half,
    /// 32-bit floats
    Full,
}

/// Device and precision an instance runs its forward passes with.
///
/// Fixed once at construction; never derived from a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionTarget {
    pub device: Device,
    pub precision: Precision,
}

impl ExecutionTarget {
    /// Resolve the target for a requested compute kind. Asking for acceleration
    /// on a host without an accelerator falls back to full precision on the CPU,
    /// since reduced precision is not supported there.
    pub fn resolve(kind: ComputeKind, accelerator_available: bool) -> Self {
        match kind {
            ComputeKind::Accelerated if accelerator_available => Self {
                device: Device::Accelerator,
                precision: Precision::Half,
            },
            _ => Self::cpu(),
        }
    }

    pub fn cpu() -> Self {
        Self {
            device: Device::Cpu,
            precision: Precision::Full,
        }
    }
}

impl Default for ExecutionTarget {
    fn default() -> Self {
        Self::cpu()
    }
}

/// Initialization configuration of one serving instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Requested compute kind, resolved to an [`ExecutionTarget`] at startup
    pub compute_kind: ComputeKind,
    /// Where the pretrained model lives
    pub model_identifier: ArtifactSource,
    /// Where the tokenizer vocabulary lives
    pub vocabulary_identifier: ArtifactSource,
    /// Only use files already present locally; never download
    pub offline: bool,
    /// Retry policy for artifact downloads
    pub retry_config: RetryConfig,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            compute_kind: ComputeKind::Accelerated,
            model_identifier: ArtifactSource::HuggingFace {
                repo: "intfloat/e5-large-v2".to_string(),
                filename: None,
            },
            vocabulary_identifier: ArtifactSource::HuggingFace {
                repo: "intfloat/e5-large-v2".to_string(),
                filename: Some("tokenizer.json".to_string()),
            },
            offline: true,
            retry_config: RetryConfig::default(),
        }
    }
}

impl InstanceConfig {
    /// Validate the instance configuration
    pub fn validate(&self) -> Result<(), LoaderError> {
        self.model_identifier.validate()?;
        self.vocabulary_identifier.validate()?;

        if self.retry_config.backoff_multiplier < 1.0 {
            return Err(LoaderError::invalid_config(
                "Retry backoff multiplier must be at least 1.0",
            ));
        }

        Ok(())
    }

    /// Resolve the execution target given what the host offers
    pub fn execution_target(&self, accelerator_available: bool) -> ExecutionTarget {
        ExecutionTarget::resolve(self.compute_kind, accelerator_available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_source_validation_huggingface() {
        let source = ArtifactSource::HuggingFace {
            repo: "intfloat/e5-large-v2".to_string(),
            filename: Some("tokenizer.json".to_string()),
        };
        assert!(source.validate().is_ok());

        let source = ArtifactSource::HuggingFace {
            repo: "".to_string(),
            filename: None,
        };
        assert!(source.validate().is_err());

        let source = ArtifactSource::HuggingFace {
            repo: "invalid-repo".to_string(),
            filename: None,
        };
        assert!(source.validate().is_err());

        let source = ArtifactSource::HuggingFace {
            repo: "org/re po".to_string(),
            filename: None,
        };
        assert!(source.validate().is_err());

        let source = ArtifactSource::HuggingFace {
            repo: "intfloat/e5-large-v2".to_string(),
            filename: Some("".to_string()),
        };
        assert!(source.validate().is_err());
    }

    #[test]
    fn test_artifact_source_validation_local() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("tokenizer.json"), "{}").unwrap();

        let source = ArtifactSource::Local {
            folder: temp_dir.path().to_path_buf(),
            filename: None,
        };
        assert!(source.validate().is_ok());

        let source = ArtifactSource::Local {
            folder: temp_dir.path().to_path_buf(),
            filename: Some("tokenizer.json".to_string()),
        };
        assert!(source.validate().is_ok());

        let source = ArtifactSource::Local {
            folder: temp_dir.path().to_path_buf(),
            filename: Some("missing.json".to_string()),
        };
        assert!(matches!(source.validate(), Err(LoaderError::NotFound(_))));

        let source = ArtifactSource::Local {
            folder: PathBuf::from("/non/existent/path"),
            filename: None,
        };
        assert!(matches!(source.validate(), Err(LoaderError::NotFound(_))));
    }

    #[test]
    fn test_artifact_source_parse() {
        let source = ArtifactSource::parse("google/siglip-so400m-patch14-384", None);
        assert!(matches!(source, ArtifactSource::HuggingFace { .. }));

        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().to_string_lossy().to_string();
        let source = ArtifactSource::parse(&path, Some("tokenizer.json".to_string()));
        match source {
            ArtifactSource::Local { folder, filename } => {
                assert_eq!(folder, temp_dir.path());
                assert_eq!(filename.as_deref(), Some("tokenizer.json"));
            }
            _ => panic!("Expected local source for an existing path"),
        }
    }

    #[test]
    fn test_compute_kind_parsing() {
        assert_eq!("GPU".parse::<ComputeKind>().unwrap(), ComputeKind::Accelerated);
        assert_eq!(
            "accelerated".parse::<ComputeKind>().unwrap(),
            ComputeKind::Accelerated
        );
        assert_eq!(
            "cpu".parse::<ComputeKind>().unwrap(),
            ComputeKind::GeneralPurpose
        );
        assert_eq!(
            " General-Purpose ".parse::<ComputeKind>().unwrap(),
            ComputeKind::GeneralPurpose
        );
        assert!("tpu".parse::<ComputeKind>().is_err());
    }

    #[test]
    fn test_execution_target_resolution() {
        let target = ExecutionTarget::resolve(ComputeKind::Accelerated, true);
        assert_eq!(target.device, Device::Accelerator);
        assert_eq!(target.precision, Precision::Half);

        // Requested acceleration without an accelerator falls back to the CPU
        let target = ExecutionTarget::resolve(ComputeKind::Accelerated, false);
        assert_eq!(target, ExecutionTarget::cpu());

        let target = ExecutionTarget::resolve(ComputeKind::GeneralPurpose, true);
        assert_eq!(target.device, Device::Cpu);
        assert_eq!(target.precision, Precision::Full);
    }

    #[test]
    fn test_instance_config_roundtrips_through_json() {
        let config = InstanceConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"accelerated\""));

        let parsed: InstanceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.compute_kind, ComputeKind::Accelerated);
        assert_eq!(parsed.model_identifier, config.model_identifier);
        assert!(parsed.offline);
    }

    #[test]
    fn test_instance_config_validation() {
        let mut config = InstanceConfig::default();
        assert!(config.validate().is_ok());

        config.retry_config.backoff_multiplier = 0.5;
        assert!(config.validate().is_err());

        let mut config = InstanceConfig::default();
        config.vocabulary_identifier = ArtifactSource::HuggingFace {
            repo: "no-slash".to_string(),
            filename: None,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_delay_ms, 1000);
        assert_eq!(config.backoff_multiplier, 2.0);
        assert_eq!(config.max_delay_ms, 30000);
    }
}
