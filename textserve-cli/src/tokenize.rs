use crate::jsonl_writer::{JsonlWriter, TokenizationRecord};
use crate::CliError;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use textserve_embedding::{
    BatchExecutor, BatchProcessor, InferenceRequest, InferenceTensor, TokenizationPipeline,
    TokenizerConfig, INPUT_TEXT,
};
use textserve_loader::{ArtifactSource, ComputeKind, InstanceConfig};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

/// Batches handed to the processor per progress update
const WINDOW_BATCHES: usize = 8;

#[derive(Args, Clone, Debug)]
#[command(about = "Tokenize input texts into fixed-length id sequences")]
pub struct TokenizeArgs {
    /// Vocabulary source (HuggingFace repo or local folder)
    #[arg(long, short, help = "Vocabulary source (HuggingFace repo or local folder)")]
    pub vocabulary: String,

    /// Optional vocabulary filename
    #[arg(long, help = "Vocabulary filename (default: tokenizer.json)")]
    pub filename: Option<String>,

    /// Input text file (one text per line)
    #[arg(long, short, help = "Input text file (one text per line)")]
    pub input: PathBuf,

    /// Output JSON Lines file path
    #[arg(long, short, help = "Output JSON Lines file path")]
    pub output: PathBuf,

    /// Fixed output length; longer texts are rejected
    #[arg(long, default_value = "64", help = "Fixed token sequence length")]
    pub max_length: usize,

    /// Batch size for processing
    #[arg(long, default_value = "32", help = "Batch size for processing")]
    pub batch_size: usize,

    /// Never download; only use files already in the local cache
    #[arg(long, help = "Only use locally cached vocabulary files")]
    pub offline: bool,

    /// Enable debug output
    #[arg(long, help = "Enable debug output")]
    pub debug: bool,
}

impl TokenizeArgs {
    fn to_instance_config(&self) -> InstanceConfig {
        InstanceConfig {
            compute_kind: ComputeKind::GeneralPurpose,
            vocabulary_identifier: ArtifactSource::parse(&self.vocabulary, self.filename.clone()),
            offline: self.offline,
            ..Default::default()
        }
    }

    fn to_tokenizer_config(&self) -> TokenizerConfig {
        TokenizerConfig {
            max_length: self.max_length,
            max_batch_size: self.batch_size,
            ..Default::default()
        }
    }
}

/// Counts reported once a run finishes
#[derive(Debug, Clone, PartialEq)]
pub struct TokenizeSummary {
    pub processed: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

/// Check every argument before anything is loaded
pub fn validate_tokenize_args(args: &TokenizeArgs) -> Result<(), CliError> {
    validate_vocabulary_source(&args.vocabulary, &args.filename)?;
    validate_input_file(&args.input)?;
    validate_output_path(&args.output)?;
    validate_parameters(args.batch_size, args.max_length)
}

fn validate_vocabulary_source(vocabulary: &str, filename: &Option<String>) -> Result<(), CliError> {
    if vocabulary.is_empty() {
        return Err(CliError::validation(
            "Vocabulary source cannot be empty\n💡 Provide either a HuggingFace repo (e.g., 'intfloat/e5-large-v2') or a local folder",
        ));
    }

    ArtifactSource::parse(vocabulary, filename.clone())
        .validate()
        .map_err(|e| {
            CliError::validation(format!(
                "Vocabulary validation failed: {}\n💡 For local folders: ensure the folder contains tokenizer.json\n💡 For HuggingFace: use format 'org/repo'",
                e
            ))
        })
}

fn validate_input_file(input: &Path) -> Result<(), CliError> {
    if !input.exists() {
        return Err(CliError::validation(format!(
            "Input file does not exist: {}\n💡 Ensure file path is correct and file exists",
            input.display()
        )));
    }

    if !input.is_file() {
        return Err(CliError::validation(format!(
            "Input path is not a file: {}\n💡 Provide path to a text file, not a directory",
            input.display()
        )));
    }

    let metadata = std::fs::metadata(input).map_err(|e| {
        CliError::validation(format!(
            "Cannot read input file metadata: {}: {}\n💡 Check file permissions",
            input.display(),
            e
        ))
    })?;

    if metadata.len() == 0 {
        return Err(CliError::validation(format!(
            "Input file is empty: {}\n💡 Provide a text file with content (one text per line)",
            input.display()
        )));
    }

    Ok(())
}

fn validate_output_path(output: &Path) -> Result<(), CliError> {
    if output.extension().map_or(true, |ext| ext != "jsonl") {
        return Err(CliError::validation(format!(
            "Output file must have .jsonl extension, got: {}\n💡 Use a .jsonl extension for the output file",
            output.display()
        )));
    }

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CliError::validation(format!(
                    "Failed to create output directory '{}': {}\n💡 Check parent directory permissions",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    Ok(())
}

fn validate_parameters(batch_size: usize, max_length: usize) -> Result<(), CliError> {
    if batch_size == 0 {
        return Err(CliError::validation(
            "Batch size must be greater than 0\n💡 Use a reasonable batch size like 32 or 64",
        ));
    }

    if batch_size > 1024 {
        return Err(CliError::validation(format!(
            "Batch size is too large: {}. Maximum is 1024",
            batch_size
        )));
    }

    if max_length == 0 {
        return Err(CliError::validation(
            "Max length must be greater than 0\n💡 The default of 64 matches the serving configuration",
        ));
    }

    if max_length > 8192 {
        return Err(CliError::validation(format!(
            "Max length is too large: {}. Maximum is 8192",
            max_length
        )));
    }

    Ok(())
}

/// Non-blank lines of the input as raw bytes, with their 1-based line numbers.
///
/// Lines are not decoded here, so a line that is not valid UTF-8 fails only its
/// own request.
pub async fn read_texts(input_path: &Path) -> anyhow::Result<Vec<(usize, Vec<u8>)>> {
    let file = File::open(input_path).await?;
    let mut segments = BufReader::new(file).split(b'\n');
    let mut texts = Vec::new();
    let mut line_number = 0;

    while let Some(mut line) = segments.next_segment().await? {
        line_number += 1;
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if !line.iter().all(u8::is_ascii_whitespace) {
            texts.push((line_number, line));
        }
    }

    Ok(texts)
}

/// Tokenize every line of the input file and write one record per line
pub async fn run_tokenize(args: TokenizeArgs) -> anyhow::Result<TokenizeSummary> {
    validate_tokenize_args(&args)?;

    info!("Starting tokenize command");
    info!("Vocabulary: {}", args.vocabulary);
    info!("Input: {:?}", args.input);
    info!("Output: {:?}", args.output);

    println!("Loading vocabulary: {}", args.vocabulary);
    let load_start = Instant::now();

    let pipeline = TokenizationPipeline::load(&args.to_instance_config(), args.to_tokenizer_config())
        .await
        .map_err(|e| CliError::loading(format!("Failed to load vocabulary: {}", e)))?;

    println!(
        "Vocabulary loaded in {:.1}s ({} tokens)",
        load_start.elapsed().as_secs_f64(),
        pipeline.adapter().vocabulary().vocab_size()
    );

    let pipeline = Arc::new(pipeline);
    let processor = BatchProcessor::new(pipeline.clone(), args.batch_size);

    let texts = read_texts(&args.input).await?;
    let mut writer = JsonlWriter::new(&args.output)?;
    println!(
        "Processing {} texts with batch size {} via {}...",
        texts.len(),
        args.batch_size,
        pipeline.name()
    );

    let progress_bar = ProgressBar::new(texts.len() as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")?
            .progress_chars("██▌ "),
    );

    let processing_start = Instant::now();
    let mut processed = 0;
    let mut failed = 0;

    // the processor splits each window into batches of `batch_size`
    for chunk in texts.chunks(args.batch_size * WINDOW_BATCHES) {
        let requests: Vec<InferenceRequest> = chunk
            .iter()
            .map(|(_, text)| {
                InferenceRequest::default()
                    .with_tensor(InferenceTensor::bytes(INPUT_TEXT, vec![text.clone()]))
            })
            .collect();

        let responses = processor.process_batch(&requests);

        let records: Vec<TokenizationRecord> = chunk
            .iter()
            .zip(&responses)
            .map(|((line, text), response)| TokenizationRecord::from_response(*line, text, response))
            .collect();

        failed += records.iter().filter(|r| !r.is_success()).count();
        processed += records.len();
        writer.write_batch(&records)?;

        progress_bar.set_position(processed as u64);
        progress_bar.set_message(format!("{} failed", failed));
    }

    progress_bar.finish_with_message("Processing complete");
    let records_written = writer.close()?;

    let summary = TokenizeSummary {
        processed,
        failed,
        elapsed: processing_start.elapsed(),
    };

    println!();
    println!("Processing complete!");
    println!("Total texts: {}", summary.processed);
    println!("Rejected: {}", summary.failed);
    println!("Processing time: {:.1}s", summary.elapsed.as_secs_f64());
    println!(
        "Output written to: {} ({} records)",
        args.output.display(),
        records_written
    );

    Ok(summary)
}
