use anyhow::Result;
use std::fs;
use std::path::Path;
use tempfile::tempdir;
use textserve_cli::{exit_code, run_tokenize, TokenizationRecord, TokenizeArgs};

const WORD_LEVEL_TOKENIZER: &str = r#"{
    "version": "1.0",
    "truncation": null,
    "padding": null,
    "added_tokens": [],
    "normalizer": null,
    "pre_tokenizer": { "type": "Whitespace" },
    "post_processor": null,
    "decoder": null,
    "model": {
        "type": "WordLevel",
        "vocab": { "[UNK]": 0, "a": 1, "photo": 2, "of": 3, "cat": 4, "dog": 5 },
        "unk_token": "[UNK]"
    }
}"#;

fn args(folder: &Path, input: &Path, output: &Path, max_length: usize) -> TokenizeArgs {
    TokenizeArgs {
        vocabulary: folder.to_string_lossy().to_string(),
        filename: None,
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        max_length,
        batch_size: 2,
        offline: true,
        debug: false,
    }
}

fn read_records(path: &Path) -> Result<Vec<TokenizationRecord>> {
    fs::read_to_string(path)?
        .lines()
        .map(|line| Ok(serde_json::from_str(line)?))
        .collect()
}

#[tokio::test]
async fn test_tokenize_local_vocabulary() -> Result<()> {
    let dir = tempdir()?;
    fs::write(dir.path().join("tokenizer.json"), WORD_LEVEL_TOKENIZER)?;
    let input = dir.path().join("input.txt");
    fs::write(&input, "a photo of a cat\n\na dog\ncat cat cat cat cat\n")?;
    let output = dir.path().join("out").join("tokens.jsonl");

    let summary = run_tokenize(args(dir.path(), &input, &output, 5)).await?;
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.failed, 0);

    let records = read_records(&output)?;
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].line, 1);
    assert_eq!(records[0].input_ids, vec![1, 2, 3, 1, 4]);
    assert_eq!(records[1].line, 3);
    assert_eq!(records[1].input_ids, vec![1, 5, 0, 0, 0]);
    assert_eq!(records[2].input_ids, vec![4; 5]);
    assert_eq!(records[1].text_hash.len(), 32);
    Ok(())
}

#[tokio::test]
async fn test_overlong_lines_are_rejected_with_placeholder() -> Result<()> {
    let dir = tempdir()?;
    fs::write(dir.path().join("tokenizer.json"), WORD_LEVEL_TOKENIZER)?;
    let input = dir.path().join("input.txt");
    fs::write(&input, "a cat\na photo of a cat\na dog\n")?;
    let output = dir.path().join("tokens.jsonl");

    let summary = run_tokenize(args(dir.path(), &input, &output, 3)).await?;
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.failed, 1);

    let records = read_records(&output)?;
    assert!(records[0].error.is_none());
    assert_eq!(records[0].input_ids, vec![1, 4, 0]);

    let rejected = &records[1];
    assert_eq!(rejected.input_ids, vec![0, 0, 0]);
    let error = rejected.error.as_deref().unwrap_or_default();
    assert!(error.contains("has 5 tokens which exceeds max of 3"));

    assert!(records[2].error.is_none());
    Ok(())
}

#[tokio::test]
async fn test_invalid_utf8_line_fails_alone() -> Result<()> {
    let dir = tempdir()?;
    fs::write(dir.path().join("tokenizer.json"), WORD_LEVEL_TOKENIZER)?;
    let input = dir.path().join("input.txt");
    let mut bytes = b"a dog\n".to_vec();
    bytes.extend_from_slice(&[0xff, 0xfe, b'\n']);
    bytes.extend_from_slice(b"dog\n");
    fs::write(&input, bytes)?;
    let output = dir.path().join("tokens.jsonl");

    let summary = run_tokenize(args(dir.path(), &input, &output, 3)).await?;
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.failed, 1);

    let records = read_records(&output)?;
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].input_ids, vec![1, 5, 0]);
    assert!(records[0].error.is_none());

    let invalid = &records[1];
    assert_eq!(invalid.line, 2);
    assert_eq!(invalid.input_ids, vec![0, 0, 0]);
    assert_eq!(invalid.text_hash, format!("{:x}", md5::compute([0xffu8, 0xfe])));
    let error = invalid.error.as_deref().unwrap_or_default();
    assert!(error.contains("Invalid request input"));
    assert!(error.contains("not valid UTF-8"));

    assert_eq!(records[2].input_ids, vec![5, 0, 0]);
    assert!(records[2].error.is_none());
    Ok(())
}

#[tokio::test]
async fn test_large_input_keeps_line_order_across_batches() -> Result<()> {
    let dir = tempdir()?;
    fs::write(dir.path().join("tokenizer.json"), WORD_LEVEL_TOKENIZER)?;
    let input = dir.path().join("input.txt");
    let lines: Vec<&str> = (0..41)
        .map(|i| if i % 5 == 0 { "a photo of a cat" } else { "a dog" })
        .collect();
    fs::write(&input, lines.join("\n"))?;
    let output = dir.path().join("tokens.jsonl");

    let summary = run_tokenize(args(dir.path(), &input, &output, 3)).await?;
    assert_eq!(summary.processed, 41);
    assert_eq!(summary.failed, 9);

    let records = read_records(&output)?;
    assert_eq!(records.len(), 41);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.line, i + 1);
        assert_eq!(record.is_success(), i % 5 != 0);
    }
    Ok(())
}

#[tokio::test]
async fn test_missing_vocabulary_file_is_loading_error() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("input.txt");
    fs::write(&input, "a cat\n")?;

    let err = run_tokenize(args(dir.path(), &input, &dir.path().join("out.jsonl"), 64))
        .await
        .unwrap_err();
    assert_eq!(exit_code(&err), 3);
    assert!(err.to_string().contains("Failed to load vocabulary"));
    Ok(())
}

#[tokio::test]
async fn test_invalid_arguments_are_validation_errors() -> Result<()> {
    let dir = tempdir()?;
    fs::write(dir.path().join("tokenizer.json"), WORD_LEVEL_TOKENIZER)?;
    let input = dir.path().join("input.txt");
    fs::write(&input, "a cat\n")?;

    let mut bad = args(dir.path(), &input, &dir.path().join("out.parquet"), 64);
    let err = run_tokenize(bad.clone()).await.unwrap_err();
    assert_eq!(exit_code(&err), 2);

    bad.output = dir.path().join("out.jsonl");
    bad.input = dir.path().join("missing.txt");
    let err = run_tokenize(bad).await.unwrap_err();
    assert_eq!(exit_code(&err), 2);
    assert!(err.to_string().contains("Input file does not exist"));
    Ok(())
}
