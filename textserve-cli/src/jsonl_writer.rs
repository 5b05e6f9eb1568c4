use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use textserve_embedding::{InferenceResponse, TOKENIZED_IDS};
use thiserror::Error;
use tracing::{debug, info};

/// Error types for JSON Lines output
#[derive(Error, Debug)]
pub enum JsonlError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One output line: the tokenization of one input line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenizationRecord {
    /// 1-based line number in the input file
    pub line: usize,
    pub text: String,
    /// MD5 of the text, hex encoded
    pub text_hash: String,
    /// Token ids, or the zeroed placeholder when tokenization failed
    pub input_ids: Vec<i64>,
    pub error: Option<String>,
}

impl TokenizationRecord {
    /// Text that is not valid UTF-8 is stored lossily; the hash covers the raw bytes.
    pub fn from_response(line: usize, text: impl AsRef<[u8]>, response: &InferenceResponse) -> Self {
        let text = text.as_ref();
        let input_ids = response
            .output(TOKENIZED_IDS)
            .and_then(|tensor| tensor.as_int64().ok())
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();

        Self {
            line,
            text: String::from_utf8_lossy(text).into_owned(),
            text_hash: text_hash(text),
            input_ids,
            error: response.error().map(|e| e.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

pub fn text_hash(text: impl AsRef<[u8]>) -> String {
    format!("{:x}", md5::compute(text.as_ref()))
}

/// Streams tokenization records to a `.jsonl` file
pub struct JsonlWriter {
    output_path: PathBuf,
    writer: BufWriter<File>,
    records_written: usize,
}

impl JsonlWriter {
    pub fn new(output_path: &Path) -> Result<Self, JsonlError> {
        let file = File::create(output_path)?;
        debug!("Created JSON Lines writer: path={:?}", output_path);

        Ok(Self {
            output_path: output_path.to_path_buf(),
            writer: BufWriter::new(file),
            records_written: 0,
        })
    }

    pub fn write_batch(&mut self, records: &[TokenizationRecord]) -> Result<(), JsonlError> {
        if records.is_empty() {
            debug!("Skipping empty batch");
            return Ok(());
        }

        for record in records {
            serde_json::to_writer(&mut self.writer, record)?;
            self.writer.write_all(b"\n")?;
        }
        self.records_written += records.len();

        debug!(
            "Wrote batch of {} records (total: {})",
            records.len(),
            self.records_written
        );
        Ok(())
    }

    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// Flush and close the file, returning the number of records written
    pub fn close(mut self) -> Result<usize, JsonlError> {
        self.writer.flush()?;
        info!(
            "Wrote {} records to {}",
            self.records_written,
            self.output_path.display()
        );
        Ok(self.records_written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;
    use tempfile::tempdir;
    use textserve_embedding::{InferenceTensor, RequestError};

    fn success(ids: [i64; 3]) -> InferenceResponse {
        InferenceResponse::success(InferenceTensor::int64(TOKENIZED_IDS, arr2(&[ids]).into_dyn()))
    }

    #[test]
    fn test_text_hash_is_md5_hex() {
        assert_eq!(text_hash(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(text_hash("hello"), "5d41402abc4b2a76b9719d911017c592");
    }

    #[test]
    fn test_record_from_success() {
        let record = TokenizationRecord::from_response(3, "hello", &success([5, 6, 0]));
        assert_eq!(record.line, 3);
        assert_eq!(record.input_ids, vec![5, 6, 0]);
        assert!(record.is_success());
    }

    #[test]
    fn test_record_from_failure_keeps_placeholder() {
        let response = InferenceResponse::failure_with_placeholder(
            RequestError::validation("too long"),
            InferenceTensor::int64(TOKENIZED_IDS, arr2(&[[0i64, 0, 0]]).into_dyn()),
        );
        let record = TokenizationRecord::from_response(1, "long text", &response);
        assert_eq!(record.input_ids, vec![0, 0, 0]);
        assert_eq!(record.error.as_deref(), Some("Validation failed: too long"));
        assert!(!record.is_success());
    }

    #[test]
    fn test_record_from_invalid_utf8_text() {
        let raw = vec![b'o', b'k', 0xff];
        let response = InferenceResponse::failure(RequestError::input("not valid UTF-8"));
        let record = TokenizationRecord::from_response(2, &raw, &response);
        assert_eq!(record.text, "ok\u{fffd}");
        assert_eq!(record.text_hash, text_hash(&raw));
        assert_ne!(record.text_hash, text_hash(&record.text));
    }

    #[test]
    fn test_writer_writes_one_line_per_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.jsonl");

        let mut writer = JsonlWriter::new(&path).unwrap();
        writer
            .write_batch(&[
                TokenizationRecord::from_response(1, "a", &success([1, 0, 0])),
                TokenizationRecord::from_response(2, "b", &success([2, 0, 0])),
            ])
            .unwrap();
        writer.write_batch(&[]).unwrap();
        assert_eq!(writer.records_written(), 2);
        assert_eq!(writer.close().unwrap(), 2);

        let content = std::fs::read_to_string(&path).unwrap();
        let records: Vec<TokenizationRecord> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].text, "b");
        assert_eq!(records[1].input_ids, vec![2, 0, 0]);
        assert_eq!(records[0].error, None);
    }
}
