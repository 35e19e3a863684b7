use super::OutputHandler;
use crate::error::Result;
use crate::record::Record;
use async_trait::async_trait;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Pretty-printed JSON array of records, written on close. Nothing is
/// created for an empty batch.
pub struct JsonOutput {
    path: PathBuf,
    records: Vec<Record>,
}

impl JsonOutput {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            records: Vec::new(),
        }
    }
}

#[async_trait]
impl OutputHandler for JsonOutput {
    async fn write(&mut self, record: &Record) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.records.is_empty() {
            log::info!("No data to save to {}", self.path.display());
            return Ok(());
        }

        let mut file = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer_pretty(&mut file, &self.records)?;
        writeln!(file)?;
        file.flush()?;

        log::info!("Data saved to {}", self.path.display());
        self.records.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use serde_json::Value;
    use tempfile::TempDir;

    #[tokio::test]
    async fn writes_pretty_array_of_flat_objects() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.json");
        let record = Record::new(
            vec![
                ("name".into(), "Bitcoin".into()),
                ("24h_change".into(), "-0.4%".into()),
            ],
            Local::now(),
        );

        let mut output = JsonOutput::new(path.clone());
        output.write(&record).await.unwrap();
        output.close().await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("[\n  {\n"));
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed[0]["name"], "Bitcoin");
        assert_eq!(parsed[0]["24h_change"], "-0.4%");
        assert_eq!(parsed[0]["timestamp"], record.timestamp_string());
    }

    #[tokio::test]
    async fn empty_batch_creates_no_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.json");

        let mut output = JsonOutput::new(path.clone());
        output.close().await.unwrap();

        assert!(!path.exists());
    }
}
