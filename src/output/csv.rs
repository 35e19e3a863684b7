use super::OutputHandler;
use crate::error::Result;
use crate::record::Record;
use async_trait::async_trait;
use std::path::PathBuf;

/// Row-per-record file with a header row. Columns are the union of field
/// names in first-seen order; a missing optional field is an empty cell.
/// The file is only created when there is at least one record.
pub struct CsvOutput {
    path: PathBuf,
    records: Vec<Record>,
}

impl CsvOutput {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            records: Vec::new(),
        }
    }

    fn headers(&self) -> Vec<String> {
        let mut headers: Vec<String> = Vec::new();
        for record in &self.records {
            for (name, _) in record.entries() {
                if !headers.iter().any(|h| h == name) {
                    headers.push(name.to_string());
                }
            }
        }
        headers
    }
}

#[async_trait]
impl OutputHandler for CsvOutput {
    async fn write(&mut self, record: &Record) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.records.is_empty() {
            log::info!("No data to save to {}", self.path.display());
            return Ok(());
        }

        let headers = self.headers();
        let mut writer = csv::Writer::from_path(&self.path)?;
        writer.write_record(&headers)?;

        for record in self.records.drain(..) {
            let entries = record.entries();
            let row = headers.iter().map(|h| {
                entries
                    .iter()
                    .find(|(name, _)| *name == h.as_str())
                    .map(|(_, value)| value.as_str())
                    .unwrap_or("")
            });
            writer.write_record(row)?;
        }

        writer.flush()?;
        log::info!("Data saved to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use tempfile::TempDir;

    fn record(fields: &[(&str, &str)]) -> Record {
        Record::new(
            fields.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            Local::now(),
        )
    }

    #[tokio::test]
    async fn round_trips_text_values_with_union_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let records = vec![
            record(&[("name", "Bitcoin"), ("price", "$64,000.00")]),
            record(&[("name", "Tether"), ("symbol", "USDT"), ("price", "1.00")]),
        ];

        let mut output = CsvOutput::new(path.clone());
        for r in &records {
            output.write(r).await.unwrap();
        }
        output.close().await.unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, vec!["name", "price", "timestamp", "symbol"]);

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][1], "$64,000.00");
        assert_eq!(&rows[0][3], "");
        assert_eq!(&rows[1][0], "Tether");
        assert_eq!(&rows[1][3], "USDT");
        assert_eq!(&rows[1][2], records[1].timestamp_string());
    }

    #[tokio::test]
    async fn empty_batch_creates_no_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.csv");

        let mut output = CsvOutput::new(path.clone());
        output.close().await.unwrap();

        assert!(!path.exists());
    }
}
