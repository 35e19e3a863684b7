use super::OutputHandler;
use crate::error::{Error, Result};
use crate::record::Record;
use async_trait::async_trait;
use indicatif::MultiProgress;
use std::sync::Arc;

/// Prints each record as pretty JSON, above any active progress bars.
pub struct ConsoleOutput {
    multi: Option<Arc<MultiProgress>>,
}

impl ConsoleOutput {
    pub fn new(multi: Option<Arc<MultiProgress>>) -> Self {
        Self { multi }
    }
}

impl Default for ConsoleOutput {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl OutputHandler for ConsoleOutput {
    async fn write(&mut self, record: &Record) -> Result<()> {
        let output = serde_json::to_string_pretty(record)?;

        if let Some(multi) = &self.multi {
            for line in output.lines() {
                multi.println(line).map_err(|e| Error::Internal(e.to_string()))?;
            }
        } else {
            println!("{}", output);
        }
        Ok(())
    }
}
