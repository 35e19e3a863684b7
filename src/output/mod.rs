use crate::error::Result;
use crate::record::Record;
use async_trait::async_trait;

pub mod console;
pub mod csv;
pub mod json;

#[async_trait]
pub trait OutputHandler: Send + Sync {
    async fn write(&mut self, record: &Record) -> Result<()>;
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Feeds every record to every handler, then closes them.
pub async fn save_batch(batch: &[Record], handlers: &mut [Box<dyn OutputHandler>]) -> Result<()> {
    for handler in handlers.iter_mut() {
        for record in batch {
            handler.write(record).await?;
        }
        handler.close().await?;
    }
    Ok(())
}
