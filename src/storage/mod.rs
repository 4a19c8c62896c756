pub mod connection;
pub mod csv;
pub mod operations;

use log::{debug, error, info};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::MonitorConfig;
use crate::models::StoredRecord;
use self::csv::append_csv_record;
use self::operations::{ensure_schema, store_display_reading};

/// Records waiting for the writer; beyond this the main loop drops them
pub const WRITER_QUEUE_DEPTH: usize = 64;

/// Configured destinations for stored records
#[derive(Debug, Clone)]
pub struct RecordSinks {
    pub device: String,
    pub database_url: Option<String>,
    pub csv_path: Option<PathBuf>,
    pub attempts: usize,
}

impl RecordSinks {
    pub fn from_config(config: &MonitorConfig) -> Self {
        RecordSinks {
            device: config.device_name.clone(),
            database_url: config.database_url.clone(),
            csv_path: config.csv_path.clone(),
            attempts: config.store_retries,
        }
    }

    pub async fn initialize(&self) -> Result<(), String> {
        if let Some(url) = &self.database_url {
            ensure_schema(url, self.attempts).await?;
            info!("Database schema ready");
        }
        Ok(())
    }

    /// Write `record` to every sink; failures are logged and the record is lost for that sink
    pub async fn store(&self, record: &StoredRecord) {
        if let Some(path) = &self.csv_path {
            match append_csv_record(path, &self.device, record).await {
                Ok(()) => debug!("Appended {} to {}", record.text, path.display()),
                Err(e) => error!("Failed to append reading {} to CSV: {}", record.text, e),
            }
        }

        if let Some(url) = &self.database_url {
            match store_display_reading(&self.device, record, url, self.attempts).await {
                Ok(()) => debug!("Stored {} in database", record.text),
                Err(e) => error!("Failed to store reading {} in database: {}", record.text, e),
            }
        }
    }
}

/// Start the storage writer; it runs until every sender is dropped and the queue is drained
pub fn spawn_writer(sinks: RecordSinks) -> (mpsc::Sender<StoredRecord>, JoinHandle<usize>) {
    let (tx, mut rx) = mpsc::channel::<StoredRecord>(WRITER_QUEUE_DEPTH);
    let handle = tokio::spawn(async move {
        let mut written = 0;
        while let Some(record) = rx.recv().await {
            sinks.store(&record).await;
            written += 1;
        }
        written
    });
    (tx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn stored(text: &str) -> StoredRecord {
        StoredRecord {
            timestamp: 1735736400,
            utc_offset_hours: 1,
            time: OffsetDateTime::from_unix_timestamp(1735732800).unwrap(),
            text: text.to_string(),
            value: text.parse().ok(),
            unit: String::new(),
            samples: 1,
            duration_ms: 0,
        }
    }

    #[tokio::test]
    async fn test_writer_drains_queue_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let sinks = RecordSinks {
            device: "bench".to_string(),
            database_url: None,
            csv_path: Some(path.clone()),
            attempts: 1,
        };

        let (tx, handle) = spawn_writer(sinks);
        for text in ["1.0", "2.0", "3.0"] {
            tx.send(stored(text)).await.unwrap();
        }
        drop(tx);
        assert_eq!(handle.await.unwrap(), 3);

        let contents = std::fs::read_to_string(&path).unwrap();
        let texts: Vec<&str> = contents
            .lines()
            .skip(1)
            .map(|line| line.split(';').nth(4).unwrap())
            .collect();
        assert_eq!(texts, ["1.0", "2.0", "3.0"]);
    }

    #[tokio::test]
    async fn test_initialize_without_database_is_noop() {
        let sinks = RecordSinks {
            device: "bench".to_string(),
            database_url: None,
            csv_path: None,
            attempts: 1,
        };
        assert_eq!(sinks.initialize().await, Ok(()));
    }
}
