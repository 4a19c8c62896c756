/// Database operations for storing display readings
use crate::models::StoredRecord;
use crate::storage::connection::execute_with_retry;

/// Create the readings table if it does not exist yet
pub async fn ensure_schema(database_url: &str, attempts: usize) -> Result<(), String> {
    execute_with_retry(database_url, attempts, |client| async move {
        client
            .execute(
                "CREATE TABLE IF NOT EXISTS display_readings (
                    id BIGSERIAL PRIMARY KEY,
                    device TEXT NOT NULL,
                    time TIMESTAMPTZ NOT NULL,
                    local_timestamp BIGINT NOT NULL,
                    utc_offset SMALLINT NOT NULL,
                    text TEXT NOT NULL,
                    value DOUBLE PRECISION,
                    unit TEXT NOT NULL,
                    samples INTEGER NOT NULL,
                    duration_ms BIGINT NOT NULL
                )",
                &[],
            )
            .await
    })
    .await
}

/// Store one flushed reading block in the display_readings table
///
/// # Arguments
/// * `device` - Name of the monitored display
/// * `record` - Stamped record to store
/// * `database_url` - PostgreSQL connection string
/// * `attempts` - Connection attempts before the record is given up
pub async fn store_display_reading(
    device: &str,
    record: &StoredRecord,
    database_url: &str,
    attempts: usize,
) -> Result<(), String> {
    // Clone data for move into async closure
    let device = device.to_string();
    let record = record.clone();

    execute_with_retry(database_url, attempts, move |client| {
        let device = device.clone();
        let record = record.clone();
        async move {
            client
                .execute(
                    "INSERT INTO display_readings(device, time, local_timestamp, utc_offset, text, value, unit, samples, duration_ms)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
                    &[
                        &device,
                        &record.time,
                        &record.timestamp,
                        &i16::from(record.utc_offset_hours),
                        &record.text,
                        &record.value,
                        &record.unit,
                        &record.samples,
                        &record.duration_ms,
                    ],
                )
                .await
        }
    })
    .await
}
