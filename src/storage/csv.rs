/// Append-only CSV log of stored readings
use std::path::Path;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::models::StoredRecord;
use crate::utils::format_datetime;

pub const CSV_HEADER: &str =
    "timestamp;local_time;utc_offset;device;text;value;unit;samples;duration_ms";

pub fn format_csv_line(device: &str, record: &StoredRecord) -> String {
    let value = record.value.map(|v| v.to_string()).unwrap_or_default();
    format!(
        "{};{};{};{};{};{};{};{};{}",
        record.timestamp,
        format_datetime(&record.time),
        record.utc_offset_hours,
        device,
        record.text,
        value,
        record.unit,
        record.samples,
        record.duration_ms
    )
}

/// Append `record` to the CSV file at `path`, writing the header into a new or empty file
pub async fn append_csv_record(
    path: &Path,
    device: &str,
    record: &StoredRecord,
) -> Result<(), String> {
    let needs_header = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata.len() == 0,
        Err(_) => true,
    };

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| format!("Failed to open {}: {}", path.display(), e))?;

    let mut lines = String::new();
    if needs_header {
        lines.push_str(CSV_HEADER);
        lines.push('\n');
    }
    lines.push_str(&format_csv_line(device, record));
    lines.push('\n');

    file.write_all(lines.as_bytes())
        .await
        .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
    file.flush()
        .await
        .map_err(|e| format!("Failed to flush {}: {}", path.display(), e))
}
