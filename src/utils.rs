/// Utility functions for time formatting and parsing
use time::{format_description, OffsetDateTime, PrimitiveDateTime};

const DISPLAY_FORMAT: &str = "[day].[month].[year] - [hour]:[minute]:[second]";
const LOCAL_INPUT_FORMAT: &str = "[year]-[month]-[day] [hour]:[minute]:[second]";

/// Format a timestamp for human-readable logging
///
/// Converts an OffsetDateTime to DD.MM.YYYY - HH:MM:SS format in its own offset.
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    format_description::parse(DISPLAY_FORMAT)
        .ok()
        .and_then(|format| dt.format(&format).ok())
        .unwrap_or_else(|| dt.to_string())
}

/// Parse a `YYYY-MM-DD HH:MM:SS` local wall-clock time into local unix seconds
pub fn parse_local_datetime(input: &str) -> Result<i64, String> {
    let format = format_description::parse(LOCAL_INPUT_FORMAT)
        .map_err(|e| format!("Bad format description: {}", e))?;
    let local = PrimitiveDateTime::parse(input.trim(), &format)
        .map_err(|e| format!("'{}' is not YYYY-MM-DD HH:MM:SS: {}", input, e))?;
    Ok(local.assume_utc().unix_timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::UtcOffset;

    #[test]
    fn test_format_datetime_uses_offset() {
        let dt = OffsetDateTime::from_unix_timestamp(1719835200)
            .unwrap()
            .to_offset(UtcOffset::from_hms(2, 0, 0).unwrap());
        assert_eq!(format_datetime(&dt), "01.07.2024 - 14:00:00");
    }

    #[test]
    fn test_parse_local_datetime() {
        assert_eq!(parse_local_datetime("2024-07-01 14:00:00"), Ok(1719835200 + 7200));
        assert!(parse_local_datetime("01.07.2024 14:00").is_err());
    }
}
