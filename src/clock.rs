//! Wall-clock source for record timestamps
//!
//! The host clock stands in for the battery-backed RTC. A clock reading
//! earlier than the first DST transition means the clock was never set;
//! records are not stamped until it is. Setting the clock stores an
//! adjustment on top of the host time rather than touching the system clock.
use log::{info, warn};
use std::time::Instant;
use time::{OffsetDateTime, UtcOffset};

use crate::dst::{local_to_utc, resolve_offset, utc_to_local, DST_TRANSITIONS};
use crate::models::{LogRecord, StoredRecord};

/// Earliest UTC time accepted as a set clock
pub const MIN_VALID_UNIX: i64 = DST_TRANSITIONS[0].timestamp;

#[derive(Debug)]
pub struct RtcClock {
    origin: Instant,
    adjustment_secs: i64,
    pending_local: Option<i64>,
}

impl Default for RtcClock {
    fn default() -> Self {
        Self::new()
    }
}

impl RtcClock {
    pub fn new() -> Self {
        RtcClock {
            origin: Instant::now(),
            adjustment_secs: 0,
            pending_local: None,
        }
    }

    /// Monotonic milliseconds since the clock was created
    pub fn mono_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn host_unix() -> i64 {
        OffsetDateTime::now_utc().unix_timestamp()
    }

    /// Current UTC unix seconds, or `None` while the clock is not set
    pub fn now_unix(&self) -> Option<i64> {
        let now = Self::host_unix() + self.adjustment_secs;
        (now >= MIN_VALID_UNIX).then_some(now)
    }

    pub fn is_available(&self) -> bool {
        self.now_unix().is_some()
    }

    pub fn set_utc(&mut self, unix: i64) {
        self.adjustment_secs = unix - Self::host_unix();
        if unix < MIN_VALID_UNIX {
            warn!("Clock set to {} which predates {}; records stay suppressed", unix, MIN_VALID_UNIX);
        } else {
            info!("Clock set to {} UTC (adjustment {} s)", unix, self.adjustment_secs);
        }
    }

    /// Queue a clock set expressed in local wall-clock seconds
    pub fn request_set_local(&mut self, local: i64) {
        self.pending_local = Some(local);
    }

    pub fn has_pending(&self) -> bool {
        self.pending_local.is_some()
    }

    /// Apply a queued local-time set, returning the UTC time written
    pub fn apply_pending(&mut self) -> Option<i64> {
        let local = self.pending_local.take()?;
        let utc = local_to_utc(local);
        self.set_utc(utc);
        Some(utc)
    }

    /// Stamp `record` with the wall-clock time of its first reading
    pub fn stamp(&self, record: &LogRecord, now_ms: u64) -> Option<StoredRecord> {
        let now = self.now_unix()?;
        stamp_record(record, now, now_ms)
    }
}

/// Back-date `record` from (`unix_now`, `now_ms`) to its `started_ms` and apply the DST offset
pub fn stamp_record(record: &LogRecord, unix_now: i64, now_ms: u64) -> Option<StoredRecord> {
    let age_secs = i64::try_from(now_ms.saturating_sub(record.started_ms) / 1000).ok()?;
    let utc = unix_now - age_secs;
    let offset_hours = resolve_offset(utc);
    let offset = UtcOffset::from_hms(offset_hours, 0, 0).ok()?;
    let time = OffsetDateTime::from_unix_timestamp(utc).ok()?.to_offset(offset);

    Some(StoredRecord {
        timestamp: utc_to_local(utc),
        utc_offset_hours: offset_hours,
        time,
        text: record.text.to_string(),
        value: record.value,
        unit: record.units.suffix(),
        samples: i32::try_from(record.samples).unwrap_or(i32::MAX),
        duration_ms: i64::try_from(record.ended_ms.saturating_sub(record.started_ms))
            .unwrap_or(i64::MAX),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DisplayText, Units};

    fn record(started_ms: u64, ended_ms: u64) -> LogRecord {
        LogRecord {
            started_ms,
            ended_ms,
            samples: 3,
            value: Some(12.34),
            text: DisplayText::new("12.34").unwrap(),
            units: Units {
                kilo: true,
                gram: true,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_stamp_back_dates_to_first_reading() {
        // 01.07.2024 12:00:13 UTC, 13 s after the run started
        let stored = stamp_record(&record(0, 2000), 1719835213, 13_000).unwrap();
        assert_eq!(stored.utc_offset_hours, 2);
        assert_eq!(stored.timestamp, 1719835200 + 7200);
        assert_eq!(stored.time.unix_timestamp(), 1719835200);
        assert_eq!(stored.time.offset().whole_hours(), 2);
        assert_eq!(stored.time.hour(), 14);
        assert_eq!(stored.duration_ms, 2000);
        assert_eq!(stored.samples, 3);
        assert_eq!(stored.unit, "kg");
        assert_eq!(stored.text, "12.34");
    }

    #[test]
    fn test_stamp_in_winter_uses_cet() {
        let stored = stamp_record(&record(5000, 5000), 1735732800, 5000).unwrap();
        assert_eq!(stored.utc_offset_hours, 1);
        assert_eq!(stored.timestamp, 1735732800 + 3600);
    }

    #[test]
    fn test_unset_clock_suppresses_records() {
        let mut clock = RtcClock::new();
        clock.set_utc(1_000_000);
        assert!(!clock.is_available());
        assert!(clock.stamp(&record(0, 0), clock.mono_ms()).is_none());
    }

    #[test]
    fn test_pending_local_time_is_converted_to_utc() {
        let mut clock = RtcClock::new();
        // 01.07.2024 14:00 local (CEST)
        clock.request_set_local(1719835200 + 7200);
        assert!(clock.has_pending());
        assert_eq!(clock.apply_pending(), Some(1719835200));
        assert!(!clock.has_pending());
        assert_eq!(clock.apply_pending(), None);

        let now = clock.now_unix().unwrap();
        assert!((now - 1719835200).abs() <= 2);
        assert!(clock.is_available());
    }
}
