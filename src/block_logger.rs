/// Aggregation of the decoded reading stream into one record per stable value
///
/// The display repeats its reading on every refresh, so consecutive equal
/// stable readings are folded into a block. A block is flushed when the
/// reading moves, turns unstable, overloads, becomes unreadable, or when
/// nothing has extended it for `BLOCK_TIMEOUT_MS`. Flushes whose value
/// repeats the last logged one are dropped, as are flushes while the clock
/// is unset; those leave the last logged value untouched.
use log::{debug, warn};

use crate::models::{DecodeResult, LogRecord};

/// Largest difference at which two readings count as the same value
pub const TOLERANCE: f64 = 0.001;
/// A block with no matching reading for longer than this is flushed
pub const BLOCK_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone)]
struct LogBlock {
    representative: DecodeResult,
    start_ms: u64,
    end_ms: u64,
    samples: u32,
}

impl LogBlock {
    fn open(result: DecodeResult, now_ms: u64) -> Self {
        LogBlock {
            representative: result,
            start_ms: now_ms,
            end_ms: now_ms,
            samples: 1,
        }
    }

    fn accepts(&self, result: &DecodeResult) -> bool {
        if !result.is_loggable() {
            return false;
        }
        match (self.representative.value, result.value) {
            (Some(current), Some(next)) => (next - current).abs() <= TOLERANCE,
            _ => false,
        }
    }

    fn extend(&mut self, now_ms: u64) {
        self.end_ms = now_ms;
        self.samples += 1;
    }

    fn expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.end_ms) > BLOCK_TIMEOUT_MS
    }
}

#[derive(Debug, Default)]
pub struct BlockLogger {
    block: Option<LogBlock>,
    last_logged_value: Option<f64>,
    clock_unset: bool,
}

impl BlockLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.block.is_some()
    }

    /// Records can only be emitted while the wall clock is available
    pub fn set_clock_available(&mut self, available: bool) {
        self.clock_unset = !available;
    }

    /// Feed one decoded frame, in arrival order
    ///
    /// Returns the record of a block closed by this call, if it is to be stored.
    pub fn observe(&mut self, result: DecodeResult, now_ms: u64) -> Option<LogRecord> {
        let timed_out = self.poll(now_ms);

        if let Some(block) = self.block.as_mut() {
            if block.accepts(&result) {
                block.extend(now_ms);
                return None;
            }
        }

        let flushed = self.flush().or(timed_out);
        if result.is_loggable() {
            self.block = Some(LogBlock::open(result, now_ms));
        }
        flushed
    }

    /// Flush the open block once it has gone `BLOCK_TIMEOUT_MS` without a matching reading
    pub fn poll(&mut self, now_ms: u64) -> Option<LogRecord> {
        if self.block.as_ref().is_some_and(|block| block.expired(now_ms)) {
            self.flush()
        } else {
            None
        }
    }

    /// Close the open block, emitting its record unless it repeats the last logged value
    pub fn flush(&mut self) -> Option<LogRecord> {
        let block = self.block.take()?;
        let value = block.representative.value?;

        if let Some(last) = self.last_logged_value {
            if (value - last).abs() <= TOLERANCE {
                debug!(
                    "Suppressing repeat of {} ({} samples)",
                    block.representative.text, block.samples
                );
                return None;
            }
        }

        if self.clock_unset {
            warn!("Clock not set, dropping reading {}", block.representative.text);
            return None;
        }

        self.last_logged_value = Some(value);
        Some(LogRecord {
            started_ms: block.start_ms,
            ended_ms: block.end_ms,
            samples: block.samples,
            value: Some(value),
            text: block.representative.text,
            units: block.representative.units,
        })
    }
}
