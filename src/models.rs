use std::fmt;
use thiserror::Error;
use time::OffsetDateTime;

/// Bytes captured per write to the display controller's segment memory
pub const FRAME_SIZE: usize = 32;
/// Leading bytes that carry segment data; status signatures compare these
pub const SIGNATURE_LEN: usize = 16;
/// Maximum characters in a rendered reading
pub const TEXT_CAPACITY: usize = 16;

/// Raw segment-memory bitmap captured from the bus
///
/// Bit `i` lives in byte `i / 8`, counted from the least significant bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentFrame([u8; FRAME_SIZE]);

impl SegmentFrame {
    pub const fn new(bytes: [u8; FRAME_SIZE]) -> Self {
        SegmentFrame(bytes)
    }

    /// Build a frame from a capture of up to `FRAME_SIZE` bytes, zero padding the tail
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() > FRAME_SIZE {
            return None;
        }
        let mut buffer = [0u8; FRAME_SIZE];
        buffer[..bytes.len()].copy_from_slice(bytes);
        Some(SegmentFrame(buffer))
    }

    pub fn bytes(&self) -> &[u8; FRAME_SIZE] {
        &self.0
    }

    pub fn signature(&self) -> &[u8] {
        &self.0[..SIGNATURE_LEN]
    }

    pub fn bit(&self, index: usize) -> bool {
        self.0
            .get(index / 8)
            .is_some_and(|byte| (byte >> (index % 8)) & 1 == 1)
    }

    #[cfg(test)]
    pub fn set_bit(&mut self, index: usize) {
        self.0[index / 8] |= 1 << (index % 8);
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("display text exceeds {} characters", TEXT_CAPACITY)]
pub struct TextOverflow;

/// Rendered reading with a hard upper bound on its length
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayText(String);

impl DisplayText {
    pub fn new(text: &str) -> Result<Self, TextOverflow> {
        let mut rendered = DisplayText::default();
        rendered.push_str(text)?;
        Ok(rendered)
    }

    /// Append `text`, leaving the buffer untouched if it would not fit
    pub fn push_str(&mut self, text: &str) -> Result<(), TextOverflow> {
        if self.0.chars().count() + text.chars().count() > TEXT_CAPACITY {
            return Err(TextOverflow);
        }
        self.0.push_str(text);
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DisplayText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unit indicators lit next to the digits. Annotations only, they never scale the value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Units {
    pub kilo: bool,
    /// The "G" indicator (gram)
    pub gram: bool,
    pub pieces: bool,
    pub percent: bool,
}

impl Units {
    /// Unit suffix as shown on the display, e.g. `kg`, `pcs`, `%`
    pub fn suffix(&self) -> String {
        let mut parts = Vec::new();
        let mass = match (self.kilo, self.gram) {
            (true, true) => "kg",
            (true, false) => "k",
            (false, true) => "g",
            (false, false) => "",
        };
        if !mass.is_empty() {
            parts.push(mass);
        }
        if self.pieces {
            parts.push("pcs");
        }
        if self.percent {
            parts.push("%");
        }
        parts.join(" ")
    }
}

/// Decoded view of one segment frame
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeResult {
    pub valid: bool,
    pub overload: bool,
    pub underload: bool,
    pub stable: bool,
    pub negative: bool,
    /// Signed reading; `None` for status frames and discarded frames
    pub value: Option<f64>,
    pub text: DisplayText,
    pub units: Units,
}

impl DecodeResult {
    /// A stable numeric reading that may open or extend a log block
    pub fn is_loggable(&self) -> bool {
        self.valid && self.stable && !self.overload && !self.underload && self.value.is_some()
    }
}

/// One consolidated run of equal stable readings, ready to be timestamped
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// Monotonic milliseconds of the first reading in the run
    pub started_ms: u64,
    pub ended_ms: u64,
    pub samples: u32,
    pub value: Option<f64>,
    pub text: DisplayText,
    pub units: Units,
}

/// A log record stamped with wall-clock time, as handed to the sinks
#[derive(Debug, Clone)]
pub struct StoredRecord {
    /// Local unix seconds (UTC seconds plus the DST-resolved offset)
    pub timestamp: i64,
    pub utc_offset_hours: i8,
    pub time: OffsetDateTime,
    pub text: String,
    pub value: Option<f64>,
    pub unit: String,
    pub samples: i32,
    pub duration_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_bits_are_lsb_first() {
        let mut bytes = [0u8; FRAME_SIZE];
        bytes[0] = 0x20;
        bytes[3] = 0x01;
        let frame = SegmentFrame::new(bytes);
        assert!(frame.bit(5));
        assert!(frame.bit(24));
        assert!(!frame.bit(4));
        assert!(!frame.bit(FRAME_SIZE * 8 + 3));
    }

    #[test]
    fn test_frame_from_slice_pads_and_rejects() {
        let frame = SegmentFrame::from_slice(&[0xAB; 16]).unwrap();
        assert_eq!(frame.bytes()[15], 0xAB);
        assert_eq!(frame.bytes()[16], 0x00);
        assert!(SegmentFrame::from_slice(&[0u8; FRAME_SIZE + 1]).is_none());
    }

    #[test]
    fn test_display_text_capacity() {
        let mut text = DisplayText::new("-1234.5678").unwrap();
        assert_eq!(text.push_str("123456"), Ok(()));
        assert_eq!(text.as_str().len(), TEXT_CAPACITY);
        assert_eq!(text.push_str("9"), Err(TextOverflow));
        assert_eq!(text.as_str(), "-1234.5678123456");
        assert!(DisplayText::new("UNDERLOAD-UNDERLOAD").is_err());
    }

    #[test]
    fn test_unit_suffix() {
        let units = Units {
            kilo: true,
            gram: true,
            ..Default::default()
        };
        assert_eq!(units.suffix(), "kg");
        let units = Units {
            pieces: true,
            percent: true,
            ..Default::default()
        };
        assert_eq!(units.suffix(), "pcs %");
        assert_eq!(Units::default().suffix(), "");
    }
}
