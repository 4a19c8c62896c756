/// Segment frame decoding into structured readings
use log::debug;
use thiserror::Error;

use crate::display::segment_map::{
    digit_for_pattern, read_units, DIGITS, INIT_PATTERN, NEGATIVE_SIGN, OFF_PATTERN,
    OVERLOAD_PATTERN, READING_STABLE_BIT, UNDERLOAD_PATTERN, VERSION_PATTERN,
};
use crate::models::{DecodeResult, DisplayText, SegmentFrame, TextOverflow, Units, SIGNATURE_LEN};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unknown segment pattern {pattern:#04x} in digit slot {slot}")]
    UnknownSegments { slot: usize, pattern: u8 },
    #[error("decimal point lit in slots {first} and {second}")]
    MultipleDecimalPoints { first: usize, second: usize },
    #[error(transparent)]
    TextOverflow(#[from] TextOverflow),
    #[error("display text {0:?} is not a number")]
    Unparsable(String),
}

/// Whole-display states recognised by their exact segment signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayStatus {
    Overload,
    Underload,
    Off,
    Init,
    Version,
}

impl DisplayStatus {
    const ALL: [DisplayStatus; 5] = [
        DisplayStatus::Overload,
        DisplayStatus::Underload,
        DisplayStatus::Off,
        DisplayStatus::Init,
        DisplayStatus::Version,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            DisplayStatus::Overload => "OVERLOAD",
            DisplayStatus::Underload => "UNDERLOAD",
            DisplayStatus::Off => "OFF",
            DisplayStatus::Init => "INIT",
            DisplayStatus::Version => "VERSION",
        }
    }

    fn signature(&self) -> &'static [u8; SIGNATURE_LEN] {
        match self {
            DisplayStatus::Overload => &OVERLOAD_PATTERN,
            DisplayStatus::Underload => &UNDERLOAD_PATTERN,
            DisplayStatus::Off => &OFF_PATTERN,
            DisplayStatus::Init => &INIT_PATTERN,
            DisplayStatus::Version => &VERSION_PATTERN,
        }
    }

    /// Overload and underload are real readings; the others mean nothing is being measured
    pub fn is_reading(&self) -> bool {
        matches!(self, DisplayStatus::Overload | DisplayStatus::Underload)
    }
}

pub fn match_status(frame: &SegmentFrame) -> Option<DisplayStatus> {
    DisplayStatus::ALL
        .into_iter()
        .find(|status| frame.signature() == status.signature().as_slice())
}

/// Digits recovered from the segment slots
#[derive(Debug)]
struct Reading {
    text: DisplayText,
    value: f64,
    negative: bool,
}

/// Decode a captured segment frame
///
/// Status signatures are checked first. Otherwise the leftmost slot may
/// carry a minus sign, the remaining slots are read left to right against
/// `SEG_PATTERN`, dark slots are skipped as blanks and the single lit
/// decimal point places the separator after its slot's digit. Frames that
/// cannot be read come back with `valid == false`.
pub fn decode(frame: &SegmentFrame) -> DecodeResult {
    let stable = frame.bit(READING_STABLE_BIT);
    let units = read_units(frame);

    if let Some(status) = match_status(frame) {
        return DecodeResult {
            valid: status.is_reading(),
            overload: status == DisplayStatus::Overload,
            underload: status == DisplayStatus::Underload,
            stable,
            negative: false,
            value: None,
            text: DisplayText::new(status.label()).unwrap_or_default(),
            units,
        };
    }

    match decode_digits(frame) {
        Ok(reading) => DecodeResult {
            valid: true,
            overload: false,
            underload: false,
            stable,
            negative: reading.negative,
            value: Some(reading.value),
            text: reading.text,
            units,
        },
        Err(e) => {
            debug!("Discarding frame {:02X?}: {}", frame.signature(), e);
            discarded(stable, units)
        }
    }
}

fn discarded(stable: bool, units: Units) -> DecodeResult {
    DecodeResult {
        valid: false,
        overload: false,
        underload: false,
        stable,
        negative: false,
        value: None,
        text: DisplayText::default(),
        units,
    }
}

fn decode_digits(frame: &SegmentFrame) -> Result<Reading, DecodeError> {
    // The minus sign only ever appears in the leftmost slot
    let negative = DIGITS[0].pattern(frame) == NEGATIVE_SIGN;
    let first_slot = usize::from(negative);

    let mut digits = String::with_capacity(DIGITS.len());
    // (slot, digits emitted before the separator)
    let mut separator: Option<(usize, usize)> = None;

    for (slot, map) in DIGITS.iter().enumerate().skip(first_slot) {
        let pattern = map.pattern(frame);
        if pattern != 0 {
            let digit =
                digit_for_pattern(pattern).ok_or(DecodeError::UnknownSegments { slot, pattern })?;
            digits.push(char::from(b'0' + digit));
        }
        if map.decimal_point(frame) {
            if let Some((first, _)) = separator {
                return Err(DecodeError::MultipleDecimalPoints { first, second: slot });
            }
            separator = Some((slot, digits.len()));
        }
    }

    let mut text = DisplayText::default();
    if negative {
        text.push_str("-")?;
    }
    match separator {
        _ if digits.is_empty() => text.push_str("0")?,
        Some((_, 0)) => {
            text.push_str("0.")?;
            text.push_str(&digits)?;
        }
        Some((_, split)) if split < digits.len() => {
            text.push_str(&digits[..split])?;
            text.push_str(".")?;
            text.push_str(&digits[split..])?;
        }
        _ => text.push_str(&digits)?,
    }

    let value = text
        .as_str()
        .parse::<f64>()
        .map_err(|_| DecodeError::Unparsable(text.to_string()))?;

    Ok(Reading {
        text,
        value,
        negative,
    })
}
