/// Static layout of the PCF8576 segment memory as wired to this display
///
/// The display carries eight 7-segment digits, each with its own decimal
/// point, plus a handful of annotation segments (stability marker and unit
/// indicators). The bit indices below were calibrated against captures of
/// the real panel and are addressed through `SegmentFrame::bit`.
use crate::models::{SegmentFrame, Units, SIGNATURE_LEN};

pub const READING_STABLE_BIT: usize = 5;

pub const UNIT_K_BIT: usize = 64;
pub const UNIT_G_BIT: usize = 68;
pub const UNIT_PCS_BIT: usize = 79;
pub const UNIT_PERCENT_BIT: usize = 89;

/// Only segment G lit: a minus sign when it shows up in the leftmost slot
pub const NEGATIVE_SIGN: u8 = 0x40;

/// Segment-on encodings for 0..9, bit 0 = A through bit 6 = G
pub const SEG_PATTERN: [u8; 10] = [
    0x3F, // 0 => A B C D E F
    0x06, // 1 => B C
    0x5B, // 2 => A B D E G
    0x4F, // 3 => A B C D G
    0x66, // 4 => B C F G
    0x6D, // 5 => A C D F G
    0x7D, // 6 => A C D E F G
    0x07, // 7 => A B C
    0x7F, // 8 => all
    0x6F, // 9 => A B C D F G
];

pub const OVERLOAD_PATTERN: [u8; SIGNATURE_LEN] = [
    0x00, 0x00, 0x00, 0x42, 0x00, 0x20, 0x02, 0x00, 0x00, 0x22, 0x00, 0x20, 0x02, 0x00, 0x00, 0x00,
];

pub const UNDERLOAD_PATTERN: [u8; SIGNATURE_LEN] = [
    0x00, 0x00, 0x00, 0x11, 0x00, 0x10, 0x01, 0x00, 0x00, 0x41, 0x00, 0x10, 0x01, 0x00, 0x00, 0x00,
];

/// "OFF" across digits 3..5
pub const OFF_PATTERN: [u8; SIGNATURE_LEN] = [
    0x00, 0x00, 0x00, 0x53, 0x65, 0x60, 0x56, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Every segment lit during the controller's power-on test
pub const INIT_PATTERN: [u8; SIGNATURE_LEN] = [0xFF; SIGNATURE_LEN];

/// Firmware version splash shown after power-on
pub const VERSION_PATTERN: [u8; SIGNATURE_LEN] = [
    0x00, 0x00, 0x07, 0x17, 0x25, 0x74, 0x00, 0x00, 0x00, 0x60, 0x06, 0x44, 0x70, 0x00, 0x00, 0x00,
];

/// Bit indices of one digit slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigitMap {
    /// Segments A, B, C, D, E, F, G in that order
    pub segments: [usize; 7],
    pub dp: usize,
}

impl DigitMap {
    const fn new(a: usize, b: usize, c: usize, d: usize, e: usize, f: usize, g: usize, dp: usize) -> Self {
        DigitMap {
            segments: [a, b, c, d, e, f, g],
            dp,
        }
    }

    /// Lit segments of this slot packed as in `SEG_PATTERN`
    pub fn pattern(&self, frame: &SegmentFrame) -> u8 {
        self.segments
            .iter()
            .enumerate()
            .filter(|&(_, &bit)| frame.bit(bit))
            .fold(0u8, |pattern, (segment, _)| pattern | (1 << segment))
    }

    pub fn decimal_point(&self, frame: &SegmentFrame) -> bool {
        frame.bit(self.dp)
    }
}

/// Digit slots, leftmost first
pub const DIGITS: [DigitMap; 8] = [
    DigitMap::new(1, 13, 14, 0, 4, 6, 2, 12),
    DigitMap::new(21, 17, 18, 20, 8, 10, 22, 16),
    DigitMap::new(25, 37, 38, 24, 28, 30, 26, 36),
    DigitMap::new(45, 41, 42, 44, 32, 34, 46, 40),
    DigitMap::new(49, 105, 106, 48, 52, 54, 50, 104),
    DigitMap::new(97, 101, 102, 96, 108, 110, 98, 100),
    DigitMap::new(93, 81, 82, 92, 88, 90, 94, 80),
    DigitMap::new(73, 77, 78, 72, 84, 86, 74, 76),
];

pub fn digit_for_pattern(pattern: u8) -> Option<u8> {
    SEG_PATTERN
        .iter()
        .position(|&known| known == pattern)
        .map(|digit| digit as u8)
}

pub fn read_units(frame: &SegmentFrame) -> Units {
    Units {
        kilo: frame.bit(UNIT_K_BIT),
        gram: frame.bit(UNIT_G_BIT),
        pieces: frame.bit(UNIT_PCS_BIT),
        percent: frame.bit(UNIT_PERCENT_BIT),
    }
}

/// Build the frame the display would show for `text` (digits right-aligned,
/// minus sign in the leftmost slot)
#[cfg(test)]
pub fn encode_display(text: &str, stable: bool) -> SegmentFrame {
    use crate::models::FRAME_SIZE;

    let mut frame = SegmentFrame::new([0u8; FRAME_SIZE]);
    if stable {
        frame.set_bit(READING_STABLE_BIT);
    }

    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let digits: Vec<u8> = body
        .bytes()
        .filter(u8::is_ascii_digit)
        .map(|c| c - b'0')
        .collect();
    let point = body.find('.');
    assert_ne!(point, Some(0), "leading decimal point is not encodable");

    let first_slot = DIGITS.len() - digits.len();
    if negative {
        assert!(first_slot >= 1, "no room for the minus sign");
        light(&mut frame, &DIGITS[0], NEGATIVE_SIGN);
    }
    for (i, &digit) in digits.iter().enumerate() {
        let map = &DIGITS[first_slot + i];
        light(&mut frame, map, SEG_PATTERN[digit as usize]);
        if point == Some(i + 1) {
            frame.set_bit(map.dp);
        }
    }
    frame
}

#[cfg(test)]
fn light(frame: &mut SegmentFrame, map: &DigitMap, pattern: u8) {
    for (segment, &bit) in map.segments.iter().enumerate() {
        if (pattern >> segment) & 1 == 1 {
            frame.set_bit(bit);
        }
    }
}
