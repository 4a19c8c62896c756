/// Segment frames read from a bus sniffer's text output
///
/// The sniffer (or a replay file) writes one controller transfer per line
/// as hex bytes. Separators may be spaces, commas or colons, `0x`
/// prefixes are accepted, and a line may start with the bus address,
/// either in brackets (`[38] 00 00 00 42 ...`) or as `38: 00 00 00 42 ...`.
/// Transfers for other addresses are ignored. Text after `#` is a comment,
/// and lines that are not valid UTF-8 are skipped like any other bad line.
use futures_util::{stream, Stream, StreamExt};
use log::{debug, info, warn};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::time::{sleep, Duration};

use crate::bus::mailbox::FrameMailbox;
use crate::models::{SegmentFrame, FRAME_SIZE, SIGNATURE_LEN};

/// 7-bit bus address of the PCF8576
pub const SNIFF_ADDR: u8 = 0x38;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameParseError {
    #[error("invalid hex token {0:?}")]
    InvalidHex(String),
    #[error("unterminated address prefix")]
    BadAddress,
    #[error("incomplete frame of {0} bytes")]
    TooShort(usize),
    #[error("frame of {0} bytes exceeds the segment memory")]
    TooLong(usize),
}

/// Parse one capture line; `Ok(None)` for blank, comment or foreign-address lines
pub fn parse_frame_line(line: &str) -> Result<Option<SegmentFrame>, FrameParseError> {
    let mut line = line.split('#').next().unwrap_or_default().trim();
    if line.is_empty() {
        return Ok(None);
    }

    if let (Some(address), rest) = split_address(line)? {
        if address != SNIFF_ADDR {
            return Ok(None);
        }
        line = rest.trim();
    }

    let mut bytes = Vec::with_capacity(FRAME_SIZE);
    for token in line
        .split(|c: char| c.is_whitespace() || c == ',' || c == ':')
        .filter(|token| !token.is_empty())
    {
        let digits = strip_hex_prefix(token);
        if digits.is_empty() || digits.len() % 2 != 0 {
            return Err(FrameParseError::InvalidHex(token.to_string()));
        }
        for pair in digits.as_bytes().chunks(2) {
            let pair = std::str::from_utf8(pair)
                .map_err(|_| FrameParseError::InvalidHex(token.to_string()))?;
            bytes.push(parse_hex_byte(pair)?);
        }
    }

    if bytes.len() < SIGNATURE_LEN {
        return Err(FrameParseError::TooShort(bytes.len()));
    }
    SegmentFrame::from_slice(&bytes)
        .map(Some)
        .ok_or(FrameParseError::TooLong(bytes.len()))
}

/// Split a leading `[AA]` or `AA:` bus address off `line`
fn split_address(line: &str) -> Result<(Option<u8>, &str), FrameParseError> {
    if let Some(rest) = line.strip_prefix('[') {
        let (address, rest) = rest.split_once(']').ok_or(FrameParseError::BadAddress)?;
        return Ok((Some(parse_hex_byte(address.trim())?), rest));
    }

    // `AA:` needs whitespace after the colon; `00:20:02` is a run of bytes
    if let Some((head, rest)) = line.split_once(':') {
        let single_token = !head.contains(|c: char| c.is_whitespace() || c == ',');
        if single_token && (rest.is_empty() || rest.starts_with(char::is_whitespace)) {
            return Ok((Some(parse_hex_byte(head)?), rest));
        }
    }
    Ok((None, line))
}

fn strip_hex_prefix(token: &str) -> &str {
    token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token)
}

fn parse_hex_byte(token: &str) -> Result<u8, FrameParseError> {
    u8::from_str_radix(strip_hex_prefix(token), 16)
        .map_err(|_| FrameParseError::InvalidHex(token.to_string()))
}

/// Stream of frames from a line-oriented capture source; unreadable lines are logged and skipped
pub fn frames<R>(reader: R) -> impl Stream<Item = std::io::Result<SegmentFrame>>
where
    R: AsyncBufRead + Unpin,
{
    stream::unfold(reader.split(b'\n'), |mut lines| async move {
        loop {
            match lines.next_segment().await {
                Ok(Some(raw)) => {
                    let line = String::from_utf8_lossy(&raw);
                    match parse_frame_line(&line) {
                        Ok(Some(frame)) => return Some((Ok(frame), lines)),
                        Ok(None) => continue,
                        Err(e) => warn!("Skipping capture line {:?}: {}", line, e),
                    }
                }
                Ok(None) => return None,
                Err(e) => return Some((Err(e), lines)),
            }
        }
    })
}

/// Feed frames from `path` into `mailbox` until the source ends
///
/// With `replay_interval` set, frames are paced like a live bus instead of
/// being pushed as fast as the file reads.
pub async fn run_capture(
    path: String,
    replay_interval: Option<Duration>,
    mailbox: Arc<FrameMailbox>,
) -> Result<u64, String> {
    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|e| format!("Failed to open capture source {}: {}", path, e))?;
    info!("Capturing display frames from {}", path);

    let frames = frames(BufReader::new(file));
    tokio::pin!(frames);

    let mut captured = 0u64;
    while let Some(frame) = frames.next().await {
        let frame = frame.map_err(|e| format!("Capture read error on {}: {}", path, e))?;
        captured += 1;

        match replay_interval {
            Some(interval) => {
                while mailbox.is_ready() {
                    sleep(Duration::from_millis(1)).await;
                }
                mailbox.offer(&frame);
                sleep(interval).await;
            }
            None => {
                if !mailbox.offer(&frame) {
                    debug!("Main loop busy, frame {} dropped", captured);
                }
            }
        }
    }

    info!("Capture source {} ended after {} frames", path, captured);
    Ok(captured)
}
