use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};

use crate::models::{SegmentFrame, FRAME_SIZE};

/// Single-slot hand-off between the capture task and the main loop
///
/// The producer only writes while the slot is empty and the consumer only
/// reads while it is full, so the `ready` flag alone orders the byte copies.
/// Neither side ever blocks.
#[derive(Debug)]
pub struct FrameMailbox {
    ready: AtomicBool,
    buffer: [AtomicU8; FRAME_SIZE],
    dropped: AtomicU64,
}

impl Default for FrameMailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameMailbox {
    pub fn new() -> Self {
        FrameMailbox {
            ready: AtomicBool::new(false),
            buffer: std::array::from_fn(|_| AtomicU8::new(0)),
            dropped: AtomicU64::new(0),
        }
    }

    /// Publish a captured frame; returns false (and counts a drop) while the previous one is unread
    pub fn offer(&self, frame: &SegmentFrame) -> bool {
        if self.ready.load(Ordering::Acquire) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        for (slot, byte) in self.buffer.iter().zip(frame.bytes()) {
            slot.store(*byte, Ordering::Relaxed);
        }
        self.ready.store(true, Ordering::Release);
        true
    }

    /// Copy the pending frame out and free the slot
    pub fn take(&self) -> Option<SegmentFrame> {
        if !self.ready.load(Ordering::Acquire) {
            return None;
        }
        let mut bytes = [0u8; FRAME_SIZE];
        for (byte, slot) in bytes.iter_mut().zip(&self.buffer) {
            *byte = slot.load(Ordering::Relaxed);
        }
        self.ready.store(false, Ordering::Release);
        Some(SegmentFrame::new(bytes))
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn frame(fill: u8) -> SegmentFrame {
        SegmentFrame::new([fill; FRAME_SIZE])
    }

    #[test]
    fn test_take_empty() {
        let mailbox = FrameMailbox::new();
        assert!(mailbox.take().is_none());
        assert!(!mailbox.is_ready());
    }

    #[test]
    fn test_offer_then_take() {
        let mailbox = FrameMailbox::new();
        assert!(mailbox.offer(&frame(0x42)));
        assert!(mailbox.is_ready());
        assert_eq!(mailbox.take(), Some(frame(0x42)));
        assert!(mailbox.take().is_none());
    }

    #[test]
    fn test_full_slot_drops_new_frame() {
        let mailbox = FrameMailbox::new();
        assert!(mailbox.offer(&frame(1)));
        assert!(!mailbox.offer(&frame(2)));
        assert_eq!(mailbox.dropped(), 1);
        assert_eq!(mailbox.take(), Some(frame(1)));
        assert!(mailbox.offer(&frame(3)));
        assert_eq!(mailbox.take(), Some(frame(3)));
    }

    #[test]
    fn test_frames_never_tear_across_threads() {
        let mailbox = Arc::new(FrameMailbox::new());
        let producer = {
            let mailbox = Arc::clone(&mailbox);
            std::thread::spawn(move || {
                let mut sent = 0u32;
                for fill in 0..=255u8 {
                    while !mailbox.offer(&frame(fill)) {
                        std::thread::yield_now();
                    }
                    sent += 1;
                }
                sent
            })
        };

        let mut received = 0u32;
        let mut last = None;
        while received < 256 {
            if let Some(frame) = mailbox.take() {
                let first = frame.bytes()[0];
                assert!(frame.bytes().iter().all(|&b| b == first));
                if let Some(previous) = last {
                    assert!(first > previous);
                }
                last = Some(first);
                received += 1;
            } else {
                std::thread::yield_now();
            }
        }
        assert_eq!(producer.join().unwrap(), 256);
    }
}
