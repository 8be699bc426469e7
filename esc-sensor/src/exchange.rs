//! Single-producer/single-consumer hand-off of telemetry frames.
//!
//! [`FrameCell::split`] hands out exactly one [`FrameReader`] and one [`FrameWriter`] per cell.
//! The byte-arrival side holds the writer and appends bytes until a frame is complete. The tick
//! side holds the reader and takes completed frames. The writer never clears the completion flag
//! and the reader never writes the buffer, so neither side needs a lock.

use core::cell::UnsafeCell;
use portable_atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

use crate::frame::{FRAME_LEN, TelemetryFrame};

/// Shared storage for one in-flight frame.
///
/// Meant to live in a `static` so both execution contexts can reach it.
pub struct FrameCell {
    buffer: UnsafeCell<[u8; FRAME_LEN]>,
    /// Set by the writer on the last byte, cleared by the reader.
    complete: AtomicBool,
    /// Written only by the reader. Bytes are discarded while false.
    armed: AtomicBool,
    /// Written only by the reader. The writer restarts assembly whenever it changes.
    epoch: AtomicU8,
    /// Written only by the writer.
    dropped: AtomicU32,
    /// Set once the halves have been handed out.
    taken: AtomicBool,
}

// SAFETY: `split` succeeds once, so there is at most one writer and one reader, neither of them
// `Clone`. The buffer is written by the writer only while `complete` is false and read by the reader
// only while `complete` is true. The Release store that flips `complete` in either direction publishes
// the buffer accesses to the other side's Acquire load.
unsafe impl Sync for FrameCell {}

impl FrameCell {
    pub const fn new() -> Self {
        Self {
            buffer: UnsafeCell::new([0; FRAME_LEN]),
            complete: AtomicBool::new(false),
            armed: AtomicBool::new(false),
            epoch: AtomicU8::new(0),
            dropped: AtomicU32::new(0),
            taken: AtomicBool::new(false),
        }
    }

    /// Splits the cell into its consuming and producing halves.
    ///
    /// Returns [`None`] if the cell was split before. The halves are never given back, so a cell
    /// serves a single sensor for the life of the program.
    pub fn split(&self) -> Option<(FrameReader<'_>, FrameWriter<'_>)> {
        if self.taken.swap(true, Ordering::AcqRel) {
            return None;
        }

        let reader = FrameReader { cell: self };
        let writer = FrameWriter {
            cell: self,
            position: 0,
            epoch: self.epoch.load(Ordering::Acquire),
        };
        Some((reader, writer))
    }
}

impl Default for FrameCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Producing half, fed one byte at a time from the receive path.
pub struct FrameWriter<'a> {
    cell: &'a FrameCell,
    position: usize,
    epoch: u8,
}

impl FrameWriter<'_> {
    /// Appends a received byte to the frame under assembly.
    ///
    /// Bytes are discarded while reception is not armed (ESC boot chatter) and while a completed
    /// frame is still waiting for the reader.
    pub fn push(&mut self, byte: u8) {
        let cell = self.cell;

        let epoch = cell.epoch.load(Ordering::Acquire);
        if epoch != self.epoch {
            self.epoch = epoch;
            self.position = 0;
        }

        if !cell.armed.load(Ordering::Acquire) {
            self.position = 0;
            return;
        }

        if cell.complete.load(Ordering::Acquire) {
            cell.dropped.store(cell.dropped.load(Ordering::Relaxed).wrapping_add(1), Ordering::Relaxed);
            return;
        }

        // SAFETY: `complete` is false, so the reader is not looking at the buffer.
        unsafe {
            (*cell.buffer.get())[self.position] = byte;
        }

        if self.position == FRAME_LEN - 1 {
            self.position = 0;
            cell.complete.store(true, Ordering::Release);
        } else {
            self.position += 1;
        }
    }

    /// Number of bytes already assembled into the current frame.
    pub fn position(&self) -> usize {
        self.position
    }
}

/// Consuming half, driven by the scheduler tick.
pub struct FrameReader<'a> {
    cell: &'a FrameCell,
}

impl FrameReader<'_> {
    /// Takes the completed frame, if there is one, and frees the cell for the next frame.
    ///
    /// Leaves everything untouched when no frame is complete.
    pub fn take(&mut self) -> Option<TelemetryFrame> {
        let cell = self.cell;

        if !cell.complete.load(Ordering::Acquire) {
            return None;
        }

        // SAFETY: `complete` is true, so the writer is not touching the buffer.
        let raw = unsafe { *cell.buffer.get() };
        cell.complete.store(false, Ordering::Release);

        Some(TelemetryFrame::from_bytes(raw))
    }

    /// Starts accepting bytes.
    pub fn arm(&mut self) {
        self.restart();
        self.cell.armed.store(true, Ordering::Release);
    }

    /// Stops accepting bytes and forgets any completed frame.
    pub fn disarm(&mut self) {
        self.cell.armed.store(false, Ordering::Release);
        self.restart();
    }

    /// Drops any unread frame and makes the writer begin the next frame at byte 0.
    pub fn restart(&mut self) {
        let cell = self.cell;
        cell.complete.store(false, Ordering::Release);
        cell.epoch.store(cell.epoch.load(Ordering::Relaxed).wrapping_add(1), Ordering::Release);
    }

    pub fn is_armed(&self) -> bool {
        self.cell.armed.load(Ordering::Acquire)
    }

    /// Bytes discarded because a completed frame had not been taken yet.
    pub fn dropped(&self) -> u32 {
        self.cell.dropped.load(Ordering::Relaxed)
    }
}
