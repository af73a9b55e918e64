// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Bounded byte ring buffer — the producer/consumer hand-off for one sink.
//!
//! The ring stores opaque variable-length records back-to-back in a fixed
//! byte region and hands them out in insertion order. It is **not**
//! internally synchronized: every caller holds the owning sink's mutex
//! (see [`crate::sink::SinkShared`]).
//!
//! Framed use: the producer appends a 13-byte [`crate::frame::FrameHeader`]
//! followed by the payload in one lock acquisition. The consumer extracts
//! with a two-phase peek-then-consume, copying the payload into its own
//! scratch buffer while still under the lock. No pointer into the ring
//! survives past the lock release.

/// Fixed-capacity byte FIFO with wrap-around.
///
/// Invariants: `free_space() + used() == capacity()` at all times; a record
/// is either fully appended or not appended at all (the caller checks
/// `free_space()` for the whole record before the first `append`).
pub struct FrameRing {
    buf: Box<[u8]>,
    /// Read index of the oldest unconsumed byte.
    head: usize,
    /// Number of readable bytes.
    len: usize,
}

impl FrameRing {
    pub fn with_capacity(capacity: usize) -> Self {
        FrameRing {
            buf: vec![0u8; capacity].into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Currently writable bytes.
    pub fn free_space(&self) -> usize {
        self.buf.len() - self.len
    }

    /// Currently readable bytes.
    pub fn used(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy `bytes` at the tail. Returns `false` (writing nothing) if the
    /// free space is insufficient; callers are expected to have checked
    /// `free_space()` for the whole record first.
    pub fn append(&mut self, bytes: &[u8]) -> bool {
        if bytes.len() > self.free_space() {
            return false;
        }
        let cap = self.buf.len();
        let tail = (self.head + self.len) % cap;
        let first = bytes.len().min(cap - tail);
        self.buf[tail..tail + first].copy_from_slice(&bytes[..first]);
        if first < bytes.len() {
            let rest = bytes.len() - first;
            self.buf[..rest].copy_from_slice(&bytes[first..]);
        }
        self.len += bytes.len();
        true
    }

    /// Copy the next `dst.len()` readable bytes into `dst` without
    /// advancing the head. Returns `false` (copying nothing) if fewer
    /// bytes are readable.
    pub fn peek(&self, dst: &mut [u8]) -> bool {
        if dst.len() > self.len {
            return false;
        }
        let cap = self.buf.len();
        let first = dst.len().min(cap - self.head);
        dst[..first].copy_from_slice(&self.buf[self.head..self.head + first]);
        if first < dst.len() {
            let rest = dst.len() - first;
            dst[first..].copy_from_slice(&self.buf[..rest]);
        }
        true
    }

    /// Advance the head past `n` bytes. Returns `false` (consuming
    /// nothing) if fewer than `n` bytes are present.
    pub fn consume(&mut self, n: usize) -> bool {
        if n > self.len {
            return false;
        }
        self.head = (self.head + n) % self.buf.len();
        self.len -= n;
        true
    }

    /// Drop all contents.
    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}
