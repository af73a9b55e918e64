// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Sink workers — per-sink consumer threads that drain a frame ring into
//! a concrete egress (RTMP connection or MP4 segment file).
//!
//! ```text
//! capture thread ──▶ Dispatcher ──▶ SinkShared(ring+condvar) ──▶ worker thread ──▶ Egress
//! ```
//!
//! Each worker owns its ring, its scratch buffer, and its egress; the only
//! state shared with the producer is [`SinkShared`]. Frames are delivered
//! FIFO per sink, minus drops on ring overflow and drops before the first
//! SPS after each (re)open.

pub mod live;
pub mod record;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use serde::Serialize;

use crate::error::{NvrError, Result};
use crate::frame::{FrameHeader, VideoFrame, HEADER_LEN};
use crate::ring::FrameRing;

/// Poll step for idle waits (motion window, reconnect backoff). Every
/// polled wait observes the `running` flag at least this often.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Capability required of a concrete egress. Configuration (URL, output
/// directory, geometry) is baked into the implementor; `open` may be
/// called again after `close` to start a new connection or segment file.
pub trait Egress: Send {
    fn open(&mut self) -> Result<()>;
    fn write_video_frame(&mut self, header: &FrameHeader, payload: &[u8]) -> Result<()>;
    fn close(&mut self);
}

/// Counters snapshot for the status surface.
#[derive(Debug, Clone, Serialize)]
pub struct SinkStats {
    pub label: String,
    /// Frames accepted into the ring.
    pub submitted: u64,
    /// Frames dropped on ring overflow.
    pub dropped: u64,
    /// Bytes currently buffered in the ring.
    pub pending_bytes: usize,
}

/// Producer/consumer rendezvous for one sink: the frame ring, its mutex
/// and condition variable, the `running` flag, and the overflow counters.
///
/// The producer side ([`crate::dispatch::Dispatcher`]) appends under the
/// mutex and notifies; the consumer side (the worker thread) peeks and
/// consumes under the same mutex, waiting on the condition variable when
/// the ring is empty.
pub struct SinkShared {
    label: String,
    ring: Mutex<FrameRing>,
    cond: Condvar,
    running: AtomicBool,
    submitted: AtomicU64,
    dropped: AtomicU64,
}

impl SinkShared {
    pub fn new(label: impl Into<String>, ring_bytes: usize) -> Self {
        SinkShared {
            label: label.into(),
            ring: Mutex::new(FrameRing::with_capacity(ring_bytes)),
            cond: Condvar::new(),
            running: AtomicBool::new(true),
            submitted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Producer side: copy one frame (descriptor + payload) into the ring
    /// and wake the worker. The frame is silently dropped when the ring
    /// lacks space for the whole record; a real-time stream must never
    /// back-pressure the capture pipeline, and the worker resynchronizes
    /// at the next SPS anyway.
    pub fn submit(&self, frame: &VideoFrame<'_>) -> bool {
        if !self.is_running() {
            return false;
        }
        let mut ring = self.ring.lock();
        if ring.free_space() < HEADER_LEN + frame.payload.len() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        ring.append(&frame.header().encode());
        ring.append(frame.payload);
        self.cond.notify_one();
        self.submitted.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Consumer side: block until a frame is available or the sink is shut
    /// down. On success the payload has been copied into `scratch` and the
    /// record fully consumed; the lock is held only for the peeks and the
    /// memcpy, never across egress I/O.
    ///
    /// Returns `Ok(None)` when `running` was cleared. A header peek that
    /// is not followed by a complete payload means the ring was corrupted
    /// (appends are atomic, so this cannot happen short of a bug) and is
    /// reported as fatal.
    pub(crate) fn pop_into(&self, scratch: &mut [u8]) -> Result<Option<FrameHeader>> {
        let mut ring = self.ring.lock();
        loop {
            if !self.is_running() {
                return Ok(None);
            }
            let mut hdr_buf = [0u8; HEADER_LEN];
            if ring.peek(&mut hdr_buf) {
                let header = FrameHeader::decode(&hdr_buf);
                let len = header.len as usize;
                if len > scratch.len() {
                    return Err(NvrError::RingConsume(format!(
                        "payload of {len} bytes exceeds scratch capacity {}",
                        scratch.len()
                    )));
                }
                if !ring.consume(HEADER_LEN) {
                    return Err(NvrError::RingConsume("descriptor vanished under lock".into()));
                }
                if !ring.peek(&mut scratch[..len]) {
                    return Err(NvrError::RingConsume(format!(
                        "payload short: want {len}, have {}",
                        ring.used()
                    )));
                }
                if !ring.consume(len) {
                    return Err(NvrError::RingConsume("payload vanished under lock".into()));
                }
                return Ok(Some(header));
            }
            self.cond.wait(&mut ring);
        }
    }

    /// Flush all buffered frames. Called by the MP4 worker on each segment
    /// open to discard stale frames from the previous segment.
    pub(crate) fn clear_ring(&self) {
        self.ring.lock().clear();
    }

    /// Clear `running` and wake the worker. Notifying while holding the
    /// ring mutex closes the race against a worker that has just checked
    /// the flag and is about to wait.
    pub(crate) fn shutdown(&self) {
        self.running.store(false, Ordering::Release);
        let _ring = self.ring.lock();
        self.cond.notify_all();
    }

    pub fn pending_bytes(&self) -> usize {
        self.ring.lock().used()
    }

    pub fn stats(&self) -> SinkStats {
        SinkStats {
            label: self.label.clone(),
            submitted: self.submitted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            pending_bytes: self.pending_bytes(),
        }
    }
}

/// Sleep for `total`, waking every [`POLL_INTERVAL`] to observe the
/// `running` flag. Returns `false` when the sink was shut down mid-wait.
pub(crate) fn sleep_observing(shared: &SinkShared, total: Duration) -> bool {
    let mut remaining = total;
    while shared.is_running() && remaining > Duration::ZERO {
        let step = remaining.min(POLL_INTERVAL);
        std::thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
    shared.is_running()
}
