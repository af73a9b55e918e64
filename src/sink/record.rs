// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Recording sink — writes the frame stream into time-segmented MP4 files,
//! optionally gated by motion triggers.
//!
//! Each segment runs at most `segment` of wall clock; rollover is a muxer
//! close + reopen, and the SPS-gate re-arms so every file starts with a
//! decodable prefix. When motion gating is on, the worker stays idle until
//! a trigger opens the activity window and goes back to idle once the
//! window lapses; frames arriving while idle are left to overflow in the
//! ring, which is fine because nobody wants them recorded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::clock;
use crate::config::RecordConfig;
use crate::error::Result;
use crate::frame::NalType;
use crate::sink::{Egress, SinkShared, POLL_INTERVAL};

/// Worker parameters, decoupled from the on-disk config so tests can use
/// sub-second values.
#[derive(Debug, Clone)]
pub struct RecordParams {
    /// Maximum wall-clock span of one segment file.
    pub segment: Duration,
    /// Record only inside motion-triggered activity windows.
    pub use_md: bool,
    /// Activity window extension granted by each motion trigger.
    pub md_window: Duration,
    pub ring_bytes: usize,
    pub scratch_bytes: usize,
}

impl RecordParams {
    pub fn from_config(cfg: &RecordConfig) -> Self {
        RecordParams {
            segment: Duration::from_secs(cfg.segment_secs),
            use_md: cfg.use_md,
            md_window: Duration::from_secs(cfg.md_secs),
            ring_bytes: cfg.ring_kb * 1024,
            scratch_bytes: cfg.scratch_kb * 1024,
        }
    }
}

/// Motion-triggered activity window, shared between the worker thread and
/// whoever delivers triggers (HTTP surface, external detector).
///
/// When gating is off the window is permanently open and triggers are
/// accepted but irrelevant.
pub struct MotionGate {
    gated: bool,
    window_ms: u64,
    /// Monotonic ms until which recording remains active.
    active_until: AtomicU64,
}

impl MotionGate {
    fn new(gated: bool, window: Duration) -> Self {
        MotionGate {
            gated,
            window_ms: window.as_millis() as u64,
            active_until: AtomicU64::new(0),
        }
    }

    /// Extend the activity window to `now + md_window`. The zone argument
    /// is reserved for per-zone policies and currently unused.
    pub fn on_trigger(&self, zone: i32) {
        let until = clock::monotonic_ms() + self.window_ms;
        self.active_until.store(until, Ordering::Release);
        debug!(zone, until, "motion trigger");
    }

    fn is_open(&self) -> bool {
        !self.gated || clock::monotonic_ms() < self.active_until.load(Ordering::Acquire)
    }
}

/// Handle to a running recording sink. Single-use.
pub struct RecordSink {
    shared: Arc<SinkShared>,
    gate: Arc<MotionGate>,
    thread: Option<JoinHandle<()>>,
}

impl RecordSink {
    /// Spawn the consumer thread and return the handle.
    pub fn start<E: Egress + 'static>(params: RecordParams, egress: E) -> Result<RecordSink> {
        let shared = Arc::new(SinkShared::new("record", params.ring_bytes));
        let gate = Arc::new(MotionGate::new(params.use_md, params.md_window));
        let worker_shared = shared.clone();
        let worker_gate = gate.clone();
        let thread = std::thread::Builder::new()
            .name("record-sink".into())
            .spawn(move || run(worker_shared, worker_gate, egress, params))?;
        Ok(RecordSink {
            shared,
            gate,
            thread: Some(thread),
        })
    }

    /// Producer-side port for [`crate::dispatch::Dispatcher::attach`].
    pub fn port(&self) -> Arc<SinkShared> {
        self.shared.clone()
    }

    /// Trigger endpoint shared with the motion-detection collaborator.
    pub fn gate(&self) -> Arc<MotionGate> {
        self.gate.clone()
    }

    /// Stop the worker and join its thread. Idempotent; leaves the ring
    /// empty. Safe to call on a worker that already exited on a fatal
    /// egress error.
    pub fn close(&mut self) {
        if let Some(handle) = self.thread.take() {
            self.shared.shutdown();
            if handle.join().is_err() {
                error!("record sink worker panicked");
            }
            self.shared.clear_ring();
            info!("record sink closed");
        }
    }
}

impl Drop for RecordSink {
    fn drop(&mut self) {
        self.close();
    }
}

fn run<E: Egress>(
    shared: Arc<SinkShared>,
    gate: Arc<MotionGate>,
    mut egress: E,
    params: RecordParams,
) {
    let mut scratch = vec![0u8; params.scratch_bytes];
    let segment_ms = params.segment.as_millis() as u64;
    let mut online = false;
    let mut wait_sps = true;
    let mut segment_start = 0u64;

    // Wait until the activity window first opens.
    while shared.is_running() && !gate.is_open() {
        std::thread::sleep(POLL_INTERVAL);
    }

    while shared.is_running() {
        if !online {
            if let Err(e) = egress.open() {
                error!(error = %e, "mp4 segment open failed, worker exiting");
                break;
            }
            // Stale frames belong to the previous segment.
            shared.clear_ring();
            segment_start = clock::monotonic_ms();
            wait_sps = true;
            online = true;
        }

        let header = match shared.pop_into(&mut scratch) {
            Ok(Some(h)) => h,
            Ok(None) => break,
            Err(e) => {
                error!(error = %e, "record ring corrupted, worker exiting");
                break;
            }
        };

        if header.nal == NalType::Sps {
            wait_sps = false;
        }
        if !wait_sps {
            let payload = &scratch[..header.len as usize];
            if let Err(e) = egress.write_video_frame(&header, payload) {
                error!(error = %e, "mp4 write failed, worker exiting");
                break;
            }
        }

        if !gate.is_open() {
            egress.close();
            online = false;
            info!("motion window lapsed, recording paused");
            while shared.is_running() && !gate.is_open() {
                std::thread::sleep(POLL_INTERVAL);
            }
        } else if clock::monotonic_ms() - segment_start >= segment_ms {
            egress.close();
            online = false;
            debug!("segment rollover");
        }
    }

    egress.close();
}
