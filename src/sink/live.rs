// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Live egress sink — publishes the frame stream to a remote RTMP endpoint.
//!
//! The worker reconnects on any transport failure, initial or mid-stream,
//! with exponential backoff. After every (re)connect it discards frames
//! until the next SPS so the remote decoder always receives a decodable
//! prefix.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::config::LiveConfig;
use crate::error::Result;
use crate::frame::NalType;
use crate::sink::{sleep_observing, Egress, SinkShared};

/// Worker parameters, decoupled from the on-disk config so tests can use
/// sub-second values.
#[derive(Debug, Clone)]
pub struct LiveParams {
    pub ring_bytes: usize,
    pub scratch_bytes: usize,
}

impl LiveParams {
    pub fn from_config(cfg: &LiveConfig) -> Self {
        LiveParams {
            ring_bytes: cfg.ring_kb * 1024,
            scratch_bytes: cfg.scratch_kb * 1024,
        }
    }
}

/// Handle to a running live sink. Single-use: once closed it cannot be
/// restarted.
pub struct LiveSink {
    shared: Arc<SinkShared>,
    thread: Option<JoinHandle<()>>,
}

impl LiveSink {
    /// Spawn the consumer thread and return the handle.
    pub fn start<E: Egress + 'static>(params: LiveParams, egress: E) -> Result<LiveSink> {
        let shared = Arc::new(SinkShared::new("live", params.ring_bytes));
        let worker_shared = shared.clone();
        let scratch_bytes = params.scratch_bytes;
        let thread = std::thread::Builder::new()
            .name("live-sink".into())
            .spawn(move || run(worker_shared, egress, scratch_bytes))?;
        Ok(LiveSink {
            shared,
            thread: Some(thread),
        })
    }

    /// Producer-side port for [`crate::dispatch::Dispatcher::attach`].
    pub fn port(&self) -> Arc<SinkShared> {
        self.shared.clone()
    }

    /// Stop the worker and join its thread. Idempotent; leaves the ring
    /// empty.
    pub fn close(&mut self) {
        if let Some(handle) = self.thread.take() {
            self.shared.shutdown();
            if handle.join().is_err() {
                error!("live sink worker panicked");
            }
            self.shared.clear_ring();
            info!("live sink closed");
        }
    }
}

impl Drop for LiveSink {
    fn drop(&mut self) {
        self.close();
    }
}

fn run<E: Egress>(shared: Arc<SinkShared>, mut egress: E, scratch_bytes: usize) {
    let mut scratch = vec![0u8; scratch_bytes];
    let mut online = false;
    let mut wait_sps = true;
    let mut attempt = 0u32;

    while shared.is_running() {
        if !online {
            match egress.open() {
                Ok(()) => {
                    online = true;
                    wait_sps = true;
                    attempt = 0;
                    info!("rtmp egress connected");
                }
                Err(e) => {
                    attempt += 1;
                    let backoff = Duration::from_secs((2u64.pow(attempt.min(6))).min(60));
                    warn!(attempt, ?backoff, error = %e, "rtmp connect failed, will retry");
                    if !sleep_observing(&shared, backoff) {
                        break;
                    }
                    continue;
                }
            }
        }

        let header = match shared.pop_into(&mut scratch) {
            Ok(Some(h)) => h,
            Ok(None) => break,
            Err(e) => {
                error!(error = %e, "live ring corrupted, worker exiting");
                break;
            }
        };

        if header.nal == NalType::Sps {
            wait_sps = false;
        }
        if wait_sps {
            continue;
        }

        let payload = &scratch[..header.len as usize];
        if let Err(e) = egress.write_video_frame(&header, payload) {
            warn!(error = %e, "rtmp connection broke, reconnecting");
            egress.close();
            online = false;
        }
    }

    egress.close();
}
