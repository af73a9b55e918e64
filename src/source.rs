//! Camera frame source using GStreamer.
//!
//! The source runs a pipeline:
//!   rtspsrc → rtph264depay → h264parse → appsink (NAL-aligned byte-stream)
//!
//! The `appsink` callback classifies each NAL unit and hands it straight
//! to the [`Dispatcher`] on the streaming thread; the dispatcher copies it
//! into each sink's ring before the callback returns, so the source never
//! blocks on a slow sink. A supervisor thread watches the pipeline bus and
//! reconnects with exponential backoff on error or EOS.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use tracing::{error, info, warn};

use crate::clock;
use crate::config::SourceConfig;
use crate::dispatch::Dispatcher;
use crate::error::{NvrError, Result};
use crate::frame::{NalType, VideoFrame};

/// Handle to the running capture supervisor.
pub struct FrameSource {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl FrameSource {
    /// Spawn the supervisor thread. Frames flow into `dispatcher` until
    /// [`FrameSource::stop`] is called.
    pub fn spawn(config: SourceConfig, dispatcher: Arc<Dispatcher>) -> Result<FrameSource> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let thread = std::thread::Builder::new()
            .name("frame-source".into())
            .spawn(move || supervise(config, dispatcher, flag))?;
        Ok(FrameSource { stop, thread: Some(thread) })
    }

    /// Tear the pipeline down and join the supervisor. Idempotent.
    pub fn stop(&mut self) {
        if let Some(handle) = self.thread.take() {
            self.stop.store(true, Ordering::Release);
            if handle.join().is_err() {
                error!("frame source thread panicked");
            }
            info!("frame source stopped");
        }
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Keep the camera connected, reconnecting on failure with exponential
/// backoff (reset after each successful connection).
fn supervise(config: SourceConfig, dispatcher: Arc<Dispatcher>, stop: Arc<AtomicBool>) {
    let max_attempts = if config.max_reconnect_attempts == 0 {
        u32::MAX
    } else {
        config.max_reconnect_attempts
    };

    let mut attempt = 0u32;
    while !stop.load(Ordering::Acquire) {
        if attempt >= max_attempts {
            error!(url = config.url, "Max reconnect attempts reached, giving up");
            break;
        }

        match connect(&config, &dispatcher) {
            Ok(pipeline) => {
                attempt = 0;
                watch(&pipeline, &stop);
                let _ = pipeline.set_state(gst::State::Null);
                if stop.load(Ordering::Acquire) {
                    break;
                }
                warn!(url = config.url, "stream ended, waiting for reconnect");
            }
            Err(e) => {
                attempt += 1;
                let backoff = Duration::from_secs((2u64.pow(attempt.min(6))).min(60));
                warn!(url = config.url, attempt, ?backoff, error = %e, "Connection failed, will retry");
                sleep_observing(&stop, backoff);
            }
        }
    }
}

/// Build and start the capture pipeline. The appsink callback is the
/// single producer of the dispatch fabric.
fn connect(config: &SourceConfig, dispatcher: &Arc<Dispatcher>) -> Result<gst::Pipeline> {
    gst::init().map_err(|e| NvrError::Pipeline(format!("gst::init: {e}")))?;

    let pipeline_str = format!(
        "rtspsrc location={url} latency=200 protocols=tcp ! \
         rtph264depay ! h264parse config-interval=-1 ! \
         video/x-h264,stream-format=byte-stream,alignment=nal ! \
         appsink name=sink emit-signals=true max-buffers=64 drop=true sync=false",
        url = config.url
    );

    let pipeline = gst::parse::launch(&pipeline_str)
        .map_err(|e| NvrError::Pipeline(format!("parse_launch: {e}")))?
        .downcast::<gst::Pipeline>()
        .map_err(|_| NvrError::Pipeline("Not a pipeline".into()))?;

    let appsink: gst_app::AppSink = pipeline
        .by_name("sink")
        .ok_or_else(|| NvrError::Pipeline("appsink not found".into()))?
        .downcast::<gst_app::AppSink>()
        .map_err(|_| NvrError::Pipeline("Cast to AppSink failed".into()))?;

    let fanout = dispatcher.clone();
    appsink.set_callbacks(
        gst_app::AppSinkCallbacks::builder()
            .new_sample(move |sink| {
                let sample = sink.pull_sample().map_err(|_| gst::FlowError::Error)?;
                let buf = sample.buffer().ok_or(gst::FlowError::Error)?;
                let map = buf.map_readable().map_err(|_| gst::FlowError::Error)?;
                let data = map.as_slice();
                let pts_ms = buf
                    .pts()
                    .map(|t| t.mseconds())
                    .unwrap_or_else(clock::monotonic_ms);
                let frame = VideoFrame {
                    nal: NalType::detect(data),
                    pts_ms,
                    payload: data,
                };
                fanout.on_frame(&frame);
                Ok(gst::FlowSuccess::Ok)
            })
            .build(),
    );

    pipeline
        .set_state(gst::State::Playing)
        .map_err(|e| NvrError::Pipeline(format!("set_state Playing: {e}")))?;

    info!(url = config.url, "capture pipeline started");
    Ok(pipeline)
}

/// Block on the pipeline bus until an error, EOS, or shutdown.
fn watch(pipeline: &gst::Pipeline, stop: &Arc<AtomicBool>) {
    let Some(bus) = pipeline.bus() else {
        error!("pipeline has no bus");
        return;
    };
    while !stop.load(Ordering::Acquire) {
        let msg = bus.timed_pop_filtered(
            gst::ClockTime::from_mseconds(500),
            &[gst::MessageType::Error, gst::MessageType::Eos],
        );
        match msg.as_ref().map(|m| m.view()) {
            Some(gst::MessageView::Error(err)) => {
                warn!(error = %err.error(), debug = ?err.debug(), "pipeline error");
                return;
            }
            Some(gst::MessageView::Eos(_)) => {
                info!("pipeline EOS");
                return;
            }
            _ => {}
        }
    }
}

fn sleep_observing(stop: &Arc<AtomicBool>, total: Duration) {
    let step = Duration::from_millis(500);
    let mut remaining = total;
    while !stop.load(Ordering::Acquire) && remaining > Duration::ZERO {
        let s = remaining.min(step);
        std::thread::sleep(s);
        remaining = remaining.saturating_sub(s);
    }
}
