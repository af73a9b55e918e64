// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Concrete egress implementations behind the [`crate::sink::Egress`]
//! capability: RTMP publishing and MP4 segment files, both as GStreamer
//! pipelines fed through `appsrc`.

pub mod mp4;
pub mod rtmp;

use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;

use crate::error::{NvrError, Result};
use crate::frame::FrameHeader;

/// Build a pipeline from a launch string and hand back the pipeline plus
/// its `appsrc` (named `src`), configured for byte-stream H.264 input.
pub(crate) fn build_appsrc_pipeline(launch: &str) -> Result<(gst::Pipeline, gst_app::AppSrc)> {
    gst::init().map_err(|e| NvrError::Pipeline(format!("gst::init: {e}")))?;

    let pipeline = gst::parse::launch(launch)
        .map_err(|e| NvrError::Pipeline(format!("parse_launch: {e}")))?
        .downcast::<gst::Pipeline>()
        .map_err(|_| NvrError::Pipeline("Not a pipeline".into()))?;

    let appsrc: gst_app::AppSrc = pipeline
        .by_name("src")
        .ok_or_else(|| NvrError::Pipeline("appsrc not found".into()))?
        .downcast::<gst_app::AppSrc>()
        .map_err(|_| NvrError::Pipeline("Cast to AppSrc failed".into()))?;

    let caps = gst::Caps::builder("video/x-h264")
        .field("stream-format", "byte-stream")
        .field("alignment", "nal")
        .build();
    appsrc.set_caps(Some(&caps));
    appsrc.set_format(gst::Format::Time);

    Ok((pipeline, appsrc))
}

/// Push one NAL unit into an `appsrc`, stamping the buffer with the
/// frame's presentation timestamp. A push that fails (pipeline flushing
/// after an error) or a pending error message on the bus surfaces as
/// `EgressWrite`.
pub(crate) fn push_frame(
    pipeline: &gst::Pipeline,
    appsrc: &gst_app::AppSrc,
    header: &FrameHeader,
    payload: &[u8],
) -> Result<()> {
    if let Some(bus) = pipeline.bus() {
        if let Some(msg) = bus.pop_filtered(&[gst::MessageType::Error]) {
            if let gst::MessageView::Error(err) = msg.view() {
                return Err(NvrError::EgressWrite(format!("pipeline: {}", err.error())));
            }
        }
    }

    let mut buffer = gst::Buffer::with_size(payload.len())
        .map_err(|e| NvrError::EgressWrite(format!("alloc buffer: {e}")))?;
    {
        let bufref = buffer
            .get_mut()
            .ok_or_else(|| NvrError::EgressWrite("buffer not writable".into()))?;
        bufref.set_pts(gst::ClockTime::from_mseconds(header.pts_ms));
        let mut map = bufref
            .map_writable()
            .map_err(|e| NvrError::EgressWrite(format!("map buffer: {e}")))?;
        map.as_mut_slice().copy_from_slice(payload);
    }

    appsrc
        .push_buffer(buffer)
        .map(|_| ())
        .map_err(|e| NvrError::EgressWrite(format!("push: {e:?}")))
}

/// Send EOS and tear a pipeline down, giving the muxer a moment to
/// finalize its output (mp4mux writes the moov atom on EOS).
pub(crate) fn drain_and_stop(pipeline: &gst::Pipeline, appsrc: &gst_app::AppSrc) {
    let _ = appsrc.end_of_stream();
    if let Some(bus) = pipeline.bus() {
        let _ = bus.timed_pop_filtered(
            gst::ClockTime::from_seconds(2),
            &[gst::MessageType::Eos, gst::MessageType::Error],
        );
    }
    let _ = pipeline.set_state(gst::State::Null);
}
