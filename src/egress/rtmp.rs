//! RTMP egress — publishes H.264 NAL units to a remote RTMP endpoint via
//! `appsrc → h264parse → flvmux → rtmpsink`.

use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use tracing::info;

use crate::egress::{build_appsrc_pipeline, drain_and_stop, push_frame};
use crate::error::{NvrError, Result};
use crate::frame::FrameHeader;
use crate::sink::Egress;

pub struct RtmpEgress {
    url: String,
    pipeline: Option<(gst::Pipeline, gst_app::AppSrc)>,
}

impl RtmpEgress {
    pub fn new(url: impl Into<String>) -> Self {
        RtmpEgress { url: url.into(), pipeline: None }
    }
}

impl Egress for RtmpEgress {
    fn open(&mut self) -> Result<()> {
        if self.pipeline.is_some() {
            return Err(NvrError::AlreadyInitialized);
        }

        let launch = format!(
            "appsrc name=src is-live=true ! h264parse config-interval=-1 ! \
             flvmux streamable=true ! rtmpsink location=\"{url} live=1\" sync=false",
            url = self.url
        );
        let (pipeline, appsrc) =
            build_appsrc_pipeline(&launch).map_err(|e| NvrError::EgressOpen(e.to_string()))?;

        pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| NvrError::EgressOpen(format!("set_state Playing: {e}")))?;

        info!(url = self.url, "rtmp pipeline started");
        self.pipeline = Some((pipeline, appsrc));
        Ok(())
    }

    fn write_video_frame(&mut self, header: &FrameHeader, payload: &[u8]) -> Result<()> {
        let (pipeline, appsrc) = self
            .pipeline
            .as_ref()
            .ok_or_else(|| NvrError::EgressWrite("egress not open".into()))?;
        push_frame(pipeline, appsrc, header, payload)
    }

    fn close(&mut self) {
        if let Some((pipeline, appsrc)) = self.pipeline.take() {
            drain_and_stop(&pipeline, &appsrc);
            info!(url = self.url, "rtmp pipeline stopped");
        }
    }
}
