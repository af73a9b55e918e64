//! MP4 egress — writes H.264 NAL units into a segment file via
//! `appsrc → h264parse → mp4mux → filesink`.
//!
//! Every `open` composes a fresh date-stamped path under the configured
//! root, creating the per-day directory on demand:
//!
//! ```text
//! <root>/<YYYY-MM-DD>/record_<YYYY-MM-DD_HH-MM-SS>.mp4
//! ```

use std::path::{Path, PathBuf};

use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use tracing::info;

use crate::clock;
use crate::config::RecordConfig;
use crate::egress::{build_appsrc_pipeline, drain_and_stop, push_frame};
use crate::error::{NvrError, Result};
use crate::frame::FrameHeader;
use crate::sink::Egress;

pub struct Mp4Egress {
    root: PathBuf,
    width: u32,
    height: u32,
    frame_rate: u32,
    pipeline: Option<(gst::Pipeline, gst_app::AppSrc)>,
    current_path: Option<PathBuf>,
}

impl Mp4Egress {
    pub fn new(cfg: &RecordConfig) -> Self {
        Mp4Egress {
            root: cfg.path.clone(),
            width: cfg.width,
            height: cfg.height,
            frame_rate: cfg.frame_rate,
            pipeline: None,
            current_path: None,
        }
    }

    /// Compose the next segment path and create its per-day directory.
    /// Directory creation succeeds if the directory already exists.
    pub fn next_segment_path(root: &Path) -> Result<PathBuf> {
        let dir = root.join(clock::local_date());
        std::fs::create_dir_all(&dir)?;
        Ok(dir.join(format!("record_{}.mp4", clock::local_stamp())))
    }
}

impl Egress for Mp4Egress {
    fn open(&mut self) -> Result<()> {
        if self.pipeline.is_some() {
            return Err(NvrError::AlreadyInitialized);
        }

        let path = Self::next_segment_path(&self.root)?;
        let launch = format!(
            "appsrc name=src ! h264parse ! \
             video/x-h264,width={w},height={h},framerate={fps}/1 ! \
             mp4mux ! filesink location=\"{loc}\"",
            w = self.width,
            h = self.height,
            fps = self.frame_rate,
            loc = path.display()
        );
        let (pipeline, appsrc) =
            build_appsrc_pipeline(&launch).map_err(|e| NvrError::EgressOpen(e.to_string()))?;

        pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| NvrError::EgressOpen(format!("set_state Playing: {e}")))?;

        info!(path = %path.display(), "mp4 segment opened");
        self.pipeline = Some((pipeline, appsrc));
        self.current_path = Some(path);
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
            if let Some(path) = self.current_path.take() {
                info!(path = %path.display(), "mp4 segment finalized");
            }
        }
    }
}
