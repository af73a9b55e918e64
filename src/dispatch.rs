// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Frame dispatcher — the producer-side facade.
//!
//! The capture source calls [`Dispatcher::on_frame`] once per NAL unit on
//! its own thread; the dispatcher copies the frame into every attached
//! sink's ring. Sinks are strictly independent: a slow or closed sink
//! drops frames on its own ring and never blocks its peers.

use std::sync::Arc;

use crate::frame::VideoFrame;
use crate::sink::{SinkShared, SinkStats};

#[derive(Default)]
pub struct Dispatcher {
    sinks: Vec<Arc<SinkShared>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sink's producer-side port. Called once per sink during
    /// wiring, before frames start flowing.
    pub fn attach(&mut self, port: Arc<SinkShared>) {
        self.sinks.push(port);
    }

    /// Fan one frame out to every attached sink. Each sink takes its ring
    /// mutex only for the free-space check and two appends; overflow is a
    /// silent per-sink drop.
    pub fn on_frame(&self, frame: &VideoFrame<'_>) {
        for sink in &self.sinks {
            sink.submit(frame);
        }
    }

    /// Counters snapshot for the status surface.
    pub fn stats(&self) -> Vec<SinkStats> {
        self.sinks.iter().map(|s| s.stats()).collect()
    }
}
