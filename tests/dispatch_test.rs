// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! End-to-end dispatch tests: SPS-gating, reconnect, segmentation, motion
//! gating, overflow, and shutdown, driven through mock egresses.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use nvr_core::dispatch::Dispatcher;
use nvr_core::egress::mp4::Mp4Egress;
use nvr_core::error::NvrError;
use nvr_core::frame::{FrameHeader, NalType, VideoFrame, HEADER_LEN};
use nvr_core::sink::live::{LiveParams, LiveSink};
use nvr_core::sink::record::{RecordParams, RecordSink};
use nvr_core::sink::{Egress, SinkShared};

// ─────────────────────────── mock egress ─────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Open,
    Write(NalType),
    WriteFail,
    Close,
}

type Log = Arc<Mutex<Vec<(Event, Instant)>>>;

struct MockEgress {
    log: Log,
    writes: usize,
    /// 1-based write attempt that fails (once).
    fail_write_at: Option<usize>,
}

impl MockEgress {
    fn new(log: &Log) -> Self {
        MockEgress { log: log.clone(), writes: 0, fail_write_at: None }
    }

    fn failing_at(log: &Log, attempt: usize) -> Self {
        MockEgress { log: log.clone(), writes: 0, fail_write_at: Some(attempt) }
    }
}

impl Egress for MockEgress {
    fn open(&mut self) -> nvr_core::error::Result<()> {
        self.log.lock().push((Event::Open, Instant::now()));
        Ok(())
    }

    fn write_video_frame(
        &mut self,
        header: &FrameHeader,
        _payload: &[u8],
    ) -> nvr_core::error::Result<()> {
        self.writes += 1;
        if self.fail_write_at == Some(self.writes) {
            self.log.lock().push((Event::WriteFail, Instant::now()));
            return Err(NvrError::EgressWrite("scripted failure".into()));
        }
        self.log.lock().push((Event::Write(header.nal), Instant::now()));
        Ok(())
    }

    fn close(&mut self) {
        self.log.lock().push((Event::Close, Instant::now()));
    }
}

fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn events(log: &Log) -> Vec<Event> {
    log.lock().iter().map(|(e, _)| e.clone()).collect()
}

fn submit(dispatcher: &Dispatcher, nal: NalType, pts_ms: u64) {
    let payload = [0x42u8; 64];
    dispatcher.on_frame(&VideoFrame { nal, pts_ms, payload: &payload });
}

fn wait_for(pred: impl Fn() -> bool, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if pred() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    pred()
}

fn live_params() -> LiveParams {
    LiveParams { ring_bytes: 64 * 1024, scratch_bytes: 64 * 1024 }
}

fn record_params(segment: Duration, use_md: bool, md_window: Duration) -> RecordParams {
    RecordParams {
        segment,
        use_md,
        md_window,
        ring_bytes: 64 * 1024,
        scratch_bytes: 64 * 1024,
    }
}

// ─────────────────────────── live sink ───────────────────────────────────

#[test]
fn test_live_happy_path() {
    let log = new_log();
    let mut sink = LiveSink::start(live_params(), MockEgress::new(&log)).expect("start");
    let mut dispatcher = Dispatcher::new();
    dispatcher.attach(sink.port());

    for (i, nal) in [NalType::Sps, NalType::Pps, NalType::Idr, NalType::NonIdr, NalType::NonIdr]
        .into_iter()
        .enumerate()
    {
        submit(&dispatcher, nal, i as u64);
    }

    assert!(wait_for(
        || events(&log).iter().filter(|e| matches!(e, Event::Write(_))).count() == 5,
        Duration::from_secs(2)
    ));
    sink.close();

    assert_eq!(
        events(&log),
        vec![
            Event::Open,
            Event::Write(NalType::Sps),
            Event::Write(NalType::Pps),
            Event::Write(NalType::Idr),
            Event::Write(NalType::NonIdr),
            Event::Write(NalType::NonIdr),
            Event::Close,
        ]
    );
}

#[test]
fn test_live_drops_until_first_sps() {
    let log = new_log();
    let mut sink = LiveSink::start(live_params(), MockEgress::new(&log)).expect("start");
    let mut dispatcher = Dispatcher::new();
    dispatcher.attach(sink.port());

    for (i, nal) in [NalType::NonIdr, NalType::NonIdr, NalType::Sps, NalType::Idr, NalType::NonIdr]
        .into_iter()
        .enumerate()
    {
        submit(&dispatcher, nal, i as u64);
    }

    assert!(wait_for(
        || events(&log).iter().filter(|e| matches!(e, Event::Write(_))).count() == 3,
        Duration::from_secs(2)
    ));
    sink.close();

    let writes: Vec<Event> =
        events(&log).into_iter().filter(|e| matches!(e, Event::Write(_))).collect();
    assert_eq!(
        writes,
        vec![
            Event::Write(NalType::Sps),
            Event::Write(NalType::Idr),
            Event::Write(NalType::NonIdr),
        ]
    );
}

#[test]
fn test_live_reconnects_after_write_failure() {
    let log = new_log();
    // The 3rd write attempt fails once; the worker must close and re-open.
    let mut sink = LiveSink::start(live_params(), MockEgress::failing_at(&log, 3)).expect("start");
    let mut dispatcher = Dispatcher::new();
    dispatcher.attach(sink.port());

    submit(&dispatcher, NalType::Sps, 0);
    submit(&dispatcher, NalType::Idr, 1);
    submit(&dispatcher, NalType::NonIdr, 2);

    // Wait for the failure, the close, and the reconnect.
    assert!(wait_for(
        || events(&log).iter().filter(|e| **e == Event::Open).count() == 2,
        Duration::from_secs(2)
    ));

    // The new session is SPS-gated again: a non-SPS frame is discarded.
    submit(&dispatcher, NalType::NonIdr, 3);
    submit(&dispatcher, NalType::Sps, 4);
    submit(&dispatcher, NalType::NonIdr, 5);

    assert!(wait_for(
        || events(&log).iter().filter(|e| matches!(e, Event::Write(_))).count() == 4,
        Duration::from_secs(2)
    ));
    sink.close();

    assert_eq!(
        events(&log),
        vec![
            Event::Open,
            Event::Write(NalType::Sps),
            Event::Write(NalType::Idr),
            Event::WriteFail,
            Event::Close,
            Event::Open,
            Event::Write(NalType::Sps),
            Event::Write(NalType::NonIdr),
            Event::Close,
        ]
    );
}

#[test]
fn test_live_close_is_idempotent_and_wakes_waiter() {
    let log = new_log();
    let mut sink = LiveSink::start(live_params(), MockEgress::new(&log)).expect("start");
    let port = sink.port();

    assert!(wait_for(|| events(&log).contains(&Event::Open), Duration::from_secs(2)));

    // The worker is parked on the condition variable; close must wake it.
    sink.close();
    sink.close();

    assert_eq!(events(&log), vec![Event::Open, Event::Close]);
    assert_eq!(port.pending_bytes(), 0);

    // A closed sink refuses new frames.
    let payload = [0u8; 8];
    assert!(!port.submit(&VideoFrame { nal: NalType::Sps, pts_ms: 0, payload: &payload }));
}

// ─────────────────────────── record sink ─────────────────────────────────

#[test]
fn test_record_segments_roll_over() {
    let log = new_log();
    let segment = Duration::from_millis(300);
    let mut sink = RecordSink::start(
        record_params(segment, false, Duration::from_secs(1)),
        MockEgress::new(&log),
    )
    .expect("start");
    let mut dispatcher = Dispatcher::new();
    dispatcher.attach(sink.port());

    // Feed SPS-led bursts for ~1.2 s; every segment can re-synchronize.
    let feed_start = Instant::now();
    let mut pts = 0u64;
    while feed_start.elapsed() < Duration::from_millis(1200) {
        submit(&dispatcher, NalType::Sps, pts);
        submit(&dispatcher, NalType::NonIdr, pts + 1);
        pts += 2;
        std::thread::sleep(Duration::from_millis(50));
    }
    sink.close();

    let evs = events(&log);
    let opens = evs.iter().filter(|e| **e == Event::Open).count();
    assert!(opens >= 2, "expected at least one rollover, got {opens} opens: {evs:?}");

    // Every segment starts with an SPS.
    for (i, e) in evs.iter().enumerate() {
        if *e == Event::Open {
            let first_write = evs[i..].iter().find(|e| matches!(e, Event::Write(_)));
            if let Some(Event::Write(nal)) = first_write {
                assert_eq!(*nal, NalType::Sps, "segment after open {i} starts with {nal:?}");
            }
        }
    }

    // No segment spans much more than the configured duration.
    let log_guard = log.lock();
    let mut segment_start: Option<Instant> = None;
    for (e, t) in log_guard.iter() {
        match e {
            Event::Open => segment_start = Some(*t),
            Event::Write(_) => {
                if let Some(start) = segment_start {
                    let span = t.duration_since(start);
                    assert!(
                        span < segment + Duration::from_millis(250),
                        "write {span:?} after segment open"
                    );
                }
            }
            _ => {}
        }
    }
}

#[test]
fn test_record_motion_gate() {
    let log = new_log();
    let mut sink = RecordSink::start(
        record_params(Duration::from_secs(30), true, Duration::from_millis(1000)),
        MockEgress::new(&log),
    )
    .expect("start");
    let gate = sink.gate();
    let mut dispatcher = Dispatcher::new();
    dispatcher.attach(sink.port());

    // Without a trigger nothing opens.
    for i in 0..5u64 {
        submit(&dispatcher, NalType::Sps, i);
        std::thread::sleep(Duration::from_millis(60));
    }
    assert!(!events(&log).contains(&Event::Open), "opened without motion");

    // Trigger opens the window; frames inside it are recorded.
    gate.on_trigger(0);
    let trigger_time = Instant::now();
    let mut pts = 100u64;
    while trigger_time.elapsed() < Duration::from_millis(2200) {
        submit(&dispatcher, NalType::Sps, pts);
        submit(&dispatcher, NalType::NonIdr, pts + 1);
        pts += 2;
        std::thread::sleep(Duration::from_millis(50));
    }

    // The window lapsed 1 s after the trigger; the muxer must have closed
    // and must not reopen without a fresh trigger.
    assert!(wait_for(|| events(&log).contains(&Event::Close), Duration::from_secs(1)));
    let evs = events(&log);
    assert_eq!(evs.iter().filter(|e| **e == Event::Open).count(), 1, "{evs:?}");
    assert!(evs.iter().any(|e| matches!(e, Event::Write(_))), "no frames recorded: {evs:?}");

    sink.close();
}

#[test]
fn test_record_close_leaves_ring_empty() {
    let log = new_log();
    // Gated and never triggered: the worker idles and drains nothing.
    let mut sink = RecordSink::start(
        record_params(Duration::from_secs(30), true, Duration::from_secs(30)),
        MockEgress::new(&log),
    )
    .expect("start");
    let port = sink.port();
    let mut dispatcher = Dispatcher::new();
    dispatcher.attach(port.clone());

    for i in 0..3u64 {
        submit(&dispatcher, NalType::NonIdr, i);
    }
    assert!(port.pending_bytes() > 0);

    sink.close();
    assert_eq!(port.pending_bytes(), 0);
    assert!(!events(&log).contains(&Event::Open));
}

// ─────────────────────────── overflow ────────────────────────────────────

#[test]
fn test_overflow_drops_silently() {
    // Room for exactly two frames; the consumer never drains.
    let payload_len = 100usize;
    let record_len = HEADER_LEN + payload_len;
    let port = Arc::new(SinkShared::new("test", 2 * record_len));
    let mut dispatcher = Dispatcher::new();
    dispatcher.attach(port.clone());

    let payload = vec![0xCDu8; payload_len];
    for i in 0..5u64 {
        dispatcher.on_frame(&VideoFrame { nal: NalType::NonIdr, pts_ms: i, payload: &payload });
    }

    let stats = port.stats();
    assert_eq!(stats.submitted, 2);
    assert_eq!(stats.dropped, 3);
    assert_eq!(stats.pending_bytes, 2 * record_len);
}

// ─────────────────────────── mp4 path layout ─────────────────────────────

#[test]
fn test_segment_path_layout() {
    let dir = tempfile::tempdir().expect("tempdir");

    let first = Mp4Egress::next_segment_path(dir.path()).expect("path");
    let day_dir = first.parent().expect("day dir");
    assert!(day_dir.exists(), "date directory must be created on demand");
    assert_eq!(day_dir.parent().unwrap(), dir.path());

    let name = first.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("record_"), "unexpected name {name}");
    assert!(name.ends_with(".mp4"), "unexpected name {name}");

    // Opening again the same day reuses the existing directory.
    let second = Mp4Egress::next_segment_path(dir.path()).expect("path");
    assert_eq!(second.parent(), first.parent());
}
