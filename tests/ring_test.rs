// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! FrameRing unit tests: framed round-trips, FIFO order, boundary and
//! wrap-around behavior.

use nvr_core::frame::{FrameHeader, NalType, HEADER_LEN};
use nvr_core::ring::FrameRing;

fn push_record(ring: &mut FrameRing, nal: NalType, pts_ms: u64, payload: &[u8]) -> bool {
    let header = FrameHeader { nal, pts_ms, len: payload.len() as u32 };
    if ring.free_space() < HEADER_LEN + payload.len() {
        return false;
    }
    assert!(ring.append(&header.encode()));
    assert!(ring.append(payload));
    true
}

fn pop_record(ring: &mut FrameRing) -> Option<(FrameHeader, Vec<u8>)> {
    let mut hdr_buf = [0u8; HEADER_LEN];
    if !ring.peek(&mut hdr_buf) {
        return None;
    }
    let header = FrameHeader::decode(&hdr_buf);
    assert!(ring.consume(HEADER_LEN));
    let mut payload = vec![0u8; header.len as usize];
    assert!(ring.peek(&mut payload));
    assert!(ring.consume(payload.len()));
    Some((header, payload))
}

#[test]
fn test_single_frame_roundtrip() {
    let mut ring = FrameRing::with_capacity(1024);
    let payload: Vec<u8> = (0..200u16).map(|b| b as u8).collect();

    assert!(push_record(&mut ring, NalType::Idr, 42, &payload));
    assert_eq!(ring.used(), HEADER_LEN + payload.len());

    let (header, data) = pop_record(&mut ring).expect("record");
    assert_eq!(header.nal, NalType::Idr);
    assert_eq!(header.pts_ms, 42);
    assert_eq!(header.len as usize, payload.len());
    assert_eq!(data, payload);
    assert!(ring.is_empty());
    assert_eq!(ring.free_space(), 1024);
}

#[test]
fn test_fifo_order() {
    let mut ring = FrameRing::with_capacity(4096);
    let kinds = [NalType::Sps, NalType::Pps, NalType::Idr, NalType::NonIdr, NalType::Sei];

    for (i, nal) in kinds.iter().enumerate() {
        let payload = vec![i as u8; 10 + i];
        assert!(push_record(&mut ring, *nal, i as u64, &payload));
    }

    for (i, nal) in kinds.iter().enumerate() {
        let (header, data) = pop_record(&mut ring).expect("record");
        assert_eq!(header.nal, *nal);
        assert_eq!(header.pts_ms, i as u64);
        assert_eq!(data, vec![i as u8; 10 + i]);
    }
    assert!(pop_record(&mut ring).is_none());
}

#[test]
fn test_exact_fit_succeeds() {
    let payload = vec![0xABu8; 100];
    let mut ring = FrameRing::with_capacity(HEADER_LEN + payload.len());

    assert!(push_record(&mut ring, NalType::NonIdr, 1, &payload));
    assert_eq!(ring.free_space(), 0);

    let (header, data) = pop_record(&mut ring).expect("record");
    assert_eq!(header.len as usize, 100);
    assert_eq!(data, payload);
}

#[test]
fn test_append_over_capacity_rejected() {
    let mut ring = FrameRing::with_capacity(64);
    let oversized = vec![0u8; 65];
    assert!(!ring.append(&oversized));
    assert!(ring.is_empty());

    // Partially filling then overflowing writes nothing either.
    assert!(ring.append(&[1u8; 40]));
    assert!(!ring.append(&[2u8; 30]));
    assert_eq!(ring.used(), 40);
}

#[test]
fn test_peek_and_consume_bounds() {
    let mut ring = FrameRing::with_capacity(64);
    assert!(ring.append(&[7u8; 8]));

    let mut too_much = [0u8; 9];
    assert!(!ring.peek(&mut too_much));
    assert!(!ring.consume(9));

    let mut exact = [0u8; 8];
    assert!(ring.peek(&mut exact));
    assert_eq!(exact, [7u8; 8]);
    // Peek does not advance.
    assert_eq!(ring.used(), 8);
    assert!(ring.consume(8));
    assert!(ring.is_empty());
}

#[test]
fn test_clear_resets_free_space() {
    let mut ring = FrameRing::with_capacity(256);
    assert!(push_record(&mut ring, NalType::Sps, 0, &[1u8; 30]));
    assert!(push_record(&mut ring, NalType::Idr, 1, &[2u8; 30]));
    assert!(!ring.is_empty());

    ring.clear();
    assert!(ring.is_empty());
    assert_eq!(ring.free_space(), 256);
}

#[test]
fn test_wrap_around_integrity() {
    // Small ring; drive the head forward so later records straddle the
    // physical end of the buffer.
    let mut ring = FrameRing::with_capacity(64);

    for round in 0..20u64 {
        let payload = vec![(round & 0xFF) as u8; 24];
        assert!(push_record(&mut ring, NalType::NonIdr, round, &payload));
        let (header, data) = pop_record(&mut ring).expect("record");
        assert_eq!(header.pts_ms, round);
        assert_eq!(data, payload);
        assert!(ring.is_empty());
    }
}

#[test]
fn test_wrap_around_two_records() {
    let mut ring = FrameRing::with_capacity(80);

    // First record advances the head past the middle.
    assert!(push_record(&mut ring, NalType::Sps, 0, &[0xAA; 30]));
    let _ = pop_record(&mut ring).expect("first");

    // These two straddle the wrap point between them.
    assert!(push_record(&mut ring, NalType::Idr, 1, &[0xBB; 20]));
    assert!(push_record(&mut ring, NalType::NonIdr, 2, &[0xCC; 20]));

    let (h1, d1) = pop_record(&mut ring).expect("second");
    assert_eq!((h1.nal, d1), (NalType::Idr, vec![0xBB; 20]));
    let (h2, d2) = pop_record(&mut ring).expect("third");
    assert_eq!((h2.nal, d2), (NalType::NonIdr, vec![0xCC; 20]));
}

#[test]
fn test_nal_type_detect() {
    // Annex-B start codes, 4- and 3-byte forms.
    assert_eq!(NalType::detect(&[0, 0, 0, 1, 0x67, 0x42]), NalType::Sps);
    assert_eq!(NalType::detect(&[0, 0, 1, 0x65, 0x88]), NalType::Idr);
    assert_eq!(NalType::detect(&[0, 0, 0, 1, 0x68]), NalType::Pps);
    assert_eq!(NalType::detect(&[0, 0, 0, 1, 0x41]), NalType::NonIdr);
    // Bare NAL header without a start code.
    assert_eq!(NalType::detect(&[0x06, 0x05]), NalType::Sei);
    assert_eq!(NalType::detect(&[]), NalType::Other(0));
}
