// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Video frame descriptors — one compressed H.264 NAL unit per frame.
//!
//! A frame travels through a [`crate::ring::FrameRing`] as a fixed-size
//! descriptor followed by the variable-length payload:
//!
//! ```text
//! [FrameHeader : 13 bytes]
//!   nal_type : u8
//!   pts_ms   : u64 (LE) — monotonic presentation timestamp
//!   len      : u32 (LE) — payload byte count
//! [payload    : len bytes]
//! ```
//!
//! The descriptor never owns or points at the payload; the consumer rebinds
//! the payload to its own scratch buffer after extraction.

use byteorder::{ByteOrder, LittleEndian};

/// Serialized size of a [`FrameHeader`] in the ring.
pub const HEADER_LEN: usize = 1 + 8 + 4;

/// H.264 NAL unit classification. Only SPS is branched on by the sink
/// workers; the remaining variants are carried through for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NalType {
    /// Coded slice, non-IDR (type 1).
    NonIdr,
    /// Instantaneous decoder refresh keyframe (type 5).
    Idr,
    /// Supplemental enhancement information (type 6).
    Sei,
    /// Sequence parameter set (type 7).
    Sps,
    /// Picture parameter set (type 8).
    Pps,
    /// Any other NAL unit type.
    Other(u8),
}

impl NalType {
    pub fn from_u8(raw: u8) -> Self {
        match raw {
            1 => NalType::NonIdr,
            5 => NalType::Idr,
            6 => NalType::Sei,
            7 => NalType::Sps,
            8 => NalType::Pps,
            n => NalType::Other(n),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            NalType::NonIdr => 1,
            NalType::Idr => 5,
            NalType::Sei => 6,
            NalType::Sps => 7,
            NalType::Pps => 8,
            NalType::Other(n) => n,
        }
    }

    /// Classify an Annex-B NAL unit, skipping a 3- or 4-byte start code
    /// if one is present. The NAL type lives in the low 5 bits of the
    /// first header byte.
    pub fn detect(data: &[u8]) -> Self {
        let offset = if data.starts_with(&[0, 0, 0, 1]) {
            4
        } else if data.starts_with(&[0, 0, 1]) {
            3
        } else {
            0
        };
        match data.get(offset) {
            Some(b) => NalType::from_u8(b & 0x1F),
            None => NalType::Other(0),
        }
    }
}

/// Fixed-size frame descriptor stored in the ring ahead of each payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub nal: NalType,
    /// Presentation timestamp, monotonic milliseconds.
    pub pts_ms: u64,
    /// Payload length in bytes.
    pub len: u32,
}

impl FrameHeader {
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0] = self.nal.as_u8();
        LittleEndian::write_u64(&mut buf[1..9], self.pts_ms);
        LittleEndian::write_u32(&mut buf[9..13], self.len);
        buf
    }

    pub fn decode(buf: &[u8; HEADER_LEN]) -> Self {
        FrameHeader {
            nal: NalType::from_u8(buf[0]),
            pts_ms: LittleEndian::read_u64(&buf[1..9]),
            len: LittleEndian::read_u32(&buf[9..13]),
        }
    }
}

/// One frame as submitted by the capture source. The payload is borrowed;
/// the dispatcher copies what it needs before `on_frame` returns.
#[derive(Debug)]
pub struct VideoFrame<'a> {
    pub nal: NalType,
    pub pts_ms: u64,
    pub payload: &'a [u8],
}

impl<'a> VideoFrame<'a> {
    pub fn header(&self) -> FrameHeader {
        FrameHeader {
            nal: self.nal,
            pts_ms: self.pts_ms,
            len: self.payload.len() as u32,
        }
    }
}
