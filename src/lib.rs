// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

pub mod api;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod egress;
pub mod error;
pub mod frame;
pub mod ring;
pub mod sink;
pub mod source;
