// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NvrError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("GStreamer error: {0}")]
    Pipeline(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Egress already initialized")]
    AlreadyInitialized,

    #[error("Egress open failed: {0}")]
    EgressOpen(String),

    #[error("Egress write failed: {0}")]
    EgressWrite(String),

    #[error("Ring consume failed: {0}")]
    RingConsume(String),
}

pub type Result<T> = std::result::Result<T, NvrError>;
