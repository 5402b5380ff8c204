//! Error types for the engine

use thiserror::Error;

/// Main error type for the engine
#[derive(Debug, Error)]
pub enum Error {
    #[error("empty geometry payload: {0}")]
    EmptyPayload(&'static str),

    #[error("payload too large: {what} has {count} elements (limit {limit})")]
    PayloadTooLarge {
        what: &'static str,
        count: usize,
        limit: usize,
    },

    #[error("unsupported bytes per value: {0} (must be 1, 2 or 4)")]
    BadValueWidth(u32),

    #[error("scene commit with zero instances")]
    EmptyScene,

    #[error("unknown geometry id: {0}")]
    BadGeomId(u32),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
