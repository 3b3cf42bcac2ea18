#![forbid(unsafe_code)]

use rangefeed_net::NetError;
use thiserror::Error;

use crate::queue::QueueError;

/// Centralized error type for a loader session.
///
/// Every failure is fatal for the session; the expected recovery path is
/// constructing a new one.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("unsupported MIME type or codec: {0}")]
    UnsupportedCodec(String),

    #[error("resource reports no usable Content-Length")]
    MissingContentLength,

    #[error("resource is empty")]
    EmptyResource,

    #[error("segment length must be positive")]
    InvalidSegmentLength,

    #[error("fetch failed: {0}")]
    FetchFailed(#[from] NetError),

    #[error("append failed: {0}")]
    AppendFailed(String),

    #[error("append queue: {0}")]
    Queue(#[from] QueueError),

    #[error("a collaborator dropped its signal channel")]
    SignalLost,
}

pub type LoaderResult<T> = Result<T, LoaderError>;
