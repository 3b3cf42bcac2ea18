#![forbid(unsafe_code)]

//! Trait seams for the loader's collaborators.
//!
//! The host media pipeline, its append buffer and the playback element
//! are external subsystems; the loader only depends on these traits.
//! Lifecycle signals travel over `tokio::sync::broadcast` channels so
//! that each subscriber holds an independent receiver.

use std::{fmt, sync::Arc};

use bytes::Bytes;
use rangefeed_events::{BufferEvent, BufferListEvent, ElementEvent, PipelineEvent};
use tokio::sync::broadcast;

use crate::error::LoaderError;

/// Opaque synthetic URL handle.
///
/// Assigned to the playback element's source attribute so that the
/// element resolves to the in-memory media pipeline. The loader revokes
/// it on teardown.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaHandle(String);

impl MediaHandle {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The per-codec, write-only byte sink attached to the media pipeline.
///
/// Appends complete asynchronously: `append` starts an update and the
/// slot signals `UpdateEnd` when its `updating` flag goes down. No
/// append may be issued while `updating` is true; the
/// [`AppendQueue`](crate::AppendQueue) enforces this.
pub trait AppendSlot: Send + Sync {
    /// Busy flag, owned by the host pipeline.
    fn updating(&self) -> bool;

    /// Start an asynchronous append. Failures surface as a
    /// [`BufferEvent::Error`] signal, not a return value.
    fn append(&self, data: Bytes);

    fn subscribe(&self) -> broadcast::Receiver<BufferEvent>;
}

/// The host subsystem that consumes appended bytes and drives playback.
pub trait MediaPipeline: Send + Sync {
    /// Host support probe for a full MIME/codec string.
    fn supports(&self, mime_codec: &str) -> bool;

    /// Issue a synthetic URL handle resolving to this pipeline.
    fn create_handle(&self) -> MediaHandle;

    /// Release a previously issued handle.
    fn revoke_handle(&self, handle: &MediaHandle);

    /// Attach the append buffer for the given codec.
    ///
    /// # Errors
    ///
    /// The host may refuse (e.g. when it is not open).
    fn add_buffer(&self, mime_codec: &str) -> Result<Arc<dyn AppendSlot>, LoaderError>;

    /// Signal that no further appends will arrive.
    fn end_of_stream(&self);

    fn subscribe(&self) -> broadcast::Receiver<PipelineEvent>;

    fn subscribe_buffer_list(&self) -> broadcast::Receiver<BufferListEvent>;

    fn subscribe_active_buffer_list(&self) -> broadcast::Receiver<BufferListEvent>;
}

/// The playback target.
///
/// Read-only for the loader except for the one-time source assignment
/// and the initial `play()` command.
pub trait PlaybackElement: Send + Sync {
    /// Current playhead position in seconds.
    fn current_time(&self) -> f64;

    /// Media duration in seconds. Hosts report NaN until media metadata
    /// has been parsed.
    fn duration(&self) -> f64;

    fn set_source(&self, handle: MediaHandle);

    fn play(&self);

    fn subscribe(&self) -> broadcast::Receiver<ElementEvent>;
}
