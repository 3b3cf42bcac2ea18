#![forbid(unsafe_code)]

/// Lifecycle signals emitted by the host media pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineEvent {
    /// The pipeline is open and ready to accept append buffers.
    SourceOpen,
    /// The pipeline was detached from its playback element.
    SourceClose,
    /// End-of-stream was signaled and all buffered data is final.
    SourceEnded,
}

/// Signals emitted by an append buffer (the per-codec byte sink).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferEvent {
    /// An append began; the buffer's `updating` flag went up.
    UpdateStart,
    /// The append was applied.
    Update,
    /// The append finished; the buffer's `updating` flag went down.
    UpdateEnd,
    /// The append failed.
    Error,
    /// The append was aborted by the host.
    Abort,
}

/// Signals emitted by the pipeline's buffer-list observables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferListEvent {
    /// A buffer was added to the list. `active` distinguishes the
    /// active-buffers list from the full list.
    Added { active: bool },
    /// A buffer was removed from the list.
    Removed { active: bool },
}

/// Signals emitted by the playback element.
///
/// Position data is read from the element directly; these are ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementEvent {
    /// The playhead advanced.
    TimeUpdate,
    /// Enough data is buffered for playback to start.
    CanPlay,
}

/// Unified event for the loader session.
///
/// Hierarchical: each observable has its own variant with a sub-enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Media pipeline lifecycle signal.
    Pipeline(PipelineEvent),
    /// Append buffer signal.
    Buffer(BufferEvent),
    /// Buffer-list observable signal.
    BufferList(BufferListEvent),
}

impl From<PipelineEvent> for Event {
    fn from(e: PipelineEvent) -> Self {
        Self::Pipeline(e)
    }
}

impl From<BufferEvent> for Event {
    fn from(e: BufferEvent) -> Self {
        Self::Buffer(e)
    }
}

impl From<BufferListEvent> for Event {
    fn from(e: BufferListEvent) -> Self {
        Self::BufferList(e)
    }
}
