#![forbid(unsafe_code)]

//! In-memory fakes of the loader's collaborators, for tests and for
//! host environments that have no real media pipeline.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use bytes::Bytes;
use rangefeed_events::{BufferEvent, BufferListEvent, ElementEvent, PipelineEvent};
use rangefeed_net::{Headers, Net, NetError, RangeSpec};
use tokio::sync::broadcast;
use url::Url;

use crate::{
    error::LoaderError,
    traits::{AppendSlot, MediaHandle, MediaPipeline, PlaybackElement},
};

const CHANNEL_CAPACITY: usize = 64;

/// Transport fake serving a fixed byte buffer.
///
/// Clones share the request log, so a test can hand one clone to the
/// fetcher and keep another for assertions.
#[derive(Clone)]
pub struct StaticNet {
    body: Bytes,
    content_length: Option<String>,
    range_error: Option<NetError>,
    requested_ranges: Arc<Mutex<Vec<(u64, Option<u64>)>>>,
}

impl StaticNet {
    pub fn new(body: Bytes) -> Self {
        let content_length = Some(body.len().to_string());
        Self {
            body,
            content_length,
            range_error: None,
            requested_ranges: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Serve HEAD responses without a Content-Length header.
    pub fn without_content_length(mut self) -> Self {
        self.content_length = None;
        self
    }

    /// Serve HEAD responses with a literal Content-Length value.
    pub fn with_content_length_header(mut self, value: &str) -> Self {
        self.content_length = Some(value.to_string());
        self
    }

    /// Fail every ranged request with the given error.
    pub fn with_range_error(mut self, error: NetError) -> Self {
        self.range_error = Some(error);
        self
    }

    /// Ranges requested so far, in order.
    pub fn requested_ranges(&self) -> Vec<(u64, Option<u64>)> {
        self.requested_ranges.lock().unwrap().clone()
    }
}

#[async_trait]
impl Net for StaticNet {
    async fn get_bytes(&self, _url: Url, _headers: Option<Headers>) -> Result<Bytes, NetError> {
        Ok(self.body.clone())
    }

    async fn get_range(
        &self,
        _url: Url,
        range: RangeSpec,
        _headers: Option<Headers>,
    ) -> Result<Bytes, NetError> {
        self.requested_ranges
            .lock()
            .unwrap()
            .push((range.start, range.end));
        if let Some(error) = &self.range_error {
            return Err(error.clone());
        }
        let start = range.start as usize;
        let end = range
            .end
            .map(|e| (e as usize + 1).min(self.body.len()))
            .unwrap_or(self.body.len());
        Ok(self.body.slice(start.min(self.body.len())..end))
    }

    async fn head(&self, _url: Url, _headers: Option<Headers>) -> Result<Headers, NetError> {
        let mut headers = Headers::new();
        if let Some(value) = &self.content_length {
            headers.insert("content-length", value.clone());
        }
        headers.insert("content-type", "video/mp4");
        Ok(headers)
    }
}

/// Append slot fake.
///
/// In auto mode every append completes immediately, emitting the full
/// `UpdateStart`/`Update`/`UpdateEnd` sequence. In manual mode the slot
/// stays busy until [`complete_update`](MockSlot::complete_update) is
/// called, which lets tests overlap requests deliberately.
pub struct MockSlot {
    auto_complete: bool,
    updating: AtomicBool,
    payloads: Mutex<Vec<Vec<u8>>>,
    violations: AtomicU64,
    events: broadcast::Sender<BufferEvent>,
}

impl MockSlot {
    pub fn auto() -> Arc<Self> {
        Arc::new(Self::with_mode(true))
    }

    pub fn manual() -> Arc<Self> {
        Arc::new(Self::with_mode(false))
    }

    fn with_mode(auto_complete: bool) -> Self {
        let (events, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            auto_complete,
            updating: AtomicBool::new(false),
            payloads: Mutex::new(Vec::new()),
            violations: AtomicU64::new(0),
            events,
        }
    }

    /// Finish the in-progress append (manual mode).
    pub fn complete_update(&self) {
        self.updating.store(false, Ordering::SeqCst);
        let _ = self.events.send(BufferEvent::Update);
        let _ = self.events.send(BufferEvent::UpdateEnd);
    }

    /// Emit an append failure signal, as a host does when an append is
    /// rejected.
    pub fn emit_error(&self) {
        self.updating.store(false, Ordering::SeqCst);
        let _ = self.events.send(BufferEvent::Error);
    }

    /// Emit an abort signal.
    pub fn emit_abort(&self) {
        let _ = self.events.send(BufferEvent::Abort);
    }

    pub fn append_count(&self) -> usize {
        self.payloads.lock().unwrap().len()
    }

    /// Every appended payload, in append order.
    pub fn appended_payloads(&self) -> Vec<Vec<u8>> {
        self.payloads.lock().unwrap().clone()
    }

    /// Number of appends issued while the slot was already updating.
    pub fn violation_count(&self) -> u64 {
        self.violations.load(Ordering::SeqCst)
    }
}

impl AppendSlot for MockSlot {
    fn updating(&self) -> bool {
        self.updating.load(Ordering::SeqCst)
    }

    fn append(&self, data: Bytes) {
        if self.updating.swap(true, Ordering::SeqCst) {
            self.violations.fetch_add(1, Ordering::SeqCst);
        }
        self.payloads.lock().unwrap().push(data.to_vec());
        let _ = self.events.send(BufferEvent::UpdateStart);
        if self.auto_complete {
            self.complete_update();
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<BufferEvent> {
        self.events.subscribe()
    }
}

/// Media pipeline fake. Backed by a single [`MockSlot`].
pub struct MockPipeline {
    supported: bool,
    slot: Arc<MockSlot>,
    added_codecs: Mutex<Vec<String>>,
    handle_seq: AtomicU64,
    revoked: Mutex<Vec<MediaHandle>>,
    end_of_stream_count: AtomicU64,
    pipeline_events: broadcast::Sender<PipelineEvent>,
    buffer_list_events: broadcast::Sender<BufferListEvent>,
    active_buffer_list_events: broadcast::Sender<BufferListEvent>,
}

impl MockPipeline {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::with_support(true, MockSlot::auto()))
    }

    /// A pipeline that rejects every codec probe.
    pub fn unsupported() -> Arc<Self> {
        Arc::new(Self::with_support(false, MockSlot::auto()))
    }

    /// A pipeline whose slot only completes appends on demand.
    pub fn with_manual_slot() -> Arc<Self> {
        Arc::new(Self::with_support(true, MockSlot::manual()))
    }

    fn with_support(supported: bool, slot: Arc<MockSlot>) -> Self {
        let (pipeline_events, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (buffer_list_events, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (active_buffer_list_events, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            supported,
            slot,
            added_codecs: Mutex::new(Vec::new()),
            handle_seq: AtomicU64::new(0),
            revoked: Mutex::new(Vec::new()),
            end_of_stream_count: AtomicU64::new(0),
            pipeline_events,
            buffer_list_events,
            active_buffer_list_events,
        }
    }

    /// Signal that the pipeline has opened, as the host does once the
    /// element resolves its source handle.
    pub fn open(&self) {
        let _ = self.pipeline_events.send(PipelineEvent::SourceOpen);
    }

    pub fn slot(&self) -> Arc<MockSlot> {
        self.slot.clone()
    }

    pub fn added_codecs(&self) -> Vec<String> {
        self.added_codecs.lock().unwrap().clone()
    }

    pub fn end_of_stream_count(&self) -> u64 {
        self.end_of_stream_count.load(Ordering::SeqCst)
    }

    pub fn revoked(&self) -> Vec<MediaHandle> {
        self.revoked.lock().unwrap().clone()
    }
}

impl MediaPipeline for MockPipeline {
    fn supports(&self, _mime_codec: &str) -> bool {
        self.supported
    }

    fn create_handle(&self) -> MediaHandle {
        let n = self.handle_seq.fetch_add(1, Ordering::SeqCst);
        MediaHandle::new(format!("mem://pipeline/{n}"))
    }

    fn revoke_handle(&self, handle: &MediaHandle) {
        self.revoked.lock().unwrap().push(handle.clone());
    }

    fn add_buffer(&self, mime_codec: &str) -> Result<Arc<dyn AppendSlot>, LoaderError> {
        self.added_codecs.lock().unwrap().push(mime_codec.to_string());
        let _ = self
            .buffer_list_events
            .send(BufferListEvent::Added { active: false });
        let _ = self
            .active_buffer_list_events
            .send(BufferListEvent::Added { active: true });
        Ok(self.slot.clone())
    }

    fn end_of_stream(&self) {
        self.end_of_stream_count.fetch_add(1, Ordering::SeqCst);
        let _ = self.pipeline_events.send(PipelineEvent::SourceEnded);
    }

    fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.pipeline_events.subscribe()
    }

    fn subscribe_buffer_list(&self) -> broadcast::Receiver<BufferListEvent> {
        self.buffer_list_events.subscribe()
    }

    fn subscribe_active_buffer_list(&self) -> broadcast::Receiver<BufferListEvent> {
        self.active_buffer_list_events.subscribe()
    }
}

/// Playback element fake with a scripted clock.
pub struct MockElement {
    duration: Mutex<f64>,
    current_time: Mutex<f64>,
    source: Mutex<Option<MediaHandle>>,
    play_count: AtomicU64,
    events: broadcast::Sender<ElementEvent>,
}

impl MockElement {
    pub fn new(duration: f64) -> Arc<Self> {
        let (events, _) = broadcast::channel(CHANNEL_CAPACITY);
        Arc::new(Self {
            duration: Mutex::new(duration),
            current_time: Mutex::new(0.0),
            source: Mutex::new(None),
            play_count: AtomicU64::new(0),
            events,
        })
    }

    /// Move the playhead and emit the progress signal.
    pub fn set_time(&self, time: f64) {
        *self.current_time.lock().unwrap() = time;
        let _ = self.events.send(ElementEvent::TimeUpdate);
    }

    pub fn set_duration(&self, duration: f64) {
        *self.duration.lock().unwrap() = duration;
    }

    pub fn emit_can_play(&self) {
        let _ = self.events.send(ElementEvent::CanPlay);
    }

    pub fn play_count(&self) -> u64 {
        self.play_count.load(Ordering::SeqCst)
    }

    pub fn src(&self) -> Option<MediaHandle> {
        self.source.lock().unwrap().clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }
}

impl PlaybackElement for MockElement {
    fn current_time(&self) -> f64 {
        *self.current_time.lock().unwrap()
    }

    fn duration(&self) -> f64 {
        *self.duration.lock().unwrap()
    }

    fn set_source(&self, handle: MediaHandle) {
        *self.source.lock().unwrap() = Some(handle);
    }

    fn play(&self) {
        self.play_count.fetch_add(1, Ordering::SeqCst);
    }

    fn subscribe(&self) -> broadcast::Receiver<ElementEvent> {
        self.events.subscribe()
    }
}
