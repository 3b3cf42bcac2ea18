#![forbid(unsafe_code)]

use std::{fmt, sync::Arc};

use rangefeed_events::{BufferEvent, BufferListEvent, ElementEvent, EventBus, PipelineEvent};
use rangefeed_net::{HttpClient, Net};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    config::LoaderConfig,
    error::{LoaderError, LoaderResult},
    fetcher::RangeFetcher,
    plan::Segmentation,
    queue::AppendQueue,
    traits::{AppendSlot, MediaHandle, MediaPipeline, PlaybackElement},
    trigger::{ProgressTrigger, TriggerAction},
};

/// Lifecycle of a loader session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    /// Constructed; the pipeline is not attached yet.
    Init,
    /// The pipeline signaled open; no buffer attached yet.
    Opened,
    /// Segments are being fetched on playhead progress.
    Streaming,
    /// The terminal segment is scheduled; waiting for appends to drain.
    Finalizing,
    /// End of stream acknowledged by the pipeline.
    Ended,
    /// Torn down; all subscriptions released.
    Closed,
    /// A fatal error ended the session.
    Failed,
}

impl fmt::Display for LoaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Init => "init",
            Self::Opened => "opened",
            Self::Streaming => "streaming",
            Self::Finalizing => "finalizing",
            Self::Ended => "ended",
            Self::Closed => "closed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Receivers for every collaborator signal channel the session holds.
///
/// Kept out of [`Loader`] while the session loop runs so the select
/// arms can borrow them independently of the handler methods.
#[derive(Default)]
struct Subscriptions {
    pipeline: Option<broadcast::Receiver<PipelineEvent>>,
    buffer: Option<broadcast::Receiver<BufferEvent>>,
    buffer_list: Option<broadcast::Receiver<BufferListEvent>>,
    active_buffer_list: Option<broadcast::Receiver<BufferListEvent>>,
    element: Option<broadcast::Receiver<ElementEvent>>,
}

impl Subscriptions {
    fn count(&self) -> usize {
        [
            self.pipeline.is_some(),
            self.buffer.is_some(),
            self.buffer_list.is_some(),
            self.active_buffer_list.is_some(),
            self.element.is_some(),
        ]
        .iter()
        .filter(|live| **live)
        .count()
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Await the next signal on a channel the session may not have wired
/// yet. An absent receiver parks the arm forever instead of firing.
async fn recv_or_pending<T: Clone>(
    rx: Option<&mut broadcast::Receiver<T>>,
) -> Result<T, RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Progressive byte-range loader session.
///
/// Owns the whole lifecycle: attach the pipeline to the element, probe
/// the resource size, feed segments into the append buffer as the
/// playhead advances, finalize, tear down. `run` drives the session to
/// completion; `close` releases every resource and is safe to call at
/// any point, any number of times.
pub struct Loader<N: Net> {
    config: LoaderConfig,
    fetcher: RangeFetcher<N>,
    pipeline: Arc<dyn MediaPipeline>,
    element: Arc<dyn PlaybackElement>,
    bus: EventBus,
    cancel: CancellationToken,
    state: LoaderState,
    subs: Subscriptions,
    slot: Option<Arc<dyn AppendSlot>>,
    handle: Option<MediaHandle>,
    plan: Option<Segmentation>,
    queue: Option<AppendQueue>,
    trigger: Option<ProgressTrigger>,
    play_requested: bool,
    eos_requested: bool,
}

impl Loader<HttpClient> {
    /// Build a session with its own HTTP transport, configured from
    /// `config.net`.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn from_config(
        config: LoaderConfig,
        pipeline: Arc<dyn MediaPipeline>,
        element: Arc<dyn PlaybackElement>,
    ) -> LoaderResult<Self> {
        let net = HttpClient::new(config.net.clone());
        Self::new(config, net, pipeline, element)
    }
}

impl<N: Net> Loader<N> {
    /// Validate the configuration against the host and build a session.
    ///
    /// # Errors
    ///
    /// `InvalidSegmentLength` for a zero segment length,
    /// `UnsupportedCodec` when the host rejects the MIME/codec string.
    /// Support is checked before anything is attached, so a refused
    /// construction leaves no trace on the element or pipeline.
    pub fn new(
        config: LoaderConfig,
        net: N,
        pipeline: Arc<dyn MediaPipeline>,
        element: Arc<dyn PlaybackElement>,
    ) -> LoaderResult<Self> {
        if config.segment_length == 0 {
            return Err(LoaderError::InvalidSegmentLength);
        }
        if !pipeline.supports(&config.mime_codec) {
            return Err(LoaderError::UnsupportedCodec(config.mime_codec.clone()));
        }

        let bus = config.events.clone().unwrap_or_default();
        let cancel = config.cancel.clone().unwrap_or_default();
        Ok(Self {
            fetcher: RangeFetcher::new(net),
            config,
            pipeline,
            element,
            bus,
            cancel,
            state: LoaderState::Init,
            subs: Subscriptions::default(),
            slot: None,
            handle: None,
            plan: None,
            queue: None,
            trigger: None,
            play_requested: false,
            eos_requested: false,
        })
    }

    /// Drive the session until end of stream, cancellation or failure.
    ///
    /// # Errors
    ///
    /// Any [`LoaderError`]; the state is `Failed` afterwards and the
    /// only remaining useful call is [`close`](Self::close).
    pub async fn run(&mut self) -> LoaderResult<()> {
        match self.drive().await {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(error = %err, "loader session failed");
                self.state = LoaderState::Failed;
                Err(err)
            }
        }
    }

    async fn drive(&mut self) -> LoaderResult<()> {
        let cancel = self.cancel.clone();
        let mut wiring = Subscriptions::default();
        let result = self.session(&cancel, &mut wiring).await;
        // Receivers stay live until close() so late signals are not
        // dropped on the floor while the caller inspects the session.
        self.subs = wiring;
        result
    }

    async fn session(
        &mut self,
        cancel: &CancellationToken,
        wiring: &mut Subscriptions,
    ) -> LoaderResult<()> {
        // Subscribe before attaching so the open signal cannot be missed.
        wiring.pipeline = Some(self.pipeline.subscribe());

        let handle = self.pipeline.create_handle();
        debug!(handle = %handle, "attaching pipeline to element");
        self.element.set_source(handle.clone());
        self.handle = Some(handle);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("cancelled before the pipeline opened");
                    return Ok(());
                }
                evt = recv_or_pending(wiring.pipeline.as_mut()) => match evt {
                    Ok(PipelineEvent::SourceOpen) => {
                        self.bus.publish(PipelineEvent::SourceOpen);
                        break;
                    }
                    Ok(event) => self.bus.publish(event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "pipeline signals lagged");
                    }
                    Err(RecvError::Closed) => return Err(LoaderError::SignalLost),
                },
            }
        }
        self.state = LoaderState::Opened;
        debug!(state = %self.state, "pipeline open");

        // Buffer-list subscriptions come first; attaching the buffer
        // fires their added signals.
        wiring.buffer_list = Some(self.pipeline.subscribe_buffer_list());
        wiring.active_buffer_list = Some(self.pipeline.subscribe_active_buffer_list());

        let slot = self.pipeline.add_buffer(&self.config.mime_codec)?;
        wiring.buffer = Some(slot.subscribe());
        self.queue = Some(AppendQueue::new(slot.clone()));
        self.slot = Some(slot);

        let total_bytes = self.fetcher.probe_size(&self.config.url).await?;
        let plan = Segmentation::plan(total_bytes, self.config.segment_length)?;
        debug!(
            total_bytes,
            segments = plan.total_segments(),
            "resource segmented"
        );
        self.plan = Some(plan);

        let first = self.fetcher.fetch_range(&self.config.url, plan.range(0)).await?;
        wiring.element = Some(self.element.subscribe());
        if let Some(queue) = self.queue.as_mut() {
            queue.enqueue(0, first)?;
        }
        self.trigger = Some(ProgressTrigger::new(plan.total_segments(), 1));

        self.state = if plan.total_segments() == 1 {
            LoaderState::Finalizing
        } else {
            LoaderState::Streaming
        };
        debug!(state = %self.state, "first segment dispatched");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("session cancelled");
                    return Ok(());
                }
                evt = recv_or_pending(wiring.pipeline.as_mut()) => match evt {
                    Ok(event) => {
                        self.bus.publish(event);
                        if event == PipelineEvent::SourceEnded {
                            self.state = LoaderState::Ended;
                            debug!(state = %self.state, "session complete");
                            return Ok(());
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "pipeline signals lagged");
                    }
                    Err(RecvError::Closed) => return Err(LoaderError::SignalLost),
                },
                evt = recv_or_pending(wiring.buffer.as_mut()) => match evt {
                    Ok(event) => self.on_buffer_event(event)?,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "buffer signals lagged");
                    }
                    Err(RecvError::Closed) => return Err(LoaderError::SignalLost),
                },
                evt = recv_or_pending(wiring.buffer_list.as_mut()) => match evt {
                    Ok(event) => self.bus.publish(event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "buffer list signals lagged");
                    }
                    Err(RecvError::Closed) => return Err(LoaderError::SignalLost),
                },
                evt = recv_or_pending(wiring.active_buffer_list.as_mut()) => match evt {
                    Ok(event) => self.bus.publish(event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "active buffer list signals lagged");
                    }
                    Err(RecvError::Closed) => return Err(LoaderError::SignalLost),
                },
                evt = recv_or_pending(wiring.element.as_mut()) => match evt {
                    Ok(event) => self.on_element_event(event).await?,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "element signals lagged");
                    }
                    Err(RecvError::Closed) => return Err(LoaderError::SignalLost),
                },
            }
        }
    }

    fn on_buffer_event(&mut self, event: BufferEvent) -> LoaderResult<()> {
        self.bus.publish(event);
        match event {
            BufferEvent::UpdateStart | BufferEvent::Update => {}
            BufferEvent::UpdateEnd => {
                if let Some(queue) = self.queue.as_mut() {
                    queue.on_update_end();
                }
                self.maybe_finalize();
            }
            BufferEvent::Error => {
                return Err(LoaderError::AppendFailed(
                    "append buffer signaled an error".into(),
                ));
            }
            BufferEvent::Abort => {
                // An abort with nothing in flight is the host cleaning
                // up; mid-append it loses data and is fatal.
                if self.queue.as_ref().is_some_and(AppendQueue::in_flight) {
                    return Err(LoaderError::AppendFailed(
                        "append aborted mid-update".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    fn maybe_finalize(&mut self) {
        if self.state != LoaderState::Finalizing || self.eos_requested {
            return;
        }
        if self.queue.as_ref().is_some_and(AppendQueue::is_drained) {
            debug!("all segments appended; signaling end of stream");
            self.eos_requested = true;
            self.pipeline.end_of_stream();
        }
    }

    async fn on_element_event(&mut self, event: ElementEvent) -> LoaderResult<()> {
        match event {
            ElementEvent::CanPlay => {
                if !self.play_requested {
                    self.play_requested = true;
                    debug!("requesting playback start");
                    self.element.play();
                }
            }
            ElementEvent::TimeUpdate => self.on_time_update().await?,
        }
        Ok(())
    }

    async fn on_time_update(&mut self) -> LoaderResult<()> {
        let Some(plan) = self.plan else {
            return Ok(());
        };
        // A playhead jump can cross several thresholds while the slot is
        // still busy. Hold the trigger until the buffered request drains
        // instead of overflowing the queue.
        if self.queue.as_ref().is_some_and(AppendQueue::has_pending) {
            return Ok(());
        }
        let current_time = self.element.current_time();
        let duration = self.element.duration();
        let action = self
            .trigger
            .as_mut()
            .and_then(|trigger| trigger.poll(current_time, duration));

        let (index, terminal) = match action {
            Some(TriggerAction::Fetch { index }) => (index, false),
            Some(TriggerAction::FetchTerminal { index }) => (index, true),
            None => return Ok(()),
        };

        let bytes = self
            .fetcher
            .fetch_range(&self.config.url, plan.range(index))
            .await?;
        if let Some(queue) = self.queue.as_mut() {
            queue.enqueue(index, bytes)?;
        }
        if terminal {
            self.state = LoaderState::Finalizing;
            debug!(state = %self.state, "terminal segment dispatched");
        }
        Ok(())
    }

    /// Release everything the session holds: cancel the loop, drop all
    /// subscriptions, detach the buffer and revoke the source handle.
    ///
    /// Idempotent. Every teardown path funnels through here.
    pub fn close(&mut self) {
        debug!(state = %self.state, "closing loader session");
        self.cancel.cancel();
        self.subs.clear();
        self.queue = None;
        self.trigger = None;
        self.slot = None;
        if let Some(handle) = self.handle.take() {
            self.pipeline.revoke_handle(&handle);
        }
        self.state = LoaderState::Closed;
    }

    /// Alias of [`close`](Self::close), kept for callers that think in
    /// terms of the append buffer.
    pub fn destroy_append_slot(&mut self) {
        self.close();
    }

    /// Alias of [`close`](Self::close), kept for callers that think in
    /// terms of the pipeline.
    pub fn destroy_pipeline(&mut self) {
        self.close();
    }

    /// Alias of [`close`](Self::close), kept for callers that think in
    /// terms of the buffer list.
    pub fn destroy_buffer_list(&mut self) {
        self.close();
    }

    /// Alias of [`close`](Self::close), kept for callers that think in
    /// terms of the active buffer list.
    pub fn destroy_active_buffer_list(&mut self) {
        self.close();
    }

    /// Alias of [`close`](Self::close), kept for callers that think in
    /// terms of the source handle.
    pub fn destroy_handle(&mut self) {
        self.close();
    }

    pub fn state(&self) -> LoaderState {
        self.state
    }

    /// Number of live collaborator subscriptions. Positive after a
    /// completed run, zero after [`close`](Self::close).
    pub fn subscription_count(&self) -> usize {
        self.subs.count()
    }

    /// Bus carrying every collaborator signal the session witnessed.
    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    /// Token that stops the session loop when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
