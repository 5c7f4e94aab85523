//! Pipeline Coordinator
//!
//! The [`Pipeline`] task owns the decoder and the presenter and is the only
//! place session transitions happen. Callers talk to it through a cloneable
//! [`PipelineHandle`], which turns every operation into a command on a
//! bounded channel and waits for the reply.
//!
//! # State machine
//!
//! ```text
//!            reset                 ready            first request
//!   Idle ───────────► Resolving ──────────► Ready ───────────────► Streaming
//!    ▲                   │ failed                                    │
//!    │◄──────────────────┘                                           │ end of stream
//!    │                                                               ▼
//!    └──────────────────────────── drained ◄──────────────────── Draining
//! ```
//!
//! A reset while a session is active passes through `Draining` (stop the
//! decoder, drop pending frames) before `Resolving` the next one.
//!
//! # Demand
//!
//! The coordinator asks the decoder for frames only when the session is
//! `Ready`/`Streaming`, no push-once request is outstanding and the presenter
//! wants more. Self-pacing decoders are held back by not reading their event
//! channel while the presenter is full.
//!
//! Events carry the [`SessionId`] they were produced for. Anything from an
//! earlier session is discarded and counted.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};
use vidpower_decoder::{
    DecodeError, Decoder, DecoderEvent, DecoderStats, FrameSink, ReadyHandle, ReadyOutcome,
    SessionId,
};
use vidpower_model::ModelConfig;

use crate::compositor::LayerHost;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PresentError, Result};
use crate::presenter::{Presenter, PresenterStats};

/// Pipeline session state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PipelineState {
    /// No session bound
    #[default]
    Idle,
    /// Waiting for the decoder to resolve the asset
    Resolving,
    /// Asset resolved, presenter configured, nothing requested yet
    Ready,
    /// Frames are being requested and presented
    Streaming,
    /// Session ending; no new requests
    Draining,
}

impl PipelineState {
    /// Whether a session is bound
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// How a successful reset ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    /// The new session is ready
    Ready,
    /// A later reset superseded this one
    Cancelled,
}

/// Full-screen transition notifications from the window system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullScreenEvent {
    /// About to enter full screen
    WillEnter,
    /// Now full screen
    DidEnter,
    /// About to leave full screen
    WillExit,
    /// Back in the window
    DidExit,
}

/// Pipeline statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Sessions started
    pub sessions: u64,

    /// Requests issued to the decoder
    pub frames_requested: u64,

    /// Frames accepted by the presenter and not refused by the compositor
    pub frames_delivered: u64,

    /// Frames dropped by the decoder, the presenter or the compositor
    pub frames_dropped: u64,

    /// Events from superseded sessions
    pub stale_discarded: u64,

    /// Sessions that reached end of stream
    pub end_of_streams: u64,
}

enum PipelineCommand {
    Reset {
        config: ModelConfig,
        respond: oneshot::Sender<Result<ResetOutcome>>,
    },
    RequestFrames,
    DisplayRefresh {
        respond: oneshot::Sender<bool>,
    },
    DetachVideo {
        respond: oneshot::Sender<Result<()>>,
    },
    ReattachVideo {
        respond: oneshot::Sender<Result<()>>,
    },
    DetachOverlay {
        respond: oneshot::Sender<Result<()>>,
    },
    ReattachOverlay {
        respond: oneshot::Sender<Result<()>>,
    },
    NoMoreBuffers,
    FullScreen {
        event: FullScreenEvent,
        respond: oneshot::Sender<Result<()>>,
    },
    Stats {
        respond: oneshot::Sender<PipelineStats>,
    },
    PresenterStats {
        respond: oneshot::Sender<PresenterStats>,
    },
    DecoderStats {
        respond: oneshot::Sender<DecoderStats>,
    },
    VisibleOutput {
        respond: oneshot::Sender<Option<Vec<u8>>>,
    },
    Shutdown {
        respond: oneshot::Sender<()>,
    },
}

/// Coordinator task
///
/// Build with [`Pipeline::new`], then drive with [`Pipeline::run`] (or use
/// [`Pipeline::spawn`] for both).
pub struct Pipeline<D, P> {
    config: PipelineConfig,
    decoder: D,
    presenter: P,
    commands: mpsc::Receiver<PipelineCommand>,
    events_tx: mpsc::Sender<DecoderEvent>,
    events_rx: mpsc::Receiver<DecoderEvent>,
    state_tx: watch::Sender<PipelineState>,
    session: SessionId,
    model: Option<Arc<ModelConfig>>,
    ready: Option<ReadyHandle>,
    resolve_deadline: Option<(Instant, Duration)>,
    end_requested: bool,
    waiters: Vec<oneshot::Sender<Result<ResetOutcome>>>,
    request_outstanding: bool,
    stats: PipelineStats,
}

impl<D, P> Pipeline<D, P>
where
    D: Decoder + 'static,
    P: Presenter + 'static,
{
    /// Create a pipeline and its handle
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `config` fails validation.
    pub fn new(config: PipelineConfig, decoder: D, presenter: P) -> Result<(Self, PipelineHandle)> {
        if let Err(issues) = config.validate() {
            return Err(PipelineError::InvalidConfig(issues.join(", ")));
        }

        info!("Creating pipeline with config: {:?}", config);

        let (command_tx, commands) = mpsc::channel(config.command_channel_size);
        let (events_tx, events_rx) = mpsc::channel(config.event_channel_capacity);
        let (state_tx, state_rx) = watch::channel(PipelineState::Idle);

        let pipeline = Self {
            config,
            decoder,
            presenter,
            commands,
            events_tx,
            events_rx,
            state_tx,
            session: 0,
            model: None,
            ready: None,
            resolve_deadline: None,
            end_requested: false,
            waiters: Vec::new(),
            request_outstanding: false,
            stats: PipelineStats::default(),
        };
        let handle = PipelineHandle {
            commands: command_tx,
            state: state_rx,
        };
        Ok((pipeline, handle))
    }

    /// Create a pipeline and run it on a new task
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(
        config: PipelineConfig,
        decoder: D,
        presenter: P,
    ) -> Result<(PipelineHandle, JoinHandle<()>)> {
        let (pipeline, handle) = Self::new(config, decoder, presenter)?;
        let task = tokio::spawn(pipeline.run());
        Ok((handle, task))
    }

    /// Run until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        let mut refresh = self.config.refresh_interval.map(|period| {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });

        loop {
            let accept_events = self.accepting_events();
            let awaiting_ready = self.ready.is_some();
            let resolve_deadline = self.resolve_deadline;

            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command) {
                            break;
                        }
                    }
                    None => {
                        debug!("All pipeline handles dropped");
                        break;
                    }
                },

                outcome = wait_ready(&mut self.ready, resolve_deadline), if awaiting_ready => {
                    self.ready = None;
                    self.resolve_deadline = None;
                    self.on_ready(outcome);
                }

                Some(event) = self.events_rx.recv(), if accept_events => {
                    self.on_event(event);
                }

                () = next_tick(&mut refresh) => {
                    self.on_display_refresh();
                }
            }
        }

        self.teardown();
        info!("Pipeline stopped");
    }

    fn state(&self) -> PipelineState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: PipelineState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!("Pipeline state {:?} -> {:?}", previous, state);
        }
    }

    fn repeated(&self) -> bool {
        self.model
            .as_deref()
            .is_some_and(ModelConfig::will_request_frames_repeatedly)
    }

    /// Whether to read the decoder event channel this iteration
    ///
    /// A self-pacing decoder is only read while the presenter wants more, so
    /// it stays blocked on the bounded channel otherwise.
    fn accepting_events(&self) -> bool {
        match self.state() {
            PipelineState::Ready | PipelineState::Streaming => {
                !self.repeated() || self.presenter.wants_more_frames()
            }
            _ => true,
        }
    }

    /// Returns false when the pipeline should stop
    fn handle_command(&mut self, command: PipelineCommand) -> bool {
        match command {
            PipelineCommand::Reset { config, respond } => self.on_reset(config, respond),
            PipelineCommand::RequestFrames => self.pump(),
            PipelineCommand::DisplayRefresh { respond } => {
                let _ = respond.send(self.on_display_refresh());
            }
            PipelineCommand::DetachVideo { respond } => {
                let _ = respond.send(self.presenter.detach_video_layer().map_err(Into::into));
            }
            PipelineCommand::ReattachVideo { respond } => {
                let result = self.presenter.reattach_video_layer();
                self.pump();
                let _ = respond.send(result.map_err(Into::into));
            }
            PipelineCommand::DetachOverlay { respond } => {
                let _ = respond.send(self.presenter.detach_overlay_layer().map_err(Into::into));
            }
            PipelineCommand::ReattachOverlay { respond } => {
                let _ = respond.send(self.presenter.reattach_overlay_layer().map_err(Into::into));
            }
            PipelineCommand::NoMoreBuffers => self.on_no_more_buffers(),
            PipelineCommand::FullScreen { event, respond } => {
                let result = self.on_full_screen(event);
                let _ = respond.send(result.map_err(Into::into));
            }
            PipelineCommand::Stats { respond } => {
                let _ = respond.send(self.stats.clone());
            }
            PipelineCommand::PresenterStats { respond } => {
                let _ = respond.send(self.presenter.stats());
            }
            PipelineCommand::DecoderStats { respond } => {
                let _ = respond.send(self.decoder.stats());
            }
            PipelineCommand::VisibleOutput { respond } => {
                let _ = respond.send(self.presenter.visible_output());
            }
            PipelineCommand::Shutdown { respond } => {
                info!("Pipeline shutdown requested");
                let _ = respond.send(());
                return false;
            }
        }
        true
    }

    fn on_reset(&mut self, config: ModelConfig, respond: oneshot::Sender<Result<ResetOutcome>>) {
        if let Err(issues) = config.validate() {
            warn!("Rejecting reset: {}", issues.join(", "));
            let _ = respond.send(Err(PipelineError::InvalidConfig(issues.join(", "))));
            return;
        }

        if !config.can_handle_buffers() {
            warn!("Rejecting reset: cannot present {}", config.summary());
            self.end_session();
            let _ = respond.send(Err(PipelineError::unsupported(format!(
                "{} cannot present buffers",
                config.summary()
            ))));
            return;
        }

        // Same config already resolving: keep the resolution, hand over the wait
        if self.state() == PipelineState::Resolving && self.model.as_deref() == Some(&config) {
            debug!("Coalescing reset into session {}", self.session);
            self.end_requested = false;
            self.cancel_waiters();
            self.waiters.push(respond);
            return;
        }

        if self.state().is_active() {
            self.set_state(PipelineState::Draining);
            self.decoder.stop();
            self.presenter.reset_with_config(None);
            self.cancel_waiters();
        }

        self.session += 1;
        self.stats.sessions += 1;
        self.request_outstanding = false;
        self.end_requested = false;

        let model = Arc::new(config);
        info!("Session {}: {}", self.session, model.summary());

        let sink = FrameSink::new(self.session, self.events_tx.clone());
        self.ready = Some(self.decoder.reset(Arc::clone(&model), sink));
        self.resolve_deadline = self
            .config
            .resolve_timeout
            .map(|limit| (Instant::now() + limit, limit));
        self.model = Some(model);
        self.waiters.push(respond);
        self.set_state(PipelineState::Resolving);
    }

    fn on_ready(&mut self, outcome: ReadyOutcome) {
        match outcome {
            ReadyOutcome::Ready => {
                info!("Session {} ready", self.session);
                self.presenter.reset_with_config(self.model.clone());
                self.set_state(PipelineState::Ready);
                for waiter in self.waiters.drain(..) {
                    let _ = waiter.send(Ok(ResetOutcome::Ready));
                }
                if self.end_requested {
                    // Ended while resolving: nothing is ever requested
                    self.end_requested = false;
                    self.decoder.stop();
                    self.begin_drain();
                } else {
                    self.pump();
                }
            }
            ReadyOutcome::Failed(e) => {
                warn!("Session {} failed to resolve: {}", self.session, e);
                let waiters = std::mem::take(&mut self.waiters);
                self.end_session();
                for waiter in waiters {
                    let _ = waiter.send(Err(PipelineError::AssetResolution(e.clone())));
                }
            }
            ReadyOutcome::Cancelled => {
                debug!("Session {} resolution cancelled", self.session);
                self.end_session();
            }
        }
    }

    /// Ask the decoder for a frame if the presenter has room
    fn pump(&mut self) {
        if !matches!(self.state(), PipelineState::Ready | PipelineState::Streaming) {
            return;
        }
        if self.request_outstanding || !self.presenter.wants_more_frames() {
            return;
        }

        self.decoder.request_frames();
        self.stats.frames_requested += 1;
        // Push-once decoders answer each request once; self-pacing ones keep going
        self.request_outstanding = true;
        self.set_state(PipelineState::Streaming);
    }

    fn on_event(&mut self, event: DecoderEvent) {
        if event.session() != self.session || self.state() != PipelineState::Streaming {
            trace!("Discarding stale event for session {}", event.session());
            self.stats.stale_discarded += 1;
            return;
        }

        let repeated = self.repeated();
        match event {
            DecoderEvent::Frame { frame, .. } => {
                if !repeated {
                    self.request_outstanding = false;
                }
                let index = frame.index();
                if self.presenter.present(frame) {
                    self.stats.frames_delivered += 1;
                    self.pump();
                } else {
                    // Wait for the next demand signal
                    debug!("Presenter refused frame {}", index);
                    self.stats.frames_dropped += 1;
                }
            }
            DecoderEvent::Dropped { reason, .. } => {
                if !repeated {
                    self.request_outstanding = false;
                }
                debug!("Decoder dropped a frame: {}", reason);
                self.stats.frames_dropped += 1;
                self.pump();
            }
            DecoderEvent::EndOfStream { .. } => {
                info!("Session {} reached end of stream", self.session);
                self.stats.end_of_streams += 1;
                self.request_outstanding = false;
                self.begin_drain();
            }
        }
    }

    fn on_no_more_buffers(&mut self) {
        match self.state() {
            PipelineState::Ready | PipelineState::Streaming => {
                info!("No more buffers for session {}", self.session);
                self.decoder.stop();
                self.begin_drain();
            }
            PipelineState::Resolving => {
                info!("No more buffers for session {} before it is ready", self.session);
                self.end_requested = true;
            }
            PipelineState::Idle | PipelineState::Draining => self.presenter.no_more_buffers(),
        }
    }

    fn begin_drain(&mut self) {
        self.presenter.no_more_buffers();
        self.set_state(PipelineState::Draining);
        self.finish_drain();
    }

    fn finish_drain(&mut self) {
        if self.state() == PipelineState::Draining && self.presenter.pending_frames() == 0 {
            self.decoder.stop();
            self.model = None;
            self.set_state(PipelineState::Idle);
        }
    }

    fn on_display_refresh(&mut self) -> bool {
        let rejected = self.presenter.stats().rejected;
        let presented = self.presenter.display_refresh();

        // Accepted earlier, refused by the compositor now
        let refused = self.presenter.stats().rejected.saturating_sub(rejected);
        if refused > 0 {
            self.stats.frames_delivered = self.stats.frames_delivered.saturating_sub(refused);
            self.stats.frames_dropped += refused;
        }

        self.finish_drain();
        self.pump();
        presented
    }

    fn on_full_screen(&mut self, event: FullScreenEvent) -> std::result::Result<(), PresentError> {
        info!("Full-screen transition: {:?}", event);
        match event {
            FullScreenEvent::WillEnter | FullScreenEvent::WillExit => self.detach_layers(),
            FullScreenEvent::DidEnter | FullScreenEvent::DidExit => {
                let host = if event == FullScreenEvent::DidEnter {
                    LayerHost::FullScreen
                } else {
                    LayerHost::Window
                };
                self.reattach_layers(host)?;
                self.pump();
                Ok(())
            }
        }
    }

    /// Detach both layers or neither
    fn detach_layers(&mut self) -> std::result::Result<(), PresentError> {
        self.presenter.detach_video_layer()?;
        if let Err(e) = self.presenter.detach_overlay_layer() {
            if let Err(restore) = self.presenter.reattach_video_layer() {
                warn!("Failed to restore video layer: {}", restore);
            }
            return Err(e);
        }
        Ok(())
    }

    /// Reattach both layers to `host` or leave both detached
    fn reattach_layers(&mut self, host: LayerHost) -> std::result::Result<(), PresentError> {
        let previous = self.presenter.host();
        self.presenter.set_host(host);

        if let Err(e) = self.presenter.reattach_video_layer() {
            self.presenter.set_host(previous);
            return Err(e);
        }
        if let Err(e) = self.presenter.reattach_overlay_layer() {
            if let Err(restore) = self.presenter.detach_video_layer() {
                warn!("Failed to detach video layer again: {}", restore);
            }
            self.presenter.set_host(previous);
            return Err(e);
        }
        Ok(())
    }

    fn cancel_waiters(&mut self) {
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(Ok(ResetOutcome::Cancelled));
        }
    }

    /// Unbind the current session and go idle
    fn end_session(&mut self) {
        if self.state().is_active() {
            self.set_state(PipelineState::Draining);
        }
        self.decoder.stop();
        self.ready = None;
        self.resolve_deadline = None;
        self.end_requested = false;
        self.model = None;
        self.request_outstanding = false;
        self.presenter.reset_with_config(None);
        self.cancel_waiters();
        self.set_state(PipelineState::Idle);
    }

    fn teardown(&mut self) {
        self.end_session();
        self.commands.close();
    }
}

/// Wait for the pending resolution, failing it once `deadline` passes
async fn wait_ready(
    ready: &mut Option<ReadyHandle>,
    deadline: Option<(Instant, Duration)>,
) -> ReadyOutcome {
    let Some(handle) = ready else {
        return std::future::pending().await;
    };
    match deadline {
        Some((deadline, limit)) => tokio::time::timeout_at(deadline, handle)
            .await
            .unwrap_or_else(|_| ReadyOutcome::Failed(DecodeError::Timeout(limit))),
        None => handle.await,
    }
}

async fn next_tick(refresh: &mut Option<Interval>) {
    match refresh {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Cloneable handle to a running [`Pipeline`]
#[derive(Debug, Clone)]
pub struct PipelineHandle {
    commands: mpsc::Sender<PipelineCommand>,
    state: watch::Receiver<PipelineState>,
}

impl std::fmt::Debug for PipelineCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Reset { .. } => "Reset",
            Self::RequestFrames => "RequestFrames",
            Self::DisplayRefresh { .. } => "DisplayRefresh",
            Self::DetachVideo { .. } => "DetachVideo",
            Self::ReattachVideo { .. } => "ReattachVideo",
            Self::DetachOverlay { .. } => "DetachOverlay",
            Self::ReattachOverlay { .. } => "ReattachOverlay",
            Self::NoMoreBuffers => "NoMoreBuffers",
            Self::FullScreen { .. } => "FullScreen",
            Self::Stats { .. } => "Stats",
            Self::PresenterStats { .. } => "PresenterStats",
            Self::DecoderStats { .. } => "DecoderStats",
            Self::VisibleOutput { .. } => "VisibleOutput",
            Self::Shutdown { .. } => "Shutdown",
        };
        f.write_str(name)
    }
}

impl PipelineHandle {
    async fn send(&self, command: PipelineCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| PipelineError::ChannelClosed)
    }

    async fn call<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> PipelineCommand,
    ) -> Result<T> {
        let (respond, response) = oneshot::channel();
        self.send(command(respond)).await?;
        response.await.map_err(|_| PipelineError::ChannelClosed)
    }

    /// Start a new session with `config`
    ///
    /// Resolves once the asset is resolved and the presenter is configured,
    /// or with [`ResetOutcome::Cancelled`] if a later reset superseded this
    /// one.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::InvalidConfig`] if the config fails validation
    /// - [`PipelineError::UnsupportedConfiguration`] if the config cannot be
    ///   presented; the pipeline is left idle
    /// - [`PipelineError::AssetResolution`] if the source cannot be resolved
    pub async fn reset_with_model(&self, config: ModelConfig) -> Result<ResetOutcome> {
        self.call(|respond| PipelineCommand::Reset { config, respond })
            .await?
    }

    /// Signal demand outside the refresh cadence
    pub async fn request_frames(&self) -> Result<()> {
        self.send(PipelineCommand::RequestFrames).await
    }

    /// Run one display refresh
    ///
    /// Returns true if a new frame went on screen.
    pub async fn display_refresh(&self) -> Result<bool> {
        self.call(|respond| PipelineCommand::DisplayRefresh { respond })
            .await
    }

    /// Detach the video layer from its host
    pub async fn detach_video_layer(&self) -> Result<()> {
        self.call(|respond| PipelineCommand::DetachVideo { respond })
            .await?
    }

    /// Reattach the video layer
    pub async fn reattach_video_layer(&self) -> Result<()> {
        self.call(|respond| PipelineCommand::ReattachVideo { respond })
            .await?
    }

    /// Detach the overlay layer from its host
    pub async fn detach_overlay_layer(&self) -> Result<()> {
        self.call(|respond| PipelineCommand::DetachOverlay { respond })
            .await?
    }

    /// Reattach the overlay layer
    pub async fn reattach_overlay_layer(&self) -> Result<()> {
        self.call(|respond| PipelineCommand::ReattachOverlay { respond })
            .await?
    }

    /// End the current session early
    ///
    /// No frame is delivered to the presenter after this. A session that is
    /// still resolving goes idle as soon as it is ready, without requesting
    /// any frame.
    pub async fn signal_no_more_buffers(&self) -> Result<()> {
        self.send(PipelineCommand::NoMoreBuffers).await
    }

    /// Forward a full-screen transition
    pub async fn full_screen(&self, event: FullScreenEvent) -> Result<()> {
        self.call(|respond| PipelineCommand::FullScreen { event, respond })
            .await?
    }

    /// Current state
    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    /// Receiver for state changes
    pub fn subscribe_state(&self) -> watch::Receiver<PipelineState> {
        self.state.clone()
    }

    /// Wait until the pipeline reaches `target`
    pub async fn wait_for_state(&self, target: PipelineState) -> Result<()> {
        let mut state = self.state.clone();
        state
            .wait_for(|state| *state == target)
            .await
            .map(|_| ())
            .map_err(|_| PipelineError::ChannelClosed)
    }

    /// Pipeline statistics
    pub async fn stats(&self) -> Result<PipelineStats> {
        self.call(|respond| PipelineCommand::Stats { respond }).await
    }

    /// Presenter statistics
    pub async fn presenter_stats(&self) -> Result<PresenterStats> {
        self.call(|respond| PipelineCommand::PresenterStats { respond })
            .await
    }

    /// Decoder statistics
    pub async fn decoder_stats(&self) -> Result<DecoderStats> {
        self.call(|respond| PipelineCommand::DecoderStats { respond })
            .await
    }

    /// Bytes of the frame currently on screen
    pub async fn visible_output(&self) -> Result<Option<Vec<u8>>> {
        self.call(|respond| PipelineCommand::VisibleOutput { respond })
            .await
    }

    /// Stop the pipeline task
    pub async fn shutdown(&self) -> Result<()> {
        self.call(|respond| PipelineCommand::Shutdown { respond })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::{Compositor, HeadlessCompositor, LayerKind};
    use crate::presenter::LayerPresenter;
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use vidpower_decoder::{AssetResolver, ClipResolver, MediaTrack, VideoDecoder};
    use vidpower_model::{FrameBuffer, LayerClass, PixelFormat, SyntheticClip, VideoSource};

    fn spawn_with<C: Compositor + 'static>(compositor: C) -> PipelineHandle {
        let presenter = LayerPresenter::new(compositor).expect("presenter");
        let decoder = VideoDecoder::new(ClipResolver::new());
        let (handle, _task) =
            Pipeline::spawn(PipelineConfig::default(), decoder, presenter).expect("pipeline");
        handle
    }

    fn spawn() -> PipelineHandle {
        spawn_with(HeadlessCompositor::new())
    }

    /// Refresh until the session has gone idle
    async fn refresh_to_idle(handle: &PipelineHandle) {
        for _ in 0..1000 {
            if handle.state() == PipelineState::Idle {
                return;
            }
            handle.display_refresh().await.expect("refresh");
            tokio::task::yield_now().await;
        }
        panic!("session did not go idle");
    }

    struct StalledResolver;

    impl AssetResolver for StalledResolver {
        fn resolve_first_track(
            &self,
            _source: &VideoSource,
        ) -> BoxFuture<'static, vidpower_decoder::Result<Box<dyn MediaTrack>>> {
            futures::future::pending().boxed()
        }
    }

    /// Compositor that refuses to display one frame index
    struct PickyCompositor {
        inner: HeadlessCompositor,
        refuse: u64,
    }

    impl Compositor for PickyCompositor {
        fn attach_layer(
            &mut self,
            layer: LayerKind,
            host: LayerHost,
        ) -> std::result::Result<(), PresentError> {
            self.inner.attach_layer(layer, host)
        }

        fn detach_layer(&mut self, layer: LayerKind) -> std::result::Result<(), PresentError> {
            self.inner.detach_layer(layer)
        }

        fn display(&mut self, frame: &FrameBuffer) -> std::result::Result<(), PresentError> {
            if frame.index() == self.refuse {
                return Err(PresentError::Compositor("surface lost".to_string()));
            }
            self.inner.display(frame)
        }

        fn set_overlay_visible(&mut self, visible: bool) {
            self.inner.set_overlay_visible(visible);
        }

        fn host(&self) -> LayerHost {
            self.inner.host()
        }

        fn set_host(&mut self, host: LayerHost) {
            self.inner.set_host(host);
        }
    }

    fn clip(frames: u32) -> ModelConfig {
        ModelConfig::builder()
            .video_source(VideoSource::Synthetic(SyntheticClip::new(frames, 30)))
            .build()
    }

    #[test]
    fn test_invalid_pipeline_config() {
        let presenter = LayerPresenter::new(HeadlessCompositor::new()).expect("presenter");
        let decoder = VideoDecoder::new(ClipResolver::new());
        let config = PipelineConfig {
            command_channel_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            Pipeline::new(config, decoder, presenter),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_reset_reaches_streaming() {
        let handle = spawn();
        assert_eq!(handle.state(), PipelineState::Idle);

        let outcome = handle.reset_with_model(clip(5)).await.expect("reset");
        assert_eq!(outcome, ResetOutcome::Ready);
        assert_eq!(handle.state(), PipelineState::Streaming);

        let stats = handle.stats().await.expect("stats");
        assert_eq!(stats.sessions, 1);
        assert_eq!(stats.frames_requested, 1);
    }

    #[tokio::test]
    async fn test_unsupported_config_is_rejected_before_resolution() {
        let handle = spawn();
        let config = ModelConfig {
            layer_class: LayerClass::CaLayer,
            format: PixelFormat::Unspecified,
            ..clip(5)
        };

        let err = handle.reset_with_model(config).await.expect_err("unsupported");
        assert!(matches!(err, PipelineError::UnsupportedConfiguration(_)));
        assert_eq!(handle.state(), PipelineState::Idle);
        assert_eq!(handle.decoder_stats().await.expect("stats").resets, 0);
    }

    #[tokio::test]
    async fn test_invalid_model_config() {
        let handle = spawn();
        let config = ModelConfig {
            frame_size: (0, 0),
            ..clip(5)
        };
        let err = handle.reset_with_model(config).await.expect_err("invalid");
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_reset_mid_stream_discards_old_session() {
        let compositor = HeadlessCompositor::new();
        let handle = spawn_with(compositor.clone());
        handle.reset_with_model(clip(100)).await.expect("reset");
        while !handle.display_refresh().await.expect("refresh") {
            tokio::task::yield_now().await;
        }

        // Let the producer fill the event channel behind a full presenter
        for _ in 0..1000 {
            let produced = handle.decoder_stats().await.expect("stats").frames_produced;
            let accepted = handle.presenter_stats().await.expect("stats").accepted;
            if produced >= accepted + 2 {
                break;
            }
            tokio::task::yield_now().await;
        }

        let second = ModelConfig {
            flashing_overlay: true,
            video_source: Some(VideoSource::Synthetic(SyntheticClip::new(3, 10))),
            ..clip(3)
        };
        assert_eq!(
            handle.reset_with_model(second).await.expect("reset"),
            ResetOutcome::Ready
        );
        refresh_to_idle(&handle).await;

        let stats = handle.stats().await.expect("stats");
        assert_eq!(stats.sessions, 2);
        assert!(stats.stale_discarded >= 1);
        assert_eq!(stats.end_of_streams, 1);
        assert_eq!(handle.decoder_stats().await.expect("stats").resets, 2);

        // One frame from the first session, then only the second session's
        let pts = compositor.presented_pts();
        assert_eq!(pts[0], Duration::ZERO);
        assert_eq!(
            pts[1..].to_vec(),
            vec![
                Duration::ZERO,
                Duration::from_millis(100),
                Duration::from_millis(200)
            ]
        );
    }

    #[tokio::test]
    async fn test_compositor_refusal_counts_as_dropped() {
        let inspector = HeadlessCompositor::new();
        let handle = spawn_with(PickyCompositor {
            inner: inspector.clone(),
            refuse: 2,
        });

        handle.reset_with_model(clip(5)).await.expect("reset");
        refresh_to_idle(&handle).await;

        let stats = handle.stats().await.expect("stats");
        assert_eq!(stats.frames_delivered, 4);
        assert_eq!(stats.frames_dropped, 1);
        assert_eq!(inspector.presented_count(), 4);
        assert_eq!(handle.presenter_stats().await.expect("stats").rejected, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_timeout_applies_to_any_decoder() {
        let presenter = LayerPresenter::new(HeadlessCompositor::new()).expect("presenter");
        let config = PipelineConfig::builder()
            .resolve_timeout(Duration::from_secs(2))
            .build();
        let (handle, _task) =
            Pipeline::spawn(config, VideoDecoder::new(StalledResolver), presenter)
                .expect("pipeline");

        let err = handle.reset_with_model(clip(5)).await.expect_err("timeout");
        assert!(matches!(
            err,
            PipelineError::AssetResolution(DecodeError::Timeout(limit))
                if limit == Duration::from_secs(2)
        ));
        assert_eq!(handle.state(), PipelineState::Idle);
        assert_eq!(handle.stats().await.expect("stats").frames_requested, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_resolve_timeout_waits() {
        let presenter = LayerPresenter::new(HeadlessCompositor::new()).expect("presenter");
        let config = PipelineConfig::builder().no_resolve_timeout().build();
        let (handle, _task) =
            Pipeline::spawn(config, VideoDecoder::new(StalledResolver), presenter)
                .expect("pipeline");

        let waited =
            tokio::time::timeout(Duration::from_secs(600), handle.reset_with_model(clip(5))).await;
        assert!(waited.is_err());
        assert_eq!(handle.state(), PipelineState::Resolving);
    }

    #[tokio::test]
    async fn test_layer_commands_report_misuse() {
        let handle = spawn();
        assert!(matches!(
            handle.reattach_video_layer().await,
            Err(PipelineError::Present(PresentError::InvalidState(_)))
        ));

        handle.full_screen(FullScreenEvent::WillEnter).await.expect("will enter");
        handle.full_screen(FullScreenEvent::DidEnter).await.expect("did enter");
        assert!(handle.full_screen(FullScreenEvent::DidExit).await.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_closes_handle() {
        let handle = spawn();
        handle.shutdown().await.expect("shutdown");
        tokio::task::yield_now().await;
        assert!(matches!(
            handle.stats().await,
            Err(PipelineError::ChannelClosed)
        ));
    }
}
