//! Frame Production
//!
//! [`VideoDecoder`] resolves a session's asset and produces frames on demand.
//! It never free-runs: frames are only produced in answer to
//! [`Decoder::request_frames`].
//!
//! # Session lifecycle
//!
//! ```text
//!   reset(config, sink) ──► resolving ──► ReadyHandle resolves Ready
//!          │                    │
//!          │                    └──────► ReadyHandle resolves Failed(err)
//!          ▼
//!   a later reset/stop ─────────────────► ReadyHandle resolves Cancelled
//! ```
//!
//! Every reset bumps an internal epoch. Background work (asset resolution,
//! the repeated producer loop) carries the epoch it was started for and
//! checks it under the state lock before touching anything, so work for a
//! superseded config can never complete a newer session's handle or emit
//! into it.
//!
//! # Delivery modes
//!
//! - **Push-once** (raw surface layers): each `request_frames` call emits
//!   exactly one [`DecoderEvent`].
//! - **Repeated** (sample buffer layers): the first call starts a producer
//!   task that keeps emitting until end of stream. It paces itself on the
//!   bounded sink channel: a send only completes once the consumer makes room.
//!
//! # Examples
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//! use vidpower_decoder::{ClipResolver, Decoder, FrameSink, ReadyOutcome, VideoDecoder};
//!
//! let (tx, mut rx) = mpsc::channel(1);
//! let mut decoder = VideoDecoder::new(ClipResolver::new());
//!
//! let ready = decoder.reset(Arc::new(config), FrameSink::new(1, tx));
//! assert!(matches!(ready.await, ReadyOutcome::Ready));
//!
//! decoder.request_frames();
//! let event = rx.recv().await;
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use vidpower_model::{FrameBuffer, FrameVariant, ModelConfig, SurfaceFrame, SurfacePool};

use crate::error::DecodeError;
use crate::source::{AssetResolver, MediaTrack};

/// Identifier of a pipeline session
pub type SessionId = u64;

/// Something the decoder reports to its consumer
#[derive(Debug)]
pub enum DecoderEvent {
    /// A frame is ready for presentation
    Frame {
        /// Session the frame belongs to
        session: SessionId,
        /// The frame
        frame: FrameBuffer,
    },

    /// A frame was skipped
    Dropped {
        /// Session the frame belonged to
        session: SessionId,
        /// Why it was skipped
        reason: DecodeError,
    },

    /// The track has no more samples
    ///
    /// Emitted exactly once per session.
    EndOfStream {
        /// Session that ended
        session: SessionId,
    },
}

impl DecoderEvent {
    /// Session this event belongs to
    pub fn session(&self) -> SessionId {
        match self {
            Self::Frame { session, .. }
            | Self::Dropped { session, .. }
            | Self::EndOfStream { session } => *session,
        }
    }
}

/// Destination for a session's decoder events
///
/// Wraps a bounded channel sender and stamps every event with the session id.
#[derive(Debug, Clone)]
pub struct FrameSink {
    session: SessionId,
    tx: mpsc::Sender<DecoderEvent>,
}

impl FrameSink {
    /// Create a sink for a session
    pub fn new(session: SessionId, tx: mpsc::Sender<DecoderEvent>) -> Self {
        Self { session, tx }
    }

    /// Session this sink belongs to
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Send an event, waiting for channel capacity
    ///
    /// Returns false if the receiver is gone.
    pub async fn send(&self, event: DecoderEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }
}

/// How a reset ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadyOutcome {
    /// The decoder can produce frames for the new config
    Ready,

    /// The asset could not be resolved
    Failed(DecodeError),

    /// A later reset or stop superseded this one
    Cancelled,
}

impl ReadyOutcome {
    /// Check if the decoder became ready
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Completion of a [`Decoder::reset`]
///
/// Resolves exactly once. If the decoder drops the completion without
/// resolving it (stop, teardown) the handle resolves
/// [`ReadyOutcome::Cancelled`].
#[derive(Debug)]
pub struct ReadyHandle {
    rx: oneshot::Receiver<ReadyOutcome>,
}

impl ReadyHandle {
    /// Create a handle together with its completion side
    pub fn channel() -> (oneshot::Sender<ReadyOutcome>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }
}

impl Future for ReadyHandle {
    type Output = ReadyOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.rx
            .poll_unpin(cx)
            .map(|result| result.unwrap_or(ReadyOutcome::Cancelled))
    }
}

/// Decoder statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Resets issued
    pub resets: u64,

    /// Resets that resolved an asset
    pub resolutions: u64,

    /// Resets whose asset failed to resolve
    pub resolution_failures: u64,

    /// Frames emitted
    pub frames_produced: u64,

    /// Frames skipped (corrupt sample, no surface)
    pub frames_dropped: u64,

    /// Sessions that reached end of stream
    pub end_of_streams: u64,
}

/// Frame producer
///
/// Implementations must be driven from within a Tokio runtime.
pub trait Decoder: Send {
    /// Start a new session
    ///
    /// Cancels everything belonging to the previous session. The returned
    /// handle resolves once the asset is resolved (or fails, or is cancelled).
    fn reset(&mut self, config: Arc<ModelConfig>, sink: FrameSink) -> ReadyHandle;

    /// Demand frames
    ///
    /// Ignored before the session is ready and after end of stream.
    fn request_frames(&mut self);

    /// Cancel resolution and production
    ///
    /// Idempotent. A pending ready handle resolves `Cancelled`.
    fn stop(&mut self);

    /// Statistics snapshot
    fn stats(&self) -> DecoderStats;
}

/// Per-session state shared with background tasks
#[derive(Default)]
struct DecoderState {
    epoch: u64,
    config: Option<Arc<ModelConfig>>,
    sink: Option<FrameSink>,
    ready_tx: Option<oneshot::Sender<ReadyOutcome>>,
    track: Option<Box<dyn MediaTrack>>,
    pool: Option<SurfacePool>,
    end_of_stream: bool,
    stats: DecoderStats,
}

impl DecoderState {
    /// Forget the current session
    ///
    /// The pending ready handle, if any, resolves `Cancelled`.
    fn invalidate(&mut self) {
        self.epoch += 1;
        if let Some(tx) = self.ready_tx.take() {
            let _ = tx.send(ReadyOutcome::Cancelled);
        }
        self.config = None;
        self.sink = None;
        self.track = None;
        self.pool = None;
        self.end_of_stream = false;
    }

    /// Complete asset resolution for `epoch`
    fn finish_resolution(
        &mut self,
        epoch: u64,
        result: crate::error::Result<Box<dyn MediaTrack>>,
    ) {
        if self.epoch != epoch {
            trace!("Discarding resolution for stale epoch {}", epoch);
            return;
        }
        let Some(tx) = self.ready_tx.take() else {
            return;
        };

        match result {
            Ok(track) => {
                self.pool = self.config.as_deref().and_then(|config| {
                    (config.frame_variant() == FrameVariant::RawSurface).then(|| {
                        SurfacePool::new(
                            config.buffering,
                            config.pool_capacity(),
                            config.format,
                            config.frame_size,
                        )
                    })
                });
                self.track = Some(track);
                self.stats.resolutions += 1;
                info!("Decoder ready (epoch {})", epoch);
                let _ = tx.send(ReadyOutcome::Ready);
            }
            Err(e) => {
                self.stats.resolution_failures += 1;
                warn!("Asset resolution failed: {}", e);
                let _ = tx.send(ReadyOutcome::Failed(e));
            }
        }
    }

    /// Produce the next event for the current session
    ///
    /// Returns `None` when the session is not ready or already ended.
    fn produce(&mut self) -> Option<(FrameSink, DecoderEvent)> {
        if self.end_of_stream {
            return None;
        }
        let Self {
            config,
            sink,
            track,
            pool,
            end_of_stream,
            stats,
            ..
        } = self;
        let config = config.as_deref()?;
        let sink = sink.clone()?;
        let track = track.as_mut()?;
        let session = sink.session();

        let event = match track.read_sample() {
            None => {
                *end_of_stream = true;
                stats.end_of_streams += 1;
                debug!("Session {} reached end of stream", session);
                return Some((sink, DecoderEvent::EndOfStream { session }));
            }
            Some(Err(reason)) => DecoderEvent::Dropped { session, reason },
            Some(Ok(sample)) => match config.frame_variant() {
                FrameVariant::CompressedSample => DecoderEvent::Frame {
                    session,
                    frame: FrameBuffer::CompressedSample(sample),
                },
                FrameVariant::RawSurface => {
                    let decoded = pool
                        .as_ref()
                        .ok_or(DecodeError::NoVideoTrack)
                        .and_then(|pool| pool.acquire().map_err(DecodeError::from))
                        .and_then(|mut surface| {
                            track.decode_into(&sample, &mut surface)?;
                            Ok(surface)
                        });
                    match decoded {
                        Ok(surface) => DecoderEvent::Frame {
                            session,
                            frame: FrameBuffer::RawSurface(SurfaceFrame {
                                index: sample.index(),
                                pts: sample.pts(),
                                surface,
                            }),
                        },
                        Err(reason) => DecoderEvent::Dropped { session, reason },
                    }
                }
            },
        };

        match &event {
            DecoderEvent::Frame { frame, .. } => {
                stats.frames_produced += 1;
                trace!("Produced frame {} at {:?}", frame.index(), frame.pts());
            }
            DecoderEvent::Dropped { reason, .. } => {
                stats.frames_dropped += 1;
                warn!("Dropping frame: {}", reason);
            }
            DecoderEvent::EndOfStream { .. } => {}
        }

        Some((sink, event))
    }
}

/// Decoder backed by an [`AssetResolver`]
pub struct VideoDecoder<R> {
    resolver: Arc<R>,
    resolve_timeout: Option<Duration>,
    state: Arc<Mutex<DecoderState>>,
    resolve_task: Option<JoinHandle<()>>,
    producer_task: Option<JoinHandle<()>>,
}

impl<R: AssetResolver> VideoDecoder<R> {
    /// Create a decoder
    pub fn new(resolver: R) -> Self {
        Self {
            resolver: Arc::new(resolver),
            resolve_timeout: None,
            state: Arc::new(Mutex::new(DecoderState::default())),
            resolve_task: None,
            producer_task: None,
        }
    }

    /// Fail resolution that takes longer than `timeout`
    #[must_use]
    pub fn with_resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = Some(timeout);
        self
    }

    /// Check if the current session can produce frames
    pub fn is_ready(&self) -> bool {
        let state = self.state.lock();
        state.track.is_some() && !state.end_of_stream
    }

    /// Surface pool of the current session, if it uses raw surfaces
    pub fn surface_pool(&self) -> Option<SurfacePool> {
        self.state.lock().pool.clone()
    }

    fn abort_tasks(&mut self) {
        if let Some(task) = self.resolve_task.take() {
            task.abort();
        }
        if let Some(task) = self.producer_task.take() {
            task.abort();
        }
    }

    fn producer_running(&self) -> bool {
        self.producer_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl<R: AssetResolver> Decoder for VideoDecoder<R> {
    fn reset(&mut self, config: Arc<ModelConfig>, sink: FrameSink) -> ReadyHandle {
        self.abort_tasks();

        let (tx, handle) = ReadyHandle::channel();
        let source = config.video_source.clone();
        let session = sink.session();

        let epoch = {
            let mut state = self.state.lock();
            state.invalidate();
            state.stats.resets += 1;
            state.config = Some(config);
            state.sink = Some(sink);
            state.ready_tx = Some(tx);
            state.epoch
        };

        let Some(source) = source else {
            self.state.lock().finish_resolution(epoch, Err(DecodeError::NoSource));
            return handle;
        };

        info!("Decoder reset for session {}: resolving {}", session, source.describe());

        let resolving = self.resolver.resolve_first_track(&source);
        let timeout = self.resolve_timeout;
        let state = Arc::clone(&self.state);

        self.resolve_task = Some(tokio::spawn(async move {
            let result = match timeout {
                Some(limit) => tokio::time::timeout(limit, resolving)
                    .await
                    .unwrap_or(Err(DecodeError::Timeout(limit))),
                None => resolving.await,
            };
            state.lock().finish_resolution(epoch, result);
        }));

        handle
    }

    fn request_frames(&mut self) {
        let (epoch, repeated) = {
            let state = self.state.lock();
            if state.track.is_none() || state.end_of_stream {
                debug!("Frame request ignored: decoder not producing");
                return;
            }
            let repeated = state
                .config
                .as_deref()
                .is_some_and(ModelConfig::will_request_frames_repeatedly);
            (state.epoch, repeated)
        };

        let state = Arc::clone(&self.state);

        if repeated {
            if self.producer_running() {
                trace!("Producer already running");
                return;
            }
            debug!("Starting repeated producer (epoch {})", epoch);
            self.producer_task = Some(tokio::spawn(async move {
                loop {
                    let produced = {
                        let mut guard = state.lock();
                        if guard.epoch != epoch {
                            break;
                        }
                        guard.produce()
                    };
                    let Some((sink, event)) = produced else {
                        break;
                    };
                    let finished = matches!(event, DecoderEvent::EndOfStream { .. });
                    if !sink.send(event).await || finished {
                        break;
                    }
                }
                trace!("Producer loop for epoch {} finished", epoch);
            }));
        } else {
            self.producer_task = Some(tokio::spawn(async move {
                let produced = {
                    let mut guard = state.lock();
                    if guard.epoch != epoch {
                        return;
                    }
                    guard.produce()
                };
                if let Some((sink, event)) = produced {
                    sink.send(event).await;
                }
            }));
        }
    }

    fn stop(&mut self) {
        self.abort_tasks();
        self.state.lock().invalidate();
        debug!("Decoder stopped");
    }

    fn stats(&self) -> DecoderStats {
        self.state.lock().stats.clone()
    }
}

impl<R> Drop for VideoDecoder<R> {
    fn drop(&mut self) {
        if let Some(task) = self.resolve_task.take() {
            task.abort();
        }
        if let Some(task) = self.producer_task.take() {
            task.abort();
        }
    }
}
