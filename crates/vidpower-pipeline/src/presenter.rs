//! Frame Presentation
//!
//! A [`Presenter`] owns the video and overlay layers, accepts frames and
//! tells the coordinator whether it wants more. [`LayerPresenter`] is the
//! implementation over any [`Compositor`].
//!
//! # Backpressure
//!
//! Accepted frames wait in a pending queue until the next display refresh
//! moves the oldest one on screen. The queue depth comes from
//! [`ModelConfig::presenter_queue_depth`]: with Direct buffering only one
//! frame may wait, so the presenter stops asking for frames until the
//! compositor has consumed it.
//!
//! # Layer migration
//!
//! Both layers can be detached from their host and reattached later (in a
//! different host, for full-screen transitions). While the video layer is
//! detached nothing is presented: frames queue up to the depth and further
//! ones are rejected. The on-screen content survives the round trip.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, info, trace, warn};
use vidpower_model::{
    FrameBuffer, FrameVariant, ModelConfig, ModelError, SampleBuffer, SurfaceFrame,
};

use crate::compositor::{Compositor, LayerHost, LayerKind};
use crate::error::PresentError;

/// Presenter statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresenterStats {
    /// Frames accepted into the pending queue
    pub accepted: u64,

    /// Frames refused
    pub rejected: u64,

    /// Frames put on screen
    pub presented: u64,
}

/// Consumer side of the pipeline
pub trait Presenter: Send {
    /// Reconfigure for a new session, or go idle with `None`
    ///
    /// Drops pending frames and the on-screen frame, releasing their surfaces.
    fn reset_with_config(&mut self, config: Option<Arc<ModelConfig>>);

    /// Whether another frame would be accepted right now
    fn wants_more_frames(&self) -> bool;

    /// Offer a compressed sample
    fn handle_buffer(&mut self, sample: SampleBuffer) -> bool;

    /// Offer a raw surface frame
    fn handle_frame(&mut self, frame: SurfaceFrame) -> bool;

    /// Offer a frame of either variant
    ///
    /// Returns true if the frame was accepted and scheduled.
    fn present(&mut self, frame: FrameBuffer) -> bool {
        match frame {
            FrameBuffer::CompressedSample(sample) => self.handle_buffer(sample),
            FrameBuffer::RawSurface(frame) => self.handle_frame(frame),
        }
    }

    /// No more frames will arrive this session
    fn no_more_buffers(&mut self);

    /// Frames accepted but not yet on screen
    fn pending_frames(&self) -> usize;

    /// Compositor refresh tick
    ///
    /// Returns true if a new frame went on screen.
    fn display_refresh(&mut self) -> bool;

    /// Host used by subsequent reattaches
    fn host(&self) -> LayerHost;

    /// Change the host used by subsequent reattaches
    fn set_host(&mut self, host: LayerHost);

    /// Take the video layer out of its host
    fn detach_video_layer(&mut self) -> Result<(), PresentError>;

    /// Put the video layer back
    fn reattach_video_layer(&mut self) -> Result<(), PresentError>;

    /// Take the overlay layer out of its host
    fn detach_overlay_layer(&mut self) -> Result<(), PresentError>;

    /// Put the overlay layer back
    fn reattach_overlay_layer(&mut self) -> Result<(), PresentError>;

    /// Bytes of the frame currently on screen
    fn visible_output(&self) -> Option<Vec<u8>>;

    /// Statistics snapshot
    fn stats(&self) -> PresenterStats;
}

/// Presenter over a [`Compositor`]
pub struct LayerPresenter<C> {
    compositor: C,
    config: Option<Arc<ModelConfig>>,
    pending: VecDeque<FrameBuffer>,
    on_screen: Option<FrameBuffer>,
    video_attached: bool,
    overlay_attached: bool,
    overlay_visible: bool,
    end_of_stream: bool,
    stats: PresenterStats,
}

impl<C: Compositor> LayerPresenter<C> {
    /// Create a presenter and attach both layers to the compositor's host
    ///
    /// # Errors
    ///
    /// Returns an error if the compositor refuses either layer.
    pub fn new(mut compositor: C) -> Result<Self, PresentError> {
        let host = compositor.host();
        compositor.attach_layer(LayerKind::Video, host)?;
        compositor.attach_layer(LayerKind::Overlay, host)?;

        Ok(Self {
            compositor,
            config: None,
            pending: VecDeque::new(),
            on_screen: None,
            video_attached: true,
            overlay_attached: true,
            overlay_visible: false,
            end_of_stream: false,
            stats: PresenterStats::default(),
        })
    }

    /// The underlying compositor
    pub fn compositor(&self) -> &C {
        &self.compositor
    }

    /// Current session config
    pub fn config(&self) -> Option<&ModelConfig> {
        self.config.as_deref()
    }

    fn queue_depth(&self) -> usize {
        self.config
            .as_deref()
            .map_or(0, ModelConfig::presenter_queue_depth)
    }

    fn reject(&mut self, index: u64, reason: &str) -> bool {
        self.stats.rejected += 1;
        debug!("Rejected frame {}: {}", index, reason);
        false
    }

    /// Common admission checks; returns the refusal reason
    fn refusal(&self, variant: FrameVariant) -> Option<&'static str> {
        let Some(config) = self.config.as_deref() else {
            return Some("no active config");
        };
        if self.end_of_stream {
            return Some("after end of stream");
        }
        if config.frame_variant() != variant {
            return Some("wrong frame variant");
        }
        if self.pending.len() >= self.queue_depth() {
            return Some("pending queue full");
        }
        None
    }

    fn accept(&mut self, frame: FrameBuffer) -> bool {
        trace!("Accepted frame {} at {:?}", frame.index(), frame.pts());
        self.pending.push_back(frame);
        self.stats.accepted += 1;
        true
    }

    fn toggle_overlay(&mut self) {
        let flashing = self
            .config
            .as_deref()
            .is_some_and(|config| config.flashing_overlay);
        if flashing && self.overlay_attached {
            self.overlay_visible = !self.overlay_visible;
            self.compositor.set_overlay_visible(self.overlay_visible);
        }
    }
}

impl<C: Compositor> Presenter for LayerPresenter<C> {
    fn reset_with_config(&mut self, config: Option<Arc<ModelConfig>>) {
        match config.as_deref() {
            Some(config) => info!("Presenter configured: {}", config.summary()),
            None => debug!("Presenter idle"),
        }
        self.config = config;
        self.pending.clear();
        self.on_screen = None;
        self.end_of_stream = false;
        if self.overlay_visible {
            self.overlay_visible = false;
            self.compositor.set_overlay_visible(false);
        }
    }

    fn wants_more_frames(&self) -> bool {
        self.config.is_some() && !self.end_of_stream && self.pending.len() < self.queue_depth()
    }

    fn handle_buffer(&mut self, sample: SampleBuffer) -> bool {
        if let Some(reason) = self.refusal(FrameVariant::CompressedSample) {
            return self.reject(sample.index(), reason);
        }
        self.accept(FrameBuffer::CompressedSample(sample))
    }

    fn handle_frame(&mut self, frame: SurfaceFrame) -> bool {
        if let Some(reason) = self.refusal(FrameVariant::RawSurface) {
            return self.reject(frame.index, reason);
        }
        let expected = self.config.as_deref().map(|config| config.format);
        if let Some(expected) = expected.filter(|&expected| expected != frame.format()) {
            let err = ModelError::FormatMismatch {
                expected,
                actual: frame.format(),
            };
            warn!("Rejected frame {}: {}", frame.index, err);
            self.stats.rejected += 1;
            return false;
        }
        self.accept(FrameBuffer::RawSurface(frame))
    }

    fn no_more_buffers(&mut self) {
        if !self.end_of_stream {
            debug!("No more buffers; {} frame(s) still pending", self.pending.len());
        }
        self.end_of_stream = true;
    }

    fn pending_frames(&self) -> usize {
        self.pending.len()
    }

    fn display_refresh(&mut self) -> bool {
        self.toggle_overlay();

        if !self.video_attached {
            return false;
        }
        let Some(frame) = self.pending.pop_front() else {
            return false;
        };

        match self.compositor.display(&frame) {
            Ok(()) => {
                // Replacing the previous frame releases its surface
                self.on_screen = Some(frame);
                self.stats.presented += 1;
                true
            }
            Err(e) => {
                warn!("Compositor refused frame {}: {}", frame.index(), e);
                self.stats.rejected += 1;
                false
            }
        }
    }

    fn host(&self) -> LayerHost {
        self.compositor.host()
    }

    fn set_host(&mut self, host: LayerHost) {
        self.compositor.set_host(host);
    }

    fn detach_video_layer(&mut self) -> Result<(), PresentError> {
        if !self.video_attached {
            return Err(PresentError::invalid_state("video layer already detached"));
        }
        self.compositor.detach_layer(LayerKind::Video)?;
        self.video_attached = false;
        debug!("Video layer detached");
        Ok(())
    }

    fn reattach_video_layer(&mut self) -> Result<(), PresentError> {
        if self.video_attached {
            return Err(PresentError::invalid_state("video layer is not detached"));
        }
        let host = self.compositor.host();
        self.compositor.attach_layer(LayerKind::Video, host)?;
        self.video_attached = true;
        debug!("Video layer reattached to {:?}", host);
        Ok(())
    }

    fn detach_overlay_layer(&mut self) -> Result<(), PresentError> {
        if !self.overlay_attached {
            return Err(PresentError::invalid_state("overlay layer already detached"));
        }
        self.compositor.detach_layer(LayerKind::Overlay)?;
        self.overlay_attached = false;
        Ok(())
    }

    fn reattach_overlay_layer(&mut self) -> Result<(), PresentError> {
        if self.overlay_attached {
            return Err(PresentError::invalid_state("overlay layer is not detached"));
        }
        let host = self.compositor.host();
        self.compositor.attach_layer(LayerKind::Overlay, host)?;
        self.overlay_attached = true;
        Ok(())
    }

    fn visible_output(&self) -> Option<Vec<u8>> {
        self.on_screen.as_ref().map(FrameBuffer::content)
    }

    fn stats(&self) -> PresenterStats {
        self.stats
    }
}
