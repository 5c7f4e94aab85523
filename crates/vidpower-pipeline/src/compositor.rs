//! Compositor Seam
//!
//! Actual rendering belongs to an external compositor. A [`Compositor`]
//! hosts two layers (video and overlay) in either the window or the
//! full-screen container and puts frames on screen when told to.
//!
//! [`HeadlessCompositor`] keeps everything in memory. It records the bytes
//! currently on screen and the timestamp of every presented frame, which is
//! what tests and power measurement dry runs inspect.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};
use vidpower_model::FrameBuffer;

use crate::error::PresentError;

/// Layers owned by a presenter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    /// The layer frames are presented on
    Video,

    /// Cosmetic overlay drawn above the video
    Overlay,
}

/// Container a layer lives in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LayerHost {
    /// The regular window content view
    #[default]
    Window,

    /// The full-screen container
    FullScreen,
}

/// Destination for presented frames
pub trait Compositor: Send {
    /// Insert a layer into `host`
    fn attach_layer(&mut self, layer: LayerKind, host: LayerHost) -> Result<(), PresentError>;

    /// Remove a layer from its host
    ///
    /// The layer keeps its contents while detached.
    fn detach_layer(&mut self, layer: LayerKind) -> Result<(), PresentError>;

    /// Put a frame on the video layer
    fn display(&mut self, frame: &FrameBuffer) -> Result<(), PresentError>;

    /// Show or hide the overlay layer
    fn set_overlay_visible(&mut self, visible: bool);

    /// Host new layers are attached to
    fn host(&self) -> LayerHost;

    /// Change the host for subsequent attaches
    fn set_host(&mut self, host: LayerHost);
}

#[derive(Debug, Default)]
struct HeadlessState {
    host: LayerHost,
    video: Option<LayerHost>,
    overlay: Option<LayerHost>,
    visible: Option<Vec<u8>>,
    history: Vec<Duration>,
    overlay_visible: bool,
    overlay_toggles: u64,
}

impl HeadlessState {
    fn slot(&mut self, layer: LayerKind) -> &mut Option<LayerHost> {
        match layer {
            LayerKind::Video => &mut self.video,
            LayerKind::Overlay => &mut self.overlay,
        }
    }
}

/// In-memory compositor
///
/// Clones share state, so a test can keep one clone for inspection while the
/// presenter owns the other.
#[derive(Debug, Clone, Default)]
pub struct HeadlessCompositor {
    state: Arc<Mutex<HeadlessState>>,
}

impl HeadlessCompositor {
    /// Create a compositor with no layers attached
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes currently on the video layer
    pub fn visible_bytes(&self) -> Option<Vec<u8>> {
        self.state.lock().visible.clone()
    }

    /// Presentation timestamps of every frame displayed so far
    pub fn presented_pts(&self) -> Vec<Duration> {
        self.state.lock().history.clone()
    }

    /// Number of frames displayed so far
    pub fn presented_count(&self) -> usize {
        self.state.lock().history.len()
    }

    /// Where a layer is attached, if it is
    pub fn layer_host(&self, layer: LayerKind) -> Option<LayerHost> {
        *self.state.lock().slot(layer)
    }

    /// Whether the overlay is currently shown
    pub fn overlay_visible(&self) -> bool {
        self.state.lock().overlay_visible
    }

    /// Number of overlay visibility changes
    pub fn overlay_toggles(&self) -> u64 {
        self.state.lock().overlay_toggles
    }
}

impl Compositor for HeadlessCompositor {
    fn attach_layer(&mut self, layer: LayerKind, host: LayerHost) -> Result<(), PresentError> {
        let mut state = self.state.lock();
        let slot = state.slot(layer);
        if let Some(current) = slot {
            return Err(PresentError::Compositor(format!(
                "{layer:?} layer already attached to {current:?}"
            )));
        }
        *slot = Some(host);
        debug!("Attached {:?} layer to {:?}", layer, host);
        Ok(())
    }

    fn detach_layer(&mut self, layer: LayerKind) -> Result<(), PresentError> {
        let mut state = self.state.lock();
        match state.slot(layer).take() {
            Some(host) => {
                debug!("Detached {:?} layer from {:?}", layer, host);
                Ok(())
            }
            None => Err(PresentError::Compositor(format!(
                "{layer:?} layer is not attached"
            ))),
        }
    }

    fn display(&mut self, frame: &FrameBuffer) -> Result<(), PresentError> {
        let mut state = self.state.lock();
        if state.video.is_none() {
            return Err(PresentError::Compositor(
                "video layer is not attached".to_string(),
            ));
        }
        state.visible = Some(frame.content());
        state.history.push(frame.pts());
        trace!("Displayed frame {} at {:?}", frame.index(), frame.pts());
        Ok(())
    }

    fn set_overlay_visible(&mut self, visible: bool) {
        let mut state = self.state.lock();
        if state.overlay_visible != visible {
            state.overlay_visible = visible;
            state.overlay_toggles += 1;
        }
    }

    fn host(&self) -> LayerHost {
        self.state.lock().host
    }

    fn set_host(&mut self, host: LayerHost) {
        self.state.lock().host = host;
    }
}
