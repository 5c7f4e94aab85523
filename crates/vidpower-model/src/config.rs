//! Session Configuration
//!
//! [`ModelConfig`] describes one playback session: which presentation
//! mechanism is used, how surfaces are buffered, which pixel format the
//! decoder emits and how surfaces are delivered to the compositor.
//!
//! A config is a plain value. The pipeline keeps it behind an `Arc` and never
//! mutates it; every change (including the tag-driven UI actions in
//! [`Selection`]) produces a new config that replaces the old one wholesale.
//!
//! # Examples
//!
//! ```rust
//! use vidpower_model::{Buffering, LayerClass, ModelConfig, PixelBufferFlag, PixelFormat};
//!
//! // Using builder pattern
//! let config = ModelConfig::builder()
//!     .layer_class(LayerClass::CaLayer)
//!     .buffering(Buffering::Direct)
//!     .format(PixelFormat::Yuv420BiPlanarVideoRange)
//!     .pixel_buffer(PixelBufferFlag::CompositorSurfaceBacked.into())
//!     .build();
//! assert!(config.can_handle_buffers());
//!
//! // Using struct literal with defaults
//! let config = ModelConfig {
//!     layer_class: LayerClass::SampleBufferDisplayLayer,
//!     ..Default::default()
//! };
//! assert!(config.will_request_frames_repeatedly());
//! ```

use std::path::PathBuf;
use std::time::Duration;

use enumflags2::{bitflags, BitFlags};

use crate::error::{ModelError, Result};
use crate::format::PixelFormat;
use crate::tags::{pixel_buffer_tag, OptionTag};

/// Presentation mechanism
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LayerClass {
    /// Self-decoding layer fed with compressed sample buffers
    ///
    /// The layer pulls samples on its own schedule.
    #[default]
    SampleBufferDisplayLayer,

    /// Plain compositor layer whose contents are a decoded raw surface
    CaLayer,
}

/// Surface buffering strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Buffering {
    /// Reuse a fixed pool of surfaces
    #[default]
    Direct,

    /// Allocate a fresh surface for every frame
    Recreated,
}

/// How a raw surface is imported for presentation
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelBufferFlag {
    /// Surface is importable as a GPU texture
    GpuTextureBacked = 0b01,

    /// Surface is backed by a compositor-shareable surface object
    CompositorSurfaceBacked = 0b10,
}

/// Which [`FrameBuffer`](crate::FrameBuffer) variant a session produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameVariant {
    /// Compressed sample buffers
    CompressedSample,
    /// Raw pixel surfaces
    RawSurface,
}

/// A generated test clip
///
/// Used for tests, demos and power measurements that need a reproducible
/// source without a container decoder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SyntheticClip {
    /// Number of frames in the clip
    pub frame_count: u32,

    /// Frames per second
    pub frame_rate: u32,

    /// Frame indices whose samples fail to decode
    pub corrupt_frames: Vec<u32>,
}

impl SyntheticClip {
    /// Create a clip with no corrupt frames
    #[must_use]
    pub fn new(frame_count: u32, frame_rate: u32) -> Self {
        Self {
            frame_count,
            frame_rate,
            corrupt_frames: Vec::new(),
        }
    }

    /// Mark a frame as failing to decode
    #[must_use]
    pub fn with_corrupt_frame(mut self, index: u32) -> Self {
        self.corrupt_frames.push(index);
        self
    }

    /// Duration of a single frame
    #[must_use]
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs(1) / self.frame_rate.max(1)
    }

    /// Total clip duration
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.frame_duration() * self.frame_count
    }
}

impl Default for SyntheticClip {
    fn default() -> Self {
        Self::new(300, 30)
    }
}

/// Media asset to decode
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VideoSource {
    /// Media file on disk, decoded by an external service
    File(PathBuf),

    /// Generated test clip
    Synthetic(SyntheticClip),
}

impl VideoSource {
    /// Short human readable description for logs
    pub fn describe(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Synthetic(clip) => {
                format!("synthetic clip ({} frames @ {} fps)", clip.frame_count, clip.frame_rate)
            }
        }
    }
}

/// Configuration of one playback session
///
/// Use [`ModelConfig::builder()`] or struct literal syntax with
/// [`Default::default()`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    /// Presentation mechanism (default: SampleBufferDisplayLayer)
    ///
    /// Selects the frame variant and the presenter code path.
    pub layer_class: LayerClass,

    /// Surface buffering strategy (default: Direct)
    pub buffering: Buffering,

    /// Pixel format of raw surfaces (default: Unspecified)
    ///
    /// Ignored on the compressed sample path.
    pub format: PixelFormat,

    /// Raw surface delivery flags (default: empty)
    pub pixel_buffer: BitFlags<PixelBufferFlag>,

    /// Media asset to decode (default: None)
    pub video_source: Option<VideoSource>,

    /// Toggle a flashing overlay on every refresh (default: false)
    ///
    /// Cosmetic; forces extra compositing work.
    pub flashing_overlay: bool,

    /// Raw surface dimensions (default: 1920x1080)
    pub frame_size: (u32, u32),

    /// Surfaces in the Direct pool (default: 3)
    ///
    /// One surface is on screen, one may be pending, the rest give the
    /// decoder room to work ahead.
    pub direct_pool_size: usize,

    /// Live surface bound for Recreated buffering (default: 4)
    ///
    /// Allocation beyond this bound is treated as a rejected frame.
    pub max_in_flight_recreated: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            layer_class: LayerClass::SampleBufferDisplayLayer,
            buffering: Buffering::Direct,
            format: PixelFormat::Unspecified,
            pixel_buffer: BitFlags::empty(),
            video_source: None,
            flashing_overlay: false,
            frame_size: (1920, 1080),
            direct_pool_size: 3,
            max_in_flight_recreated: 4,
        }
    }
}

impl ModelConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> ModelConfigBuilder {
        ModelConfigBuilder::default()
    }

    /// Validate configuration and return any issues
    ///
    /// Returns `Ok(())` if configuration is valid, or a list of issues.
    /// Capability (whether the combination can be presented at all) is a
    /// separate question answered by [`ModelConfig::can_handle_buffers`].
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut issues = Vec::new();

        if self.frame_size.0 == 0 || self.frame_size.1 == 0 {
            issues.push("frame_size must be non-zero".to_string());
        }

        if self.direct_pool_size < 2 {
            issues.push("direct_pool_size must be at least 2".to_string());
        }

        if self.direct_pool_size > 16 {
            issues.push("direct_pool_size should not exceed 16".to_string());
        }

        if self.max_in_flight_recreated < 2 {
            issues.push("max_in_flight_recreated must be at least 2".to_string());
        }

        if let Some(VideoSource::Synthetic(clip)) = &self.video_source {
            if clip.frame_rate == 0 {
                issues.push("synthetic clip frame_rate must be at least 1".to_string());
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }

    /// Validate, folding the issues into a [`ModelError`]
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|issues| ModelError::invalid_config(issues.join(", ")))
    }

    /// Whether this combination can be presented end-to-end
    ///
    /// Sample buffer layers decode for themselves and accept anything. Raw
    /// surfaces need a concrete pixel format and at least one way to import
    /// the surface into the compositor.
    #[must_use]
    pub fn can_handle_buffers(&self) -> bool {
        match self.layer_class {
            LayerClass::SampleBufferDisplayLayer => true,
            LayerClass::CaLayer => {
                self.format != PixelFormat::Unspecified && !self.pixel_buffer.is_empty()
            }
        }
    }

    /// Whether the presentation mechanism pulls frames on its own schedule
    ///
    /// When true the decoder keeps producing after a single request; when
    /// false every request yields at most one frame.
    #[must_use]
    pub fn will_request_frames_repeatedly(&self) -> bool {
        self.layer_class == LayerClass::SampleBufferDisplayLayer
    }

    /// Frame variant produced for this session
    #[must_use]
    pub fn frame_variant(&self) -> FrameVariant {
        match self.layer_class {
            LayerClass::SampleBufferDisplayLayer => FrameVariant::CompressedSample,
            LayerClass::CaLayer => FrameVariant::RawSurface,
        }
    }

    /// Capacity of the surface pool backing this session
    #[must_use]
    pub fn pool_capacity(&self) -> usize {
        match self.buffering {
            Buffering::Direct => self.direct_pool_size,
            Buffering::Recreated => self.max_in_flight_recreated,
        }
    }

    /// Frames the presenter may hold waiting for the compositor
    ///
    /// Direct buffering allows a single pending frame so a reused surface is
    /// never overwritten while it is still queued. Recreated buffering may
    /// queue up to its in-flight bound, less the surface on screen.
    #[must_use]
    pub fn presenter_queue_depth(&self) -> usize {
        match self.buffering {
            Buffering::Direct => 1,
            Buffering::Recreated => self.max_in_flight_recreated.saturating_sub(1).max(1),
        }
    }

    /// Produce a new config with one UI selection applied
    ///
    /// The receiver is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownTag`] for tags with no mapping.
    pub fn apply(&self, selection: Selection) -> Result<Self> {
        let mut next = self.clone();
        match selection {
            Selection::LayerClass(tag) => next.layer_class = LayerClass::from_tag(tag)?,
            Selection::Buffering(tag) => next.buffering = Buffering::from_tag(tag)?,
            Selection::Format(tag) => next.format = PixelFormat::from_tag(tag)?,
            Selection::TogglePixelBuffer(tag) => {
                next.pixel_buffer.toggle(PixelBufferFlag::from_tag(tag)?);
            }
            Selection::FlashingOverlay(enabled) => next.flashing_overlay = enabled,
            Selection::VideoSource(source) => next.video_source = source,
        }
        Ok(next)
    }

    /// One-line description for logs
    pub fn summary(&self) -> String {
        format!(
            "{:?}/{:?}/{:?} pixel_buffer={} source={}",
            self.layer_class,
            self.buffering,
            self.format,
            pixel_buffer_tag(self.pixel_buffer),
            self.video_source
                .as_ref()
                .map_or_else(|| "none".to_string(), VideoSource::describe),
        )
    }
}

/// A configuration UI action, expressed with integer tags
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Layer class radio group
    LayerClass(i64),
    /// Buffering radio group
    Buffering(i64),
    /// Pixel format popup
    Format(i64),
    /// Pixel buffer checkbox (toggles one flag)
    TogglePixelBuffer(i64),
    /// Flashing overlay checkbox
    FlashingOverlay(bool),
    /// Chosen media asset
    VideoSource(Option<VideoSource>),
}

/// Builder for [`ModelConfig`]
#[derive(Debug, Clone, Default)]
pub struct ModelConfigBuilder {
    layer_class: Option<LayerClass>,
    buffering: Option<Buffering>,
    format: Option<PixelFormat>,
    pixel_buffer: Option<BitFlags<PixelBufferFlag>>,
    video_source: Option<VideoSource>,
    flashing_overlay: Option<bool>,
    frame_size: Option<(u32, u32)>,
    direct_pool_size: Option<usize>,
    max_in_flight_recreated: Option<usize>,
}

impl ModelConfigBuilder {
    /// Set presentation mechanism
    #[must_use]
    pub fn layer_class(mut self, layer_class: LayerClass) -> Self {
        self.layer_class = Some(layer_class);
        self
    }

    /// Set buffering strategy
    #[must_use]
    pub fn buffering(mut self, buffering: Buffering) -> Self {
        self.buffering = Some(buffering);
        self
    }

    /// Set raw surface pixel format
    #[must_use]
    pub fn format(mut self, format: PixelFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Set raw surface delivery flags
    #[must_use]
    pub fn pixel_buffer(mut self, flags: BitFlags<PixelBufferFlag>) -> Self {
        self.pixel_buffer = Some(flags);
        self
    }

    /// Set the media asset
    #[must_use]
    pub fn video_source(mut self, source: VideoSource) -> Self {
        self.video_source = Some(source);
        self
    }

    /// Enable the flashing overlay
    #[must_use]
    pub fn flashing_overlay(mut self, enable: bool) -> Self {
        self.flashing_overlay = Some(enable);
        self
    }

    /// Set raw surface dimensions
    #[must_use]
    pub fn frame_size(mut self, width: u32, height: u32) -> Self {
        self.frame_size = Some((width, height));
        self
    }

    /// Set Direct pool size
    #[must_use]
    pub fn direct_pool_size(mut self, size: usize) -> Self {
        self.direct_pool_size = Some(size);
        self
    }

    /// Set Recreated live surface bound
    #[must_use]
    pub fn max_in_flight_recreated(mut self, max: usize) -> Self {
        self.max_in_flight_recreated = Some(max);
        self
    }

    /// Build the configuration
    ///
    /// Returns a [`ModelConfig`] with builder values overriding defaults.
    #[must_use]
    pub fn build(self) -> ModelConfig {
        let defaults = ModelConfig::default();

        ModelConfig {
            layer_class: self.layer_class.unwrap_or(defaults.layer_class),
            buffering: self.buffering.unwrap_or(defaults.buffering),
            format: self.format.unwrap_or(defaults.format),
            pixel_buffer: self.pixel_buffer.unwrap_or(defaults.pixel_buffer),
            video_source: self.video_source.or(defaults.video_source),
            flashing_overlay: self.flashing_overlay.unwrap_or(defaults.flashing_overlay),
            frame_size: self.frame_size.unwrap_or(defaults.frame_size),
            direct_pool_size: self.direct_pool_size.unwrap_or(defaults.direct_pool_size),
            max_in_flight_recreated: self
                .max_in_flight_recreated
                .unwrap_or(defaults.max_in_flight_recreated),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_config() -> ModelConfig {
        ModelConfig::builder()
            .layer_class(LayerClass::CaLayer)
            .format(PixelFormat::Yuv420BiPlanarVideoRange)
            .pixel_buffer(PixelBufferFlag::GpuTextureBacked.into())
            .build()
    }

    #[test]
    fn test_default_config() {
        let config = ModelConfig::default();

        assert_eq!(config.layer_class, LayerClass::SampleBufferDisplayLayer);
        assert_eq!(config.buffering, Buffering::Direct);
        assert_eq!(config.direct_pool_size, 3);
        assert!(config.video_source.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = ModelConfig::builder()
            .buffering(Buffering::Recreated)
            .frame_size(640, 480)
            .max_in_flight_recreated(6)
            .flashing_overlay(true)
            .video_source(VideoSource::Synthetic(SyntheticClip::new(10, 30)))
            .build();

        assert_eq!(config.buffering, Buffering::Recreated);
        assert_eq!(config.frame_size, (640, 480));
        assert_eq!(config.pool_capacity(), 6);
        assert!(config.flashing_overlay);
        assert!(config.video_source.is_some());
    }

    #[test]
    fn test_config_validation() {
        let invalid = ModelConfig {
            direct_pool_size: 1,
            frame_size: (0, 1080),
            ..Default::default()
        };
        let issues = invalid.validate().expect_err("invalid config");
        assert_eq!(issues.len(), 2);
        assert!(matches!(invalid.check(), Err(ModelError::InvalidConfig(_))));

        let zero_fps = ModelConfig::builder()
            .video_source(VideoSource::Synthetic(SyntheticClip::new(10, 0)))
            .build();
        assert!(zero_fps.validate().is_err());
    }

    #[test]
    fn test_can_handle_buffers() {
        assert!(ModelConfig::default().can_handle_buffers());
        assert!(raw_config().can_handle_buffers());

        let unspecified = ModelConfig {
            format: PixelFormat::Unspecified,
            ..raw_config()
        };
        assert!(!unspecified.can_handle_buffers());

        let no_delivery = ModelConfig {
            pixel_buffer: BitFlags::empty(),
            ..raw_config()
        };
        assert!(!no_delivery.can_handle_buffers());
    }

    #[test]
    fn test_frame_scheduling_capabilities() {
        let sample = ModelConfig::default();
        assert!(sample.will_request_frames_repeatedly());
        assert_eq!(sample.frame_variant(), FrameVariant::CompressedSample);

        let raw = raw_config();
        assert!(!raw.will_request_frames_repeatedly());
        assert_eq!(raw.frame_variant(), FrameVariant::RawSurface);
    }

    #[test]
    fn test_presenter_queue_depth() {
        assert_eq!(raw_config().presenter_queue_depth(), 1);

        let recreated = ModelConfig {
            buffering: Buffering::Recreated,
            max_in_flight_recreated: 4,
            ..raw_config()
        };
        assert_eq!(recreated.presenter_queue_depth(), 3);
    }

    #[test]
    fn test_apply_selection_returns_new_config() {
        let original = ModelConfig::default();

        let next = original.apply(Selection::LayerClass(1)).expect("known tag");
        assert_eq!(next.layer_class, LayerClass::CaLayer);
        assert_eq!(original.layer_class, LayerClass::SampleBufferDisplayLayer);

        let next = next.apply(Selection::TogglePixelBuffer(2)).expect("known tag");
        assert!(next.pixel_buffer.contains(PixelBufferFlag::CompositorSurfaceBacked));
        let next = next.apply(Selection::TogglePixelBuffer(2)).expect("known tag");
        assert!(next.pixel_buffer.is_empty());

        let next = next.apply(Selection::Format(3)).expect("known tag");
        assert_eq!(next.format, PixelFormat::Yuv420BiPlanarFullRange);

        assert!(original.apply(Selection::Buffering(9)).is_err());
    }

    #[test]
    fn test_clip_timing() {
        let clip = SyntheticClip::new(10, 25);
        assert_eq!(clip.frame_duration(), Duration::from_millis(40));
        assert_eq!(clip.duration(), Duration::from_millis(400));
    }

    #[test]
    fn test_summary() {
        let summary = raw_config().summary();
        assert!(summary.starts_with("CaLayer/Direct/Yuv420BiPlanarVideoRange"));
        assert!(summary.ends_with("source=none"));
    }
}
