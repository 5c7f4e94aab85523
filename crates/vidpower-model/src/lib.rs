//! # vidpower-model
//!
//! Data model for the vidpower frame delivery pipeline.
//!
//! This crate is part of the vidpower workspace and is shared by
//! `vidpower-decoder` (which produces frames) and `vidpower-pipeline`
//! (which presents them).
//!
//! # Contents
//!
//! - **[`ModelConfig`]**: immutable per-session configuration with capability
//!   queries ([`ModelConfig::can_handle_buffers`],
//!   [`ModelConfig::will_request_frames_repeatedly`])
//! - **[`FrameBuffer`]**: a decoded frame, either a compressed
//!   [`SampleBuffer`] or a raw [`SurfaceFrame`]
//! - **[`SurfacePool`]**: Direct (reused) or Recreated (fresh) surface
//!   allocation with exclusive [`Surface`] leases
//! - **[`OptionTag`]**: stable integer tags for the configuration surface
//!
//! # Quick Start
//!
//! ```rust
//! use vidpower_model::{
//!     Buffering, LayerClass, ModelConfig, PixelBufferFlag, PixelFormat, SurfacePool,
//! };
//!
//! let config = ModelConfig::builder()
//!     .layer_class(LayerClass::CaLayer)
//!     .buffering(Buffering::Direct)
//!     .format(PixelFormat::Yuv420BiPlanarVideoRange)
//!     .pixel_buffer(PixelBufferFlag::GpuTextureBacked | PixelBufferFlag::CompositorSurfaceBacked)
//!     .frame_size(1280, 720)
//!     .build();
//!
//! assert!(config.validate().is_ok());
//! assert!(config.can_handle_buffers());
//!
//! let pool = SurfacePool::new(
//!     config.buffering,
//!     config.pool_capacity(),
//!     config.format,
//!     config.frame_size,
//! );
//! let surface = pool.acquire().expect("surface");
//! assert_eq!(surface.size(), (1280, 720));
//! ```

// =============================================================================
// CORE MODULES
// =============================================================================

pub mod config;
pub mod error;
pub mod format;
pub mod frame;
pub mod surface;
pub mod tags;

// =============================================================================
// RE-EXPORTS - PRIMARY API
// =============================================================================

// Configuration
pub use config::{
    Buffering, FrameVariant, LayerClass, ModelConfig, ModelConfigBuilder, PixelBufferFlag,
    Selection, SyntheticClip, VideoSource,
};

// Errors
pub use error::{ModelError, Result};

// Frames
pub use format::PixelFormat;
pub use frame::{FrameBuffer, SampleBuffer, SurfaceFrame};
pub use surface::{PoolStats, Surface, SurfaceId, SurfacePool};

// Tags
pub use tags::{pixel_buffer_from_tag, pixel_buffer_tag, OptionTag};

// Flag sets are part of the public config surface
pub use enumflags2::BitFlags;

// =============================================================================
// CRATE-LEVEL ITEMS
// =============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Every configuration the pipeline can present end-to-end
///
/// Enumerates the layer class, buffering, format and pixel buffer flag
/// combinations for which [`ModelConfig::can_handle_buffers`] holds, starting
/// from `base` for the remaining fields. Useful for sweeping all strategies in
/// a power measurement run.
#[must_use]
pub fn supported_configs(base: &ModelConfig) -> Vec<ModelConfig> {
    let flag_sets = [
        BitFlags::empty(),
        BitFlags::from_flag(PixelBufferFlag::GpuTextureBacked),
        BitFlags::from_flag(PixelBufferFlag::CompositorSurfaceBacked),
        PixelBufferFlag::GpuTextureBacked | PixelBufferFlag::CompositorSurfaceBacked,
    ];

    let mut configs = Vec::new();
    for layer_class in [LayerClass::SampleBufferDisplayLayer, LayerClass::CaLayer] {
        for buffering in [Buffering::Direct, Buffering::Recreated] {
            for format in PixelFormat::ALL {
                for pixel_buffer in flag_sets {
                    let config = ModelConfig {
                        layer_class,
                        buffering,
                        format,
                        pixel_buffer,
                        ..base.clone()
                    };
                    if config.can_handle_buffers() {
                        configs.push(config);
                    }
                }
            }
        }
    }
    configs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_configs() {
        let configs = supported_configs(&ModelConfig::default());

        // Sample buffer layers accept every format/flag combination (2 * 4 * 4),
        // raw surfaces need a format (3) and a non-empty flag set (3)
        assert_eq!(configs.len(), 32 + 2 * 3 * 3);
        assert!(configs.iter().all(ModelConfig::can_handle_buffers));
    }

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
