//! # vidpower
//!
//! Demand-driven video frame delivery for measuring how decoding and
//! buffering strategies affect power draw.
//!
//! This crate provides a unified interface to the vidpower libraries:
//!
//! - **[`model`]** - Session configuration, frame buffers, surface pools, option tags
//! - **[`decoder`]** - Cancellable asset resolution and on-demand frame production
//! - **[`pipeline`]** - Presenter, compositor seam and the pipeline coordinator
//!
//! # Features
//!
//! All features are enabled by default. You can selectively enable only what you need:
//!
//! ```toml
//! # Use everything (default)
//! vidpower = "0.1"
//!
//! # Data model only
//! vidpower = { version = "0.1", default-features = false }
//!
//! # Model + decoder
//! vidpower = { version = "0.1", default-features = false, features = ["decoder"] }
//! ```
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `decoder` | Yes | Asset resolution and frame production |
//! | `pipeline` | Yes | Presentation and session coordination (implies `decoder`) |
//! | `full` | No | All features |
//!
//! # Quick Start
//!
//! ## Sweep every presentable strategy
//!
//! ```rust,ignore
//! use vidpower::model::{supported_configs, ModelConfig, SyntheticClip, VideoSource};
//! use vidpower::pipeline::{spawn_clip_pipeline, HeadlessCompositor, PipelineConfig, PipelineState};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::builder()
//!         .refresh_interval(std::time::Duration::from_millis(16))
//!         .build();
//!     let (handle, _task) = spawn_clip_pipeline(config, HeadlessCompositor::new())?;
//!
//!     let base = ModelConfig::builder()
//!         .video_source(VideoSource::Synthetic(SyntheticClip::new(300, 30)))
//!         .build();
//!
//!     for model in supported_configs(&base) {
//!         println!("Measuring {}", model.summary());
//!         handle.reset_with_model(model).await?;
//!         handle.wait_for_state(PipelineState::Idle).await?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            vidpower                             │
//! ├─────────────────┬─────────────────────┬─────────────────────────┤
//! │ vidpower-model  │  vidpower-decoder   │   vidpower-pipeline     │
//! │                 │                     │                         │
//! │  ModelConfig    │  VideoDecoder       │  Pipeline / Handle      │
//! │  FrameBuffer    │  AssetResolver      │  LayerPresenter         │
//! │  SurfacePool    │  ReadyHandle        │  Compositor             │
//! └────────┬────────┴──────────┬──────────┴────────────┬────────────┘
//!          │                   │                       │
//!          ▼                   ▼                       ▼
//!    Option tag table   Decoding service        Compositor / display
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// RE-EXPORTS
// =============================================================================

/// Session configuration and frame data model.
///
/// See [`vidpower_model`] documentation for details.
pub use vidpower_model as model;

/// Asset resolution and demand-driven frame production.
///
/// See [`vidpower_decoder`] documentation for details.
#[cfg(feature = "decoder")]
#[cfg_attr(docsrs, doc(cfg(feature = "decoder")))]
pub use vidpower_decoder as decoder;

/// Frame presentation and pipeline coordination.
///
/// See [`vidpower_pipeline`] documentation for details.
#[cfg(feature = "pipeline")]
#[cfg_attr(docsrs, doc(cfg(feature = "pipeline")))]
pub use vidpower_pipeline as pipeline;

// =============================================================================
// PRELUDE - Common types for convenience
// =============================================================================

/// Prelude module with commonly used types.
///
/// ```rust
/// use vidpower::prelude::*;
/// ```
pub mod prelude {
    pub use vidpower_model::{
        Buffering, FrameBuffer, LayerClass, ModelConfig, PixelBufferFlag, PixelFormat,
        VideoSource,
    };

    #[cfg(feature = "decoder")]
    pub use vidpower_decoder::{DecodeError, Decoder, ReadyOutcome, VideoDecoder};

    #[cfg(feature = "pipeline")]
    pub use vidpower_pipeline::{
        PipelineConfig, PipelineError, PipelineHandle, PipelineState, Presenter, ResetOutcome,
    };
}
