//! # vidpower-pipeline
//!
//! Demand-driven frame presentation for power measurement of video
//! delivery strategies.
//!
//! This crate is part of the vidpower workspace. It couples a decoder from
//! `vidpower-decoder` with a [`Presenter`] under explicit flow control and
//! keeps that coupling intact across live reconfiguration (model resets,
//! full-screen transitions).
//!
//! # Features
//!
//! - **Single-writer coordinator**: every session transition happens on one
//!   task; callers hold a cloneable [`PipelineHandle`]
//! - **Observable state machine**: `Idle → Resolving → Ready → Streaming →
//!   Draining → Idle`, published on a watch channel
//! - **True backpressure**: the decoder is only asked for frames the
//!   presenter has room for
//! - **Cancellable resets**: superseded resets resolve
//!   [`ResetOutcome::Cancelled`], equal configs coalesce
//! - **Layer migration**: detach/reattach of video and overlay layers for
//!   full-screen transitions without losing frames
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────┐        commands         ┌────────────────────┐
//! │   PipelineHandle   │ ──────────────────────► │      Pipeline      │
//! │  (any task/clone)  │ ◄────────────────────── │  (coordinator task)│
//! └────────────────────┘   replies / state watch └──┬──────────────┬──┘
//!                                                   │              │
//!                             reset / request_frames│              │present / refresh
//!                                                   ▼              ▼
//!                                        ┌──────────────┐  ┌──────────────┐
//!                                        │   Decoder    │  │  Presenter   │
//!                                        └──────┬───────┘  └──────┬───────┘
//!                                               │ events          │ display
//!                                               └─► coordinator   ▼
//!                                                          ┌──────────────┐
//!                                                          │  Compositor  │
//!                                                          └──────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use vidpower_pipeline::{spawn_clip_pipeline, HeadlessCompositor, PipelineConfig, PipelineState};
//! use vidpower_model::{ModelConfig, SyntheticClip, VideoSource};
//!
//! let config = PipelineConfig::builder()
//!     .refresh_interval(std::time::Duration::from_millis(16))
//!     .build();
//! let (handle, _task) = spawn_clip_pipeline(config, HeadlessCompositor::new())?;
//!
//! let model = ModelConfig::builder()
//!     .video_source(VideoSource::Synthetic(SyntheticClip::new(60, 30)))
//!     .build();
//! handle.reset_with_model(model).await?;
//! handle.wait_for_state(PipelineState::Idle).await?;
//! ```
//!
//! # Error Handling
//!
//! Configuration and resolution failures come back from
//! [`PipelineHandle::reset_with_model`]; [`PipelineError::kind`] classifies
//! them. Per-frame failures are counted in [`PipelineStats`] and never stop
//! the pipeline.

// =============================================================================
// CORE MODULES
// =============================================================================

pub mod compositor;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod presenter;

// =============================================================================
// RE-EXPORTS - PRIMARY API
// =============================================================================

// Configuration
pub use config::{PipelineConfig, PipelineConfigBuilder};

// Coordinator
pub use coordinator::{
    FullScreenEvent, Pipeline, PipelineHandle, PipelineState, PipelineStats, ResetOutcome,
};

// Presentation
pub use compositor::{Compositor, HeadlessCompositor, LayerHost, LayerKind};
pub use presenter::{LayerPresenter, Presenter, PresenterStats};

// Errors
pub use error::{ErrorKind, PipelineError, PresentError, Result};

// =============================================================================
// CRATE-LEVEL ITEMS
// =============================================================================

use tokio::task::JoinHandle;
use vidpower_decoder::{ClipResolver, VideoDecoder};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Spawn a pipeline over the built-in clip decoder
///
/// # Arguments
///
/// * `config` - Pipeline configuration
/// * `compositor` - Destination for presented frames
///
/// # Returns
///
/// The pipeline handle and the coordinator task.
///
/// # Errors
///
/// Returns an error if `config` is invalid or the compositor refuses the
/// presenter's layers.
pub fn spawn_clip_pipeline<C>(
    config: PipelineConfig,
    compositor: C,
) -> Result<(PipelineHandle, JoinHandle<()>)>
where
    C: Compositor + 'static,
{
    let presenter = LayerPresenter::new(compositor)?;
    // The coordinator enforces the resolve timeout
    let decoder = vidpower_decoder::clip_decoder(None);
    Pipeline::<VideoDecoder<ClipResolver>, _>::spawn(config, decoder, presenter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[tokio::test]
    async fn test_spawn_clip_pipeline() {
        let (handle, _task) =
            spawn_clip_pipeline(PipelineConfig::default(), HeadlessCompositor::new())
                .expect("pipeline");
        assert_eq!(handle.state(), PipelineState::Idle);
        handle.shutdown().await.expect("shutdown");
    }
}
