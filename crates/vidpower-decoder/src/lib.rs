//! # vidpower-decoder
//!
//! Demand-driven frame production for the vidpower pipeline.
//!
//! This crate is part of the vidpower workspace. It sits between an asset
//! resolver (which turns a [`VideoSource`](vidpower_model::VideoSource) into a
//! decodable track) and `vidpower-pipeline` (which presents the frames).
//!
//! # Features
//!
//! - **Cancellable resets**: every [`Decoder::reset`] returns a [`ReadyHandle`]
//!   that resolves `Ready`, `Failed` or `Cancelled` exactly once
//! - **Demand-driven production**: nothing is decoded without a
//!   [`Decoder::request_frames`] call
//! - **Both delivery modes**: push-once for raw surface layers, a paced
//!   producer loop for sample buffer layers
//! - **Surface pooling**: Direct sessions recycle surfaces, Recreated sessions
//!   allocate fresh ones up to the in-flight bound
//! - **Per-frame fault isolation**: corrupt samples and pool exhaustion drop a
//!   single frame, production continues
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────┐
//! │   AssetResolver    │ ◄── VideoSource → first usable track
//! └─────────┬──────────┘
//!           │ MediaTrack
//!           ▼
//! ┌────────────────────┐
//! │    VideoDecoder    │ ◄── epoch-guarded resolution
//! │                    │     SurfacePool per session
//! └─────────┬──────────┘
//!           │ DecoderEvent (bounded channel)
//!           ▼
//! ┌────────────────────┐
//! │      consumer      │ ◄── vidpower-pipeline coordinator
//! └────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//! use vidpower_decoder::{ClipResolver, Decoder, DecoderEvent, FrameSink, VideoDecoder};
//! use vidpower_model::{ModelConfig, SyntheticClip, VideoSource};
//!
//! let config = ModelConfig::builder()
//!     .video_source(VideoSource::Synthetic(SyntheticClip::new(30, 30)))
//!     .build();
//!
//! let (tx, mut rx) = mpsc::channel(1);
//! let mut decoder = VideoDecoder::new(ClipResolver::new());
//! decoder.reset(Arc::new(config), FrameSink::new(1, tx)).await;
//! decoder.request_frames();
//!
//! while let Some(event) = rx.recv().await {
//!     if let DecoderEvent::EndOfStream { .. } = event {
//!         break;
//!     }
//! }
//! ```

// =============================================================================
// CORE MODULES
// =============================================================================

pub mod decoder;
pub mod error;
pub mod source;

// =============================================================================
// RE-EXPORTS - PRIMARY API
// =============================================================================

// Decoder
pub use decoder::{
    Decoder, DecoderEvent, DecoderStats, FrameSink, ReadyHandle, ReadyOutcome, SessionId,
    VideoDecoder,
};

// Errors
pub use error::{DecodeError, Result};

// Sources
pub use source::{AssetResolver, ClipResolver, MediaTrack, SyntheticTrack};

// =============================================================================
// CRATE-LEVEL ITEMS
// =============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Create a decoder backed by the built-in [`ClipResolver`]
///
/// # Arguments
///
/// * `resolve_timeout` - Fail resolution that takes longer than this
///
/// # Returns
///
/// A decoder with no session; call [`Decoder::reset`] to start one.
pub fn clip_decoder(resolve_timeout: Option<std::time::Duration>) -> VideoDecoder<ClipResolver> {
    let decoder = VideoDecoder::new(ClipResolver::new());
    match resolve_timeout {
        Some(timeout) => decoder.with_resolve_timeout(timeout),
        None => decoder,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_clip_decoder_starts_idle() {
        let decoder = clip_decoder(None);
        assert!(!decoder.is_ready());
        assert_eq!(decoder.stats(), DecoderStats::default());
    }
}
