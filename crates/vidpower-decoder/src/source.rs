//! Asset Resolution and Media Tracks
//!
//! Decoding itself is delegated to an external service. This module defines
//! the seam: an [`AssetResolver`] turns a [`VideoSource`] into the first
//! usable [`MediaTrack`], and the track hands out samples and decodes them
//! into surfaces.
//!
//! [`ClipResolver`] is the built-in resolver. It generates deterministic
//! synthetic clips and reports file sources it cannot decode.
//!
//! # Usage
//!
//! ```rust
//! use vidpower_decoder::{AssetResolver, ClipResolver};
//! use vidpower_model::{SyntheticClip, VideoSource};
//!
//! # async fn example() -> Result<(), vidpower_decoder::DecodeError> {
//! let resolver = ClipResolver::new();
//! let mut track = resolver
//!     .resolve_first_track(&VideoSource::Synthetic(SyntheticClip::new(3, 30)))
//!     .await?;
//!
//! while let Some(sample) = track.read_sample() {
//!     println!("sample at {:?}", sample?.pts());
//! }
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, info};
use vidpower_model::{PixelFormat, SampleBuffer, Surface, SyntheticClip, VideoSource};

use crate::error::{DecodeError, Result};

/// Payload size of a synthetic sample
const SYNTHETIC_PAYLOAD_LEN: usize = 16;

/// Neutral chroma value
const CHROMA_NEUTRAL: u8 = 128;

/// A decodable video track
pub trait MediaTrack: Send {
    /// Number of samples in the track, if known
    fn frame_count(&self) -> Option<u64>;

    /// Read the next sample in decode order
    ///
    /// Returns `None` at end of stream. An `Err` affects only that sample;
    /// reading may continue.
    fn read_sample(&mut self) -> Option<Result<SampleBuffer>>;

    /// Decode a sample into a raw surface
    fn decode_into(&mut self, sample: &SampleBuffer, surface: &mut Surface) -> Result<()>;
}

/// Resolves a video source into its first usable track
///
/// Resolution is asynchronous and may never complete; callers cancel it by
/// dropping the future.
pub trait AssetResolver: Send + Sync + 'static {
    /// Resolve the first usable video track of `source`
    fn resolve_first_track(&self, source: &VideoSource) -> BoxFuture<'static, Result<Box<dyn MediaTrack>>>;
}

/// Built-in resolver for synthetic clips
///
/// File sources are checked for readability and then reported as
/// [`DecodeError::UnsupportedAsset`]: container decoding belongs to an
/// external decoding service.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClipResolver;

impl ClipResolver {
    /// Create a resolver
    pub fn new() -> Self {
        Self
    }
}

impl AssetResolver for ClipResolver {
    fn resolve_first_track(&self, source: &VideoSource) -> BoxFuture<'static, Result<Box<dyn MediaTrack>>> {
        let source = source.clone();
        async move {
            match source {
                VideoSource::Synthetic(clip) => {
                    // Resolution always completes on a later poll
                    tokio::task::yield_now().await;
                    if clip.frame_count == 0 {
                        return Err(DecodeError::NoVideoTrack);
                    }
                    info!(
                        "Resolved synthetic clip: {} frames @ {} fps",
                        clip.frame_count, clip.frame_rate
                    );
                    let track: Box<dyn MediaTrack> = Box::new(SyntheticTrack::new(clip));
                    Ok(track)
                }
                VideoSource::File(path) => Err(check_file(&path).await),
            }
        }
        .boxed()
    }
}

async fn check_file(path: &Path) -> DecodeError {
    match tokio::fs::metadata(path).await {
        Err(e) => DecodeError::unreadable(path, e),
        Ok(meta) if meta.is_dir() => DecodeError::unreadable(path, "is a directory"),
        Ok(_) => {
            debug!("No container decoder registered for {}", path.display());
            DecodeError::UnsupportedAsset(format!(
                "no container decoder for {}",
                path.display()
            ))
        }
    }
}

/// Deterministic track generated from a [`SyntheticClip`]
///
/// Sample `i` has presentation time `i * frame_duration`. Decoding fills the
/// luma plane with a level derived from the index and stamps the index into
/// the first bytes, so every frame's pixels are distinct.
#[derive(Debug)]
pub struct SyntheticTrack {
    clip: SyntheticClip,
    next_index: u64,
}

impl SyntheticTrack {
    /// Create a track for a clip
    pub fn new(clip: SyntheticClip) -> Self {
        Self { clip, next_index: 0 }
    }

    fn is_corrupt(&self, index: u64) -> bool {
        self.clip
            .corrupt_frames
            .iter()
            .any(|&corrupt| u64::from(corrupt) == index)
    }
}

impl MediaTrack for SyntheticTrack {
    fn frame_count(&self) -> Option<u64> {
        Some(u64::from(self.clip.frame_count))
    }

    fn read_sample(&mut self) -> Option<Result<SampleBuffer>> {
        let index = self.next_index;
        if index >= u64::from(self.clip.frame_count) {
            return None;
        }
        self.next_index += 1;

        if self.is_corrupt(index) {
            return Some(Err(DecodeError::corrupt(index, "synthetic corruption")));
        }

        let frame_duration = self.clip.frame_duration();
        let pts = frame_duration * u32::try_from(index).unwrap_or(u32::MAX);

        let mut payload = vec![0u8; SYNTHETIC_PAYLOAD_LEN];
        payload[..8].copy_from_slice(&index.to_le_bytes());
        Some(Ok(SampleBuffer::new(index, pts, frame_duration, vec![payload])))
    }

    fn decode_into(&mut self, sample: &SampleBuffer, surface: &mut Surface) -> Result<()> {
        let format = surface.format();
        if format == PixelFormat::Unspecified {
            return Err(DecodeError::corrupt(
                sample.index(),
                "surface has no pixel format",
            ));
        }

        let (width, height) = surface.size();
        let planes = format.plane_sizes(width, height);
        let level = u8::try_from(sample.index() % 200).unwrap_or(0);
        let luma = format.luma_floor().wrapping_add(level);
        let stamp = sample.index().to_le_bytes();

        surface.write(|bytes| {
            let (first, rest) = bytes.split_at_mut(planes[0].min(bytes.len()));
            first.fill(luma);
            rest.fill(CHROMA_NEUTRAL);
            let n = stamp.len().min(bytes.len());
            bytes[..n].copy_from_slice(&stamp[..n]);
        });
        Ok(())
    }
}
