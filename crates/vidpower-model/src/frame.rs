//! Frame buffers
//!
//! A [`FrameBuffer`] is one unit of decoded video on its way from the decoder
//! to the presenter. Which variant flows through a session is fixed by
//! [`ModelConfig::frame_variant`](crate::ModelConfig::frame_variant).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::FrameVariant;
use crate::format::PixelFormat;
use crate::surface::{Surface, SurfaceId};

struct SampleData {
    index: u64,
    pts: Duration,
    duration: Duration,
    planes: Vec<Vec<u8>>,
}

/// Compressed, timestamped media sample
///
/// Cheap to clone: all clones share the same payload.
#[derive(Clone)]
pub struct SampleBuffer {
    inner: Arc<SampleData>,
}

impl SampleBuffer {
    /// Create a sample
    ///
    /// # Arguments
    ///
    /// * `index` - Decode order index within the track
    /// * `pts` - Presentation timestamp
    /// * `duration` - Display duration
    /// * `planes` - Payload planes
    pub fn new(index: u64, pts: Duration, duration: Duration, planes: Vec<Vec<u8>>) -> Self {
        Self {
            inner: Arc::new(SampleData {
                index,
                pts,
                duration,
                planes,
            }),
        }
    }

    /// Decode order index
    pub fn index(&self) -> u64 {
        self.inner.index
    }

    /// Presentation timestamp
    pub fn pts(&self) -> Duration {
        self.inner.pts
    }

    /// Display duration
    pub fn duration(&self) -> Duration {
        self.inner.duration
    }

    /// Payload planes
    pub fn planes(&self) -> &[Vec<u8>] {
        &self.inner.planes
    }

    /// Total payload size in bytes
    pub fn payload_len(&self) -> usize {
        self.inner.planes.iter().map(Vec::len).sum()
    }
}

impl fmt::Debug for SampleBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleBuffer")
            .field("index", &self.inner.index)
            .field("pts", &self.inner.pts)
            .field("planes", &self.inner.planes.len())
            .field("bytes", &self.payload_len())
            .finish()
    }
}

/// A decoded frame held in a raw surface
#[derive(Debug)]
pub struct SurfaceFrame {
    /// Decode order index
    pub index: u64,

    /// Presentation timestamp
    pub pts: Duration,

    /// Exclusive lease on the pixels
    pub surface: Surface,
}

impl SurfaceFrame {
    /// Pixel format of the surface
    pub fn format(&self) -> PixelFormat {
        self.surface.format()
    }

    /// Surface identifier
    pub fn surface_id(&self) -> SurfaceId {
        self.surface.id()
    }
}

/// One unit of decoded video data
#[derive(Debug)]
pub enum FrameBuffer {
    /// Compressed sample for a self-decoding layer
    CompressedSample(SampleBuffer),

    /// Raw surface for compositor import
    RawSurface(SurfaceFrame),
}

impl FrameBuffer {
    /// Variant of this frame
    pub fn variant(&self) -> FrameVariant {
        match self {
            Self::CompressedSample(_) => FrameVariant::CompressedSample,
            Self::RawSurface(_) => FrameVariant::RawSurface,
        }
    }

    /// Decode order index
    pub fn index(&self) -> u64 {
        match self {
            Self::CompressedSample(sample) => sample.index(),
            Self::RawSurface(frame) => frame.index,
        }
    }

    /// Presentation timestamp
    pub fn pts(&self) -> Duration {
        match self {
            Self::CompressedSample(sample) => sample.pts(),
            Self::RawSurface(frame) => frame.pts,
        }
    }

    /// Copy of the displayable bytes
    ///
    /// For samples this is the concatenated payload; for surfaces the pixel
    /// data.
    pub fn content(&self) -> Vec<u8> {
        match self {
            Self::CompressedSample(sample) => sample.planes().concat(),
            Self::RawSurface(frame) => frame.surface.snapshot(),
        }
    }
}

impl From<SampleBuffer> for FrameBuffer {
    fn from(sample: SampleBuffer) -> Self {
        Self::CompressedSample(sample)
    }
}

impl From<SurfaceFrame> for FrameBuffer {
    fn from(frame: SurfaceFrame) -> Self {
        Self::RawSurface(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Buffering;
    use crate::surface::SurfacePool;

    #[test]
    fn test_sample_buffer_shares_payload() {
        let sample = SampleBuffer::new(
            3,
            Duration::from_millis(100),
            Duration::from_millis(33),
            vec![vec![1, 2], vec![3]],
        );
        let clone = sample.clone();

        assert_eq!(clone.index(), 3);
        assert_eq!(clone.payload_len(), 3);
        assert!(std::ptr::eq(sample.planes(), clone.planes()));
    }

    #[test]
    fn test_frame_buffer_variants() {
        let sample = SampleBuffer::new(0, Duration::ZERO, Duration::from_millis(33), vec![vec![7]]);
        let frame = FrameBuffer::from(sample);
        assert_eq!(frame.variant(), FrameVariant::CompressedSample);
        assert_eq!(frame.content(), vec![7]);

        let pool = SurfacePool::new(Buffering::Direct, 2, PixelFormat::Yuv422, (2, 2));
        let surface = pool.acquire().expect("surface");
        let frame = FrameBuffer::from(SurfaceFrame {
            index: 1,
            pts: Duration::from_millis(33),
            surface,
        });
        assert_eq!(frame.variant(), FrameVariant::RawSurface);
        assert_eq!(frame.index(), 1);
        assert_eq!(frame.content().len(), 8);

        // Dropping the frame releases its surface
        assert_eq!(pool.live(), 1);
        drop(frame);
        assert_eq!(pool.live(), 0);
    }
}
