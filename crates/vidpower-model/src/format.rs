//! Pixel formats for raw surfaces
//!
//! Only the handful of YCbCr layouts a hardware video decoder hands out are
//! modelled. `Unspecified` lets the decoder pick its native format and is
//! only valid on the compressed sample path.

/// Pixel format tag of a raw surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    /// No format requested
    #[default]
    Unspecified,

    /// 4:2:2 packed, 8 bits per component (`2vuy`)
    Yuv422,

    /// 4:2:0 bi-planar, video range (`420v`)
    Yuv420BiPlanarVideoRange,

    /// 4:2:0 bi-planar, full range (`420f`)
    Yuv420BiPlanarFullRange,
}

impl PixelFormat {
    /// All formats, in tag order
    pub const ALL: [PixelFormat; 4] = [
        PixelFormat::Unspecified,
        PixelFormat::Yuv422,
        PixelFormat::Yuv420BiPlanarVideoRange,
        PixelFormat::Yuv420BiPlanarFullRange,
    ];

    /// FourCC code as used by the platform's pixel buffer APIs
    ///
    /// Returns `None` for [`PixelFormat::Unspecified`].
    #[must_use]
    pub const fn fourcc(&self) -> Option<[u8; 4]> {
        match self {
            Self::Unspecified => None,
            Self::Yuv422 => Some(*b"2vuy"),
            Self::Yuv420BiPlanarVideoRange => Some(*b"420v"),
            Self::Yuv420BiPlanarFullRange => Some(*b"420f"),
        }
    }

    /// Number of planes in a surface of this format
    #[must_use]
    pub const fn plane_count(&self) -> usize {
        match self {
            Self::Unspecified => 0,
            Self::Yuv422 => 1,
            Self::Yuv420BiPlanarVideoRange | Self::Yuv420BiPlanarFullRange => 2,
        }
    }

    /// Whether the format is bi-planar 4:2:0
    #[must_use]
    pub const fn is_biplanar(&self) -> bool {
        matches!(
            self,
            Self::Yuv420BiPlanarVideoRange | Self::Yuv420BiPlanarFullRange
        )
    }

    /// Byte size of each plane for a frame of the given dimensions
    ///
    /// Chroma planes round odd dimensions up.
    #[must_use]
    pub fn plane_sizes(&self, width: u32, height: u32) -> Vec<usize> {
        let w = usize::try_from(width).unwrap_or(usize::MAX);
        let h = usize::try_from(height).unwrap_or(usize::MAX);
        match self {
            Self::Unspecified => Vec::new(),
            Self::Yuv422 => vec![w * h * 2],
            Self::Yuv420BiPlanarVideoRange | Self::Yuv420BiPlanarFullRange => {
                let chroma_w = w.div_ceil(2);
                let chroma_h = h.div_ceil(2);
                vec![w * h, chroma_w * chroma_h * 2]
            }
        }
    }

    /// Total byte size of a frame of the given dimensions
    #[must_use]
    pub fn frame_size(&self, width: u32, height: u32) -> usize {
        self.plane_sizes(width, height).iter().sum()
    }

    /// Value of the black level for the luma plane
    #[must_use]
    pub const fn luma_floor(&self) -> u8 {
        match self {
            Self::Yuv420BiPlanarVideoRange | Self::Yuv422 => 16,
            _ => 0,
        }
    }
}
