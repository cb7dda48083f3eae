//! Texture / renderbuffer storage formats.
//!
//! A [`TextureFormat`] is the triple GL asks for when allocating image storage:
//! sized internal format, client pixel layout, and client component type.

/// Per-component client data type.
///
/// Also used for vertex attribute components and pixel readback.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ComponentType {
    UnsignedByte,
    UnsignedShort,
    UnsignedInt,
    Int,
    HalfFloat,
    Float,
    /// Packed depth/stencil word.
    UnsignedInt24_8,
}

impl ComponentType {
    /// Size in bytes of one component.
    #[inline]
    pub const fn size(self) -> usize {
        match self {
            ComponentType::UnsignedByte => 1,
            ComponentType::UnsignedShort | ComponentType::HalfFloat => 2,
            ComponentType::UnsignedInt
            | ComponentType::Int
            | ComponentType::Float
            | ComponentType::UnsignedInt24_8 => 4,
        }
    }
}

/// Client-side channel layout.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PixelLayout {
    Red,
    Rg,
    Rgb,
    Rgba,
    Depth,
    DepthStencil,
}

impl PixelLayout {
    #[inline]
    pub const fn channel_count(self) -> usize {
        match self {
            PixelLayout::Red | PixelLayout::Depth => 1,
            PixelLayout::Rg | PixelLayout::DepthStencil => 2,
            PixelLayout::Rgb => 3,
            PixelLayout::Rgba => 4,
        }
    }

    /// Layout matching a decoded image with `channels` interleaved channels.
    pub const fn from_channels(channels: usize) -> Option<Self> {
        match channels {
            1 => Some(PixelLayout::Red),
            2 => Some(PixelLayout::Rg),
            3 => Some(PixelLayout::Rgb),
            4 => Some(PixelLayout::Rgba),
            _ => None,
        }
    }
}

/// Sized internal (GPU-side) format.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum InternalFormat {
    R8,
    Rg8,
    Rgb8,
    Rgba8,
    Srgb8Alpha8,
    R16F,
    Rgba16F,
    R32F,
    Rgba32F,
    Depth16,
    Depth24,
    Depth32F,
    Depth24Stencil8,
}

impl InternalFormat {
    #[inline]
    pub const fn is_depth(self) -> bool {
        matches!(
            self,
            InternalFormat::Depth16
                | InternalFormat::Depth24
                | InternalFormat::Depth32F
                | InternalFormat::Depth24Stencil8
        )
    }

    #[inline]
    pub const fn has_stencil(self) -> bool {
        matches!(self, InternalFormat::Depth24Stencil8)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TextureFormat {
    pub internal: InternalFormat,
    pub layout: PixelLayout,
    pub component: ComponentType,
}

impl TextureFormat {
    pub const R8: Self = Self::new(InternalFormat::R8, PixelLayout::Red, ComponentType::UnsignedByte);
    pub const RG8: Self = Self::new(InternalFormat::Rg8, PixelLayout::Rg, ComponentType::UnsignedByte);
    pub const RGB8: Self = Self::new(InternalFormat::Rgb8, PixelLayout::Rgb, ComponentType::UnsignedByte);
    pub const RGBA8: Self = Self::new(InternalFormat::Rgba8, PixelLayout::Rgba, ComponentType::UnsignedByte);
    pub const SRGBA8: Self =
        Self::new(InternalFormat::Srgb8Alpha8, PixelLayout::Rgba, ComponentType::UnsignedByte);
    pub const R16F: Self = Self::new(InternalFormat::R16F, PixelLayout::Red, ComponentType::HalfFloat);
    pub const RGBA16F: Self = Self::new(InternalFormat::Rgba16F, PixelLayout::Rgba, ComponentType::HalfFloat);
    pub const R32F: Self = Self::new(InternalFormat::R32F, PixelLayout::Red, ComponentType::Float);
    pub const RGBA32F: Self = Self::new(InternalFormat::Rgba32F, PixelLayout::Rgba, ComponentType::Float);
    pub const DEPTH16: Self = Self::new(InternalFormat::Depth16, PixelLayout::Depth, ComponentType::UnsignedShort);
    pub const DEPTH24: Self = Self::new(InternalFormat::Depth24, PixelLayout::Depth, ComponentType::UnsignedInt);
    pub const DEPTH32F: Self = Self::new(InternalFormat::Depth32F, PixelLayout::Depth, ComponentType::Float);
    pub const DEPTH24_STENCIL8: Self =
        Self::new(InternalFormat::Depth24Stencil8, PixelLayout::DepthStencil, ComponentType::UnsignedInt24_8);

    #[inline]
    pub const fn new(internal: InternalFormat, layout: PixelLayout, component: ComponentType) -> Self {
        Self { internal, layout, component }
    }

    #[inline]
    pub const fn channel_count(self) -> usize {
        self.layout.channel_count()
    }

    /// Client bytes per pixel for uploads in this format.
    #[inline]
    pub const fn bytes_per_pixel(self) -> usize {
        match self.component {
            // one packed word per depth/stencil texel
            ComponentType::UnsignedInt24_8 => 4,
            c => c.size() * self.layout.channel_count(),
        }
    }

    #[inline]
    pub const fn is_depth(self) -> bool {
        self.internal.is_depth()
    }

    /// Color format for an 8-bit decoded image with `channels` channels.
    pub const fn for_channels(channels: usize) -> Option<Self> {
        match channels {
            1 => Some(Self::R8),
            2 => Some(Self::RG8),
            3 => Some(Self::RGB8),
            4 => Some(Self::RGBA8),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_per_pixel() {
        assert_eq!(TextureFormat::RGBA8.bytes_per_pixel(), 4);
        assert_eq!(TextureFormat::RGB8.bytes_per_pixel(), 3);
        assert_eq!(TextureFormat::RGBA16F.bytes_per_pixel(), 8);
        assert_eq!(TextureFormat::RGBA32F.bytes_per_pixel(), 16);
        assert_eq!(TextureFormat::DEPTH24_STENCIL8.bytes_per_pixel(), 4);
    }

    #[test]
    fn depth_formats() {
        assert!(TextureFormat::DEPTH24.is_depth());
        assert!(TextureFormat::DEPTH24_STENCIL8.internal.has_stencil());
        assert!(!TextureFormat::RGBA8.is_depth());
    }

    #[test]
    fn channels_round_trip_through_layout() {
        for n in 1..=4 {
            assert_eq!(PixelLayout::from_channels(n).unwrap().channel_count(), n);
            assert_eq!(TextureFormat::for_channels(n).unwrap().channel_count(), n);
        }
        assert!(TextureFormat::for_channels(5).is_none());
    }
}
