use super::format::TextureFormat;
use crate::backend::{Backend, TextureFilter, TextureWrap};
use crate::context::GpuContext;
use crate::error::TextureError;
use crate::handle::Handle;
use crate::state::StateCache;

/// Decoded image as produced by an image decoder: row-major, interleaved
/// 8-bit channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelData {
    pub width: u32,
    pub height: u32,
    pub channels: usize,
    pub bytes: Vec<u8>,
}

impl PixelData {
    pub fn new(width: u32, height: u32, channels: usize, bytes: Vec<u8>) -> Result<Self, TextureError> {
        if TextureFormat::for_channels(channels).is_none() {
            return Err(TextureError::UnsupportedChannels(channels));
        }
        let expected = width as usize * height as usize * channels;
        if bytes.len() != expected {
            return Err(TextureError::SizeMismatch { expected, got: bytes.len() });
        }
        Ok(Self { width, height, channels, bytes })
    }

    /// Matching 8-bit color format.
    pub fn format(&self) -> Option<TextureFormat> {
        TextureFormat::for_channels(self.channels)
    }
}

/// A sampled 2D texture.
#[derive(Debug)]
pub struct Texture2d {
    ctx: GpuContext,
    handle: Handle,
    format: TextureFormat,
    width: u32,
    height: u32,
    mipmapped: bool,
    min: TextureFilter,
    mag: TextureFilter,
    wrap: TextureWrap,
}

/// Binds `texture` on whichever unit is active (unit 0 if unknown).
fn bind_for_edit(b: &mut dyn Backend, s: &mut StateCache, texture: Handle) {
    let slot = s.active_texture().unwrap_or(0);
    s.bind_texture(b, slot, texture);
}

impl Texture2d {
    /// A texture with no storage yet.
    pub fn new(ctx: &GpuContext, format: TextureFormat) -> Self {
        let handle = ctx.backend(|b| b.create_texture());
        log::debug!("texture {} created ({:?})", handle, format.internal);
        Self {
            ctx: ctx.clone(),
            handle,
            format,
            width: 0,
            height: 0,
            mipmapped: false,
            min: TextureFilter::Linear,
            mag: TextureFilter::Linear,
            wrap: TextureWrap::Repeat,
        }
    }

    /// Creates and uploads a texture from decoded pixels.
    pub fn from_pixels(ctx: &GpuContext, pixels: &PixelData, mipmaps: bool) -> Result<Self, TextureError> {
        let format = pixels.format().ok_or(TextureError::UnsupportedChannels(pixels.channels))?;
        let mut texture = Self::new(ctx, format);
        texture.upload(pixels)?;
        if mipmaps {
            texture.generate_mipmaps()?;
        }
        Ok(texture)
    }

    #[inline]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    #[inline]
    pub fn format(&self) -> TextureFormat {
        self.format
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    pub fn is_allocated(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    #[inline]
    pub fn has_mipmaps(&self) -> bool {
        self.mipmapped
    }

    /// (Re)allocates uninitialized storage.
    pub fn allocate(&mut self, width: u32, height: u32) {
        let (h, format) = (self.handle, self.format);
        self.ctx.with(|b, s| {
            bind_for_edit(b, s, h);
            b.tex_image_2d(0, format, width, height, None);
        });
        self.width = width;
        self.height = height;
        self.mipmapped = false;
    }

    /// Replaces storage with `pixels`.
    ///
    /// An 8-bit format with the same channel count is kept (so sRGB stays
    /// sRGB); otherwise the format follows the pixel data.
    pub fn upload(&mut self, pixels: &PixelData) -> Result<(), TextureError> {
        let expected = pixels.width as usize * pixels.height as usize * pixels.channels;
        if pixels.bytes.len() != expected {
            return Err(TextureError::SizeMismatch { expected, got: pixels.bytes.len() });
        }
        let keeps = self.format.channel_count() == pixels.channels
            && self.format.bytes_per_pixel() == pixels.channels
            && !self.format.is_depth();
        if !keeps {
            self.format = pixels.format().ok_or(TextureError::UnsupportedChannels(pixels.channels))?;
        }

        let (h, format) = (self.handle, self.format);
        self.ctx.with(|b, s| {
            bind_for_edit(b, s, h);
            b.tex_image_2d(0, format, pixels.width, pixels.height, Some(&pixels.bytes));
        });
        self.width = pixels.width;
        self.height = pixels.height;
        self.mipmapped = false;
        Ok(())
    }

    pub fn bind(&self, slot: u32) -> bool {
        let h = self.handle;
        self.ctx.with(|b, s| s.bind_texture(b, slot, h))
    }

    pub fn set_filtering(&mut self, min: TextureFilter, mag: TextureFilter) {
        self.min = min;
        self.mag = mag;
        self.apply_sampling();
    }

    pub fn set_wrap(&mut self, wrap: TextureWrap) {
        self.wrap = wrap;
        self.apply_sampling();
    }

    fn apply_sampling(&self) {
        let (h, min, mag, wrap) = (self.handle, self.min, self.mag, self.wrap);
        self.ctx.with(|b, s| {
            bind_for_edit(b, s, h);
            b.tex_sampling(min, mag, wrap);
        });
    }

    /// Builds the full mip chain and switches minification to trilinear.
    pub fn generate_mipmaps(&mut self) -> Result<(), TextureError> {
        if !self.is_allocated() {
            return Err(TextureError::Unallocated);
        }
        let h = self.handle;
        self.ctx.with(|b, s| {
            bind_for_edit(b, s, h);
            b.generate_mipmap();
        });
        self.mipmapped = true;
        self.set_filtering(TextureFilter::LinearMipmapLinear, self.mag);
        Ok(())
    }
}

impl Drop for Texture2d {
    fn drop(&mut self) {
        let h = self.handle;
        self.ctx.with(|b, s| {
            s.forget_texture(h);
            b.delete_texture(h);
        });
        log::debug!("texture {} deleted", h);
    }
}
