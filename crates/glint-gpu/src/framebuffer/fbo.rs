use super::attachment::{Attachment, AttachmentBacking};
use super::status::FramebufferStatus;
use crate::backend::{AttachmentPoint, ClearMask, FramebufferTarget, TextureFilter};
use crate::color::Color;
use crate::context::GpuContext;
use crate::error::FramebufferError;
use crate::handle::Handle;
use crate::texture::{ComponentType, PixelLayout, TextureFormat};

/// A named framebuffer object: ordered color attachments plus at most one
/// depth/stencil attachment, all sharing one size.
///
/// Attachments are described while unloaded. [`load`](Self::load) allocates
/// the backend object and every attachment's storage, attaches them and
/// validates completeness; [`unload`](Self::unload) releases all of it but
/// keeps the descriptors for the next load.
#[derive(Debug)]
pub struct Framebuffer {
    ctx: GpuContext,
    name: String,
    handle: Handle,
    colors: Vec<Attachment>,
    depth: Option<Attachment>,
    width: u32,
    height: u32,
    status: Option<FramebufferStatus>,
}

fn depth_point(format: TextureFormat) -> AttachmentPoint {
    if format.internal.has_stencil() { AttachmentPoint::DepthStencil } else { AttachmentPoint::Depth }
}

impl Framebuffer {
    pub fn new(ctx: &GpuContext, name: impl Into<String>) -> Self {
        Self {
            ctx: ctx.clone(),
            name: name.into(),
            handle: Handle::INVALID,
            colors: Vec::new(),
            depth: None,
            width: 0,
            height: 0,
            status: None,
        }
    }

    // ── accessors ─────────────────────────────────────────────────────────

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// [`Handle::INVALID`] while unloaded.
    #[inline]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.handle.is_valid()
    }

    /// Size requested by the last load.
    #[inline]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Completeness recorded by the last load; `None` while unloaded.
    #[inline]
    pub fn status(&self) -> Option<FramebufferStatus> {
        self.status
    }

    #[inline]
    pub fn color_count(&self) -> usize {
        self.colors.len()
    }

    pub fn color(&self, index: usize) -> Option<&Attachment> {
        self.colors.get(index)
    }

    pub fn color_mut(&mut self, index: usize) -> Option<&mut Attachment> {
        self.colors.get_mut(index)
    }

    pub fn depth(&self) -> Option<&Attachment> {
        self.depth.as_ref()
    }

    pub fn depth_mut(&mut self) -> Option<&mut Attachment> {
        self.depth.as_mut()
    }

    // ── configuration (unloaded only) ─────────────────────────────────────

    fn ensure_unloaded(&self) -> Result<(), FramebufferError> {
        if self.is_loaded() {
            return Err(FramebufferError::AlreadyLoaded(self.name.clone()));
        }
        Ok(())
    }

    /// Adds a color attachment; returns its index.
    pub fn add_attachment(&mut self, attachment: Attachment) -> Result<usize, FramebufferError> {
        self.ensure_unloaded()?;
        let max = self.ctx.limits().max_color_attachments;
        if self.colors.len() >= max as usize {
            return Err(FramebufferError::TooManyColorAttachments { name: self.name.clone(), max });
        }
        if attachment.format().is_depth() {
            return Err(FramebufferError::FormatRole {
                name: attachment.name().to_string(),
                format: attachment.format(),
                role: "color",
            });
        }
        self.colors.push(attachment);
        Ok(self.colors.len() - 1)
    }

    /// Adds a texture-backed color attachment.
    pub fn add_texture(&mut self, name: impl Into<String>, format: TextureFormat) -> Result<usize, FramebufferError> {
        self.add_attachment(Attachment::texture(name, format))
    }

    /// Sets the depth (or depth/stencil) attachment. Only one is allowed.
    pub fn add_depth(&mut self, attachment: Attachment) -> Result<(), FramebufferError> {
        self.ensure_unloaded()?;
        if self.depth.is_some() {
            return Err(FramebufferError::DuplicateDepth(self.name.clone()));
        }
        if !attachment.format().is_depth() {
            return Err(FramebufferError::FormatRole {
                name: attachment.name().to_string(),
                format: attachment.format(),
                role: "depth",
            });
        }
        self.depth = Some(attachment);
        Ok(())
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    /// Allocates everything at `width × height` and validates completeness.
    ///
    /// Any previous load is torn down first. An incomplete result is logged
    /// and returned; the framebuffer stays loaded either way.
    pub fn load(&mut self, width: u32, height: u32) -> Result<FramebufferStatus, FramebufferError> {
        if width == 0 || height == 0 {
            return Err(FramebufferError::ZeroSize(self.name.clone()));
        }
        self.unload();

        for attachment in self.colors.iter_mut().chain(self.depth.iter_mut()) {
            attachment.load(&self.ctx, width, height);
        }

        let handle = self.ctx.backend(|b| b.create_framebuffer());
        self.handle = handle;
        self.width = width;
        self.height = height;

        let colors = &self.colors;
        let depth = &self.depth;
        let code = self.ctx.with(|b, s| {
            s.bind_framebuffer(b, FramebufferTarget::Both, handle);
            for (i, attachment) in colors.iter().enumerate() {
                attachment.attach(b, AttachmentPoint::Color(i as u32));
            }
            if let Some(depth) = depth {
                depth.attach(b, depth_point(depth.format()));
            }
            b.draw_buffers(&Self::color_points(colors.len()));
            if !colors.is_empty() {
                b.read_buffer(AttachmentPoint::Color(0));
            }
            b.check_framebuffer_status(FramebufferTarget::Draw)
        });

        let status = if self.sizes_agree() {
            FramebufferStatus::from_gl(code)
        } else {
            FramebufferStatus::IncompleteDimensions
        };
        if status.is_complete() {
            log::debug!("framebuffer `{}` loaded at {}x{}", self.name, width, height);
        } else {
            log::error!("framebuffer `{}` is incomplete: {}", self.name, status);
        }
        self.status = Some(status);
        Ok(status)
    }

    fn sizes_agree(&self) -> bool {
        let mut sizes = self.colors.iter().chain(self.depth.iter()).filter_map(Attachment::size);
        match sizes.next() {
            Some(first) => sizes.all(|s| s == first),
            None => true,
        }
    }

    fn color_points(count: usize) -> Vec<AttachmentPoint> {
        (0..count as u32).map(AttachmentPoint::Color).collect()
    }

    /// Deletes the backend object and every attachment's storage.
    pub fn unload(&mut self) {
        if !self.handle.is_valid() {
            return;
        }
        let h = self.handle;
        self.ctx.with(|b, s| {
            s.forget_framebuffer(h);
            b.delete_framebuffer(h);
        });
        for attachment in self.colors.iter_mut().chain(self.depth.iter_mut()) {
            attachment.unload();
        }
        self.handle = Handle::INVALID;
        self.status = None;
        log::debug!("framebuffer `{}` unloaded", self.name);
    }

    /// Unload + load at a new size.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<FramebufferStatus, FramebufferError> {
        self.load(width, height)
    }

    /// Re-queries the backend for completeness.
    pub fn check_status(&self) -> Result<FramebufferStatus, FramebufferError> {
        let h = self.loaded_handle()?;
        let code = self.ctx.with(|b, s| {
            s.bind_framebuffer(b, FramebufferTarget::Draw, h);
            b.check_framebuffer_status(FramebufferTarget::Draw)
        });
        Ok(FramebufferStatus::from_gl(code))
    }

    fn loaded_handle(&self) -> Result<Handle, FramebufferError> {
        if self.is_loaded() { Ok(self.handle) } else { Err(FramebufferError::NotLoaded(self.name.clone())) }
    }

    // ── binding ───────────────────────────────────────────────────────────

    /// Binds for drawing and reading. On an actual change the draw-buffer
    /// list is re-issued.
    pub fn bind(&self) -> Result<bool, FramebufferError> {
        let h = self.loaded_handle()?;
        let points = Self::color_points(self.colors.len());
        Ok(self.ctx.with(|b, s| {
            let changed = s.bind_framebuffer(b, FramebufferTarget::Both, h);
            if changed {
                b.draw_buffers(&points);
            }
            changed
        }))
    }

    /// Rebinds the default framebuffer.
    pub fn unbind(&self) -> bool {
        self.ctx.bind_default_framebuffer()
    }

    fn is_bound_for_draw(&self) -> bool {
        let h = self.handle;
        self.ctx.with(|_, s| s.bound_framebuffer(FramebufferTarget::Draw) == Some(h))
    }

    /// Binds color attachment `index`'s texture to texture unit `slot`.
    pub fn bind_texture(&self, index: usize, slot: u32) -> Result<bool, FramebufferError> {
        self.loaded_handle()?;
        let attachment = self
            .colors
            .get(index)
            .ok_or_else(|| FramebufferError::NoSuchAttachment { name: self.name.clone(), index })?;
        let texture =
            attachment.texture_storage().ok_or_else(|| FramebufferError::NotTextureBacked(attachment.name().to_string()))?;
        Ok(texture.bind(slot))
    }

    /// Binds the depth attachment's texture to texture unit `slot`.
    pub fn bind_depth(&self, slot: u32) -> Result<bool, FramebufferError> {
        self.loaded_handle()?;
        let attachment = self.depth.as_ref().ok_or_else(|| FramebufferError::NoDepthAttachment(self.name.clone()))?;
        let texture =
            attachment.texture_storage().ok_or_else(|| FramebufferError::NotTextureBacked(attachment.name().to_string()))?;
        Ok(texture.bind(slot))
    }

    // ── operations ────────────────────────────────────────────────────────

    /// Builds the mip chain of color attachment `index`.
    ///
    /// The framebuffer must be the bound draw framebuffer and the attachment
    /// texture-backed.
    pub fn generate_mipmaps(&mut self, index: usize) -> Result<(), FramebufferError> {
        self.loaded_handle()?;
        if !self.is_bound_for_draw() {
            return Err(FramebufferError::NotBound(self.name.clone()));
        }
        let name = self.name.clone();
        let attachment =
            self.colors.get_mut(index).ok_or(FramebufferError::NoSuchAttachment { name: name.clone(), index })?;
        if attachment.backing() != AttachmentBacking::Texture {
            return Err(FramebufferError::NotTextureBacked(attachment.name().to_string()));
        }
        let texture = attachment.texture_storage_mut().ok_or(FramebufferError::NotLoaded(name))?;
        Ok(texture.generate_mipmaps()?)
    }

    /// Binds and clears.
    pub fn clear(&self, color: Color, depth: f32, mask: ClearMask) -> Result<(), FramebufferError> {
        self.bind()?;
        self.ctx.clear(color, depth, mask);
        Ok(())
    }

    /// Reads a `width × height` block of color attachment `index` as bytes,
    /// `width * height * channels` long.
    ///
    /// Negative or out-of-range origin coordinates, a missing attachment, or
    /// an unloaded framebuffer yield an empty vector. Pixels of the block that
    /// fall past the edge of the image read as zero.
    pub fn read_pixels(&self, index: usize, x: i32, y: i32, width: u32, height: u32) -> Vec<u8> {
        let Some(attachment) = self.colors.get(index) else {
            return Vec::new();
        };
        let layout = attachment.format().layout;
        self.read(AttachmentPoint::Color(index as u32), layout, x, y, width, height)
    }

    /// Reads depth values quantized to bytes, `width * height` long.
    pub fn read_depth_pixels(&self, x: i32, y: i32, width: u32, height: u32) -> Vec<u8> {
        let Some(depth) = &self.depth else {
            return Vec::new();
        };
        self.read(depth_point(depth.format()), PixelLayout::Depth, x, y, width, height)
    }

    fn read(&self, point: AttachmentPoint, layout: PixelLayout, x: i32, y: i32, width: u32, height: u32) -> Vec<u8> {
        if x < 0 || y < 0 || !self.is_loaded() {
            return Vec::new();
        }
        let (x, y) = (x as u32, y as u32);
        if x >= self.width || y >= self.height {
            log::debug!("framebuffer `{}`: read origin ({}, {}) out of range", self.name, x, y);
            return Vec::new();
        }

        let component = ComponentType::UnsignedByte;
        let mut out = vec![0u8; width as usize * height as usize * layout.channel_count() * component.size()];
        let h = self.handle;
        self.ctx.with(|b, s| {
            s.bind_framebuffer(b, FramebufferTarget::Read, h);
            if let AttachmentPoint::Color(_) = point {
                b.read_buffer(point);
            }
            b.read_pixels(x, y, width, height, layout, component, &mut out);
        });
        out
    }

    /// Copies this framebuffer's depth into `dst`'s.
    ///
    /// Both need a depth attachment of the same format and the same size.
    pub fn blit_depth(&self, dst: &Framebuffer) -> Result<(), FramebufferError> {
        let (src_h, dst_h) = (self.loaded_handle()?, dst.loaded_handle()?);
        let src_depth = self.depth.as_ref().ok_or_else(|| FramebufferError::NoDepthAttachment(self.name.clone()))?;
        let dst_depth = dst.depth.as_ref().ok_or_else(|| FramebufferError::NoDepthAttachment(dst.name.clone()))?;
        if src_depth.format() != dst_depth.format() {
            return Err(FramebufferError::BlitFormatMismatch { src: src_depth.format(), dst: dst_depth.format() });
        }
        let (src_size, dst_size) = (src_depth.size().unwrap_or_default(), dst_depth.size().unwrap_or_default());
        if src_size != dst_size {
            return Err(FramebufferError::BlitSizeMismatch { src: src_size, dst: dst_size });
        }

        let rect = [0, 0, src_size.0 as i32, src_size.1 as i32];
        self.ctx.with(|b, s| {
            s.bind_framebuffer(b, FramebufferTarget::Read, src_h);
            s.bind_framebuffer(b, FramebufferTarget::Draw, dst_h);
            b.blit_framebuffer(rect, rect, ClearMask::DEPTH, TextureFilter::Nearest);
        });
        Ok(())
    }

    /// Copies color attachment `index` into `dst`'s draw buffers, scaling
    /// with `filter` when sizes differ.
    pub fn blit_color(&self, index: usize, dst: &Framebuffer, filter: TextureFilter) -> Result<(), FramebufferError> {
        let (src_h, dst_h) = (self.loaded_handle()?, dst.loaded_handle()?);
        if index >= self.colors.len() {
            return Err(FramebufferError::NoSuchAttachment { name: self.name.clone(), index });
        }
        let src_rect = [0, 0, self.width as i32, self.height as i32];
        let dst_rect = [0, 0, dst.width as i32, dst.height as i32];
        self.ctx.with(|b, s| {
            s.bind_framebuffer(b, FramebufferTarget::Read, src_h);
            b.read_buffer(AttachmentPoint::Color(index as u32));
            s.bind_framebuffer(b, FramebufferTarget::Draw, dst_h);
            b.blit_framebuffer(src_rect, dst_rect, ClearMask::COLOR, filter);
        });
        Ok(())
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        self.unload();
    }
}
