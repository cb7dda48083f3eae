use super::format::TextureFormat;
use crate::context::GpuContext;
use crate::handle::Handle;

/// Render-only image storage; cannot be sampled.
#[derive(Debug)]
pub struct Renderbuffer {
    ctx: GpuContext,
    handle: Handle,
    format: TextureFormat,
    width: u32,
    height: u32,
}

impl Renderbuffer {
    pub fn new(ctx: &GpuContext, format: TextureFormat) -> Self {
        let handle = ctx.backend(|b| b.create_renderbuffer());
        log::debug!("renderbuffer {} created ({:?})", handle, format.internal);
        Self { ctx: ctx.clone(), handle, format, width: 0, height: 0 }
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
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// (Re)allocates storage.
    pub fn storage(&mut self, width: u32, height: u32) {
        let (h, format) = (self.handle, self.format);
        self.ctx.with(|b, s| {
            s.bind_renderbuffer(b, h);
            b.renderbuffer_storage(format, width, height);
        });
        self.width = width;
        self.height = height;
    }
}

impl Drop for Renderbuffer {
    fn drop(&mut self) {
        let h = self.handle;
        self.ctx.with(|b, s| {
            s.forget_renderbuffer(h);
            b.delete_renderbuffer(h);
        });
        log::debug!("renderbuffer {} deleted", h);
    }
}
