use crate::backend::{AttachmentPoint, Backend, FramebufferTarget};
use crate::context::GpuContext;
use crate::handle::Handle;
use crate::texture::{Renderbuffer, Texture2d, TextureFormat};

/// What an [`Attachment`] allocates when loaded. Fixed at construction.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum AttachmentBacking {
    /// Sampleable; supports mipmaps and `bind_texture`.
    Texture,
    /// Render-only.
    Renderbuffer,
}

#[derive(Debug)]
enum Storage {
    Texture(Texture2d),
    Renderbuffer(Renderbuffer),
}

/// A renderable 2D surface descriptor plus its (optional) live storage.
///
/// The descriptor survives [`unload`](Self::unload), so a framebuffer can be
/// reloaded at another size without re-describing its attachments.
#[derive(Debug)]
pub struct Attachment {
    name: String,
    format: TextureFormat,
    backing: AttachmentBacking,
    fixed_size: Option<(u32, u32)>,
    storage: Option<Storage>,
}

impl Attachment {
    pub fn texture(name: impl Into<String>, format: TextureFormat) -> Self {
        Self::new(name.into(), format, AttachmentBacking::Texture)
    }

    pub fn renderbuffer(name: impl Into<String>, format: TextureFormat) -> Self {
        Self::new(name.into(), format, AttachmentBacking::Renderbuffer)
    }

    fn new(name: String, format: TextureFormat, backing: AttachmentBacking) -> Self {
        Self { name, format, backing, fixed_size: None, storage: None }
    }

    /// Pins the size this attachment is allocated at, ignoring the size its
    /// framebuffer is loaded with.
    pub fn with_fixed_size(mut self, width: u32, height: u32) -> Self {
        self.fixed_size = Some((width, height));
        self
    }

    /// Takes effect on the next load.
    pub fn set_fixed_size(&mut self, size: Option<(u32, u32)>) {
        self.fixed_size = size;
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn format(&self) -> TextureFormat {
        self.format
    }

    #[inline]
    pub fn backing(&self) -> AttachmentBacking {
        self.backing
    }

    #[inline]
    pub fn fixed_size(&self) -> Option<(u32, u32)> {
        self.fixed_size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.storage.is_none()
    }

    /// Allocated size; `None` while empty.
    pub fn size(&self) -> Option<(u32, u32)> {
        match self.storage.as_ref()? {
            Storage::Texture(t) => Some(t.size()),
            Storage::Renderbuffer(r) => Some(r.size()),
        }
    }

    /// Backend handle of the storage, [`Handle::INVALID`] while empty.
    pub fn handle(&self) -> Handle {
        match &self.storage {
            Some(Storage::Texture(t)) => t.handle(),
            Some(Storage::Renderbuffer(r)) => r.handle(),
            None => Handle::INVALID,
        }
    }

    /// The backing texture, if loaded and texture-backed.
    pub fn texture_storage(&self) -> Option<&Texture2d> {
        match &self.storage {
            Some(Storage::Texture(t)) => Some(t),
            _ => None,
        }
    }

    pub fn texture_storage_mut(&mut self) -> Option<&mut Texture2d> {
        match &mut self.storage {
            Some(Storage::Texture(t)) => Some(t),
            _ => None,
        }
    }

    /// Allocates storage, unloading any previous storage first.
    pub fn load(&mut self, ctx: &GpuContext, width: u32, height: u32) {
        self.unload();
        let (w, h) = self.fixed_size.unwrap_or((width, height));
        let storage = match self.backing {
            AttachmentBacking::Texture => {
                let mut tex = Texture2d::new(ctx, self.format);
                tex.allocate(w, h);
                Storage::Texture(tex)
            }
            AttachmentBacking::Renderbuffer => {
                let mut rb = Renderbuffer::new(ctx, self.format);
                rb.storage(w, h);
                Storage::Renderbuffer(rb)
            }
        };
        log::debug!("attachment `{}` loaded at {}x{}", self.name, w, h);
        self.storage = Some(storage);
    }

    /// Releases the storage; the descriptor stays.
    pub fn unload(&mut self) {
        if self.storage.take().is_some() {
            log::debug!("attachment `{}` unloaded", self.name);
        }
    }

    /// Attaches the storage to the draw framebuffer at `point`.
    pub(crate) fn attach(&self, backend: &mut dyn Backend, point: AttachmentPoint) {
        match &self.storage {
            Some(Storage::Texture(t)) => {
                backend.framebuffer_texture(FramebufferTarget::Draw, point, t.handle(), 0)
            }
            Some(Storage::Renderbuffer(r)) => {
                backend.framebuffer_renderbuffer(FramebufferTarget::Draw, point, r.handle())
            }
            None => {}
        }
    }
}
