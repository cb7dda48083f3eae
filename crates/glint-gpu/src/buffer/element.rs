use bytemuck::Pod;

use crate::backend::{BufferTarget, BufferUsage, IndexType, Primitive};
use crate::context::GpuContext;
use crate::error::BufferError;
use crate::handle::Handle;

/// Integer types usable as indices.
pub trait IndexElement: Pod {
    const TYPE: IndexType;
}

impl IndexElement for u8 {
    const TYPE: IndexType = IndexType::U8;
}

impl IndexElement for u16 {
    const TYPE: IndexType = IndexType::U16;
}

impl IndexElement for u32 {
    const TYPE: IndexType = IndexType::U32;
}

/// Index payload. The draw count is the index count.
#[derive(Debug)]
pub struct ElementBuffer {
    ctx: GpuContext,
    handle: Handle,
    index_type: IndexType,
    bytes: usize,
    count: u32,
}

impl ElementBuffer {
    pub fn new(ctx: &GpuContext) -> Self {
        let handle = ctx.backend(|b| b.create_buffer());
        log::debug!("element buffer {} created", handle);
        Self { ctx: ctx.clone(), handle, index_type: IndexType::U32, bytes: 0, count: 0 }
    }

    #[inline]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    #[inline]
    pub fn index_type(&self) -> IndexType {
        self.index_type
    }

    #[inline]
    pub fn count(&self) -> u32 {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Uploads a fresh index list; an empty slice leaves the buffer untouched.
    ///
    /// The element-array binding belongs to the bound vertex array, so the
    /// upload happens with no vertex array bound.
    pub fn set_indices<I: IndexElement>(&mut self, indices: &[I], usage: BufferUsage) {
        if indices.is_empty() {
            log::trace!("element buffer {}: empty upload ignored", self.handle);
            return;
        }
        let bytes: &[u8] = bytemuck::cast_slice(indices);
        let h = self.handle;
        self.ctx.with(|b, s| {
            s.bind_vertex_array(b, Handle::INVALID);
            s.bind_buffer(b, BufferTarget::ElementArray, h);
            b.buffer_data(BufferTarget::ElementArray, bytes, usage);
        });
        self.index_type = I::TYPE;
        self.bytes = bytes.len();
        self.count = indices.len() as u32;
    }

    /// Overwrites indices starting at element `first`.
    ///
    /// `I` must match the type of the current payload.
    pub fn update_indices<I: IndexElement>(&mut self, indices: &[I], first: usize) -> Result<(), BufferError> {
        if indices.is_empty() {
            return Ok(());
        }
        let bytes: &[u8] = bytemuck::cast_slice(indices);
        let offset = first.saturating_mul(I::TYPE.size());
        let fits = offset.checked_add(bytes.len()).is_some_and(|end| end <= self.bytes);
        if I::TYPE != self.index_type || !fits {
            return Err(BufferError::UpdateOutOfRange { offset, len: bytes.len(), capacity: self.bytes });
        }
        let h = self.handle;
        self.ctx.with(|b, s| {
            s.bind_vertex_array(b, Handle::INVALID);
            s.bind_buffer(b, BufferTarget::ElementArray, h);
            b.buffer_sub_data(BufferTarget::ElementArray, offset, bytes);
        });
        Ok(())
    }

    /// Binds into the current vertex array; no-op without a payload.
    pub fn bind(&self) -> bool {
        if self.is_empty() {
            return false;
        }
        let h = self.handle;
        self.ctx.with(|b, s| s.bind_buffer(b, BufferTarget::ElementArray, h));
        true
    }

    /// Binds and draws every index.
    pub fn draw(&self, primitive: Primitive) {
        self.draw_instanced(primitive, 1);
    }

    pub fn draw_instanced(&self, primitive: Primitive, instances: u32) {
        if !self.bind() || instances == 0 {
            return;
        }
        let (count, index_type) = (self.count, self.index_type);
        self.ctx.backend(|b| b.draw_elements(primitive, count, index_type, 0, instances));
    }
}

impl Drop for ElementBuffer {
    fn drop(&mut self) {
        let h = self.handle;
        self.ctx.with(|b, s| {
            s.forget_buffer(h);
            b.delete_buffer(h);
        });
        log::debug!("element buffer {} deleted", h);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;
    use crate::context::ContextConfig;

    #[test]
    fn draw_count_is_index_count() {
        let backend = HeadlessBackend::new();
        let journal = backend.journal();
        let ctx = GpuContext::new(backend, ContextConfig::default());

        let mut ebo = ElementBuffer::new(&ctx);
        ebo.set_indices(&[0u16, 1, 2, 2, 3, 0], BufferUsage::StaticDraw);
        assert_eq!(ebo.count(), 6);
        assert_eq!(ebo.index_type(), IndexType::U16);

        ebo.draw(Primitive::Triangles);
        let draw = journal.last_draw().unwrap();
        assert_eq!(draw.count, 6);
        assert_eq!(draw.index_type, Some(IndexType::U16));
    }

    #[test]
    fn update_type_or_range_mismatch_fails() {
        let ctx = GpuContext::new(HeadlessBackend::new(), ContextConfig::default());
        let mut ebo = ElementBuffer::new(&ctx);
        ebo.set_indices(&[0u32, 1, 2], BufferUsage::StaticDraw);
        assert!(ebo.update_indices(&[5u32], 2).is_ok());
        assert!(ebo.update_indices(&[5u32, 6], 2).is_err());
        assert!(ebo.update_indices(&[5u16], 0).is_err());
    }

    #[test]
    fn update_with_huge_first_index_is_rejected() {
        let ctx = GpuContext::new(HeadlessBackend::new(), ContextConfig::default());
        let mut ebo = ElementBuffer::new(&ctx);
        ebo.set_indices(&[0u32, 1, 2], BufferUsage::StaticDraw);
        assert_eq!(
            ebo.update_indices(&[7u32], usize::MAX),
            Err(BufferError::UpdateOutOfRange { offset: usize::MAX, len: 4, capacity: 12 })
        );
        assert!(ebo.update_indices(&[7u32], usize::MAX / 4 + 1).is_err());
    }

    #[test]
    fn empty_buffer_draws_nothing() {
        let backend = HeadlessBackend::new();
        let journal = backend.journal();
        let ctx = GpuContext::new(backend, ContextConfig::default());
        let mut ebo = ElementBuffer::new(&ctx);
        ebo.set_indices::<u32>(&[], BufferUsage::StaticDraw);
        ebo.draw(Primitive::Triangles);
        assert!(journal.draws().is_empty());
    }
}
