use bytemuck::Pod;

use super::layout::{StrideHint, VertexLayout};
use crate::backend::{BufferTarget, BufferUsage, Primitive};
use crate::context::GpuContext;
use crate::error::BufferError;
use crate::handle::Handle;
use crate::texture::ComponentType;

/// GPU-side vertex payload plus the layout describing its records.
///
/// The draw count is recomputed whenever the payload or the layout changes:
/// payload bytes ÷ stride.
#[derive(Debug)]
pub struct VertexBuffer {
    ctx: GpuContext,
    handle: Handle,
    component: ComponentType,
    layout: VertexLayout,
    bytes: usize,
    count: u32,
}

impl VertexBuffer {
    /// A buffer of 4-byte floats.
    pub fn new(ctx: &GpuContext) -> Self {
        Self::with_component(ctx, ComponentType::Float)
    }

    pub fn with_component(ctx: &GpuContext, component: ComponentType) -> Self {
        let handle = ctx.backend(|b| b.create_buffer());
        log::debug!("vertex buffer {} created ({:?})", handle, component);
        Self { ctx: ctx.clone(), handle, component, layout: VertexLayout::new(), bytes: 0, count: 0 }
    }

    #[inline]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    #[inline]
    pub fn component(&self) -> ComponentType {
        self.component
    }

    #[inline]
    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    /// Record size in bytes.
    #[inline]
    pub fn stride(&self) -> usize {
        self.layout.stride(self.component.size())
    }

    /// Records (vertices or instances) in the current payload.
    #[inline]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Allocated payload size in bytes.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.bytes
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes == 0
    }

    /// `true` if this buffer steps per instance only.
    pub fn is_instanced(&self) -> bool {
        !self.layout.has_per_vertex()
    }

    // ── layout ────────────────────────────────────────────────────────────

    /// Adds (or replaces) the hint for `hint.slot`.
    pub fn add_stride_hint(&mut self, hint: StrideHint) -> Result<(), BufferError> {
        self.validate_hint(&hint)?;
        if let Some(old) = self.layout.insert(hint) {
            log::debug!("vertex buffer {}: slot {} hint replaced ({:?})", self.handle, hint.slot, old);
        }
        self.recount();
        Ok(())
    }

    pub fn remove_stride_hint(&mut self, slot: u32) -> Option<StrideHint> {
        let removed = self.layout.remove(slot);
        if removed.is_some() {
            self.recount();
        }
        removed
    }

    /// Replaces the whole layout. On error the current layout is kept.
    pub fn set_layout(&mut self, layout: VertexLayout) -> Result<(), BufferError> {
        for hint in layout.iter() {
            self.validate_hint(hint)?;
        }
        self.layout = layout;
        self.recount();
        Ok(())
    }

    fn validate_hint(&self, hint: &StrideHint) -> Result<(), BufferError> {
        let max = self.ctx.limits().max_vertex_attribs;
        if hint.slot >= max {
            return Err(BufferError::SlotOutOfRange { slot: hint.slot, max });
        }
        if !(1..=4).contains(&hint.components) {
            return Err(BufferError::InvalidComponents { slot: hint.slot, components: hint.components });
        }
        Ok(())
    }

    fn recount(&mut self) {
        let size = self.component.size();
        self.count = self.layout.record_count(self.bytes, size);
        if self.ctx.validate_layouts() && self.bytes > 0 {
            for issue in self.layout.check(size, self.bytes) {
                log::error!("vertex buffer {}: {}", self.handle, issue);
            }
        }
    }

    // ── payload ───────────────────────────────────────────────────────────

    /// Uploads a fresh payload, replacing any prior one.
    ///
    /// An empty slice leaves the buffer untouched.
    pub fn set_vertices<T: Pod>(&mut self, data: &[T], usage: BufferUsage) {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        if bytes.is_empty() {
            log::trace!("vertex buffer {}: empty upload ignored", self.handle);
            return;
        }
        let h = self.handle;
        self.ctx.with(|b, s| {
            s.bind_buffer(b, BufferTarget::Array, h);
            b.buffer_data(BufferTarget::Array, bytes, usage);
        });
        self.bytes = bytes.len();
        self.recount();
    }

    /// Overwrites `data.len()` bytes starting at `byte_offset` without
    /// reallocating.
    pub fn update_vertices<T: Pod>(&mut self, data: &[T], byte_offset: usize) -> Result<(), BufferError> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        if bytes.is_empty() {
            return Ok(());
        }
        if byte_offset.checked_add(bytes.len()).is_none_or(|end| end > self.bytes) {
            return Err(BufferError::UpdateOutOfRange {
                offset: byte_offset,
                len: bytes.len(),
                capacity: self.bytes,
            });
        }
        let h = self.handle;
        self.ctx.with(|b, s| {
            s.bind_buffer(b, BufferTarget::Array, h);
            b.buffer_sub_data(BufferTarget::Array, byte_offset, bytes);
        });
        Ok(())
    }

    // ── binding and drawing ───────────────────────────────────────────────

    /// Binds the storage and configures one attribute per stride hint.
    ///
    /// A buffer with no payload is not bound; returns `false` then.
    pub fn bind(&self) -> bool {
        if self.is_empty() {
            return false;
        }
        let stride = self.stride();
        let component = self.component;
        let h = self.handle;
        self.ctx.with(|b, s| {
            s.bind_buffer(b, BufferTarget::Array, h);
            for hint in self.layout.iter() {
                b.enable_vertex_attrib(hint.slot);
                b.vertex_attrib_pointer(hint.slot, hint.components, component, stride, hint.offset);
                b.vertex_attrib_divisor(hint.slot, u32::from(hint.instanced));
            }
        });
        true
    }

    /// Draws every record of this buffer as vertices.
    pub fn draw(&self, primitive: Primitive) {
        self.draw_instanced(primitive, 1);
    }

    pub fn draw_instanced(&self, primitive: Primitive, instances: u32) {
        if self.count == 0 || instances == 0 {
            return;
        }
        let count = self.count;
        self.ctx.backend(|b| b.draw_arrays(primitive, 0, count, instances));
    }
}

impl Drop for VertexBuffer {
    fn drop(&mut self) {
        let h = self.handle;
        self.ctx.with(|b, s| {
            s.forget_buffer(h);
            b.delete_buffer(h);
        });
        log::debug!("vertex buffer {} deleted", h);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;
    use crate::context::ContextConfig;

    fn ctx() -> (GpuContext, crate::backend::Journal) {
        let backend = HeadlessBackend::new();
        let journal = backend.journal();
        (GpuContext::new(backend, ContextConfig::default()), journal)
    }

    #[test]
    fn count_follows_layout_changes() {
        let (ctx, _) = ctx();
        let mut vbo = VertexBuffer::new(&ctx);
        vbo.set_vertices(&[0.0f32; 24], BufferUsage::StaticDraw);
        assert_eq!(vbo.count(), 24);

        vbo.add_stride_hint(StrideHint::per_vertex(0, 3, 0)).unwrap();
        assert_eq!(vbo.count(), 8);
        vbo.add_stride_hint(StrideHint::per_vertex(1, 3, 12)).unwrap();
        assert_eq!(vbo.count(), 4);
        vbo.remove_stride_hint(0);
        assert_eq!(vbo.count(), 8);
    }

    #[test]
    fn empty_upload_is_a_noop() {
        let (ctx, journal) = ctx();
        let mut vbo = VertexBuffer::new(&ctx);
        journal.clear();
        vbo.set_vertices::<f32>(&[], BufferUsage::StaticDraw);
        assert!(journal.is_empty());
        assert!(!vbo.bind());
    }

    #[test]
    fn update_past_allocation_fails() {
        let (ctx, _) = ctx();
        let mut vbo = VertexBuffer::new(&ctx);
        vbo.set_vertices(&[1.0f32; 4], BufferUsage::DynamicDraw);
        assert!(vbo.update_vertices(&[2.0f32; 2], 8).is_ok());
        assert_eq!(
            vbo.update_vertices(&[2.0f32; 2], 12),
            Err(BufferError::UpdateOutOfRange { offset: 12, len: 8, capacity: 16 })
        );
    }

    #[test]
    fn update_with_huge_offset_is_rejected() {
        let (ctx, journal) = ctx();
        let mut vbo = VertexBuffer::new(&ctx);
        vbo.set_vertices(&[1.0f32; 4], BufferUsage::DynamicDraw);
        journal.clear();
        assert_eq!(
            vbo.update_vertices(&[1.0f32], usize::MAX),
            Err(BufferError::UpdateOutOfRange { offset: usize::MAX, len: 4, capacity: 16 })
        );
        assert!(journal.is_empty());
    }

    #[test]
    fn rejected_layout_keeps_the_current_one() {
        let (ctx, _) = ctx();
        let mut vbo = VertexBuffer::new(&ctx);
        vbo.set_layout(VertexLayout::packed(&[(0, 3), (1, 3)], 4)).unwrap();
        vbo.set_vertices(&[0.0f32; 60], BufferUsage::StaticDraw);
        assert_eq!(vbo.count(), 10);

        let mut bad = VertexLayout::new();
        bad.insert(StrideHint::per_vertex(2, 1, 0));
        bad.insert(StrideHint::per_vertex(20, 1, 4));
        assert_eq!(vbo.set_layout(bad), Err(BufferError::SlotOutOfRange { slot: 20, max: 16 }));
        assert_eq!(vbo.layout(), &VertexLayout::packed(&[(0, 3), (1, 3)], 4));
        assert_eq!(vbo.count(), 10);

        vbo.set_layout(VertexLayout::packed(&[(0, 2)], 4)).unwrap();
        assert_eq!(vbo.count(), 30);
    }

    #[test]
    fn hint_validation() {
        let (ctx, _) = ctx();
        let mut vbo = VertexBuffer::new(&ctx);
        assert!(matches!(
            vbo.add_stride_hint(StrideHint::per_vertex(16, 3, 0)),
            Err(BufferError::SlotOutOfRange { .. })
        ));
        assert!(matches!(
            vbo.add_stride_hint(StrideHint::per_vertex(0, 5, 0)),
            Err(BufferError::InvalidComponents { .. })
        ));
    }

    #[test]
    fn instanced_hint_sets_divisor() {
        let (ctx, journal) = ctx();
        let mut vbo = VertexBuffer::new(&ctx);
        vbo.add_stride_hint(StrideHint::per_instance(3, 4, 0)).unwrap();
        vbo.set_vertices(&[0.0f32; 16], BufferUsage::StaticDraw);
        assert!(vbo.is_instanced());
        vbo.bind();
        assert_eq!(journal.count("vertex_attrib_divisor"), 1);
        assert_eq!(journal.count("vertex_attrib_pointer"), 1);
    }

    #[test]
    fn drop_releases_handle() {
        let (ctx, journal) = ctx();
        let vbo = VertexBuffer::new(&ctx);
        drop(vbo);
        assert_eq!(journal.count("delete_buffer"), 1);
    }
}
