use super::element::ElementBuffer;
use super::vertex::VertexBuffer;
use crate::backend::Primitive;
use crate::context::GpuContext;
use crate::error::BufferError;
use crate::handle::Handle;

/// A vertex array: owns its vertex buffers, an optional element buffer and
/// the attribute configuration recorded against them.
///
/// Attribute configuration is vertex-array state, so it is only re-issued on
/// the first bind after a buffer was added or touched through
/// [`buffer_mut`](Self::buffer_mut).
#[derive(Debug)]
pub struct VertexArray {
    ctx: GpuContext,
    handle: Handle,
    buffers: Vec<VertexBuffer>,
    elements: Option<ElementBuffer>,
    primitive: Primitive,
    dirty: bool,
}

impl VertexArray {
    pub fn new(ctx: &GpuContext) -> Self {
        let handle = ctx.backend(|b| b.create_vertex_array());
        log::debug!("vertex array {} created", handle);
        Self {
            ctx: ctx.clone(),
            handle,
            buffers: Vec::new(),
            elements: None,
            primitive: Primitive::Triangles,
            dirty: true,
        }
    }

    #[inline]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    #[inline]
    pub fn primitive(&self) -> Primitive {
        self.primitive
    }

    #[inline]
    pub fn set_primitive(&mut self, primitive: Primitive) {
        self.primitive = primitive;
    }

    /// Takes ownership of `buffer`; returns its index.
    pub fn add_buffer(&mut self, buffer: VertexBuffer) -> usize {
        self.buffers.push(buffer);
        self.dirty = true;
        self.buffers.len() - 1
    }

    pub fn buffer(&self, index: usize) -> Option<&VertexBuffer> {
        self.buffers.get(index)
    }

    /// Mutable access; the attribute configuration is re-issued on next bind.
    pub fn buffer_mut(&mut self, index: usize) -> Result<&mut VertexBuffer, BufferError> {
        self.dirty = true;
        self.buffers.get_mut(index).ok_or(BufferError::NoSuchBuffer(index))
    }

    pub fn buffers(&self) -> &[VertexBuffer] {
        &self.buffers
    }

    pub fn set_elements(&mut self, elements: ElementBuffer) -> Option<ElementBuffer> {
        self.dirty = true;
        self.elements.replace(elements)
    }

    pub fn elements(&self) -> Option<&ElementBuffer> {
        self.elements.as_ref()
    }

    pub fn elements_mut(&mut self) -> Option<&mut ElementBuffer> {
        self.dirty = true;
        self.elements.as_mut()
    }

    pub fn take_elements(&mut self) -> Option<ElementBuffer> {
        self.dirty = true;
        self.elements.take()
    }

    /// Vertices per instance: the index count when indexed, otherwise the
    /// record count of the first per-vertex buffer.
    pub fn draw_count(&self) -> u32 {
        match &self.elements {
            Some(e) => e.count(),
            None => self.buffers.iter().find(|b| !b.is_instanced()).map_or(0, |b| b.count()),
        }
    }

    /// Binds the array, configuring attributes if anything changed since
    /// the last bind.
    pub fn bind(&mut self) -> bool {
        let h = self.handle;
        let changed = self.ctx.with(|b, s| s.bind_vertex_array(b, h));
        if self.dirty {
            for buffer in &self.buffers {
                buffer.bind();
            }
            if let Some(elements) = &self.elements {
                elements.bind();
            }
            self.dirty = false;
        }
        changed
    }

    pub fn unbind(&self) -> bool {
        self.ctx.with(|b, s| s.bind_vertex_array(b, Handle::INVALID))
    }

    pub fn draw(&mut self) {
        self.draw_instanced(1);
    }

    /// Binds and draws `instances` instances, indexed when an element buffer is present.
    pub fn draw_instanced(&mut self, instances: u32) {
        let count = self.draw_count();
        if count == 0 || instances == 0 {
            return;
        }
        self.bind();
        let primitive = self.primitive;
        match &self.elements {
            Some(e) => {
                let index_type = e.index_type();
                self.ctx.backend(|b| b.draw_elements(primitive, count, index_type, 0, instances));
            }
            None => self.ctx.backend(|b| b.draw_arrays(primitive, 0, count, instances)),
        }
    }
}

impl Drop for VertexArray {
    fn drop(&mut self) {
        let h = self.handle;
        self.ctx.with(|b, s| {
            s.forget_vertex_array(h);
            b.delete_vertex_array(h);
        });
        log::debug!("vertex array {} deleted", h);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BufferUsage, HeadlessBackend, IndexType, Journal};
    use crate::buffer::StrideHint;
    use crate::context::ContextConfig;

    fn ctx() -> (GpuContext, Journal) {
        let backend = HeadlessBackend::new();
        let journal = backend.journal();
        (GpuContext::new(backend, ContextConfig::default()), journal)
    }

    fn quad(ctx: &GpuContext) -> VertexBuffer {
        let mut vbo = VertexBuffer::new(ctx);
        vbo.add_stride_hint(StrideHint::per_vertex(0, 2, 0)).unwrap();
        vbo.set_vertices(&[0.0f32; 8], BufferUsage::StaticDraw);
        vbo
    }

    #[test]
    fn attributes_configured_once_until_touched() {
        let (ctx, journal) = ctx();
        let mut vao = VertexArray::new(&ctx);
        vao.add_buffer(quad(&ctx));

        vao.bind();
        vao.unbind();
        vao.bind();
        assert_eq!(journal.count("vertex_attrib_pointer"), 1);

        vao.buffer_mut(0).unwrap().update_vertices(&[1.0f32], 0).unwrap();
        vao.bind();
        assert_eq!(journal.count("vertex_attrib_pointer"), 2);
    }

    #[test]
    fn indexed_when_elements_present() {
        let (ctx, journal) = ctx();
        let mut vao = VertexArray::new(&ctx);
        vao.add_buffer(quad(&ctx));
        vao.draw();
        assert_eq!(journal.last_draw().unwrap().count, 4);
        assert_eq!(journal.last_draw().unwrap().index_type, None);

        let mut ebo = ElementBuffer::new(&ctx);
        ebo.set_indices(&[0u8, 1, 2, 2, 3, 0], BufferUsage::StaticDraw);
        vao.set_elements(ebo);
        vao.draw_instanced(5);
        let draw = journal.last_draw().unwrap();
        assert_eq!(draw.count, 6);
        assert_eq!(draw.instances, 5);
        assert_eq!(draw.index_type, Some(IndexType::U8));
    }

    #[test]
    fn missing_buffer_index() {
        let (ctx, _) = ctx();
        let mut vao = VertexArray::new(&ctx);
        assert_eq!(vao.buffer_mut(2).err(), Some(BufferError::NoSuchBuffer(2)));
    }

    #[test]
    fn instanced_buffers_do_not_drive_count() {
        let (ctx, _) = ctx();
        let mut vao = VertexArray::new(&ctx);
        let mut per_instance = VertexBuffer::new(&ctx);
        per_instance.add_stride_hint(StrideHint::per_instance(4, 4, 0)).unwrap();
        per_instance.set_vertices(&[0.0f32; 40], BufferUsage::StaticDraw);
        vao.add_buffer(per_instance);
        vao.add_buffer(quad(&ctx));
        assert_eq!(vao.draw_count(), 4);
    }
}
