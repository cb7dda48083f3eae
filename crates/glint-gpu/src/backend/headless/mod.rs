//! Software model of a GL context.
//!
//! [`HeadlessBackend`] keeps enough object state to answer every query the
//! layer makes (compile/link status, reflection, framebuffer completeness,
//! pixel readback) and records each call in a [`Journal`]. It is what the
//! test suite and the `glint-inspect` tool run against.

mod glsl;
mod link;

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use self::glsl::CompiledModule;
use self::link::LinkedProgram;
use super::{
    gl, ActiveUniform, AttachmentPoint, Backend, BufferTarget, BufferUsage, ClearMask, DrawRecord,
    FramebufferTarget, IndexType, Journal, Limits, Primitive, TextureFilter, TextureWrap, UniformData,
    UniformTarget, UniformWrite,
};
use crate::handle::Handle;
use crate::shader::ShaderStage;
use crate::state::{BlendState, CullMode, DepthState, ViewportRect};
use crate::texture::{ComponentType, PixelLayout, TextureFormat};

// ── objects ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct BufferObj {
    data: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
struct AttribState {
    enabled: bool,
    components: u32,
    component: Option<ComponentType>,
    stride: usize,
    offset: usize,
    divisor: u32,
    buffer: Handle,
}

#[derive(Debug, Default)]
struct VertexArrayObj {
    attribs: BTreeMap<u32, AttribState>,
    element_buffer: Handle,
}

#[derive(Debug, Default)]
struct TextureObj {
    width: u32,
    height: u32,
    format: Option<TextureFormat>,
    levels: u32,
    pixels: Vec<u8>,
}

#[derive(Debug, Default)]
struct RenderbufferObj {
    width: u32,
    height: u32,
    format: Option<TextureFormat>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Image {
    Texture(Handle),
    Renderbuffer(Handle),
}

#[derive(Debug)]
struct FramebufferObj {
    attachments: BTreeMap<AttachmentPoint, Image>,
    draw_buffers: Vec<AttachmentPoint>,
    read_buffer: AttachmentPoint,
}

impl Default for FramebufferObj {
    fn default() -> Self {
        Self {
            attachments: BTreeMap::new(),
            draw_buffers: vec![AttachmentPoint::Color(0)],
            read_buffer: AttachmentPoint::Color(0),
        }
    }
}

#[derive(Debug)]
struct ShaderObj {
    stage: ShaderStage,
    source: String,
    module: Option<CompiledModule>,
    log: String,
}

#[derive(Debug, Default)]
struct ProgramObj {
    attached: Vec<Handle>,
    linked: Option<LinkedProgram>,
    log: String,
}

#[derive(Debug)]
struct Bindings {
    array_buffer: Handle,
    uniform_buffer: Handle,
    vertex_array: Handle,
    texture_units: Vec<Handle>,
    active_unit: u32,
    renderbuffer: Handle,
    draw_framebuffer: Handle,
    read_framebuffer: Handle,
    program: Handle,
}

impl Bindings {
    fn new(limits: &Limits) -> Self {
        Self {
            array_buffer: Handle::INVALID,
            uniform_buffer: Handle::INVALID,
            vertex_array: Handle::INVALID,
            texture_units: vec![Handle::INVALID; limits.max_texture_slots as usize],
            active_unit: 0,
            renderbuffer: Handle::INVALID,
            draw_framebuffer: Handle::INVALID,
            read_framebuffer: Handle::INVALID,
            program: Handle::INVALID,
        }
    }
}

// ── HeadlessBackend ───────────────────────────────────────────────────────

/// A [`Backend`] with no GPU behind it.
///
/// ```
/// use glint_gpu::backend::{Backend, HeadlessBackend};
///
/// let mut backend = HeadlessBackend::new();
/// let journal = backend.journal();
/// let buffer = backend.create_buffer();
/// assert!(buffer.is_valid());
/// assert_eq!(journal.count("create_buffer"), 1);
/// ```
#[derive(Debug)]
pub struct HeadlessBackend {
    journal: Journal,
    limits: Limits,
    next_handle: u32,
    bound: Bindings,

    buffers: FxHashMap<Handle, BufferObj>,
    vertex_arrays: FxHashMap<Handle, VertexArrayObj>,
    /// Attribute state used while no vertex array is bound.
    default_vertex_array: VertexArrayObj,
    textures: FxHashMap<Handle, TextureObj>,
    renderbuffers: FxHashMap<Handle, RenderbufferObj>,
    framebuffers: FxHashMap<Handle, FramebufferObj>,
    shaders: FxHashMap<Handle, ShaderObj>,
    programs: FxHashMap<Handle, ProgramObj>,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    pub fn with_limits(limits: Limits) -> Self {
        Self {
            journal: Journal::new(),
            limits,
            next_handle: 1,
            bound: Bindings::new(&limits),
            buffers: FxHashMap::default(),
            vertex_arrays: FxHashMap::default(),
            default_vertex_array: VertexArrayObj::default(),
            textures: FxHashMap::default(),
            renderbuffers: FxHashMap::default(),
            framebuffers: FxHashMap::default(),
            shaders: FxHashMap::default(),
            programs: FxHashMap::default(),
        }
    }

    /// Another view of the call journal; stays valid after the backend is
    /// moved into a context.
    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    fn alloc(&mut self) -> Handle {
        let h = Handle(self.next_handle);
        self.next_handle += 1;
        h
    }

    fn vertex_array_mut(&mut self) -> &mut VertexArrayObj {
        let vao = self.bound.vertex_array;
        match self.vertex_arrays.get_mut(&vao) {
            Some(obj) => obj,
            None => &mut self.default_vertex_array,
        }
    }

    fn element_buffer(&self) -> Handle {
        self.vertex_arrays
            .get(&self.bound.vertex_array)
            .unwrap_or(&self.default_vertex_array)
            .element_buffer
    }

    fn buffer_for(&self, target: BufferTarget) -> Handle {
        match target {
            BufferTarget::Array => self.bound.array_buffer,
            BufferTarget::ElementArray => self.element_buffer(),
            BufferTarget::Uniform => self.bound.uniform_buffer,
        }
    }

    fn bound_texture(&self) -> Handle {
        self.bound
            .texture_units
            .get(self.bound.active_unit as usize)
            .copied()
            .unwrap_or(Handle::INVALID)
    }

    fn framebuffer_for(&self, target: FramebufferTarget) -> Handle {
        match target {
            FramebufferTarget::Read => self.bound.read_framebuffer,
            FramebufferTarget::Draw | FramebufferTarget::Both => self.bound.draw_framebuffer,
        }
    }

    fn attach(&mut self, target: FramebufferTarget, point: AttachmentPoint, image: Option<Image>) {
        let fbo = self.framebuffer_for(target);
        let Some(obj) = self.framebuffers.get_mut(&fbo) else {
            log::warn!("headless: attachment to {:?} with no framebuffer bound", point);
            return;
        };
        match image {
            Some(image) => {
                obj.attachments.insert(point, image);
            }
            None => {
                obj.attachments.remove(&point);
            }
        }
    }

    /// `(width, height, format)` of an attached image, `None` if it no longer exists.
    fn image_info(&self, image: Image) -> Option<(u32, u32, Option<TextureFormat>)> {
        match image {
            Image::Texture(h) => self.textures.get(&h).map(|t| (t.width, t.height, t.format)),
            Image::Renderbuffer(h) => self.renderbuffers.get(&h).map(|r| (r.width, r.height, r.format)),
        }
    }

    fn framebuffer_status(&self, fbo: Handle) -> u32 {
        if !fbo.is_valid() {
            return gl::FRAMEBUFFER_COMPLETE;
        }
        let Some(obj) = self.framebuffers.get(&fbo) else {
            return gl::FRAMEBUFFER_UNDEFINED;
        };
        if obj.attachments.is_empty() {
            return gl::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT;
        }

        let mut size = None;
        let mut mismatch = false;
        for (point, image) in &obj.attachments {
            if let AttachmentPoint::Color(i) = point {
                if *i >= self.limits.max_color_attachments {
                    return gl::FRAMEBUFFER_UNSUPPORTED;
                }
            }
            let Some((w, h, Some(format))) = self.image_info(*image) else {
                return gl::FRAMEBUFFER_INCOMPLETE_ATTACHMENT;
            };
            if w == 0 || h == 0 {
                return gl::FRAMEBUFFER_INCOMPLETE_ATTACHMENT;
            }
            let compatible = match point {
                AttachmentPoint::Color(_) => !format.is_depth(),
                AttachmentPoint::Depth => format.is_depth(),
                AttachmentPoint::DepthStencil => format.internal.has_stencil(),
            };
            if !compatible {
                return gl::FRAMEBUFFER_INCOMPLETE_ATTACHMENT;
            }
            match size {
                None => size = Some((w, h)),
                Some(s) => mismatch |= s != (w, h),
            }
        }
        if mismatch {
            return gl::FRAMEBUFFER_INCOMPLETE_DIMENSIONS;
        }
        if obj.draw_buffers.iter().any(|p| !obj.attachments.contains_key(p)) {
            return gl::FRAMEBUFFER_INCOMPLETE_DRAW_BUFFER;
        }
        gl::FRAMEBUFFER_COMPLETE
    }

    /// Fills every texel of a texture-backed image with `value` (one entry per channel).
    fn fill_image(&mut self, image: Image, value: &[f32]) {
        let Image::Texture(h) = image else { return };
        let Some(tex) = self.textures.get_mut(&h) else { return };
        let Some(format) = tex.format else { return };
        let bpp = format.bytes_per_pixel();
        let size = format.component.size();
        if bpp == 0 {
            return;
        }
        for px in tex.pixels.chunks_exact_mut(bpp) {
            for (c, v) in value.iter().take(format.channel_count()).enumerate() {
                write_channel(px, format.component, c * size, *v);
            }
        }
    }

    /// Nearest-sample copy of `src` (x0, y0, x1, y1) into `dst`. Linear
    /// filtering samples the same way.
    fn blit_image(&mut self, from: Image, to: Image, src: [i32; 4], dst: [i32; 4]) {
        let (Image::Texture(from), Image::Texture(to)) = (from, to) else { return };
        if from == to {
            return;
        }
        let Some((sw, sh, src_format, pixels)) =
            self.textures.get(&from).and_then(|t| Some((t.width, t.height, t.format?, t.pixels.clone())))
        else {
            return;
        };
        let Some(tex) = self.textures.get_mut(&to) else { return };
        let Some(dst_format) = tex.format else { return };

        let (src_w, src_h) = (i64::from(src[2] - src[0]), i64::from(src[3] - src[1]));
        let (dst_w, dst_h) = (i64::from(dst[2] - dst[0]), i64::from(dst[3] - dst[1]));
        if src_w <= 0 || src_h <= 0 || dst_w <= 0 || dst_h <= 0 {
            return;
        }
        let (src_bpp, dst_bpp) = (src_format.bytes_per_pixel(), dst_format.bytes_per_pixel());
        let (src_size, dst_size) = (src_format.component.size(), dst_format.component.size());

        for row in 0..dst_h {
            for col in 0..dst_w {
                let (tx, ty) = (i64::from(dst[0]) + col, i64::from(dst[1]) + row);
                let (sx, sy) = (i64::from(src[0]) + col * src_w / dst_w, i64::from(src[1]) + row * src_h / dst_h);
                if tx < 0 || ty < 0 || tx >= i64::from(tex.width) || ty >= i64::from(tex.height) {
                    continue;
                }
                if sx < 0 || sy < 0 || sx >= i64::from(sw) || sy >= i64::from(sh) {
                    continue;
                }
                let src_px = (sy as usize * sw as usize + sx as usize) * src_bpp;
                let dst_px = (ty as usize * tex.width as usize + tx as usize) * dst_bpp;
                for c in 0..dst_format.channel_count() {
                    let value = if c < src_format.channel_count() {
                        read_channel(&pixels, src_format.component, src_px + c * src_size)
                    } else if c == 3 {
                        1.0
                    } else {
                        0.0
                    };
                    write_channel(&mut tex.pixels, dst_format.component, dst_px + c * dst_size, value);
                }
            }
        }
    }

    /// Warns when an enabled per-vertex attribute would read past its buffer.
    fn check_vertex_range(&self, first: u32, count: u32) {
        if count == 0 {
            return;
        }
        let vao = self.vertex_arrays.get(&self.bound.vertex_array).unwrap_or(&self.default_vertex_array);
        for (slot, attrib) in &vao.attribs {
            if !attrib.enabled || attrib.divisor != 0 {
                continue;
            }
            let Some(component) = attrib.component else { continue };
            let len = self.buffers.get(&attrib.buffer).map_or(0, |b| b.data.len());
            let last = (first + count - 1) as usize;
            let needed = attrib.offset + last * attrib.stride + attrib.components as usize * component.size();
            if needed > len {
                log::warn!("headless: attribute {} reads {} bytes from a {}-byte buffer", slot, needed, len);
            }
        }
    }

    fn linked(&self, program: Handle) -> Option<&LinkedProgram> {
        self.programs.get(&program).and_then(|p| p.linked.as_ref())
    }

    fn resolve(&self, target: UniformTarget) -> Handle {
        match target {
            UniformTarget::Bound => self.bound.program,
            UniformTarget::Program(h) => h,
        }
    }

    fn upload(&mut self, call: &'static str, target: UniformTarget, location: i32, components: u32, transpose: bool, data: UniformData) {
        self.journal.record(call);
        let program = self.resolve(target);
        if location < 0 {
            return;
        }
        match self.linked(program) {
            None => log::warn!("headless: {} on {} which is not a linked program", call, program),
            Some(linked) if linked.uniform_at(location).is_none() => {
                log::warn!("headless: {} to unknown location {} of {}", call, location, program)
            }
            Some(_) => {}
        }
        self.journal.record_uniform(UniformWrite { program, location, components, transpose, data });
    }
}

// ── pixel helpers ─────────────────────────────────────────────────────────

fn read_channel(src: &[u8], component: ComponentType, at: usize) -> f32 {
    let Some(bytes) = src.get(at..at + component.size()) else { return 0.0 };
    match component {
        ComponentType::UnsignedByte => bytes[0] as f32 / 255.0,
        ComponentType::UnsignedShort => u16::from_ne_bytes([bytes[0], bytes[1]]) as f32 / 65535.0,
        ComponentType::UnsignedInt => {
            u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32 / u32::MAX as f32
        }
        ComponentType::Float => f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        _ => 0.0,
    }
}

fn write_channel(dst: &mut [u8], component: ComponentType, at: usize, value: f32) {
    let Some(bytes) = dst.get_mut(at..at + component.size()) else { return };
    let v = value.clamp(0.0, 1.0);
    match component {
        ComponentType::UnsignedByte => bytes[0] = (v * 255.0).round() as u8,
        ComponentType::UnsignedShort => bytes.copy_from_slice(&((v * 65535.0).round() as u16).to_ne_bytes()),
        ComponentType::UnsignedInt => bytes.copy_from_slice(&((v as f64 * u32::MAX as f64).round() as u32).to_ne_bytes()),
        ComponentType::Float => bytes.copy_from_slice(&value.to_ne_bytes()),
        _ => {}
    }
}

// ── Backend impl ──────────────────────────────────────────────────────────

impl Backend for HeadlessBackend {
    fn limits(&self) -> Limits {
        self.limits
    }

    fn set_cull_mode(&mut self, mode: CullMode) {
        log::trace!("headless: cull {:?}", mode);
        self.journal.record("set_cull_mode");
    }

    fn set_blend(&mut self, blend: BlendState) {
        log::trace!("headless: blend {:?}", blend);
        self.journal.record("set_blend");
    }

    fn set_depth(&mut self, depth: DepthState) {
        log::trace!("headless: depth {:?}", depth);
        self.journal.record("set_depth");
    }

    fn set_wireframe(&mut self, enabled: bool) {
        log::trace!("headless: wireframe {}", enabled);
        self.journal.record("set_wireframe");
    }

    fn set_viewport(&mut self, viewport: ViewportRect) {
        log::trace!("headless: viewport {:?}", viewport);
        self.journal.record("set_viewport");
    }

    fn active_texture(&mut self, slot: u32) {
        self.journal.record("active_texture");
        if slot >= self.limits.max_texture_slots {
            log::warn!("headless: texture slot {} out of range", slot);
            return;
        }
        self.bound.active_unit = slot;
    }

    fn clear(&mut self, color: [f32; 4], depth: f32, mask: ClearMask) {
        self.journal.record("clear");
        let fbo = self.bound.draw_framebuffer;
        let Some(obj) = self.framebuffers.get(&fbo) else { return };

        let mut targets = Vec::new();
        if mask.contains(ClearMask::COLOR) {
            for point in &obj.draw_buffers {
                if let Some(image) = obj.attachments.get(point) {
                    targets.push((*image, color.to_vec()));
                }
            }
        }
        if mask.contains(ClearMask::DEPTH) {
            for point in [AttachmentPoint::Depth, AttachmentPoint::DepthStencil] {
                if let Some(image) = obj.attachments.get(&point) {
                    targets.push((*image, vec![depth]));
                }
            }
        }
        for (image, value) in targets {
            self.fill_image(image, &value);
        }
    }

    // ── buffers ───────────────────────────────────────────────────────────

    fn create_buffer(&mut self) -> Handle {
        self.journal.record("create_buffer");
        let h = self.alloc();
        self.buffers.insert(h, BufferObj::default());
        h
    }

    fn delete_buffer(&mut self, buffer: Handle) {
        self.journal.record("delete_buffer");
        self.buffers.remove(&buffer);
        if self.bound.array_buffer == buffer {
            self.bound.array_buffer = Handle::INVALID;
        }
        if self.bound.uniform_buffer == buffer {
            self.bound.uniform_buffer = Handle::INVALID;
        }
        let vao = self.vertex_array_mut();
        if vao.element_buffer == buffer {
            vao.element_buffer = Handle::INVALID;
        }
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Handle) {
        self.journal.record("bind_buffer");
        match target {
            BufferTarget::Array => self.bound.array_buffer = buffer,
            BufferTarget::ElementArray => self.vertex_array_mut().element_buffer = buffer,
            BufferTarget::Uniform => self.bound.uniform_buffer = buffer,
        }
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage) {
        self.journal.record("buffer_data");
        let h = self.buffer_for(target);
        match self.buffers.get_mut(&h) {
            Some(buf) => {
                log::trace!("headless: {} bytes into {} ({:?})", data.len(), h, usage);
                buf.data = data.to_vec();
            }
            None => log::warn!("headless: buffer_data with no {:?} buffer bound", target),
        }
    }

    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]) {
        self.journal.record("buffer_sub_data");
        let h = self.buffer_for(target);
        let Some(buf) = self.buffers.get_mut(&h) else {
            log::warn!("headless: buffer_sub_data with no {:?} buffer bound", target);
            return;
        };
        match buf.data.get_mut(offset..offset + data.len()) {
            Some(dst) => dst.copy_from_slice(data),
            None => log::warn!(
                "headless: buffer_sub_data range {}..{} exceeds {} bytes",
                offset,
                offset + data.len(),
                buf.data.len()
            ),
        }
    }

    fn create_vertex_array(&mut self) -> Handle {
        self.journal.record("create_vertex_array");
        let h = self.alloc();
        self.vertex_arrays.insert(h, VertexArrayObj::default());
        h
    }

    fn delete_vertex_array(&mut self, vao: Handle) {
        self.journal.record("delete_vertex_array");
        self.vertex_arrays.remove(&vao);
        if self.bound.vertex_array == vao {
            self.bound.vertex_array = Handle::INVALID;
        }
    }

    fn bind_vertex_array(&mut self, vao: Handle) {
        self.journal.record("bind_vertex_array");
        self.bound.vertex_array = vao;
    }

    fn enable_vertex_attrib(&mut self, slot: u32) {
        self.journal.record("enable_vertex_attrib");
        if slot >= self.limits.max_vertex_attribs {
            log::warn!("headless: attribute slot {} out of range", slot);
            return;
        }
        self.vertex_array_mut().attribs.entry(slot).or_default().enabled = true;
    }

    fn vertex_attrib_pointer(
        &mut self,
        slot: u32,
        components: u32,
        component: ComponentType,
        stride: usize,
        offset: usize,
    ) {
        self.journal.record("vertex_attrib_pointer");
        if slot >= self.limits.max_vertex_attribs {
            log::warn!("headless: attribute slot {} out of range", slot);
            return;
        }
        let buffer = self.bound.array_buffer;
        let attrib = self.vertex_array_mut().attribs.entry(slot).or_default();
        attrib.components = components;
        attrib.component = Some(component);
        attrib.stride = stride;
        attrib.offset = offset;
        attrib.buffer = buffer;
    }

    fn vertex_attrib_divisor(&mut self, slot: u32, divisor: u32) {
        self.journal.record("vertex_attrib_divisor");
        self.vertex_array_mut().attribs.entry(slot).or_default().divisor = divisor;
    }

    fn draw_arrays(&mut self, primitive: Primitive, first: u32, count: u32, instances: u32) {
        self.journal.record("draw_arrays");
        self.check_vertex_range(first, count);
        self.journal.record_draw(DrawRecord {
            primitive,
            first,
            count,
            instances,
            index_type: None,
            program: self.bound.program,
            framebuffer: self.bound.draw_framebuffer,
        });
    }

    fn draw_elements(&mut self, primitive: Primitive, count: u32, index: IndexType, offset: usize, instances: u32) {
        self.journal.record("draw_elements");
        if !self.buffers.contains_key(&self.element_buffer()) {
            log::warn!("headless: indexed draw with no element buffer bound");
        }
        self.journal.record_draw(DrawRecord {
            primitive,
            first: (offset / index.size()) as u32,
            count,
            instances,
            index_type: Some(index),
            program: self.bound.program,
            framebuffer: self.bound.draw_framebuffer,
        });
    }

    // ── textures ──────────────────────────────────────────────────────────

    fn create_texture(&mut self) -> Handle {
        self.journal.record("create_texture");
        let h = self.alloc();
        self.textures.insert(h, TextureObj::default());
        h
    }

    fn delete_texture(&mut self, texture: Handle) {
        self.journal.record("delete_texture");
        self.textures.remove(&texture);
        for unit in &mut self.bound.texture_units {
            if *unit == texture {
                *unit = Handle::INVALID;
            }
        }
    }

    fn bind_texture(&mut self, texture: Handle) {
        self.journal.record("bind_texture");
        let unit = self.bound.active_unit as usize;
        if let Some(slot) = self.bound.texture_units.get_mut(unit) {
            *slot = texture;
        }
    }

    fn tex_image_2d(&mut self, level: u32, format: TextureFormat, width: u32, height: u32, pixels: Option<&[u8]>) {
        self.journal.record("tex_image_2d");
        let h = self.bound_texture();
        let Some(tex) = self.textures.get_mut(&h) else {
            log::warn!("headless: tex_image_2d with no texture bound");
            return;
        };
        tex.levels = tex.levels.max(level + 1);
        if level != 0 {
            return;
        }
        let len = width as usize * height as usize * format.bytes_per_pixel();
        let mut storage = vec![0u8; len];
        if let Some(src) = pixels {
            if src.len() != len {
                log::warn!("headless: tex_image_2d expected {} bytes, got {}", len, src.len());
            }
            let n = src.len().min(len);
            storage[..n].copy_from_slice(&src[..n]);
        }
        tex.width = width;
        tex.height = height;
        tex.format = Some(format);
        tex.pixels = storage;
    }

    fn tex_sampling(&mut self, min: TextureFilter, mag: TextureFilter, wrap: TextureWrap) {
        self.journal.record("tex_sampling");
        let h = self.bound_texture();
        if self.textures.contains_key(&h) {
            log::trace!("headless: {} sampling min={:?} mag={:?} wrap={:?}", h, min, mag, wrap);
        } else {
            log::warn!("headless: tex_sampling with no texture bound");
        }
    }

    fn generate_mipmap(&mut self) {
        self.journal.record("generate_mipmap");
        let h = self.bound_texture();
        if let Some(tex) = self.textures.get_mut(&h) {
            let largest = tex.width.max(tex.height).max(1);
            tex.levels = 32 - largest.leading_zeros();
        }
    }

    fn create_renderbuffer(&mut self) -> Handle {
        self.journal.record("create_renderbuffer");
        let h = self.alloc();
        self.renderbuffers.insert(h, RenderbufferObj::default());
        h
    }

    fn delete_renderbuffer(&mut self, renderbuffer: Handle) {
        self.journal.record("delete_renderbuffer");
        self.renderbuffers.remove(&renderbuffer);
        if self.bound.renderbuffer == renderbuffer {
            self.bound.renderbuffer = Handle::INVALID;
        }
    }

    fn bind_renderbuffer(&mut self, renderbuffer: Handle) {
        self.journal.record("bind_renderbuffer");
        self.bound.renderbuffer = renderbuffer;
    }

    fn renderbuffer_storage(&mut self, format: TextureFormat, width: u32, height: u32) {
        self.journal.record("renderbuffer_storage");
        let h = self.bound.renderbuffer;
        match self.renderbuffers.get_mut(&h) {
            Some(rb) => {
                rb.width = width;
                rb.height = height;
                rb.format = Some(format);
            }
            None => log::warn!("headless: renderbuffer_storage with no renderbuffer bound"),
        }
    }

    // ── framebuffers ──────────────────────────────────────────────────────

    fn create_framebuffer(&mut self) -> Handle {
        self.journal.record("create_framebuffer");
        let h = self.alloc();
        self.framebuffers.insert(h, FramebufferObj::default());
        h
    }

    fn delete_framebuffer(&mut self, framebuffer: Handle) {
        self.journal.record("delete_framebuffer");
        self.framebuffers.remove(&framebuffer);
        if self.bound.draw_framebuffer == framebuffer {
            self.bound.draw_framebuffer = Handle::INVALID;
        }
        if self.bound.read_framebuffer == framebuffer {
            self.bound.read_framebuffer = Handle::INVALID;
        }
    }

    fn bind_framebuffer(&mut self, target: FramebufferTarget, framebuffer: Handle) {
        self.journal.record("bind_framebuffer");
        match target {
            FramebufferTarget::Draw => self.bound.draw_framebuffer = framebuffer,
            FramebufferTarget::Read => self.bound.read_framebuffer = framebuffer,
            FramebufferTarget::Both => {
                self.bound.draw_framebuffer = framebuffer;
                self.bound.read_framebuffer = framebuffer;
            }
        }
    }

    fn framebuffer_texture(&mut self, target: FramebufferTarget, point: AttachmentPoint, texture: Handle, level: u32) {
        self.journal.record("framebuffer_texture");
        if level != 0 {
            log::debug!("headless: attaching mip level {} of {}", level, texture);
        }
        let image = texture.is_valid().then_some(Image::Texture(texture));
        self.attach(target, point, image);
    }

    fn framebuffer_renderbuffer(&mut self, target: FramebufferTarget, point: AttachmentPoint, renderbuffer: Handle) {
        self.journal.record("framebuffer_renderbuffer");
        let image = renderbuffer.is_valid().then_some(Image::Renderbuffer(renderbuffer));
        self.attach(target, point, image);
    }

    fn check_framebuffer_status(&mut self, target: FramebufferTarget) -> u32 {
        self.journal.record("check_framebuffer_status");
        self.framebuffer_status(self.framebuffer_for(target))
    }

    fn draw_buffers(&mut self, points: &[AttachmentPoint]) {
        self.journal.record("draw_buffers");
        let fbo = self.bound.draw_framebuffer;
        if let Some(obj) = self.framebuffers.get_mut(&fbo) {
            obj.draw_buffers = points.to_vec();
        }
    }

    fn read_buffer(&mut self, point: AttachmentPoint) {
        self.journal.record("read_buffer");
        let fbo = self.bound.read_framebuffer;
        if let Some(obj) = self.framebuffers.get_mut(&fbo) {
            obj.read_buffer = point;
        }
    }

    fn blit_framebuffer(&mut self, src: [i32; 4], dst: [i32; 4], mask: ClearMask, filter: TextureFilter) {
        self.journal.record("blit_framebuffer");
        log::trace!("headless: blit {:?} -> {:?} ({:?}, {:?})", src, dst, mask, filter);

        let (Some(read), Some(draw)) = (
            self.framebuffers.get(&self.bound.read_framebuffer),
            self.framebuffers.get(&self.bound.draw_framebuffer),
        ) else {
            return;
        };
        let depth_of = |fbo: &FramebufferObj| {
            fbo.attachments
                .get(&AttachmentPoint::Depth)
                .or_else(|| fbo.attachments.get(&AttachmentPoint::DepthStencil))
                .copied()
        };

        let mut copies = Vec::new();
        if mask.contains(ClearMask::COLOR) {
            if let Some(from) = read.attachments.get(&read.read_buffer).copied() {
                copies.extend(draw.draw_buffers.iter().filter_map(|p| draw.attachments.get(p)).map(|to| (from, *to)));
            }
        }
        if mask.contains(ClearMask::DEPTH) {
            if let (Some(from), Some(to)) = (depth_of(read), depth_of(draw)) {
                copies.push((from, to));
            }
        }
        for (from, to) in copies {
            self.blit_image(from, to, src, dst);
        }
    }

    fn read_pixels(
        &mut self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        layout: PixelLayout,
        component: ComponentType,
        out: &mut [u8],
    ) {
        self.journal.record("read_pixels");
        out.fill(0);

        let fbo = self.bound.read_framebuffer;
        let Some(obj) = self.framebuffers.get(&fbo) else { return };
        let image = match layout {
            PixelLayout::Depth | PixelLayout::DepthStencil => obj
                .attachments
                .get(&AttachmentPoint::Depth)
                .or_else(|| obj.attachments.get(&AttachmentPoint::DepthStencil)),
            _ => obj.attachments.get(&obj.read_buffer),
        };
        let Some(Image::Texture(h)) = image.copied() else { return };
        let Some(tex) = self.textures.get(&h) else { return };
        let Some(format) = tex.format else { return };

        let src_channels = format.channel_count();
        let dst_channels = layout.channel_count();
        let src_bpp = format.bytes_per_pixel();
        let dst_size = component.size();

        for row in 0..height {
            for col in 0..width {
                let (Some(sx), Some(sy)) = (x.checked_add(col), y.checked_add(row)) else { continue };
                if sx >= tex.width || sy >= tex.height {
                    continue;
                }
                let src_px = (sy as usize * tex.width as usize + sx as usize) * src_bpp;
                let dst_px = (row as usize * width as usize + col as usize) * dst_channels * dst_size;
                for c in 0..dst_channels {
                    let value = if c < src_channels {
                        read_channel(&tex.pixels, format.component, src_px + c * format.component.size())
                    } else if c == 3 {
                        1.0
                    } else {
                        0.0
                    };
                    write_channel(out, component, dst_px + c * dst_size, value);
                }
            }
        }
    }

    // ── shaders and programs ──────────────────────────────────────────────

    fn create_shader(&mut self, stage: ShaderStage) -> Handle {
        self.journal.record("create_shader");
        let h = self.alloc();
        self.shaders.insert(h, ShaderObj { stage, source: String::new(), module: None, log: String::new() });
        h
    }

    fn delete_shader(&mut self, shader: Handle) {
        self.journal.record("delete_shader");
        self.shaders.remove(&shader);
    }

    fn shader_source(&mut self, shader: Handle, source: &str) {
        self.journal.record("shader_source");
        if let Some(obj) = self.shaders.get_mut(&shader) {
            obj.source = source.to_string();
        }
    }

    fn compile_shader(&mut self, shader: Handle) {
        self.journal.record("compile_shader");
        let Some(obj) = self.shaders.get_mut(&shader) else { return };
        match glsl::compile(&obj.source) {
            Ok(module) => {
                obj.module = Some(module);
                obj.log.clear();
            }
            Err(log) => {
                log::trace!("headless: {} shader failed to compile", obj.stage);
                obj.module = None;
                obj.log = log;
            }
        }
    }

    fn shader_compile_status(&self, shader: Handle) -> bool {
        self.shaders.get(&shader).is_some_and(|s| s.module.is_some())
    }

    fn shader_info_log(&self, shader: Handle) -> String {
        self.shaders.get(&shader).map(|s| s.log.clone()).unwrap_or_default()
    }

    fn create_program(&mut self) -> Handle {
        self.journal.record("create_program");
        let h = self.alloc();
        self.programs.insert(h, ProgramObj::default());
        h
    }

    fn delete_program(&mut self, program: Handle) {
        self.journal.record("delete_program");
        self.programs.remove(&program);
        if self.bound.program == program {
            self.bound.program = Handle::INVALID;
        }
    }

    fn attach_shader(&mut self, program: Handle, shader: Handle) {
        self.journal.record("attach_shader");
        if let Some(p) = self.programs.get_mut(&program) {
            if !p.attached.contains(&shader) {
                p.attached.push(shader);
            }
        }
    }

    fn detach_shader(&mut self, program: Handle, shader: Handle) {
        self.journal.record("detach_shader");
        if let Some(p) = self.programs.get_mut(&program) {
            p.attached.retain(|s| *s != shader);
        }
    }

    fn link_program(&mut self, program: Handle) {
        self.journal.record("link_program");
        let Some(p) = self.programs.get(&program) else { return };

        let mut modules = Vec::with_capacity(p.attached.len());
        let mut failure = None;
        for h in &p.attached {
            match self.shaders.get(h) {
                Some(ShaderObj { stage, module: Some(m), .. }) => modules.push((*stage, m)),
                Some(ShaderObj { stage, .. }) => {
                    failure = Some(format!("error: attached {} shader is not compiled", stage));
                    break;
                }
                None => {
                    failure = Some(format!("error: attached shader {} does not exist", h));
                    break;
                }
            }
        }
        let result = match failure {
            Some(log) => Err(log),
            None => link::link(&modules),
        };

        let Some(p) = self.programs.get_mut(&program) else { return };
        match result {
            Ok(linked) => {
                p.linked = Some(linked);
                p.log.clear();
            }
            Err(log) => {
                p.linked = None;
                p.log = log;
            }
        }
    }

    fn program_link_status(&self, program: Handle) -> bool {
        self.linked(program).is_some()
    }

    fn program_info_log(&self, program: Handle) -> String {
        self.programs.get(&program).map(|p| p.log.clone()).unwrap_or_default()
    }

    fn use_program(&mut self, program: Handle) {
        self.journal.record("use_program");
        self.bound.program = program;
    }

    // ── reflection ────────────────────────────────────────────────────────

    fn active_uniform_count(&self, program: Handle) -> u32 {
        self.linked(program).map_or(0, |p| p.uniforms.len() as u32)
    }

    fn active_uniform(&self, program: Handle, index: u32) -> Option<ActiveUniform> {
        let u = self.linked(program)?.uniforms.get(index as usize)?;
        Some(ActiveUniform { name: u.name.clone(), gl_type: u.gl_type, size: u.size, block_index: u.block_index })
    }

    fn uniform_location(&self, program: Handle, name: &str) -> Option<i32> {
        self.linked(program)?.location(name)
    }

    fn active_uniform_block_count(&self, program: Handle) -> u32 {
        self.linked(program).map_or(0, |p| p.blocks.len() as u32)
    }

    fn active_uniform_block_name(&self, program: Handle, index: u32) -> Option<String> {
        self.linked(program)?.blocks.get(index as usize).map(|b| b.name.clone())
    }

    fn uniform_block_binding(&mut self, program: Handle, index: u32, binding: u32) {
        self.journal.record("uniform_block_binding");
        let block = self
            .programs
            .get_mut(&program)
            .and_then(|p| p.linked.as_mut())
            .and_then(|l| l.blocks.get_mut(index as usize));
        match block {
            Some(block) => block.binding = binding,
            None => log::warn!("headless: no uniform block {} in {}", index, program),
        }
    }

    fn active_subroutine_uniform_count(&self, program: Handle, stage: ShaderStage) -> u32 {
        self.linked(program)
            .and_then(|p| p.stages.get(&stage))
            .map_or(0, |s| s.uniforms.len() as u32)
    }

    fn active_subroutine_uniform_name(&self, program: Handle, stage: ShaderStage, index: u32) -> Option<String> {
        let s = self.linked(program)?.stages.get(&stage)?;
        s.uniforms.get(index as usize).map(|(name, _)| name.clone())
    }

    fn subroutine_uniform_location(&self, program: Handle, stage: ShaderStage, name: &str) -> Option<u32> {
        let s = self.linked(program)?.stages.get(&stage)?;
        s.uniforms.iter().position(|(n, _)| n == name).map(|i| i as u32)
    }

    fn compatible_subroutines(&self, program: Handle, stage: ShaderStage, index: u32) -> Vec<u32> {
        let Some(s) = self.linked(program).and_then(|p| p.stages.get(&stage)) else {
            return Vec::new();
        };
        let Some((_, ty)) = s.uniforms.get(index as usize) else {
            return Vec::new();
        };
        s.functions
            .iter()
            .enumerate()
            .filter(|(_, (_, types))| types.contains(ty))
            .map(|(i, _)| i as u32)
            .collect()
    }

    fn active_subroutine_count(&self, program: Handle, stage: ShaderStage) -> u32 {
        self.linked(program)
            .and_then(|p| p.stages.get(&stage))
            .map_or(0, |s| s.functions.len() as u32)
    }

    fn active_subroutine_name(&self, program: Handle, stage: ShaderStage, index: u32) -> Option<String> {
        let s = self.linked(program)?.stages.get(&stage)?;
        s.functions.get(index as usize).map(|(name, _)| name.clone())
    }

    fn uniform_subroutines(&mut self, stage: ShaderStage, indices: &[u32]) {
        self.journal.record("uniform_subroutines");
        let program = self.bound.program;
        let stage_state = self
            .programs
            .get_mut(&program)
            .and_then(|p| p.linked.as_mut())
            .and_then(|l| l.stages.get_mut(&stage));
        match stage_state {
            Some(s) if s.uniforms.len() == indices.len() => s.selection = indices.to_vec(),
            Some(s) => log::warn!(
                "headless: {} subroutine indices given, {} stage expects {}",
                indices.len(),
                stage,
                s.uniforms.len()
            ),
            None => log::warn!("headless: {} stage of {} has no subroutine uniforms", stage, program),
        }
    }

    // ── uniform uploads ───────────────────────────────────────────────────

    fn uniform_f32(&mut self, target: UniformTarget, location: i32, components: u32, data: &[f32]) {
        self.upload("uniform_f32", target, location, components, false, UniformData::F32(data.to_vec()));
    }

    fn uniform_f64(&mut self, target: UniformTarget, location: i32, components: u32, data: &[f64]) {
        self.upload("uniform_f64", target, location, components, false, UniformData::F64(data.to_vec()));
    }

    fn uniform_i32(&mut self, target: UniformTarget, location: i32, components: u32, data: &[i32]) {
        self.upload("uniform_i32", target, location, components, false, UniformData::I32(data.to_vec()));
    }

    fn uniform_u32(&mut self, target: UniformTarget, location: i32, components: u32, data: &[u32]) {
        self.upload("uniform_u32", target, location, components, false, UniformData::U32(data.to_vec()));
    }

    fn uniform_matrix_f32(&mut self, target: UniformTarget, location: i32, dim: u32, transpose: bool, data: &[f32]) {
        self.upload("uniform_matrix_f32", target, location, dim, transpose, UniformData::F32(data.to_vec()));
    }

    fn uniform_matrix_f64(&mut self, target: UniformTarget, location: i32, dim: u32, transpose: bool, data: &[f64]) {
        self.upload("uniform_matrix_f64", target, location, dim, transpose, UniformData::F64(data.to_vec()));
    }
}
