//! The seam between this layer and the graphics API.
//!
//! [`Backend`] has one method per primitive call the layer needs from a
//! GL-style, handle-based context. Nothing above this trait talks to the
//! driver directly, which is what lets the [`StateCache`](crate::StateCache)
//! elide redundant calls and lets [`HeadlessBackend`] stand in for a real
//! context in tests and tooling.
//!
//! Conventions:
//! - binding [`Handle::INVALID`] unbinds the target;
//! - query methods take `&self` and never change state;
//! - completeness status and uniform type tags are raw GL codes (see [`gl`]).

pub mod gl;
mod headless;
mod journal;

pub use headless::HeadlessBackend;
pub use journal::{DrawRecord, Journal, UniformData, UniformWrite};

use bitflags::bitflags;

use crate::handle::Handle;
use crate::shader::ShaderStage;
use crate::state::{BlendState, CullMode, DepthState, ViewportRect};
use crate::texture::{ComponentType, PixelLayout, TextureFormat};

// ── enums ─────────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BufferTarget {
    Array,
    ElementArray,
    Uniform,
}

/// Upload usage hint.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum BufferUsage {
    #[default]
    StaticDraw,
    DynamicDraw,
    StreamDraw,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Primitive {
    Points,
    Lines,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum IndexType {
    U8,
    U16,
    U32,
}

impl IndexType {
    #[inline]
    pub const fn size(self) -> usize {
        match self {
            IndexType::U8 => 1,
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum FramebufferTarget {
    Draw,
    Read,
    /// Both draw and read.
    Both,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum AttachmentPoint {
    Color(u32),
    Depth,
    DepthStencil,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum TextureFilter {
    Nearest,
    #[default]
    Linear,
    /// Trilinear; only meaningful as a minification filter.
    LinearMipmapLinear,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum TextureWrap {
    #[default]
    Repeat,
    ClampToEdge,
    MirroredRepeat,
}

bitflags! {
    /// Buffers affected by a clear or blit.
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
    pub struct ClearMask: u8 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

/// Where a uniform upload lands.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UniformTarget {
    /// The currently bound program (`glUniform*`).
    Bound,
    /// An explicit program, regardless of binding (`glProgramUniform*`).
    Program(Handle),
}

/// One entry of a program's active-uniform list.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ActiveUniform {
    /// Name as reported by the driver; arrays carry a `[0]` suffix.
    pub name: String,
    /// Raw GL type code.
    pub gl_type: u32,
    /// Array length (1 for non-arrays).
    pub size: u32,
    /// Owning uniform block, if the uniform is a block member.
    pub block_index: Option<u32>,
}

/// Backend-reported implementation limits.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Limits {
    pub max_color_attachments: u32,
    pub max_texture_slots: u32,
    pub max_vertex_attribs: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self { max_color_attachments: 8, max_texture_slots: 32, max_vertex_attribs: 16 }
    }
}

// ── Backend ───────────────────────────────────────────────────────────────

/// Primitive calls into a GL-style graphics context.
///
/// Implementations are single-threaded and must be driven from the thread
/// owning the context.
pub trait Backend {
    fn limits(&self) -> Limits;

    // fixed-function state
    fn set_cull_mode(&mut self, mode: CullMode);
    fn set_blend(&mut self, blend: BlendState);
    fn set_depth(&mut self, depth: DepthState);
    fn set_wireframe(&mut self, enabled: bool);
    fn set_viewport(&mut self, viewport: ViewportRect);
    fn active_texture(&mut self, slot: u32);
    fn clear(&mut self, color: [f32; 4], depth: f32, mask: ClearMask);

    // buffers and vertex arrays
    fn create_buffer(&mut self) -> Handle;
    fn delete_buffer(&mut self, buffer: Handle);
    fn bind_buffer(&mut self, target: BufferTarget, buffer: Handle);
    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage);
    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]);
    fn create_vertex_array(&mut self) -> Handle;
    fn delete_vertex_array(&mut self, vao: Handle);
    fn bind_vertex_array(&mut self, vao: Handle);
    fn enable_vertex_attrib(&mut self, slot: u32);
    fn vertex_attrib_pointer(
        &mut self,
        slot: u32,
        components: u32,
        component: ComponentType,
        stride: usize,
        offset: usize,
    );
    fn vertex_attrib_divisor(&mut self, slot: u32, divisor: u32);
    fn draw_arrays(&mut self, primitive: Primitive, first: u32, count: u32, instances: u32);
    fn draw_elements(
        &mut self,
        primitive: Primitive,
        count: u32,
        index: IndexType,
        offset: usize,
        instances: u32,
    );

    // textures and renderbuffers (2D target)
    fn create_texture(&mut self) -> Handle;
    fn delete_texture(&mut self, texture: Handle);
    fn bind_texture(&mut self, texture: Handle);
    fn tex_image_2d(
        &mut self,
        level: u32,
        format: TextureFormat,
        width: u32,
        height: u32,
        pixels: Option<&[u8]>,
    );
    fn tex_sampling(&mut self, min: TextureFilter, mag: TextureFilter, wrap: TextureWrap);
    fn generate_mipmap(&mut self);
    fn create_renderbuffer(&mut self) -> Handle;
    fn delete_renderbuffer(&mut self, renderbuffer: Handle);
    fn bind_renderbuffer(&mut self, renderbuffer: Handle);
    fn renderbuffer_storage(&mut self, format: TextureFormat, width: u32, height: u32);

    // framebuffers
    fn create_framebuffer(&mut self) -> Handle;
    fn delete_framebuffer(&mut self, framebuffer: Handle);
    fn bind_framebuffer(&mut self, target: FramebufferTarget, framebuffer: Handle);
    fn framebuffer_texture(
        &mut self,
        target: FramebufferTarget,
        point: AttachmentPoint,
        texture: Handle,
        level: u32,
    );
    fn framebuffer_renderbuffer(
        &mut self,
        target: FramebufferTarget,
        point: AttachmentPoint,
        renderbuffer: Handle,
    );
    /// Raw GL completeness code for the framebuffer bound to `target`.
    fn check_framebuffer_status(&mut self, target: FramebufferTarget) -> u32;
    fn draw_buffers(&mut self, points: &[AttachmentPoint]);
    fn read_buffer(&mut self, point: AttachmentPoint);
    fn blit_framebuffer(&mut self, src: [i32; 4], dst: [i32; 4], mask: ClearMask, filter: TextureFilter);
    #[allow(clippy::too_many_arguments)]
    fn read_pixels(
        &mut self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        layout: PixelLayout,
        component: ComponentType,
        out: &mut [u8],
    );

    // shaders and programs
    fn create_shader(&mut self, stage: ShaderStage) -> Handle;
    fn delete_shader(&mut self, shader: Handle);
    fn shader_source(&mut self, shader: Handle, source: &str);
    fn compile_shader(&mut self, shader: Handle);
    fn shader_compile_status(&self, shader: Handle) -> bool;
    fn shader_info_log(&self, shader: Handle) -> String;
    fn create_program(&mut self) -> Handle;
    fn delete_program(&mut self, program: Handle);
    fn attach_shader(&mut self, program: Handle, shader: Handle);
    fn detach_shader(&mut self, program: Handle, shader: Handle);
    fn link_program(&mut self, program: Handle);
    fn program_link_status(&self, program: Handle) -> bool;
    fn program_info_log(&self, program: Handle) -> String;
    fn use_program(&mut self, program: Handle);

    // reflection
    fn active_uniform_count(&self, program: Handle) -> u32;
    fn active_uniform(&self, program: Handle, index: u32) -> Option<ActiveUniform>;
    fn uniform_location(&self, program: Handle, name: &str) -> Option<i32>;
    fn active_uniform_block_count(&self, program: Handle) -> u32;
    fn active_uniform_block_name(&self, program: Handle, index: u32) -> Option<String>;
    fn uniform_block_binding(&mut self, program: Handle, index: u32, binding: u32);
    fn active_subroutine_uniform_count(&self, program: Handle, stage: ShaderStage) -> u32;
    fn active_subroutine_uniform_name(&self, program: Handle, stage: ShaderStage, index: u32) -> Option<String>;
    fn subroutine_uniform_location(&self, program: Handle, stage: ShaderStage, name: &str) -> Option<u32>;
    /// Subroutine function indices compatible with subroutine uniform `index`.
    fn compatible_subroutines(&self, program: Handle, stage: ShaderStage, index: u32) -> Vec<u32>;
    fn active_subroutine_count(&self, program: Handle, stage: ShaderStage) -> u32;
    fn active_subroutine_name(&self, program: Handle, stage: ShaderStage, index: u32) -> Option<String>;
    /// Commits one function index per subroutine uniform location of `stage`
    /// for the bound program.
    fn uniform_subroutines(&mut self, stage: ShaderStage, indices: &[u32]);

    // uniform uploads
    fn uniform_f32(&mut self, target: UniformTarget, location: i32, components: u32, data: &[f32]);
    fn uniform_f64(&mut self, target: UniformTarget, location: i32, components: u32, data: &[f64]);
    fn uniform_i32(&mut self, target: UniformTarget, location: i32, components: u32, data: &[i32]);
    fn uniform_u32(&mut self, target: UniformTarget, location: i32, components: u32, data: &[u32]);
    fn uniform_matrix_f32(&mut self, target: UniformTarget, location: i32, dim: u32, transpose: bool, data: &[f32]);
    fn uniform_matrix_f64(&mut self, target: UniformTarget, location: i32, dim: u32, transpose: bool, data: &[f64]);
}
