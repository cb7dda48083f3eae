//! Configuration errors.
//!
//! These are the misuses a GL driver would silently turn into undefined
//! behavior (attaching to a loaded framebuffer, a second depth attachment,
//! overrunning a buffer). They are reported as values instead.
//!
//! Shader compile/link failures are deliberately *not* here: they are expected
//! at runtime and are recorded in the [`ShaderRegistry`](crate::ShaderRegistry).

use thiserror::Error;

use crate::shader::ShaderStage;
use crate::texture::TextureFormat;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BufferError {
    #[error("update of {len} bytes at offset {offset} exceeds the {capacity}-byte allocation")]
    UpdateOutOfRange { offset: usize, len: usize, capacity: usize },

    #[error("attribute slot {slot} exceeds the {max} vertex attribute slots")]
    SlotOutOfRange { slot: u32, max: u32 },

    #[error("attribute slot {slot} declares {components} components, 1..=4 allowed")]
    InvalidComponents { slot: u32, components: u32 },

    #[error("no vertex buffer at index {0}")]
    NoSuchBuffer(usize),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TextureError {
    #[error("{0}-channel pixel data has no matching texture format")]
    UnsupportedChannels(usize),

    #[error("pixel data holds {got} bytes, {expected} expected for the given size")]
    SizeMismatch { expected: usize, got: usize },

    #[error("texture has no storage yet")]
    Unallocated,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FramebufferError {
    #[error("framebuffer `{0}` is loaded; attachments can only change while unloaded")]
    AlreadyLoaded(String),

    #[error("framebuffer `{0}` is not loaded")]
    NotLoaded(String),

    #[error("framebuffer `{0}` already has a depth attachment")]
    DuplicateDepth(String),

    #[error("framebuffer `{name}` would exceed the backend maximum of {max} color attachments")]
    TooManyColorAttachments { name: String, max: u32 },

    #[error("attachment `{name}`: {format:?} cannot back a {role} attachment")]
    FormatRole { name: String, format: TextureFormat, role: &'static str },

    #[error("framebuffer `{0}` has zero width or height")]
    ZeroSize(String),

    #[error("framebuffer `{0}` must be the bound draw framebuffer")]
    NotBound(String),

    #[error("framebuffer `{name}` has no color attachment {index}")]
    NoSuchAttachment { name: String, index: usize },

    #[error("framebuffer `{0}` has no depth attachment")]
    NoDepthAttachment(String),

    #[error("attachment `{0}` is renderbuffer-backed and cannot be sampled or mipmapped")]
    NotTextureBacked(String),

    #[error("blit between mismatched depth formats {src:?} and {dst:?}")]
    BlitFormatMismatch { src: TextureFormat, dst: TextureFormat },

    #[error("blit between mismatched sizes {src:?} and {dst:?}")]
    BlitSizeMismatch { src: (u32, u32), dst: (u32, u32) },

    #[error(transparent)]
    Texture(#[from] TextureError),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProgramError {
    #[error("program `{name}` cannot reference more than {max} shaders")]
    TooManyShaders { name: String, max: usize },

    #[error("program `{0}` references a shader that is not registered")]
    UnknownShader(String),

    #[error("program `{0}` is linked; detach before attaching other shaders")]
    AlreadyLinked(String),

    #[error("program is not linked")]
    NotLinked,

    #[error("no such program")]
    UnknownProgram,

    #[error("no subroutine uniform `{uniform}` in the {stage} stage")]
    UnknownSubroutineUniform { stage: ShaderStage, uniform: String },

    #[error("subroutine `{function}` is not compatible with `{uniform}` in the {stage} stage")]
    IncompatibleSubroutine { stage: ShaderStage, uniform: String, function: String },
}

/// A uniform block whose binding point cannot be derived from its name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReflectionError {
    #[error("uniform block `{0}` has no `_<binding>` suffix; it is left unbound")]
    MissingBindingSuffix(String),

    #[error("uniform block `{block}` reuses binding point {binding} of `{other}`; it is left unbound")]
    DuplicateBinding { block: String, other: String, binding: u32 },
}

/// Failure to produce shader source text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("shader source `{0}` not found")]
    NotFound(String),

    #[error("reading shader source `{path}`: {message}")]
    Io { path: String, message: String },

    #[error("`#include` cycle: {chain}")]
    IncludeCycle { chain: String },

    #[error("{path}:{line}: malformed `#include` directive")]
    MalformedInclude { path: String, line: usize },
}
