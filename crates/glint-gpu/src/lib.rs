//! Glint GPU crate.
//!
//! Named, owned handles over a stateful GL-style graphics context, with a
//! cache that keeps redundant state changes from reaching the driver.
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`backend`] | `Backend` trait (the driver seam), `HeadlessBackend`, `Journal` |
//! | [`context`] | `GpuContext`: backend + state cache, shared by every resource |
//! | [`state`] | `StateCache` and the fixed-function state values |
//! | [`buffer`] | `VertexBuffer` + stride hints, `ElementBuffer`, `VertexArray` |
//! | [`texture`] | `Texture2d`, `Renderbuffer`, formats |
//! | [`framebuffer`] | `Framebuffer`, `Attachment`, completeness status |
//! | [`shader`] | `Shader`, `ShaderProgram`, reflection, `ShaderRegistry` |
//! | [`uniform`] | `Uniform`, `UniformType`, `UniformValue` |
//! | [`assets`] | applying a `.glint` manifest |
//! | [`logging`] | `init_logging` |
//!
//! # Context and caching
//!
//! A [`GpuContext`] is created once per graphics context and cloned into every
//! resource. Every bind or state change goes through its [`StateCache`]; asking
//! for the state already in effect issues no backend call. Code that talks to
//! the driver behind the context's back must call [`GpuContext::resync`] or
//! [`GpuContext::invalidate`] afterwards, or the cache will skip calls that
//! were actually needed.
//!
//! Everything is single-threaded: the context is `!Send` and must stay on the
//! thread that owns the driver context.
//!
//! # Quick start
//!
//! ```rust
//! use glint_gpu::backend::HeadlessBackend;
//! use glint_gpu::{ContextConfig, GpuContext, StrideHint, VertexArray, VertexBuffer};
//!
//! let ctx = GpuContext::new(HeadlessBackend::new(), ContextConfig::default());
//!
//! let mut vbo = VertexBuffer::new(&ctx);
//! vbo.add_stride_hint(StrideHint::per_vertex(0, 3, 0)).unwrap();
//! vbo.set_vertices(&[0.0f32; 9], Default::default());
//! assert_eq!(vbo.count(), 3);
//!
//! let mut vao = VertexArray::new(&ctx);
//! vao.add_buffer(vbo);
//! vao.draw();
//! ```

pub mod assets;
pub mod backend;
pub mod buffer;
pub mod color;
pub mod context;
pub mod error;
pub mod framebuffer;
pub mod handle;
pub mod logging;
pub mod shader;
pub mod state;
pub mod texture;
pub mod uniform;

pub use buffer::{ElementBuffer, StrideHint, VertexArray, VertexBuffer, VertexLayout};
pub use color::Color;
pub use context::{ContextConfig, GpuContext};
pub use error::{BufferError, FramebufferError, ProgramError, ReflectionError, SourceError, TextureError};
pub use framebuffer::{Attachment, Framebuffer, FramebufferStatus};
pub use handle::Handle;
pub use shader::{ShaderProgram, ShaderRegistry, ShaderStage};
pub use state::StateCache;
pub use texture::{Texture2d, TextureFormat};
pub use uniform::{Uniform, UniformValue};
