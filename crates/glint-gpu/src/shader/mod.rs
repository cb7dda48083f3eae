//! Shader stages, linked programs and their reflected tables.
//!
//! A [`Shader`] compiles one stage; a [`ShaderProgram`] links a set of them
//! and reflects uniforms, uniform blocks and subroutines on success. The
//! [`ShaderRegistry`] owns both by id and keeps the session's error index.
//!
//! Uniform blocks are bound by name: a block declared as `Lights_3` is bound
//! to binding point 3. A block without such a suffix is reported through
//! [`ShaderProgram::config_errors`] and left unbound.

mod object;
mod program;
mod reflect;
mod registry;
mod source;
mod stage;
mod subroutine;

pub use object::{Shader, ShaderError, ShaderState};
pub use program::{AttachedSource, ProgramState, ShaderProgram};
pub use reflect::{UniformBlock, parse_binding_suffix};
pub use registry::{ProgramId, ShaderId, ShaderRegistry};
pub use source::{FsSources, MemorySources, ShaderSourceProvider, expand_includes, number_lines};
pub use stage::ShaderStage;
pub use subroutine::{StageSubroutines, SubroutineUniform};
