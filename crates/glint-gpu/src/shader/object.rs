use std::fmt;

use super::source::{ShaderSourceProvider, expand_includes, number_lines};
use super::stage::ShaderStage;
use crate::context::GpuContext;
use crate::handle::Handle;

/// Where a [`Shader`] is in its load/compile cycle.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderState {
    Unloaded,
    /// Source is present but has not been compiled.
    Loaded,
    Compiled,
    /// Terminal until [`Shader::reload`].
    Failed,
}

/// A compile failure, kept for batch reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderError {
    pub name: String,
    pub path: String,
    pub stage: ShaderStage,
    /// Backend info log, or the reason the source could not be read.
    pub log: String,
    /// Source with 1-based line numbers; empty when it could not be read.
    pub numbered_source: String,
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} shader `{}` ({}): {}", self.stage, self.name, self.path, self.log.trim_end())
    }
}

impl std::error::Error for ShaderError {}

/// One compiled pipeline stage.
#[derive(Debug)]
pub struct Shader {
    ctx: GpuContext,
    handle: Handle,
    name: String,
    stage: ShaderStage,
    path: String,
    numbered: String,
    state: ShaderState,
    log: String,
}

impl Shader {
    pub fn new(ctx: &GpuContext, name: impl Into<String>, stage: ShaderStage, path: impl Into<String>) -> Self {
        let handle = ctx.backend(|b| b.create_shader(stage));
        let name = name.into();
        log::debug!("{} shader `{}` created as {}", stage, name, handle);
        Self {
            ctx: ctx.clone(),
            handle,
            name,
            stage,
            path: path.into(),
            numbered: String::new(),
            state: ShaderState::Unloaded,
            log: String::new(),
        }
    }

    #[inline]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline]
    pub fn state(&self) -> ShaderState {
        self.state
    }

    #[inline]
    pub fn is_compiled(&self) -> bool {
        self.state == ShaderState::Compiled
    }

    /// Line-numbered copy of the last compiled source.
    #[inline]
    pub fn numbered_source(&self) -> &str {
        &self.numbered
    }

    /// Info log of the last failure; empty otherwise.
    #[inline]
    pub fn log(&self) -> &str {
        &self.log
    }

    /// The failure record, if the shader is in the failed state.
    pub fn error(&self) -> Option<ShaderError> {
        (self.state == ShaderState::Failed).then(|| ShaderError {
            name: self.name.clone(),
            path: self.path.clone(),
            stage: self.stage,
            log: self.log.clone(),
            numbered_source: self.numbered.clone(),
        })
    }

    /// Reads the source at [`path`](Self::path), expands includes, compiles.
    ///
    /// A read failure leaves the shader failed with the reason as its log.
    /// Does nothing once compiled or failed; use [`reload`](Self::reload).
    pub fn load(&mut self, sources: &dyn ShaderSourceProvider) -> bool {
        match self.state {
            ShaderState::Compiled => return true,
            ShaderState::Failed => return false,
            ShaderState::Unloaded | ShaderState::Loaded => {}
        }
        match expand_includes(sources, &self.path) {
            Ok(text) => {
                self.state = ShaderState::Loaded;
                self.compile(&text)
            }
            Err(e) => {
                log::error!("{} shader `{}`: {}", self.stage, self.name, e);
                self.numbered.clear();
                self.log = e.to_string();
                self.state = ShaderState::Failed;
                false
            }
        }
    }

    /// Compiles `source` (includes already expanded).
    pub fn compile(&mut self, source: &str) -> bool {
        self.numbered = number_lines(source);
        let h = self.handle;
        let (ok, info) = self.ctx.backend(|b| {
            b.shader_source(h, source);
            b.compile_shader(h);
            let ok = b.shader_compile_status(h);
            (ok, if ok { String::new() } else { b.shader_info_log(h) })
        });

        if ok {
            log::debug!("{} shader `{}` compiled", self.stage, self.name);
            self.log.clear();
            self.state = ShaderState::Compiled;
        } else {
            log::error!("{} shader `{}` ({}) failed to compile:\n{}", self.stage, self.name, self.path, info);
            self.log = info;
            self.state = ShaderState::Failed;
        }
        ok
    }

    /// Restarts the cycle from disk. The backend handle is kept, so programs
    /// that attached it pick up the new code on their next link.
    pub fn reload(&mut self, sources: &dyn ShaderSourceProvider) -> bool {
        self.state = ShaderState::Unloaded;
        self.log.clear();
        self.load(sources)
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        let h = self.handle;
        self.ctx.backend(|b| b.delete_shader(h));
        log::debug!("shader `{}` deleted", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;
    use crate::context::ContextConfig;
    use crate::shader::MemorySources;

    const VERT: &str = "#version 450\nvoid main() { gl_Position = vec4(0.0); }\n";

    fn ctx() -> GpuContext {
        GpuContext::new(HeadlessBackend::new(), ContextConfig::default())
    }

    #[test]
    fn load_compiles_and_numbers_source() {
        let ctx = ctx();
        let src = MemorySources::new().with("quad.vert", VERT);
        let mut s = Shader::new(&ctx, "quad", ShaderStage::Vertex, "quad.vert");
        assert_eq!(s.state(), ShaderState::Unloaded);
        assert!(s.load(&src));
        assert!(s.is_compiled());
        assert!(s.numbered_source().starts_with("   1: #version 450\n"));
        assert!(s.error().is_none());
    }

    #[test]
    fn failure_is_terminal_until_reload() {
        let ctx = ctx();
        let src = MemorySources::new().with("bad.frag", "void main() {");
        let mut s = Shader::new(&ctx, "bad", ShaderStage::Fragment, "bad.frag");
        assert!(!s.load(&src));
        let err = s.error().unwrap();
        assert_eq!(err.name, "bad");
        assert!(!err.log.is_empty());

        src.insert("bad.frag", "void main() {}");
        assert!(!s.load(&src));
        assert!(s.reload(&src));
        assert_eq!(s.state(), ShaderState::Compiled);
    }

    #[test]
    fn missing_file_fails_with_reason() {
        let ctx = ctx();
        let mut s = Shader::new(&ctx, "ghost", ShaderStage::Vertex, "ghost.vert");
        assert!(!s.load(&MemorySources::new()));
        assert!(s.log().contains("ghost.vert"));
        assert!(s.error().unwrap().numbered_source.is_empty());
    }
}
