use std::collections::BTreeMap;

use super::object::Shader;
use super::reflect::{self, Reflection, UniformBlock};
use super::stage::ShaderStage;
use super::subroutine::StageSubroutines;
use crate::backend::UniformTarget;
use crate::context::GpuContext;
use crate::error::{ProgramError, ReflectionError};
use crate::handle::Handle;
use crate::uniform::{Uniform, UniformValue};

/// Where a [`ShaderProgram`] is in its attach/link cycle.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ProgramState {
    Created,
    Attached,
    Linked,
    /// Terminal until shaders are re-attached.
    Failed,
}

/// Diagnostic snapshot of an attached shader.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AttachedSource {
    pub name: String,
    pub stage: ShaderStage,
    pub numbered_source: String,
}

#[derive(Debug, Clone, Copy)]
struct Attached {
    handle: Handle,
    stage: ShaderStage,
}

/// A linked set of shaders plus its reflected uniform, uniform-block and
/// subroutine tables.
///
/// The program only records the backend handles of the shaders it attaches;
/// the [`Shader`] values themselves belong to whoever created them (normally
/// the [`ShaderRegistry`](crate::ShaderRegistry)).
#[derive(Debug)]
pub struct ShaderProgram {
    ctx: GpuContext,
    handle: Handle,
    name: String,
    attached: Vec<Attached>,
    sources: Vec<AttachedSource>,
    state: ProgramState,
    log: String,
    reflection: Reflection,
}

impl ShaderProgram {
    /// Shaders a program may reference.
    pub const MAX_SHADERS: usize = 8;

    pub fn new(ctx: &GpuContext, name: impl Into<String>) -> Self {
        let handle = ctx.backend(|b| b.create_program());
        let name = name.into();
        log::debug!("program `{}` created as {}", name, handle);
        Self {
            ctx: ctx.clone(),
            handle,
            name,
            attached: Vec::new(),
            sources: Vec::new(),
            state: ProgramState::Created,
            log: String::new(),
            reflection: Reflection::default(),
        }
    }

    // ── accessors ─────────────────────────────────────────────────────────

    #[inline]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn state(&self) -> ProgramState {
        self.state
    }

    #[inline]
    pub fn is_linked(&self) -> bool {
        self.state == ProgramState::Linked
    }

    /// Link log of the last failure; empty otherwise.
    #[inline]
    pub fn log(&self) -> &str {
        &self.log
    }

    pub fn shader_count(&self) -> usize {
        self.attached.len()
    }

    /// Line-numbered sources of the attached shaders, as of attach time.
    pub fn numbered_sources(&self) -> &[AttachedSource] {
        &self.sources
    }

    // ── attach / link ─────────────────────────────────────────────────────

    /// Attaches `shaders`. Allowed until the program is linked.
    pub fn attach(&mut self, shaders: &[&Shader]) -> Result<(), ProgramError> {
        if self.state == ProgramState::Linked {
            return Err(ProgramError::AlreadyLinked(self.name.clone()));
        }
        if self.attached.len() + shaders.len() > Self::MAX_SHADERS {
            return Err(ProgramError::TooManyShaders { name: self.name.clone(), max: Self::MAX_SHADERS });
        }
        let program = self.handle;
        self.ctx.backend(|b| {
            for shader in shaders {
                b.attach_shader(program, shader.handle());
            }
        });
        for shader in shaders {
            self.attached.push(Attached { handle: shader.handle(), stage: shader.stage() });
            self.sources.push(AttachedSource {
                name: shader.name().to_string(),
                stage: shader.stage(),
                numbered_source: shader.numbered_source().to_string(),
            });
        }
        if !self.attached.is_empty() {
            self.state = ProgramState::Attached;
        }
        Ok(())
    }

    /// Detaches everything and drops the reflected tables.
    pub fn detach_all(&mut self) {
        let program = self.handle;
        let attached = std::mem::take(&mut self.attached);
        self.ctx.with(|b, s| {
            for a in &attached {
                b.detach_shader(program, a.handle);
            }
            if s.bound_program() == Some(program) {
                s.use_program(b, Handle::INVALID);
            }
        });
        self.sources.clear();
        self.reflection = Reflection::default();
        self.log.clear();
        self.state = ProgramState::Created;
    }

    /// Links and reflects.
    ///
    /// Idempotent: linking a linked program does nothing, and a failed
    /// program stays failed until its shaders are re-attached.
    pub fn link(&mut self) -> bool {
        match self.state {
            ProgramState::Linked => return true,
            ProgramState::Failed => return false,
            ProgramState::Created | ProgramState::Attached => {}
        }

        let program = self.handle;
        let mut stages: Vec<ShaderStage> = self.attached.iter().map(|a| a.stage).collect();
        stages.sort();
        stages.dedup();

        let outcome = self.ctx.backend(|b| {
            b.link_program(program);
            if b.program_link_status(program) {
                Ok(reflect::reflect(b, program, &stages))
            } else {
                Err(b.program_info_log(program))
            }
        });

        match outcome {
            Ok(reflection) => {
                log::debug!(
                    "program `{}` linked: {} uniforms, {} blocks, {} subroutine stages",
                    self.name,
                    reflection.uniforms.len(),
                    reflection.blocks.len(),
                    reflection.subroutines.len()
                );
                self.reflection = reflection;
                self.log.clear();
                self.state = ProgramState::Linked;
                true
            }
            Err(info) => {
                log::error!("program `{}` failed to link:\n{}", self.name, info);
                self.log = info;
                self.state = ProgramState::Failed;
                false
            }
        }
    }

    /// Detaches, re-attaches `shaders` and links again.
    pub fn relink(&mut self, shaders: &[&Shader]) -> Result<bool, ProgramError> {
        self.detach_all();
        self.attach(shaders)?;
        Ok(self.link())
    }

    // ── binding ───────────────────────────────────────────────────────────

    /// Makes this the current program. Returns whether a backend call was made.
    pub fn bind(&self) -> bool {
        let h = self.handle;
        self.ctx.with(|b, s| s.use_program(b, h))
    }

    pub fn unbind(&self) -> bool {
        self.ctx.with(|b, s| s.use_program(b, Handle::INVALID))
    }

    pub fn is_bound(&self) -> bool {
        let h = self.handle;
        self.ctx.with(|_, s| s.bound_program() == Some(h))
    }

    // ── reflected tables ──────────────────────────────────────────────────

    /// Reflected uniform `name`; array elements as `a[i]`.
    pub fn uniform(&self, name: &str) -> Option<Uniform> {
        self.reflection.uniform(name).copied()
    }

    pub fn has_uniform(&self, name: &str) -> bool {
        self.reflection.uniform(name).is_some()
    }

    /// Sorted uniform names.
    pub fn uniform_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.reflection.uniforms.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn uniform_count(&self) -> usize {
        self.reflection.uniforms.len()
    }

    pub fn block(&self, name: &str) -> Option<UniformBlock> {
        self.reflection.blocks.get(name).copied()
    }

    pub fn blocks(&self) -> &BTreeMap<String, UniformBlock> {
        &self.reflection.blocks
    }

    pub fn block_count(&self) -> usize {
        self.reflection.blocks.len()
    }

    pub fn subroutines(&self, stage: ShaderStage) -> Option<&StageSubroutines> {
        self.reflection.subroutines.get(&stage)
    }

    pub fn subroutine_stage_count(&self) -> usize {
        self.reflection.subroutines.len()
    }

    /// Uniform blocks whose binding could not be derived at link time.
    pub fn config_errors(&self) -> &[ReflectionError] {
        &self.reflection.issues
    }

    // ── uniform writes ────────────────────────────────────────────────────

    /// Writes to the currently bound program by cached location.
    ///
    /// A name missing from the reflected table (stripped by the compiler, or
    /// absent from this variant) is ignored. Returns whether a write happened.
    pub fn set_uniform(&self, name: &str, value: impl Into<UniformValue>) -> bool {
        self.write(name, UniformTarget::Bound, &value.into(), false)
    }

    /// Like [`set_uniform`](Self::set_uniform) but targets this program
    /// regardless of what is bound.
    pub fn set_program_uniform(&self, name: &str, value: impl Into<UniformValue>) -> bool {
        self.write(name, UniformTarget::Program(self.handle), &value.into(), false)
    }

    /// Matrix write to the bound program with an explicit transpose flag.
    pub fn set_uniform_matrix(&self, name: &str, value: impl Into<UniformValue>, transpose: bool) -> bool {
        self.write(name, UniformTarget::Bound, &value.into(), transpose)
    }

    /// Matrix write to this program regardless of what is bound.
    pub fn set_program_uniform_matrix(&self, name: &str, value: impl Into<UniformValue>, transpose: bool) -> bool {
        self.write(name, UniformTarget::Program(self.handle), &value.into(), transpose)
    }

    fn write(&self, name: &str, target: UniformTarget, value: &UniformValue, transpose: bool) -> bool {
        let Some(uniform) = self.reflection.uniform(name).copied() else {
            log::trace!("program `{}`: no active uniform `{}`", self.name, name);
            return false;
        };
        let (program, program_name) = (self.handle, &self.name);
        self.ctx.with(|b, s| {
            if cfg!(debug_assertions) && target == UniformTarget::Bound && s.bound_program() != Some(program) {
                log::warn!("program `{}`: `{}` written while another program is bound", program_name, name);
            }
            uniform.upload(b, target, value, transpose)
        })
    }

    // ── subroutines ───────────────────────────────────────────────────────

    /// Routes subroutine uniform `uniform` of `stage` to `function`. Takes
    /// effect on the next [`commit_subroutines`](Self::commit_subroutines).
    pub fn set_subroutine(&mut self, stage: ShaderStage, uniform: &str, function: &str) -> Result<(), ProgramError> {
        if !self.is_linked() {
            return Err(ProgramError::NotLinked);
        }
        self.reflection
            .subroutines
            .get_mut(&stage)
            .ok_or_else(|| ProgramError::UnknownSubroutineUniform { stage, uniform: uniform.to_string() })?
            .select(stage, uniform, function)
    }

    /// Binds the program and sends the whole selection for `stage` in one
    /// call. Returns `false` when the stage has no subroutine uniforms.
    pub fn commit_subroutines(&self, stage: ShaderStage) -> bool {
        let Some(subs) = self.reflection.subroutines.get(&stage) else {
            return false;
        };
        let h = self.handle;
        self.ctx.with(|b, s| {
            s.use_program(b, h);
            b.uniform_subroutines(stage, subs.selection());
        });
        true
    }
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        let h = self.handle;
        let attached = std::mem::take(&mut self.attached);
        self.ctx.with(|b, s| {
            for a in &attached {
                b.detach_shader(h, a.handle);
            }
            s.forget_program(h);
            b.delete_program(h);
        });
        log::debug!("program `{}` deleted", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{HeadlessBackend, Journal, UniformData};
    use crate::context::ContextConfig;
    use glam::Vec3;

    const VERT: &str = "void main() { gl_Position = vec4(0.0); }";
    const FRAG: &str = "\
uniform vec3 tint;
uniform float unused;
uniform vec4 palette[4];
uniform Lights_3 { vec4 light_pos; };
uniform Fog { float density; };
uniform mat4 view;
void main() { color = view * vec4(tint, 1.0) * palette[1] * light_pos * density; }
";

    fn ctx() -> (GpuContext, Journal) {
        let backend = HeadlessBackend::new();
        let journal = backend.journal();
        (GpuContext::new(backend, ContextConfig::default()), journal)
    }

    fn compiled(ctx: &GpuContext, stage: ShaderStage, src: &str) -> Shader {
        let mut s = Shader::new(ctx, stage.name(), stage, "inline");
        assert!(s.compile(src));
        s
    }

    fn linked(ctx: &GpuContext) -> ShaderProgram {
        let vs = compiled(ctx, ShaderStage::Vertex, VERT);
        let fs = compiled(ctx, ShaderStage::Fragment, FRAG);
        let mut p = ShaderProgram::new(ctx, "forward");
        p.attach(&[&vs, &fs]).unwrap();
        assert!(p.link());
        p
    }

    // ── link ──

    #[test]
    fn link_is_idempotent() {
        let (ctx, journal) = ctx();
        let mut p = linked(&ctx);
        let before = journal.count("uniform_block_binding");
        assert!(p.link());
        assert_eq!(journal.count("link_program"), 1);
        assert_eq!(journal.count("uniform_block_binding"), before);
    }

    #[test]
    fn missing_fragment_stage_fails_and_stays_failed() {
        let (ctx, journal) = ctx();
        let vs = compiled(&ctx, ShaderStage::Vertex, VERT);
        let mut p = ShaderProgram::new(&ctx, "half");
        p.attach(&[&vs]).unwrap();
        assert!(!p.link());
        assert_eq!(p.state(), ProgramState::Failed);
        assert!(!p.log().is_empty());
        assert!(!p.link());
        assert_eq!(journal.count("link_program"), 1);
    }

    #[test]
    fn attach_is_bounded() {
        let (ctx, _) = ctx();
        let shaders: Vec<Shader> = (0..9).map(|_| compiled(&ctx, ShaderStage::Vertex, VERT)).collect();
        let refs: Vec<&Shader> = shaders.iter().collect();
        let mut p = ShaderProgram::new(&ctx, "big");
        assert_eq!(p.attach(&refs), Err(ProgramError::TooManyShaders { name: "big".into(), max: 8 }));
    }

    // ── reflection ──

    #[test]
    fn reflects_active_uniforms_only() {
        let (ctx, _) = ctx();
        let p = linked(&ctx);
        assert!(p.has_uniform("tint"));
        assert!(!p.has_uniform("unused"));
        assert!(p.has_uniform("palette[0]"));
        assert_eq!(p.uniform("palette").unwrap().count(), 4);
        assert_eq!(p.uniform("palette[2]").unwrap().location(), p.uniform("palette").unwrap().location() + 2);
        assert_eq!(p.uniform_names(), vec!["palette", "palette[1]", "palette[2]", "palette[3]", "tint", "view"]);
    }

    #[test]
    fn block_bindings_come_from_names() {
        let (ctx, journal) = ctx();
        let p = linked(&ctx);
        assert_eq!(p.block("Lights_3").unwrap().binding, Some(3));
        assert_eq!(p.block("Fog").unwrap().binding, None);
        assert_eq!(p.config_errors(), &[ReflectionError::MissingBindingSuffix("Fog".into())]);
        assert_eq!(journal.count("uniform_block_binding"), 1);
    }

    // ── uniforms ──

    #[test]
    fn absent_uniform_is_a_silent_no_op() {
        let (ctx, journal) = ctx();
        let p = linked(&ctx);
        p.bind();
        journal.clear();
        assert!(!p.set_uniform("unused", 1.0f32));
        assert!(!p.set_program_uniform("nope", Vec3::ONE));
        assert!(journal.is_empty());
    }

    #[test]
    fn fast_and_slow_writes() {
        let (ctx, journal) = ctx();
        let p = linked(&ctx);
        p.bind();
        assert!(p.set_uniform("tint", Vec3::new(1.0, 0.5, 0.0)));
        let w = journal.last_uniform_write().unwrap();
        assert_eq!(w.program, p.handle());
        assert_eq!(w.data, UniformData::F32(vec![1.0, 0.5, 0.0]));

        p.unbind();
        assert!(p.set_program_uniform("tint", Vec3::ZERO));
        assert_eq!(journal.last_uniform_write().unwrap().program, p.handle());
    }

    #[test]
    fn matrix_writes_carry_transpose_on_both_tiers() {
        let (ctx, journal) = ctx();
        let p = linked(&ctx);
        let m = glam::Mat4::from_cols_array(&std::array::from_fn(|i| i as f32));

        p.unbind();
        journal.clear();
        assert!(p.set_program_uniform_matrix("view", m, true));
        let w = journal.last_uniform_write().unwrap();
        assert_eq!(w.program, p.handle());
        assert!(w.transpose);
        assert_eq!(w.data, UniformData::F32(m.to_cols_array().to_vec()));
        assert_eq!(journal.count("use_program"), 0);

        assert!(p.set_program_uniform_matrix("view", m, false));
        assert!(!journal.last_uniform_write().unwrap().transpose);

        p.bind();
        assert!(p.set_uniform_matrix("view", m, true));
        assert!(journal.last_uniform_write().unwrap().transpose);
        assert!(!p.set_program_uniform_matrix("projection", m, true));
    }

    #[test]
    fn binding_twice_is_one_call() {
        let (ctx, journal) = ctx();
        let p = linked(&ctx);
        journal.clear();
        assert!(p.bind());
        assert!(!p.bind());
        assert!(p.is_bound());
        assert_eq!(journal.count("use_program"), 1);
    }

    // ── subroutines ──

    #[test]
    fn subroutines_commit_in_one_call() {
        let (ctx, journal) = ctx();
        let vs = compiled(&ctx, ShaderStage::Vertex, VERT);
        let fs = compiled(
            &ctx,
            ShaderStage::Fragment,
            "subroutine vec3 Shade(vec3 n);\n\
             subroutine(Shade) vec3 flat_shade(vec3 n) { return vec3(1.0); }\n\
             subroutine(Shade) vec3 lambert(vec3 n) { return n; }\n\
             subroutine uniform Shade shade;\n\
             void main() { color = vec4(shade(vec3(0.0)), 1.0); }",
        );
        let mut p = ShaderProgram::new(&ctx, "sub");
        p.attach(&[&vs, &fs]).unwrap();
        assert!(p.link());

        let subs = p.subroutines(ShaderStage::Fragment).unwrap();
        assert_eq!(subs.selection(), &[subs.function_index("flat_shade").unwrap()]);

        p.set_subroutine(ShaderStage::Fragment, "shade", "lambert").unwrap();
        assert!(p.commit_subroutines(ShaderStage::Fragment));
        assert!(!p.commit_subroutines(ShaderStage::Vertex));
        assert_eq!(journal.count("uniform_subroutines"), 1);
    }
}
