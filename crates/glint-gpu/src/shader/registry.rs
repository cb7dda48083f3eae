use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};

use super::object::{Shader, ShaderError};
use super::program::ShaderProgram;
use super::source::ShaderSourceProvider;
use super::stage::ShaderStage;
use crate::context::GpuContext;
use crate::error::ProgramError;

new_key_type! {
    /// Key of a shader in a [`ShaderRegistry`].
    pub struct ShaderId;
    /// Key of a program in a [`ShaderRegistry`].
    pub struct ProgramId;
}

#[derive(Debug)]
struct ProgramEntry {
    program: ShaderProgram,
    shaders: Vec<ShaderId>,
}

/// Owns every shader and program, keyed by name and by id.
///
/// Programs refer to their shaders by [`ShaderId`], so a shader can be
/// recompiled or replaced without dangling anything. The registry also keeps
/// the session's broken-shader index and failed-program set for batch
/// reporting.
pub struct ShaderRegistry {
    ctx: GpuContext,
    sources: Box<dyn ShaderSourceProvider>,
    shaders: SlotMap<ShaderId, Shader>,
    programs: SlotMap<ProgramId, ProgramEntry>,
    shader_names: FxHashMap<String, ShaderId>,
    program_names: FxHashMap<String, ProgramId>,
    errors: BTreeMap<String, ShaderError>,
    failed: BTreeSet<ProgramId>,
}

impl ShaderRegistry {
    pub fn new(ctx: &GpuContext, sources: impl ShaderSourceProvider + 'static) -> Self {
        Self {
            ctx: ctx.clone(),
            sources: Box::new(sources),
            shaders: SlotMap::with_key(),
            programs: SlotMap::with_key(),
            shader_names: FxHashMap::default(),
            program_names: FxHashMap::default(),
            errors: BTreeMap::new(),
            failed: BTreeSet::new(),
        }
    }

    // ── shaders ───────────────────────────────────────────────────────────

    /// Registers an unloaded shader. Re-adding a name replaces that shader in
    /// place, keeping its id so programs referencing it stay valid.
    pub fn add_shader(&mut self, name: &str, stage: ShaderStage, path: &str) -> ShaderId {
        let shader = Shader::new(&self.ctx, name, stage, path);
        self.errors.remove(name);
        match self.shader_names.get(name).copied() {
            Some(id) => {
                log::debug!("shader `{}` replaced", name);
                self.shaders[id] = shader;
                for entry in self.programs.values_mut().filter(|e| e.shaders.contains(&id)) {
                    entry.program.detach_all();
                }
                id
            }
            None => {
                let id = self.shaders.insert(shader);
                self.shader_names.insert(name.to_string(), id);
                id
            }
        }
    }

    /// Reads and compiles a registered shader. Failures are recorded in
    /// [`shader_errors`](Self::shader_errors).
    pub fn load_shader(&mut self, id: ShaderId) -> bool {
        let Some(shader) = self.shaders.get_mut(id) else { return false };
        let ok = shader.load(self.sources.as_ref());
        Self::record(&mut self.errors, shader);
        ok
    }

    /// Recompiles a shader from its source and relinks every program that
    /// references it.
    pub fn reload_shader(&mut self, id: ShaderId) -> bool {
        let Some(shader) = self.shaders.get_mut(id) else { return false };
        let ok = shader.reload(self.sources.as_ref());
        Self::record(&mut self.errors, shader);
        log::info!("shader `{}` reloaded ({})", shader.name(), if ok { "ok" } else { "failed" });

        let dependents: Vec<ProgramId> =
            self.programs.iter().filter(|(_, e)| e.shaders.contains(&id)).map(|(pid, _)| pid).collect();
        for pid in dependents {
            if let Err(e) = self.relink_program(pid) {
                log::error!("relinking after reload: {}", e);
            }
        }
        ok
    }

    fn record(errors: &mut BTreeMap<String, ShaderError>, shader: &Shader) {
        match shader.error() {
            Some(err) => {
                errors.insert(err.name.clone(), err);
            }
            None => {
                errors.remove(shader.name());
            }
        }
    }

    /// Removes a shader. Programs that reference it report
    /// [`ProgramError::UnknownShader`] on their next attach.
    pub fn remove_shader(&mut self, id: ShaderId) -> Option<Shader> {
        let shader = self.shaders.remove(id)?;
        self.shader_names.remove(shader.name());
        self.errors.remove(shader.name());
        Some(shader)
    }

    pub fn shader(&self, id: ShaderId) -> Option<&Shader> {
        self.shaders.get(id)
    }

    pub fn shader_id(&self, name: &str) -> Option<ShaderId> {
        self.shader_names.get(name).copied()
    }

    pub fn shaders(&self) -> impl Iterator<Item = (ShaderId, &Shader)> {
        self.shaders.iter()
    }

    #[inline]
    pub fn shader_count(&self) -> usize {
        self.shaders.len()
    }

    // ── programs ──────────────────────────────────────────────────────────

    /// Registers an unlinked program over `shaders`. Re-adding a name
    /// replaces that program in place.
    pub fn add_program(&mut self, name: &str, shaders: &[ShaderId]) -> Result<ProgramId, ProgramError> {
        if shaders.len() > ShaderProgram::MAX_SHADERS {
            return Err(ProgramError::TooManyShaders { name: name.to_string(), max: ShaderProgram::MAX_SHADERS });
        }
        if shaders.iter().any(|id| !self.shaders.contains_key(*id)) {
            return Err(ProgramError::UnknownShader(name.to_string()));
        }

        let entry = ProgramEntry { program: ShaderProgram::new(&self.ctx, name), shaders: shaders.to_vec() };
        let id = match self.program_names.get(name).copied() {
            Some(id) => {
                log::debug!("program `{}` replaced", name);
                self.programs[id] = entry;
                self.failed.remove(&id);
                id
            }
            None => {
                let id = self.programs.insert(entry);
                self.program_names.insert(name.to_string(), id);
                id
            }
        };
        Ok(id)
    }

    /// Attaches (on first use) and links. Idempotent once linked.
    pub fn link_program(&mut self, id: ProgramId) -> Result<bool, ProgramError> {
        let entry = self.programs.get_mut(id).ok_or(ProgramError::UnknownProgram)?;
        if entry.program.shader_count() == 0 && !entry.shaders.is_empty() {
            let shaders = Self::resolve(&self.shaders, entry)?;
            entry.program.attach(&shaders)?;
        }
        let ok = entry.program.link();
        self.note_link(id, ok);
        Ok(ok)
    }

    /// Re-attaches the current shaders and links again.
    pub fn relink_program(&mut self, id: ProgramId) -> Result<bool, ProgramError> {
        let entry = self.programs.get_mut(id).ok_or(ProgramError::UnknownProgram)?;
        let ok = match Self::resolve(&self.shaders, entry) {
            Ok(shaders) => entry.program.relink(&shaders)?,
            Err(e) => {
                entry.program.detach_all();
                self.failed.insert(id);
                return Err(e);
            }
        };
        self.note_link(id, ok);
        Ok(ok)
    }

    fn resolve<'a>(shaders: &'a SlotMap<ShaderId, Shader>, entry: &ProgramEntry) -> Result<Vec<&'a Shader>, ProgramError> {
        entry
            .shaders
            .iter()
            .map(|id| shaders.get(*id).ok_or_else(|| ProgramError::UnknownShader(entry.program.name().to_string())))
            .collect()
    }

    fn note_link(&mut self, id: ProgramId, ok: bool) {
        if ok {
            self.failed.remove(&id);
        } else {
            self.failed.insert(id);
        }
    }

    pub fn remove_program(&mut self, id: ProgramId) -> Option<ShaderProgram> {
        let entry = self.programs.remove(id)?;
        self.program_names.remove(entry.program.name());
        self.failed.remove(&id);
        Some(entry.program)
    }

    pub fn program(&self, id: ProgramId) -> Option<&ShaderProgram> {
        self.programs.get(id).map(|e| &e.program)
    }

    pub fn program_mut(&mut self, id: ProgramId) -> Option<&mut ShaderProgram> {
        self.programs.get_mut(id).map(|e| &mut e.program)
    }

    pub fn program_id(&self, name: &str) -> Option<ProgramId> {
        self.program_names.get(name).copied()
    }

    pub fn program_by_name(&self, name: &str) -> Option<&ShaderProgram> {
        self.program(self.program_id(name)?)
    }

    /// Shaders a program was declared with.
    pub fn program_shaders(&self, id: ProgramId) -> &[ShaderId] {
        self.programs.get(id).map_or(&[], |e| &e.shaders)
    }

    pub fn programs(&self) -> impl Iterator<Item = (ProgramId, &ShaderProgram)> {
        self.programs.iter().map(|(id, e)| (id, &e.program))
    }

    #[inline]
    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    // ── batch reporting ───────────────────────────────────────────────────

    /// Broken shaders by name; one entry per name.
    #[inline]
    pub fn shader_errors(&self) -> &BTreeMap<String, ShaderError> {
        &self.errors
    }

    #[inline]
    pub fn failed_programs(&self) -> &BTreeSet<ProgramId> {
        &self.failed
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty() || !self.failed.is_empty()
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
        self.failed.clear();
    }
}

impl std::fmt::Debug for ShaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderRegistry")
            .field("shaders", &self.shaders.len())
            .field("programs", &self.programs.len())
            .field("errors", &self.errors.len())
            .field("failed", &self.failed.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;
    use crate::context::ContextConfig;
    use crate::shader::MemorySources;

    const VERT: &str = "void main() { gl_Position = vec4(0.0); }";
    const FRAG: &str = "uniform vec4 tint;\nvoid main() { color = tint; }";

    fn registry() -> (ShaderRegistry, MemorySources) {
        let ctx = GpuContext::new(HeadlessBackend::new(), ContextConfig::default());
        let src = MemorySources::new().with("a.vert", VERT).with("a.frag", FRAG);
        (ShaderRegistry::new(&ctx, src.clone()), src)
    }

    fn program(reg: &mut ShaderRegistry) -> (ShaderId, ShaderId, ProgramId) {
        let vs = reg.add_shader("a_vs", ShaderStage::Vertex, "a.vert");
        let fs = reg.add_shader("a_fs", ShaderStage::Fragment, "a.frag");
        reg.load_shader(vs);
        reg.load_shader(fs);
        let p = reg.add_program("a", &[vs, fs]).unwrap();
        (vs, fs, p)
    }

    #[test]
    fn links_by_id() {
        let (mut reg, _) = registry();
        let (_, _, p) = program(&mut reg);
        assert!(reg.shader(reg.shader_id("a_vs").unwrap()).unwrap().is_compiled());
        assert_eq!(reg.link_program(p), Ok(true));
        assert!(reg.program_by_name("a").unwrap().has_uniform("tint"));
        assert!(!reg.has_errors());
    }

    #[test]
    fn error_index_is_replaced_by_name() {
        let (mut reg, src) = registry();
        src.insert("a.frag", "void main() {");
        let (_, fs, p) = program(&mut reg);
        assert_eq!(reg.shader_errors().len(), 1);
        assert_eq!(reg.link_program(p), Ok(false));
        assert_eq!(reg.link_program(p), Ok(false));
        assert_eq!(reg.failed_programs().len(), 1);

        src.insert("a.frag", "void main() { }}");
        assert!(!reg.reload_shader(fs));
        assert_eq!(reg.shader_errors().len(), 1);
        assert!(reg.shader_errors()["a_fs"].log.contains("'}'"));
    }

    #[test]
    fn reload_relinks_dependents() {
        let (mut reg, src) = registry();
        src.insert("a.frag", "void main() {");
        let (_, fs, p) = program(&mut reg);
        reg.link_program(p).unwrap();
        assert!(reg.failed_programs().contains(&p));

        src.insert("a.frag", FRAG);
        assert!(reg.reload_shader(fs));
        assert!(reg.shader_errors().is_empty());
        assert!(reg.failed_programs().is_empty());
        assert!(reg.program(p).unwrap().is_linked());
    }

    #[test]
    fn programs_are_bounded_and_checked() {
        let (mut reg, _) = registry();
        let (vs, _, _) = program(&mut reg);
        assert!(matches!(reg.add_program("big", &[vs; 9]), Err(ProgramError::TooManyShaders { .. })));

        let gone = reg.add_shader("gone", ShaderStage::Fragment, "a.frag");
        reg.remove_shader(gone);
        assert_eq!(reg.add_program("b", &[vs, gone]), Err(ProgramError::UnknownShader("b".into())));
    }

    #[test]
    fn re_adding_a_name_keeps_the_id() {
        let (mut reg, _) = registry();
        let first = reg.add_shader("s", ShaderStage::Vertex, "a.vert");
        let second = reg.add_shader("s", ShaderStage::Vertex, "a.vert");
        assert_eq!(first, second);
        assert_eq!(reg.shader_count(), 1);
    }

    #[test]
    fn clear_errors_empties_both_indices() {
        let (mut reg, src) = registry();
        src.remove("a.vert");
        let (_, _, p) = program(&mut reg);
        reg.link_program(p).unwrap();
        assert!(reg.has_errors());
        reg.clear_errors();
        assert!(!reg.has_errors());
    }
}
