//! Post-link reflection: active uniforms, uniform blocks, subroutines.
//!
//! Each pass is independent and skipped when the backend reports nothing to
//! enumerate for it.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use super::stage::ShaderStage;
use super::subroutine::{StageSubroutines, SubroutineUniform};
use crate::backend::Backend;
use crate::error::ReflectionError;
use crate::handle::Handle;
use crate::uniform::{Uniform, UniformType};

/// A reflected uniform block.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct UniformBlock {
    pub index: u32,
    /// Binding point taken from the `_<n>` name suffix; `None` when the name
    /// gave no usable binding and the block was left unbound.
    pub binding: Option<u32>,
}

/// Binding point encoded in a uniform block name: `Lights_3` → 3.
///
/// The part before the last `_` must be non-empty and the part after it a
/// non-negative decimal integer.
pub fn parse_binding_suffix(block: &str) -> Result<u32, ReflectionError> {
    let missing = || ReflectionError::MissingBindingSuffix(block.to_string());
    let (prefix, digits) = block.rsplit_once('_').ok_or_else(missing)?;
    if prefix.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(missing());
    }
    digits.parse().map_err(|_| missing())
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Reflection {
    pub uniforms: FxHashMap<String, Uniform>,
    pub blocks: BTreeMap<String, UniformBlock>,
    pub subroutines: BTreeMap<ShaderStage, StageSubroutines>,
    pub issues: Vec<ReflectionError>,
}

impl Reflection {
    /// Looks `name` up, accepting `a[0]` for array `a`.
    pub fn uniform(&self, name: &str) -> Option<&Uniform> {
        self.uniforms.get(name).or_else(|| self.uniforms.get(name.strip_suffix("[0]")?))
    }
}

/// Runs all three passes against a freshly linked `program`.
pub(crate) fn reflect(backend: &mut dyn Backend, program: Handle, stages: &[ShaderStage]) -> Reflection {
    let mut issues = Vec::new();
    let uniforms = reflect_uniforms(backend, program);
    let blocks = reflect_blocks(backend, program, &mut issues);
    let subroutines = reflect_subroutines(backend, program, stages);
    Reflection { uniforms, blocks, subroutines, issues }
}

fn reflect_uniforms(backend: &dyn Backend, program: Handle) -> FxHashMap<String, Uniform> {
    let count = backend.active_uniform_count(program);
    let mut out = FxHashMap::default();
    for i in 0..count {
        let Some(active) = backend.active_uniform(program, i) else { continue };
        if active.block_index.is_some() {
            continue;
        }
        let Some(location) = backend.uniform_location(program, &active.name) else { continue };
        let kind = UniformType::from_gl(active.gl_type);
        let base = active.name.strip_suffix("[0]").unwrap_or(&active.name).to_string();

        // Elements past the first get their own entries so `a[2]` resolves.
        for element in 1..active.size {
            let name = format!("{}[{}]", base, element);
            if let Some(loc) = backend.uniform_location(program, &name) {
                out.insert(name, Uniform::new(loc, kind, active.size - element));
            }
        }
        out.insert(base, Uniform::new(location, kind, active.size));
    }
    log::trace!("{}: {} uniforms reflected", program, out.len());
    out
}

fn reflect_blocks(
    backend: &mut dyn Backend,
    program: Handle,
    issues: &mut Vec<ReflectionError>,
) -> BTreeMap<String, UniformBlock> {
    let count = backend.active_uniform_block_count(program);
    let mut out = BTreeMap::new();
    let mut taken: BTreeMap<u32, String> = BTreeMap::new();

    for index in 0..count {
        let Some(name) = backend.active_uniform_block_name(program, index) else { continue };
        let binding = parse_binding_suffix(&name).and_then(|binding| match taken.get(&binding) {
            Some(other) => Err(ReflectionError::DuplicateBinding { block: name.clone(), other: other.clone(), binding }),
            None => Ok(binding),
        });
        let binding = match binding {
            Ok(binding) => {
                backend.uniform_block_binding(program, index, binding);
                taken.insert(binding, name.clone());
                Some(binding)
            }
            Err(e) => {
                log::error!("{}: {}", program, e);
                issues.push(e);
                None
            }
        };
        out.insert(name, UniformBlock { index, binding });
    }
    out
}

fn reflect_subroutines(
    backend: &dyn Backend,
    program: Handle,
    stages: &[ShaderStage],
) -> BTreeMap<ShaderStage, StageSubroutines> {
    let mut out = BTreeMap::new();
    for &stage in stages {
        let count = backend.active_subroutine_uniform_count(program, stage);
        if count == 0 {
            continue;
        }

        let mut uniforms = BTreeMap::new();
        for i in 0..count {
            let Some(name) = backend.active_subroutine_uniform_name(program, stage, i) else { continue };
            let Some(location) = backend.subroutine_uniform_location(program, stage, &name) else { continue };
            let compatible = backend.compatible_subroutines(program, stage, i);
            uniforms.insert(name, SubroutineUniform { location, compatible });
        }

        let functions = (0..backend.active_subroutine_count(program, stage))
            .filter_map(|i| Some((backend.active_subroutine_name(program, stage, i)?, i)))
            .collect();

        out.insert(stage, StageSubroutines::new(uniforms, functions));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_suffix_parsing() {
        assert_eq!(parse_binding_suffix("Lights_3"), Ok(3));
        assert_eq!(parse_binding_suffix("Camera_Data_12"), Ok(12));
        assert_eq!(parse_binding_suffix("Frame_0"), Ok(0));
        for bad in ["Fog", "Fog_", "Fog_x", "_4", "Fog_-1", "Fog_99999999999"] {
            assert_eq!(parse_binding_suffix(bad), Err(ReflectionError::MissingBindingSuffix(bad.into())), "{bad}");
        }
    }
}
