//! Program linking for the headless backend.
//!
//! Merges the declarations of the attached modules into the tables the
//! reflection queries read: active uniforms with locations, uniform blocks
//! with binding points, and per-stage subroutine uniforms/functions.

use std::collections::BTreeMap;

use super::glsl::{CompiledModule, DeclaredUniform};
use crate::shader::ShaderStage;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LinkedUniform {
    /// Driver-style name; arrays carry a `[0]` suffix.
    pub name: String,
    pub base_name: String,
    pub gl_type: u32,
    /// Array length, 1 for non-arrays.
    pub size: u32,
    /// `-1` for block members.
    pub location: i32,
    pub block_index: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LinkedBlock {
    pub name: String,
    pub binding: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct LinkedStage {
    /// `(uniform name, subroutine type)`; the location is the position.
    pub uniforms: Vec<(String, String)>,
    /// `(function name, compatible types)`; the index is the position.
    pub functions: Vec<(String, Vec<String>)>,
    /// Committed function index per subroutine uniform location.
    pub selection: Vec<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct LinkedProgram {
    pub uniforms: Vec<LinkedUniform>,
    pub blocks: Vec<LinkedBlock>,
    pub stages: BTreeMap<ShaderStage, LinkedStage>,
}

impl LinkedProgram {
    /// Location for `name`, accepting `a`, `a[0]` and `a[i]` for arrays.
    pub(crate) fn location(&self, name: &str) -> Option<i32> {
        let (base, element) = match name.strip_suffix(']').and_then(|n| n.split_once('[')) {
            Some((base, idx)) => (base, idx.parse::<u32>().ok()?),
            None => (name, 0),
        };
        let u = self.uniforms.iter().find(|u| u.base_name == base && u.location >= 0)?;
        (element < u.size).then(|| u.location + element as i32)
    }

    /// Uniform declared at `location`, with the element offset into it.
    pub(crate) fn uniform_at(&self, location: i32) -> Option<&LinkedUniform> {
        self.uniforms
            .iter()
            .find(|u| u.location >= 0 && location >= u.location && location < u.location + u.size as i32)
    }
}

fn merge_uniform(
    out: &mut Vec<LinkedUniform>,
    decl: &DeclaredUniform,
    block_index: Option<u32>,
) -> Result<(), String> {
    if let Some(existing) = out.iter().find(|u| u.base_name == decl.name) {
        if existing.gl_type != decl.gl_type {
            return Err(format!(
                "error: uniform '{}' declared with conflicting types across stages",
                decl.name
            ));
        }
        return Ok(());
    }
    let name = if decl.array_len > 0 { format!("{}[0]", decl.name) } else { decl.name.clone() };
    out.push(LinkedUniform {
        name,
        base_name: decl.name.clone(),
        gl_type: decl.gl_type,
        size: decl.array_len.max(1),
        location: -1,
        block_index,
    });
    Ok(())
}

/// Links the given `(stage, module)` pairs, or returns a program info log.
pub(crate) fn link(modules: &[(ShaderStage, &CompiledModule)]) -> Result<LinkedProgram, String> {
    if modules.is_empty() {
        return Err("error: no shaders attached to program".to_string());
    }

    let mut seen = Vec::with_capacity(modules.len());
    for (stage, module) in modules {
        if seen.contains(stage) {
            return Err(format!("error: more than one {} shader attached", stage));
        }
        seen.push(*stage);
        if !module.has_main {
            return Err(format!("error: {} shader does not define 'main'", stage));
        }
    }

    let has = |s: ShaderStage| seen.contains(&s);
    if has(ShaderStage::Compute) {
        if seen.len() > 1 {
            return Err("error: compute shader cannot be linked with other stages".to_string());
        }
    } else if !has(ShaderStage::Vertex) {
        return Err("error: program lacks a vertex shader".to_string());
    } else if !has(ShaderStage::Fragment) {
        return Err("error: program lacks a fragment shader".to_string());
    }

    let mut ordered: Vec<_> = modules.to_vec();
    ordered.sort_by_key(|(stage, _)| *stage);

    let mut program = LinkedProgram::default();

    // plain uniforms first so they receive the low locations
    let mut plain = Vec::new();
    for (_, module) in &ordered {
        for decl in &module.uniforms {
            merge_uniform(&mut plain, decl, None)?;
        }
    }
    let mut next_location = 0i32;
    for u in &mut plain {
        u.location = next_location;
        next_location += u.size as i32;
    }
    program.uniforms = plain;

    for (_, module) in &ordered {
        for block in &module.blocks {
            if program.blocks.iter().any(|b| b.name == block.name) {
                continue;
            }
            let index = program.blocks.len() as u32;
            program.blocks.push(LinkedBlock { name: block.name.clone(), binding: 0 });
            for member in &block.members {
                merge_uniform(&mut program.uniforms, member, Some(index))?;
            }
        }
    }

    for (stage, module) in &ordered {
        if module.subroutine_uniforms.is_empty() && module.subroutines.is_empty() {
            continue;
        }
        let uniforms: Vec<_> = module
            .subroutine_uniforms
            .iter()
            .map(|u| (u.name.clone(), u.type_name.clone()))
            .collect();
        let functions: Vec<_> =
            module.subroutines.iter().map(|f| (f.name.clone(), f.types.clone())).collect();
        let selection = vec![0; uniforms.len()];
        program.stages.insert(*stage, LinkedStage { uniforms, functions, selection });
    }

    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::super::glsl::compile;
    use super::*;

    const VS: &str = "uniform mat4 u_mvp;\nuniform vec3 u_off[3];\nvoid main() { gl_Position = u_mvp * vec4(u_off[0], 1.0); }";
    const FS: &str = "uniform vec4 u_tint;\nuniform mat4 u_mvp;\nvoid main() { c = u_tint * u_mvp[0]; }";

    fn linked(vs: &str, fs: &str) -> Result<LinkedProgram, String> {
        let v = compile(vs).unwrap();
        let f = compile(fs).unwrap();
        link(&[(ShaderStage::Vertex, &v), (ShaderStage::Fragment, &f)])
    }

    #[test]
    fn shared_uniforms_merge_and_arrays_take_locations() {
        let p = linked(VS, FS).unwrap();
        let names: Vec<_> = p.uniforms.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["u_mvp", "u_off[0]", "u_tint"]);
        assert_eq!(p.location("u_mvp"), Some(0));
        assert_eq!(p.location("u_off"), Some(1));
        assert_eq!(p.location("u_off[2]"), Some(3));
        assert_eq!(p.location("u_off[3]"), None);
        assert_eq!(p.location("u_tint"), Some(4));
        assert_eq!(p.uniform_at(2).map(|u| u.base_name.as_str()), Some("u_off"));
    }

    #[test]
    fn conflicting_types_fail() {
        let fs = "uniform vec3 u_mvp;\nvoid main() { c = u_mvp; }";
        assert!(linked(VS, fs).unwrap_err().contains("conflicting types"));
    }

    #[test]
    fn missing_fragment_stage_fails() {
        let v = compile(VS).unwrap();
        assert!(link(&[(ShaderStage::Vertex, &v)]).unwrap_err().contains("fragment"));
    }

    #[test]
    fn missing_main_fails() {
        let v = compile("uniform float x;").unwrap();
        let f = compile(FS).unwrap();
        assert!(link(&[(ShaderStage::Vertex, &v), (ShaderStage::Fragment, &f)]).is_err());
    }

    #[test]
    fn compute_links_alone() {
        let c = compile("uniform float dt;\nvoid main() { dt; }").unwrap();
        assert!(link(&[(ShaderStage::Compute, &c)]).is_ok());
        let v = compile(VS).unwrap();
        assert!(link(&[(ShaderStage::Compute, &c), (ShaderStage::Vertex, &v)]).is_err());
    }
}
