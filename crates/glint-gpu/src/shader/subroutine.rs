use std::collections::BTreeMap;

use super::stage::ShaderStage;
use crate::error::ProgramError;

/// A subroutine uniform of one stage.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SubroutineUniform {
    /// Selector slot in the stage's index array.
    pub location: u32,
    /// Function indices that may be selected.
    pub compatible: Vec<u32>,
}

/// Reflected subroutines of one stage plus the pending selection.
///
/// Selections accumulate through [`select`](Self::select) and reach the
/// backend all at once, since GL resets a stage's selection every time a
/// program is bound and only accepts the full index array.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct StageSubroutines {
    uniforms: BTreeMap<String, SubroutineUniform>,
    functions: BTreeMap<String, u32>,
    /// Function index per selector slot.
    selection: Vec<u32>,
}

impl StageSubroutines {
    /// Unset slots default to their uniform's first compatible function.
    pub(crate) fn new(uniforms: BTreeMap<String, SubroutineUniform>, functions: BTreeMap<String, u32>) -> Self {
        let slots = uniforms.values().map(|u| u.location as usize + 1).max().unwrap_or(0);
        let mut selection = vec![0; slots];
        for u in uniforms.values() {
            if let Some(&first) = u.compatible.first() {
                selection[u.location as usize] = first;
            }
        }
        Self { uniforms, functions, selection }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.uniforms.is_empty()
    }

    pub fn uniform(&self, name: &str) -> Option<&SubroutineUniform> {
        self.uniforms.get(name)
    }

    pub fn uniform_names(&self) -> impl Iterator<Item = &str> {
        self.uniforms.keys().map(String::as_str)
    }

    pub fn function_index(&self, name: &str) -> Option<u32> {
        self.functions.get(name).copied()
    }

    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    #[inline]
    pub fn selection(&self) -> &[u32] {
        &self.selection
    }

    /// Routes subroutine uniform `uniform` to `function`. Takes effect on the
    /// next commit.
    pub fn select(&mut self, stage: ShaderStage, uniform: &str, function: &str) -> Result<(), ProgramError> {
        let slot = self.uniforms.get(uniform).ok_or_else(|| ProgramError::UnknownSubroutineUniform {
            stage,
            uniform: uniform.to_string(),
        })?;
        let index = self
            .functions
            .get(function)
            .copied()
            .filter(|i| slot.compatible.contains(i))
            .ok_or_else(|| ProgramError::IncompatibleSubroutine {
                stage,
                uniform: uniform.to_string(),
                function: function.to_string(),
            })?;
        self.selection[slot.location as usize] = index;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lighting() -> StageSubroutines {
        let mut uniforms = BTreeMap::new();
        uniforms.insert("shade".to_string(), SubroutineUniform { location: 0, compatible: vec![1, 2] });
        uniforms.insert("tonemap".to_string(), SubroutineUniform { location: 1, compatible: vec![0] });
        let functions = [("aces", 0), ("lambert", 1), ("phong", 2)]
            .into_iter()
            .map(|(n, i)| (n.to_string(), i))
            .collect();
        StageSubroutines::new(uniforms, functions)
    }

    #[test]
    fn defaults_to_first_compatible() {
        assert_eq!(lighting().selection(), &[1, 0]);
    }

    #[test]
    fn select_validates_compatibility() {
        let mut s = lighting();
        s.select(ShaderStage::Fragment, "shade", "phong").unwrap();
        assert_eq!(s.selection(), &[2, 0]);
        assert!(matches!(
            s.select(ShaderStage::Fragment, "shade", "aces"),
            Err(ProgramError::IncompatibleSubroutine { .. })
        ));
        assert!(matches!(
            s.select(ShaderStage::Fragment, "bloom", "aces"),
            Err(ProgramError::UnknownSubroutineUniform { .. })
        ));
    }
}
