use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;

use rustc_hash::FxHashSet;

use crate::error::SourceError;

/// Where shader source text comes from.
///
/// Paths are `/`-separated and relative to the provider's root.
pub trait ShaderSourceProvider {
    fn read(&self, path: &str) -> Result<String, SourceError>;
}

/// Reads sources from files under `root`.
#[derive(Debug, Clone)]
pub struct FsSources {
    pub root: PathBuf,
}

impl FsSources {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ShaderSourceProvider for FsSources {
    fn read(&self, path: &str) -> Result<String, SourceError> {
        let full = self.root.join(path);
        std::fs::read_to_string(&full).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => SourceError::NotFound(path.to_string()),
            _ => SourceError::Io { path: full.display().to_string(), message: e.to_string() },
        })
    }
}

/// In-memory sources.
///
/// Cloning yields another view of the same file set, so a test can keep a
/// clone and edit files after handing the provider to a registry.
#[derive(Debug, Clone, Default)]
pub struct MemorySources(Rc<RefCell<BTreeMap<String, String>>>);

impl MemorySources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, path: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(path, source);
        self
    }

    /// Adds or replaces a file.
    pub fn insert(&self, path: impl Into<String>, source: impl Into<String>) {
        self.0.borrow_mut().insert(path.into(), source.into());
    }

    pub fn remove(&self, path: &str) -> bool {
        self.0.borrow_mut().remove(path).is_some()
    }
}

impl ShaderSourceProvider for MemorySources {
    fn read(&self, path: &str) -> Result<String, SourceError> {
        self.0.borrow().get(path).cloned().ok_or_else(|| SourceError::NotFound(path.to_string()))
    }
}

// ── #include expansion ────────────────────────────────────────────────────

/// Reads `path` and splices in every `#include "file"` (or `<file>`)
/// directive, recursively.
///
/// Include paths resolve against the including file's directory. A file
/// already spliced into this expansion is skipped on later includes; a file
/// that includes itself, directly or not, is an error.
pub fn expand_includes(sources: &dyn ShaderSourceProvider, path: &str) -> Result<String, SourceError> {
    let mut out = String::new();
    let mut stack = Vec::new();
    let mut done = FxHashSet::default();
    expand_into(sources, path, &mut stack, &mut done, &mut out)?;
    Ok(out)
}

fn expand_into(
    sources: &dyn ShaderSourceProvider,
    path: &str,
    stack: &mut Vec<String>,
    done: &mut FxHashSet<String>,
    out: &mut String,
) -> Result<(), SourceError> {
    if stack.iter().any(|p| p == path) {
        let chain = format!("{} -> {}", stack.join(" -> "), path);
        return Err(SourceError::IncludeCycle { chain });
    }
    if !done.insert(path.to_string()) {
        return Ok(());
    }

    let text = sources.read(path)?;
    stack.push(path.to_string());
    for (i, line) in text.lines().enumerate() {
        match include_target(line) {
            None => {
                out.push_str(line);
                out.push('\n');
            }
            Some(Ok(target)) => {
                let resolved = resolve(path, target);
                expand_into(sources, &resolved, stack, done, out)?;
            }
            Some(Err(())) => {
                return Err(SourceError::MalformedInclude { path: path.to_string(), line: i + 1 });
            }
        }
    }
    stack.pop();
    Ok(())
}

/// `None` for ordinary lines; the quoted target for include directives.
fn include_target(line: &str) -> Option<Result<&str, ()>> {
    let rest = line.trim_start().strip_prefix('#')?.trim_start().strip_prefix("include")?;
    let rest = rest.trim();
    let (open, close) = match rest.chars().next() {
        Some('"') => ('"', '"'),
        Some('<') => ('<', '>'),
        _ => return Some(Err(())),
    };
    let inner = rest.strip_prefix(open)?;
    match inner.find(close) {
        Some(end) if end > 0 && inner[end + 1..].trim().is_empty() => Some(Ok(&inner[..end])),
        _ => Some(Err(())),
    }
}

fn resolve(from: &str, target: &str) -> String {
    match from.rfind('/') {
        Some(slash) => format!("{}/{}", &from[..slash], target),
        None => target.to_string(),
    }
}

/// Prefixes every line with its 1-based number, for diagnostics.
pub fn number_lines(source: &str) -> String {
    let mut out = String::with_capacity(source.len() + source.len() / 8);
    for (i, line) in source.lines().enumerate() {
        out.push_str(&format!("{:>4}: {}\n", i + 1, line));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn includes_resolve_relative_to_includer() {
        let src = MemorySources::new()
            .with("lit/main.frag", "#version 450\n#include \"common.glsl\"\nvoid main() {}")
            .with("lit/common.glsl", "float pi = 3.14;");
        let out = expand_includes(&src, "lit/main.frag").unwrap();
        assert_eq!(out, "#version 450\nfloat pi = 3.14;\nvoid main() {}\n");
    }

    #[test]
    fn diamond_includes_splice_once() {
        let src = MemorySources::new()
            .with("a", "#include <b>\n#include <c>")
            .with("b", "#include <d>\nb")
            .with("c", "#include <d>\nc")
            .with("d", "d");
        assert_eq!(expand_includes(&src, "a").unwrap(), "d\nb\nc\n");
    }

    #[test]
    fn cycles_are_reported() {
        let src = MemorySources::new().with("a", "#include \"b\"").with("b", "#include \"a\"");
        assert_eq!(
            expand_includes(&src, "a"),
            Err(SourceError::IncludeCycle { chain: "a -> b -> a".into() })
        );
    }

    #[test]
    fn bad_directives_and_missing_files() {
        let src = MemorySources::new().with("a", "x\n#include common.glsl").with("b", "#include \"nope\"");
        assert_eq!(expand_includes(&src, "a"), Err(SourceError::MalformedInclude { path: "a".into(), line: 2 }));
        assert_eq!(expand_includes(&src, "b"), Err(SourceError::NotFound("nope".into())));
    }

    #[test]
    fn numbering_is_one_based() {
        assert_eq!(number_lines("a\nb"), "   1: a\n   2: b\n");
    }
}
