//! Declaration-level GLSL "compiler" for the headless backend.
//!
//! It does not generate code. It checks the structural things a driver would
//! reject early (comments, `#error`, leftover `#include`, braces) and extracts
//! the declarations reflection cares about: plain uniforms, uniform blocks,
//! subroutine types/uniforms/functions, and whether `main` is defined.
//! Diagnostics use the `0(<line>) : error: <message>` shape of common drivers.

use rustc_hash::FxHashSet;

use crate::backend::gl;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DeclaredUniform {
    pub name: String,
    pub gl_type: u32,
    /// `0` for non-array uniforms.
    pub array_len: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DeclaredBlock {
    pub name: String,
    pub members: Vec<DeclaredUniform>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DeclaredSubroutineUniform {
    pub name: String,
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DeclaredSubroutine {
    pub name: String,
    pub types: Vec<String>,
}

/// Result of a successful compile.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct CompiledModule {
    /// Active (referenced) uniforms outside blocks.
    pub uniforms: Vec<DeclaredUniform>,
    /// Active uniform blocks.
    pub blocks: Vec<DeclaredBlock>,
    pub subroutine_uniforms: Vec<DeclaredSubroutineUniform>,
    pub subroutines: Vec<DeclaredSubroutine>,
    pub has_main: bool,
}

// ── tokens ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Number(String),
    Punct(char),
}

#[derive(Debug, Clone)]
struct Spanned {
    tok: Tok,
    line: usize,
}

fn diag(line: usize, msg: impl AsRef<str>) -> String {
    format!("0({}) : error: {}", line, msg.as_ref())
}

/// Replaces comments with spaces, keeping newlines so line numbers survive.
fn strip_comments(src: &str) -> Result<String, String> {
    let mut out = String::with_capacity(src.len());
    let mut chars = src.chars().peekable();
    let mut line = 1;

    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('/', Some('/')) => {
                while let Some(&n) = chars.peek() {
                    if n == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            ('/', Some('*')) => {
                let start = line;
                chars.next();
                let mut closed = false;
                while let Some(n) = chars.next() {
                    if n == '\n' {
                        line += 1;
                        out.push('\n');
                    } else if n == '*' && chars.peek() == Some(&'/') {
                        chars.next();
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    return Err(diag(start, "unterminated comment"));
                }
                out.push(' ');
            }
            _ => {
                if c == '\n' {
                    line += 1;
                }
                out.push(c);
            }
        }
    }
    Ok(out)
}

fn tokenize(src: &str) -> Result<Vec<Spanned>, String> {
    let mut toks = Vec::new();

    for (idx, raw) in src.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim_start();
        if let Some(directive) = trimmed.strip_prefix('#') {
            let directive = directive.trim_start();
            if let Some(rest) = directive.strip_prefix("error") {
                return Err(diag(line, format!("#error{}", rest)));
            }
            if directive.starts_with("include") {
                return Err(diag(line, "'#include' : unexpanded include directive"));
            }
            continue;
        }

        let bytes: Vec<char> = raw.chars().collect();
        let mut i = 0;
        while i < bytes.len() {
            let c = bytes[i];
            if c.is_whitespace() {
                i += 1;
            } else if c.is_ascii_alphabetic() || c == '_' {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == '_') {
                    i += 1;
                }
                toks.push(Spanned { tok: Tok::Ident(bytes[start..i].iter().collect()), line });
            } else if c.is_ascii_digit() {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == '.') {
                    i += 1;
                }
                toks.push(Spanned { tok: Tok::Number(bytes[start..i].iter().collect()), line });
            } else {
                toks.push(Spanned { tok: Tok::Punct(c), line });
                i += 1;
            }
        }
    }
    Ok(toks)
}

fn check_braces(toks: &[Spanned], last_line: usize) -> Result<(), String> {
    let mut depth = 0usize;
    for t in toks {
        match t.tok {
            Tok::Punct('{') => depth += 1,
            Tok::Punct('}') => {
                if depth == 0 {
                    return Err(diag(t.line, "'}' : syntax error, unexpected '}'"));
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(diag(last_line, "syntax error, unexpected end of file"));
    }
    Ok(())
}

/// GL type code for a GLSL uniform type name.
pub(crate) fn type_code(name: &str) -> Option<u32> {
    Some(match name {
        "float" => gl::FLOAT,
        "vec2" => gl::FLOAT_VEC2,
        "vec3" => gl::FLOAT_VEC3,
        "vec4" => gl::FLOAT_VEC4,
        "int" => gl::INT,
        "ivec2" => gl::INT_VEC2,
        "ivec3" => gl::INT_VEC3,
        "ivec4" => gl::INT_VEC4,
        "uint" => gl::UNSIGNED_INT,
        "uvec2" => gl::UNSIGNED_INT_VEC2,
        "uvec3" => gl::UNSIGNED_INT_VEC3,
        "uvec4" => gl::UNSIGNED_INT_VEC4,
        "bool" => gl::BOOL,
        "bvec2" => gl::BOOL_VEC2,
        "bvec3" => gl::BOOL_VEC3,
        "bvec4" => gl::BOOL_VEC4,
        "double" => gl::DOUBLE,
        "dvec2" => gl::DOUBLE_VEC2,
        "dvec3" => gl::DOUBLE_VEC3,
        "dvec4" => gl::DOUBLE_VEC4,
        "mat2" | "mat2x2" => gl::FLOAT_MAT2,
        "mat3" | "mat3x3" => gl::FLOAT_MAT3,
        "mat4" | "mat4x4" => gl::FLOAT_MAT4,
        "dmat2" => gl::DOUBLE_MAT2,
        "dmat3" => gl::DOUBLE_MAT3,
        "dmat4" => gl::DOUBLE_MAT4,
        "sampler2D" => gl::SAMPLER_2D,
        "sampler3D" => gl::SAMPLER_3D,
        "samplerCube" => gl::SAMPLER_CUBE,
        "sampler2DShadow" => gl::SAMPLER_2D_SHADOW,
        "sampler2DArray" => gl::SAMPLER_2D_ARRAY,
        "isampler2D" => gl::INT_SAMPLER_2D,
        "usampler2D" => gl::UNSIGNED_INT_SAMPLER_2D,
        "image2D" => gl::IMAGE_2D,
        _ => return None,
    })
}

const PRECISION: [&str; 3] = ["lowp", "mediump", "highp"];

// ── scanner ───────────────────────────────────────────────────────────────

struct Scanner<'t> {
    toks: &'t [Spanned],
    pos: usize,
    /// Token indices that are declaration names, excluded from reference counting.
    decl_sites: FxHashSet<usize>,
    module: CompiledModule,
    /// Every declared uniform (active or not) with its name-token index.
    uniforms: Vec<DeclaredUniform>,
    blocks: Vec<(DeclaredBlock, Option<String>)>,
    subroutine_types: Vec<String>,
}

impl<'t> Scanner<'t> {
    fn new(toks: &'t [Spanned]) -> Self {
        Self {
            toks,
            pos: 0,
            decl_sites: FxHashSet::default(),
            module: CompiledModule::default(),
            uniforms: Vec::new(),
            blocks: Vec::new(),
            subroutine_types: Vec::new(),
        }
    }

    fn peek(&self, offset: usize) -> Option<&Tok> {
        self.toks.get(self.pos + offset).map(|t| &t.tok)
    }

    fn line(&self) -> usize {
        self.toks
            .get(self.pos)
            .or_else(|| self.toks.last())
            .map_or(1, |t| t.line)
    }

    fn is_ident(&self, offset: usize, word: &str) -> bool {
        matches!(self.peek(offset), Some(Tok::Ident(w)) if w == word)
    }

    fn is_punct(&self, offset: usize, c: char) -> bool {
        matches!(self.peek(offset), Some(Tok::Punct(p)) if *p == c)
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, String> {
        match self.peek(0) {
            Some(Tok::Ident(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            other => Err(diag(self.line(), format!("syntax error, expected {}, found {:?}", what, other))),
        }
    }

    fn expect_punct(&mut self, c: char) -> Result<(), String> {
        if self.is_punct(0, c) {
            self.pos += 1;
            Ok(())
        } else {
            Err(diag(self.line(), format!("syntax error, expected '{}'", c)))
        }
    }

    /// Skips a balanced `( ... )` group starting at the current token.
    fn skip_parens(&mut self) {
        let mut depth = 0usize;
        while let Some(tok) = self.peek(0).cloned() {
            self.pos += 1;
            match tok {
                Tok::Punct('(') => depth += 1,
                Tok::Punct(')') => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }

    /// Optional `[N]`; returns 0 when absent.
    fn array_suffix(&mut self) -> Result<u32, String> {
        if !self.is_punct(0, '[') {
            return Ok(0);
        }
        self.pos += 1;
        let len = match self.peek(0) {
            Some(Tok::Number(n)) => n.trim_end_matches(['u', 'U']).parse::<u32>().unwrap_or(1),
            // constant expressions are not evaluated
            _ => 1,
        };
        while !self.is_punct(0, ']') {
            if self.peek(0).is_none() {
                return Err(diag(self.line(), "syntax error, unterminated array size"));
            }
            self.pos += 1;
        }
        self.pos += 1;
        Ok(len.max(1))
    }

    fn skip_precision(&mut self) {
        while PRECISION.iter().any(|p| self.is_ident(0, p)) {
            self.pos += 1;
        }
    }

    fn scan(mut self) -> Result<CompiledModule, String> {
        let mut depth = 0usize;

        while let Some(tok) = self.peek(0).cloned() {
            match tok {
                Tok::Punct('{') => {
                    depth += 1;
                    self.pos += 1;
                }
                Tok::Punct('}') => {
                    depth = depth.saturating_sub(1);
                    self.pos += 1;
                }
                Tok::Ident(ref word) if depth == 0 => match word.as_str() {
                    "layout" => {
                        self.pos += 1;
                        self.skip_parens();
                    }
                    "uniform" => {
                        self.pos += 1;
                        self.uniform_decl()?;
                    }
                    "subroutine" => {
                        self.pos += 1;
                        self.subroutine_decl()?;
                    }
                    "main" if self.is_punct(1, '(') => {
                        self.module.has_main = true;
                        self.pos += 1;
                    }
                    _ => self.pos += 1,
                },
                _ => self.pos += 1,
            }
        }

        self.finish()
    }

    fn uniform_decl(&mut self) -> Result<(), String> {
        self.skip_precision();

        // `uniform Block { ... } [instance[N]];`
        if matches!(self.peek(0), Some(Tok::Ident(_))) && self.is_punct(1, '{') {
            let name = self.expect_ident("block name")?;
            self.pos += 1; // `{`
            let mut members = Vec::new();
            while !self.is_punct(0, '}') {
                if self.peek(0).is_none() {
                    return Err(diag(self.line(), "syntax error, unexpected end of file"));
                }
                if self.is_ident(0, "layout") {
                    self.pos += 1;
                    self.skip_parens();
                    continue;
                }
                self.skip_precision();
                let ty = self.expect_ident("member type")?;
                let gl_type = type_code(&ty)
                    .ok_or_else(|| diag(self.line(), format!("'{}' : unknown uniform type", ty)))?;
                loop {
                    self.decl_sites.insert(self.pos);
                    let member = self.expect_ident("member name")?;
                    let array_len = self.array_suffix()?;
                    members.push(DeclaredUniform { name: member, gl_type, array_len });
                    if self.is_punct(0, ',') {
                        self.pos += 1;
                        continue;
                    }
                    break;
                }
                self.expect_punct(';')?;
            }
            self.pos += 1; // `}`

            let instance = if let Some(Tok::Ident(inst)) = self.peek(0) {
                let inst = inst.clone();
                self.decl_sites.insert(self.pos);
                self.pos += 1;
                self.array_suffix()?;
                Some(inst)
            } else {
                None
            };
            self.expect_punct(';')?;
            self.blocks.push((DeclaredBlock { name, members }, instance));
            return Ok(());
        }

        // `uniform T a[, b[N]] [= init];`
        let ty = self.expect_ident("uniform type")?;
        let gl_type =
            type_code(&ty).ok_or_else(|| diag(self.line(), format!("'{}' : unknown uniform type", ty)))?;
        loop {
            self.decl_sites.insert(self.pos);
            let name = self.expect_ident("uniform name")?;
            let array_len = self.array_suffix()?;
            self.uniforms.push(DeclaredUniform { name, gl_type, array_len });

            // initializers are skipped up to the next declarator
            while !self.is_punct(0, ',') && !self.is_punct(0, ';') {
                if self.peek(0).is_none() {
                    return Err(diag(self.line(), "syntax error, expected ';'"));
                }
                self.pos += 1;
            }
            if self.is_punct(0, ',') {
                self.pos += 1;
                continue;
            }
            break;
        }
        self.expect_punct(';')
    }

    fn subroutine_decl(&mut self) -> Result<(), String> {
        // `subroutine uniform Type name;`
        if self.is_ident(0, "uniform") {
            self.pos += 1;
            let type_name = self.expect_ident("subroutine type")?;
            if !self.subroutine_types.contains(&type_name) {
                return Err(diag(
                    self.line(),
                    format!("'{}' : undeclared subroutine type", type_name),
                ));
            }
            self.decl_sites.insert(self.pos);
            let name = self.expect_ident("subroutine uniform name")?;
            self.array_suffix()?;
            self.expect_punct(';')?;
            self.module.subroutine_uniforms.push(DeclaredSubroutineUniform { name, type_name });
            return Ok(());
        }

        // `subroutine(TypeA, TypeB) ret name(...) { ... }`
        if self.is_punct(0, '(') {
            self.pos += 1;
            let mut types = Vec::new();
            loop {
                let ty = self.expect_ident("subroutine type")?;
                if !self.subroutine_types.contains(&ty) {
                    return Err(diag(self.line(), format!("'{}' : undeclared subroutine type", ty)));
                }
                types.push(ty);
                if self.is_punct(0, ',') {
                    self.pos += 1;
                    continue;
                }
                break;
            }
            self.expect_punct(')')?;
            self.expect_ident("return type")?;
            let name = self.expect_ident("function name")?;
            self.module.subroutines.push(DeclaredSubroutine { name, types });
            return Ok(());
        }

        // `subroutine ret Type(params);`
        self.expect_ident("return type")?;
        let type_name = self.expect_ident("subroutine type name")?;
        self.subroutine_types.push(type_name);
        Ok(())
    }

    fn referenced(&self, name: &str) -> bool {
        self.toks.iter().enumerate().any(|(idx, t)| {
            !self.decl_sites.contains(&idx) && matches!(&t.tok, Tok::Ident(w) if w == name)
        })
    }

    fn finish(mut self) -> Result<CompiledModule, String> {
        let uniforms = std::mem::take(&mut self.uniforms);
        self.module.uniforms = uniforms.into_iter().filter(|u| self.referenced(&u.name)).collect();

        let blocks = std::mem::take(&mut self.blocks);
        self.module.blocks = blocks
            .into_iter()
            .filter(|(block, instance)| {
                instance.as_deref().is_some_and(|i| self.referenced(i))
                    || block.members.iter().any(|m| self.referenced(&m.name))
            })
            .map(|(block, _)| block)
            .collect();

        Ok(self.module)
    }
}

/// Compiles `source`, returning the declarations or a driver-style info log.
pub(crate) fn compile(source: &str) -> Result<CompiledModule, String> {
    let stripped = strip_comments(source)?;
    let last_line = stripped.lines().count().max(1);
    let toks = tokenize(&stripped)?;
    check_braces(&toks, last_line)?;
    Scanner::new(&toks).scan()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIT: &str = r#"
#version 410 core
uniform mat4 u_mvp;
uniform vec4 u_tint;          // referenced below
uniform float u_unused;       /* never read */
uniform sampler2D u_albedo;
uniform vec3 u_lights[4];

layout(std140) uniform Lights_3 {
    vec4 light_color;
    float light_power;
};

subroutine vec4 ShadeFn(vec3 n);
subroutine uniform ShadeFn u_shade;
subroutine(ShadeFn) vec4 flat_shade(vec3 n) { return u_tint; }
subroutine(ShadeFn) vec4 lit_shade(vec3 n) { return light_color * light_power; }

void main() {
    vec4 c = texture(u_albedo, vec2(0.0)) * u_shade(vec3(u_lights[0]));
    gl_Position = u_mvp * c;
}
"#;

    #[test]
    fn extracts_declarations() {
        let m = compile(LIT).unwrap();
        let names: Vec<_> = m.uniforms.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["u_mvp", "u_tint", "u_albedo", "u_lights"]);
        assert_eq!(m.uniforms[3].array_len, 4);
        assert_eq!(m.uniforms[2].gl_type, gl::SAMPLER_2D);
        assert_eq!(m.blocks.len(), 1);
        assert_eq!(m.blocks[0].name, "Lights_3");
        assert_eq!(m.subroutine_uniforms[0].type_name, "ShadeFn");
        assert_eq!(m.subroutines.len(), 2);
        assert!(m.has_main);
    }

    #[test]
    fn unreferenced_uniform_is_inactive() {
        let m = compile(LIT).unwrap();
        assert!(m.uniforms.iter().all(|u| u.name != "u_unused"));
    }

    #[test]
    fn unreferenced_block_is_inactive() {
        let src = "uniform Fog { float density; };\nvoid main() {}\n";
        assert!(compile(src).unwrap().blocks.is_empty());
    }

    #[test]
    fn error_directive_reports_line() {
        let err = compile("#version 330\n\n#error not supported\nvoid main(){}").unwrap_err();
        assert!(err.starts_with("0(3) : error:"), "{err}");
    }

    #[test]
    fn leftover_include_is_rejected() {
        assert!(compile("#include \"common.glsl\"\nvoid main(){}").is_err());
    }

    #[test]
    fn unbalanced_braces() {
        assert!(compile("void main() {").unwrap_err().contains("end of file"));
        assert!(compile("void main() {}}").unwrap_err().starts_with("0(1)"));
    }

    #[test]
    fn unknown_uniform_type() {
        let err = compile("uniform Material mat;\nvoid main(){ mat; }").unwrap_err();
        assert!(err.contains("unknown uniform type"));
    }

    #[test]
    fn undeclared_subroutine_type() {
        assert!(compile("subroutine uniform Missing sel;\nvoid main(){}").is_err());
    }

    #[test]
    fn unterminated_comment() {
        assert!(compile("/* oops\nvoid main(){}").is_err());
    }

    #[test]
    fn missing_main_compiles() {
        let m = compile("float helper() { return 1.0; }").unwrap();
        assert!(!m.has_main);
    }
}
