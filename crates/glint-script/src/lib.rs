//! Lexer, parser, and AST for the **glint asset manifest** (`.glint`).
//!
//! This crate is intentionally dependency-free so it can be consumed by
//! tooling without pulling in the GPU layer.
//!
//! # Format
//!
//! Sections are delimited by tag lines; inside a section every non-empty line
//! is one declaration made of whitespace-separated words. `#` and `//` start
//! comments. Sections with unknown tags are skipped, not rejected.
//!
//! ```text
//! <shaders>
//!     vertex   basic_vs  shaders/basic.vert
//!     fragment basic_fs  shaders/basic.frag
//! </shaders>
//! <programs>
//!     basic basic_vs basic_fs
//! </programs>
//! <textures>
//!     albedo textures/albedo.png mipmaps repeat
//! </textures>
//! ```
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`ast`] | `Manifest` and the per-section declarations |
//! | [`error`] | `ParseError` |
//! | [`lexer`] | `Lexer`, `Token` |
//! | [`parser`] | `parse_str` entry point |
//!
//! # Quick start
//!
//! ```rust
//! use glint_script::parse_str;
//!
//! let src = "<programs>\n  basic basic_vs basic_fs\n</programs>\n";
//! let manifest = parse_str(src).unwrap();
//! assert_eq!(manifest.programs[0].shaders, ["basic_vs", "basic_fs"]);
//! ```

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;

pub use ast::{Manifest, StageKeyword, TextureFlag};
pub use error::ParseError;
pub use parser::parse_str;

#[cfg(test)]
mod parse_tests {
    use super::*;

    fn ok(src: &str) -> Manifest { parse_str(src).unwrap() }
    fn err(src: &str) -> ParseError { parse_str(src).unwrap_err() }

    #[test] fn empty_source() { assert!(ok("").is_empty()); }
    #[test] fn empty_section() { assert!(ok("<shaders>\n</shaders>\n").is_empty()); }

    #[test]
    fn full_manifest() {
        let m = ok(r#"
# demo scene
<shaders>
    vertex   basic_vs  shaders/basic.vert
    frag     basic_fs  "shaders/basic lit.frag"
    compute  cull      shaders/cull.comp
</shaders>

<programs>
    basic basic_vs basic_fs
    culling cull
</programs>

<textures>
    albedo textures/albedo.png mipmaps repeat
    lut    textures/lut.png nearest clamp
</textures>

<cubemaps>
    sky px.png nx.png py.png ny.png pz.png nz.png
</cubemaps>

<models>
    crate models/crate.obj
</models>
"#);
        assert_eq!(m.shaders.len(), 3);
        assert_eq!(m.shaders[1].stage, StageKeyword::Fragment);
        assert_eq!(m.shaders[1].path, "shaders/basic lit.frag");
        assert_eq!(m.programs[1].shaders, ["cull"]);
        assert!(m.textures[0].has_flag(TextureFlag::Mipmaps));
        assert!(m.textures[1].has_flag(TextureFlag::Clamp));
        assert_eq!(m.cubemaps[0].faces[5], "nz.png");
        assert_eq!(m.models[0].name, "crate");
        assert_eq!(m.len(), 9);
    }

    #[test]
    fn declarations_remember_their_line() {
        let m = ok("\n<programs>\n\n  p a b\n</programs>\n");
        assert_eq!(m.programs[0].line, 4);
    }

    #[test]
    fn unknown_section_is_skipped() {
        let m = ok("<lights>\n sun 1 2 3\n <weird>\n</lights>\n<models>\n m a.obj\n</models>\n");
        assert_eq!(m.skipped.len(), 1);
        assert_eq!(m.skipped[0].tag, "lights");
        assert_eq!(m.models.len(), 1);
    }

    #[test] fn tags_are_case_insensitive() { ok("<SHADERS>\n vertex v v.vert\n</Shaders>\n"); }

    #[test]
    fn err_unknown_stage() {
        let e = err("<shaders>\n  pixel ps p.glsl\n</shaders>\n");
        assert_eq!((e.line, e.col), (2, 3));
    }

    #[test] fn err_shader_arity() { err("<shaders>\n vertex only_name\n</shaders>\n"); }
    #[test] fn err_program_without_shaders() { err("<programs>\n lonely\n</programs>\n"); }
    #[test] fn err_unknown_texture_flag() { err("<textures>\n t t.png shiny\n</textures>\n"); }
    #[test] fn err_cubemap_needs_six_faces() { err("<cubemaps>\n sky a b c\n</cubemaps>\n"); }
    #[test] fn err_unclosed_section() { err("<models>\n m a.obj\n"); }
    #[test] fn err_unclosed_unknown_section() { err("<lights>\n sun\n"); }
    #[test] fn err_mismatched_close() { err("<models>\n</shaders>\n"); }
    #[test] fn err_nested_section() { err("<models>\n<shaders>\n</shaders>\n</models>\n"); }
    #[test] fn err_words_outside_section() { err("vertex v v.vert\n"); }
    #[test] fn err_stray_close() { err("</models>\n"); }
}
