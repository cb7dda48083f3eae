//! Manifest AST.
//!
//! Every declaration keeps the 1-based source line it came from so loaders can
//! point diagnostics back at the manifest.

/// Parsed `.glint` manifest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    pub shaders: Vec<ShaderDecl>,
    pub programs: Vec<ProgramDecl>,
    pub textures: Vec<TextureDecl>,
    pub cubemaps: Vec<CubemapDecl>,
    pub models: Vec<ModelDecl>,
    /// Sections with unrecognized tags. Their bodies are not interpreted.
    pub skipped: Vec<SkippedSection>,
}

impl Manifest {
    /// Total number of declarations across all known sections.
    pub fn len(&self) -> usize {
        self.shaders.len()
            + self.programs.len()
            + self.textures.len()
            + self.cubemaps.len()
            + self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shader stage keyword as written in the `<shaders>` section.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum StageKeyword {
    Vertex,
    Fragment,
    Geometry,
    TessControl,
    TessEvaluation,
    Compute,
}

impl StageKeyword {
    /// Accepts long names and the conventional file-extension short forms.
    pub fn parse(word: &str) -> Option<Self> {
        Some(match word {
            "vertex" | "vert" => Self::Vertex,
            "fragment" | "frag" => Self::Fragment,
            "geometry" | "geom" => Self::Geometry,
            "tess_control" | "tesc" => Self::TessControl,
            "tess_evaluation" | "tese" => Self::TessEvaluation,
            "compute" | "comp" => Self::Compute,
            _ => return None,
        })
    }
}

/// `<stage> <name> <path>`
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderDecl {
    pub stage: StageKeyword,
    pub name: String,
    pub path: String,
    pub line: usize,
}

/// `<name> <shader> [<shader> ...]`
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramDecl {
    pub name: String,
    pub shaders: Vec<String>,
    pub line: usize,
}

/// Texture sampling flag following the path in `<textures>`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TextureFlag {
    Mipmaps,
    Nearest,
    Linear,
    Clamp,
    Repeat,
    Mirror,
}

impl TextureFlag {
    pub fn parse(word: &str) -> Option<Self> {
        Some(match word {
            "mipmaps" => Self::Mipmaps,
            "nearest" => Self::Nearest,
            "linear" => Self::Linear,
            "clamp" => Self::Clamp,
            "repeat" => Self::Repeat,
            "mirror" => Self::Mirror,
            _ => return None,
        })
    }
}

/// `<name> <path> [flag ...]`
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDecl {
    pub name: String,
    pub path: String,
    pub flags: Vec<TextureFlag>,
    pub line: usize,
}

impl TextureDecl {
    #[inline]
    pub fn has_flag(&self, flag: TextureFlag) -> bool {
        self.flags.contains(&flag)
    }
}

/// `<name> <+x> <-x> <+y> <-y> <+z> <-z>`
#[derive(Debug, Clone, PartialEq)]
pub struct CubemapDecl {
    pub name: String,
    pub faces: [String; 6],
    pub line: usize,
}

/// `<name> <path>`
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDecl {
    pub name: String,
    pub path: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSection {
    pub tag: String,
    pub line: usize,
}
