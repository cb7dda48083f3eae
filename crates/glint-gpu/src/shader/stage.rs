use std::fmt;

/// Programmable pipeline stage a [`Shader`](super::Shader) compiles for.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum ShaderStage {
    Vertex,
    TessControl,
    TessEvaluation,
    Geometry,
    Fragment,
    Compute,
}

impl ShaderStage {
    pub const ALL: [ShaderStage; 6] = [
        ShaderStage::Vertex,
        ShaderStage::TessControl,
        ShaderStage::TessEvaluation,
        ShaderStage::Geometry,
        ShaderStage::Fragment,
        ShaderStage::Compute,
    ];

    /// Human-readable stage name used in diagnostics.
    pub const fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::TessControl => "tessellation control",
            ShaderStage::TessEvaluation => "tessellation evaluation",
            ShaderStage::Geometry => "geometry",
            ShaderStage::Fragment => "fragment",
            ShaderStage::Compute => "compute",
        }
    }

    /// Conventional source file extension.
    pub const fn extension(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vert",
            ShaderStage::TessControl => "tesc",
            ShaderStage::TessEvaluation => "tese",
            ShaderStage::Geometry => "geom",
            ShaderStage::Fragment => "frag",
            ShaderStage::Compute => "comp",
        }
    }

    /// Guesses the stage from a path's extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.extension().eq_ignore_ascii_case(ext))
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<glint_script::StageKeyword> for ShaderStage {
    fn from(kw: glint_script::StageKeyword) -> Self {
        use glint_script::StageKeyword as K;
        match kw {
            K::Vertex => ShaderStage::Vertex,
            K::Fragment => ShaderStage::Fragment,
            K::Geometry => ShaderStage::Geometry,
            K::TessControl => ShaderStage::TessControl,
            K::TessEvaluation => ShaderStage::TessEvaluation,
            K::Compute => ShaderStage::Compute,
        }
    }
}
