//! Applying a parsed `.glint` manifest to a context.
//!
//! Shaders and programs go into a [`ShaderRegistry`]; textures are decoded by
//! a caller-supplied [`ImageDecoder`] and uploaded. Cubemap and model
//! declarations are handed back untouched for whoever owns scenes.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use glint_script::ast::{CubemapDecl, ModelDecl, TextureDecl};
use glint_script::{Manifest, TextureFlag};

use crate::backend::{TextureFilter, TextureWrap};
use crate::context::GpuContext;
use crate::shader::{ProgramId, ShaderId, ShaderRegistry, ShaderStage};
use crate::texture::{PixelData, Texture2d};

/// Produces raw pixels for a texture path.
pub trait ImageDecoder {
    fn decode(&self, path: &str) -> Result<PixelData>;
}

/// What [`load_manifest`] created.
#[derive(Debug, Default)]
pub struct LoadedAssets {
    pub shaders: Vec<ShaderId>,
    pub programs: Vec<ProgramId>,
    pub textures: BTreeMap<String, Texture2d>,
    /// Texture name → reason it could not be loaded.
    pub failed_textures: BTreeMap<String, String>,
    pub cubemaps: Vec<CubemapDecl>,
    pub models: Vec<ModelDecl>,
}

/// Reads and parses a manifest file.
pub fn read_manifest(path: &Path) -> Result<Manifest> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("failed to read manifest {}", path.display()))?;
    glint_script::parse_str(&text).with_context(|| format!("failed to parse manifest {}", path.display()))
}

/// Registers, compiles and links everything `manifest` declares.
///
/// Compile and link failures land in the registry's error index, and texture
/// decode failures in [`LoadedAssets::failed_textures`]; neither aborts the
/// load. A program naming an undeclared shader does.
pub fn load_manifest(
    ctx: &GpuContext,
    registry: &mut ShaderRegistry,
    decoder: &dyn ImageDecoder,
    manifest: &Manifest,
) -> Result<LoadedAssets> {
    let mut out = LoadedAssets::default();

    for skipped in &manifest.skipped {
        log::warn!("manifest: unknown section <{}> at line {} skipped", skipped.tag, skipped.line);
    }

    for decl in &manifest.shaders {
        let id = registry.add_shader(&decl.name, ShaderStage::from(decl.stage), &decl.path);
        registry.load_shader(id);
        out.shaders.push(id);
    }

    for decl in &manifest.programs {
        let shaders = decl
            .shaders
            .iter()
            .map(|name| {
                registry.shader_id(name).with_context(|| {
                    format!("program `{}` (line {}) names undeclared shader `{}`", decl.name, decl.line, name)
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let id = registry
            .add_program(&decl.name, &shaders)
            .with_context(|| format!("program `{}` (line {})", decl.name, decl.line))?;
        registry.link_program(id)?;
        out.programs.push(id);
    }

    for decl in &manifest.textures {
        match load_texture(ctx, decoder, decl) {
            Ok(texture) => {
                out.textures.insert(decl.name.clone(), texture);
            }
            Err(e) => {
                log::error!("texture `{}`: {:#}", decl.name, e);
                out.failed_textures.insert(decl.name.clone(), format!("{:#}", e));
            }
        }
    }

    out.cubemaps = manifest.cubemaps.clone();
    out.models = manifest.models.clone();
    log::info!(
        "manifest loaded: {} shaders, {} programs, {} textures ({} failed)",
        out.shaders.len(),
        out.programs.len(),
        out.textures.len(),
        out.failed_textures.len()
    );
    Ok(out)
}

fn load_texture(ctx: &GpuContext, decoder: &dyn ImageDecoder, decl: &TextureDecl) -> Result<Texture2d> {
    let pixels = decoder.decode(&decl.path).with_context(|| format!("decoding {}", decl.path))?;
    let mut texture = Texture2d::from_pixels(ctx, &pixels, decl.has_flag(TextureFlag::Mipmaps))?;

    for flag in &decl.flags {
        match flag {
            TextureFlag::Nearest => texture.set_filtering(TextureFilter::Nearest, TextureFilter::Nearest),
            TextureFlag::Linear => texture.set_filtering(TextureFilter::Linear, TextureFilter::Linear),
            TextureFlag::Clamp => texture.set_wrap(TextureWrap::ClampToEdge),
            TextureFlag::Repeat => texture.set_wrap(TextureWrap::Repeat),
            TextureFlag::Mirror => texture.set_wrap(TextureWrap::MirroredRepeat),
            TextureFlag::Mipmaps => {}
        }
    }
    Ok(texture)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;
    use crate::context::ContextConfig;
    use crate::shader::MemorySources;

    struct Checkerboard;

    impl ImageDecoder for Checkerboard {
        fn decode(&self, path: &str) -> Result<PixelData> {
            anyhow::ensure!(path.ends_with(".png"), "unsupported image {}", path);
            Ok(PixelData::new(2, 2, 4, vec![255; 16])?)
        }
    }

    const MANIFEST: &str = "\
<shaders>
    vertex   quad_vs  quad.vert
    fragment quad_fs  quad.frag
</shaders>
<programs>
    quad quad_vs quad_fs
</programs>
<textures>
    albedo  albedo.png mipmaps clamp
    broken  broken.tga
</textures>
<lights>
    sun 1 1 1
</lights>
<models>
    crate crate.obj
</models>
";

    fn setup() -> (GpuContext, ShaderRegistry) {
        let ctx = GpuContext::new(HeadlessBackend::new(), ContextConfig::default());
        let sources = MemorySources::new()
            .with("quad.vert", "void main() { gl_Position = vec4(0.0); }")
            .with("quad.frag", "uniform sampler2D albedo;\nvoid main() { color = texture(albedo, uv); }");
        let registry = ShaderRegistry::new(&ctx, sources);
        (ctx, registry)
    }

    #[test]
    fn loads_every_section() {
        let (ctx, mut registry) = setup();
        let manifest = glint_script::parse_str(MANIFEST).unwrap();
        let loaded = load_manifest(&ctx, &mut registry, &Checkerboard, &manifest).unwrap();

        assert_eq!(loaded.shaders.len(), 2);
        assert!(registry.program(loaded.programs[0]).unwrap().has_uniform("albedo"));
        assert!(loaded.textures["albedo"].has_mipmaps());
        assert!(loaded.failed_textures.contains_key("broken"));
        assert_eq!(loaded.models[0].name, "crate");
    }

    #[test]
    fn undeclared_shader_aborts() {
        let (ctx, mut registry) = setup();
        let manifest = glint_script::parse_str("<programs>\n  p ghost\n</programs>\n").unwrap();
        let err = load_manifest(&ctx, &mut registry, &Checkerboard, &manifest).unwrap_err();
        assert!(format!("{:#}", err).contains("undeclared shader `ghost`"));
    }
}
