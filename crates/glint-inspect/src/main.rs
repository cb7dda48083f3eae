//! `glint-inspect <manifest> [--root DIR] [--verbose]`
//!
//! Loads a `.glint` manifest on the headless backend and reports every shader
//! that fails to compile, every program that fails to link, and what each
//! linked program reflects. Exits with status 1 when anything is broken.

use std::fmt::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use glint_gpu::assets::{ImageDecoder, LoadedAssets, load_manifest, read_manifest};
use glint_gpu::backend::HeadlessBackend;
use glint_gpu::logging::{LoggingConfig, init_logging};
use glint_gpu::shader::FsSources;
use glint_gpu::texture::PixelData;
use glint_gpu::{ContextConfig, GpuContext, ShaderRegistry};

struct Args {
    manifest: PathBuf,
    root: Option<PathBuf>,
    verbose: bool,
}

fn parse_args() -> Result<Args> {
    let mut manifest = None;
    let mut root = None;
    let mut verbose = false;

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--root" => root = Some(PathBuf::from(it.next().context("--root expects a directory")?)),
            "-v" | "--verbose" => verbose = true,
            "-h" | "--help" => {
                println!("usage: glint-inspect <manifest> [--root DIR] [--verbose]");
                std::process::exit(0);
            }
            flag if flag.starts_with('-') => bail!("unknown option `{}`", flag),
            path => {
                if manifest.replace(PathBuf::from(path)).is_some() {
                    bail!("only one manifest may be given");
                }
            }
        }
    }
    let manifest = manifest.context("usage: glint-inspect <manifest> [--root DIR] [--verbose]")?;
    Ok(Args { manifest, root, verbose })
}

/// Decodes textures with the `image` crate, relative to the asset root.
struct FileDecoder {
    root: PathBuf,
}

impl ImageDecoder for FileDecoder {
    fn decode(&self, path: &str) -> Result<PixelData> {
        let full = self.root.join(path);
        let img = image::open(&full).with_context(|| format!("failed to open {}", full.display()))?;
        let (width, height) = (img.width(), img.height());
        let (channels, bytes) = match img.color().channel_count() {
            1 => (1, img.into_luma8().into_raw()),
            2 => (2, img.into_luma_alpha8().into_raw()),
            3 => (3, img.into_rgb8().into_raw()),
            _ => (4, img.into_rgba8().into_raw()),
        };
        Ok(PixelData::new(width, height, channels, bytes)?)
    }
}

fn write_report(out: &mut impl Write, registry: &ShaderRegistry, assets: &LoadedAssets, verbose: bool) -> fmt::Result {
    writeln!(
        out,
        "{} shaders, {} programs, {} textures",
        registry.shader_count(),
        registry.program_count(),
        assets.textures.len() + assets.failed_textures.len()
    )?;

    for err in registry.shader_errors().values() {
        writeln!(out, "\nBROKEN SHADER {} ({} stage, {})", err.name, err.stage, err.path)?;
        writeln!(out, "{}", err.log.trim_end())?;
        if !err.numbered_source.is_empty() {
            write_excerpt(out, &err.numbered_source, &err.log)?;
        }
    }

    for id in registry.failed_programs() {
        let Some(program) = registry.program(*id) else { continue };
        writeln!(out, "\nFAILED PROGRAM {}", program.name())?;
        writeln!(out, "{}", program.log().trim_end())?;
    }

    for (name, reason) in &assets.failed_textures {
        writeln!(out, "\nFAILED TEXTURE {}: {}", name, reason)?;
    }

    writeln!(out)?;
    for (_, program) in registry.programs() {
        if !program.is_linked() {
            continue;
        }
        writeln!(
            out,
            "program {:<24} {} uniforms, {} blocks, {} subroutine stages",
            program.name(),
            program.uniform_count(),
            program.block_count(),
            program.subroutine_stage_count()
        )?;
        for issue in program.config_errors() {
            writeln!(out, "    warning: {}", issue)?;
        }
        if verbose {
            for name in program.uniform_names() {
                if let Some(u) = program.uniform(name) {
                    writeln!(out, "    uniform {:<20} {} @ {}", name, u.kind(), u.location())?;
                }
            }
            for (name, block) in program.blocks() {
                match block.binding {
                    Some(binding) => writeln!(out, "    block   {:<20} binding {}", name, binding)?,
                    None => writeln!(out, "    block   {:<20} unbound", name)?,
                }
            }
        }
    }

    if !assets.cubemaps.is_empty() || !assets.models.is_empty() {
        writeln!(
            out,
            "\n{} cubemaps and {} models declared (not loaded)",
            assets.cubemaps.len(),
            assets.models.len()
        )?;
    }
    Ok(())
}

/// Numbered source lines around each line the log points at (`0(N) : ...`).
fn write_excerpt(out: &mut impl Write, numbered: &str, log: &str) -> fmt::Result {
    let lines: Vec<&str> = numbered.lines().collect();
    let mut wanted: Vec<usize> = log
        .lines()
        .filter_map(|l| l.strip_prefix("0(")?.split(')').next()?.parse().ok())
        .collect();
    wanted.sort_unstable();
    wanted.dedup();

    for line in wanted {
        let from = line.saturating_sub(3);
        let to = (line + 1).min(lines.len());
        for text in lines.get(from..to).unwrap_or_default() {
            writeln!(out, "  {}", text)?;
        }
        writeln!(out, "  ----")?;
    }
    Ok(())
}

fn run(args: &Args) -> Result<bool> {
    let root = match &args.root {
        Some(root) => root.clone(),
        None => args.manifest.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    let manifest = read_manifest(&args.manifest)?;
    log::debug!("inspecting {} with assets under {}", args.manifest.display(), root.display());

    let ctx = GpuContext::new(HeadlessBackend::new(), ContextConfig::default());
    let mut registry = ShaderRegistry::new(&ctx, FsSources::new(&root));
    let decoder = FileDecoder { root };
    let assets = load_manifest(&ctx, &mut registry, &decoder, &manifest)
        .with_context(|| format!("failed to load {}", args.manifest.display()))?;

    let mut report = String::new();
    write_report(&mut report, &registry, &assets, args.verbose)?;
    print!("{}", report);
    Ok(!registry.has_errors() && assets.failed_textures.is_empty())
}

fn main() -> ExitCode {
    init_logging(LoggingConfig::default());

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {:#}", e);
            return ExitCode::from(2);
        }
    };

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glint_gpu::shader::{MemorySources, ShaderStage};

    fn excerpt(numbered: &str, log: &str) -> String {
        let mut out = String::new();
        write_excerpt(&mut out, numbered, log).unwrap();
        out
    }

    #[test]
    fn excerpt_picks_lines_around_errors() {
        let numbered = "   1: a\n   2: b\n   3: c\n   4: d\n   5: e\n   6: f\n";
        let out = excerpt(numbered, "0(4) : error: boom\n");
        assert_eq!(out, "     2: b\n     3: c\n     4: d\n     5: e\n  ----\n");
    }

    #[test]
    fn excerpt_ignores_unlocated_logs() {
        assert!(excerpt("   1: a\n", "error: vertex shader missing").is_empty());
    }

    #[test]
    fn report_lists_broken_shaders_and_failed_programs() {
        let ctx = GpuContext::new(HeadlessBackend::new(), ContextConfig::default());
        let sources = MemorySources::new()
            .with("ok.vert", "void main() { gl_Position = vec4(0.0); }")
            .with("bad.frag", "void main() {\n  color = vec4(1.0);\n");
        let mut registry = ShaderRegistry::new(&ctx, sources);
        let vs = registry.add_shader("ok_vs", ShaderStage::Vertex, "ok.vert");
        let fs = registry.add_shader("bad_fs", ShaderStage::Fragment, "bad.frag");
        assert!(registry.load_shader(vs));
        assert!(!registry.load_shader(fs));
        let p = registry.add_program("broken", &[vs, fs]).unwrap();
        assert_eq!(registry.link_program(p), Ok(false));

        let mut out = String::new();
        write_report(&mut out, &registry, &LoadedAssets::default(), false).unwrap();
        assert!(out.starts_with("2 shaders, 1 programs, 0 textures\n"));
        assert!(out.contains("BROKEN SHADER bad_fs (fragment stage, bad.frag)"));
        assert!(out.contains("FAILED PROGRAM broken"));
        assert!(!out.contains("program broken"));
    }
}
