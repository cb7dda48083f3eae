//! End-to-end behaviour of the binding layer against the headless backend.

use glint_gpu::backend::{BufferUsage, ClearMask, FramebufferTarget, HeadlessBackend, Journal, Primitive, TextureFilter};
use glint_gpu::framebuffer::Attachment;
use glint_gpu::shader::{MemorySources, ShaderStage};
use glint_gpu::{
    Color, ContextConfig, Framebuffer, FramebufferStatus, GpuContext, ReflectionError, ShaderRegistry, StrideHint,
    Texture2d, TextureFormat, VertexArray, VertexBuffer,
};

fn context() -> (GpuContext, Journal) {
    let backend = HeadlessBackend::new();
    let journal = backend.journal();
    (GpuContext::new(backend, ContextConfig::default()), journal)
}

const VERT: &str = "\
layout(location = 0) in vec3 position;
uniform mat4 mvp;
void main() { gl_Position = mvp * vec4(position, 1.0); }
";

const FRAG: &str = "\
uniform vec4 tint;
uniform float exposure;
uniform Lights_3 { vec4 light_dir; vec4 light_color; };
uniform Fog { float fog_density; };
out vec4 color;
void main() { color = tint * light_color * fog_density; }
";

fn registry(ctx: &GpuContext) -> (ShaderRegistry, glint_gpu::shader::ProgramId) {
    let sources = MemorySources::new().with("lit.vert", VERT).with("lit.frag", FRAG);
    let mut reg = ShaderRegistry::new(ctx, sources);
    let vs = reg.add_shader("lit_vs", ShaderStage::Vertex, "lit.vert");
    let fs = reg.add_shader("lit_fs", ShaderStage::Fragment, "lit.frag");
    assert!(reg.load_shader(vs));
    assert!(reg.load_shader(fs));
    let p = reg.add_program("lit", &[vs, fs]).unwrap();
    assert_eq!(reg.link_program(p), Ok(true));
    (reg, p)
}

// ── vertex layouts ──────────────────────────────────────────────────────────

#[test]
fn stride_tracks_hint_edits() {
    let (ctx, _) = context();
    let mut vbo = VertexBuffer::new(&ctx);
    vbo.set_vertices(&[0.0f32; 120], BufferUsage::StaticDraw);
    assert_eq!(vbo.stride(), 4);
    assert_eq!(vbo.count(), 120);

    vbo.add_stride_hint(StrideHint::per_vertex(0, 3, 0)).unwrap();
    vbo.add_stride_hint(StrideHint::per_vertex(1, 2, 12)).unwrap();
    vbo.add_stride_hint(StrideHint::per_vertex(2, 1, 20)).unwrap();
    assert_eq!(vbo.stride(), 24);
    assert_eq!(vbo.count(), 20);

    vbo.remove_stride_hint(1);
    assert_eq!(vbo.stride(), 16);
    assert_eq!(vbo.count(), 30);

    vbo.remove_stride_hint(0);
    vbo.remove_stride_hint(2);
    assert_eq!(vbo.stride(), 4);
    assert_eq!(vbo.count(), 120);
}

#[test]
fn interleaved_upload_draws_every_vertex() {
    let (ctx, journal) = context();
    let mut vbo = VertexBuffer::new(&ctx);
    vbo.add_stride_hint(StrideHint::per_vertex(0, 3, 0)).unwrap();
    vbo.add_stride_hint(StrideHint::per_vertex(1, 3, 12)).unwrap();
    vbo.add_stride_hint(StrideHint::per_vertex(2, 1, 24)).unwrap();
    vbo.set_vertices(&vec![0.5f32; 7 * 100], BufferUsage::StaticDraw);
    assert_eq!(vbo.stride(), 28);
    assert_eq!(vbo.count(), 100);

    assert!(vbo.bind());
    vbo.draw(Primitive::Triangles);
    let draw = journal.last_draw().unwrap();
    assert_eq!(draw.count, 100);
    assert_eq!(draw.primitive, Primitive::Triangles);

    let mut vao = VertexArray::new(&ctx);
    vao.add_buffer(vbo);
    vao.draw();
    assert_eq!(journal.last_draw().unwrap().count, 100);
    assert_eq!(journal.draws().len(), 2);
}

#[test]
fn zero_length_upload_keeps_previous_payload() {
    let (ctx, journal) = context();
    let mut vbo = VertexBuffer::new(&ctx);
    vbo.set_vertices(&[1.0f32; 6], BufferUsage::DynamicDraw);
    journal.clear();
    vbo.set_vertices::<f32>(&[], BufferUsage::DynamicDraw);
    assert_eq!(vbo.count(), 6);
    assert!(journal.is_empty());
}

// ── redundant binds ─────────────────────────────────────────────────────────

#[test]
fn double_binds_issue_at_most_one_call() {
    let (ctx, journal) = context();
    let (reg, p) = registry(&ctx);
    let program = reg.program(p).unwrap();

    let mut fbo = Framebuffer::new(&ctx, "target");
    fbo.add_texture("color", TextureFormat::RGBA8).unwrap();
    fbo.load(16, 16).unwrap();
    fbo.unbind();

    let mut tex = Texture2d::new(&ctx, TextureFormat::RGBA8);
    tex.allocate(4, 4);
    ctx.set_active_texture(0);
    journal.clear();

    program.bind();
    program.bind();
    fbo.bind().unwrap();
    fbo.bind().unwrap();
    tex.bind(5);
    tex.bind(5);

    assert_eq!(journal.count("use_program"), 1);
    assert_eq!(journal.count("bind_framebuffer"), 1);
    assert_eq!(journal.count("bind_texture"), 1);
    assert_eq!(journal.count("active_texture"), 1);
}

#[test]
fn external_binds_need_a_resync() {
    let (ctx, journal) = context();
    let (reg, p) = registry(&ctx);
    let program = reg.program(p).unwrap();
    program.bind();

    // Something outside the layer switches programs.
    ctx.backend(|b| b.use_program(glint_gpu::Handle::INVALID));
    journal.clear();
    assert!(!program.bind());
    assert_eq!(journal.count("use_program"), 0);

    ctx.invalidate();
    assert!(program.bind());
    assert_eq!(journal.count("use_program"), 1);
}

#[test]
fn resync_restores_bindings_changed_behind_the_cache() {
    let (ctx, journal) = context();
    let (reg, p) = registry(&ctx);
    let program = reg.program(p).unwrap();

    let mut fbo = Framebuffer::new(&ctx, "offscreen");
    fbo.add_texture("color", TextureFormat::RGBA8).unwrap();
    fbo.load(4, 4).unwrap();
    program.bind();
    fbo.bind().unwrap();

    ctx.backend(|b| {
        b.use_program(glint_gpu::Handle::INVALID);
        b.bind_framebuffer(FramebufferTarget::Both, glint_gpu::Handle::INVALID);
    });
    journal.clear();

    // The cache still believes both are bound, so nothing is re-issued and the
    // write lands on whatever the driver has bound.
    assert!(!program.bind());
    assert!(program.set_uniform("tint", [1.0f32; 4]));
    assert_eq!(journal.last_uniform_write().unwrap().program, glint_gpu::Handle::INVALID);

    ctx.resync();
    assert_eq!(journal.count("use_program"), 1);
    assert!(journal.count("bind_framebuffer") >= 1);

    assert!(program.set_uniform("tint", [1.0f32; 4]));
    assert_eq!(journal.last_uniform_write().unwrap().program, program.handle());

    fbo.clear(Color::WHITE, 1.0, ClearMask::COLOR).unwrap();
    assert_eq!(fbo.read_pixels(0, 0, 0, 1, 1), vec![255; 4]);
}

// ── programs ────────────────────────────────────────────────────────────────

#[test]
fn second_link_reflects_nothing() {
    let (ctx, journal) = context();
    let (mut reg, p) = registry(&ctx);
    let links = journal.count("link_program");
    let block_bindings = journal.count("uniform_block_binding");

    assert_eq!(reg.link_program(p), Ok(true));
    assert!(reg.program_mut(p).unwrap().link());
    assert_eq!(journal.count("link_program"), links);
    assert_eq!(journal.count("uniform_block_binding"), block_bindings);
}

#[test]
fn missing_uniforms_are_ignored() {
    let (ctx, journal) = context();
    let (reg, p) = registry(&ctx);
    let program = reg.program(p).unwrap();
    program.bind();
    journal.clear();

    // `exposure` is declared but never read, so it is not active.
    assert!(!program.set_uniform("exposure", 2.0f32));
    assert!(!program.set_program_uniform("does_not_exist", 1i32));
    assert!(!program.set_uniform_matrix("nope", glam::Mat4::IDENTITY, true));
    assert!(journal.is_empty());

    assert!(program.set_uniform("tint", [1.0f32, 0.0, 0.0, 1.0]));
    assert_eq!(journal.uniform_writes().len(), 1);
}

#[test]
fn block_binding_points_come_from_suffixes() {
    let (ctx, _) = context();
    let (reg, p) = registry(&ctx);
    let program = reg.program(p).unwrap();

    assert_eq!(program.block("Lights_3").unwrap().binding, Some(3));
    assert_eq!(program.block("Fog").unwrap().binding, None);
    assert_eq!(program.config_errors(), &[ReflectionError::MissingBindingSuffix("Fog".into())]);
}

#[test]
fn colliding_block_suffixes_keep_the_first_binding() {
    let (ctx, journal) = context();
    let sources = MemorySources::new().with("a.vert", VERT).with(
        "a.frag",
        "uniform A_2 { vec4 a; };\nuniform B_2 { vec4 b; };\nout vec4 color;\nvoid main() { color = a * b; }\n",
    );
    let mut reg = ShaderRegistry::new(&ctx, sources);
    let vs = reg.add_shader("a_vs", ShaderStage::Vertex, "a.vert");
    let fs = reg.add_shader("a_fs", ShaderStage::Fragment, "a.frag");
    assert!(reg.load_shader(vs));
    assert!(reg.load_shader(fs));
    let p = reg.add_program("collide", &[vs, fs]).unwrap();
    assert_eq!(reg.link_program(p), Ok(true));

    let program = reg.program(p).unwrap();
    assert_eq!(program.block("A_2").unwrap().binding, Some(2));
    assert_eq!(program.block("B_2").unwrap().binding, None);
    assert_eq!(
        program.config_errors(),
        &[ReflectionError::DuplicateBinding { block: "B_2".into(), other: "A_2".into(), binding: 2 }]
    );
    assert_eq!(journal.count("uniform_block_binding"), 1);
}

// ── framebuffers ────────────────────────────────────────────────────────────

#[test]
fn blit_color_copies_and_scales() {
    let (ctx, journal) = context();
    let mut src = Framebuffer::new(&ctx, "src");
    src.add_texture("color", TextureFormat::RGBA8).unwrap();
    src.add_texture("spare", TextureFormat::RGBA8).unwrap();
    src.load(4, 4).unwrap();
    src.clear(Color::new(0.0, 1.0, 0.0, 1.0), 1.0, ClearMask::COLOR).unwrap();

    let mut dst = Framebuffer::new(&ctx, "dst");
    dst.add_texture("color", TextureFormat::RGBA8).unwrap();
    dst.load(8, 8).unwrap();
    dst.clear(Color::BLACK, 1.0, ClearMask::COLOR).unwrap();

    journal.clear();
    src.blit_color(0, &dst, TextureFilter::Nearest).unwrap();
    assert_eq!(journal.count("blit_framebuffer"), 1);
    let px = dst.read_pixels(0, 0, 0, 8, 8);
    assert_eq!(px.len(), 8 * 8 * 4);
    assert!(px.chunks(4).all(|p| p == [0, 255, 0, 255]));

    assert!(src.blit_color(2, &dst, TextureFilter::Linear).is_err());
}


#[test]
fn read_pixels_sizes_and_bounds() {
    let (ctx, _) = context();
    let mut fbo = Framebuffer::new(&ctx, "readback");
    fbo.add_texture("rgba", TextureFormat::RGBA8).unwrap();
    fbo.add_texture("rgb", TextureFormat::RGB8).unwrap();
    fbo.load(32, 32).unwrap();

    assert_eq!(fbo.read_pixels(0, 0, 0, 8, 4).len(), 8 * 4 * 4);
    assert_eq!(fbo.read_pixels(1, 3, 5, 7, 2).len(), 7 * 2 * 3);
    for (x, y) in [(-1, 0), (0, -1), (-5, -5)] {
        assert!(fbo.read_pixels(0, x, y, 4, 4).is_empty());
    }
    // The origin is in range, so the block keeps its full size even though it
    // runs past the right edge.
    assert_eq!(fbo.read_pixels(0, 30, 0, 4, 1).len(), 4 * 4);
    assert_eq!(fbo.read_pixels(1, 31, 31, 5, 5).len(), 5 * 5 * 3);
    assert!(fbo.read_pixels(0, 32, 0, 4, 1).is_empty());
    assert!(fbo.read_pixels(0, 0, 32, 1, 1).is_empty());
    assert!(fbo.read_pixels(2, 0, 0, 1, 1).is_empty());
}

#[test]
fn mismatched_depth_size_is_incomplete_until_fixed() {
    let (ctx, _) = context();
    let mut fbo = Framebuffer::new(&ctx, "gbuffer");
    fbo.add_texture("albedo", TextureFormat::RGBA8).unwrap();
    fbo.add_texture("normal", TextureFormat::RGBA16F).unwrap();
    fbo.add_depth(Attachment::renderbuffer("depth", TextureFormat::DEPTH24).with_fixed_size(128, 128)).unwrap();

    let status = fbo.load(256, 256).unwrap();
    assert!(!status.is_complete());
    assert_eq!(status, FramebufferStatus::IncompleteDimensions);

    fbo.depth_mut().unwrap().set_fixed_size(Some((256, 256)));
    assert_eq!(fbo.load(256, 256).unwrap(), FramebufferStatus::Complete);
    assert_eq!(fbo.check_status(), Ok(FramebufferStatus::Complete));
}
