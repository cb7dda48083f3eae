//! Redundant-state-change elision.
//!
//! [`StateCache`] mirrors what the backend currently has bound or enabled.
//! Every setter compares against the mirrored value and only calls into the
//! [`Backend`] when the value differs, issuing exactly one call on a change.
//!
//! Each field is `Option<T>`: `None` means "unknown" (never set, or
//! [`invalidate`](StateCache::invalidate)d), which always forces the next set
//! through. Binding fields hold `Some(Handle::INVALID)` for "known unbound".
//!
//! The mirror is advisory. Any code that talks to the backend directly
//! desynchronizes it; call [`GpuContext::resync`](crate::GpuContext::resync)
//! or [`GpuContext::invalidate`](crate::GpuContext::invalidate) afterwards.

use super::types::{BlendState, CullMode, DepthState, RenderState, ViewportRect};
use crate::backend::{Backend, BufferTarget, FramebufferTarget};
use crate::handle::Handle;

/// Mirror of backend state owned by a [`GpuContext`](crate::GpuContext).
#[derive(Debug, Clone, Default)]
pub struct StateCache {
    cull: Option<CullMode>,
    blend: Option<BlendState>,
    depth: Option<DepthState>,
    wireframe: Option<bool>,
    viewport: Option<ViewportRect>,
    active_texture: Option<u32>,

    array_buffer: Option<Handle>,
    uniform_buffer: Option<Handle>,
    /// Element-buffer binding is vertex-array state; reset whenever the
    /// vertex array changes.
    element_buffer: Option<Handle>,
    vertex_array: Option<Handle>,
    textures: Vec<Option<Handle>>,
    renderbuffer: Option<Handle>,
    draw_framebuffer: Option<Handle>,
    read_framebuffer: Option<Handle>,
    program: Option<Handle>,
}

#[inline]
fn changed<T: PartialEq>(cached: &Option<T>, value: &T) -> bool {
    cached.as_ref() != Some(value)
}

impl StateCache {
    /// An all-unknown cache with room for `texture_slots` texture units.
    pub fn new(texture_slots: u32) -> Self {
        Self { textures: vec![None; texture_slots as usize], ..Self::default() }
    }

    // ── fixed-function state ──────────────────────────────────────────────

    pub fn set_cull_mode(&mut self, backend: &mut dyn Backend, mode: CullMode) -> bool {
        if !changed(&self.cull, &mode) {
            log::trace!("state: cull {:?} elided", mode);
            return false;
        }
        backend.set_cull_mode(mode);
        self.cull = Some(mode);
        true
    }

    pub fn set_blend(&mut self, backend: &mut dyn Backend, blend: BlendState) -> bool {
        if !changed(&self.blend, &blend) {
            log::trace!("state: blend elided");
            return false;
        }
        backend.set_blend(blend);
        self.blend = Some(blend);
        true
    }

    pub fn set_depth(&mut self, backend: &mut dyn Backend, depth: DepthState) -> bool {
        if !changed(&self.depth, &depth) {
            log::trace!("state: depth elided");
            return false;
        }
        backend.set_depth(depth);
        self.depth = Some(depth);
        true
    }

    pub fn set_wireframe(&mut self, backend: &mut dyn Backend, enabled: bool) -> bool {
        if !changed(&self.wireframe, &enabled) {
            return false;
        }
        backend.set_wireframe(enabled);
        self.wireframe = Some(enabled);
        true
    }

    /// Compares the four coordinates independently; any difference issues
    /// one combined update.
    pub fn set_viewport(&mut self, backend: &mut dyn Backend, viewport: ViewportRect) -> bool {
        let same = match self.viewport {
            Some(v) => {
                v.x == viewport.x
                    && v.y == viewport.y
                    && v.width == viewport.width
                    && v.height == viewport.height
            }
            None => false,
        };
        if same {
            log::trace!("state: viewport elided");
            return false;
        }
        backend.set_viewport(viewport);
        self.viewport = Some(viewport);
        true
    }

    /// Selects texture unit `slot`.
    ///
    /// # Panics
    /// If `slot` is outside the unit range this cache was created with.
    pub fn set_active_texture(&mut self, backend: &mut dyn Backend, slot: u32) -> bool {
        assert!(
            (slot as usize) < self.textures.len(),
            "texture slot {} out of range 0..{}",
            slot,
            self.textures.len()
        );
        if !changed(&self.active_texture, &slot) {
            return false;
        }
        backend.active_texture(slot);
        self.active_texture = Some(slot);
        true
    }

    /// Applies a whole snapshot through the regular setters.
    pub fn apply(&mut self, backend: &mut dyn Backend, state: &RenderState) {
        self.set_cull_mode(backend, state.cull);
        self.set_blend(backend, state.blend);
        self.set_depth(backend, state.depth);
        self.set_wireframe(backend, state.wireframe);
        self.set_viewport(backend, state.viewport);
        self.set_active_texture(backend, state.active_texture);
    }

    // ── bindings ──────────────────────────────────────────────────────────

    pub fn bind_buffer(&mut self, backend: &mut dyn Backend, target: BufferTarget, buffer: Handle) -> bool {
        let slot = match target {
            BufferTarget::Array => &mut self.array_buffer,
            BufferTarget::ElementArray => &mut self.element_buffer,
            BufferTarget::Uniform => &mut self.uniform_buffer,
        };
        if !changed(slot, &buffer) {
            log::trace!("state: {:?} buffer {} elided", target, buffer);
            return false;
        }
        backend.bind_buffer(target, buffer);
        *slot = Some(buffer);
        true
    }

    pub fn bind_vertex_array(&mut self, backend: &mut dyn Backend, vao: Handle) -> bool {
        if !changed(&self.vertex_array, &vao) {
            log::trace!("state: vertex array {} elided", vao);
            return false;
        }
        backend.bind_vertex_array(vao);
        self.vertex_array = Some(vao);
        self.element_buffer = None;
        true
    }

    /// Binds `texture` to unit `slot`, switching the active unit if needed.
    ///
    /// Returns whether the texture binding itself changed.
    pub fn bind_texture(&mut self, backend: &mut dyn Backend, slot: u32, texture: Handle) -> bool {
        self.set_active_texture(backend, slot);
        let cached = &mut self.textures[slot as usize];
        if !changed(cached, &texture) {
            log::trace!("state: texture {} on slot {} elided", texture, slot);
            return false;
        }
        backend.bind_texture(texture);
        *cached = Some(texture);
        true
    }

    pub fn bind_renderbuffer(&mut self, backend: &mut dyn Backend, renderbuffer: Handle) -> bool {
        if !changed(&self.renderbuffer, &renderbuffer) {
            return false;
        }
        backend.bind_renderbuffer(renderbuffer);
        self.renderbuffer = Some(renderbuffer);
        true
    }

    pub fn bind_framebuffer(&mut self, backend: &mut dyn Backend, target: FramebufferTarget, fbo: Handle) -> bool {
        match target {
            FramebufferTarget::Draw => {
                if !changed(&self.draw_framebuffer, &fbo) {
                    return false;
                }
                self.draw_framebuffer = Some(fbo);
            }
            FramebufferTarget::Read => {
                if !changed(&self.read_framebuffer, &fbo) {
                    return false;
                }
                self.read_framebuffer = Some(fbo);
            }
            FramebufferTarget::Both => {
                if !changed(&self.draw_framebuffer, &fbo) && !changed(&self.read_framebuffer, &fbo) {
                    log::trace!("state: framebuffer {} elided", fbo);
                    return false;
                }
                self.draw_framebuffer = Some(fbo);
                self.read_framebuffer = Some(fbo);
            }
        }
        backend.bind_framebuffer(target, fbo);
        true
    }

    pub fn use_program(&mut self, backend: &mut dyn Backend, program: Handle) -> bool {
        if !changed(&self.program, &program) {
            log::trace!("state: program {} elided", program);
            return false;
        }
        backend.use_program(program);
        self.program = Some(program);
        true
    }

    // ── deletion bookkeeping ──────────────────────────────────────────────
    //
    // Deleting a bound object unbinds it, so a matching cached binding
    // becomes "known unbound".

    fn forget(slot: &mut Option<Handle>, h: Handle) {
        if *slot == Some(h) {
            *slot = Some(Handle::INVALID);
        }
    }

    pub fn forget_buffer(&mut self, buffer: Handle) {
        Self::forget(&mut self.array_buffer, buffer);
        Self::forget(&mut self.uniform_buffer, buffer);
        Self::forget(&mut self.element_buffer, buffer);
    }

    pub fn forget_vertex_array(&mut self, vao: Handle) {
        if self.vertex_array == Some(vao) {
            self.vertex_array = Some(Handle::INVALID);
            self.element_buffer = None;
        }
    }

    pub fn forget_texture(&mut self, texture: Handle) {
        for slot in &mut self.textures {
            Self::forget(slot, texture);
        }
    }

    pub fn forget_renderbuffer(&mut self, renderbuffer: Handle) {
        Self::forget(&mut self.renderbuffer, renderbuffer);
    }

    pub fn forget_framebuffer(&mut self, fbo: Handle) {
        Self::forget(&mut self.draw_framebuffer, fbo);
        Self::forget(&mut self.read_framebuffer, fbo);
    }

    pub fn forget_program(&mut self, program: Handle) {
        Self::forget(&mut self.program, program);
    }

    // ── whole-cache operations ────────────────────────────────────────────

    /// Marks every field unknown.
    pub fn invalidate(&mut self) {
        *self = Self::new(self.textures.len() as u32);
    }

    /// Re-issues every mirrored value, using `defaults` for unknown
    /// fixed-function fields. Unknown bindings stay unknown.
    pub fn resync(&mut self, backend: &mut dyn Backend, defaults: &RenderState) {
        let snapshot = RenderState {
            cull: self.cull.unwrap_or(defaults.cull),
            blend: self.blend.unwrap_or(defaults.blend),
            depth: self.depth.unwrap_or(defaults.depth),
            wireframe: self.wireframe.unwrap_or(defaults.wireframe),
            viewport: self.viewport.unwrap_or(defaults.viewport),
            active_texture: self.active_texture.unwrap_or(defaults.active_texture),
        };
        let bindings = self.clone();

        self.invalidate();
        self.set_cull_mode(backend, snapshot.cull);
        self.set_blend(backend, snapshot.blend);
        self.set_depth(backend, snapshot.depth);
        self.set_wireframe(backend, snapshot.wireframe);
        self.set_viewport(backend, snapshot.viewport);

        for (slot, texture) in bindings.textures.iter().enumerate() {
            if let Some(texture) = texture {
                self.bind_texture(backend, slot as u32, *texture);
            }
        }
        self.set_active_texture(backend, snapshot.active_texture);

        if let Some(h) = bindings.array_buffer {
            self.bind_buffer(backend, BufferTarget::Array, h);
        }
        if let Some(h) = bindings.uniform_buffer {
            self.bind_buffer(backend, BufferTarget::Uniform, h);
        }
        if let Some(h) = bindings.vertex_array {
            self.bind_vertex_array(backend, h);
        }
        if let Some(h) = bindings.element_buffer {
            self.bind_buffer(backend, BufferTarget::ElementArray, h);
        }
        if let Some(h) = bindings.renderbuffer {
            self.bind_renderbuffer(backend, h);
        }
        if let Some(h) = bindings.draw_framebuffer {
            self.bind_framebuffer(backend, FramebufferTarget::Draw, h);
        }
        if let Some(h) = bindings.read_framebuffer {
            self.bind_framebuffer(backend, FramebufferTarget::Read, h);
        }
        if let Some(h) = bindings.program {
            self.use_program(backend, h);
        }
        log::debug!("state cache resynchronized");
    }

    // ── accessors ─────────────────────────────────────────────────────────

    #[inline]
    pub fn cull_mode(&self) -> Option<CullMode> {
        self.cull
    }

    #[inline]
    pub fn blend(&self) -> Option<BlendState> {
        self.blend
    }

    #[inline]
    pub fn depth(&self) -> Option<DepthState> {
        self.depth
    }

    #[inline]
    pub fn wireframe(&self) -> Option<bool> {
        self.wireframe
    }

    #[inline]
    pub fn viewport(&self) -> Option<ViewportRect> {
        self.viewport
    }

    #[inline]
    pub fn active_texture(&self) -> Option<u32> {
        self.active_texture
    }

    #[inline]
    pub fn bound_program(&self) -> Option<Handle> {
        self.program
    }

    #[inline]
    pub fn bound_vertex_array(&self) -> Option<Handle> {
        self.vertex_array
    }

    pub fn bound_buffer(&self, target: BufferTarget) -> Option<Handle> {
        match target {
            BufferTarget::Array => self.array_buffer,
            BufferTarget::ElementArray => self.element_buffer,
            BufferTarget::Uniform => self.uniform_buffer,
        }
    }

    pub fn bound_framebuffer(&self, target: FramebufferTarget) -> Option<Handle> {
        match target {
            FramebufferTarget::Read => self.read_framebuffer,
            FramebufferTarget::Draw | FramebufferTarget::Both => self.draw_framebuffer,
        }
    }

    pub fn bound_texture(&self, slot: u32) -> Option<Handle> {
        self.textures.get(slot as usize).copied().flatten()
    }

    #[inline]
    pub fn bound_renderbuffer(&self) -> Option<Handle> {
        self.renderbuffer
    }

    #[inline]
    pub fn texture_slots(&self) -> u32 {
        self.textures.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;

    fn setup() -> (StateCache, HeadlessBackend, crate::backend::Journal) {
        let backend = HeadlessBackend::new();
        let journal = backend.journal();
        (StateCache::new(32), backend, journal)
    }

    // ── fixed-function ──

    #[test]
    fn unknown_state_always_issues() {
        let (mut cache, mut b, journal) = setup();
        assert!(cache.set_cull_mode(&mut b, CullMode::Off));
        assert!(!cache.set_cull_mode(&mut b, CullMode::Off));
        assert!(cache.set_cull_mode(&mut b, CullMode::Clockwise));
        assert_eq!(journal.count("set_cull_mode"), 2);
    }

    #[test]
    fn viewport_single_coordinate_change_is_one_call() {
        let (mut cache, mut b, journal) = setup();
        cache.set_viewport(&mut b, ViewportRect::new(0, 0, 640, 480));
        cache.set_viewport(&mut b, ViewportRect::new(0, 0, 640, 480));
        cache.set_viewport(&mut b, ViewportRect::new(0, 1, 640, 480));
        assert_eq!(journal.count("set_viewport"), 2);
    }

    #[test]
    fn blend_and_depth_compare_as_units() {
        let (mut cache, mut b, journal) = setup();
        cache.set_blend(&mut b, BlendState::ALPHA);
        cache.set_blend(&mut b, BlendState::ALPHA);
        cache.set_blend(&mut b, BlendState::ADDITIVE);
        cache.set_depth(&mut b, DepthState::LESS);
        cache.set_depth(&mut b, DepthState::LESS);
        assert_eq!(journal.count("set_blend"), 2);
        assert_eq!(journal.count("set_depth"), 1);
    }

    #[test]
    #[should_panic]
    fn texture_slot_out_of_range_panics() {
        let (mut cache, mut b, _) = setup();
        cache.set_active_texture(&mut b, 32);
    }

    // ── bindings ──

    #[test]
    fn texture_binding_is_tracked_per_slot() {
        let (mut cache, mut b, journal) = setup();
        let t = Handle(7);
        assert!(cache.bind_texture(&mut b, 0, t));
        assert!(!cache.bind_texture(&mut b, 0, t));
        assert!(cache.bind_texture(&mut b, 1, t));
        assert!(!cache.bind_texture(&mut b, 0, t));
        assert_eq!(journal.count("bind_texture"), 2);
        // 0 -> 1 -> 0
        assert_eq!(journal.count("active_texture"), 3);
    }

    #[test]
    fn vertex_array_change_forgets_element_buffer() {
        let (mut cache, mut b, journal) = setup();
        cache.bind_vertex_array(&mut b, Handle(1));
        cache.bind_buffer(&mut b, BufferTarget::ElementArray, Handle(2));
        cache.bind_vertex_array(&mut b, Handle(3));
        assert_eq!(cache.bound_buffer(BufferTarget::ElementArray), None);
        cache.bind_buffer(&mut b, BufferTarget::ElementArray, Handle(2));
        assert_eq!(journal.count("bind_buffer"), 2);
    }

    #[test]
    fn framebuffer_both_skips_only_when_both_match() {
        let (mut cache, mut b, journal) = setup();
        cache.bind_framebuffer(&mut b, FramebufferTarget::Both, Handle(4));
        assert!(!cache.bind_framebuffer(&mut b, FramebufferTarget::Both, Handle(4)));
        cache.bind_framebuffer(&mut b, FramebufferTarget::Read, Handle(5));
        assert!(cache.bind_framebuffer(&mut b, FramebufferTarget::Both, Handle(4)));
        assert_eq!(journal.count("bind_framebuffer"), 3);
    }

    #[test]
    fn deleting_bound_object_leaves_known_unbound() {
        let (mut cache, mut b, _) = setup();
        cache.use_program(&mut b, Handle(9));
        cache.forget_program(Handle(9));
        assert_eq!(cache.bound_program(), Some(Handle::INVALID));
        cache.forget_program(Handle(10));
        assert_eq!(cache.bound_program(), Some(Handle::INVALID));
    }

    // ── whole cache ──

    #[test]
    fn invalidate_forces_next_set() {
        let (mut cache, mut b, journal) = setup();
        cache.use_program(&mut b, Handle(1));
        cache.invalidate();
        assert_eq!(cache.bound_program(), None);
        cache.use_program(&mut b, Handle(1));
        assert_eq!(journal.count("use_program"), 2);
    }

    #[test]
    fn resync_reissues_known_state() {
        let (mut cache, mut b, journal) = setup();
        cache.apply(&mut b, &RenderState::default());
        cache.use_program(&mut b, Handle(2));
        cache.bind_texture(&mut b, 3, Handle(8));
        journal.clear();

        cache.resync(&mut b, &RenderState::default());
        assert_eq!(journal.count("set_cull_mode"), 1);
        assert_eq!(journal.count("set_viewport"), 1);
        assert_eq!(journal.count("use_program"), 1);
        assert_eq!(journal.count("bind_texture"), 1);
        assert_eq!(cache.bound_texture(3), Some(Handle(8)));
        // binding to slot 3 made it the active slot, and resync restores that
        assert_eq!(cache.active_texture(), Some(3));
        assert_eq!(journal.count("bind_vertex_array"), 0);
    }
}
