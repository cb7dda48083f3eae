use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::backend::{Backend, ClearMask, FramebufferTarget, Limits};
use crate::color::Color;
use crate::handle::Handle;
use crate::state::{BlendState, CullMode, DepthState, RenderState, StateCache, ViewportRect};

/// Context construction parameters.
///
/// Keep this structure small; add fields only for behavior the layer itself
/// needs to vary.
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Fixed-function state applied once when the context starts.
    pub defaults: RenderState,

    /// Check vertex layouts against their payload on every upload.
    ///
    /// Defaults to on in debug builds.
    pub validate_layouts: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self { defaults: RenderState::default(), validate_layouts: cfg!(debug_assertions) }
    }
}

struct ContextInner {
    backend: Box<dyn Backend>,
    state: StateCache,
    limits: Limits,
    config: ContextConfig,
}

/// Owner of the backend and its [`StateCache`].
///
/// Cloning is cheap and yields another handle to the same context. Every GPU
/// resource keeps one so it can release its backend object on drop.
///
/// The context is single-threaded: it is `!Send` and must stay on the thread
/// that owns the graphics context.
#[derive(Clone)]
pub struct GpuContext(Rc<RefCell<ContextInner>>);

impl GpuContext {
    /// Takes ownership of `backend` and applies `config.defaults`.
    pub fn new(backend: impl Backend + 'static, config: ContextConfig) -> Self {
        Self::from_boxed(Box::new(backend), config)
    }

    pub fn from_boxed(mut backend: Box<dyn Backend>, config: ContextConfig) -> Self {
        let limits = backend.limits();
        let mut state = StateCache::new(limits.max_texture_slots);
        state.apply(backend.as_mut(), &config.defaults);
        log::debug!(
            "gpu context created: {} texture slots, {} color attachments",
            limits.max_texture_slots,
            limits.max_color_attachments
        );
        Self(Rc::new(RefCell::new(ContextInner { backend, state, limits, config })))
    }

    /// Runs `f` with the backend and the state cache borrowed together.
    ///
    /// `f` must not call back into this context.
    pub fn with<R>(&self, f: impl FnOnce(&mut dyn Backend, &mut StateCache) -> R) -> R {
        let mut inner = self.0.borrow_mut();
        let inner = &mut *inner;
        f(inner.backend.as_mut(), &mut inner.state)
    }

    /// Direct backend access.
    ///
    /// Binding through this bypasses the cache; follow it with
    /// [`resync`](Self::resync) or [`invalidate`](Self::invalidate).
    pub fn backend<R>(&self, f: impl FnOnce(&mut dyn Backend) -> R) -> R {
        f(self.0.borrow_mut().backend.as_mut())
    }

    #[inline]
    pub fn limits(&self) -> Limits {
        self.0.borrow().limits
    }

    #[inline]
    pub fn validate_layouts(&self) -> bool {
        self.0.borrow().config.validate_layouts
    }

    /// Snapshot of the state mirror.
    pub fn state(&self) -> StateCache {
        self.0.borrow().state.clone()
    }

    // ── fixed-function state ──────────────────────────────────────────────

    pub fn set_cull_mode(&self, mode: CullMode) -> bool {
        self.with(|b, s| s.set_cull_mode(b, mode))
    }

    pub fn set_blend(&self, blend: BlendState) -> bool {
        self.with(|b, s| s.set_blend(b, blend))
    }

    pub fn set_depth(&self, depth: DepthState) -> bool {
        self.with(|b, s| s.set_depth(b, depth))
    }

    pub fn set_wireframe(&self, enabled: bool) -> bool {
        self.with(|b, s| s.set_wireframe(b, enabled))
    }

    pub fn set_viewport(&self, viewport: ViewportRect) -> bool {
        self.with(|b, s| s.set_viewport(b, viewport))
    }

    pub fn set_active_texture(&self, slot: u32) -> bool {
        self.with(|b, s| s.set_active_texture(b, slot))
    }

    pub fn apply(&self, state: &RenderState) {
        self.with(|b, s| s.apply(b, state))
    }

    /// Makes the window-system framebuffer current for drawing and reading.
    pub fn bind_default_framebuffer(&self) -> bool {
        self.with(|b, s| s.bind_framebuffer(b, FramebufferTarget::Both, Handle::INVALID))
    }

    /// Clears the current draw framebuffer.
    pub fn clear(&self, color: Color, depth: f32, mask: ClearMask) {
        self.backend(|b| b.clear(color.to_array(), depth, mask))
    }

    // ── recovery ──────────────────────────────────────────────────────────

    /// Re-issues every cached value so the backend matches the mirror again.
    pub fn resync(&self) {
        let mut inner = self.0.borrow_mut();
        let inner = &mut *inner;
        inner.state.resync(inner.backend.as_mut(), &inner.config.defaults);
    }

    /// Forgets everything the cache knows; the next set of each value always
    /// reaches the backend.
    pub fn invalidate(&self) {
        self.0.borrow_mut().state.invalidate();
        log::debug!("state cache invalidated");
    }
}

impl fmt::Debug for GpuContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.0.borrow();
        f.debug_struct("GpuContext")
            .field("limits", &inner.limits)
            .field("state", &inner.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;

    #[test]
    fn defaults_are_applied_once_at_start() {
        let backend = HeadlessBackend::new();
        let journal = backend.journal();
        let ctx = GpuContext::new(backend, ContextConfig::default());
        assert_eq!(journal.count("set_cull_mode"), 1);
        assert_eq!(journal.count("set_viewport"), 1);
        assert!(!ctx.set_cull_mode(CullMode::CounterClockwise));
        assert_eq!(ctx.state().active_texture(), Some(0));
    }

    #[test]
    fn external_binding_needs_invalidate() {
        let backend = HeadlessBackend::new();
        let journal = backend.journal();
        let ctx = GpuContext::new(backend, ContextConfig::default());

        ctx.backend(|b| b.set_cull_mode(CullMode::Off));
        // the mirror still believes CCW
        assert!(!ctx.set_cull_mode(CullMode::CounterClockwise));
        ctx.invalidate();
        assert!(ctx.set_cull_mode(CullMode::CounterClockwise));
        assert_eq!(journal.count("set_cull_mode"), 3);
    }

    #[test]
    fn resync_reissues_defaults() {
        let backend = HeadlessBackend::new();
        let journal = backend.journal();
        let ctx = GpuContext::new(backend, ContextConfig::default());
        journal.clear();
        ctx.resync();
        assert_eq!(journal.count("set_blend"), 1);
        assert_eq!(journal.count("set_depth"), 1);
    }
}
