//! Fixed-function state values mirrored by the [`StateCache`](super::StateCache).

/// Face culling.
///
/// The winding names the *front* face; back faces are culled.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum CullMode {
    Off,
    CounterClockwise,
    Clockwise,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BlendEquation {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

/// Blend enable + factors + equation, applied as one unit.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct BlendState {
    pub enabled: bool,
    pub src: BlendFactor,
    pub dst: BlendFactor,
    pub equation: BlendEquation,
}

impl BlendState {
    pub const OPAQUE: Self = Self {
        enabled: false,
        src: BlendFactor::One,
        dst: BlendFactor::Zero,
        equation: BlendEquation::Add,
    };

    pub const ALPHA: Self = Self {
        enabled: true,
        src: BlendFactor::SrcAlpha,
        dst: BlendFactor::OneMinusSrcAlpha,
        equation: BlendEquation::Add,
    };

    pub const PREMULTIPLIED_ALPHA: Self = Self {
        enabled: true,
        src: BlendFactor::One,
        dst: BlendFactor::OneMinusSrcAlpha,
        equation: BlendEquation::Add,
    };

    pub const ADDITIVE: Self = Self {
        enabled: true,
        src: BlendFactor::One,
        dst: BlendFactor::One,
        equation: BlendEquation::Add,
    };
}

impl Default for BlendState {
    fn default() -> Self {
        Self::OPAQUE
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum DepthFunc {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

/// Depth test enable + comparison + write mask.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct DepthState {
    pub test: bool,
    pub func: DepthFunc,
    pub write: bool,
}

impl DepthState {
    pub const DISABLED: Self = Self { test: false, func: DepthFunc::Always, write: false };
    pub const LESS: Self = Self { test: true, func: DepthFunc::Less, write: true };
    pub const LESS_EQUAL_READ_ONLY: Self = Self { test: true, func: DepthFunc::LessEqual, write: false };
}

impl Default for DepthState {
    fn default() -> Self {
        Self::LESS
    }
}

/// Viewport rectangle in framebuffer pixels (origin bottom-left, GL convention).
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct ViewportRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl ViewportRect {
    #[inline]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    #[inline]
    pub const fn sized(width: u32, height: u32) -> Self {
        Self { x: 0, y: 0, width: width as i32, height: height as i32 }
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// A complete fixed-function state snapshot.
///
/// Used as the engine-chosen defaults applied when a context starts and as the
/// value re-issued by [`GpuContext::resync`](crate::GpuContext::resync).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct RenderState {
    pub cull: CullMode,
    pub blend: BlendState,
    pub depth: DepthState,
    pub wireframe: bool,
    pub viewport: ViewportRect,
    pub active_texture: u32,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            cull: CullMode::CounterClockwise,
            blend: BlendState::OPAQUE,
            depth: DepthState::LESS,
            wireframe: false,
            viewport: ViewportRect::default(),
            active_texture: 0,
        }
    }
}
