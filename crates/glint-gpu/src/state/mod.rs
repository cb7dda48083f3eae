//! Fixed-function state values and the redundant-call cache.

mod cache;
mod types;

pub use cache::StateCache;
pub use types::{
    BlendEquation, BlendFactor, BlendState, CullMode, DepthFunc, DepthState, RenderState, ViewportRect,
};
