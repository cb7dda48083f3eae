//! Typed uniform writes.
//!
//! Reflection yields a [`Uniform`] (location + [`UniformType`]) per active
//! uniform; engine values convert into a [`UniformValue`], and a single match
//! in [`Uniform::upload`] picks the primitive backend call.

mod kind;
mod slot;
mod value;

pub use kind::{ScalarKind, UniformType};
pub use slot::Uniform;
pub use value::UniformValue;
