//! Textures, renderbuffers, and their storage formats.

mod format;
mod renderbuffer;
mod texture2d;

pub use format::{ComponentType, InternalFormat, PixelLayout, TextureFormat};
pub use renderbuffer::Renderbuffer;
pub use texture2d::{PixelData, Texture2d};
