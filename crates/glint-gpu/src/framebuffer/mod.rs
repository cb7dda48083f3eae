//! Framebuffer objects and their attachments.

mod attachment;
mod fbo;
mod status;

pub use attachment::{Attachment, AttachmentBacking};
pub use fbo::Framebuffer;
pub use status::FramebufferStatus;
