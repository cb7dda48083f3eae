use std::fmt;

use crate::backend::gl;

/// Framebuffer completeness category.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum FramebufferStatus {
    Complete,
    Undefined,
    IncompleteAttachment,
    MissingAttachment,
    IncompleteDrawBuffer,
    Unsupported,
    /// Attachments differ in size.
    IncompleteDimensions,
    /// Any other backend code, kept for diagnostics.
    Unknown(u32),
}

impl FramebufferStatus {
    pub fn from_gl(code: u32) -> Self {
        match code {
            gl::FRAMEBUFFER_COMPLETE => Self::Complete,
            gl::FRAMEBUFFER_UNDEFINED => Self::Undefined,
            gl::FRAMEBUFFER_INCOMPLETE_ATTACHMENT => Self::IncompleteAttachment,
            gl::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT => Self::MissingAttachment,
            gl::FRAMEBUFFER_INCOMPLETE_DRAW_BUFFER => Self::IncompleteDrawBuffer,
            gl::FRAMEBUFFER_UNSUPPORTED => Self::Unsupported,
            gl::FRAMEBUFFER_INCOMPLETE_DIMENSIONS => Self::IncompleteDimensions,
            other => Self::Unknown(other),
        }
    }

    #[inline]
    pub fn is_complete(self) -> bool {
        self == Self::Complete
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Undefined => "undefined",
            Self::IncompleteAttachment => "incomplete attachment",
            Self::MissingAttachment => "missing attachment",
            Self::IncompleteDrawBuffer => "incomplete draw buffer",
            Self::Unsupported => "unsupported",
            Self::IncompleteDimensions => "incomplete dimensions",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for FramebufferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "unknown (0x{:04X})", code),
            other => f.write_str(other.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_every_category() {
        let table = [
            (gl::FRAMEBUFFER_COMPLETE, FramebufferStatus::Complete),
            (gl::FRAMEBUFFER_UNDEFINED, FramebufferStatus::Undefined),
            (gl::FRAMEBUFFER_INCOMPLETE_ATTACHMENT, FramebufferStatus::IncompleteAttachment),
            (gl::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT, FramebufferStatus::MissingAttachment),
            (gl::FRAMEBUFFER_INCOMPLETE_DRAW_BUFFER, FramebufferStatus::IncompleteDrawBuffer),
            (gl::FRAMEBUFFER_UNSUPPORTED, FramebufferStatus::Unsupported),
            (gl::FRAMEBUFFER_INCOMPLETE_DIMENSIONS, FramebufferStatus::IncompleteDimensions),
        ];
        for (code, status) in table {
            assert_eq!(FramebufferStatus::from_gl(code), status);
        }
    }

    #[test]
    fn unrecognized_codes_are_unknown() {
        let s = FramebufferStatus::from_gl(gl::FRAMEBUFFER_INCOMPLETE_MULTISAMPLE);
        assert_eq!(s, FramebufferStatus::Unknown(0x8D56));
        assert_eq!(s.to_string(), "unknown (0x8D56)");
        assert!(!s.is_complete());
    }
}
