use std::fmt;

/// Opaque identifier of a backend-resident object (buffer, texture, program...).
///
/// `Handle::INVALID` doubles as "nothing bound" when passed to a bind call,
/// the way object name `0` does in GL.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Handle(pub u32);

impl Handle {
    pub const INVALID: Handle = Handle(u32::MAX);

    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "Handle({})", self.0)
        } else {
            f.write_str("Handle(INVALID)")
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
