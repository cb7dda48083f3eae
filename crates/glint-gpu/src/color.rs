/// Linear straight-alpha RGBA color.
///
/// Used for framebuffer clears and as a uniform payload (uploads as a `vec4`,
/// or `vec3` through [`Color::rgb`]).
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);

    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Creates a color from sRGB-encoded bytes (`0`–`255`), decoding to linear.
    ///
    /// Alpha is never gamma-encoded and is only normalized.
    #[inline]
    pub fn from_srgb_u8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self {
            r: srgb_to_linear(r as f32 / 255.0),
            g: srgb_to_linear(g as f32 / 255.0),
            b: srgb_to_linear(b as f32 / 255.0),
            a: a as f32 / 255.0,
        }
    }

    /// Creates a color from linear bytes, normalizing only.
    #[inline]
    pub fn from_linear_u8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, a as f32 / 255.0)
    }

    /// Returns the premultiplied form (`rgb * a`).
    #[inline]
    pub fn premultiplied(self) -> Self {
        let a = self.a.clamp(0.0, 1.0);
        Self { r: self.r * a, g: self.g * a, b: self.b * a, a }
    }

    #[inline]
    pub const fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    #[inline]
    pub const fn rgb(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.r.is_finite() && self.g.is_finite() && self.b.is_finite() && self.a.is_finite()
    }

    /// Clamps all channels to [0, 1].
    #[inline]
    pub fn clamped(self) -> Self {
        Self {
            r: self.r.clamp(0.0, 1.0),
            g: self.g.clamp(0.0, 1.0),
            b: self.b.clamp(0.0, 1.0),
            a: self.a.clamp(0.0, 1.0),
        }
    }
}

impl From<[f32; 4]> for Color {
    fn from([r, g, b, a]: [f32; 4]) -> Self {
        Self::new(r, g, b, a)
    }
}

impl From<Color> for [f32; 4] {
    fn from(c: Color) -> Self {
        c.to_array()
    }
}

#[inline]
fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srgb_endpoints_are_exact() {
        let c = Color::from_srgb_u8(0, 255, 0, 128);
        assert_eq!(c.r, 0.0);
        assert!((c.g - 1.0).abs() < 1e-6);
        assert!((c.a - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn srgb_midtone_is_darker_in_linear() {
        let c = Color::from_srgb_u8(128, 128, 128, 255);
        assert!(c.r < 0.25 && c.r > 0.2);
    }

    #[test]
    fn premultiply() {
        let c = Color::new(1.0, 0.5, 0.0, 0.5).premultiplied();
        assert_eq!(c.to_array(), [0.5, 0.25, 0.0, 0.5]);
    }
}
