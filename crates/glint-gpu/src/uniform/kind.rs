use std::fmt;

use super::value::UniformValue;
use crate::backend::gl;

/// Scalar base of a uniform type.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ScalarKind {
    Float,
    Double,
    Int,
    UInt,
    Bool,
}

impl ScalarKind {
    pub const fn prefix(self) -> &'static str {
        match self {
            ScalarKind::Float => "",
            ScalarKind::Double => "d",
            ScalarKind::Int => "i",
            ScalarKind::UInt => "u",
            ScalarKind::Bool => "b",
        }
    }
}

/// Reflected type of an active uniform.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UniformType {
    /// Scalar (`components == 1`) or vector.
    Vector { scalar: ScalarKind, components: u8 },
    /// Square matrix, float or double.
    Matrix { scalar: ScalarKind, dim: u8 },
    /// Opaque sampler; set with an `int` texture unit.
    Sampler(u32),
    /// Opaque image unit; set with an `int`.
    Image(u32),
    /// A code this layer has no table entry for. Writes are not type-checked.
    Other(u32),
}

impl UniformType {
    const fn vector(scalar: ScalarKind, components: u8) -> Self {
        Self::Vector { scalar, components }
    }

    const fn matrix(scalar: ScalarKind, dim: u8) -> Self {
        Self::Matrix { scalar, dim }
    }

    pub fn from_gl(code: u32) -> Self {
        use ScalarKind::*;
        match code {
            gl::FLOAT => Self::vector(Float, 1),
            gl::FLOAT_VEC2 => Self::vector(Float, 2),
            gl::FLOAT_VEC3 => Self::vector(Float, 3),
            gl::FLOAT_VEC4 => Self::vector(Float, 4),
            gl::DOUBLE => Self::vector(Double, 1),
            gl::DOUBLE_VEC2 => Self::vector(Double, 2),
            gl::DOUBLE_VEC3 => Self::vector(Double, 3),
            gl::DOUBLE_VEC4 => Self::vector(Double, 4),
            gl::INT => Self::vector(Int, 1),
            gl::INT_VEC2 => Self::vector(Int, 2),
            gl::INT_VEC3 => Self::vector(Int, 3),
            gl::INT_VEC4 => Self::vector(Int, 4),
            gl::UNSIGNED_INT => Self::vector(UInt, 1),
            gl::UNSIGNED_INT_VEC2 => Self::vector(UInt, 2),
            gl::UNSIGNED_INT_VEC3 => Self::vector(UInt, 3),
            gl::UNSIGNED_INT_VEC4 => Self::vector(UInt, 4),
            gl::BOOL => Self::vector(Bool, 1),
            gl::BOOL_VEC2 => Self::vector(Bool, 2),
            gl::BOOL_VEC3 => Self::vector(Bool, 3),
            gl::BOOL_VEC4 => Self::vector(Bool, 4),
            gl::FLOAT_MAT2 => Self::matrix(Float, 2),
            gl::FLOAT_MAT3 => Self::matrix(Float, 3),
            gl::FLOAT_MAT4 => Self::matrix(Float, 4),
            gl::DOUBLE_MAT2 => Self::matrix(Double, 2),
            gl::DOUBLE_MAT3 => Self::matrix(Double, 3),
            gl::DOUBLE_MAT4 => Self::matrix(Double, 4),
            gl::SAMPLER_2D
            | gl::SAMPLER_3D
            | gl::SAMPLER_CUBE
            | gl::SAMPLER_2D_SHADOW
            | gl::SAMPLER_2D_ARRAY
            | gl::INT_SAMPLER_2D
            | gl::UNSIGNED_INT_SAMPLER_2D => Self::Sampler(code),
            gl::IMAGE_2D => Self::Image(code),
            other => Self::Other(other),
        }
    }

    /// Whether `value` is a legal write for a uniform of this type.
    ///
    /// Samplers and images take an `int` unit. Booleans may be written with
    /// any scalar kind of the same width.
    pub fn accepts(self, value: &UniformValue) -> bool {
        let shape = value.shape();
        match self {
            Self::Other(_) => true,
            Self::Sampler(_) | Self::Image(_) => shape == Self::vector(ScalarKind::Int, 1),
            Self::Vector { scalar: ScalarKind::Bool, components } => match shape {
                Self::Vector { scalar, components: c } => c == components && scalar != ScalarKind::Double,
                _ => false,
            },
            _ => shape == self,
        }
    }
}

impl fmt::Display for UniformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Vector { scalar, components: 1 } => f.write_str(match scalar {
                ScalarKind::Float => "float",
                ScalarKind::Double => "double",
                ScalarKind::Int => "int",
                ScalarKind::UInt => "uint",
                ScalarKind::Bool => "bool",
            }),
            Self::Vector { scalar, components } => write!(f, "{}vec{}", scalar.prefix(), components),
            Self::Matrix { scalar, dim } => write!(f, "{}mat{}", scalar.prefix(), dim),
            Self::Sampler(code) => write!(f, "sampler (0x{:04X})", code),
            Self::Image(code) => write!(f, "image (0x{:04X})", code),
            Self::Other(code) => write!(f, "unknown (0x{:04X})", code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec3};

    #[test]
    fn table_names_round_trip_through_display() {
        let names = [
            (gl::FLOAT, "float"),
            (gl::FLOAT_VEC3, "vec3"),
            (gl::INT_VEC2, "ivec2"),
            (gl::UNSIGNED_INT, "uint"),
            (gl::BOOL_VEC4, "bvec4"),
            (gl::DOUBLE_VEC2, "dvec2"),
            (gl::FLOAT_MAT4, "mat4"),
            (gl::DOUBLE_MAT3, "dmat3"),
        ];
        for (code, name) in names {
            assert_eq!(UniformType::from_gl(code).to_string(), name);
        }
    }

    #[test]
    fn samplers_take_int_units() {
        let t = UniformType::from_gl(gl::SAMPLER_2D);
        assert!(t.accepts(&UniformValue::Int(3)));
        assert!(!t.accepts(&UniformValue::Float(3.0)));
    }

    #[test]
    fn bools_take_any_matching_width() {
        let t = UniformType::from_gl(gl::BOOL);
        assert!(t.accepts(&UniformValue::Bool(true)));
        assert!(t.accepts(&UniformValue::Int(1)));
        assert!(t.accepts(&UniformValue::Float(1.0)));
        assert!(!t.accepts(&UniformValue::Double(1.0)));
    }

    #[test]
    fn vectors_and_matrices_must_match_exactly() {
        let vec3 = UniformType::from_gl(gl::FLOAT_VEC3);
        assert!(vec3.accepts(&Vec3::ONE.into()));
        assert!(vec3.accepts(&vec![Vec3::ZERO; 4].into()));
        assert!(!vec3.accepts(&Mat4::IDENTITY.into()));
        assert!(UniformType::from_gl(gl::FLOAT_MAT4).accepts(&Mat4::IDENTITY.into()));
    }

    #[test]
    fn unknown_codes_skip_checks() {
        let t = UniformType::from_gl(0x1234);
        assert_eq!(t, UniformType::Other(0x1234));
        assert!(t.accepts(&UniformValue::UInt(0)));
    }
}
