use glam::{DMat2, DMat3, DMat4, DVec2, DVec3, DVec4, IVec2, IVec3, IVec4, Mat2, Mat3, Mat4, UVec2, UVec3, UVec4, Vec2, Vec3, Vec4};

use super::kind::{ScalarKind, UniformType};
use crate::color::Color;

/// A value that can be written to a uniform.
///
/// The closed set of payloads the primitive upload calls understand. Array
/// variants write consecutive elements starting at the uniform's location.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Bool(bool),
    Int(i32),
    UInt(u32),
    Float(f32),
    Double(f64),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    IVec2(IVec2),
    IVec3(IVec3),
    IVec4(IVec4),
    UVec2(UVec2),
    UVec3(UVec3),
    UVec4(UVec4),
    DVec2(DVec2),
    DVec3(DVec3),
    DVec4(DVec4),
    Mat2(Mat2),
    Mat3(Mat3),
    Mat4(Mat4),
    DMat2(DMat2),
    DMat3(DMat3),
    DMat4(DMat4),
    IntArray(Vec<i32>),
    FloatArray(Vec<f32>),
    Vec2Array(Vec<Vec2>),
    Vec3Array(Vec<Vec3>),
    Vec4Array(Vec<Vec4>),
    Mat4Array(Vec<Mat4>),
}

impl UniformValue {
    /// Type of one element, in the reflected-type vocabulary.
    pub fn shape(&self) -> UniformType {
        use ScalarKind::*;
        let (scalar, components) = match self {
            Self::Bool(_) => (Bool, 1),
            Self::Int(_) | Self::IntArray(_) => (Int, 1),
            Self::UInt(_) => (UInt, 1),
            Self::Float(_) | Self::FloatArray(_) => (Float, 1),
            Self::Double(_) => (Double, 1),
            Self::Vec2(_) | Self::Vec2Array(_) => (Float, 2),
            Self::Vec3(_) | Self::Vec3Array(_) => (Float, 3),
            Self::Vec4(_) | Self::Vec4Array(_) => (Float, 4),
            Self::IVec2(_) => (Int, 2),
            Self::IVec3(_) => (Int, 3),
            Self::IVec4(_) => (Int, 4),
            Self::UVec2(_) => (UInt, 2),
            Self::UVec3(_) => (UInt, 3),
            Self::UVec4(_) => (UInt, 4),
            Self::DVec2(_) => (Double, 2),
            Self::DVec3(_) => (Double, 3),
            Self::DVec4(_) => (Double, 4),
            Self::Mat2(_) => return UniformType::Matrix { scalar: Float, dim: 2 },
            Self::Mat3(_) => return UniformType::Matrix { scalar: Float, dim: 3 },
            Self::Mat4(_) | Self::Mat4Array(_) => return UniformType::Matrix { scalar: Float, dim: 4 },
            Self::DMat2(_) => return UniformType::Matrix { scalar: Double, dim: 2 },
            Self::DMat3(_) => return UniformType::Matrix { scalar: Double, dim: 3 },
            Self::DMat4(_) => return UniformType::Matrix { scalar: Double, dim: 4 },
        };
        UniformType::Vector { scalar, components }
    }

    /// Number of array elements written (1 for non-arrays).
    pub fn len(&self) -> usize {
        match self {
            Self::IntArray(v) => v.len(),
            Self::FloatArray(v) => v.len(),
            Self::Vec2Array(v) => v.len(),
            Self::Vec3Array(v) => v.len(),
            Self::Vec4Array(v) => v.len(),
            Self::Mat4Array(v) => v.len(),
            _ => 1,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for UniformValue {
                #[inline]
                fn from(v: $ty) -> Self {
                    Self::$variant(v)
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i32 => Int,
    u32 => UInt,
    f32 => Float,
    f64 => Double,
    Vec2 => Vec2,
    Vec3 => Vec3,
    Vec4 => Vec4,
    IVec2 => IVec2,
    IVec3 => IVec3,
    IVec4 => IVec4,
    UVec2 => UVec2,
    UVec3 => UVec3,
    UVec4 => UVec4,
    DVec2 => DVec2,
    DVec3 => DVec3,
    DVec4 => DVec4,
    Mat2 => Mat2,
    Mat3 => Mat3,
    Mat4 => Mat4,
    DMat2 => DMat2,
    DMat3 => DMat3,
    DMat4 => DMat4,
    Vec<i32> => IntArray,
    Vec<f32> => FloatArray,
    Vec<Vec2> => Vec2Array,
    Vec<Vec3> => Vec3Array,
    Vec<Vec4> => Vec4Array,
    Vec<Mat4> => Mat4Array,
}

impl From<[f32; 2]> for UniformValue {
    fn from(v: [f32; 2]) -> Self {
        Self::Vec2(Vec2::from_array(v))
    }
}

impl From<[f32; 3]> for UniformValue {
    fn from(v: [f32; 3]) -> Self {
        Self::Vec3(Vec3::from_array(v))
    }
}

impl From<[f32; 4]> for UniformValue {
    fn from(v: [f32; 4]) -> Self {
        Self::Vec4(Vec4::from_array(v))
    }
}

impl From<&[f32]> for UniformValue {
    fn from(v: &[f32]) -> Self {
        Self::FloatArray(v.to_vec())
    }
}

impl From<&[Vec3]> for UniformValue {
    fn from(v: &[Vec3]) -> Self {
        Self::Vec3Array(v.to_vec())
    }
}

impl From<&[Vec4]> for UniformValue {
    fn from(v: &[Vec4]) -> Self {
        Self::Vec4Array(v.to_vec())
    }
}

impl From<&[Mat4]> for UniformValue {
    fn from(v: &[Mat4]) -> Self {
        Self::Mat4Array(v.to_vec())
    }
}

/// Colors are written as linear RGBA `vec4`s.
impl From<Color> for UniformValue {
    fn from(c: Color) -> Self {
        Self::Vec4(Vec4::from_array(c.to_array()))
    }
}
