use super::kind::UniformType;
use super::value::UniformValue;
use crate::backend::{Backend, UniformTarget};

/// A reflected uniform: where it lives and what it holds.
///
/// Plain data; copy it freely. Writing goes through [`upload`](Self::upload),
/// which dispatches the value to one primitive backend call.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Uniform {
    location: i32,
    kind: UniformType,
    /// Array length (1 for non-arrays).
    count: u32,
}

impl Uniform {
    pub const fn new(location: i32, kind: UniformType, count: u32) -> Self {
        Self { location, kind, count }
    }

    #[inline]
    pub fn location(&self) -> i32 {
        self.location
    }

    #[inline]
    pub fn kind(&self) -> UniformType {
        self.kind
    }

    #[inline]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Writes `value`. Matrices honour `transpose`; other values ignore it.
    ///
    /// Debug builds check the value against the reflected type and skip
    /// mismatched writes with a warning. Returns whether a call was issued.
    pub fn upload(&self, backend: &mut dyn Backend, target: UniformTarget, value: &UniformValue, transpose: bool) -> bool {
        if cfg!(debug_assertions) && !self.kind.accepts(value) {
            log::warn!(
                "uniform at location {}: {} value written to a {} uniform; skipped",
                self.location,
                value.shape(),
                self.kind
            );
            return false;
        }
        if value.is_empty() {
            return false;
        }

        let loc = self.location;
        let t = target;
        match value {
            UniformValue::Bool(v) => backend.uniform_i32(t, loc, 1, &[*v as i32]),
            UniformValue::Int(v) => backend.uniform_i32(t, loc, 1, &[*v]),
            UniformValue::UInt(v) => backend.uniform_u32(t, loc, 1, &[*v]),
            UniformValue::Float(v) => backend.uniform_f32(t, loc, 1, &[*v]),
            UniformValue::Double(v) => backend.uniform_f64(t, loc, 1, &[*v]),
            UniformValue::Vec2(v) => backend.uniform_f32(t, loc, 2, &v.to_array()),
            UniformValue::Vec3(v) => backend.uniform_f32(t, loc, 3, &v.to_array()),
            UniformValue::Vec4(v) => backend.uniform_f32(t, loc, 4, &v.to_array()),
            UniformValue::IVec2(v) => backend.uniform_i32(t, loc, 2, &v.to_array()),
            UniformValue::IVec3(v) => backend.uniform_i32(t, loc, 3, &v.to_array()),
            UniformValue::IVec4(v) => backend.uniform_i32(t, loc, 4, &v.to_array()),
            UniformValue::UVec2(v) => backend.uniform_u32(t, loc, 2, &v.to_array()),
            UniformValue::UVec3(v) => backend.uniform_u32(t, loc, 3, &v.to_array()),
            UniformValue::UVec4(v) => backend.uniform_u32(t, loc, 4, &v.to_array()),
            UniformValue::DVec2(v) => backend.uniform_f64(t, loc, 2, &v.to_array()),
            UniformValue::DVec3(v) => backend.uniform_f64(t, loc, 3, &v.to_array()),
            UniformValue::DVec4(v) => backend.uniform_f64(t, loc, 4, &v.to_array()),
            UniformValue::Mat2(m) => backend.uniform_matrix_f32(t, loc, 2, transpose, &m.to_cols_array()),
            UniformValue::Mat3(m) => backend.uniform_matrix_f32(t, loc, 3, transpose, &m.to_cols_array()),
            UniformValue::Mat4(m) => backend.uniform_matrix_f32(t, loc, 4, transpose, &m.to_cols_array()),
            UniformValue::DMat2(m) => backend.uniform_matrix_f64(t, loc, 2, transpose, &m.to_cols_array()),
            UniformValue::DMat3(m) => backend.uniform_matrix_f64(t, loc, 3, transpose, &m.to_cols_array()),
            UniformValue::DMat4(m) => backend.uniform_matrix_f64(t, loc, 4, transpose, &m.to_cols_array()),
            UniformValue::IntArray(v) => backend.uniform_i32(t, loc, 1, v),
            UniformValue::FloatArray(v) => backend.uniform_f32(t, loc, 1, v),
            UniformValue::Vec2Array(v) => {
                let flat: Vec<f32> = v.iter().flat_map(|e| e.to_array()).collect();
                backend.uniform_f32(t, loc, 2, &flat)
            }
            UniformValue::Vec3Array(v) => {
                let flat: Vec<f32> = v.iter().flat_map(|e| e.to_array()).collect();
                backend.uniform_f32(t, loc, 3, &flat)
            }
            UniformValue::Vec4Array(v) => {
                let flat: Vec<f32> = v.iter().flat_map(|e| e.to_array()).collect();
                backend.uniform_f32(t, loc, 4, &flat)
            }
            UniformValue::Mat4Array(v) => {
                let flat: Vec<f32> = v.iter().flat_map(|e| e.to_cols_array()).collect();
                backend.uniform_matrix_f32(t, loc, 4, transpose, &flat)
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{HeadlessBackend, UniformData, gl};
    use crate::handle::Handle;
    use glam::{Mat4, Vec3};

    fn vec3_uniform() -> Uniform {
        Uniform::new(2, UniformType::from_gl(gl::FLOAT_VEC3), 1)
    }

    #[test]
    fn vector_goes_through_float_call() {
        let mut b = HeadlessBackend::new();
        let journal = b.journal();
        assert!(vec3_uniform().upload(&mut b, UniformTarget::Bound, &Vec3::new(1.0, 2.0, 3.0).into(), false));
        let write = journal.last_uniform_write().unwrap();
        assert_eq!(write.components, 3);
        assert_eq!(write.data, UniformData::F32(vec![1.0, 2.0, 3.0]));
        assert_eq!(journal.count("uniform_f32"), 1);
    }

    #[test]
    fn matrix_carries_transpose_flag() {
        let mut b = HeadlessBackend::new();
        let journal = b.journal();
        let u = Uniform::new(0, UniformType::from_gl(gl::FLOAT_MAT4), 1);
        u.upload(&mut b, UniformTarget::Program(Handle(7)), &Mat4::IDENTITY.into(), true);
        let write = journal.last_uniform_write().unwrap();
        assert!(write.transpose);
        assert_eq!(write.program, Handle(7));
    }

    #[cfg(debug_assertions)]
    #[test]
    fn mismatched_type_is_skipped_in_debug() {
        let mut b = HeadlessBackend::new();
        let journal = b.journal();
        assert!(!vec3_uniform().upload(&mut b, UniformTarget::Bound, &UniformValue::Int(1), false));
        assert!(journal.uniform_writes().is_empty());
    }

    #[test]
    fn empty_array_issues_nothing() {
        let mut b = HeadlessBackend::new();
        let journal = b.journal();
        assert!(!vec3_uniform().upload(&mut b, UniformTarget::Bound, &UniformValue::Vec3Array(Vec::new()), false));
        assert!(journal.calls().is_empty());
    }
}
