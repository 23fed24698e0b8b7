use cgmath::{Matrix2, Matrix3, Matrix4, Vector2, Vector3, Vector4};

use super::reflect::{MemberType, ScalarKind};

/// A value that can be uploaded to a named uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Bool(bool),
    Int(i32),
    UInt(u32),
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    /// Column major.
    Mat2([[f32; 2]; 2]),
    Mat3([[f32; 3]; 3]),
    Mat4([[f32; 4]; 4]),
}

impl UniformValue {
    /// Encodes the value for a member of type `ty`.
    ///
    /// Returns `None` when the value does not fit the declared type. Booleans are accepted
    /// by integer members as 0 or 1.
    pub fn encode(&self, ty: MemberType) -> Option<Vec<u8>> {
        use MemberType::*;
        use ScalarKind::*;

        let bytes = match (*self, ty) {
            (UniformValue::Float(v), Scalar(F32)) => bytemuck::bytes_of(&v).to_vec(),
            (UniformValue::Int(v), Scalar(I32)) => bytemuck::bytes_of(&v).to_vec(),
            (UniformValue::UInt(v), Scalar(U32)) => bytemuck::bytes_of(&v).to_vec(),
            (UniformValue::Bool(v), Scalar(I32 | U32)) => bytemuck::bytes_of(&(v as u32)).to_vec(),
            (UniformValue::Vec2(v), Vector(2, F32)) => bytemuck::cast_slice(&v).to_vec(),
            (UniformValue::Vec3(v), Vector(3, F32)) => bytemuck::cast_slice(&v).to_vec(),
            (UniformValue::Vec4(v), Vector(4, F32)) => bytemuck::cast_slice(&v).to_vec(),
            (UniformValue::Mat2(m), Matrix(2)) => columns(&m, ty),
            (UniformValue::Mat3(m), Matrix(3)) => columns(&m, ty),
            (UniformValue::Mat4(m), Matrix(4)) => columns(&m, ty),
            _ => return None,
        };
        Some(bytes)
    }
}

/// Lays matrix columns out at the member's column stride.
fn columns<const N: usize>(m: &[[f32; N]; N], ty: MemberType) -> Vec<u8> {
    let stride = ty.column_stride() as usize;
    let mut bytes = vec![0u8; ty.size() as usize];
    for (i, column) in m.iter().enumerate() {
        let column: &[u8] = bytemuck::cast_slice(column);
        bytes[i * stride..i * stride + column.len()].copy_from_slice(column);
    }
    bytes
}

impl From<bool> for UniformValue {
    fn from(v: bool) -> Self {
        UniformValue::Bool(v)
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}

impl From<u32> for UniformValue {
    fn from(v: u32) -> Self {
        UniformValue::UInt(v)
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<Vector2<f32>> for UniformValue {
    fn from(v: Vector2<f32>) -> Self {
        UniformValue::Vec2(v.into())
    }
}

impl From<Vector3<f32>> for UniformValue {
    fn from(v: Vector3<f32>) -> Self {
        UniformValue::Vec3(v.into())
    }
}

impl From<Vector4<f32>> for UniformValue {
    fn from(v: Vector4<f32>) -> Self {
        UniformValue::Vec4(v.into())
    }
}

impl From<Matrix2<f32>> for UniformValue {
    fn from(m: Matrix2<f32>) -> Self {
        UniformValue::Mat2(m.into())
    }
}

impl From<Matrix3<f32>> for UniformValue {
    fn from(m: Matrix3<f32>) -> Self {
        UniformValue::Mat3(m.into())
    }
}

impl From<Matrix4<f32>> for UniformValue {
    fn from(m: Matrix4<f32>) -> Self {
        UniformValue::Mat4(m.into())
    }
}
