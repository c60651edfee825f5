use nalgebra::{Matrix3, Matrix4, Vector3};
use serde::{Deserialize, Serialize};

/// 長さ・距離の下限（ゼロ長ジオメトリ回避）
pub const MIN_LENGTH: f32 = 1e-5;

/// X軸まわりの回転行列（右手系）
pub fn rotation_x(angle: f32) -> Matrix3<f32> {
    let (s, c) = angle.sin_cos();
    Matrix3::new(
        1.0, 0.0, 0.0,
        0.0, c, -s,
        0.0, s, c,
    )
}

/// Y軸まわりの回転行列
pub fn rotation_y(angle: f32) -> Matrix3<f32> {
    let (s, c) = angle.sin_cos();
    Matrix3::new(
        c, 0.0, s,
        0.0, 1.0, 0.0,
        -s, 0.0, c,
    )
}

/// Z軸まわりの回転行列
pub fn rotation_z(angle: f32) -> Matrix3<f32> {
    let (s, c) = angle.sin_cos();
    Matrix3::new(
        c, -s, 0.0,
        s, c, 0.0,
        0.0, 0.0, 1.0,
    )
}

/// 4x4同次変換の並進成分（第3列）
pub fn translation_vector(m: &Matrix4<f32>) -> Vector3<f32> {
    Vector3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)])
}

/// 並進成分を0にした変換（回転のみ残す）
pub fn without_translation(m: &Matrix4<f32>) -> Matrix4<f32> {
    let mut r = *m;
    r[(0, 3)] = 0.0;
    r[(1, 3)] = 0.0;
    r[(2, 3)] = 0.0;
    r[(3, 0)] = 0.0;
    r[(3, 1)] = 0.0;
    r[(3, 2)] = 0.0;
    r[(3, 3)] = 1.0;
    r
}

/// 左上3x3（回転部）
pub fn rotation_part(m: &Matrix4<f32>) -> Matrix3<f32> {
    m.fixed_view::<3, 3>(0, 0).into_owned()
}

/// 逆行列。特異なら単位行列
pub fn inverse_or_identity(m: &Matrix4<f32>) -> Matrix4<f32> {
    m.try_inverse().unwrap_or_else(Matrix4::identity)
}

/// 列優先16要素から4x4行列を構築
pub fn matrix_from_columns(values: &[f32; 16]) -> Matrix4<f32> {
    Matrix4::from_column_slice(values)
}

/// 4x4行列を列優先16要素に変換
pub fn matrix_to_columns(m: &Matrix4<f32>) -> [f32; 16] {
    let mut out = [0.0f32; 16];
    out.copy_from_slice(m.as_slice());
    out
}

/// オイラー角 (pitch=X, yaw=Y, roll=Z)
///
/// 回転はroll → yaw → pitchの順に適用する: R = Rx(pitch) * Ry(yaw) * Rz(roll)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EulerAngles {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

impl EulerAngles {
    pub fn new(pitch: f32, yaw: f32, roll: f32) -> Self {
        Self { pitch, yaw, roll }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn to_rotation(&self) -> Matrix3<f32> {
        rotation_x(self.pitch) * rotation_y(self.yaw) * rotation_z(self.roll)
    }

    pub fn is_finite(&self) -> bool {
        self.pitch.is_finite() && self.yaw.is_finite() && self.roll.is_finite()
    }
}
