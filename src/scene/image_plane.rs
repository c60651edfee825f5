//! 入力画像を貼る背景平面

use std::sync::Arc;

use nalgebra::Vector2;
use serde::Serialize;

use crate::math::{inverse_or_identity, without_translation};
use crate::pose::{JointName, Observation};
use super::image::SourceImage;
use super::node::{Geometry, Material, NodeRole, SceneNode};

pub const IMAGE_PLANE_NAME: &str = "image_plane";

/// 平面の大きさ（シーン単位）
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlaneSize {
    pub width: f32,
    pub height: f32,
}

impl PlaneSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn scaled(&self, factor: f32) -> Self {
        Self::new(self.width * factor, self.height * factor)
    }

    pub fn as_vector(&self) -> Vector2<f32> {
        Vector2::new(self.width, self.height)
    }
}

impl From<[f32; 2]> for PlaneSize {
    fn from(v: [f32; 2]) -> Self {
        Self::new(v[0], v[1])
    }
}

/// 画像平面ノードを作る
///
/// 幅は画像のアスペクト比に合わせ、高さは `base_size.height` のまま。
/// 向きはカメラ姿勢（並進を除く）の逆回転。
/// 画像が読めなかった場合はテクスチャなし・`base_size` のまま。
pub fn build_image_plane(
    image: Option<&Arc<SourceImage>>,
    observation: &Observation,
    base_size: PlaneSize,
    alpha: f32,
) -> (SceneNode, PlaneSize) {
    let size = match image {
        Some(img) => PlaneSize::new(base_size.height * img.aspect_ratio(), base_size.height),
        None => {
            log::warn!("Source image unavailable; image plane is untextured");
            base_size
        }
    };

    let mut node = SceneNode::new(IMAGE_PLANE_NAME, NodeRole::ImagePlane).with_geometry(
        Geometry::Plane { width: size.width, height: size.height },
    );
    node.material = Material {
        texture: image.cloned(),
        color: None,
        double_sided: true,
    };
    node.opacity = alpha;

    let rotation_only = without_translation(observation.camera_origin_matrix());
    node.set_transform(&inverse_or_identity(&rotation_only));

    (node, size)
}

/// 平面の形状だけを差し替える（マテリアルは維持）
pub fn resize_image_plane(node: &mut SceneNode, size: PlaneSize) {
    node.geometry = Some(Geometry::Plane { width: size.width, height: size.height });
}

/// ルート関節の画像内位置を平面ローカル座標へ変換
///
/// 平面中心が原点になるよう `p * size - size / 2`。ルートがない・値が壊れていれば (0, 0)。
pub fn compute_root_offset(observation: &Observation, size: PlaneSize) -> Vector2<f32> {
    match observation.point_in_image(JointName::Root) {
        Ok(p) => {
            let s = size.as_vector();
            let offset = p.component_mul(&s) - s / 2.0;
            if offset.iter().all(|v| v.is_finite()) {
                offset
            } else {
                log::warn!("Root image point is not finite; plane stays centered");
                Vector2::zeros()
            }
        }
        Err(e) => {
            log::debug!("Root offset unavailable: {}", e);
            Vector2::zeros()
        }
    }
}
