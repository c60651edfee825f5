use std::f32::consts::FRAC_PI_2;
use std::fmt;

use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};

use crate::config::RenderConfig;
use crate::math::rotation_x;
use crate::pose::Observation;
use super::node::{Geometry, Material, NodeRole, SceneNode, CAMERA_COLOR};

pub const CAMERA_NODE_NAME: &str = "camera";

/// カメラの表示方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraMode {
    /// 検出時のカメラ姿勢をそのまま視点ノードにする
    Literal,
    /// カメラ位置に向き付きのピラミッドを置く
    #[default]
    Indicator,
}

impl CameraMode {
    pub fn toggle(self) -> Self {
        match self {
            CameraMode::Literal => CameraMode::Indicator,
            CameraMode::Indicator => CameraMode::Literal,
        }
    }
}

impl fmt::Display for CameraMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraMode::Literal => write!(f, "literal"),
            CameraMode::Indicator => write!(f, "indicator"),
        }
    }
}

/// 表示モードに応じたピボット
///
/// ピラミッドは +Y が頂点なので、X軸で -90° 倒してカメラの視線方向に向ける。
pub fn camera_representation_pivot(camera_pose: &Matrix4<f32>, mode: CameraMode) -> Matrix4<f32> {
    match mode {
        CameraMode::Literal => *camera_pose,
        CameraMode::Indicator => rotation_x(-FRAC_PI_2).to_homogeneous() * camera_pose,
    }
}

/// カメラノードを作る（失敗しない）
pub fn build_camera_node(observation: &Observation, mode: CameraMode, config: &RenderConfig) -> SceneNode {
    let pose = observation.camera_origin_matrix();
    let mut node = SceneNode::new(CAMERA_NODE_NAME, match mode {
        CameraMode::Literal => NodeRole::Camera,
        CameraMode::Indicator => NodeRole::CameraIndicator,
    });
    node.pivot = camera_representation_pivot(pose, mode);

    if mode == CameraMode::Indicator {
        let s = config.camera_pyramid_size;
        node.geometry = Some(Geometry::Pyramid { width: s, height: s, length: s });
        node.material = Material::color(CAMERA_COLOR);
        node.opacity = config.camera_node_alpha;
    }
    node
}
