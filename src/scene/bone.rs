//! 関節と親関節をつなぐ骨
//!
//! 骨の向きは両端点からではなく、子関節の親相対ローカル変換から求める。
//! pitch/yaw/roll の式は検出器の座標系に依存する外部契約なので変形しない。

use std::f32::consts::FRAC_PI_2;

use nalgebra::Vector3;

use crate::error::{Result, SceneError};
use crate::math::{EulerAngles, MIN_LENGTH};
use crate::pose::{JointName, Observation};
use super::node::{Geometry, Material, NodeRole, SceneNode, BONE_COLOR};
use super::skeleton::JointNodeMap;

/// 骨を接続する順序（手首→肘→肩→肩中心→背骨→足首→膝→腰）
pub const BONE_ORDER: [JointName; 14] = [
    JointName::LeftWrist,
    JointName::LeftElbow,
    JointName::LeftShoulder,
    JointName::RightWrist,
    JointName::RightElbow,
    JointName::RightShoulder,
    JointName::CenterShoulder,
    JointName::Spine,
    JointName::RightAnkle,
    JointName::RightKnee,
    JointName::RightHip,
    JointName::LeftAnkle,
    JointName::LeftKnee,
    JointName::LeftHip,
];

/// 骨1本の配置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneTransform {
    pub midpoint: Vector3<f32>,
    pub length: f32,
    pub orientation: EulerAngles,
}

/// 親相対の並進から骨の向きを求める
///
/// - pitch: π/2 固定（箱の長軸Yを接続方向の基準に合わせる）
/// - yaw: acos(t.z / |t|)
/// - roll: atan2(t.y, t.x)
///
/// 長さがほぼ0なら `DegenerateGeometry`。
pub fn local_angle_to_parent(local_translation: &Vector3<f32>) -> Result<EulerAngles> {
    let len = local_translation.norm();
    if !len.is_finite() || len < MIN_LENGTH {
        return Err(SceneError::DegenerateGeometry("local translation has no length"));
    }
    let pitch = FRAC_PI_2;
    let yaw = (local_translation.z / len).clamp(-1.0, 1.0).acos();
    let roll = f32::atan2(local_translation.y, local_translation.x);
    Ok(EulerAngles::new(pitch, yaw, roll))
}

/// 子・親の位置と子のローカル並進から骨の配置を計算
///
/// 長さと中点は端点の入れ替えに対して対称、向きは子のローカル並進のみで決まる。
/// 向きが求まらなければゼロ角度（描画はするが回転なし）。
pub fn compute_bone_transform(
    child: &Vector3<f32>,
    parent: &Vector3<f32>,
    local_translation: Option<&Vector3<f32>>,
) -> BoneTransform {
    let length = (parent - child).norm().max(MIN_LENGTH);
    let midpoint = (parent + child) / 2.0;
    let orientation = local_translation
        .and_then(|t| local_angle_to_parent(t).ok())
        .unwrap_or_else(EulerAngles::zero);
    BoneTransform { midpoint, length, orientation }
}

pub fn bone_node_name(joint: JointName) -> String {
    format!("bone:{}", joint)
}

/// 骨の箱ノード（断面 width × width、長さ方向はY）
pub fn build_bone_node(joint: JointName, transform: &BoneTransform, width: f32) -> SceneNode {
    let mut node = SceneNode::new(bone_node_name(joint), NodeRole::Bone(joint))
        .with_geometry(Geometry::Box {
            width,
            height: transform.length,
            length: width,
            chamfer_radius: width,
        })
        .at(transform.midpoint);
    node.set_euler_angles(transform.orientation);
    node.material = Material::color(BONE_COLOR);
    node
}

/// 関節を親関節に接続する骨を作る
///
/// ルート（親なし）、関節ノードなし、親ノードなしの場合は None。
pub fn connect_to_parent(
    joint: JointName,
    observation: &Observation,
    nodes: &JointNodeMap,
    bone_width: f32,
) -> Option<SceneNode> {
    let parent = observation.parent_joint_name(joint)?;
    let node = nodes.get(&joint)?;
    let parent_node = nodes.get(&parent)?;

    let local = match observation.recognized_point(joint) {
        Ok(point) => Some(point.local_translation()),
        Err(e) => {
            log::warn!("Unable to return point: {}", e);
            None
        }
    };
    if let Some(Err(e)) = local.as_ref().map(local_angle_to_parent) {
        log::warn!("Bone {} -> {} drawn unrotated: {}", joint, parent, e);
    }

    let transform = compute_bone_transform(&node.position, &parent_node.position, local.as_ref());
    Some(build_bone_node(joint, &transform, bone_width))
}

/// 頭の特別扱い
///
/// 頭頂・頭中心・肩中心がそろっていれば、頭中心のマーカーを
/// 肩中心から頭頂の高さまでの箱に差し替え、頭頂マーカーは隠す。
/// 差し替えたら true。
pub fn apply_head_box(nodes: &mut JointNodeMap, head_width: f32) -> bool {
    let (top_y, shoulder_y) = match (
        nodes.get(&JointName::TopHead),
        nodes.get(&JointName::CenterShoulder),
    ) {
        (Some(top), Some(shoulder)) => (top.position.y, shoulder.position.y),
        _ => return false,
    };
    if !nodes.contains_key(&JointName::CenterHead) {
        return false;
    }

    let head_height = (top_y - shoulder_y).abs().max(MIN_LENGTH);
    if let Some(center_head) = nodes.get_mut(&JointName::CenterHead) {
        center_head.geometry = Some(Geometry::Box {
            width: head_width,
            height: head_height,
            length: head_width,
            chamfer_radius: 0.4,
        });
        center_head.material = Material::color(BONE_COLOR);
    }
    if let Some(top_head) = nodes.get_mut(&JointName::TopHead) {
        top_head.hidden = true;
    }
    true
}
