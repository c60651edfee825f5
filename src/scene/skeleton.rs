use std::collections::BTreeMap;

use nalgebra::Vector3;

use crate::pose::{JointName, Observation};
use super::node::{Geometry, Material, NodeRole, SceneNode, JOINT_COLOR};

/// 関節ごとのノード（構築1回分、検出された関節のみ）
pub type JointNodeMap = BTreeMap<JointName, SceneNode>;

/// 関節マーカーのノード名
pub fn joint_node_name(joint: JointName) -> String {
    format!("joint:{}", joint)
}

/// 検出された関節ごとにマーカーノードを作る
///
/// 位置を解決できない関節はスキップする。
pub fn build_joint_nodes(observation: &Observation, marker_size: f32) -> JointNodeMap {
    let mut nodes = JointNodeMap::new();
    for &joint in observation.available_joint_names() {
        match observation.recognized_point(joint) {
            Ok(point) => {
                let node = create_marker_node(joint, point.translation(), marker_size);
                nodes.insert(joint, node);
            }
            Err(e) => log::warn!("Unable to return point: {}", e),
        }
    }
    nodes
}

fn create_marker_node(joint: JointName, position: Vector3<f32>, size: f32) -> SceneNode {
    let mut node = SceneNode::new(joint_node_name(joint), NodeRole::Joint(joint))
        .with_geometry(Geometry::cube(size))
        .at(position);
    node.material = Material::color(JOINT_COLOR);
    node
}
