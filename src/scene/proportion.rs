//! 3D骨格と2D画像の縮尺比
//!
//! 既知の2関節（肩中心と背骨）の距離を3D・2Dの両方で測り、
//! 画像平面を骨格の見かけの大きさに合わせるための倍率を求める。

use nalgebra::Vector2;

use crate::pose::{JointName, Observation};
use super::image_plane::PlaneSize;
use super::skeleton::JointNodeMap;

/// 2D距離の下限。これ未満は推定失敗とみなす
pub const MIN_IMAGE_DISTANCE: f32 = 1e-6;

/// 推定できないときの倍率
pub const FALLBACK_SCALE: f32 = 1.0;

/// 2関節間の3D/2D距離比
///
/// 3D側は関節ノード位置のXYを平面サイズで正規化した距離、
/// 2D側は正規化画像座標の距離。失敗時は `FALLBACK_SCALE`。
pub fn estimate_scale(
    observation: &Observation,
    nodes: &JointNodeMap,
    a: JointName,
    b: JointName,
    plane_size: PlaneSize,
) -> f32 {
    if !observation.is_available(a) || !observation.is_available(b) {
        log::debug!("Scale reference joints {} / {} not detected", a, b);
        return FALLBACK_SCALE;
    }
    let (node_a, node_b) = match (nodes.get(&a), nodes.get(&b)) {
        (Some(na), Some(nb)) => (na, nb),
        _ => return FALLBACK_SCALE,
    };
    if plane_size.width <= 0.0 || plane_size.height <= 0.0 {
        return FALLBACK_SCALE;
    }

    let normalized = |p: &nalgebra::Vector3<f32>| {
        Vector2::new(p.x / plane_size.width, p.y / plane_size.height)
    };
    let distance_3d = (normalized(&node_a.position) - normalized(&node_b.position)).norm();

    let (pa, pb) = match (observation.point_in_image(a), observation.point_in_image(b)) {
        (Ok(pa), Ok(pb)) => (pa, pb),
        (Err(e), _) | (_, Err(e)) => {
            log::warn!("Unable to return point: {}", e);
            return FALLBACK_SCALE;
        }
    };
    let distance_2d = (pa - pb).norm();
    if distance_2d < MIN_IMAGE_DISTANCE {
        log::warn!("Degenerate image distance between {} and {}", a, b);
        return FALLBACK_SCALE;
    }

    let scale = distance_3d / distance_2d;
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        FALLBACK_SCALE
    }
}

/// 肩中心と背骨を基準にした倍率
pub fn estimate_skeleton_scale(
    observation: &Observation,
    nodes: &JointNodeMap,
    plane_size: PlaneSize,
) -> f32 {
    estimate_scale(
        observation,
        nodes,
        JointName::CenterShoulder,
        JointName::Spine,
        plane_size,
    )
}
