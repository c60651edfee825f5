//! 正射影のオービットカメラとワイヤーフレーム抽出

use nalgebra::{Matrix4, Point3, Vector3};

use crate::config::ViewerConfig;
use crate::scene::{Geometry, NodeRole, Scene};

/// 注視点の周りを回る正射影カメラ
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitCamera {
    pub focus: Vector3<f32>,
    pub yaw: f32,
    pub pitch: f32,
    pub radius: f32,
    /// シーン単位 → ピクセル
    pub scale: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self { focus: Vector3::zeros(), yaw: 0.0, pitch: 0.0, radius: 10.0, scale: 220.0 }
    }
}

impl OrbitCamera {
    pub fn from_config(config: &ViewerConfig) -> Self {
        Self {
            yaw: config.yaw_deg.to_radians(),
            pitch: config.pitch_deg.to_radians(),
            scale: config.scale,
            ..Self::default()
        }
    }

    fn basis(&self) -> (Vector3<f32>, Vector3<f32>, Vector3<f32>) {
        let (sy, cy) = self.yaw.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();
        let forward = Vector3::new(-cp * sy, -sp, -cp * cy);
        let right = Vector3::new(cy, 0.0, -sy);
        let up = Vector3::new(-sp * sy, cp, -sp * cy);
        (forward, right, up)
    }

    pub fn eye(&self) -> Vector3<f32> {
        let (sy, cy) = self.yaw.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();
        self.focus + Vector3::new(cp * sy, sp, cp * cy) * self.radius
    }

    /// ワールド座標 → (ピクセルx, ピクセルy, 奥行き)
    ///
    /// カメラの背後（奥行き < 0.01）は None。
    pub fn project(&self, p: &Vector3<f32>, width: usize, height: usize) -> Option<(f32, f32, f32)> {
        let (forward, right, up) = self.basis();
        let d = p - self.eye();
        let depth = d.dot(&forward);
        if depth < 0.01 {
            return None;
        }
        let x = d.dot(&right);
        let y = d.dot(&up);
        // 画面はY下向き
        Some((
            width as f32 / 2.0 + x * self.scale,
            height as f32 / 2.0 - y * self.scale,
            depth,
        ))
    }

    pub fn orbit(&mut self, d_yaw: f32, d_pitch: f32) {
        let limit = std::f32::consts::FRAC_PI_2 - 0.01;
        self.yaw += d_yaw;
        self.pitch = (self.pitch + d_pitch).clamp(-limit, limit);
    }

    pub fn zoom(&mut self, factor: f32) {
        self.scale = (self.scale * factor).clamp(10.0, 5000.0);
    }
}

/// ワイヤーフレームの線分（ワールド座標）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: Vector3<f32>,
    pub end: Vector3<f32>,
    pub color: u32,
    pub opacity: f32,
}

/// 色が指定されていない形状（テクスチャ付き平面の枠など）
pub const OUTLINE_COLOR: u32 = 0x5A5A5E;

/// 形状のローカル頂点と辺
fn geometry_edges(geometry: &Geometry) -> (Vec<Vector3<f32>>, Vec<(usize, usize)>) {
    match *geometry {
        Geometry::Box { width, height, length, .. } => {
            let (hx, hy, hz) = (width / 2.0, height / 2.0, length / 2.0);
            let mut vertices = Vec::with_capacity(8);
            for &z in &[-hz, hz] {
                for &(x, y) in &[(-hx, -hy), (hx, -hy), (hx, hy), (-hx, hy)] {
                    vertices.push(Vector3::new(x, y, z));
                }
            }
            let edges = vec![
                (0, 1), (1, 2), (2, 3), (3, 0),
                (4, 5), (5, 6), (6, 7), (7, 4),
                (0, 4), (1, 5), (2, 6), (3, 7),
            ];
            (vertices, edges)
        }
        Geometry::Plane { width, height } => {
            let (hx, hy) = (width / 2.0, height / 2.0);
            let vertices = vec![
                Vector3::new(-hx, -hy, 0.0),
                Vector3::new(hx, -hy, 0.0),
                Vector3::new(hx, hy, 0.0),
                Vector3::new(-hx, hy, 0.0),
            ];
            (vertices, vec![(0, 1), (1, 2), (2, 3), (3, 0)])
        }
        Geometry::Pyramid { width, height, length } => {
            let (hx, hz) = (width / 2.0, length / 2.0);
            let vertices = vec![
                Vector3::new(-hx, 0.0, -hz),
                Vector3::new(hx, 0.0, -hz),
                Vector3::new(hx, 0.0, hz),
                Vector3::new(-hx, 0.0, hz),
                Vector3::new(0.0, height, 0.0),
            ];
            let edges = vec![(0, 1), (1, 2), (2, 3), (3, 0), (0, 4), (1, 4), (2, 4), (3, 4)];
            (vertices, edges)
        }
    }
}

fn transform_point(m: &Matrix4<f32>, v: &Vector3<f32>) -> Vector3<f32> {
    m.transform_point(&Point3::from(*v)).coords
}

/// 表示中のノードの形状を線分に分解
pub fn wireframe(scene: &Scene) -> Vec<Segment> {
    let mut segments = Vec::new();
    scene.visit(|node, world| {
        if node.hidden {
            return;
        }
        let geometry = match &node.geometry {
            Some(g) => g,
            None => return,
        };
        let color = node.material.color.unwrap_or(OUTLINE_COLOR);
        let (vertices, edges) = geometry_edges(geometry);
        let world_vertices: Vec<_> = vertices.iter().map(|v| transform_point(world, v)).collect();
        for (a, b) in edges {
            segments.push(Segment {
                start: world_vertices[a],
                end: world_vertices[b],
                color,
                opacity: node.opacity,
            });
        }
    });
    segments
}

/// 関節マーカーの中心（ワールド座標）と色
pub fn joint_centers(scene: &Scene) -> Vec<(Vector3<f32>, u32)> {
    let mut centers = Vec::new();
    scene.visit(|node, world| {
        if node.hidden || !matches!(node.role, NodeRole::Joint(_)) {
            return;
        }
        let color = node.material.color.unwrap_or(OUTLINE_COLOR);
        centers.push((transform_point(world, &Vector3::zeros()), color));
    });
    centers
}

/// 平面上の正規化座標 (u, v) のワールド位置。v=0 が画像の上端
pub fn plane_point(world: &Matrix4<f32>, width: f32, height: f32, u: f32, v: f32) -> Vector3<f32> {
    let local = Vector3::new((u - 0.5) * width, (0.5 - v) * height, 0.0);
    transform_point(world, &local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{SceneNode, NodeRole};
    use crate::pose::JointName;

    #[test]
    fn test_project_center() {
        let cam = OrbitCamera::default();
        let (x, y, depth) = cam.project(&Vector3::zeros(), 200, 100).unwrap();
        assert!((x - 100.0).abs() < 1e-4);
        assert!((y - 50.0).abs() < 1e-4);
        assert!((depth - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_project_up_is_screen_up() {
        let cam = OrbitCamera::default();
        let (_, y, _) = cam.project(&Vector3::new(0.0, 1.0, 0.0), 200, 100).unwrap();
        assert!((y - (50.0 - 220.0)).abs() < 1e-3);
        let (x, _, _) = cam.project(&Vector3::new(1.0, 0.0, 0.0), 200, 100).unwrap();
        assert!((x - (100.0 + 220.0)).abs() < 1e-3);
    }

    #[test]
    fn test_project_behind_camera() {
        let cam = OrbitCamera::default();
        assert!(cam.project(&Vector3::new(0.0, 0.0, 20.0), 200, 100).is_none());
    }

    #[test]
    fn test_orbit_clamps_pitch() {
        let mut cam = OrbitCamera::default();
        cam.orbit(0.0, 10.0);
        assert!(cam.pitch < std::f32::consts::FRAC_PI_2);
    }

    #[test]
    fn test_wireframe_edges() {
        let mut scene = Scene::new();
        scene.root.add_child(
            SceneNode::new("j", NodeRole::Joint(JointName::Root)).with_geometry(Geometry::cube(0.1)),
        );
        let mut hidden = SceneNode::new("h", NodeRole::Joint(JointName::TopHead))
            .with_geometry(Geometry::cube(0.1));
        hidden.hidden = true;
        scene.root.add_child(hidden);
        scene.root.add_child(
            SceneNode::new("c", NodeRole::CameraIndicator)
                .with_geometry(Geometry::Pyramid { width: 0.25, height: 0.25, length: 0.25 }),
        );
        let segments = wireframe(&scene);
        assert_eq!(segments.len(), 12 + 8);
        assert_eq!(joint_centers(&scene).len(), 1);
    }

    #[test]
    fn test_plane_point_corners() {
        let world = Matrix4::new_translation(&Vector3::new(1.0, 0.0, 0.0));
        let top_left = plane_point(&world, 2.0, 1.0, 0.0, 0.0);
        assert!((top_left - Vector3::new(0.0, 0.5, 0.0)).norm() < 1e-6);
    }
}
