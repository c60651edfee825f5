use std::sync::Arc;

use nalgebra::{Matrix3, Matrix4, Vector3};
use serde::Serialize;

use crate::math::{inverse_or_identity, rotation_part, translation_vector, EulerAngles};
use crate::pose::JointName;
use super::image::SourceImage;

/// 骨・頭の色 (RGB)
pub const BONE_COLOR: u32 = 0x8E8E93; // グレー

/// 関節マーカーの色 (RGB)
pub const JOINT_COLOR: u32 = 0xFFFFFF;

/// カメラ表示の色 (RGB)
pub const CAMERA_COLOR: u32 = 0x000000;

/// ノードの形状（ローカル座標、原点中心）
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Geometry {
    /// 幅=X, 高さ=Y, 奥行き=Z
    Box { width: f32, height: f32, length: f32, chamfer_radius: f32 },
    /// XY平面上の矩形
    Plane { width: f32, height: f32 },
    /// 底面がXZ平面 (y=0)、頂点が +Y
    Pyramid { width: f32, height: f32, length: f32 },
}

impl Geometry {
    pub fn cube(size: f32) -> Self {
        Geometry::Box { width: size, height: size, length: size, chamfer_radius: size }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Material {
    /// 拡散テクスチャ
    pub texture: Option<Arc<SourceImage>>,
    /// 単色 (RGB)
    pub color: Option<u32>,
    pub double_sided: bool,
}

impl Material {
    pub fn color(rgb: u32) -> Self {
        Self { color: Some(rgb), ..Self::default() }
    }
}

/// シーン内での役割
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "joint", rename_all = "snake_case")]
pub enum NodeRole {
    Root,
    BodyAnchor,
    Joint(JointName),
    Bone(JointName),
    ImagePlane,
    /// カメラそのもの（形状なし）
    Camera,
    /// カメラ向きを示すピラミッド
    CameraIndicator,
}

/// シーングラフのノード
///
/// ローカル変換は `T(position) · R · pivot⁻¹`。
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub name: String,
    pub role: NodeRole,
    pub position: Vector3<f32>,
    pub rotation: Matrix3<f32>,
    pub pivot: Matrix4<f32>,
    pub geometry: Option<Geometry>,
    pub material: Material,
    pub opacity: f32,
    pub hidden: bool,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>, role: NodeRole) -> Self {
        Self {
            name: name.into(),
            role,
            position: Vector3::zeros(),
            rotation: Matrix3::identity(),
            pivot: Matrix4::identity(),
            geometry: None,
            material: Material::default(),
            opacity: 1.0,
            hidden: false,
            children: Vec::new(),
        }
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn at(mut self, position: Vector3<f32>) -> Self {
        self.position = position;
        self
    }

    pub fn add_child(&mut self, child: SceneNode) {
        self.children.push(child);
    }

    pub fn set_euler_angles(&mut self, angles: EulerAngles) {
        self.rotation = angles.to_rotation();
    }

    /// 変換行列を位置と回転に分解して設定（スケールなし前提）
    pub fn set_transform(&mut self, transform: &Matrix4<f32>) {
        self.position = translation_vector(transform);
        self.rotation = rotation_part(transform);
    }

    /// ピボット抜きの変換
    pub fn transform(&self) -> Matrix4<f32> {
        let mut m = self.rotation.to_homogeneous();
        m[(0, 3)] = self.position.x;
        m[(1, 3)] = self.position.y;
        m[(2, 3)] = self.position.z;
        m
    }

    /// 形状に適用されるローカル変換
    pub fn local_matrix(&self) -> Matrix4<f32> {
        self.transform() * inverse_or_identity(&self.pivot)
    }

    /// 深さ優先でノードを巡回（ワールド変換付き）
    pub fn visit<F>(&self, parent_world: &Matrix4<f32>, f: &mut F)
    where
        F: FnMut(&SceneNode, &Matrix4<f32>),
    {
        let world = parent_world * self.local_matrix();
        f(self, &world);
        // 子ノードの親変換にはピボットを含めない
        let child_base = parent_world * self.transform();
        for child in &self.children {
            child.visit(&child_base, f);
        }
    }

    pub fn find(&self, role: NodeRole) -> Option<&SceneNode> {
        if self.role == role {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(role))
    }

    pub fn count<P>(&self, pred: &P) -> usize
    where
        P: Fn(&SceneNode) -> bool,
    {
        let own = usize::from(pred(self));
        own + self.children.iter().map(|c| c.count(pred)).sum::<usize>()
    }
}

/// 1回の構築で作られるシーン全体
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub root: SceneNode,
}

impl Scene {
    pub fn new() -> Self {
        Self { root: SceneNode::new("root", NodeRole::Root) }
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    pub fn find(&self, role: NodeRole) -> Option<&SceneNode> {
        self.root.find(role)
    }

    pub fn joint_marker_count(&self) -> usize {
        self.root.count(&|n| matches!(n.role, NodeRole::Joint(_)))
    }

    pub fn bone_count(&self) -> usize {
        self.root.count(&|n| matches!(n.role, NodeRole::Bone(_)))
    }

    /// 全ノードをワールド変換付きで巡回
    pub fn visit<F>(&self, mut f: F)
    where
        F: FnMut(&SceneNode, &Matrix4<f32>),
    {
        self.root.visit(&Matrix4::identity(), &mut f);
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

/// 描画先。シーンは常に丸ごと置き換える
pub trait RenderSurface {
    fn set_scene(&mut self, scene: Scene);
}

/// メモリ上の描画先（テスト・エクスポート用）
#[derive(Debug, Default)]
pub struct SceneSlot {
    scene: Option<Scene>,
    replacements: u64,
}

impl SceneSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }

    pub fn take(&mut self) -> Option<Scene> {
        self.scene.take()
    }

    pub fn replacements(&self) -> u64 {
        self.replacements
    }
}

impl RenderSurface for SceneSlot {
    fn set_scene(&mut self, scene: Scene) {
        self.scene = Some(scene);
        self.replacements += 1;
    }
}
