//! 観測結果からシーンを組み立てる
//!
//! 1回の構築はすべて局所変数で完結し、前回の構築結果には依存しない。

use nalgebra::Vector2;

use crate::config::RenderConfig;
use crate::pose::Observation;
use super::bone::{apply_head_box, connect_to_parent, BONE_ORDER};
use super::camera::{build_camera_node, CameraMode};
use super::image::ImageSource;
use super::image_plane::{build_image_plane, compute_root_offset, resize_image_plane, PlaneSize};
use super::node::{NodeRole, RenderSurface, Scene, SceneNode};
use super::proportion::estimate_skeleton_scale;
use super::skeleton::{build_joint_nodes, JointNodeMap};

pub const BODY_ANCHOR_NAME: &str = "body_anchor";

/// 構築結果
#[derive(Debug, Clone)]
pub struct ComposedScene {
    pub scene: Scene,
    /// 頭の特別扱いを適用した後の関節ノード
    pub joint_nodes: JointNodeMap,
    pub scale: f32,
    pub root_offset: Vector2<f32>,
    pub plane_size: Option<PlaneSize>,
}

impl ComposedScene {
    fn empty() -> Self {
        Self {
            scene: Scene::new(),
            joint_nodes: JointNodeMap::new(),
            scale: 1.0,
            root_offset: Vector2::zeros(),
            plane_size: None,
        }
    }
}

pub struct SceneComposer {
    config: RenderConfig,
    mode: CameraMode,
}

impl SceneComposer {
    pub fn new(config: RenderConfig) -> Self {
        let mode = config.camera_mode;
        Self { config, mode }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn mode(&self) -> CameraMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: CameraMode) {
        self.mode = mode;
    }

    /// 表示モードを切り替えて新しいモードを返す
    pub fn toggle_mode(&mut self) -> CameraMode {
        self.mode = self.mode.toggle();
        self.mode
    }

    /// シーンを構築
    ///
    /// 観測がなければ空のシーン。画像平面は画像が指定されたときだけ作る。
    /// 関節単位の失敗はスキップされ、構築自体は失敗しない。
    pub fn compose(&self, observation: Option<&Observation>, image: &ImageSource) -> ComposedScene {
        let observation = match observation {
            Some(obs) => obs,
            None => return ComposedScene::empty(),
        };

        let mut scene = Scene::new();

        // 画像平面（画像指定なしなら基準サイズで縮尺だけ求める）
        let base_size = PlaneSize::from(self.config.image_plane_size);
        let (mut plane, base_plane_size) = if image.has_plane() {
            let (node, size) = build_image_plane(
                image.image(),
                observation,
                base_size,
                self.config.input_image_alpha,
            );
            (Some(node), size)
        } else {
            (None, base_size)
        };

        // 関節ノードと縮尺
        let mut joint_nodes = build_joint_nodes(observation, self.config.joint_marker_size);
        let scale = estimate_skeleton_scale(observation, &joint_nodes, base_plane_size);
        let plane_size = base_plane_size.scaled(scale);
        let root_offset = compute_root_offset(observation, plane_size);

        if let Some(plane) = plane.as_mut() {
            resize_image_plane(plane, plane_size);
            // ルート関節が原点に来るよう平面をずらす（Zはそのまま）
            plane.position.x -= root_offset.x;
            plane.position.y -= root_offset.y;
        }
        let has_plane = plane.is_some();
        if let Some(plane) = plane {
            scene.root.add_child(plane);
        }

        apply_head_box(&mut joint_nodes, self.config.head_box_width);

        let mut anchor = SceneNode::new(BODY_ANCHOR_NAME, NodeRole::BodyAnchor);
        for node in joint_nodes.values() {
            anchor.add_child(node.clone());
        }
        for joint in BONE_ORDER {
            if let Some(bone) = connect_to_parent(joint, observation, &joint_nodes, self.config.bone_width) {
                anchor.add_child(bone);
            }
        }
        scene.root.add_child(anchor);

        scene.root.add_child(build_camera_node(observation, self.mode, &self.config));

        log::debug!(
            "Composed scene: {} joints, scale {:.3}, root offset ({:.3}, {:.3}), camera {}",
            joint_nodes.len(),
            scale,
            root_offset.x,
            root_offset.y,
            self.mode
        );

        ComposedScene {
            scene,
            joint_nodes,
            scale,
            root_offset,
            plane_size: if has_plane { Some(plane_size) } else { None },
        }
    }

    /// 構築して描画先のシーンを丸ごと置き換える
    pub fn render<S: RenderSurface + ?Sized>(
        &self,
        observation: Option<&Observation>,
        image: &ImageSource,
        surface: &mut S,
    ) -> ComposedScene {
        let composed = self.compose(observation, image);
        surface.set_scene(composed.scene.clone());
        composed
    }
}

impl Default for SceneComposer {
    fn default() -> Self {
        Self::new(RenderConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{JointName, RecognizedPoint};
    use crate::scene::image::SourceImage;
    use crate::scene::node::{Geometry, SceneSlot};
    use nalgebra::{Matrix4, Vector3};

    fn point(x: f32, y: f32, z: f32, lx: f32, ly: f32, lz: f32) -> RecognizedPoint {
        RecognizedPoint::from_translations(Vector3::new(x, y, z), Vector3::new(lx, ly, lz))
    }

    fn three_joint_observation() -> Observation {
        Observation::builder(Matrix4::identity())
            .joint(JointName::Root, point(0.0, 0.0, 0.0, 0.0, 0.0, 0.0), Vector2::new(0.5, 0.6))
            .joint(JointName::Spine, point(0.0, 0.2, 0.0, 0.0, 0.2, 0.0), Vector2::new(0.5, 0.5))
            .joint(JointName::CenterShoulder, point(0.0, 0.5, 0.0, 0.0, 0.3, 0.0), Vector2::new(0.5, 0.35))
            .build()
    }

    /// 17関節すべてそろった立ち姿勢
    fn full_body_observation() -> Observation {
        let tree = crate::pose::KinematicTree::standard();
        let positions = [
            (JointName::Root, Vector3::new(0.0, 0.0, 0.0)),
            (JointName::RightHip, Vector3::new(-0.1, -0.02, 0.0)),
            (JointName::RightKnee, Vector3::new(-0.1, -0.45, 0.02)),
            (JointName::RightAnkle, Vector3::new(-0.1, -0.85, 0.0)),
            (JointName::LeftHip, Vector3::new(0.1, -0.02, 0.0)),
            (JointName::LeftKnee, Vector3::new(0.1, -0.45, 0.02)),
            (JointName::LeftAnkle, Vector3::new(0.1, -0.85, 0.0)),
            (JointName::Spine, Vector3::new(0.0, 0.25, 0.0)),
            (JointName::CenterShoulder, Vector3::new(0.0, 0.5, 0.0)),
            (JointName::CenterHead, Vector3::new(0.0, 0.62, 0.0)),
            (JointName::TopHead, Vector3::new(0.0, 0.75, 0.0)),
            (JointName::LeftShoulder, Vector3::new(0.18, 0.5, 0.0)),
            (JointName::LeftElbow, Vector3::new(0.22, 0.25, 0.0)),
            (JointName::LeftWrist, Vector3::new(0.24, 0.02, 0.05)),
            (JointName::RightShoulder, Vector3::new(-0.18, 0.5, 0.0)),
            (JointName::RightElbow, Vector3::new(-0.22, 0.25, 0.0)),
            (JointName::RightWrist, Vector3::new(-0.24, 0.02, 0.05)),
        ];
        let lookup = |j: JointName| positions.iter().find(|(n, _)| *n == j).map(|(_, p)| *p).unwrap();

        let mut builder = Observation::builder(Matrix4::identity());
        for &(joint, pos) in positions.iter() {
            let local = match tree.parent(joint) {
                Some(parent) => pos - lookup(parent),
                None => Vector3::zeros(),
            };
            let image = Vector2::new(0.5 + pos.x * 0.5, 0.5 + pos.y * 0.5);
            builder = builder.joint(joint, RecognizedPoint::from_translations(pos, local), image);
        }
        builder.build()
    }

    #[test]
    fn test_three_joints_end_to_end() {
        let composer = SceneComposer::default();
        let composed = composer.compose(Some(&three_joint_observation()), &ImageSource::NoImage);
        assert_eq!(composed.scene.joint_marker_count(), 3);
        assert_eq!(composed.scene.bone_count(), 2);
        assert!(composed.scene.find(NodeRole::Bone(JointName::Spine)).is_some());
        assert!(composed.scene.find(NodeRole::Bone(JointName::CenterShoulder)).is_some());
        assert!(composed.scene.find(NodeRole::Bone(JointName::Root)).is_none());
        // 頭の特別扱いなし
        let markers_are_cubes = composed
            .joint_nodes
            .values()
            .all(|n| n.geometry == Some(Geometry::cube(0.05)) && !n.hidden);
        assert!(markers_are_cubes);
    }

    #[test]
    fn test_no_image_has_no_plane() {
        let composed = SceneComposer::default().compose(Some(&three_joint_observation()), &ImageSource::NoImage);
        assert!(composed.scene.find(NodeRole::ImagePlane).is_none());
        assert!(composed.plane_size.is_none());
        // 縮尺とルート位置は平面がなくても求める
        let expected_scale = (0.3 / 1.8) / 0.15;
        assert!((composed.scale - expected_scale).abs() < 1e-4);
        assert!((composed.root_offset.y - 0.2).abs() < 1e-4);
    }

    #[test]
    fn test_unloadable_image_keeps_untextured_plane() {
        let composed = SceneComposer::default().compose(Some(&three_joint_observation()), &ImageSource::Unloadable);
        let plane = composed.scene.find(NodeRole::ImagePlane).unwrap();
        assert!(plane.material.texture.is_none());
        assert!(composed.plane_size.is_some());
    }

    #[test]
    fn test_loaded_image_is_textured() {
        let image = ImageSource::Loaded(std::sync::Arc::new(SourceImage::solid(4, 2, 0xFFFFFF).unwrap()));
        let composed = SceneComposer::default().compose(Some(&three_joint_observation()), &image);
        let plane = composed.scene.find(NodeRole::ImagePlane).unwrap();
        assert!(plane.material.texture.is_some());
        let size = composed.plane_size.unwrap();
        assert!((size.width - 2.0 * size.height).abs() < 1e-4);
    }

    #[test]
    fn test_non_finite_root_point_keeps_plane_finite() {
        let obs = Observation::builder(Matrix4::identity())
            .joint(JointName::Root, point(0.0, 0.0, 0.0, 0.0, 0.0, 0.0), Vector2::new(f32::NAN, 0.5))
            .joint(JointName::Spine, point(0.0, 0.2, 0.0, 0.0, 0.2, 0.0), Vector2::new(0.5, 0.5))
            .build();
        let composed = SceneComposer::default().compose(Some(&obs), &ImageSource::Unloadable);
        let plane = composed.scene.find(NodeRole::ImagePlane).unwrap();
        assert!(plane.position.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_no_observation_gives_empty_scene() {
        let composed = SceneComposer::default().compose(None, &ImageSource::NoImage);
        assert!(composed.scene.is_empty());
        assert!(composed.joint_nodes.is_empty());
    }

    #[test]
    fn test_empty_observation_still_composes() {
        let obs = Observation::builder(Matrix4::identity()).build();
        let composed = SceneComposer::default().compose(Some(&obs), &ImageSource::NoImage);
        assert_eq!(composed.scene.joint_marker_count(), 0);
        assert_eq!(composed.scene.bone_count(), 0);
        assert_eq!(composed.scale, 1.0);
        assert!(composed.scene.find(NodeRole::CameraIndicator).is_some());
    }

    #[test]
    fn test_absent_joints_are_skipped() {
        // 左腕だけ欠けている
        let full = full_body_observation();
        let mut builder = Observation::builder(*full.camera_origin_matrix());
        for &joint in full.available_joint_names() {
            if matches!(joint, JointName::LeftElbow | JointName::LeftWrist) {
                continue;
            }
            builder = builder.joint(
                joint,
                *full.recognized_point(joint).unwrap(),
                full.point_in_image(joint).unwrap(),
            );
        }
        let obs = builder.build();
        let composed = SceneComposer::default().compose(Some(&obs), &ImageSource::NoImage);
        assert_eq!(composed.scene.joint_marker_count(), 15);
        assert!(composed.scene.find(NodeRole::Joint(JointName::LeftWrist)).is_none());
        assert!(composed.scene.find(NodeRole::Bone(JointName::LeftWrist)).is_none());
        assert!(composed.scene.find(NodeRole::Bone(JointName::LeftElbow)).is_none());
        assert!(composed.scene.find(NodeRole::Bone(JointName::LeftShoulder)).is_some());
    }

    #[test]
    fn test_full_body_head_box() {
        let composed = SceneComposer::default().compose(Some(&full_body_observation()), &ImageSource::NoImage);
        assert_eq!(composed.scene.joint_marker_count(), 17);
        assert_eq!(composed.scene.bone_count(), BONE_ORDER.len());
        assert!(composed.joint_nodes[&JointName::TopHead].hidden);
        match composed.joint_nodes[&JointName::CenterHead].geometry {
            Some(Geometry::Box { width, height, .. }) => {
                assert!((width - 0.2).abs() < 1e-6);
                assert!((height - 0.25).abs() < 1e-5);
            }
            other => panic!("unexpected head geometry {:?}", other),
        }
    }

    #[test]
    fn test_scale_and_offset_move_plane() {
        let composed = SceneComposer::default().compose(Some(&three_joint_observation()), &ImageSource::Unloadable);
        // 3D 0.3 / 1.8 と 2D 0.15 の比
        let expected_scale = (0.3 / 1.8) / 0.15;
        assert!((composed.scale - expected_scale).abs() < 1e-4, "scale = {}", composed.scale);

        let size = composed.plane_size.unwrap();
        assert!((size.height - 1.8 * expected_scale).abs() < 1e-4);
        let plane = composed.scene.find(NodeRole::ImagePlane).unwrap();
        // ルートは画像の (0.5, 0.6)
        assert!(plane.position.x.abs() < 1e-5);
        assert!((plane.position.y + (0.6 * size.height - size.height / 2.0)).abs() < 1e-5);
        assert_eq!(plane.position.z, 0.0);
    }

    #[test]
    fn test_mode_toggle_changes_only_camera() {
        let obs = three_joint_observation();
        let mut composer = SceneComposer::default();
        let indicator = composer.compose(Some(&obs), &ImageSource::NoImage);
        assert_eq!(composer.toggle_mode(), CameraMode::Literal);
        let literal = composer.compose(Some(&obs), &ImageSource::NoImage);

        let strip_camera = |scene: &Scene| -> Vec<SceneNode> {
            scene
                .root
                .children
                .iter()
                .filter(|n| !matches!(n.role, NodeRole::Camera | NodeRole::CameraIndicator))
                .cloned()
                .collect()
        };
        assert_eq!(strip_camera(&indicator.scene), strip_camera(&literal.scene));
        assert!(indicator.scene.find(NodeRole::CameraIndicator).is_some());
        assert!(literal.scene.find(NodeRole::Camera).is_some());
        assert!(literal.scene.find(NodeRole::CameraIndicator).is_none());
    }

    #[test]
    fn test_render_replaces_surface_scene() {
        let composer = SceneComposer::default();
        let mut slot = SceneSlot::new();
        composer.render(Some(&three_joint_observation()), &ImageSource::NoImage, &mut slot);
        composer.render(None, &ImageSource::NoImage, &mut slot);
        assert_eq!(slot.replacements(), 2);
        assert!(slot.scene().unwrap().is_empty());
    }

    #[test]
    fn test_builds_are_independent() {
        let composer = SceneComposer::default();
        let first = composer.compose(Some(&full_body_observation()), &ImageSource::NoImage);
        let _ = composer.compose(Some(&three_joint_observation()), &ImageSource::NoImage);
        let again = composer.compose(Some(&full_body_observation()), &ImageSource::NoImage);
        assert_eq!(first.scene, again.scene);
    }
}
