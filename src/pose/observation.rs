use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use nalgebra::{Matrix4, Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SceneError};
use crate::math::{matrix_from_columns, matrix_to_columns, translation_vector};
use super::joint::{JointName, KinematicTree};

/// 認識された関節1つ分
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecognizedPoint {
    /// モデル空間（カメラ相対）の変換
    pub position: Matrix4<f32>,
    /// 親関節に対する相対変換
    pub local_position: Matrix4<f32>,
}

impl RecognizedPoint {
    pub fn new(position: Matrix4<f32>, local_position: Matrix4<f32>) -> Self {
        Self { position, local_position }
    }

    /// 並進のみの点（テスト・簡易入力用）
    pub fn from_translations(position: Vector3<f32>, local: Vector3<f32>) -> Self {
        Self {
            position: Matrix4::new_translation(&position),
            local_position: Matrix4::new_translation(&local),
        }
    }

    pub fn translation(&self) -> Vector3<f32> {
        translation_vector(&self.position)
    }

    pub fn local_translation(&self) -> Vector3<f32> {
        translation_vector(&self.local_position)
    }
}

/// 1枚の画像に対する検出結果
///
/// 検出後は不変。スレッド間では `Arc<Observation>` で共有する。
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    points: BTreeMap<JointName, RecognizedPoint>,
    image_points: BTreeMap<JointName, Vector2<f32>>,
    available: Vec<JointName>,
    camera_origin: Matrix4<f32>,
    tree: KinematicTree,
    image_size: Option<(u32, u32)>,
}

impl Observation {
    pub fn builder(camera_origin: Matrix4<f32>) -> ObservationBuilder {
        ObservationBuilder {
            observation: Observation {
                points: BTreeMap::new(),
                image_points: BTreeMap::new(),
                available: Vec::new(),
                camera_origin,
                tree: KinematicTree::standard(),
                image_size: None,
            },
        }
    }

    /// 検出された関節（JointName順）
    pub fn available_joint_names(&self) -> &[JointName] {
        &self.available
    }

    pub fn is_available(&self, joint: JointName) -> bool {
        self.points.contains_key(&joint)
    }

    pub fn recognized_point(&self, joint: JointName) -> Result<&RecognizedPoint> {
        self.points.get(&joint).ok_or(SceneError::MissingJoint(joint))
    }

    pub fn parent_joint_name(&self, joint: JointName) -> Option<JointName> {
        self.tree.parent(joint)
    }

    /// 正規化画像座標 (0.0〜1.0)
    pub fn point_in_image(&self, joint: JointName) -> Result<Vector2<f32>> {
        self.image_points
            .get(&joint)
            .copied()
            .ok_or(SceneError::MissingJoint(joint))
    }

    pub fn camera_origin_matrix(&self) -> &Matrix4<f32> {
        &self.camera_origin
    }

    pub fn tree(&self) -> &KinematicTree {
        &self.tree
    }

    pub fn image_size(&self) -> Option<(u32, u32)> {
        self.image_size
    }

    /// 検出器のJSON出力を読み込む
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read observation file {}", path.display()))?;
        let file: ObservationFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse observation file {}", path.display()))?;
        Ok(Observation::try_from(file)?)
    }

    pub fn to_file(&self) -> ObservationFile {
        ObservationFile {
            camera_origin_matrix: matrix_to_columns(&self.camera_origin),
            image_size: self.image_size.map(|(w, h)| [w, h]),
            joints: self
                .available
                .iter()
                .filter_map(|joint| {
                    let point = self.points.get(joint)?;
                    let image_point = self.image_points.get(joint)?;
                    Some(JointEntry {
                        name: *joint,
                        position: matrix_to_columns(&point.position),
                        local_position: matrix_to_columns(&point.local_position),
                        image_point: [image_point.x, image_point.y],
                    })
                })
                .collect(),
        }
    }
}

/// `Observation` のビルダー
///
/// 関節は3D変換と画像座標を必ず同時に登録するため、
/// `available ⊆ points` と `point_in_image` の定義域が一致する。
pub struct ObservationBuilder {
    observation: Observation,
}

impl ObservationBuilder {
    pub fn joint(mut self, joint: JointName, point: RecognizedPoint, image_point: Vector2<f32>) -> Self {
        let obs = &mut self.observation;
        obs.points.insert(joint, point);
        obs.image_points.insert(joint, image_point);
        if let Err(idx) = obs.available.binary_search(&joint) {
            obs.available.insert(idx, joint);
        }
        self
    }

    pub fn tree(mut self, tree: KinematicTree) -> Self {
        self.observation.tree = tree;
        self
    }

    pub fn image_size(mut self, width: u32, height: u32) -> Self {
        self.observation.image_size = Some((width, height));
        self
    }

    pub fn build(self) -> Observation {
        self.observation
    }
}

// --- ファイル形式 ---

/// 関節1つ分のJSON表現（行列は列優先16要素）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JointEntry {
    pub name: JointName,
    pub position: [f32; 16],
    pub local_position: [f32; 16],
    pub image_point: [f32; 2],
}

/// 検出器出力のJSON表現
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationFile {
    pub camera_origin_matrix: [f32; 16],
    #[serde(default)]
    pub image_size: Option<[u32; 2]>,
    pub joints: Vec<JointEntry>,
}

impl TryFrom<ObservationFile> for Observation {
    type Error = SceneError;

    fn try_from(file: ObservationFile) -> Result<Self> {
        let camera = matrix_from_columns(&file.camera_origin_matrix);
        if camera.iter().any(|v| !v.is_finite()) {
            return Err(SceneError::Format("camera_origin_matrix is not finite".to_string()));
        }

        let mut builder = Observation::builder(camera);
        if let Some([w, h]) = file.image_size {
            builder = builder.image_size(w, h);
        }
        for entry in file.joints {
            let point = RecognizedPoint::new(
                matrix_from_columns(&entry.position),
                matrix_from_columns(&entry.local_position),
            );
            if point.translation().iter().any(|v| !v.is_finite()) {
                // 座標が壊れた関節は未検出扱い
                log::warn!("Dropping joint {} with non-finite position", entry.name);
                continue;
            }
            if entry.image_point.iter().any(|v| !v.is_finite()) {
                log::warn!("Dropping joint {} with non-finite image point", entry.name);
                continue;
            }
            builder = builder.joint(
                entry.name,
                point,
                Vector2::new(entry.image_point[0], entry.image_point[1]),
            );
        }
        Ok(builder.build())
    }
}
