//! シーンのJSON書き出し

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::math::matrix_to_columns;
use super::camera::CameraMode;
use super::composer::ComposedScene;
use super::image_plane::PlaneSize;
use super::node::{Geometry, NodeRole, Scene, SceneNode};

#[derive(Debug, Clone, Serialize)]
pub struct NodeExport {
    pub name: String,
    pub role: NodeRole,
    /// ワールド変換（列優先, ピボット込み）
    pub world_matrix: [f32; 16],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    pub textured: bool,
    pub double_sided: bool,
    pub opacity: f32,
    pub hidden: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeExport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SceneExport {
    pub version: String,
    pub camera_mode: CameraMode,
    pub scale: f32,
    pub root_offset: [f32; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plane_size: Option<PlaneSize>,
    pub joint_count: usize,
    pub bone_count: usize,
    pub root: NodeExport,
}

impl SceneExport {
    pub fn new(composed: &ComposedScene, camera_mode: CameraMode) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            camera_mode,
            scale: composed.scale,
            root_offset: [composed.root_offset.x, composed.root_offset.y],
            plane_size: composed.plane_size,
            joint_count: composed.scene.joint_marker_count(),
            bone_count: composed.scene.bone_count(),
            root: export_scene(&composed.scene),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize scene")
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = self.to_json()?;
        fs::write(path.as_ref(), json)
            .with_context(|| format!("Failed to write scene file: {}", path.as_ref().display()))?;
        Ok(())
    }
}

/// シーンツリーをワールド変換付きで書き出す
pub fn export_scene(scene: &Scene) -> NodeExport {
    export_node(&scene.root, &nalgebra::Matrix4::identity())
}

fn export_node(node: &SceneNode, parent_world: &nalgebra::Matrix4<f32>) -> NodeExport {
    let world = parent_world * node.local_matrix();
    let child_base = parent_world * node.transform();
    NodeExport {
        name: node.name.clone(),
        role: node.role,
        world_matrix: matrix_to_columns(&world),
        geometry: node.geometry,
        color: node.material.color,
        textured: node.material.texture.is_some(),
        double_sided: node.material.double_sided,
        opacity: node.opacity,
        hidden: node.hidden,
        children: node.children.iter().map(|c| export_node(c, &child_base)).collect(),
    }
}
