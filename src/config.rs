use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::scene::CameraMode;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub viewer: ViewerConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
}

/// シーン構築の定数
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RenderConfig {
    /// 画像平面の基準サイズ [幅, 高さ]（シーン単位）
    #[serde(default = "default_image_plane_size")]
    pub image_plane_size: [f32; 2],
    /// 入力画像の不透明度
    #[serde(default = "default_input_image_alpha")]
    pub input_image_alpha: f32,
    /// カメラ表示ノードの不透明度
    #[serde(default = "default_camera_node_alpha")]
    pub camera_node_alpha: f32,
    /// カメラ表示ピラミッドの一辺
    #[serde(default = "default_camera_pyramid_size")]
    pub camera_pyramid_size: f32,
    /// 関節マーカー（立方体）の一辺
    #[serde(default = "default_joint_marker_size")]
    pub joint_marker_size: f32,
    /// 骨の断面幅
    #[serde(default = "default_bone_width")]
    pub bone_width: f32,
    /// 頭ボックスの幅・奥行き
    #[serde(default = "default_head_box_width")]
    pub head_box_width: f32,
    /// 起動時のカメラ表示モード ("indicator" | "literal")
    #[serde(default)]
    pub camera_mode: CameraMode,
}

fn default_image_plane_size() -> [f32; 2] { [1.8, 1.8] }
fn default_input_image_alpha() -> f32 { 0.85 }
fn default_camera_node_alpha() -> f32 { 0.6 }
fn default_camera_pyramid_size() -> f32 { 0.25 }
fn default_joint_marker_size() -> f32 { 0.05 }
fn default_bone_width() -> f32 { 0.05 }
fn default_head_box_width() -> f32 { 0.2 }

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            image_plane_size: default_image_plane_size(),
            input_image_alpha: default_input_image_alpha(),
            camera_node_alpha: default_camera_node_alpha(),
            camera_pyramid_size: default_camera_pyramid_size(),
            joint_marker_size: default_joint_marker_size(),
            bone_width: default_bone_width(),
            head_box_width: default_head_box_width(),
            camera_mode: CameraMode::default(),
        }
    }
}

/// ビューアウィンドウ
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ViewerConfig {
    #[serde(default = "default_window_width")]
    pub width: usize,
    #[serde(default = "default_window_height")]
    pub height: usize,
    #[serde(default = "default_target_fps")]
    pub target_fps: u32,
    /// 1シーン単位あたりのピクセル数
    #[serde(default = "default_view_scale")]
    pub scale: f32,
    /// 初期ヨー（度）
    #[serde(default)]
    pub yaw_deg: f32,
    /// 初期ピッチ（度）
    #[serde(default)]
    pub pitch_deg: f32,
}

fn default_window_width() -> usize { 960 }
fn default_window_height() -> usize { 720 }
fn default_target_fps() -> u32 { 30 }
fn default_view_scale() -> f32 { 220.0 }

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            width: default_window_width(),
            height: default_window_height(),
            target_fps: default_target_fps(),
            scale: default_view_scale(),
            yaw_deg: 0.0,
            pitch_deg: 0.0,
        }
    }
}

/// 検出コラボレータ
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DetectionConfig {
    /// 入力画像（コマンドライン引数が優先）
    #[serde(default)]
    pub image_path: Option<String>,
    /// 検出結果JSONの拡張子
    #[serde(default = "default_sidecar_suffix")]
    pub sidecar_suffix: String,
}

fn default_sidecar_suffix() -> String { crate::pose::DEFAULT_SIDECAR_SUFFIX.to_string() }

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            image_path: None,
            sidecar_suffix: default_sidecar_suffix(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config")?;
        Ok(config)
    }

    /// 読めなければデフォルト
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("{:#}. Using default config.", e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.render, RenderConfig::default());
        assert_eq!(config.render.image_plane_size, [1.8, 1.8]);
        assert_eq!(config.render.camera_mode, CameraMode::Indicator);
        assert_eq!(config.viewer.target_fps, 30);
        assert_eq!(config.detection.sidecar_suffix, "pose.json");
    }

    #[test]
    fn test_partial_override() {
        let config = Config::parse(
            r#"
            [render]
            input_image_alpha = 0.5
            camera_mode = "literal"

            [viewer]
            width = 640
            "#,
        )
        .unwrap();
        assert_eq!(config.render.input_image_alpha, 0.5);
        assert_eq!(config.render.camera_mode, CameraMode::Literal);
        assert_eq!(config.render.bone_width, 0.05);
        assert_eq!(config.viewer.width, 640);
        assert_eq!(config.viewer.height, 720);
    }

    #[test]
    fn test_invalid_mode_rejected() {
        assert!(Config::parse("[render]\ncamera_mode = \"fisheye\"").is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default("/nonexistent/config.toml");
        assert_eq!(config.viewer, ViewerConfig::default());
    }
}
