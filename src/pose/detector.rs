use std::fs;
use std::path::{Path, PathBuf};

use crate::error::DetectionError;
use super::observation::{Observation, ObservationFile};

/// サイドカーファイルのデフォルト拡張子
pub const DEFAULT_SIDECAR_SUFFIX: &str = "pose.json";

/// 3D人体姿勢検出器のインターフェース
///
/// 画像1枚につき1回呼ばれ、観測結果か失敗理由を返す。リトライはしない。
pub trait BodyPoseDetector {
    fn detect(&mut self, image_path: &Path) -> Result<Observation, DetectionError>;
}

/// 画像の隣に置かれた検出結果JSONを読む検出器
///
/// `photo.jpg` に対して `photo.jpg.pose.json` を探す。
/// 推論エンジン本体は外部で実行されている前提。
pub struct SidecarDetector {
    suffix: String,
}

impl SidecarDetector {
    pub fn new(suffix: &str) -> Self {
        Self { suffix: suffix.trim_start_matches('.').to_string() }
    }

    pub fn sidecar_path(&self, image_path: &Path) -> PathBuf {
        let mut name = image_path.as_os_str().to_os_string();
        name.push(".");
        name.push(&self.suffix);
        PathBuf::from(name)
    }
}

impl Default for SidecarDetector {
    fn default() -> Self {
        Self::new(DEFAULT_SIDECAR_SUFFIX)
    }
}

impl BodyPoseDetector for SidecarDetector {
    fn detect(&mut self, image_path: &Path) -> Result<Observation, DetectionError> {
        if !image_path.exists() {
            return Err(DetectionError::FileMissing(image_path.display().to_string()));
        }
        let meta = fs::metadata(image_path)
            .map_err(|e| DetectionError::InvalidImage(format!("{}: {}", image_path.display(), e)))?;
        if meta.len() == 0 {
            return Err(DetectionError::InvalidImage(image_path.display().to_string()));
        }

        let sidecar = self.sidecar_path(image_path);
        let content = fs::read_to_string(&sidecar)
            .map_err(|e| DetectionError::Engine(format!("{}: {}", sidecar.display(), e)))?;
        let file: ObservationFile = serde_json::from_str(&content)
            .map_err(|e| DetectionError::Engine(format!("{}: {}", sidecar.display(), e)))?;

        // 検出器が記録した画像サイズが0なら不正画像
        if let Some([w, h]) = file.image_size {
            if w == 0 || h == 0 {
                return Err(DetectionError::InvalidImage(format!(
                    "{} has zero dimensions ({}x{})",
                    image_path.display(),
                    w,
                    h
                )));
            }
        }

        let observation = Observation::try_from(file)
            .map_err(|e| DetectionError::Engine(e.to_string()))?;
        if observation.available_joint_names().is_empty() {
            return Err(DetectionError::Engine("no human body detected".to_string()));
        }
        Ok(observation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{JointName, RecognizedPoint};
    use nalgebra::{Matrix4, Vector2, Vector3};

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pose3d_scene_{}_{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_pair(dir: &Path, image_size: [u32; 2]) -> PathBuf {
        let image = dir.join("photo.jpg");
        fs::write(&image, b"not really a jpeg").unwrap();
        let obs = Observation::builder(Matrix4::identity())
            .joint(
                JointName::Root,
                RecognizedPoint::from_translations(Vector3::zeros(), Vector3::zeros()),
                Vector2::new(0.5, 0.5),
            )
            .image_size(image_size[0], image_size[1])
            .build();
        let json = serde_json::to_string_pretty(&obs.to_file()).unwrap();
        fs::write(dir.join("photo.jpg.pose.json"), json).unwrap();
        image
    }

    #[test]
    fn test_sidecar_path() {
        let detector = SidecarDetector::default();
        assert_eq!(
            detector.sidecar_path(Path::new("/tmp/a.jpg")),
            PathBuf::from("/tmp/a.jpg.pose.json")
        );
        let detector = SidecarDetector::new(".vision.json");
        assert_eq!(
            detector.sidecar_path(Path::new("b.png")),
            PathBuf::from("b.png.vision.json")
        );
    }

    #[test]
    fn test_missing_file() {
        let mut detector = SidecarDetector::default();
        let err = detector.detect(Path::new("/nonexistent/photo.jpg")).unwrap_err();
        assert!(matches!(err, DetectionError::FileMissing(_)));
    }

    #[test]
    fn test_detect_reads_sidecar() {
        let dir = temp_dir("detect_ok");
        let image = write_pair(&dir, [640, 480]);
        let mut detector = SidecarDetector::default();
        let obs = detector.detect(&image).unwrap();
        assert_eq!(obs.available_joint_names(), &[JointName::Root]);
        assert_eq!(obs.image_size(), Some((640, 480)));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_zero_dimension_image() {
        let dir = temp_dir("detect_zero");
        let image = write_pair(&dir, [0, 480]);
        let mut detector = SidecarDetector::default();
        let err = detector.detect(&image).unwrap_err();
        assert!(matches!(err, DetectionError::InvalidImage(_)));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_sidecar_is_engine_error() {
        let dir = temp_dir("detect_nosidecar");
        let image = dir.join("lonely.jpg");
        fs::write(&image, b"jpeg").unwrap();
        let mut detector = SidecarDetector::default();
        let err = detector.detect(&image).unwrap_err();
        assert!(matches!(err, DetectionError::Engine(_)));
        let _ = fs::remove_dir_all(&dir);
    }
}
