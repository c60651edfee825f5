use std::sync::Arc;

use crate::error::{Result, SceneError};

/// 画像平面のテクスチャ (0x00RRGGBB, 行優先)
#[derive(Debug, Clone, PartialEq)]
pub struct SourceImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u32>,
}

impl SourceImage {
    pub fn new(width: u32, height: u32, pixels: Vec<u32>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(SceneError::ResourceLoad(format!(
                "image has zero dimensions ({}x{})",
                width, height
            )));
        }
        if pixels.len() != width as usize * height as usize {
            return Err(SceneError::ResourceLoad(format!(
                "pixel buffer length {} does not match {}x{}",
                pixels.len(),
                width,
                height
            )));
        }
        Ok(Self { width, height, pixels })
    }

    /// 単色画像
    pub fn solid(width: u32, height: u32, color: u32) -> Result<Self> {
        Self::new(width, height, vec![color; width as usize * height as usize])
    }

    /// 幅/高さ
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    fn pixel(&self, x: u32, y: u32) -> u32 {
        self.pixels[y as usize * self.width as usize + x as usize]
    }

    /// 正規化座標 (0.0〜1.0) の最近傍サンプル
    pub fn sample(&self, u: f32, v: f32) -> u32 {
        let x = ((u.clamp(0.0, 1.0) * self.width as f32) as u32).min(self.width - 1);
        let y = ((v.clamp(0.0, 1.0) * self.height as f32) as u32).min(self.height - 1);
        self.pixel(x, y)
    }
}

/// 画像平面に渡す入力画像の状態
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    /// 画像が指定されていない（平面なし）
    NoImage,
    /// 指定されたが読み込めなかった（テクスチャなしの平面）
    Unloadable,
    Loaded(Arc<SourceImage>),
}

impl ImageSource {
    /// 読み込み結果から作る。失敗はログに残して `Unloadable`
    pub fn from_load(result: Result<SourceImage>) -> Self {
        match result {
            Ok(image) => ImageSource::Loaded(Arc::new(image)),
            Err(e) => {
                log::warn!("{}", e);
                ImageSource::Unloadable
            }
        }
    }

    pub fn image(&self) -> Option<&Arc<SourceImage>> {
        match self {
            ImageSource::Loaded(image) => Some(image),
            _ => None,
        }
    }

    /// 画像平面を作るか
    pub fn has_plane(&self) -> bool {
        !matches!(self, ImageSource::NoImage)
    }
}

/// 画像ファイルを読み込む
///
/// `IMREAD_COLOR` はEXIFの向きを適用するので、結果は常に正立画像。
#[cfg(feature = "desktop")]
pub fn load_source_image<P: AsRef<std::path::Path>>(path: P) -> Result<SourceImage> {
    use opencv::{core::Vec3b, imgcodecs, prelude::*};

    let path = path.as_ref();
    let path_str = path.to_string_lossy();
    let mat = imgcodecs::imread(&path_str, imgcodecs::IMREAD_COLOR)
        .map_err(|e| SceneError::ResourceLoad(format!("{}: {}", path.display(), e)))?;
    if mat.empty() {
        return Err(SceneError::ResourceLoad(format!("{}: unreadable image", path.display())));
    }

    let width = mat.cols() as u32;
    let height = mat.rows() as u32;
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for y in 0..mat.rows() {
        for x in 0..mat.cols() {
            let px = mat
                .at_2d::<Vec3b>(y, x)
                .map_err(|e| SceneError::ResourceLoad(e.to_string()))?;
            // BGR -> RGB -> u32
            let r = px[2] as u32;
            let g = px[1] as u32;
            let b = px[0] as u32;
            pixels.push((r << 16) | (g << 8) | b);
        }
    }
    SourceImage::new(width, height, pixels)
}

/// desktop機能なしでは画像デコーダがない
#[cfg(not(feature = "desktop"))]
pub fn load_source_image<P: AsRef<std::path::Path>>(path: P) -> Result<SourceImage> {
    Err(SceneError::ResourceLoad(format!(
        "{}: image decoding requires the `desktop` feature",
        path.as_ref().display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 3x2 画像: 値 = y*10 + x
    fn grid() -> SourceImage {
        SourceImage::new(3, 2, vec![0, 1, 2, 10, 11, 12]).unwrap()
    }

    #[test]
    fn test_new_rejects_zero_dimensions() {
        assert!(SourceImage::new(0, 10, vec![]).is_err());
        assert!(SourceImage::new(2, 2, vec![0; 3]).is_err());
    }

    #[test]
    fn test_aspect_ratio() {
        let img = SourceImage::solid(400, 200, 0).unwrap();
        assert!((img.aspect_ratio() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_image_source_states() {
        let loaded = ImageSource::from_load(SourceImage::solid(2, 2, 0));
        assert!(loaded.image().is_some());
        assert!(loaded.has_plane());

        let failed = ImageSource::from_load(SourceImage::new(0, 0, vec![]));
        assert_eq!(failed, ImageSource::Unloadable);
        assert!(failed.image().is_none());
        assert!(failed.has_plane());

        assert!(!ImageSource::NoImage.has_plane());
    }

    #[test]
    fn test_sample_clamps() {
        let img = grid();
        assert_eq!(img.sample(0.0, 0.0), 0);
        assert_eq!(img.sample(1.0, 1.0), 12);
        assert_eq!(img.sample(-3.0, 0.9), 10);
    }

    #[cfg(not(feature = "desktop"))]
    #[test]
    fn test_load_without_desktop_fails() {
        assert!(matches!(
            load_source_image("photo.jpg"),
            Err(SceneError::ResourceLoad(_))
        ));
    }
}
