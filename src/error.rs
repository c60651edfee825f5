//! シーン構築・検出で使うエラー型

use thiserror::Error;

use crate::pose::JointName;

/// 検出コラボレータの失敗理由
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectionError {
    /// 画像ファイルが存在しない
    #[error("file does not exist: {0}")]
    FileMissing(String),

    /// 画像が読めない、または幅・高さが0
    #[error("invalid image or image has zero dimensions: {0}")]
    InvalidImage(String),

    /// 検出エンジン側のエラー
    #[error("unable to perform the request: {0}")]
    Engine(String),
}

/// シーン構築のエラー
///
/// 関節単位の失敗はコンポーネント内でログに落として握りつぶす。
/// この型がシーン合成の外へ出るのは観測データの読み込み時のみ。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    /// 関節が検出されていない
    #[error("joint not detected: {0}")]
    MissingJoint(JointName),

    /// 長さ・分母がほぼ0
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(&'static str),

    /// 画像などのリソースが読めない
    #[error("resource load failure: {0}")]
    ResourceLoad(String),

    #[error("detection failure: {0}")]
    Detection(#[from] DetectionError),

    /// 親子関係の表が木になっていない
    #[error("invalid kinematic tree: {0}")]
    InvalidTree(String),

    /// 観測ファイルの形式エラー
    #[error("malformed observation: {0}")]
    Format(String),
}

pub type Result<T> = std::result::Result<T, SceneError>;
