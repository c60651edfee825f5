use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SceneError};

/// 3D人体姿勢検出の17関節
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(usize)]
pub enum JointName {
    Root = 0,
    RightHip = 1,
    RightKnee = 2,
    RightAnkle = 3,
    LeftHip = 4,
    LeftKnee = 5,
    LeftAnkle = 6,
    Spine = 7,
    CenterShoulder = 8,
    CenterHead = 9,
    TopHead = 10,
    LeftShoulder = 11,
    LeftElbow = 12,
    LeftWrist = 13,
    RightShoulder = 14,
    RightElbow = 15,
    RightWrist = 16,
}

impl JointName {
    pub const COUNT: usize = 17;

    pub const ALL: [JointName; JointName::COUNT] = [
        JointName::Root,
        JointName::RightHip,
        JointName::RightKnee,
        JointName::RightAnkle,
        JointName::LeftHip,
        JointName::LeftKnee,
        JointName::LeftAnkle,
        JointName::Spine,
        JointName::CenterShoulder,
        JointName::CenterHead,
        JointName::TopHead,
        JointName::LeftShoulder,
        JointName::LeftElbow,
        JointName::LeftWrist,
        JointName::RightShoulder,
        JointName::RightElbow,
        JointName::RightWrist,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::RightHip => "right_hip",
            Self::RightKnee => "right_knee",
            Self::RightAnkle => "right_ankle",
            Self::LeftHip => "left_hip",
            Self::LeftKnee => "left_knee",
            Self::LeftAnkle => "left_ankle",
            Self::Spine => "spine",
            Self::CenterShoulder => "center_shoulder",
            Self::CenterHead => "center_head",
            Self::TopHead => "top_head",
            Self::LeftShoulder => "left_shoulder",
            Self::LeftElbow => "left_elbow",
            Self::LeftWrist => "left_wrist",
            Self::RightShoulder => "right_shoulder",
            Self::RightElbow => "right_elbow",
            Self::RightWrist => "right_wrist",
        }
    }
}

impl fmt::Display for JointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 関節の親子関係（運動学的ツリー）
///
/// 関節ごとの親を固定長の表で持つ。親を持たない関節はルートのみ。
/// 構築時に単一ルート・非巡回を検証する。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KinematicTree {
    parents: [Option<JointName>; JointName::COUNT],
}

impl KinematicTree {
    /// 検出器の標準的な親子関係
    pub fn standard() -> Self {
        use JointName::*;
        let mut parents = [None; JointName::COUNT];
        let edges = [
            // 下半身
            (RightHip, Root),
            (RightKnee, RightHip),
            (RightAnkle, RightKnee),
            (LeftHip, Root),
            (LeftKnee, LeftHip),
            (LeftAnkle, LeftKnee),
            // 体幹・頭
            (Spine, Root),
            (CenterShoulder, Spine),
            (CenterHead, CenterShoulder),
            (TopHead, CenterHead),
            // 腕
            (LeftShoulder, CenterShoulder),
            (LeftElbow, LeftShoulder),
            (LeftWrist, LeftElbow),
            (RightShoulder, CenterShoulder),
            (RightElbow, RightShoulder),
            (RightWrist, RightElbow),
        ];
        for (child, parent) in edges {
            parents[child as usize] = Some(parent);
        }
        Self { parents }
    }

    /// 任意の親子表から構築（検証付き）
    pub fn from_parents(parents: [Option<JointName>; JointName::COUNT]) -> Result<Self> {
        let tree = Self { parents };
        tree.validate()?;
        Ok(tree)
    }

    /// 単一ルートかつ全関節がCOUNTホップ以内にルートへ到達するか
    pub fn validate(&self) -> Result<()> {
        let roots: Vec<JointName> = JointName::ALL
            .iter()
            .copied()
            .filter(|j| self.parents[*j as usize].is_none())
            .collect();
        if roots.len() != 1 {
            return Err(SceneError::InvalidTree(format!(
                "expected exactly one root, found {}",
                roots.len()
            )));
        }

        for joint in JointName::ALL {
            let mut current = joint;
            let mut hops = 0;
            while let Some(parent) = self.parents[current as usize] {
                hops += 1;
                if hops > JointName::COUNT {
                    return Err(SceneError::InvalidTree(format!(
                        "cycle reachable from {}",
                        joint
                    )));
                }
                current = parent;
            }
        }
        Ok(())
    }

    pub fn parent(&self, joint: JointName) -> Option<JointName> {
        self.parents[joint as usize]
    }

    pub fn root(&self) -> JointName {
        JointName::ALL
            .iter()
            .copied()
            .find(|j| self.parents[*j as usize].is_none())
            .unwrap_or(JointName::Root)
    }

    /// 関節自身からルートまでの経路（自身を含む）
    pub fn chain_to_root(&self, joint: JointName) -> Vec<JointName> {
        let mut chain = vec![joint];
        let mut current = joint;
        while let Some(parent) = self.parents[current as usize] {
            if chain.len() > JointName::COUNT {
                break;
            }
            chain.push(parent);
            current = parent;
        }
        chain
    }

    pub fn children(&self, joint: JointName) -> Vec<JointName> {
        JointName::ALL
            .iter()
            .copied()
            .filter(|j| self.parents[*j as usize] == Some(joint))
            .collect()
    }
}

impl Default for KinematicTree {
    fn default() -> Self {
        Self::standard()
    }
}
