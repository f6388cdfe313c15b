use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// このスコア以下のランドマークは存在しないものとして扱う
pub const CONFIDENCE_THRESHOLD: f32 = 0.3;

/// MoveNetの17キーポイント名（モデル出力順）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum KeypointName {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    /// MoveNetにない名前。検索には一致しない
    Unrecognized,
}

impl KeypointName {
    pub const COUNT: usize = 17;

    pub const ALL: [KeypointName; Self::COUNT] = [
        Self::Nose,
        Self::LeftEye,
        Self::RightEye,
        Self::LeftEar,
        Self::RightEar,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nose => "nose",
            Self::LeftEye => "leftEye",
            Self::RightEye => "rightEye",
            Self::LeftEar => "leftEar",
            Self::RightEar => "rightEar",
            Self::LeftShoulder => "leftShoulder",
            Self::RightShoulder => "rightShoulder",
            Self::LeftElbow => "leftElbow",
            Self::RightElbow => "rightElbow",
            Self::LeftWrist => "leftWrist",
            Self::RightWrist => "rightWrist",
            Self::LeftHip => "leftHip",
            Self::RightHip => "rightHip",
            Self::LeftKnee => "leftKnee",
            Self::RightKnee => "rightKnee",
            Self::LeftAnkle => "leftAnkle",
            Self::RightAnkle => "rightAnkle",
            Self::Unrecognized => "unrecognized",
        }
    }

    /// MoveNet の出力で使われる snake_case 表記
    pub fn snake_str(&self) -> &'static str {
        match self {
            Self::Nose => "nose",
            Self::LeftEye => "left_eye",
            Self::RightEye => "right_eye",
            Self::LeftEar => "left_ear",
            Self::RightEar => "right_ear",
            Self::LeftShoulder => "left_shoulder",
            Self::RightShoulder => "right_shoulder",
            Self::LeftElbow => "left_elbow",
            Self::RightElbow => "right_elbow",
            Self::LeftWrist => "left_wrist",
            Self::RightWrist => "right_wrist",
            Self::LeftHip => "left_hip",
            Self::RightHip => "right_hip",
            Self::LeftKnee => "left_knee",
            Self::RightKnee => "right_knee",
            Self::LeftAnkle => "left_ankle",
            Self::RightAnkle => "right_ankle",
            Self::Unrecognized => "unrecognized",
        }
    }
}

impl FromStr for KeypointName {
    type Err = std::convert::Infallible;

    /// `leftShoulder` と MoveNet 自身の `left_shoulder` のみ受け付ける。
    /// それ以外は大文字小文字違いも含めて `Unrecognized`。
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s || k.snake_str() == s)
            .unwrap_or(Self::Unrecognized);
        Ok(name)
    }
}

impl From<String> for KeypointName {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(name) => name,
            Err(never) => match never {},
        }
    }
}

impl From<KeypointName> for String {
    fn from(name: KeypointName) -> Self {
        name.as_str().to_string()
    }
}

impl fmt::Display for KeypointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// フレームのピクセル座標での名前付きランドマーク
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub name: KeypointName,
    pub x: f32,
    pub y: f32,
    /// 信頼度 (0.0-1.0)
    pub score: f32,
}

impl Landmark {
    pub fn new(name: KeypointName, x: f32, y: f32, score: f32) -> Self {
        Self { name, x, y, score }
    }

    /// 閾値より厳密に大きいこと。ちょうど 0.3 は数えない
    pub fn is_confident(&self) -> bool {
        self.score > CONFIDENCE_THRESHOLD
    }

    pub fn to_pixel(&self) -> (i32, i32) {
        (self.x.round() as i32, self.y.round() as i32)
    }
}

/// 検出された1人分のランドマーク
///
/// pose-detection ライブラリが出力する形でシリアライズする:
/// `{ "keypoints": [{ "name": "left_shoulder", "x": .., "y": .., "score": .. }] }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub keypoints: Vec<Landmark>,
}

impl Pose {
    pub fn new(keypoints: Vec<Landmark>) -> Self {
        Self { keypoints }
    }

    /// MoveNet出力から作る: モデル順のキーポイントごとに `[x, y, score]`、
    /// 座標は 0.0-1.0 に正規化済み
    pub fn from_normalized(keypoints: &[[f32; 3]], width: u32, height: u32) -> Self {
        let keypoints = keypoints
            .iter()
            .enumerate()
            .filter_map(|(i, &[x, y, score])| {
                KeypointName::from_index(i).map(|name| {
                    Landmark::new(name, x * width as f32, y * height as f32, score)
                })
            })
            .collect();
        Self { keypoints }
    }

    /// 名前が完全一致し、閾値を超える最初のランドマーク
    pub fn find(&self, name: KeypointName) -> Option<&Landmark> {
        if name == KeypointName::Unrecognized {
            return None;
        }
        self.keypoints
            .iter()
            .find(|kp| kp.name == name && kp.is_confident())
    }

    /// 左右反転したフレーム上での同じ姿勢 (`x -> width - x`)
    pub fn mirrored(&self, width: u32) -> Self {
        let w = width as f32;
        let keypoints = self
            .keypoints
            .iter()
            .map(|kp| Landmark { x: w - kp.x, ..*kp })
            .collect();
        Self { keypoints }
    }

    /// 全座標を `k` 倍した姿勢
    pub fn scaled(&self, k: f32) -> Self {
        let keypoints = self
            .keypoints
            .iter()
            .map(|kp| Landmark { x: kp.x * k, y: kp.y * k, ..*kp })
            .collect();
        Self { keypoints }
    }
}
