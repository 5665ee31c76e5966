use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// COCO / MoveNet の 17 ランドマークインデックス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum LandmarkIndex {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl LandmarkIndex {
    pub const COUNT: usize = 17;
}

/// 単一ランドマーク
///
/// ホストへの `poseData` イベントにはこの形 `{x, y, visibility}` のまま載る。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    /// 正規化されたX座標 (0.0〜1.0)
    pub x: f32,
    /// 正規化されたY座標 (0.0〜1.0)
    pub y: f32,
    /// 信頼度 (0.0〜1.0)
    pub visibility: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, visibility: f32) -> Self {
        Self { x, y, visibility }
    }

    /// 信頼度が閾値以上か
    pub fn is_valid(&self, threshold: f32) -> bool {
        self.visibility >= threshold
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.visibility.is_finite()
    }

    /// ピクセル座標に変換（サブピクセル精度）
    pub fn to_pixel(&self, width: u32, height: u32) -> Point2<f32> {
        Point2::new(self.x * width as f32, self.y * height as f32)
    }

    /// 正規化座標系での距離
    pub fn normalized_distance(&self, other: &Landmark) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl Default for Landmark {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            visibility: 0.0,
        }
    }
}

/// 1フレーム分のランドマーク列
///
/// 被写体が検出されなかったフレームでは空。それ以外は `LandmarkIndex::COUNT` 個。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LandmarkSet {
    landmarks: Vec<Landmark>,
}

impl LandmarkSet {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Self { landmarks }
    }

    /// 検出なし
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_array(landmarks: [Landmark; LandmarkIndex::COUNT]) -> Self {
        Self {
            landmarks: landmarks.to_vec(),
        }
    }

    /// インデックスでランドマークを取得
    pub fn get(&self, index: LandmarkIndex) -> Option<&Landmark> {
        self.landmarks.get(index as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Landmark> {
        self.landmarks.iter()
    }

    pub fn as_slice(&self) -> &[Landmark] {
        &self.landmarks
    }

    /// 全ランドマークの平均信頼度（空なら 0）
    pub fn average_visibility(&self) -> f32 {
        if self.landmarks.is_empty() {
            return 0.0;
        }
        let sum: f32 = self.landmarks.iter().map(|l| l.visibility).sum();
        sum / self.landmarks.len() as f32
    }
}
