use nalgebra::Point2;

use crate::config::AnchorConfig;
use crate::pose::{LandmarkIndex, LandmarkSet};

/// 衣服スプライトの配置（出力サーフェスのピクセル座標系）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GarmentTransform {
    /// 両肩の中点
    pub center: Point2<f32>,
    /// 左肩→右肩ベクトルの角度（ラジアン）
    pub rotation: f32,
    pub width: f32,
    pub height: f32,
    /// 描画原点を center からどれだけ上にずらすか (px, 回転後の局所座標系)
    pub top_offset: f32,
    /// 両肩間のピクセル距離
    pub shoulder_span: f32,
}

/// 1フレーム分の解決結果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Anchor {
    Resolved(GarmentTransform),
    /// 入力が不十分。直前の有効な配置を使う（なければ描画しない）
    Hold,
}

/// ランドマークから衣服の配置を計算する
///
/// フレームごとに独立して計算する。平滑化はしない。
pub struct AnchorResolver {
    confidence_threshold: f32,
    width_factor: f32,
    height_factor: f32,
    vertical_offset: f32,
}

impl AnchorResolver {
    pub fn new() -> Self {
        Self::from_config(&AnchorConfig::default())
    }

    /// 設定から作成
    pub fn from_config(config: &AnchorConfig) -> Self {
        Self {
            confidence_threshold: config.confidence_threshold,
            width_factor: config.width_factor,
            height_factor: config.height_factor,
            vertical_offset: config.vertical_offset,
        }
    }

    /// 左右の肩と左腰から配置を計算
    ///
    /// いずれかが欠けている、または信頼度が閾値未満なら `Anchor::Hold`。
    pub fn resolve(&self, landmarks: &LandmarkSet, width: u32, height: u32) -> Anchor {
        let valid = |index| {
            landmarks
                .get(index)
                .filter(|l| l.is_valid(self.confidence_threshold))
        };

        let (Some(left_shoulder), Some(right_shoulder), Some(left_hip)) = (
            valid(LandmarkIndex::LeftShoulder),
            valid(LandmarkIndex::RightShoulder),
            valid(LandmarkIndex::LeftHip),
        ) else {
            return Anchor::Hold;
        };

        let left = left_shoulder.to_pixel(width, height);
        let right = right_shoulder.to_pixel(width, height);
        let shoulder = right - left;

        let center = nalgebra::center(&left, &right);
        let rotation = f32::atan2(shoulder.y, shoulder.x);
        let shoulder_span = shoulder.norm();

        // 胴長は正規化座標で測り、画像の縦横比の影響を受けないようにする
        let torso = left_shoulder.normalized_distance(left_hip);
        let garment_height = torso * height as f32 * self.height_factor;

        Anchor::Resolved(GarmentTransform {
            center,
            rotation,
            width: shoulder_span * self.width_factor,
            height: garment_height,
            top_offset: garment_height * self.vertical_offset,
            shoulder_span,
        })
    }
}

impl Default for AnchorResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// 直前の有効な配置の保持
///
/// フレームをまたいで保持される唯一の状態。フレームループが所有する。
#[derive(Debug, Default)]
pub struct HoldPolicy {
    last_good: Option<GarmentTransform>,
}

impl HoldPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// 今フレームで描画すべき配置（保持状態は変えない）
    pub fn peek(&self, anchor: Anchor) -> Option<GarmentTransform> {
        match anchor {
            Anchor::Resolved(transform) => Some(transform),
            Anchor::Hold => self.last_good,
        }
    }

    /// `peek` と同じ配置を返し、解決済みならそれを保持する
    pub fn apply(&mut self, anchor: Anchor) -> Option<GarmentTransform> {
        if let Anchor::Resolved(transform) = anchor {
            self.last_good = Some(transform);
        }
        self.last_good
    }

    pub fn last_good(&self) -> Option<&GarmentTransform> {
        self.last_good.as_ref()
    }

    pub fn reset(&mut self) {
        self.last_good = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Landmark;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    fn make_landmarks(
        left_shoulder: (f32, f32, f32),
        right_shoulder: (f32, f32, f32),
        left_hip: (f32, f32, f32),
    ) -> LandmarkSet {
        let mut landmarks = [Landmark::new(0.5, 0.5, 0.9); LandmarkIndex::COUNT];
        landmarks[LandmarkIndex::LeftShoulder as usize] =
            Landmark::new(left_shoulder.0, left_shoulder.1, left_shoulder.2);
        landmarks[LandmarkIndex::RightShoulder as usize] =
            Landmark::new(right_shoulder.0, right_shoulder.1, right_shoulder.2);
        landmarks[LandmarkIndex::LeftHip as usize] = Landmark::new(left_hip.0, left_hip.1, left_hip.2);
        LandmarkSet::from_array(landmarks)
    }

    fn resolved(anchor: Anchor) -> GarmentTransform {
        match anchor {
            Anchor::Resolved(t) => t,
            Anchor::Hold => panic!("expected a resolved anchor"),
        }
    }

    #[test]
    fn test_horizontal_shoulders() {
        // 1000x1000 の画像で (100,100) と (200,100)
        let landmarks = make_landmarks((0.1, 0.1, 1.0), (0.2, 0.1, 1.0), (0.1, 0.3, 1.0));
        let t = resolved(AnchorResolver::new().resolve(&landmarks, 1000, 1000));

        assert!(approx_eq(t.shoulder_span, 100.0));
        assert!(approx_eq(t.width, 120.0));
        assert!(approx_eq(t.center.x, 150.0));
        assert!(approx_eq(t.center.y, 100.0));
        assert!(approx_eq(t.rotation, 0.0));
    }

    #[test]
    fn test_rotation_and_center_follow_shoulders() {
        let landmarks = make_landmarks((0.30, 0.40, 0.9), (0.60, 0.55, 0.8), (0.32, 0.80, 0.9));
        let (w, h) = (640, 480);
        let t = resolved(AnchorResolver::new().resolve(&landmarks, w, h));

        let (lx, ly) = (0.30 * 640.0, 0.40 * 480.0);
        let (rx, ry) = (0.60 * 640.0, 0.55 * 480.0);
        assert!(approx_eq(t.rotation, f32::atan2(ry - ly, rx - lx)));
        assert!(approx_eq(t.center.x, (lx + rx) / 2.0));
        assert!(approx_eq(t.center.y, (ly + ry) / 2.0));
        assert!(approx_eq(t.shoulder_span, (rx - lx).hypot(ry - ly)));
    }

    #[test]
    fn test_height_uses_normalized_torso() {
        // 胴長 0.3 (正規化) × 高さ 400 × 2.5 = 300
        let landmarks = make_landmarks((0.4, 0.2, 1.0), (0.6, 0.2, 1.0), (0.4, 0.5, 1.0));
        let t = resolved(AnchorResolver::new().resolve(&landmarks, 800, 400));
        assert!(approx_eq(t.height, 300.0));
        assert!(approx_eq(t.top_offset, 30.0));

        // 横幅が変わっても高さは変わらない
        let wide = resolved(AnchorResolver::new().resolve(&landmarks, 1600, 400));
        assert!(approx_eq(wide.height, 300.0));
    }

    #[test]
    fn test_low_confidence_shoulder_holds() {
        let resolver = AnchorResolver::new();
        let left_low = make_landmarks((0.4, 0.2, 0.49), (0.6, 0.2, 1.0), (0.4, 0.5, 1.0));
        assert_eq!(resolver.resolve(&left_low, 640, 480), Anchor::Hold);

        let right_low = make_landmarks((0.4, 0.2, 1.0), (0.6, 0.2, 0.1), (0.4, 0.5, 1.0));
        assert_eq!(resolver.resolve(&right_low, 640, 480), Anchor::Hold);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let landmarks = make_landmarks((0.4, 0.2, 0.5), (0.6, 0.2, 0.5), (0.4, 0.5, 0.5));
        assert!(matches!(
            AnchorResolver::new().resolve(&landmarks, 640, 480),
            Anchor::Resolved(_)
        ));
    }

    #[test]
    fn test_missing_hip_holds() {
        let landmarks = make_landmarks((0.4, 0.2, 1.0), (0.6, 0.2, 1.0), (0.4, 0.5, 0.0));
        assert_eq!(AnchorResolver::new().resolve(&landmarks, 640, 480), Anchor::Hold);
    }

    #[test]
    fn test_empty_landmarks_hold() {
        assert_eq!(
            AnchorResolver::new().resolve(&LandmarkSet::empty(), 640, 480),
            Anchor::Hold
        );
    }

    #[test]
    fn test_custom_factors() {
        let config = AnchorConfig {
            confidence_threshold: 0.5,
            width_factor: 2.0,
            height_factor: 1.0,
            vertical_offset: 0.0,
        };
        let landmarks = make_landmarks((0.1, 0.1, 1.0), (0.2, 0.1, 1.0), (0.1, 0.3, 1.0));
        let t = resolved(AnchorResolver::from_config(&config).resolve(&landmarks, 1000, 1000));
        assert!(approx_eq(t.width, 200.0));
        assert!(approx_eq(t.height, 200.0));
        assert_eq!(t.top_offset, 0.0);
    }

    #[test]
    fn test_hold_policy() {
        let mut policy = HoldPolicy::new();
        // 一度も有効な配置がなければ描画なし
        assert_eq!(policy.apply(Anchor::Hold), None);

        let landmarks = make_landmarks((0.1, 0.1, 1.0), (0.2, 0.1, 1.0), (0.1, 0.3, 1.0));
        let anchor = AnchorResolver::new().resolve(&landmarks, 1000, 1000);
        let first = policy.apply(anchor).unwrap();

        // Hold では直前の配置がそのまま返る
        assert_eq!(policy.apply(Anchor::Hold), Some(first));
        assert_eq!(policy.last_good(), Some(&first));

        policy.reset();
        assert_eq!(policy.apply(Anchor::Hold), None);
    }

    #[test]
    fn test_peek_does_not_commit() {
        let mut policy = HoldPolicy::new();
        let landmarks = make_landmarks((0.1, 0.1, 1.0), (0.2, 0.1, 1.0), (0.1, 0.3, 1.0));
        let anchor = AnchorResolver::new().resolve(&landmarks, 1000, 1000);

        let candidate = policy.peek(anchor);
        assert!(candidate.is_some());
        // 合成が終わるまでは保持されない
        assert_eq!(policy.last_good(), None);
        assert_eq!(policy.peek(Anchor::Hold), None);

        assert_eq!(policy.apply(anchor), candidate);
        assert_eq!(policy.peek(Anchor::Hold), candidate);
    }
}
