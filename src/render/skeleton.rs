use image::{Rgba, RgbaImage};

use super::draw::{draw_line, fill_circle};
use crate::pose::{LandmarkIndex, LandmarkSet};

/// 骨格の接続定義 (開始ランドマーク, 終了ランドマーク)
pub const SKELETON_CONNECTIONS: [(LandmarkIndex, LandmarkIndex); 16] = [
    // 顔
    (LandmarkIndex::LeftEar, LandmarkIndex::LeftEye),
    (LandmarkIndex::LeftEye, LandmarkIndex::Nose),
    (LandmarkIndex::Nose, LandmarkIndex::RightEye),
    (LandmarkIndex::RightEye, LandmarkIndex::RightEar),
    // 上半身
    (LandmarkIndex::LeftShoulder, LandmarkIndex::RightShoulder),
    (LandmarkIndex::LeftShoulder, LandmarkIndex::LeftElbow),
    (LandmarkIndex::LeftElbow, LandmarkIndex::LeftWrist),
    (LandmarkIndex::RightShoulder, LandmarkIndex::RightElbow),
    (LandmarkIndex::RightElbow, LandmarkIndex::RightWrist),
    // 胴体
    (LandmarkIndex::LeftShoulder, LandmarkIndex::LeftHip),
    (LandmarkIndex::RightShoulder, LandmarkIndex::RightHip),
    (LandmarkIndex::LeftHip, LandmarkIndex::RightHip),
    // 下半身
    (LandmarkIndex::LeftHip, LandmarkIndex::LeftKnee),
    (LandmarkIndex::LeftKnee, LandmarkIndex::LeftAnkle),
    (LandmarkIndex::RightHip, LandmarkIndex::RightKnee),
    (LandmarkIndex::RightKnee, LandmarkIndex::RightAnkle),
];

/// キーポイントの色
pub const KEYPOINT_COLOR: Rgba<u8> = Rgba([0x00, 0xFF, 0x00, 0xFF]); // 緑

/// 骨格線の色
pub const SKELETON_COLOR: Rgba<u8> = Rgba([0xFF, 0xFF, 0x00, 0xFF]); // 黄色

/// 信頼度が低いキーポイントの色
pub const LOW_CONFIDENCE_COLOR: Rgba<u8> = Rgba([0xFF, 0x00, 0x00, 0xFF]); // 赤

/// 骨格線 → ランドマーク点の順に描画。空なら何もしない
pub fn draw_skeleton(surface: &mut RgbaImage, landmarks: &LandmarkSet, threshold: f32, radius: i32) {
    if landmarks.is_empty() {
        return;
    }
    let (w, h) = surface.dimensions();

    // 骨格線を描画
    for (start_idx, end_idx) in SKELETON_CONNECTIONS.iter() {
        let (Some(start), Some(end)) = (landmarks.get(*start_idx), landmarks.get(*end_idx)) else {
            continue;
        };

        if start.is_valid(threshold) && end.is_valid(threshold) {
            let p0 = start.to_pixel(w, h);
            let p1 = end.to_pixel(w, h);
            draw_line(
                surface,
                p0.x.round() as i32,
                p0.y.round() as i32,
                p1.x.round() as i32,
                p1.y.round() as i32,
                SKELETON_COLOR,
            );
        }
    }

    // ランドマーク点を描画
    for landmark in landmarks.iter() {
        let p = landmark.to_pixel(w, h);
        let color = if landmark.is_valid(threshold) {
            KEYPOINT_COLOR
        } else {
            LOW_CONFIDENCE_COLOR
        };
        fill_circle(surface, p.x.round() as i32, p.y.round() as i32, radius, color);
    }
}
