use std::path::Path;

use image::RgbaImage;
use nalgebra::{Point2, Rotation2, Vector2};
use tracing::info;

use super::draw::blend_over;
use crate::anchor::GarmentTransform;
use crate::error::PipelineError;

/// 事前に読み込んだ衣服画像
#[derive(Debug, Clone)]
pub struct GarmentSprite {
    image: RgbaImage,
}

impl GarmentSprite {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    /// 画像ファイルを読み込む。失敗はセットアップ時のエラー
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let image = image::open(path)
            .map_err(|source| PipelineError::AssetLoad {
                path: path.to_path_buf(),
                source,
            })?
            .into_rgba8();
        info!(path = %path.display(), width = image.width(), height = image.height(), "garment loaded");
        Ok(Self { image })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// 配置に従って回転・拡縮して描画（最近傍サンプリング, source-over）
    ///
    /// 局所座標系で x ∈ [-w/2, w/2], y ∈ [-top_offset, height - top_offset] の矩形に張る。
    pub fn draw(&self, surface: &mut RgbaImage, transform: &GarmentTransform) {
        let (gw, gh) = self.image.dimensions();
        if gw == 0 || gh == 0 || transform.width < 1.0 || transform.height < 1.0 {
            return;
        }

        let half_w = transform.width / 2.0;
        let top = -transform.top_offset;
        let bottom = transform.height - transform.top_offset;

        let to_surface = Rotation2::new(transform.rotation);
        let to_local = to_surface.inverse();

        // 回転後の外接矩形だけを走査する
        let corners = [
            Vector2::new(-half_w, top),
            Vector2::new(half_w, top),
            Vector2::new(half_w, bottom),
            Vector2::new(-half_w, bottom),
        ]
        .map(|c| transform.center + to_surface * c);

        let (sw, sh) = surface.dimensions();
        let min_x = corners.iter().map(|p| p.x).fold(f32::INFINITY, f32::min).floor().max(0.0) as u32;
        let min_y = corners.iter().map(|p| p.y).fold(f32::INFINITY, f32::min).floor().max(0.0) as u32;
        let max_x = corners.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max).ceil().min(sw as f32) as u32;
        let max_y = corners.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max).ceil().min(sh as f32) as u32;

        for y in min_y..max_y {
            for x in min_x..max_x {
                let p = Point2::new(x as f32 + 0.5, y as f32 + 0.5);
                let local = to_local * (p - transform.center);

                let u = (local.x + half_w) / transform.width;
                let v = (local.y - top) / transform.height;
                if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
                    continue;
                }

                let sx = ((u * gw as f32) as u32).min(gw - 1);
                let sy = ((v * gh as f32) as u32).min(gh - 1);
                blend_over(surface.get_pixel_mut(x, y), *self.image.get_pixel(sx, sy));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    fn transform(cx: f32, cy: f32, rotation: f32, width: f32, height: f32, top_offset: f32) -> GarmentTransform {
        GarmentTransform {
            center: Point2::new(cx, cy),
            rotation,
            width,
            height,
            top_offset,
            shoulder_span: width,
        }
    }

    #[test]
    fn test_load_missing_file_is_asset_error() {
        let err = GarmentSprite::load("no/such/garment.png").unwrap_err();
        assert!(matches!(err, PipelineError::AssetLoad { .. }));
    }

    #[test]
    fn test_axis_aligned_placement() {
        let sprite = GarmentSprite::new(RgbaImage::from_pixel(4, 4, RED));
        let mut surface = RgbaImage::from_pixel(100, 100, BLACK);
        // x: 40..60, y: 48..68 (top_offset 2)
        sprite.draw(&mut surface, &transform(50.0, 50.0, 0.0, 20.0, 20.0, 2.0));

        assert_eq!(*surface.get_pixel(50, 50), RED);
        assert_eq!(*surface.get_pixel(40, 48), RED);
        assert_eq!(*surface.get_pixel(59, 67), RED);
        assert_eq!(*surface.get_pixel(39, 50), BLACK);
        assert_eq!(*surface.get_pixel(60, 50), BLACK);
        assert_eq!(*surface.get_pixel(50, 47), BLACK);
        assert_eq!(*surface.get_pixel(50, 68), BLACK);
    }

    #[test]
    fn test_quarter_turn_swaps_extent() {
        let sprite = GarmentSprite::new(RgbaImage::from_pixel(4, 4, RED));
        let mut surface = RgbaImage::from_pixel(100, 100, BLACK);
        // 幅40・高さ10 の横長を 90 度回すと縦長になる
        sprite.draw(
            &mut surface,
            &transform(50.0, 50.0, std::f32::consts::FRAC_PI_2, 40.0, 10.0, 0.0),
        );

        assert_eq!(*surface.get_pixel(46, 35), RED);
        assert_eq!(*surface.get_pixel(46, 65), RED);
        assert_eq!(*surface.get_pixel(30, 50), BLACK);
        assert_eq!(*surface.get_pixel(70, 50), BLACK);
    }

    #[test]
    fn test_transparent_pixels_keep_background() {
        let mut image = RgbaImage::from_pixel(2, 1, RED);
        image.put_pixel(1, 0, Rgba([0, 0, 255, 0]));
        let sprite = GarmentSprite::new(image);
        let mut surface = RgbaImage::from_pixel(20, 20, BLACK);
        sprite.draw(&mut surface, &transform(10.0, 10.0, 0.0, 10.0, 4.0, 0.0));

        // 左半分は赤、右半分は透明なので背景のまま
        assert_eq!(*surface.get_pixel(7, 11), RED);
        assert_eq!(*surface.get_pixel(12, 11), BLACK);
    }

    #[test]
    fn test_offscreen_transform_is_clipped() {
        let sprite = GarmentSprite::new(RgbaImage::from_pixel(4, 4, RED));
        let mut surface = RgbaImage::from_pixel(10, 10, BLACK);
        sprite.draw(&mut surface, &transform(-50.0, -50.0, 0.3, 20.0, 20.0, 2.0));
        assert!(surface.pixels().all(|p| *p == BLACK));
    }

    #[test]
    fn test_degenerate_size_draws_nothing() {
        let sprite = GarmentSprite::new(RgbaImage::from_pixel(4, 4, RED));
        let mut surface = RgbaImage::from_pixel(10, 10, BLACK);
        sprite.draw(&mut surface, &transform(5.0, 5.0, 0.0, 0.0, 8.0, 0.0));
        assert!(surface.pixels().all(|p| *p == BLACK));
    }
}
