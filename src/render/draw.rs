use image::{Rgba, RgbaImage};

/// ピクセルをセット（境界チェック付き）
pub fn set_pixel(surface: &mut RgbaImage, x: i32, y: i32, color: Rgba<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < surface.width() && (y as u32) < surface.height() {
        surface.put_pixel(x as u32, y as u32, color);
    }
}

/// Bresenhamのアルゴリズムで線を描画
pub fn draw_line(surface: &mut RgbaImage, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgba<u8>) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    let mut x = x0;
    let mut y = y0;

    loop {
        set_pixel(surface, x, y, color);

        if x == x1 && y == y1 {
            break;
        }

        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

/// 円を描画（塗りつぶし）
pub fn fill_circle(surface: &mut RgbaImage, cx: i32, cy: i32, radius: i32, color: Rgba<u8>) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                set_pixel(surface, cx + dx, cy + dy, color);
            }
        }
    }
}

/// `src` を `alpha` (0-255) で `dst` に重ねる。結果は不透明
pub fn blend(dst: Rgba<u8>, src: Rgba<u8>, alpha: u8) -> Rgba<u8> {
    let a = alpha as u32;
    let mix = |s: u8, d: u8| ((s as u32 * a + d as u32 * (255 - a) + 127) / 255) as u8;
    Rgba([mix(src[0], dst[0]), mix(src[1], dst[1]), mix(src[2], dst[2]), 255])
}

/// source-over 合成（src 自身のアルファを使う）
pub fn blend_over(dst: &mut Rgba<u8>, src: Rgba<u8>) {
    match src[3] {
        0 => {}
        255 => *dst = Rgba([src[0], src[1], src[2], 255]),
        alpha => *dst = blend(*dst, src, alpha),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    #[test]
    fn test_set_pixel_out_of_bounds_is_ignored() {
        let mut surface = RgbaImage::new(4, 4);
        set_pixel(&mut surface, -1, 0, WHITE);
        set_pixel(&mut surface, 4, 0, WHITE);
        set_pixel(&mut surface, 0, 4, WHITE);
        assert!(surface.pixels().all(|p| *p == Rgba([0, 0, 0, 0])));
    }

    #[test]
    fn test_horizontal_line() {
        let mut surface = RgbaImage::new(8, 4);
        draw_line(&mut surface, 1, 2, 6, 2, WHITE);
        for x in 1..=6 {
            assert_eq!(*surface.get_pixel(x, 2), WHITE);
        }
        assert_eq!(*surface.get_pixel(0, 2), Rgba([0, 0, 0, 0]));
        assert_eq!(*surface.get_pixel(7, 2), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_diagonal_line_endpoints() {
        let mut surface = RgbaImage::new(8, 8);
        draw_line(&mut surface, 6, 6, 1, 1, WHITE);
        assert_eq!(*surface.get_pixel(1, 1), WHITE);
        assert_eq!(*surface.get_pixel(6, 6), WHITE);
        assert_eq!(*surface.get_pixel(3, 3), WHITE);
    }

    #[test]
    fn test_line_clipped_at_border() {
        let mut surface = RgbaImage::new(4, 4);
        draw_line(&mut surface, -5, 1, 10, 1, WHITE);
        for x in 0..4 {
            assert_eq!(*surface.get_pixel(x, 1), WHITE);
        }
    }

    #[test]
    fn test_fill_circle() {
        let mut surface = RgbaImage::new(9, 9);
        fill_circle(&mut surface, 4, 4, 2, WHITE);
        assert_eq!(*surface.get_pixel(4, 4), WHITE);
        assert_eq!(*surface.get_pixel(6, 4), WHITE);
        assert_eq!(*surface.get_pixel(4, 2), WHITE);
        // 角は円の外
        assert_eq!(*surface.get_pixel(6, 6), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_blend_over() {
        let mut dst = Rgba([0, 0, 0, 255]);
        blend_over(&mut dst, Rgba([200, 100, 50, 0]));
        assert_eq!(dst, Rgba([0, 0, 0, 255]));

        blend_over(&mut dst, Rgba([200, 100, 50, 255]));
        assert_eq!(dst, Rgba([200, 100, 50, 255]));

        let mut dst = Rgba([0, 0, 0, 255]);
        blend_over(&mut dst, Rgba([255, 255, 255, 128]));
        assert_eq!(dst, Rgba([128, 128, 128, 255]));
    }

    #[test]
    fn test_blend_extremes() {
        let cam = Rgba([10, 20, 30, 255]);
        let green = Rgba([0, 255, 0, 255]);
        assert_eq!(blend(green, cam, 255), Rgba([10, 20, 30, 255]));
        assert_eq!(blend(green, cam, 0), Rgba([0, 255, 0, 255]));
    }
}
