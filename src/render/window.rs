use anyhow::Result;
use image::RgbaImage;
use minifb::{Key, Window, WindowOptions};
use tracing::warn;

use super::compositor::CompositeFrame;
use super::Presenter;

/// minifbを使用したレンダラー
pub struct MinifbRenderer {
    window: Window,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
}

impl MinifbRenderer {
    /// ウィンドウを作成
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self> {
        let window = Window::new(
            title,
            width,
            height,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        )?;

        let buffer = vec![0u32; width * height];

        Ok(Self {
            window,
            buffer,
            width,
            height,
        })
    }

    /// ウィンドウが開いているか
    pub fn is_open(&self) -> bool {
        self.window.is_open() && !self.window.is_key_down(Key::Escape)
    }

    /// RGBA 画像をバッファにコピー
    pub fn draw_frame(&mut self, frame: &RgbaImage) {
        let frame_width = frame.width() as usize;
        let frame_height = frame.height() as usize;

        // サイズが異なる場合はクロップ/パディング
        for y in 0..self.height.min(frame_height) {
            for x in 0..self.width.min(frame_width) {
                let pixel = frame.get_pixel(x as u32, y as u32);
                let r = pixel[0] as u32;
                let g = pixel[1] as u32;
                let b = pixel[2] as u32;
                self.buffer[y * self.width + x] = (r << 16) | (g << 8) | b;
            }
        }
    }

    /// バッファをウィンドウに表示
    pub fn update(&mut self) -> Result<()> {
        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)?;
        Ok(())
    }
}

/// 合成結果を表示するデバッグウィンドウ
///
/// 最初のフレームの解像度でウィンドウを開く。閉じられたらフレームループを止める。
pub struct PreviewWindow {
    title: String,
    renderer: Option<MinifbRenderer>,
}

impl PreviewWindow {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            renderer: None,
        }
    }
}

impl Presenter for PreviewWindow {
    fn present(&mut self, frame: &CompositeFrame) -> bool {
        if self.renderer.is_none() {
            let (w, h) = frame.dimensions();
            match MinifbRenderer::new(&self.title, w as usize, h as usize) {
                Ok(renderer) => self.renderer = Some(renderer),
                Err(e) => {
                    warn!("preview window unavailable: {e:#}");
                    return false;
                }
            }
        }
        let Some(renderer) = self.renderer.as_mut() else {
            return false;
        };

        if !renderer.is_open() {
            return false;
        }
        renderer.draw_frame(frame.surface());
        if let Err(e) = renderer.update() {
            warn!("preview update failed: {e:#}");
            return false;
        }
        true
    }
}
