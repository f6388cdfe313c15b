use anyhow::Result;
use image::RgbaImage;
use minifb::{Key, KeyRepeat, Window, WindowOptions};

use crate::placement::{OutfitPlacement, Placement};
use crate::render::skeleton::draw_line;

/// minifbを使用したプレビューウィンドウ
pub struct MinifbRenderer {
    window: Window,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
}

impl MinifbRenderer {
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

    pub fn is_open(&self) -> bool {
        self.window.is_open() && !self.window.is_key_down(Key::Escape)
    }

    /// キーを押すたびに一度だけ true
    pub fn pressed(&self, key: Key) -> bool {
        self.window.is_key_pressed(key, KeyRepeat::No)
    }

    /// RGBA画像をバッファにコピー（大きい画像ははみ出た分を切る）
    pub fn draw_image(&mut self, image: &RgbaImage) {
        let (img_w, img_h) = (image.width() as usize, image.height() as usize);
        for y in 0..self.height.min(img_h) {
            for x in 0..self.width.min(img_w) {
                let p = image.get_pixel(x as u32, y as u32);
                self.buffer[y * self.width + x] = ((p[0] as u32) << 16) | ((p[1] as u32) << 8) | p[2] as u32;
            }
        }
    }

    /// 撮影結果を、姿勢に合わせた衣装の枠線付きで描く
    pub fn draw_capture(&mut self, image: &RgbaImage, outfit: Option<&OutfitPlacement>) {
        let mut annotated = image.clone();
        if let Some(outfit) = outfit {
            for (_, placement) in outfit.iter() {
                if let Placement::Placed { rect } = placement {
                    let (x, y, w, h) = rect.to_pixels();
                    let (x0, y0) = (x as i32, y as i32);
                    let (x1, y1) = (x0 + w as i32, y0 + h as i32);
                    let color = crate::render::skeleton::SKELETON_COLOR;
                    draw_line(&mut annotated, x0, y0, x1, y0, color);
                    draw_line(&mut annotated, x1, y0, x1, y1, color);
                    draw_line(&mut annotated, x1, y1, x0, y1, color);
                    draw_line(&mut annotated, x0, y1, x0, y0, color);
                }
            }
        }
        self.draw_image(&annotated);
    }

    pub fn update(&mut self) -> Result<()> {
        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)?;
        Ok(())
    }
}
