use anyhow::{Context, Result};
use image::{Pixel, RgbaImage};
use std::path::Path;
use tracing::debug;

use crate::placement::{Garment, OutfitPlacement, Rect};

/// 衣装画像。一度だけ読み込み、全キャプチャで共有する
#[derive(Debug, Clone)]
pub struct Garments {
    pub jacket: RgbaImage,
    pub pants: RgbaImage,
}

impl Garments {
    pub fn new(jacket: RgbaImage, pants: RgbaImage) -> Self {
        Self { jacket, pants }
    }

    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(jacket: P, pants: Q) -> Result<Self> {
        Ok(Self {
            jacket: load_rgba(jacket.as_ref())?,
            pants: load_rgba(pants.as_ref())?,
        })
    }

    pub fn get(&self, garment: Garment) -> &RgbaImage {
        match garment {
            Garment::Jacket => &self.jacket,
            Garment::Pants => &self.pants,
        }
    }
}

pub fn load_rgba(path: &Path) -> Result<RgbaImage> {
    let img = image::open(path).with_context(|| format!("Failed to load image {}", path.display()))?;
    Ok(img.to_rgba8())
}

/// `garment` を `rect` に引き伸ばしてアルファ合成する。
///
/// キャンバスと重なる部分だけを最近傍でサンプリングするので、巨大な矩形や
/// 画面外の矩形でもコストはキャンバスの大きさまで。何も描かなかったとき
/// (1ピクセル未満に丸まる、またはキャンバスと重ならない) は false。
pub fn draw_garment(canvas: &mut RgbaImage, garment: &RgbaImage, rect: &Rect) -> bool {
    let (x, y, width, height) = rect.to_pixels();
    let (gw, gh) = garment.dimensions();
    if width == 0 || height == 0 || gw == 0 || gh == 0 {
        return false;
    }

    let left = x.max(0);
    let top = y.max(0);
    let right = x.saturating_add(width as i64).min(canvas.width() as i64);
    let bottom = y.saturating_add(height as i64).min(canvas.height() as i64);
    if left >= right || top >= bottom {
        return false;
    }

    for cy in top..bottom {
        let gy = (cy.abs_diff(y) * gh as u64 / height as u64) as u32;
        for cx in left..right {
            let gx = (cx.abs_diff(x) * gw as u64 / width as u64) as u32;
            let src = *garment.get_pixel(gx, gy);
            canvas.get_pixel_mut(cx as u32, cy as u32).blend(&src);
        }
    }
    true
}

/// 配置された（または固定の）衣装を描く。ジャケットが先
pub fn composite(canvas: &mut RgbaImage, garments: &Garments, outfit: &OutfitPlacement) {
    for (garment, placement) in outfit.iter() {
        if let Some(rect) = placement.rect() {
            if !draw_garment(canvas, garments.get(garment), &rect) {
                debug!(?garment, "placement too small or off the frame");
            }
        }
    }
}
