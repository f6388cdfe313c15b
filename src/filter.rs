//! 衣装合成の後に写真全体へかけるエフェクト

use clap::ValueEnum;
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Filter {
    #[default]
    None,
    /// バーチャル試着: 検出した姿勢にジャケットとパンツを合わせる
    GrungeOutfit,
    /// 茶色の乗算ティント
    GrungeStyle,
    /// 写真の周りに金色の枠
    HiphopBaggy,
    /// シアンのスクリーンティント
    RaveNeon,
}

const GRUNGE_TINT: [u8; 3] = [50, 30, 0];
const GRUNGE_ALPHA: f32 = 0.3;
const NEON_TINT: [u8; 3] = [0, 255, 255];
const NEON_ALPHA: f32 = 0.2;
const GOLD: Rgba<u8> = Rgba([255, 215, 0, 255]);
/// 枠線の太さ（画像幅に対する割合）
const FRAME_STROKE: f32 = 0.05;

impl Filter {
    pub const ALL: [Filter; 5] = [
        Self::None,
        Self::GrungeOutfit,
        Self::GrungeStyle,
        Self::HiphopBaggy,
        Self::RaveNeon,
    ];

    /// 姿勢推定が必要なのは試着だけ
    pub fn wants_outfit(&self) -> bool {
        matches!(self, Self::GrungeOutfit)
    }

    pub fn next(&self) -> Self {
        let i = Self::ALL.iter().position(|f| f == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::GrungeOutfit => "grunge-outfit",
            Self::GrungeStyle => "grunge-style",
            Self::HiphopBaggy => "hiphop-baggy",
            Self::RaveNeon => "rave-neon",
        }
    }

    pub fn apply(&self, image: &mut RgbaImage) {
        match self {
            Self::GrungeStyle => tint(image, GRUNGE_TINT, GRUNGE_ALPHA, multiply),
            Self::RaveNeon => tint(image, NEON_TINT, NEON_ALPHA, screen),
            Self::HiphopBaggy => {
                let stroke = image.width() as f32 * FRAME_STROKE;
                draw_border(image, stroke, GOLD);
            }
            Self::None | Self::GrungeOutfit => {}
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn multiply(dst: u8, src: u8) -> f32 {
    dst as f32 * src as f32 / 255.0
}

fn screen(dst: u8, src: u8) -> f32 {
    255.0 - (255.0 - dst as f32) * (255.0 - src as f32) / 255.0
}

/// 半透明の色を指定のブレンドモードで全ピクセルに重ねる
fn tint(image: &mut RgbaImage, color: [u8; 3], alpha: f32, blend: fn(u8, u8) -> f32) {
    for pixel in image.pixels_mut() {
        for c in 0..3 {
            let dst = pixel[c];
            let mixed = (1.0 - alpha) * dst as f32 + alpha * blend(dst, color[c]);
            pixel[c] = mixed.round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// 画像の縁を中心に線を引くので、内側に入るのは半分
fn draw_border(image: &mut RgbaImage, stroke: f32, color: Rgba<u8>) {
    let (w, h) = image.dimensions();
    let inset = ((stroke / 2.0).round() as u32).min(w / 2).min(h / 2);
    if inset == 0 {
        return;
    }
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        if x < inset || y < inset || x >= w - inset || y >= h - inset {
            *pixel = color;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRAY: Rgba<u8> = Rgba([100, 100, 100, 255]);

    #[test]
    fn test_none_and_outfit_leave_pixels() {
        for filter in [Filter::None, Filter::GrungeOutfit] {
            let mut img = RgbaImage::from_pixel(8, 8, GRAY);
            filter.apply(&mut img);
            assert_eq!(img, RgbaImage::from_pixel(8, 8, GRAY));
        }
    }

    #[test]
    fn test_grunge_style_darkens() {
        let mut img = RgbaImage::from_pixel(2, 2, GRAY);
        Filter::GrungeStyle.apply(&mut img);
        // r: 0.7*100 + 0.3*(100*50/255) = 75.9, g: 73.5
        assert_eq!(*img.get_pixel(0, 0), Rgba([76, 74, 70, 255]));
    }

    #[test]
    fn test_rave_neon_brightens_cyan() {
        let mut img = RgbaImage::from_pixel(2, 2, GRAY);
        Filter::RaveNeon.apply(&mut img);
        // r は 0 とのスクリーンなので不変; g,b: 0.8*100 + 0.2*255 = 131
        assert_eq!(*img.get_pixel(1, 1), Rgba([100, 131, 131, 255]));
    }

    #[test]
    fn test_hiphop_frame() {
        let mut img = RgbaImage::from_pixel(200, 100, GRAY);
        Filter::HiphopBaggy.apply(&mut img);
        // 線幅 10px、内側は 5px
        assert_eq!(*img.get_pixel(0, 0), GOLD);
        assert_eq!(*img.get_pixel(4, 50), GOLD);
        assert_eq!(*img.get_pixel(5, 50), GRAY);
        assert_eq!(*img.get_pixel(195, 50), GOLD);
        assert_eq!(*img.get_pixel(100, 94), GRAY);
        assert_eq!(*img.get_pixel(100, 95), GOLD);
    }

    #[test]
    fn test_only_outfit_wants_pose() {
        assert!(Filter::GrungeOutfit.wants_outfit());
        assert!(!Filter::RaveNeon.wants_outfit());
    }

    #[test]
    fn test_next_cycles() {
        assert_eq!(Filter::None.next(), Filter::GrungeOutfit);
        assert_eq!(Filter::RaveNeon.next(), Filter::None);
    }

    #[test]
    fn test_names_match_serde() {
        for filter in Filter::ALL {
            let json = serde_json::to_string(&filter).unwrap();
            assert_eq!(json, format!("\"{}\"", filter.as_str()));
        }
    }
}
