use image::imageops::{self, FilterType};
use image::RgbaImage;
use ndarray::Array4;

/// MoveNet入力サイズ
pub const MOVENET_INPUT_SIZE: u32 = 192;

/// フレームをMoveNetの入力テンソルに変換
///
/// - 192x192 にリサイズ（アスペクト比は保たない。MoveNetの出力座標は
///   リサイズ後の正規化座標なので、そのまま元に戻せる）
/// - アルファを捨てる
/// - 0.0-255.0 の [1, 192, 192, 3] f32 テンソル
pub fn preprocess_for_movenet(frame: &RgbaImage) -> Array4<f32> {
    let size = MOVENET_INPUT_SIZE;
    let resized = imageops::resize(frame, size, size, FilterType::Triangle);

    let s = size as usize;
    let mut tensor = Array4::<f32>::zeros((1, s, s, 3));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, y as usize, x as usize, c]] = pixel[c] as f32;
        }
    }

    tensor
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_preprocess_shape_and_values() {
        let frame = RgbaImage::from_pixel(640, 480, Rgba([10, 20, 30, 255]));
        let tensor = preprocess_for_movenet(&frame);
        assert_eq!(tensor.shape(), &[1, 192, 192, 3]);
        assert_eq!(tensor[[0, 0, 0, 0]], 10.0);
        assert_eq!(tensor[[0, 100, 50, 1]], 20.0);
        assert_eq!(tensor[[0, 191, 191, 2]], 30.0);
    }
}
