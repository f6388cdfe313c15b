use image::{Rgba, RgbaImage};

use crate::pose::{KeypointName, Pose};

/// 骨格の接続 (始点, 終点)
pub const SKELETON_CONNECTIONS: [(KeypointName, KeypointName); 16] = [
    // 顔
    (KeypointName::LeftEar, KeypointName::LeftEye),
    (KeypointName::LeftEye, KeypointName::Nose),
    (KeypointName::Nose, KeypointName::RightEye),
    (KeypointName::RightEye, KeypointName::RightEar),
    // 腕
    (KeypointName::LeftShoulder, KeypointName::RightShoulder),
    (KeypointName::LeftShoulder, KeypointName::LeftElbow),
    (KeypointName::LeftElbow, KeypointName::LeftWrist),
    (KeypointName::RightShoulder, KeypointName::RightElbow),
    (KeypointName::RightElbow, KeypointName::RightWrist),
    // 胴体
    (KeypointName::LeftShoulder, KeypointName::LeftHip),
    (KeypointName::RightShoulder, KeypointName::RightHip),
    (KeypointName::LeftHip, KeypointName::RightHip),
    // 脚
    (KeypointName::LeftHip, KeypointName::LeftKnee),
    (KeypointName::LeftKnee, KeypointName::LeftAnkle),
    (KeypointName::RightHip, KeypointName::RightKnee),
    (KeypointName::RightKnee, KeypointName::RightAnkle),
];

pub const KEYPOINT_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
pub const SKELETON_COLOR: Rgba<u8> = Rgba([255, 255, 0, 255]);
pub const LOW_CONFIDENCE_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);

const KEYPOINT_RADIUS: i32 = 4;

/// デバッグ表示: 信頼できるランドマーク間の骨と各点の円
pub fn draw_skeleton(image: &mut RgbaImage, pose: &Pose) {
    for (start, end) in SKELETON_CONNECTIONS.iter() {
        if let (Some(a), Some(b)) = (pose.find(*start), pose.find(*end)) {
            let (x1, y1) = a.to_pixel();
            let (x2, y2) = b.to_pixel();
            draw_line(image, x1, y1, x2, y2, SKELETON_COLOR);
        }
    }

    for kp in pose.keypoints.iter() {
        let (px, py) = kp.to_pixel();
        let color = if kp.is_confident() {
            KEYPOINT_COLOR
        } else {
            LOW_CONFIDENCE_COLOR
        };
        draw_circle(image, px, py, KEYPOINT_RADIUS, color);
    }
}

/// Bresenhamの直線
pub fn draw_line(image: &mut RgbaImage, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgba<u8>) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    let mut x = x0;
    let mut y = y0;

    loop {
        set_pixel(image, x, y, color);

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

/// 塗りつぶし円
pub fn draw_circle(image: &mut RgbaImage, cx: i32, cy: i32, radius: i32, color: Rgba<u8>) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                set_pixel(image, cx + dx, cy + dy, color);
            }
        }
    }
}

fn set_pixel(image: &mut RgbaImage, x: i32, y: i32, color: Rgba<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < image.width() && (y as u32) < image.height() {
        image.put_pixel(x as u32, y as u32, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Landmark;

    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    #[test]
    fn test_draw_line_endpoints() {
        let mut img = RgbaImage::from_pixel(10, 10, BLACK);
        draw_line(&mut img, 1, 1, 8, 5, SKELETON_COLOR);
        assert_eq!(*img.get_pixel(1, 1), SKELETON_COLOR);
        assert_eq!(*img.get_pixel(8, 5), SKELETON_COLOR);
        assert_eq!(*img.get_pixel(0, 9), BLACK);
    }

    #[test]
    fn test_off_canvas_is_clipped() {
        let mut img = RgbaImage::from_pixel(4, 4, BLACK);
        draw_circle(&mut img, -10, -10, 3, KEYPOINT_COLOR);
        draw_line(&mut img, -5, 2, 10, 2, SKELETON_COLOR);
        assert_eq!(*img.get_pixel(0, 2), SKELETON_COLOR);
        assert_eq!(*img.get_pixel(0, 0), BLACK);
    }

    #[test]
    fn test_draw_skeleton_colors() {
        let mut img = RgbaImage::from_pixel(100, 100, BLACK);
        let pose = Pose::new(vec![
            Landmark::new(KeypointName::LeftShoulder, 20.0, 20.0, 0.9),
            Landmark::new(KeypointName::RightShoulder, 80.0, 20.0, 0.9),
            Landmark::new(KeypointName::LeftHip, 20.0, 80.0, 0.1),
        ]);
        draw_skeleton(&mut img, &pose);
        // 両肩の間の骨
        assert_eq!(*img.get_pixel(50, 20), SKELETON_COLOR);
        assert_eq!(*img.get_pixel(20, 20), KEYPOINT_COLOR);
        assert_eq!(*img.get_pixel(20, 80), LOW_CONFIDENCE_COLOR);
        // 信頼度の低い腰への骨は描かない
        assert_eq!(*img.get_pixel(20, 50), BLACK);
    }
}
