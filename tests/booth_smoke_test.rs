use image::{Rgba, RgbaImage};

use outfit_booth::booth::Booth;
use outfit_booth::compose::Garments;
use outfit_booth::config::{Config, GarmentFit};
use outfit_booth::filter::Filter;
use outfit_booth::placement::{Placement, PlacementEngine, Rect, SkipReason};
use outfit_booth::pose::{Estimate, EstimatorWorker, StaticPoses};

const POSE_JSON: &str = r#"[{
    "score": 0.82,
    "keypoints": [
        {"name": "nose",           "x": 150.0, "y": 20.0,  "score": 0.95},
        {"name": "left_shoulder",  "x": 100.0, "y": 50.0,  "score": 0.9},
        {"name": "right_shoulder", "x": 200.0, "y": 50.0,  "score": 0.9},
        {"name": "left_hip",       "x": 110.0, "y": 150.0, "score": 0.9},
        {"name": "right_hip",      "x": 190.0, "y": 150.0, "score": 0.9},
        {"name": "left_ankle",     "x": 115.0, "y": 350.0, "score": 0.3},
        {"name": "right_ankle",    "x": 185.0, "y": 350.0, "score": 0.25}
    ]
}]"#;

fn frame() -> RgbaImage {
    RgbaImage::from_pixel(320, 400, Rgba([90, 90, 90, 255]))
}

fn garments() -> Garments {
    Garments::new(
        RgbaImage::from_pixel(16, 16, Rgba([200, 20, 20, 255])),
        RgbaImage::from_pixel(16, 16, Rgba([20, 20, 200, 255])),
    )
}

#[test]
fn shipped_config_parses() {
    let config = Config::from_toml(include_str!("../booth.toml")).unwrap();
    assert_eq!(config.placement.jacket, GarmentFit::JACKET);
    assert_eq!(config.placement.pants, GarmentFit::PANTS);
}

#[test]
fn json_pose_places_jacket_only() {
    let poses = StaticPoses::from_json(POSE_JSON).unwrap();
    let booth = Booth::new(
        PlacementEngine::default(),
        garments(),
        Some(EstimatorWorker::spawn(poses)),
    );

    let capture = booth.capture(&frame(), Filter::GrungeOutfit);
    let outfit = capture.outfit.unwrap();

    let jacket = outfit.jacket.rect().unwrap();
    assert!((jacket.x - 70.0).abs() < 1e-3);
    assert!((jacket.y - 22.0).abs() < 1e-3);
    assert!((jacket.width - 160.0).abs() < 1e-3);
    assert!((jacket.height - 140.0).abs() < 1e-3);

    // 両足首とも 0.3 以下
    assert_eq!(
        outfit.pants,
        Placement::Skipped { reason: SkipReason::MissingLandmarks }
    );
}

#[test]
fn no_pose_leaves_frame_untouched_and_saves() {
    let booth = Booth::new(
        PlacementEngine::default(),
        garments(),
        Some(EstimatorWorker::spawn(StaticPoses::default())),
    );
    let capture = booth.capture(&frame(), Filter::GrungeOutfit);
    assert_eq!(capture.estimate, Some(Estimate::NoSubject));
    assert_eq!(capture.image, frame());

    let dir = std::env::temp_dir().join(format!("outfit-booth-smoke-{}", std::process::id()));
    let path = capture.save_in(&dir).unwrap();
    let written = image::open(&path).unwrap().to_rgba8();
    assert_eq!(written, frame());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn fixed_rect_is_frame_relative() {
    let mut config = Config::default();
    config.placement.fixed.enabled = true;
    let booth = Booth::from_config(&config, garments(), None).with_mirror(false);
    let capture = booth.capture(&frame(), Filter::GrungeOutfit);
    assert_eq!(
        capture.outfit.unwrap().jacket,
        Placement::Fixed { rect: Rect::new(80.0, 80.0, 160.0, 160.0) }
    );
}
