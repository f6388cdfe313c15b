use anyhow::Result;
use image::imageops;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use outfit_booth::booth::Booth;
use outfit_booth::camera::OpenCvCamera;
use outfit_booth::compose::Garments;
use outfit_booth::config::Config;
use outfit_booth::filter::Filter;
use outfit_booth::pose::{EstimatorWorker, MoveNetEstimator};
use outfit_booth::render::{Key, MinifbRenderer};

const CONFIG_PATH: &str = "booth.toml";

/// 撮影結果を画面に出しておく時間
const RESULT_HOLD: Duration = Duration::from_secs(3);

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::load_or_default(CONFIG_PATH);
    info!("outfit booth {}", outfit_booth::VERSION);
    info!("SPACE: take photo, F: next filter, ESC: quit");

    let mut camera = OpenCvCamera::open_with_resolution(
        config.capture.camera_index,
        Some(config.capture.width),
        Some(config.capture.height),
    )?;
    let (width, height) = camera.resolution();

    let garments = Garments::load(&config.assets.jacket, &config.assets.pants)?;

    // モデルがなくても撮影はできる（衣装なし）
    info!("Loading model from {}...", config.assets.model.display());
    let estimator = match MoveNetEstimator::new(&config.assets.model) {
        Ok(model) => Some(EstimatorWorker::spawn(model)),
        Err(e) => {
            warn!("pose model failed to load ({:#}); taking photos without it", e);
            None
        }
    };

    let booth = Booth::from_config(&config, garments, estimator);
    let mut renderer = MinifbRenderer::new("Outfit Booth", width as usize, height as usize)?;
    let mut filter = Filter::GrungeOutfit;
    let mut showing_until: Option<Instant> = None;

    while renderer.is_open() {
        if renderer.pressed(Key::F) {
            filter = filter.next();
            info!("filter: {}", filter);
        }

        if showing_until.is_some_and(|t| Instant::now() < t) {
            renderer.update()?;
            continue;
        }
        showing_until = None;

        let frame = match camera.read_frame() {
            Ok(f) => f,
            Err(e) => {
                error!("Frame capture error: {:#}", e);
                continue;
            }
        };

        if renderer.pressed(Key::Space) {
            let capture = booth.capture(&frame, filter);
            match capture.save_in(&config.output.dir) {
                Ok(path) => info!("saved {}", path.display()),
                Err(e) => error!("{:#}", e),
            }
            renderer.draw_capture(&capture.image, capture.outfit.as_ref());
            showing_until = Some(Instant::now() + RESULT_HOLD);
        } else if config.capture.mirror {
            renderer.draw_image(&imageops::flip_horizontal(&frame));
        } else {
            renderer.draw_image(&frame);
        }

        renderer.update()?;
    }

    info!("Shutting down...");
    Ok(())
}
