//! 1回の撮影: 反転、推定、配置、合成、フィルタ

use anyhow::{Context, Result};
use image::imageops;
use image::RgbaImage;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::compose::{self, Garments};
use crate::config::Config;
use crate::filter::Filter;
use crate::placement::{OutfitPlacement, PlacementEngine};
use crate::pose::{CaptureId, CaptureSequence, Estimate, EstimatorWorker};

/// キャプチャの要約。写真の横に保存するかCLIが出力する
#[derive(Debug, Clone, Serialize)]
pub struct CaptureReport {
    pub capture_id: u64,
    pub width: u32,
    pub height: u32,
    pub filter: Filter,
    /// 推定結果。フィルタが衣装を使わないときはなし
    pub pose: Option<&'static str>,
    pub outfit: Option<OutfitPlacement>,
}

pub struct Capture {
    pub id: CaptureId,
    pub image: RgbaImage,
    pub estimate: Option<Estimate>,
    pub outfit: Option<OutfitPlacement>,
    pub filter: Filter,
}

impl Capture {
    pub fn report(&self) -> CaptureReport {
        CaptureReport {
            capture_id: self.id.0,
            width: self.image.width(),
            height: self.image.height(),
            filter: self.filter,
            pose: self.estimate.as_ref().map(Estimate::label),
            outfit: self.outfit,
        }
    }

    pub fn file_name(&self) -> String {
        format!("capture_{:04}.png", self.id.0)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.image
            .save(path)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    /// `dir` に [`Capture::file_name`] で保存する。`dir` がなければ作る
    pub fn save_in<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = dir.join(self.file_name());
        self.save(&path)?;
        Ok(path)
    }
}

pub struct Booth {
    engine: PlacementEngine,
    garments: Garments,
    estimator: Option<EstimatorWorker>,
    sequence: CaptureSequence,
    mirror: bool,
    estimator_timeout: Option<Duration>,
}

impl Booth {
    /// モデルが読めなかったときの `estimator` は `None`。撮影はできるが
    /// 姿勢に合わせた衣装はつかない
    pub fn new(engine: PlacementEngine, garments: Garments, estimator: Option<EstimatorWorker>) -> Self {
        Self {
            engine,
            garments,
            estimator,
            sequence: CaptureSequence::new(),
            mirror: false,
            estimator_timeout: None,
        }
    }

    pub fn from_config(config: &Config, garments: Garments, estimator: Option<EstimatorWorker>) -> Self {
        Self::new(PlacementEngine::from_config(&config.placement), garments, estimator)
            .with_mirror(config.capture.mirror)
            .with_estimator_timeout(config.capture.estimator_timeout())
    }

    pub fn with_mirror(mut self, mirror: bool) -> Self {
        self.mirror = mirror;
        self
    }

    pub fn with_estimator_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.estimator_timeout = timeout;
        self
    }

    /// 撮影する。失敗しない: 推定器の問題はすべて「衣装なし」に落ち、
    /// フレームは必ず返る
    pub fn capture(&self, frame: &RgbaImage, filter: Filter) -> Capture {
        let id = self.sequence.begin();
        // 姿勢の座標は表示されるフレーム基準なので、先に反転
        let mut image = if self.mirror {
            imageops::flip_horizontal(frame)
        } else {
            frame.clone()
        };

        let mut estimate = None;
        let mut outfit = None;
        if filter.wants_outfit() {
            let est = match &self.estimator {
                Some(worker) => worker.estimate(id, image.clone(), self.estimator_timeout),
                None => Estimate::Unavailable,
            };
            let placed = match &est {
                Estimate::Detected(pose) => self.engine.place(Some(pose)),
                Estimate::Unavailable => self.engine.place_without_estimator(image.width(), image.height()),
                Estimate::NoSubject | Estimate::TimedOut | Estimate::Failed => self.engine.place(None),
            };
            compose::composite(&mut image, &self.garments, &placed);
            info!(
                capture = id.0,
                pose = est.label(),
                jacket = ?placed.jacket,
                pants = ?placed.pants,
                "outfit placed"
            );
            estimate = Some(est);
            outfit = Some(placed);
        }

        filter.apply(&mut image);
        info!(capture = id.0, %filter, "captured {}x{}", image.width(), image.height());

        Capture {
            id,
            image,
            estimate,
            outfit,
            filter,
        }
    }
}
