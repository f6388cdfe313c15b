use anyhow::{bail, Context, Result};
use image::RgbaImage;
use opencv::{
    core::{AlgorithmHint, Mat},
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureAPIs},
};
use tracing::info;

/// OpenCVを使用したカメラ入力
pub struct OpenCvCamera {
    capture: VideoCapture,
    width: u32,
    height: u32,
}

impl OpenCvCamera {
    /// 解像度を指定してカメラを開く（ドライバが別の値を選ぶこともある）
    pub fn open_with_resolution(index: i32, width: Option<u32>, height: Option<u32>) -> Result<Self> {
        let mut capture =
            VideoCapture::new(index, VideoCaptureAPIs::CAP_ANY as i32).context("Failed to open camera")?;

        if !capture.is_opened()? {
            bail!("Camera {} is not available", index);
        }

        if let Some(w) = width {
            capture.set(videoio::CAP_PROP_FRAME_WIDTH, w as f64)?;
        }
        if let Some(h) = height {
            capture.set(videoio::CAP_PROP_FRAME_HEIGHT, h as f64)?;
        }
        capture.set(videoio::CAP_PROP_BUFFERSIZE, 1.0)?;

        let actual_width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32;
        let actual_height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32;
        info!("camera {} opened at {}x{}", index, actual_width, actual_height);

        Ok(Self {
            capture,
            width: actual_width,
            height: actual_height,
        })
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// 1フレームをRGBAで読む
    pub fn read_frame(&mut self) -> Result<RgbaImage> {
        let mut frame = Mat::default();
        self.capture
            .read(&mut frame)
            .context("Failed to read frame")?;

        if frame.empty() {
            bail!("Empty frame received");
        }

        mat_to_rgba(&frame)
    }
}

/// BGR Mat -> RgbaImage
pub fn mat_to_rgba(frame: &Mat) -> Result<RgbaImage> {
    let mut rgba = Mat::default();
    imgproc::cvt_color(frame, &mut rgba, imgproc::COLOR_BGR2RGBA, 0, AlgorithmHint::ALGO_HINT_DEFAULT)?;
    let rgba = if rgba.is_continuous() { rgba } else { rgba.try_clone()? };

    let (w, h) = (rgba.cols() as u32, rgba.rows() as u32);
    let data = rgba.data_bytes()?.to_vec();
    match RgbaImage::from_raw(w, h, data) {
        Some(image) => Ok(image),
        None => bail!("Frame buffer does not match {}x{}", w, h),
    }
}
