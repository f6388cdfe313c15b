use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub placement: PlacementConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub assets: AssetConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// 衣装がランドマークに対してどこまで広がるか
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GarmentFit {
    /// ランドマーク間の幅（肩または腰）に掛ける倍率
    pub width_scale: f32,
    /// 縦の長さ（胴または脚）に掛ける倍率
    pub height_scale: f32,
    /// 上端ランドマークより上に出す高さの割合
    pub lift: f32,
}

impl GarmentFit {
    pub const JACKET: Self = Self {
        width_scale: 1.6,
        height_scale: 1.4,
        lift: 0.2,
    };

    pub const PANTS: Self = Self {
        width_scale: 2.2,
        height_scale: 1.2,
        lift: 0.1,
    };
}

/// フレームサイズに対する割合で表した矩形
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameFraction {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// 姿勢に依存しない配置。推定器がないときだけ使う
#[derive(Debug, Clone, Deserialize)]
pub struct FixedFallbackConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_fixed_jacket")]
    pub jacket: FrameFraction,
    #[serde(default = "default_fixed_pants")]
    pub pants: FrameFraction,
}

fn default_fixed_jacket() -> FrameFraction {
    FrameFraction { x: 0.25, y: 0.2, width: 0.5, height: 0.4 }
}
fn default_fixed_pants() -> FrameFraction {
    FrameFraction { x: 0.3, y: 0.55, width: 0.4, height: 0.45 }
}

impl Default for FixedFallbackConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            jacket: default_fixed_jacket(),
            pants: default_fixed_pants(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlacementConfig {
    #[serde(default = "default_jacket_fit")]
    pub jacket: GarmentFit,
    #[serde(default = "default_pants_fit")]
    pub pants: GarmentFit,
    #[serde(default)]
    pub fixed: FixedFallbackConfig,
}

fn default_jacket_fit() -> GarmentFit { GarmentFit::JACKET }
fn default_pants_fit() -> GarmentFit { GarmentFit::PANTS }

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            jacket: default_jacket_fit(),
            pants: default_pants_fit(),
            fixed: FixedFallbackConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    /// カメラ番号
    #[serde(default)]
    pub camera_index: i32,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// 反転プレビューに合わせて撮影結果を左右反転する
    #[serde(default = "default_mirror")]
    pub mirror: bool,
    /// 1キャプチャあたりの推定待ち上限。未設定なら無制限に待つ
    #[serde(default)]
    pub estimator_timeout_ms: Option<u64>,
}

fn default_width() -> u32 { 1280 }
fn default_height() -> u32 { 720 }
fn default_mirror() -> bool { true }

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            camera_index: 0,
            width: default_width(),
            height: default_height(),
            mirror: default_mirror(),
            estimator_timeout_ms: None,
        }
    }
}

impl CaptureConfig {
    pub fn estimator_timeout(&self) -> Option<Duration> {
        self.estimator_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetConfig {
    #[serde(default = "default_jacket_path")]
    pub jacket: PathBuf,
    #[serde(default = "default_pants_path")]
    pub pants: PathBuf,
    /// MoveNet ONNXモデル
    #[serde(default = "default_model_path")]
    pub model: PathBuf,
}

fn default_jacket_path() -> PathBuf { PathBuf::from("assets/grunge_jacket.png") }
fn default_pants_path() -> PathBuf { PathBuf::from("assets/grunge_pants.png") }
fn default_model_path() -> PathBuf { PathBuf::from("models/movenet_lightning.onnx") }

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            jacket: default_jacket_path(),
            pants: default_pants_path(),
            model: default_model_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// 撮影結果の保存先
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

fn default_output_dir() -> PathBuf { PathBuf::from("captures") }

impl Default for OutputConfig {
    fn default() -> Self {
        Self { dir: default_output_dir() }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// ファイルがない・壊れているときはデフォルト
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("{:#}; using defaults", e);
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (garment, fit) in [("jacket", &self.placement.jacket), ("pants", &self.placement.pants)] {
            ensure!(
                fit.width_scale > 0.0 && fit.height_scale > 0.0,
                "placement.{}: scale factors must be positive",
                garment
            );
            ensure!(fit.lift.is_finite(), "placement.{}: lift must be finite", garment);
        }
        let fixed = &self.placement.fixed;
        for (garment, frac) in [("jacket", &fixed.jacket), ("pants", &fixed.pants)] {
            let in_range = |v: f32| (0.0..=1.0).contains(&v);
            ensure!(
                in_range(frac.x) && in_range(frac.y) && in_range(frac.width) && in_range(frac.height),
                "placement.fixed.{}: fractions must lie in 0.0-1.0",
                garment
            );
        }
        ensure!(self.capture.width > 0 && self.capture.height > 0, "capture: resolution must be non-zero");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.placement.jacket, GarmentFit::JACKET);
        assert_eq!(config.placement.pants, GarmentFit::PANTS);
        assert!(!config.placement.fixed.enabled);
        assert!(config.capture.mirror);
        assert_eq!(config.capture.estimator_timeout(), None);
    }

    #[test]
    fn test_partial_override() {
        let config = Config::from_toml(
            r#"
            [placement.jacket]
            width_scale = 1.8
            height_scale = 1.2
            lift = 0.15

            [capture]
            mirror = false
            estimator_timeout_ms = 1500
            "#,
        )
        .unwrap();
        assert_eq!(config.placement.jacket.width_scale, 1.8);
        assert_eq!(config.placement.pants, GarmentFit::PANTS);
        assert!(!config.capture.mirror);
        assert_eq!(config.capture.estimator_timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_rejects_non_positive_scale() {
        let result = Config::from_toml(
            r#"
            [placement.pants]
            width_scale = 0.0
            height_scale = 1.2
            lift = 0.1
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_fixed_fraction_out_of_range() {
        let result = Config::from_toml(
            r#"
            [placement.fixed]
            enabled = true
            jacket = { x = 0.2, y = 0.2, width = 1.5, height = 0.4 }
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default("does/not/exist.toml");
        assert_eq!(config.output.dir, PathBuf::from("captures"));
    }
}
