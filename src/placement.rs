//! ランドマークからの衣装配置
//!
//! 姿勢スナップショットの純粋関数: 同じ姿勢からは常に同じ矩形が出る。
//! 矩形はフレームのピクセル座標で、フレームにクリップしない。
//! はみ出した分は合成側で扱う。

use serde::Serialize;
use tracing::debug;

use crate::config::{FixedFallbackConfig, FrameFraction, GarmentFit, PlacementConfig};
use crate::pose::{KeypointName, Landmark, Pose};

/// フレームのピクセル座標での軸平行矩形
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// 整数ピクセルに丸めた `(x, y, width, height)`
    pub fn to_pixels(&self) -> (i64, i64, u32, u32) {
        (
            self.x.round() as i64,
            self.y.round() as i64,
            self.width.round().max(0.0) as u32,
            self.height.round().max(0.0) as u32,
        )
    }

    fn from_fraction(frac: &FrameFraction, frame_w: u32, frame_h: u32) -> Self {
        let (w, h) = (frame_w as f32, frame_h as f32);
        Self::new(frac.x * w, frac.y * h, frac.width * w, frac.height * h)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Garment {
    Jacket,
    Pants,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// 必要なランドマークがない、または信頼度が足りない
    MissingLandmarks,
    /// 人物が検出されなかった、または推定結果が使えない
    NoPose,
}

/// 1キャプチャ・1衣装の結果
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Placement {
    /// 検出した姿勢に合わせた
    Placed { rect: Rect },
    /// 推定器がないため、姿勢に依存しない固定矩形
    Fixed { rect: Rect },
    Skipped { reason: SkipReason },
}

impl Placement {
    pub fn rect(&self) -> Option<Rect> {
        match *self {
            Self::Placed { rect } | Self::Fixed { rect } => Some(rect),
            Self::Skipped { .. } => None,
        }
    }

    pub fn is_placed(&self) -> bool {
        matches!(self, Self::Placed { .. })
    }
}

/// 衣装一式（ジャケットとパンツ）の配置
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutfitPlacement {
    pub jacket: Placement,
    pub pants: Placement,
}

impl OutfitPlacement {
    pub fn skipped(reason: SkipReason) -> Self {
        Self {
            jacket: Placement::Skipped { reason },
            pants: Placement::Skipped { reason },
        }
    }

    /// 描画順: ジャケットが先、その上にパンツ
    pub fn iter(&self) -> impl Iterator<Item = (Garment, Placement)> {
        [(Garment::Jacket, self.jacket), (Garment::Pants, self.pants)].into_iter()
    }
}

/// 2つのランドマークのうち存在するもののY平均
fn mean_y(a: Option<&Landmark>, b: Option<&Landmark>) -> Option<f32> {
    match (a, b) {
        (Some(a), Some(b)) => Some((a.y + b.y) / 2.0),
        (Some(one), None) | (None, Some(one)) => Some(one.y),
        (None, None) => None,
    }
}

/// 上端の2点（アンカー）から下端の2点まで衣装を合わせる。
/// アンカーは両方必須、下端は片方あればよい
fn fit_between(
    pose: &Pose,
    anchors: (KeypointName, KeypointName),
    ends: (KeypointName, KeypointName),
    fit: &GarmentFit,
) -> Option<Rect> {
    let left = pose.find(anchors.0)?;
    let right = pose.find(anchors.1)?;
    let end_y = mean_y(pose.find(ends.0), pose.find(ends.1))?;

    let width = (right.x - left.x).abs() * fit.width_scale;
    let anchor_y = (left.y + right.y) / 2.0;
    let height = (end_y - anchor_y).abs() * fit.height_scale;
    let center_x = (left.x + right.x) / 2.0;

    Some(Rect::new(
        center_x - width / 2.0,
        anchor_y - height * fit.lift,
        width,
        height,
    ))
}

/// 姿勢から衣装の矩形を求める
#[derive(Debug, Clone)]
pub struct PlacementEngine {
    jacket: GarmentFit,
    pants: GarmentFit,
    fixed: FixedFallbackConfig,
}

impl Default for PlacementEngine {
    fn default() -> Self {
        Self::from_config(&PlacementConfig::default())
    }
}

impl PlacementEngine {
    pub fn new(jacket: GarmentFit, pants: GarmentFit) -> Self {
        Self {
            jacket,
            pants,
            fixed: FixedFallbackConfig::default(),
        }
    }

    pub fn from_config(config: &PlacementConfig) -> Self {
        Self {
            jacket: config.jacket,
            pants: config.pants,
            fixed: config.fixed.clone(),
        }
    }

    /// ジャケット: 両肩と少なくとも片方の腰
    pub fn place_jacket(&self, pose: &Pose) -> Placement {
        let rect = fit_between(
            pose,
            (KeypointName::LeftShoulder, KeypointName::RightShoulder),
            (KeypointName::LeftHip, KeypointName::RightHip),
            &self.jacket,
        );
        Self::outcome(Garment::Jacket, rect)
    }

    /// パンツ: 両腰と少なくとも片方の足首
    pub fn place_pants(&self, pose: &Pose) -> Placement {
        let rect = fit_between(
            pose,
            (KeypointName::LeftHip, KeypointName::RightHip),
            (KeypointName::LeftAnkle, KeypointName::RightAnkle),
            &self.pants,
        );
        Self::outcome(Garment::Pants, rect)
    }

    /// 両方の衣装。姿勢がなければ推測せず両方スキップ
    pub fn place(&self, pose: Option<&Pose>) -> OutfitPlacement {
        match pose {
            Some(pose) => OutfitPlacement {
                jacket: self.place_jacket(pose),
                pants: self.place_pants(pose),
            },
            None => {
                debug!("no pose; skipping outfit");
                OutfitPlacement::skipped(SkipReason::NoPose)
            }
        }
    }

    /// 推定器がまったくないときに使う。固定配置が有効ならフレーム比の
    /// 固定矩形に描き、無効なら両方スキップ
    pub fn place_without_estimator(&self, frame_w: u32, frame_h: u32) -> OutfitPlacement {
        if !self.fixed.enabled {
            return OutfitPlacement::skipped(SkipReason::NoPose);
        }
        debug!("estimator unavailable; using fixed outfit placement");
        OutfitPlacement {
            jacket: Placement::Fixed {
                rect: Rect::from_fraction(&self.fixed.jacket, frame_w, frame_h),
            },
            pants: Placement::Fixed {
                rect: Rect::from_fraction(&self.fixed.pants, frame_w, frame_h),
            },
        }
    }

    fn outcome(garment: Garment, rect: Option<Rect>) -> Placement {
        match rect {
            Some(rect) => Placement::Placed { rect },
            None => {
                debug!(?garment, "required landmarks missing; skipped");
                Placement::Skipped {
                    reason: SkipReason::MissingLandmarks,
                }
            }
        }
    }
}
