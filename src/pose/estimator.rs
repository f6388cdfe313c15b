//! 姿勢推定器の契約と、それを動かすワーカースレッド
//!
//! 推定器は遅いことがあるので専用スレッドで動かす。リクエストには
//! キャプチャIDを付け、古いキャプチャ宛ての返答は今のフレームに
//! 適用せず捨てる。

use anyhow::{Context, Result};
use image::RgbaImage;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::keypoint::Pose;

/// 外部の姿勢推定機能
pub trait PoseEstimator: Send {
    /// `frame` で検出した人物。座標はフレームのピクセル
    fn estimate(&mut self, frame: &RgbaImage) -> Result<Vec<Pose>>;
}

/// 1回のキャプチャを識別する
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CaptureId(pub u64);

/// 単調増加するキャプチャIDを払い出す
#[derive(Debug, Default)]
pub struct CaptureSequence {
    latest: AtomicU64,
}

impl CaptureSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// 新しいキャプチャを開始する。それ以前のものはすべて古くなる
    pub fn begin(&self) -> CaptureId {
        CaptureId(self.latest.fetch_add(1, Ordering::AcqRel) + 1)
    }

}

/// 1キャプチャに対する推定結果
#[derive(Debug, Clone, PartialEq)]
pub enum Estimate {
    /// 最初に検出された人物。他は無視
    Detected(Pose),
    /// 推定したが誰もいなかった
    NoSubject,
    /// 推定器がない、またはスレッドが終了している
    Unavailable,
    /// 推定器はあるがこのキャプチャでエラーになった
    Failed,
    /// 設定した上限時間内に返答がなかった
    TimedOut,
}

impl Estimate {
    pub fn from_poses(poses: Vec<Pose>) -> Self {
        match poses.into_iter().next() {
            Some(pose) => Self::Detected(pose),
            None => Self::NoSubject,
        }
    }

    pub fn pose(&self) -> Option<&Pose> {
        match self {
            Self::Detected(pose) => Some(pose),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Detected(_) => "detected",
            Self::NoSubject => "no_subject",
            Self::Unavailable => "unavailable",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }
}

struct Request {
    id: CaptureId,
    frame: RgbaImage,
}

struct Reply {
    id: CaptureId,
    result: Result<Vec<Pose>>,
}

/// [`PoseEstimator`] を専用スレッドで動かす
pub struct EstimatorWorker {
    requests: mpsc::Sender<Request>,
    replies: mpsc::Receiver<Reply>,
    _handle: thread::JoinHandle<()>,
}

impl EstimatorWorker {
    pub fn spawn<E: PoseEstimator + 'static>(mut estimator: E) -> Self {
        let (req_tx, req_rx) = mpsc::channel::<Request>();
        let (reply_tx, reply_rx) = mpsc::channel::<Reply>();

        let handle = thread::spawn(move || {
            for Request { id, frame } in req_rx {
                let result = estimator.estimate(&frame);
                if reply_tx.send(Reply { id, result }).is_err() {
                    break;
                }
            }
        });

        Self {
            requests: req_tx,
            replies: reply_rx,
            _handle: handle,
        }
    }

    /// キャプチャ `id` の姿勢を推定する。待つのは最大 `timeout` まで。
    ///
    /// 待っている間に届いた別キャプチャの返答は捨てる。
    pub fn estimate(&self, id: CaptureId, frame: RgbaImage, timeout: Option<Duration>) -> Estimate {
        if self.requests.send(Request { id, frame }).is_err() {
            warn!("estimator thread has stopped");
            return Estimate::Unavailable;
        }

        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            let reply = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    match self.replies.recv_timeout(remaining) {
                        Ok(reply) => reply,
                        Err(mpsc::RecvTimeoutError::Timeout) => {
                            debug!(capture = id.0, "estimator timed out");
                            return Estimate::TimedOut;
                        }
                        Err(mpsc::RecvTimeoutError::Disconnected) => {
                            warn!("estimator thread disconnected");
                            return Estimate::Unavailable;
                        }
                    }
                }
                None => match self.replies.recv() {
                    Ok(reply) => reply,
                    Err(_) => {
                        warn!("estimator thread disconnected");
                        return Estimate::Unavailable;
                    }
                },
            };

            if reply.id != id {
                debug!(stale = reply.id.0, current = id.0, "discarding stale estimate");
                continue;
            }

            return match reply.result {
                Ok(poses) => Estimate::from_poses(poses),
                Err(e) => {
                    warn!(capture = id.0, "pose estimation failed: {:#}", e);
                    Estimate::Failed
                }
            };
        }
    }
}

/// 外部の推定器が出した姿勢を再生する。
///
/// フレームに関係なく毎回同じ姿勢を返す。
#[derive(Debug, Clone, Default)]
pub struct StaticPoses {
    poses: Vec<Pose>,
}

impl StaticPoses {
    pub fn new(poses: Vec<Pose>) -> Self {
        Self { poses }
    }

    /// 姿勢のJSON配列、または単一の姿勢オブジェクトを読む
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read pose file {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to parse pose file {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        let poses = if value.is_array() {
            serde_json::from_value(value)?
        } else {
            vec![serde_json::from_value(value)?]
        };
        Ok(Self { poses })
    }

    pub fn poses(&self) -> &[Pose] {
        &self.poses
    }

    /// 左右反転したフレームに合わせた座標に変換する
    pub fn mirrored(&self, width: u32) -> Self {
        Self {
            poses: self.poses.iter().map(|p| p.mirrored(width)).collect(),
        }
    }
}

impl PoseEstimator for StaticPoses {
    fn estimate(&mut self, _frame: &RgbaImage) -> Result<Vec<Pose>> {
        Ok(self.poses.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::keypoint::{KeypointName, Landmark};
    use std::collections::VecDeque;

    fn marker_pose(x: f32) -> Pose {
        Pose::new(vec![Landmark::new(KeypointName::Nose, x, 0.0, 0.9)])
    }

    /// 台本どおりに結果を返す。gate があればそれが開くまで待つ。
    struct Scripted {
        script: VecDeque<(Option<mpsc::Receiver<()>>, Result<Vec<Pose>>)>,
    }

    impl PoseEstimator for Scripted {
        fn estimate(&mut self, _frame: &RgbaImage) -> Result<Vec<Pose>> {
            match self.script.pop_front() {
                Some((gate, result)) => {
                    if let Some(gate) = gate {
                        let _ = gate.recv();
                    }
                    result
                }
                None => Ok(Vec::new()),
            }
        }
    }

    fn frame() -> RgbaImage {
        RgbaImage::new(4, 4)
    }

    #[test]
    fn test_capture_sequence_increases() {
        let seq = CaptureSequence::new();
        let a = seq.begin();
        let b = seq.begin();
        assert!(b > a);
        assert_eq!(a, CaptureId(1));
    }

    #[test]
    fn test_first_pose_only() {
        let est = Estimate::from_poses(vec![marker_pose(1.0), marker_pose(2.0)]);
        assert_eq!(est, Estimate::Detected(marker_pose(1.0)));
        assert_eq!(Estimate::from_poses(Vec::new()), Estimate::NoSubject);
    }

    #[test]
    fn test_worker_returns_detection() {
        let worker = EstimatorWorker::spawn(StaticPoses::new(vec![marker_pose(5.0)]));
        let seq = CaptureSequence::new();
        let est = worker.estimate(seq.begin(), frame(), None);
        assert_eq!(est.pose(), Some(&marker_pose(5.0)));
    }

    #[test]
    fn test_worker_error_is_failed() {
        let worker = EstimatorWorker::spawn(Scripted {
            script: VecDeque::from(vec![
                (None, Err(anyhow::anyhow!("model exploded"))),
                (None, Ok(vec![marker_pose(3.0)])),
            ]),
        });
        assert_eq!(worker.estimate(CaptureId(1), frame(), None), Estimate::Failed);
        // 1回の失敗で推定器が使えなくなるわけではない
        assert_eq!(
            worker.estimate(CaptureId(2), frame(), None),
            Estimate::Detected(marker_pose(3.0))
        );
    }

    #[test]
    fn test_stale_reply_is_discarded() {
        let (open, gate) = mpsc::channel();
        let worker = EstimatorWorker::spawn(Scripted {
            script: VecDeque::from(vec![
                (Some(gate), Ok(vec![marker_pose(1.0)])),
                (None, Ok(Vec::new())),
            ]),
        });
        let seq = CaptureSequence::new();

        // gate が閉じている間は返答できないので必ずタイムアウトする
        let first = worker.estimate(seq.begin(), frame(), Some(Duration::from_millis(20)));
        assert_eq!(first, Estimate::TimedOut);

        // 1件目の返答が先に届くが、別キャプチャのものなので捨てられる
        open.send(()).unwrap();
        let second = worker.estimate(seq.begin(), frame(), None);
        assert_eq!(second, Estimate::NoSubject);
    }

    #[test]
    fn test_static_poses_mirrored() {
        let poses = StaticPoses::new(vec![marker_pose(100.0)]).mirrored(600);
        assert_eq!(poses.poses(), &[marker_pose(500.0)]);
    }

    #[test]
    fn test_static_poses_accepts_single_object() {
        let json = r#"{"keypoints": [{"name": "nose", "x": 1.0, "y": 2.0, "score": 0.5}]}"#;
        let poses = StaticPoses::from_json(json).unwrap();
        assert_eq!(poses.poses().len(), 1);
        assert_eq!(poses.poses()[0].keypoints[0].name, KeypointName::Nose);
    }
}
