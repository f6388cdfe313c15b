#[cfg(feature = "desktop")]
pub mod detector;
pub mod estimator;
pub mod keypoint;
pub mod preprocess;

#[cfg(feature = "desktop")]
pub use detector::MoveNetEstimator;
pub use estimator::{CaptureId, CaptureSequence, Estimate, EstimatorWorker, PoseEstimator, StaticPoses};
pub use keypoint::{KeypointName, Landmark, Pose, CONFIDENCE_THRESHOLD};
pub use preprocess::{preprocess_for_movenet, MOVENET_INPUT_SIZE};
