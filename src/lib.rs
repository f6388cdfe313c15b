pub mod booth;
#[cfg(feature = "desktop")]
pub mod camera;
pub mod compose;
pub mod config;
pub mod filter;
pub mod placement;
pub mod pose;
pub mod render;

/// build.rs が埋め込むバージョン文字列
pub const VERSION: &str = env!("BOOTH_BUILD_VERSION");
