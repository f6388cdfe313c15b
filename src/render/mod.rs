pub mod skeleton;
#[cfg(feature = "desktop")]
pub mod window;

pub use skeleton::{draw_skeleton, SKELETON_CONNECTIONS};
#[cfg(feature = "desktop")]
pub use minifb::Key;
#[cfg(feature = "desktop")]
pub use window::MinifbRenderer;
