pub mod capture;

pub use capture::OpenCvCamera;
