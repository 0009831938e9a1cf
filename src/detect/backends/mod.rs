pub mod motion;
pub mod synthetic;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use motion::MotionDetector;
pub use synthetic::SyntheticDetector;

#[cfg(feature = "backend-tract")]
pub use tract::TractDetector;
