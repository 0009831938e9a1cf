mod backend;
pub mod backends;
mod registry;
mod result;

pub use backend::{Detector, FpsMeter};
pub use backends::{MotionDetector, SyntheticDetector};
pub use registry::{DetectorRegistry, NetworkSpec};
pub use result::{BoundingBox, DetectionResult};
