pub mod detector;
pub mod joint;
pub mod observation;
pub mod worker;

pub use detector::{BodyPoseDetector, SidecarDetector, DEFAULT_SIDECAR_SUFFIX};
pub use joint::{JointName, KinematicTree};
pub use observation::{JointEntry, Observation, ObservationBuilder, ObservationFile, RecognizedPoint};
pub use worker::{spawn_detection_worker, DetectionOutcome, DetectionRequest, ObservationHolder};
