pub mod projection;
#[cfg(feature = "desktop")]
pub mod window;

pub use projection::{wireframe, OrbitCamera, Segment};
#[cfg(feature = "desktop")]
pub use minifb::Key;
#[cfg(feature = "desktop")]
pub use window::SceneWindow;
