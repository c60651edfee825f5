pub mod bone;
pub mod camera;
pub mod composer;
pub mod export;
pub mod image;
pub mod image_plane;
pub mod node;
pub mod proportion;
pub mod skeleton;

pub use bone::{apply_head_box, compute_bone_transform, connect_to_parent, BoneTransform, BONE_ORDER};
pub use camera::{build_camera_node, CameraMode};
pub use composer::{ComposedScene, SceneComposer};
pub use export::SceneExport;
pub use image::{load_source_image, ImageSource, SourceImage};
pub use image_plane::{build_image_plane, compute_root_offset, resize_image_plane, PlaneSize};
pub use node::{Geometry, Material, NodeRole, RenderSurface, Scene, SceneNode, SceneSlot};
pub use proportion::{estimate_scale, estimate_skeleton_scale};
pub use skeleton::{build_joint_nodes, JointNodeMap};
