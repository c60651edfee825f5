pub mod config;
pub mod error;
pub mod logging;
pub mod math;
pub mod pose;
pub mod render;
pub mod scene;
