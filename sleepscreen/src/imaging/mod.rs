//! Image preparation for the device display

pub mod resize;

pub use resize::{ImagePipeline, PaperProResizer, TARGET_HEIGHT, TARGET_WIDTH};
