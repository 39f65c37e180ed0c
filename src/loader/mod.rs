//! Helpers that place program images into core memory.

pub mod image;

pub use image::{load_bytes, load_image, LoaderError};
