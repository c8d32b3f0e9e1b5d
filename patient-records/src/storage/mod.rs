//! Storage module
//!
//! Provides on-disk storage for record photographs.

pub mod image_store;

pub use image_store::{ImagePayload, ImageStore};
