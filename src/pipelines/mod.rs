//! Render pipelines.
//!
//! - `basic` is the lit, textured pipeline every mesh is drawn with
//! - `light` holds the scene lights and their uniform buffer

pub mod basic;
pub mod light;
