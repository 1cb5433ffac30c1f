//! Viewer data structures: meshes, textures, scene graphs, and instances.
//!
//! - `bounds` holds axis-aligned boxes used to place models on the ground
//! - `model` contains vertex, primitive and material definitions
//! - `texture` contains GPU texture wrapper and creation utilities
//! - `instance` holds per-node transformation data
//! - `scene_graph` enables hierarchical scene organization
//! - `skin` deforms meshes with joint nodes

pub mod bounds;
pub mod instance;
pub mod model;
pub mod scene_graph;
pub mod skin;
pub mod texture;
