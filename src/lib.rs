//! flow-viewer
//!
//! A small cross-platform glTF viewer built on wgpu and winit. It shows one of
//! two models on a floor, lit by an ambient, a directional and a point light,
//! and lets the user switch models, orbit the camera and tune the lights.
//!
//! High-level modules
//! - `camera`: orbit camera, damped controller and the camera uniform
//! - `config`: viewer configuration with TOML overrides
//! - `context`: central GPU and window context that owns device/queue/pipelines
//! - `data_structures`: meshes, materials, instances, bounds and the scene graph
//! - `flow`: the event loop driving [`flow::GraphicsFlow`] implementations
//! - `model_manager`: loading, placing and switching the displayed model
//! - `panel`: keyboard panel editing the lights
//! - `pipelines`: the lit render pipeline and light uniforms
//! - `resources`: asset I/O and glTF decoding
//! - `render`: render composition handed from flows to the context
//! - `render_loop`: frame gating and per-frame ordering
//! - `viewer`: the flow composing everything above

pub mod animation;
pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod error;
pub mod flow;
pub mod model_manager;
pub mod panel;
pub mod pipelines;
pub mod render;
pub mod render_loop;
pub mod resources;
pub mod viewer;
#[cfg(target_arch = "wasm32")]
pub mod web;

use crate::{
    config::ViewerConfig,
    flow::ClickBinding,
    viewer::{Viewer, ViewerEvent},
};

/// Loads the configuration and runs the viewer until the window closes.
pub fn run() -> anyhow::Result<()> {
    flow::init_logging();
    let config = ViewerConfig::load()?;

    let clicks = vec![ClickBinding {
        element_id: config.dom.switch_button.clone(),
        event: || ViewerEvent::SwitchRequested,
    }];
    let viewer = Viewer::new(config.clone());
    flow::run(config, vec![Box::new(viewer)], clicks)
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen::prelude::wasm_bindgen(start)]
pub fn start() -> Result<(), wasm_bindgen::JsValue> {
    run().map_err(|e| wasm_bindgen::JsValue::from_str(&format!("{:#}", e)))
}
