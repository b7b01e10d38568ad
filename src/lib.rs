//! haunted-house
//!
//! A fog-bound haunted house rendered with a small instancing-oriented wgpu
//! engine that runs natively and in the browser. The engine half of the crate
//! owns GPU resources, pipelines and the scene graph; the [`scene`] module
//! assembles and animates the house on top of it.
//!
//! High-level modules
//! - `camera`: orbit camera, damped orbit controller and view/projection uniforms
//! - `config`: scene parameter tables with TOML overrides
//! - `context`: central GPU and window context that owns device/queue/pipelines
//! - `data_structures`: engine data models (geometry, meshes, instances, textures, scene graph)
//! - `flow`: high level flow control (scenes / update loops)
//! - `pipelines`: render pipelines for lit geometry, shadows and the sky
//! - `resources`: asset loading and material assembly
//! - `render`: render composition for efficient pipeline reuse
//! - `scene`: the haunted house itself
//!

pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod flow;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod scene;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath::*;
pub use winit::event::DeviceEvent;
pub use winit::event::WindowEvent;

/// Web entry point: runs the default scene with assets served next to the page.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen::prelude::wasm_bindgen(start)]
pub fn start() -> Result<(), wasm_bindgen::JsValue> {
    scene::launch(
        config::SceneConfig::default(),
        resources::Assets::default(),
        None,
    )
    .map_err(|e| wasm_bindgen::JsValue::from_str(&format!("{e:#}")))
}
