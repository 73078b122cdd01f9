//! flow-glow
//!
//! A small wgpu viewer that loads a glTF model, gives the submeshes of one
//! group a holdout and a glow material, and renders the scene through a bloom
//! and AgX tone-mapping chain under an orbit camera. It runs natively and on
//! the web (WebGL).
//!
//! High-level modules
//! - `camera`: perspective camera, orbit controls and the camera uniform
//! - `config`: the viewer configuration and its defaults
//! - `context`: GPU device, surface and per-frame state
//! - `data_structures`: scene graph, meshes, materials, textures, instances
//! - `flow`: the event loop that drives frames and receives loaded models
//! - `pipelines`: base, bloom and output passes plus the light uniform
//! - `render`: the fixed chain of passes that makes up a frame
//! - `resources`: asset loading, glTF import and material rebinding
//!

pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod flow;
pub mod pipelines;
pub mod render;
pub mod resources;

pub use config::ViewerConfig;
pub use flow::run;
pub use resources::LoadError;
