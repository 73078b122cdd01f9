//! Scene data: the node hierarchy and what its meshes are made of.
//!
//! - `scene_graph` holds the node hierarchy and the [`scene_graph::Scene`] store
//! - `model` contains vertex layouts and GPU mesh buffers
//! - `material` holds materials, including the shared holdout and glow ones
//! - `texture` contains the GPU texture wrapper and render target constructors
//! - `instance` holds per-node transforms as uploaded to the instance buffer

pub mod instance;
pub mod material;
pub mod model;
pub mod scene_graph;
pub mod texture;
