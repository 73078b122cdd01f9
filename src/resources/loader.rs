//! Background model loading with completion callbacks.
//!
//! A load reports through exactly one of its two callbacks, exactly once:
//! `on_load` with the finished hierarchy or `on_error` with the [`LoadError`].
//! Both are `FnOnce`, so neither can fire twice.

use crate::{
    data_structures::scene_graph::SceneNode,
    resources::{LoadError, load_model_gltf},
};

/// Load `path` and hand the outcome to one of the callbacks.
///
/// Failures are logged before `on_error` runs. There is no retry.
pub async fn load<L, E>(path: &str, on_load: L, on_error: E)
where
    L: FnOnce(Box<dyn SceneNode>),
    E: FnOnce(LoadError),
{
    let start = instant::Instant::now();
    match load_model_gltf(path).await {
        Ok(model) => {
            log::info!("{path} loaded in {:?}", start.elapsed());
            on_load(model);
        }
        Err(err) => {
            log::error!("failed to load {path}: {err}");
            on_error(err);
        }
    }
}

/// Start [`load`] in the background and return immediately.
///
/// Natively the load runs on the ambient tokio runtime, so this must be called
/// from within a runtime context. On the web it runs on the browser's
/// microtask queue.
#[cfg(not(target_arch = "wasm32"))]
pub fn spawn_load<L, E>(path: impl Into<String>, on_load: L, on_error: E)
where
    L: FnOnce(Box<dyn SceneNode>) + Send + 'static,
    E: FnOnce(LoadError) + Send + 'static,
{
    let path = path.into();
    tokio::spawn(async move { load(&path, on_load, on_error).await });
}

#[cfg(target_arch = "wasm32")]
pub fn spawn_load<L, E>(path: impl Into<String>, on_load: L, on_error: E)
where
    L: FnOnce(Box<dyn SceneNode>) + 'static,
    E: FnOnce(LoadError) + 'static,
{
    let path = path.into();
    wasm_bindgen_futures::spawn_local(async move { load(&path, on_load, on_error).await });
}
