//! Loading of external assets.
//!
//! - `error` holds [`LoadError`], the only error the loader reports
//! - `gltf_loader` turns glTF / GLB bytes into a scene graph
//! - `loader` runs a load in the background and reports through callbacks
//! - `binder` rewrites the materials of a freshly loaded model by name
//!
//! Natively, files are read from `./assets/`; on the web they are fetched
//! relative to the page origin.

pub mod binder;
pub mod error;
pub mod gltf_loader;
pub mod loader;

pub use error::LoadError;
pub use gltf_loader::{load_model_gltf, parse_gltf};

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> Result<reqwest::Url, LoadError> {
    let unavailable = |reason: String| LoadError::Missing {
        path: file_name.to_string(),
        source: std::io::Error::other(reason),
    };
    let origin = web_sys::window()
        .ok_or_else(|| unavailable("no window".to_string()))?
        .location()
        .origin()
        .map_err(|_| unavailable("page origin is not readable".to_string()))?;
    let base = reqwest::Url::parse(&format!("{origin}/assets/"))
        .map_err(|e| unavailable(e.to_string()))?;
    base.join(file_name).map_err(|e| unavailable(e.to_string()))
}

/// Read an asset as raw bytes.
pub async fn load_binary(file_name: &str) -> Result<Vec<u8>, LoadError> {
    #[cfg(target_arch = "wasm32")]
    let data = {
        let missing = |e: reqwest::Error| LoadError::Missing {
            path: file_name.to_string(),
            source: std::io::Error::other(e.to_string()),
        };
        let url = format_url(file_name)?;
        reqwest::get(url)
            .await
            .and_then(|response| response.error_for_status())
            .map_err(missing)?
            .bytes()
            .await
            .map_err(missing)?
            .to_vec()
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = {
        let path = std::path::Path::new("./").join("assets").join(file_name);
        tokio::fs::read(path)
            .await
            .map_err(|source| LoadError::Missing {
                path: file_name.to_string(),
                source,
            })?
    };

    Ok(data)
}

/// Resolve `uri` against the directory of the file that references it.
pub(crate) fn resolve_relative(base: &str, uri: &str) -> String {
    match base.rfind('/') {
        Some(idx) => format!("{}/{}", &base[..idx], uri),
        None => uri.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_uris_resolve_next_to_the_model() {
        assert_eq!(resolve_relative("monkey.gltf", "monkey.bin"), "monkey.bin");
        assert_eq!(
            resolve_relative("models/hut/hut.gltf", "hut.bin"),
            "models/hut/hut.bin"
        );
    }

    #[tokio::test]
    async fn absent_files_are_missing() {
        let err = load_binary("does/not/exist.glb").await.unwrap_err();
        assert!(matches!(err, LoadError::Missing { .. }));
        assert_eq!(err.path(), "does/not/exist.glb");
    }
}
