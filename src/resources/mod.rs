//! Loading models from the asset root.
//!
//! Natively assets are read from a directory with tokio; on the web they are
//! fetched relative to `<origin>/<asset root>/` with reqwest. Both paths end
//! in the same glTF decoder in [`gltf_loader`]. Draco-compressed meshes are
//! decompressed by the browser's Draco decoder module, so they only load in
//! the web build.

use std::{collections::HashMap, pin::Pin};

use crate::{
    animation::AnimationClip,
    data_structures::scene_graph::SceneNode,
    error::LoadError,
    resources::gltf_loader::{DecodedGeometry, DracoPrimitive},
};

#[cfg(target_arch = "wasm32")]
mod draco;
pub mod gltf_loader;

/// What a successful load produces: the model's root node and its clips.
pub struct LoadedModel {
    pub root: Box<dyn SceneNode>,
    pub clips: Vec<AnimationClip>,
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel")
            .field("root", &self.root.name())
            .field("clips", &self.clips.len())
            .finish()
    }
}

pub type LoadFuture = Pin<Box<dyn Future<Output = Result<LoadedModel, LoadError>>>>;

/// Produces models for paths; the seam between model management and I/O.
pub trait AssetLoader {
    fn load(&self, path: &str) -> LoadFuture;
}

/// Loads glTF 2.0 / GLB files from the asset root.
#[derive(Clone, Debug)]
pub struct GltfLoader {
    root: String,
    #[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
    draco_decoder: String,
}

impl GltfLoader {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            draco_decoder: "draco/".to_string(),
        }
    }

    /// Where the web build finds `draco_decoder.js`.
    pub fn with_draco_decoder(mut self, path: impl Into<String>) -> Self {
        self.draco_decoder = path.into();
        self
    }
}

impl AssetLoader for GltfLoader {
    fn load(&self, path: &str) -> LoadFuture {
        let root = self.root.clone();
        let draco_decoder = self.draco_decoder.clone();
        let path = path.to_string();
        Box::pin(async move {
            let bytes = load_binary(&root, &path).await?;
            let document = gltf_loader::parse_document(&bytes, &path)?;

            let mut external = HashMap::new();
            for uri in gltf_loader::external_uris(&document) {
                let resolved = resolve_uri(&path, &uri);
                match load_binary(&root, &resolved).await {
                    Ok(data) => {
                        external.insert(uri, data);
                    }
                    // missing images only cost the texture, missing buffers fail in decoding
                    Err(e) => log::warn!("{}", e),
                }
            }

            let compressed = gltf_loader::draco_primitives(&document, &path, &external)?;
            let decoded = decode_draco(&draco_decoder, &path, compressed).await?;

            let model = gltf_loader::build_model(document, &path, &external, &decoded)?;
            log::info!("Model loaded successfully: {}", path);
            Ok(model)
        })
    }
}

#[cfg(target_arch = "wasm32")]
async fn decode_draco(
    decoder_path: &str,
    path: &str,
    compressed: Vec<DracoPrimitive>,
) -> Result<DecodedGeometry, LoadError> {
    let mut decoded = DecodedGeometry::new();
    for primitive in compressed {
        let geometry = draco::decode(decoder_path, &primitive)
            .await
            .map_err(|e| LoadError::parse(path, e))?;
        decoded.insert((primitive.mesh, primitive.primitive), geometry);
    }
    if !decoded.is_empty() {
        log::info!("Decompressed {} Draco primitives of {}", decoded.len(), path);
    }
    Ok(decoded)
}

#[cfg(not(target_arch = "wasm32"))]
async fn decode_draco(
    _decoder_path: &str,
    path: &str,
    compressed: Vec<DracoPrimitive>,
) -> Result<DecodedGeometry, LoadError> {
    match compressed.first() {
        Some(primitive) => Err(LoadError::parse(
            path,
            format!(
                "mesh {} is Draco compressed, which only the web build can decode",
                primitive.mesh
            ),
        )),
        None => Ok(DecodedGeometry::new()),
    }
}

/// Resolves a URI found inside the model file relative to the model's directory.
pub fn resolve_uri(model_path: &str, uri: &str) -> String {
    match model_path.rsplit_once('/') {
        Some((dir, _)) => format!("{}/{}", dir, uri),
        None => uri.to_string(),
    }
}

#[cfg(target_arch = "wasm32")]
fn format_url(root: &str, file_name: &str) -> Result<reqwest::Url, LoadError> {
    let origin = web_sys::window()
        .and_then(|window| window.location().origin().ok())
        .ok_or_else(|| LoadError::network(file_name, "page origin is unavailable"))?;
    let base = reqwest::Url::parse(&format!("{}/{}/", origin, root.trim_matches('/')))
        .map_err(|e| LoadError::network(file_name, e))?;
    base.join(file_name)
        .map_err(|e| LoadError::network(file_name, e))
}

fn log_progress(file_name: &str, loaded: u64, total: u64, last_logged: &mut Option<u64>) {
    if total == 0 {
        return;
    }
    let percent = ((loaded as f64 / total as f64) * 100.0).round() as u64;
    if last_logged.is_none_or(|last| percent / 10 > last / 10) {
        log::info!("Loading progress: {}% ({})", percent, file_name);
        *last_logged = Some(percent);
    }
}

/// Maps an HTTP status and body to the file contents or a load error.
///
/// An error status whose body is an HTML page is reported like HTML read as a
/// model, so a static server's 404 page is a parse error on every platform.
pub fn classify_response(
    file_name: &str,
    status: u16,
    body: Vec<u8>,
) -> Result<Vec<u8>, LoadError> {
    if (200..300).contains(&status) {
        return Ok(body);
    }
    if gltf_loader::looks_like_html(&body) {
        return Err(LoadError::HtmlDocument {
            path: file_name.to_string(),
        });
    }
    Err(LoadError::network(file_name, format!("HTTP status {}", status)))
}

pub async fn load_binary(root: &str, file_name: &str) -> Result<Vec<u8>, LoadError> {
    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = format_url(root, file_name)?;
        let response = reqwest::get(url)
            .await
            .map_err(|e| LoadError::network(file_name, e))?;
        let status = response.status().as_u16();
        let total = response.content_length().unwrap_or(0);
        let body = response
            .bytes()
            .await
            .map_err(|e| LoadError::network(file_name, e))?
            .to_vec();
        let data = classify_response(file_name, status, body)?;
        log_progress(file_name, data.len() as u64, total, &mut None);
        data
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = {
        use tokio::io::AsyncReadExt;

        let path = std::path::Path::new(root).join(file_name);
        let mut file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| LoadError::network(file_name, e))?;
        let total = file
            .metadata()
            .await
            .map(|meta| meta.len())
            .unwrap_or(0);

        let mut data = Vec::with_capacity(total as usize);
        let mut chunk = vec![0u8; 64 * 1024];
        let mut last_logged = None;
        loop {
            let read = file
                .read(&mut chunk)
                .await
                .map_err(|e| LoadError::network(file_name, e))?;
            if read == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..read]);
            log_progress(file_name, data.len() as u64, total, &mut last_logged);
        }
        data
    };

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadErrorKind;

    #[test]
    fn html_error_pages_are_parse_errors() {
        let page = b"<!DOCTYPE html><html><body>Cannot GET /assets/Soldier.glb</body></html>";
        let err = classify_response("Soldier.glb", 404, page.to_vec()).unwrap_err();
        assert_eq!(err.kind(), LoadErrorKind::Parse);
        assert_eq!(
            err,
            LoadError::HtmlDocument {
                path: "Soldier.glb".to_string()
            }
        );
    }

    #[test]
    fn error_statuses_without_a_page_are_network_errors() {
        let err = classify_response("Soldier.glb", 503, Vec::new()).unwrap_err();
        assert_eq!(err.kind(), LoadErrorKind::Network);
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn successful_responses_pass_the_body_through() {
        let body = b"glTF\x02\x00\x00\x00".to_vec();
        assert_eq!(classify_response("Soldier.glb", 200, body.clone()), Ok(body));
    }

    #[test]
    fn uris_resolve_next_to_the_model() {
        assert_eq!(resolve_uri("Soldier.gltf", "Soldier.bin"), "Soldier.bin");
        assert_eq!(
            resolve_uri("models/city/scene.gltf", "textures/a.png"),
            "models/city/textures/a.png"
        );
    }
}
