use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use mime_guess::from_path;
use rust_embed::RustEmbed;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::app::AppState;

#[derive(RustEmbed)]
#[folder = "frontend/dist"]
pub struct Assets;

const INDEX: &str = "index.html";

/// Admin dashboard assets with SPA fallback to `index.html`
pub async fn serve_spa(State(state): State<Arc<AppState>>, uri: Uri) -> Response {
    serve_static(&uri, state.static_dir.as_deref()).await
}

/// Serve static files from embedded assets or filesystem
pub async fn serve_static(uri: &Uri, static_dir: Option<&str>) -> Response {
    let path = uri.path().trim_start_matches('/');
    let path = match path.strip_prefix("admin") {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => path,
    };
    let path = if path.is_empty() || !is_plain_relative(path) {
        INDEX
    } else {
        path
    };

    if let Some(dir) = static_dir {
        if let Some(response) = serve_from_dir(dir, path).await {
            return response;
        }
    }

    serve_embedded(path)
}

/// No `..`, root or prefix components
fn is_plain_relative(path: &str) -> bool {
    Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
}

async fn serve_from_dir(dir: &str, path: &str) -> Option<Response> {
    let file_path = PathBuf::from(dir).join(path);
    if let Ok(content) = tokio::fs::read(&file_path).await {
        return Some(file_response(&file_path, content));
    }

    let index_path = PathBuf::from(dir).join(INDEX);
    let content = tokio::fs::read(&index_path).await.ok()?;
    Some(file_response(&index_path, content))
}

/// Serve from embedded assets
fn serve_embedded(path: &str) -> Response {
    if let Some(content) = Assets::get(path) {
        return file_response(Path::new(path), content.data.into_owned());
    }

    match Assets::get(INDEX) {
        Some(index) => file_response(Path::new(INDEX), index.data.into_owned()),
        None => (StatusCode::NOT_FOUND, "404 Not Found").into_response(),
    }
}

fn file_response(path: &Path, content: Vec<u8>) -> Response {
    let mime = from_path(path).first_or_octet_stream();
    ([(header::CONTENT_TYPE, mime.as_ref().to_string())], content).into_response()
}
