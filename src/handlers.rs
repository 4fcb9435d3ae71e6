//! Per-request dispatch.
//!
//! Every request makes a single pass: clean the path, answer from the
//! asset bundle if the reserved prefix matches, otherwise stat the
//! resolved file and branch on what it is. No state is retried.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path as AxumPath, Request, State},
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
};
use tower_http::services::ServeFile;

use crate::assets::{self, AssetBundle};
use crate::config::ServerConfig;
use crate::errors::ServeError;
use crate::render::{self, RenderOptions};
use crate::resolve;

/// Shared request context, constructed once in the entry point and cloned
/// into every handler. Nothing in it is ever mutated after startup.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub render: Arc<RenderOptions>,
    pub assets: Arc<AssetBundle>,
}

impl AppContext {
    pub fn new(config: ServerConfig) -> Self {
        let render = RenderOptions::new(&config.lang);
        let assets = AssetBundle::new(config.justify);
        AppContext {
            config: Arc::new(config),
            render: Arc::new(render),
            assets: Arc::new(assets),
        }
    }
}

/// Requests for the base directory itself.
pub async fn handle_root(
    State(ctx): State<AppContext>,
    req: Request,
) -> Result<Response, ServeError> {
    dispatch(&ctx, "", req).await
}

/// All other paths, via the wildcard route.
pub async fn handle_request(
    State(ctx): State<AppContext>,
    AxumPath(path): AxumPath<String>,
    req: Request,
) -> Result<Response, ServeError> {
    dispatch(&ctx, &path, req).await
}

async fn dispatch(ctx: &AppContext, raw: &str, req: Request) -> Result<Response, ServeError> {
    let cleaned = resolve::clean_request_path(raw);
    log::debug!("request for '{}' cleaned to '{}'", raw, cleaned);

    // Bundled assets are checked before any filesystem resolution and are
    // never read from the served directory.
    if cleaned.starts_with(assets::ASSET_PREFIX) {
        return match ctx.assets.lookup(&cleaned) {
            Some(bytes) => {
                let ctype = mime_guess::from_path(&cleaned).first_or_octet_stream();
                let mut resp = Response::new(Body::from(bytes));
                resp.headers_mut().insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_str(ctype.as_ref())
                        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
                );
                Ok(resp)
            }
            None => {
                log::error!("request for unknown bundled asset: '{}'", cleaned);
                Err(ServeError::NotFound)
            }
        };
    }

    let full = resolve::join_base(&ctx.config.base_dir, &cleaned);
    let meta = match fs::metadata(&full) {
        Ok(meta) => meta,
        Err(_) => {
            log::warn!("not found: '{}'", cleaned);
            return Err(ServeError::NotFound);
        }
    };

    if meta.is_dir() {
        // A directory with a readable index.md redirects there;
        // directories are never listed.
        let index = full.join("index.md");
        if index.is_file() && readable(&index) {
            let location = if cleaned.is_empty() {
                "/index.md".to_string()
            } else {
                format!("/{}/index.md", cleaned)
            };
            log::info!("redirecting '{}' to '{}'", cleaned, location);
            return Ok(redirect_permanent(&location));
        }
        return Err(ServeError::Forbidden);
    }

    if !meta.is_file() || !readable(&full) {
        log::warn!("forbidden: '{}'", cleaned);
        return Err(ServeError::Forbidden);
    }

    if is_markdown(&full) {
        // The file may have vanished between the stat and this read; that
        // race surfaces as a 500, not a 404.
        let source = fs::read_to_string(&full)?;
        let (body, doc) =
            render::render(&ctx.render, &source).map_err(|e| ServeError::Render(e.to_string()))?;
        // The title and date slots come straight from front matter and sit
        // outside the sanitized body fragment, so they are escaped here.
        let title = assets::escape_html(doc.display_title());
        let date = assets::escape_html(&doc.display_date());
        let page = assets::fill_template(
            ctx.assets.template(),
            [&ctx.config.lang, &title, &body, &date],
        );
        log::info!("rendered markdown: '{}'", cleaned);
        return Ok(Html(page).into_response());
    }

    // Static passthrough with range support and content negotiation.
    let mut service = ServeFile::new(&full);
    let resp = service.try_call(req).await.map_err(ServeError::Io)?;
    log::info!("served static file: '{}'", cleaned);
    Ok(resp.into_response())
}

fn redirect_permanent(location: &str) -> Response {
    let mut resp = Response::new(Body::empty());
    *resp.status_mut() = StatusCode::MOVED_PERMANENTLY;
    match HeaderValue::from_str(location) {
        Ok(value) => {
            resp.headers_mut().insert(header::LOCATION, value);
        }
        Err(_) => log::warn!("redirect target is not a valid header value: '{}'", location),
    }
    resp
}

/// Readability probe, same semantics as the stat+open check the dispatch
/// contract requires: permission is judged by actually opening the file.
fn readable(path: &Path) -> bool {
    fs::File::open(path).is_ok()
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("markdown"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_extensions() {
        assert!(is_markdown(Path::new("a/notes.md")));
        assert!(is_markdown(Path::new("notes.markdown")));
        assert!(is_markdown(Path::new("NOTES.MD")));
        assert!(!is_markdown(Path::new("notes.txt")));
        assert!(!is_markdown(Path::new("md")));
    }

    #[test]
    fn permanent_redirect_shape() {
        let resp = redirect_permanent("/docs/index.md");
        assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(
            resp.headers().get(header::LOCATION).unwrap(),
            "/docs/index.md"
        );
    }
}
