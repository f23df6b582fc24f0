//! Minimal static file server for previewing a built site.

use std::path::{Component, Path, PathBuf};

use color_eyre::eyre::{Result, eyre};
use percent_encoding::percent_decode_str;
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};
use tracing::{debug, warn};

/// Listen on `127.0.0.1:port`. Port 0 picks a free port.
pub(crate) fn bind(port: u16) -> Result<Server> {
    Server::http(("127.0.0.1", port))
        .map_err(|e| eyre!("failed to start server on port {port}: {e}"))
}

/// Answer requests with files under `root`. Blocks until
/// [`Server::unblock`] is called.
pub(crate) fn serve_dir(server: &Server, root: &Path) {
    for request in server.incoming_requests() {
        if let Err(e) = handle(root, request) {
            warn!(error = %e, "failed to send response");
        }
    }
    debug!("server stopped");
}

fn handle(root: &Path, request: Request) -> std::io::Result<()> {
    if !matches!(request.method(), Method::Get | Method::Head) {
        let response = Response::from_string("method not allowed").with_status_code(StatusCode(405));
        return request.respond(response);
    }

    let Some(path) = resolve(root, request.url()) else {
        debug!(url = %request.url(), "rejected request path");
        let response = Response::from_string("bad request").with_status_code(StatusCode(400));
        return request.respond(response);
    };

    match std::fs::read(&path) {
        Ok(body) => {
            debug!(url = %request.url(), "200");
            let mut response = Response::from_data(body).with_status_code(StatusCode(200));
            let mime = content_type(&path).as_bytes();
            if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], mime) {
                response = response.with_header(header);
            }
            request.respond(response)
        }
        Err(_) => {
            debug!(url = %request.url(), "404");
            let response = Response::from_string("not found").with_status_code(StatusCode(404));
            request.respond(response)
        }
    }
}

/// Map a request URL to a file under `root`.
///
/// Directories map to their `index.html`. `None` when the path would leave
/// `root`.
fn resolve(root: &Path, url: &str) -> Option<PathBuf> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let decoded = percent_decode_str(path).decode_utf8().ok()?;

    let relative = Path::new(decoded.trim_start_matches('/'));
    if !relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }

    let mut target = root.join(relative);
    if target.is_dir() {
        target.push("index.html");
    }
    Some(target)
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}
