//! Static file serving module
//!
//! Serves assets from the configured directory ahead of the API routes and
//! provides the page used for 404s outside the API prefix.

use crate::handler::router::RequestContext;
use crate::http;
use crate::logger;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Served when the configured error page cannot be read
pub const FALLBACK_ERROR_PAGE: &str = "<h1>Risorsa non trovata</h1>";

/// Read the 404 page once; falls back to a minimal page
pub async fn load_error_page(path: &str) -> String {
    match fs::read_to_string(path).await {
        Ok(page) => page,
        Err(e) => {
            logger::log_warning(&format!(
                "Error page '{path}' unavailable ({e}), using built-in page"
            ));
            FALLBACK_ERROR_PAGE.to_string()
        }
    }
}

/// Serve a file below `static_dir` if one exists for the request path
///
/// Returns `None` when nothing matches so the request can fall through to
/// the API routes.
pub async fn serve_static(
    ctx: &RequestContext<'_>,
    static_dir: &str,
    index_files: &[String],
) -> Option<Response<Full<Bytes>>> {
    let file_path = resolve_path(static_dir, ctx.path, index_files)?;

    let content = match fs::read(&file_path).await {
        Ok(c) => c,
        Err(e) => {
            logger::log_error(&format!(
                "Failed to read file '{}': {}",
                file_path.display(),
                e
            ));
            return None;
        }
    };

    let etag = generate_etag(&content);
    if check_etag_match(ctx.if_none_match.as_deref(), &etag) {
        return Some(http::build_304_response(&etag));
    }

    let content_type = content_type(&file_path);
    Some(http::build_static_response(
        content,
        content_type,
        &etag,
        ctx.is_head,
    ))
}

/// Map a URL path onto an existing file inside `static_dir`
fn resolve_path(static_dir: &str, path: &str, index_files: &[String]) -> Option<PathBuf> {
    let decoded = percent_encoding::percent_decode_str(path).decode_utf8().ok()?;
    let relative = decoded.trim_start_matches('/');
    if relative.split('/').any(|seg| seg == "..") {
        return None;
    }

    let mut file_path = Path::new(static_dir).join(relative);
    if file_path.is_dir() {
        file_path = index_files
            .iter()
            .map(|index| file_path.join(index))
            .find(|candidate| candidate.is_file())?;
    }
    if !file_path.is_file() {
        return None;
    }

    // Symlinks must not lead outside the directory
    let root = Path::new(static_dir).canonicalize().ok()?;
    let canonical = file_path.canonicalize().ok()?;
    if !canonical.starts_with(&root) {
        logger::log_warning(&format!(
            "Path traversal attempt blocked: {} -> {}",
            path,
            canonical.display()
        ));
        return None;
    }
    Some(canonical)
}

/// Content-Type from the file extension
fn content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json" | "map") => "application/json; charset=utf-8",
        Some("txt") => "text/plain; charset=utf-8",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("webp") => "image/webp",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Quoted `ETag` of the file content
fn generate_etag(content: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    format!("\"{:x}\"", hasher.finish())
}

/// `If-None-Match` against our `ETag` (lists and `*` supported)
fn check_etag_match(if_none_match: Option<&str>, etag: &str) -> bool {
    if_none_match.is_some_and(|client_etag| {
        client_etag
            .split(',')
            .any(|e| e.trim() == etag || e.trim() == "*")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_files() -> Vec<String> {
        vec!["index.html".to_string()]
    }

    #[test]
    fn test_resolve_file_and_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<p>home</p>").unwrap();
        std::fs::write(dir.path().join("app.js"), "let a;").unwrap();
        let root = dir.path().to_str().unwrap();

        let js = resolve_path(root, "/app.js", &index_files()).unwrap();
        assert!(js.ends_with("app.js"));
        let home = resolve_path(root, "/", &index_files()).unwrap();
        assert!(home.ends_with("index.html"));
        assert!(resolve_path(root, "/missing.css", &index_files()).is_none());
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("static");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(dir.path().join("secret.txt"), "x").unwrap();
        let root = root.to_str().unwrap();

        assert!(resolve_path(root, "/../secret.txt", &index_files()).is_none());
        assert!(resolve_path(root, "/%2e%2e/secret.txt", &index_files()).is_none());
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type(Path::new("a/index.HTML")), "text/html; charset=utf-8");
        assert_eq!(content_type(Path::new("logo.svg")), "image/svg+xml");
        assert_eq!(content_type(Path::new("blob")), "application/octet-stream");
    }

    #[test]
    fn test_etag_match() {
        let etag = generate_etag(b"same content");
        assert_eq!(etag, generate_etag(b"same content"));
        assert_ne!(etag, generate_etag(b"other content"));
        assert!(check_etag_match(Some(&etag), &etag));
        assert!(check_etag_match(Some("\"xyz\", *"), &etag));
        assert!(!check_etag_match(Some("\"xyz\""), &etag));
        assert!(!check_etag_match(None, &etag));
    }

    #[tokio::test]
    async fn test_error_page_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("error.html");
        assert_eq!(
            load_error_page(page.to_str().unwrap()).await,
            FALLBACK_ERROR_PAGE
        );
        std::fs::write(&page, "<h1>Gone</h1>").unwrap();
        assert_eq!(load_error_page(page.to_str().unwrap()).await, "<h1>Gone</h1>");
    }
}
