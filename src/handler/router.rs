//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: request logging, preflight,
//! static assets, bounded body parsing, the API route table and the 404
//! fallback. Panics below this point are answered with a 500.

use crate::config::AppState;
use crate::handler::static_files;
use crate::http;
use crate::logger::{self, AccessLogEntry};
use crate::proxy::body;
use crate::proxy::{self, query, ProxyRequest, Route};
use crate::store::DocumentStore;
use futures::FutureExt;
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::header::{ACCESS_CONTROL_REQUEST_HEADERS, ORIGIN, REFERER, USER_AGENT};
use hyper::http::request::Parts;
use hyper::{HeaderMap, Method, Request, Response, StatusCode};
use std::any::Any;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

/// Request context encapsulating information needed for request processing
pub struct RequestContext<'a> {
    pub path: &'a str,
    /// Path and query exactly as received
    pub original_url: &'a str,
    pub is_head: bool,
    pub if_none_match: Option<String>,
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B, S>(
    req: Request<B>,
    state: Arc<AppState<S>>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: std::error::Error + Send + Sync + 'static,
    S: DocumentStore,
{
    let started = Instant::now();
    let (parts, body) = req.into_parts();
    let original_url = parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path().to_string(), ToString::to_string);
    let config = &state.config;

    logger::log_request(&parts.method, &original_url);

    let ctx = RequestContext {
        path: parts.uri.path(),
        original_url: &original_url,
        is_head: parts.method == Method::HEAD,
        if_none_match: header_string(&parts.headers, hyper::header::IF_NONE_MATCH),
    };

    // 1. Preflight
    let mut response = if parts.method == Method::OPTIONS {
        http::build_options_response(
            config.http.enable_cors,
            parts
                .headers
                .get(ACCESS_CONTROL_REQUEST_HEADERS)
                .and_then(|v| v.to_str().ok()),
        )
    // 2. Everything else, with panics turned into 500s
    } else {
        match AssertUnwindSafe(route_request(&ctx, &parts, body, &state))
            .catch_unwind()
            .await
        {
            Ok(resp) => resp,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                logger::log_error(&format!(
                    "Unhandled panic while serving {} {original_url}: {message}",
                    parts.method
                ));
                http::build_text_response(StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        }
    };

    if config.http.enable_cors {
        http::apply_cors(&mut response, parts.headers.get(ORIGIN));
    }
    if let Ok(server) = hyper::header::HeaderValue::from_str(&config.http.server_name) {
        response.headers_mut().insert(hyper::header::SERVER, server);
    }
    if ctx.is_head {
        response = http::strip_body(response);
    }

    if config.logging.access_log {
        log_access(
            &parts,
            &original_url,
            peer_addr,
            &response,
            started,
            &config.logging.access_log_format,
        );
    }

    Ok(response)
}

/// Static assets, then the API route table, then the 404 fallback
async fn route_request<B, S>(
    ctx: &RequestContext<'_>,
    parts: &Parts,
    body: B,
    state: &AppState<S>,
) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: std::error::Error + Send + Sync + 'static,
    S: DocumentStore,
{
    let config = &state.config;

    if matches!(parts.method, Method::GET | Method::HEAD) {
        if let Some(resp) = static_files::serve_static(
            ctx,
            &config.static_files.dir,
            &config.static_files.index_files,
        )
        .await
        {
            return resp;
        }
    }

    let query = query::parse_query(parts.uri.query());
    // Body errors surface like any other unhandled failure: 500 with the message
    let body = match body::parse_body(&parts.headers, body, config.http.max_body_size).await {
        Ok(map) => map,
        Err(e) => {
            logger::log_error(&format!(
                "Invalid request body ({} bytes max): {e}",
                config.http.max_body_size
            ));
            return http::build_text_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };

    if config.logging.log_params {
        logger::log_params("GET", &query);
        logger::log_params("BODY", &body);
    }

    match Route::resolve(&parts.method, ctx.path, &config.http.api_prefix) {
        Some(route) => proxy::execute(&state.store, ProxyRequest { route, query, body }).await,
        None if ctx.original_url.starts_with(config.http.api_prefix.as_str()) => {
            http::build_api_404_response(ctx.original_url)
        }
        None => http::build_page_404_response(&state.error_page),
    }
}

fn header_string(headers: &HeaderMap, name: hyper::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Internal Server Error".to_string()
    }
}

fn log_access(
    parts: &Parts,
    original_url: &str,
    peer_addr: SocketAddr,
    response: &Response<Full<Bytes>>,
    started: Instant,
    format: &str,
) {
    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        parts.method.to_string(),
        original_url.to_string(),
    );
    entry.http_version = format!("{:?}", parts.version)
        .trim_start_matches("HTTP/")
        .to_string();
    entry.status = response.status().as_u16();
    entry.body_bytes = response.body().size_hint().exact().unwrap_or(0);
    entry.referer = header_string(&parts.headers, REFERER);
    entry.user_agent = header_string(&parts.headers, USER_AGENT);
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
    logger::log_access(&entry, format);
}
