//! Request body parsing
//!
//! JSON and form-encoded bodies are read up to a fixed size and turned into
//! a JSON object. Anything else yields an empty object.

use http_body_util::{BodyExt, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE};
use hyper::HeaderMap;
use serde_json::{Map, Value};

use super::query;
use crate::logger;

#[derive(Debug, thiserror::Error)]
pub enum BodyError {
    #[error("request entity too large")]
    TooLarge,

    #[error("{0}")]
    Malformed(String),

    #[error("failed to read request body: {0}")]
    Read(String),
}

enum BodyKind {
    Json,
    Form,
    Other,
}

fn body_kind(headers: &HeaderMap) -> BodyKind {
    let Some(content_type) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return BodyKind::Other;
    };
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if essence == "application/json" || essence.ends_with("+json") {
        BodyKind::Json
    } else if essence == "application/x-www-form-urlencoded" {
        BodyKind::Form
    } else {
        BodyKind::Other
    }
}

/// `Content-Length` when it is present and well-formed
fn declared_length(headers: &HeaderMap) -> Option<u64> {
    let value = headers.get(CONTENT_LENGTH)?;
    let parsed = value.to_str().ok().and_then(|v| v.trim().parse::<u64>().ok());
    if parsed.is_none() {
        logger::log_warning(&format!(
            "Invalid Content-Length value: {value:?}, skipping size check"
        ));
    }
    parsed
}

/// Read and parse a request body, never reading more than `limit` bytes
///
/// Only JSON and form bodies are bounded; a declared length over `limit`
/// is refused before anything is read.
pub async fn parse_body<B>(
    headers: &HeaderMap,
    body: B,
    limit: u64,
) -> Result<Map<String, Value>, BodyError>
where
    B: Body<Data = Bytes>,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let kind = body_kind(headers);
    if matches!(kind, BodyKind::Other) {
        return Ok(Map::new());
    }
    if declared_length(headers).is_some_and(|len| len > limit) {
        return Err(BodyError::TooLarge);
    }

    let limit = usize::try_from(limit).unwrap_or(usize::MAX);
    let bytes = match Limited::new(body, limit).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.is::<http_body_util::LengthLimitError>() => return Err(BodyError::TooLarge),
        Err(e) => return Err(BodyError::Read(e.to_string())),
    };

    match kind {
        BodyKind::Json => parse_json(&bytes),
        BodyKind::Form => Ok(query::parse_pairs(&bytes)),
        BodyKind::Other => Ok(Map::new()),
    }
}

fn parse_json(bytes: &[u8]) -> Result<Map<String, Value>, BodyError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(BodyError::Malformed(
            "request body must be a JSON object".to_string(),
        )),
        Err(e) => Err(BodyError::Malformed(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;
    use hyper::header::HeaderValue;

    fn headers(content_type: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        h
    }

    #[tokio::test]
    async fn test_json_object() {
        let body = Full::new(Bytes::from(r#"{"a":1,"b":"x"}"#));
        let map = parse_body(&headers("application/json; charset=utf-8"), body, 1024)
            .await
            .unwrap();
        assert_eq!(map.get("a"), Some(&Value::from(1)));
        assert_eq!(map.get("b"), Some(&Value::from("x")));
    }

    #[tokio::test]
    async fn test_form_body() {
        let body = Full::new(Bytes::from("name=Ada+Lovelace&tag=a&tag=b"));
        let map = parse_body(&headers("application/x-www-form-urlencoded"), body, 1024)
            .await
            .unwrap();
        assert_eq!(map.get("name"), Some(&Value::from("Ada Lovelace")));
        assert_eq!(map.get("tag"), Some(&serde_json::json!(["a", "b"])));
    }

    #[tokio::test]
    async fn test_body_over_limit() {
        let body = Full::new(Bytes::from(vec![b' '; 64]));
        let err = parse_body(&headers("application/json"), body, 16)
            .await
            .unwrap_err();
        assert!(matches!(err, BodyError::TooLarge));
    }

    #[tokio::test]
    async fn test_declared_length_over_limit() {
        let mut h = headers("application/x-www-form-urlencoded");
        h.insert(CONTENT_LENGTH, HeaderValue::from_static("100"));
        let err = parse_body(&h, Full::new(Bytes::from("a=1")), 16)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "request entity too large");
    }

    #[tokio::test]
    async fn test_other_bodies_are_not_bounded() {
        let mut h = headers("application/octet-stream");
        h.insert(CONTENT_LENGTH, HeaderValue::from_static("64"));
        let map = parse_body(&h, Full::new(Bytes::from(vec![0u8; 64])), 16)
            .await
            .unwrap();
        assert!(map.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let body = Full::new(Bytes::from("{not json"));
        let err = parse_body(&headers("application/json"), body, 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, BodyError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_unknown_content_type_is_empty() {
        let body = Full::new(Bytes::from("plain words"));
        let map = parse_body(&headers("text/plain"), body, 1024).await.unwrap();
        assert!(map.is_empty());
    }
}
