//! Route table for the collection API
//!
//! Maps `(method, path)` below the API prefix onto one store operation.

use hyper::Method;
use percent_encoding::percent_decode_str;

use crate::store::DocumentId;

/// A resolved API route with its decoded path parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    ListCollections,
    Find { collection: String },
    FindById { collection: String, id: DocumentId },
    Insert { collection: String },
    Delete { collection: String, id: DocumentId },
    Update { collection: String, id: DocumentId },
    Patch { collection: String, id: DocumentId },
}

impl Route {
    /// Match a request against the route table
    ///
    /// `HEAD` resolves like `GET`. A single trailing slash is ignored and
    /// empty segments never match.
    pub fn resolve(method: &Method, path: &str, api_prefix: &str) -> Option<Self> {
        let rest = path.strip_prefix(api_prefix)?;
        let rest = rest.strip_suffix('/').unwrap_or(rest);
        let segments: Vec<&str> = rest.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return None;
        }

        let method = if *method == Method::HEAD {
            &Method::GET
        } else {
            method
        };

        let route = match (method, segments.as_slice()) {
            (&Method::GET, ["getCollections"]) => Self::ListCollections,
            (&Method::GET, [collection]) => Self::Find {
                collection: decode(collection),
            },
            (&Method::GET, [collection, id]) => Self::FindById {
                collection: decode(collection),
                id: DocumentId::parse(&decode(id)),
            },
            (&Method::POST, [collection]) => Self::Insert {
                collection: decode(collection),
            },
            (&Method::DELETE, [collection, id]) => Self::Delete {
                collection: decode(collection),
                id: DocumentId::parse(&decode(id)),
            },
            (&Method::PUT, [collection, id]) => Self::Update {
                collection: decode(collection),
                id: DocumentId::parse(&decode(id)),
            },
            (&Method::PATCH, [collection, id]) => Self::Patch {
                collection: decode(collection),
                id: DocumentId::parse(&decode(id)),
            },
            _ => return None,
        };
        Some(route)
    }

    /// Text placed before the store error in a 500 body
    pub const fn error_prefix(&self) -> &'static str {
        match self {
            Self::ListCollections => "Collections access error: ",
            Self::Find { .. } => "Errore esecuzione query: ",
            _ => "Error in query execution: ",
        }
    }
}

fn decode(segment: &str) -> String {
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}
