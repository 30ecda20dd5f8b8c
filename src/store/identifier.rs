//! Document identifier normalization

use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, Bson, Document};
use std::fmt;

/// Identifier taken from a URL path segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentId {
    /// 24 hex characters, converted to the store's native id
    Object(ObjectId),
    /// Anything else, used as a literal string key
    Raw(String),
}

impl DocumentId {
    /// Normalize a path segment: native id when it is 24 hex digits,
    /// the untouched string otherwise
    pub fn parse(raw: &str) -> Self {
        if raw.len() == 24 && raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            if let Ok(oid) = ObjectId::parse_str(raw) {
                return Self::Object(oid);
            }
        }
        Self::Raw(raw.to_string())
    }

    /// `{ _id: <id> }`
    pub fn filter(&self) -> Document {
        doc! { "_id": Bson::from(self) }
    }
}

impl From<&DocumentId> for Bson {
    fn from(id: &DocumentId) -> Self {
        match id {
            DocumentId::Object(oid) => Self::ObjectId(*oid),
            DocumentId::Raw(s) => Self::String(s.clone()),
        }
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object(oid) => write!(f, "{}", oid.to_hex()),
            Self::Raw(s) => f.write_str(s),
        }
    }
}
