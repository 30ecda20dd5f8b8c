//! Document store capability
//!
//! The proxy talks to the database only through [`DocumentStore`] and the
//! [`StoreConnection`] it hands out. One connection serves one request.

pub mod convert;
mod identifier;
mod mongo;

#[cfg(test)]
pub mod memory;

use mongodb::bson::{Bson, Document};
use serde::Serialize;

pub use identifier::DocumentId;
pub use mongo::MongoStore;

/// Errors raised by a store or one of its connections
///
/// `Display` is the bare error text; handlers prepend their own prefix.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    Connection(String),

    #[error("{0}")]
    Operation(String),

    /// Update payload that is not an operator document
    #[error("{0}")]
    InvalidUpdate(String),
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Operation(err.to_string())
    }
}

/// Acknowledgment of a single-document insert
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertAck {
    pub acknowledged: bool,
    pub inserted_id: Bson,
}

/// Acknowledgment of a single-document delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAck {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

/// Acknowledgment of a single-document update
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAck {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_count: u64,
    pub upserted_id: Option<Bson>,
}

/// Mutation applied by `update_one`, forwarded to the store unvalidated
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Operator document such as `{ $set: {...} }`
    Operators(Document),
    /// Aggregation pipeline stages
    Pipeline(Vec<Document>),
}

/// Opens connections to a document store
#[allow(async_fn_in_trait)]
pub trait DocumentStore {
    type Connection: StoreConnection;

    async fn connect(&self) -> Result<Self::Connection, StoreError>;
}

/// A live connection, scoped to a single request
///
/// Collections are addressed by name on every call and are never checked
/// for existence first.
#[allow(async_fn_in_trait)]
pub trait StoreConnection {
    /// Descriptors (`{name, type, options, ...}`) of every collection
    async fn list_collections(&self) -> Result<Vec<Document>, StoreError>;

    async fn find(&self, collection: &str, filter: Document) -> Result<Vec<Document>, StoreError>;

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
    ) -> Result<Option<Document>, StoreError>;

    async fn insert_one(&self, collection: &str, doc: Document) -> Result<InsertAck, StoreError>;

    async fn delete_one(&self, collection: &str, filter: Document)
        -> Result<DeleteAck, StoreError>;

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Update,
    ) -> Result<UpdateAck, StoreError>;

    /// Release the connection; called exactly once per `connect`
    async fn close(self);
}
