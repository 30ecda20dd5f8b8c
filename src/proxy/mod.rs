//! Collection proxy service
//!
//! Turns one resolved [`Route`] into exactly one store operation and the
//! store's answer into an HTTP response. Every operation gets its own
//! connection (see [`lifecycle::with_connection`]).

pub mod body;
pub mod lifecycle;
pub mod query;
mod routes;

use futures::FutureExt;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use mongodb::bson::{doc, Document};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::http;
use crate::logger;
use crate::store::convert::{bson_to_json, document_to_json, json_to_document};
use crate::store::{DocumentStore, StoreConnection, StoreError, Update};
use lifecycle::with_connection;

pub use routes::Route;

/// Inputs of one API call
pub struct ProxyRequest {
    pub route: Route,
    /// Decoded query string, values untouched
    pub query: Map<String, Value>,
    /// Parsed JSON or form body
    pub body: Map<String, Value>,
}

/// Execute the store operation for `request` and build the response
pub async fn execute<S: DocumentStore>(store: &S, request: ProxyRequest) -> Response<Full<Bytes>> {
    let ProxyRequest { route, query, body } = request;
    let prefix = route.error_prefix();

    let result = match route {
        Route::ListCollections => list_collections(store).await,
        Route::Find { collection } => find(store, collection, query).await,
        Route::FindById { collection, id } => find_by_id(store, collection, id.filter()).await,
        Route::Insert { collection } => insert(store, collection, body).await,
        Route::Delete { collection, id } => delete(store, collection, id.filter()).await,
        Route::Update { collection, id } => {
            let update = update_action(body).ok_or_else(|| {
                StoreError::InvalidUpdate("Update document requires atomic operators".to_string())
            });
            update_one(store, collection, id.filter(), update).await
        }
        Route::Patch { collection, id } => {
            let update = action(body)
                .and_then(json_to_document)
                .map(|fields| Update::Operators(doc! { "$set": fields }))
                .ok_or_else(|| {
                    StoreError::InvalidUpdate("$set requires a document of fields".to_string())
                });
            update_one(store, collection, id.filter(), update).await
        }
    };

    match result {
        Ok(value) => http::build_json_response(StatusCode::OK, &value),
        Err(e) => {
            logger::log_error(&format!("{prefix}{e}"));
            http::build_text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("{prefix}{e}"),
            )
        }
    }
}

fn action(mut body: Map<String, Value>) -> Option<Value> {
    body.remove("action")
}

/// `action` of a PUT: an operator object, or an array of pipeline stages
fn update_action(body: Map<String, Value>) -> Option<Update> {
    match action(body)? {
        Value::Array(stages) => stages
            .into_iter()
            .map(json_to_document)
            .collect::<Option<Vec<_>>>()
            .map(Update::Pipeline),
        other => json_to_document(other).map(Update::Operators),
    }
}

fn documents_json(docs: Vec<Document>) -> Value {
    Value::Array(docs.into_iter().map(document_to_json).collect())
}

fn ack_json<T: Serialize>(ack: &T) -> Result<Value, StoreError> {
    mongodb::bson::to_bson(ack)
        .map(bson_to_json)
        .map_err(|e| StoreError::Operation(e.to_string()))
}

async fn list_collections<S: DocumentStore>(store: &S) -> Result<Value, StoreError> {
    let docs = with_connection(store, |conn| {
        async move { conn.list_collections().await }.boxed_local()
    })
    .await?;
    Ok(documents_json(docs))
}

async fn find<S: DocumentStore>(
    store: &S,
    collection: String,
    query: Map<String, Value>,
) -> Result<Value, StoreError> {
    let filter = json_to_document(Value::Object(query)).unwrap_or_default();
    let docs = with_connection(store, move |conn| {
        async move { conn.find(&collection, filter).await }.boxed_local()
    })
    .await?;
    Ok(documents_json(docs))
}

async fn find_by_id<S: DocumentStore>(
    store: &S,
    collection: String,
    filter: Document,
) -> Result<Value, StoreError> {
    let found = with_connection(store, move |conn| {
        async move { conn.find_one(&collection, filter).await }.boxed_local()
    })
    .await?;
    Ok(found.map_or(Value::Null, document_to_json))
}

async fn insert<S: DocumentStore>(
    store: &S,
    collection: String,
    body: Map<String, Value>,
) -> Result<Value, StoreError> {
    let doc = json_to_document(Value::Object(body)).unwrap_or_default();
    let ack = with_connection(store, move |conn| {
        async move { conn.insert_one(&collection, doc).await }.boxed_local()
    })
    .await?;
    ack_json(&ack)
}

async fn delete<S: DocumentStore>(
    store: &S,
    collection: String,
    filter: Document,
) -> Result<Value, StoreError> {
    let ack = with_connection(store, move |conn| {
        async move { conn.delete_one(&collection, filter).await }.boxed_local()
    })
    .await?;
    ack_json(&ack)
}

/// An invalid `update` still costs a connection: the store is the one that
/// rejects it, exactly like a malformed operator document
async fn update_one<S: DocumentStore>(
    store: &S,
    collection: String,
    filter: Document,
    update: Result<Update, StoreError>,
) -> Result<Value, StoreError> {
    let ack = with_connection(store, move |conn| {
        async move { conn.update_one(&collection, filter, update?).await }.boxed_local()
    })
    .await?;
    ack_json(&ack)
}
