//! Per-request connection scope
//!
//! A connection is opened, used for one operation and closed on every exit
//! path, including when the operation panics.

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;

use crate::store::{DocumentStore, StoreConnection, StoreError};

/// Run `op` against a fresh connection from `store`
///
/// `close()` runs before this returns whether `op` succeeds, fails or panics;
/// a panic is resumed once the connection is released.
pub async fn with_connection<S, T, F>(store: &S, op: F) -> Result<T, StoreError>
where
    S: DocumentStore,
    F: for<'c> FnOnce(&'c S::Connection) -> LocalBoxFuture<'c, Result<T, StoreError>>,
{
    let conn = store.connect().await?;
    let outcome = AssertUnwindSafe(op(&conn)).catch_unwind().await;
    conn.close().await;
    match outcome {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use mongodb::bson::doc;

    #[tokio::test]
    async fn test_closes_after_success() {
        let store = MemoryStore::new();
        let found = with_connection(&store, |conn| {
            async move { conn.find_one("people", doc! {"_id": "x"}).await }.boxed_local()
        })
        .await
        .unwrap();
        assert!(found.is_none());
        assert_eq!((store.connects(), store.closes()), (1, 1));
    }

    #[tokio::test]
    async fn test_closes_after_error() {
        let store = MemoryStore::new();
        store.fail_operations(true);
        let err = with_connection(&store, |conn| {
            async move { conn.find("people", doc! {}).await }.boxed_local()
        })
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "MongoServerError: boom");
        assert_eq!((store.connects(), store.closes()), (1, 1));
    }

    #[tokio::test]
    async fn test_closes_after_panic() {
        let store = MemoryStore::new();
        store.panic_operations(true);
        let outcome = AssertUnwindSafe(with_connection(&store, |conn| {
            async move { conn.list_collections().await }.boxed_local()
        }))
        .catch_unwind()
        .await;
        assert!(outcome.is_err());
        assert_eq!((store.connects(), store.closes()), (1, 1));
    }

    #[tokio::test]
    async fn test_failed_connect_has_nothing_to_close() {
        let store = MemoryStore::new();
        store.fail_connect(true);
        let err = with_connection(&store, |conn| {
            async move { conn.list_collections().await }.boxed_local()
        })
        .await
        .unwrap_err();
        assert!(matches!(err, StoreError::Connection(_)));
        assert_eq!((store.connects(), store.closes()), (0, 0));
    }
}
