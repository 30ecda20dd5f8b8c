//! `MongoDB` adapter for the store capability

use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::options::{ClientOptions, UpdateModifications};
use mongodb::{Client, Database};

use super::{
    DeleteAck, DocumentStore, InsertAck, StoreConnection, StoreError, Update, UpdateAck,
};
use crate::config::DatabaseConfig;

/// Store that opens a fresh client for every connection
pub struct MongoStore {
    connection_string: String,
    db_name: String,
}

impl MongoStore {
    pub fn new(config: &DatabaseConfig) -> Self {
        Self {
            connection_string: config.connection_string.clone(),
            db_name: config.name.clone(),
        }
    }
}

impl DocumentStore for MongoStore {
    type Connection = MongoConnection;

    async fn connect(&self) -> Result<MongoConnection, StoreError> {
        let options = ClientOptions::parse(&self.connection_string)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        let client =
            Client::with_options(options).map_err(|e| StoreError::Connection(e.to_string()))?;

        // The driver connects lazily; ping so an unreachable server fails here
        let db = client.database(&self.db_name);
        let ping = db.run_command(doc! { "ping": 1 }).await;
        if let Err(e) = ping {
            drop(db);
            client.shutdown().await;
            return Err(StoreError::Connection(e.to_string()));
        }

        Ok(MongoConnection { client, db })
    }
}

/// One client, used for exactly one request
pub struct MongoConnection {
    client: Client,
    db: Database,
}

impl StoreConnection for MongoConnection {
    async fn list_collections(&self) -> Result<Vec<Document>, StoreError> {
        let cursor = self.db.list_collections().await?;
        Ok(cursor.with_type::<Document>().try_collect().await?)
    }

    async fn find(&self, collection: &str, filter: Document) -> Result<Vec<Document>, StoreError> {
        let cursor = self
            .db
            .collection::<Document>(collection)
            .find(filter)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
    ) -> Result<Option<Document>, StoreError> {
        Ok(self
            .db
            .collection::<Document>(collection)
            .find_one(filter)
            .await?)
    }

    async fn insert_one(&self, collection: &str, doc: Document) -> Result<InsertAck, StoreError> {
        let result = self
            .db
            .collection::<Document>(collection)
            .insert_one(doc)
            .await?;
        Ok(InsertAck {
            acknowledged: true,
            inserted_id: result.inserted_id,
        })
    }

    async fn delete_one(
        &self,
        collection: &str,
        filter: Document,
    ) -> Result<DeleteAck, StoreError> {
        let result = self
            .db
            .collection::<Document>(collection)
            .delete_one(filter)
            .await?;
        Ok(DeleteAck {
            acknowledged: true,
            deleted_count: result.deleted_count,
        })
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Update,
    ) -> Result<UpdateAck, StoreError> {
        let update = match update {
            Update::Operators(doc) => UpdateModifications::Document(doc),
            Update::Pipeline(stages) => UpdateModifications::Pipeline(stages),
        };
        let result = self
            .db
            .collection::<Document>(collection)
            .update_one(filter, update)
            .await?;
        let upserted_count = u64::from(result.upserted_id.is_some());
        Ok(UpdateAck {
            acknowledged: true,
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_count,
            upserted_id: result.upserted_id,
        })
    }

    async fn close(self) {
        let Self { client, db } = self;
        drop(db);
        client.shutdown().await;
    }
}
