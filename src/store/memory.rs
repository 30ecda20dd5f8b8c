//! In-memory store used by the test suites
//!
//! Counts connects and closes so lifecycle guarantees can be asserted, and
//! can be switched into failing or panicking modes.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, Bson, Document};

use super::{
    DeleteAck, DocumentStore, InsertAck, StoreConnection, StoreError, Update, UpdateAck,
};

#[derive(Default)]
struct Inner {
    collections: RefCell<BTreeMap<String, Vec<Document>>>,
    connects: Cell<usize>,
    closes: Cell<usize>,
    fail_connect: Cell<bool>,
    fail_operations: Cell<bool>,
    panic_operations: Cell<bool>,
    delay: Cell<Duration>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Rc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connects(&self) -> usize {
        self.inner.connects.get()
    }

    pub fn closes(&self) -> usize {
        self.inner.closes.get()
    }

    pub fn fail_connect(&self, on: bool) {
        self.inner.fail_connect.set(on);
    }

    pub fn fail_operations(&self, on: bool) {
        self.inner.fail_operations.set(on);
    }

    pub fn panic_operations(&self, on: bool) {
        self.inner.panic_operations.set(on);
    }

    /// Make `find` take this long, like a slow or hung server
    pub fn delay_operations(&self, delay: Duration) {
        self.inner.delay.set(delay);
    }

    pub fn seed(&self, collection: &str, docs: Vec<Document>) {
        self.inner
            .collections
            .borrow_mut()
            .entry(collection.to_string())
            .or_default()
            .extend(docs);
    }
}

impl DocumentStore for MemoryStore {
    type Connection = MemoryConnection;

    async fn connect(&self) -> Result<MemoryConnection, StoreError> {
        tokio::task::yield_now().await;
        if self.inner.fail_connect.get() {
            return Err(StoreError::Connection(
                "connect ECONNREFUSED 127.0.0.1:27017".to_string(),
            ));
        }
        self.inner.connects.set(self.inner.connects.get() + 1);
        Ok(MemoryConnection {
            inner: Rc::clone(&self.inner),
        })
    }
}

pub struct MemoryConnection {
    inner: Rc<Inner>,
}

impl MemoryConnection {
    fn check(&self) -> Result<(), StoreError> {
        assert!(
            !self.inner.panic_operations.get(),
            "store operation panicked"
        );
        if self.inner.fail_operations.get() {
            return Err(StoreError::Operation("MongoServerError: boom".to_string()));
        }
        Ok(())
    }
}

fn matches(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(k, v)| doc.get(k) == Some(v))
}

impl StoreConnection for MemoryConnection {
    async fn list_collections(&self) -> Result<Vec<Document>, StoreError> {
        self.check()?;
        Ok(self
            .inner
            .collections
            .borrow()
            .keys()
            .map(|name| doc! { "name": name.as_str(), "type": "collection" })
            .collect())
    }

    async fn find(&self, collection: &str, filter: Document) -> Result<Vec<Document>, StoreError> {
        self.check()?;
        let delay = self.inner.delay.get();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .inner
            .collections
            .borrow()
            .get(collection)
            .map(|docs| docs.iter().filter(|d| matches(d, &filter)).cloned().collect())
            .unwrap_or_default())
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
    ) -> Result<Option<Document>, StoreError> {
        self.check()?;
        Ok(self
            .inner
            .collections
            .borrow()
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| matches(d, &filter)).cloned()))
    }

    async fn insert_one(
        &self,
        collection: &str,
        mut doc: Document,
    ) -> Result<InsertAck, StoreError> {
        self.check()?;
        // Let concurrent requests interleave here
        tokio::task::yield_now().await;
        if !doc.contains_key("_id") {
            doc.insert("_id", ObjectId::new());
        }
        let inserted_id = doc.get("_id").cloned().unwrap_or(Bson::Null);
        self.inner
            .collections
            .borrow_mut()
            .entry(collection.to_string())
            .or_default()
            .push(doc);
        Ok(InsertAck {
            acknowledged: true,
            inserted_id,
        })
    }

    async fn delete_one(
        &self,
        collection: &str,
        filter: Document,
    ) -> Result<DeleteAck, StoreError> {
        self.check()?;
        let mut collections = self.inner.collections.borrow_mut();
        let deleted_count = collections
            .get_mut(collection)
            .and_then(|docs| {
                let pos = docs.iter().position(|d| matches(d, &filter))?;
                docs.remove(pos);
                Some(1)
            })
            .unwrap_or(0);
        Ok(DeleteAck {
            acknowledged: true,
            deleted_count,
        })
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Update,
    ) -> Result<UpdateAck, StoreError> {
        self.check()?;
        let stages = match update {
            Update::Operators(doc) => vec![doc],
            Update::Pipeline(stages) => stages,
        };
        let operators_only = stages
            .iter()
            .all(|stage| !stage.is_empty() && stage.keys().all(|k| k.starts_with('$')));
        if stages.is_empty() || !operators_only {
            return Err(StoreError::InvalidUpdate(
                "Update document requires atomic operators".to_string(),
            ));
        }
        let mut set = Document::new();
        for stage in stages {
            for (op, fields) in stage {
                match (op.as_str(), fields) {
                    ("$set", Bson::Document(fields)) => {
                        for (k, v) in fields {
                            set.insert(k, v);
                        }
                    }
                    _ => {
                        return Err(StoreError::Operation(format!(
                            "{op} is not supported in memory"
                        )))
                    }
                }
            }
        }

        let mut collections = self.inner.collections.borrow_mut();
        let target = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| matches(d, &filter)));
        let (matched_count, modified_count) = match target {
            Some(doc) => {
                let changed = set.iter().any(|(k, v)| doc.get(k) != Some(v));
                for (k, v) in set {
                    doc.insert(k, v);
                }
                (1, u64::from(changed))
            }
            None => (0, 0),
        };
        Ok(UpdateAck {
            acknowledged: true,
            matched_count,
            modified_count,
            upserted_count: 0,
            upserted_id: None,
        })
    }

    async fn close(self) {
        self.inner.closes.set(self.inner.closes.get() + 1);
    }
}
