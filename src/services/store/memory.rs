//
// Copyright © 2025 Hardcore Engineering Inc.
//
// Licensed under the Eclipse Public License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License. You may
// obtain a copy of the License at https://www.eclipse.org/legal/epl-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//
// See the License for the specific language governing permissions and
// limitations under the License.
//

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, watch};
use tracing::trace;

use super::ProfileStore;
use super::document::{Data, Document, DocumentSnapshot, Query, resolve_server_timestamps};
use super::subscription::Subscription;
use crate::runtime::tokio;
use crate::services::Status;
use crate::services::types::{DocId, DocRef};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    Query,
    Create,
    Set,
    Update,
    Delete,
}

enum Listener {
    Document {
        doc: DocRef,
        sink: mpsc::UnboundedSender<Result<DocumentSnapshot>>,
    },
    Query {
        query: Query,
        sink: mpsc::UnboundedSender<Result<Vec<Document>>>,
    },
}

type Collections = HashMap<String, BTreeMap<DocId, Data>>;

#[derive(Default)]
struct State {
    collections: Collections,
    listeners: HashMap<u64, Listener>,
    next_listener: u64,
    opened: usize,
    cancelled: usize,
    calls: usize,
    failures: HashMap<Operation, String>,
}

fn snapshot(collections: &Collections, doc: &DocRef) -> DocumentSnapshot {
    DocumentSnapshot {
        id: doc.id.clone(),
        data: collections
            .get(&doc.collection)
            .and_then(|documents| documents.get(&doc.id))
            .cloned(),
    }
}

fn results(collections: &Collections, query: &Query) -> Vec<Document> {
    let documents = collections
        .get(&query.collection)
        .into_iter()
        .flat_map(|documents| documents.iter())
        .map(|(id, data)| Document::new(id.clone(), data.clone()));

    query.apply(documents)
}

impl State {
    fn call(&mut self, operation: Operation) -> Result<()> {
        self.calls += 1;

        match self.failures.remove(&operation) {
            Some(message) => Err(Error::ServiceError(Status::new("unavailable", message))),
            None => Ok(()),
        }
    }

    fn notify(&mut self, collection: &str) {
        let State {
            collections,
            listeners,
            ..
        } = self;

        listeners.retain(|_, listener| match listener {
            Listener::Document { doc, sink } if doc.collection == collection => {
                sink.send(Ok(snapshot(collections, doc))).is_ok()
            }
            Listener::Query { query, sink } if query.collection == collection => {
                sink.send(Ok(results(collections, query))).is_ok()
            }
            _ => true,
        });
    }

    fn write(&mut self, doc: &DocRef, mut data: Data) {
        resolve_server_timestamps(&mut data, chrono::Utc::now());

        self.collections
            .entry(doc.collection.clone())
            .or_default()
            .insert(doc.id.clone(), data);

        self.notify(&doc.collection);
    }
}

/// In-process document store with live listeners.
///
/// Every listener receives the current state as soon as it is opened and a
/// fresh state after each write to its collection.
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    gate: Arc<watch::Sender<bool>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::default(),
            gate: Arc::new(watch::channel(false).0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Writes `data` as-is, without counting a call or consuming failures.
    pub fn insert(&self, doc: &DocRef, data: Data) {
        self.lock().write(doc, data);
    }

    pub fn document(&self, doc: &DocRef) -> Option<Data> {
        snapshot(&self.lock().collections, doc).data
    }

    pub fn len(&self, collection: &str) -> usize {
        self.lock()
            .collections
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    /// The next `operation` fails with `message`.
    pub fn fail_next(&self, operation: Operation, message: impl Into<String>) {
        self.lock().failures.insert(operation, message.into());
    }

    /// Pushes an error to every listener of `doc`; the listeners stay open.
    pub fn fail_watchers(&self, doc: &DocRef, message: &str) {
        for listener in self.lock().listeners.values() {
            match listener {
                Listener::Document { doc: target, sink } if target == doc => {
                    let _ = sink.send(Err(Error::ServiceError(Status::new(
                        "unavailable",
                        message,
                    ))));
                }
                _ => {}
            }
        }
    }

    /// Queries block until [`MemoryStore::resume_queries`] is called.
    pub fn pause_queries(&self) {
        self.gate.send_replace(true);
    }

    pub fn resume_queries(&self) {
        self.gate.send_replace(false);
    }

    /// Number of one-shot operations and listens performed so far.
    pub fn calls(&self) -> usize {
        self.lock().calls
    }

    pub fn opened_watchers(&self) -> usize {
        self.lock().opened
    }

    pub fn active_watchers(&self) -> usize {
        self.lock().listeners.len()
    }

    pub fn cancelled_watchers(&self) -> usize {
        self.lock().cancelled
    }

    fn listen(&self, listener: Listener) -> u64 {
        let mut state = self.lock();
        state.calls += 1;
        state.opened += 1;

        let id = state.next_listener;
        state.next_listener += 1;

        match &listener {
            Listener::Document { doc, sink } => {
                trace!(%doc, id, "listen document");
                let _ = sink.send(Ok(snapshot(&state.collections, doc)));
            }
            Listener::Query { query, sink } => {
                trace!(collection = %query.collection, id, "listen query");
                let _ = sink.send(Ok(results(&state.collections, query)));
            }
        }

        state.listeners.insert(id, listener);

        id
    }

    fn unlisten(&self, id: u64) -> impl FnOnce() + Send + 'static {
        let state = Arc::downgrade(&self.state);

        move || {
            if let Some(state) = state.upgrade() {
                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                state.listeners.remove(&id);
                state.cancelled += 1;
                trace!(id, "unlisten");
            }
        }
    }
}

impl ProfileStore for MemoryStore {
    async fn get(&self, doc: &DocRef) -> Result<Option<Document>> {
        let mut state = self.lock();
        state.call(Operation::Get)?;

        Ok(snapshot(&state.collections, doc).into_document())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        let mut gate = self.gate.subscribe();
        let _ = gate.wait_for(|paused| !*paused).await;

        let mut state = self.lock();
        state.call(Operation::Query)?;

        Ok(results(&state.collections, query))
    }

    fn watch_document(&self, doc: &DocRef) -> Subscription<DocumentSnapshot> {
        let (sink, rx) = mpsc::unbounded_channel();

        let id = self.listen(Listener::Document {
            doc: doc.clone(),
            sink,
        });

        Subscription::from_receiver(rx, self.unlisten(id))
    }

    fn watch_query(&self, query: &Query) -> Subscription<Vec<Document>> {
        let (sink, rx) = mpsc::unbounded_channel();

        let id = self.listen(Listener::Query {
            query: query.clone(),
            sink,
        });

        Subscription::from_receiver(rx, self.unlisten(id))
    }

    async fn create(&self, collection: &str, data: Data) -> Result<DocId> {
        let mut state = self.lock();
        state.call(Operation::Create)?;

        let id = uuid::Uuid::new_v4().simple().to_string();
        state.write(&DocRef::new(collection, id.clone()), data);

        Ok(id)
    }

    async fn set(&self, doc: &DocRef, data: Data) -> Result<()> {
        let mut state = self.lock();
        state.call(Operation::Set)?;
        state.write(doc, data);

        Ok(())
    }

    async fn update(&self, doc: &DocRef, data: Data) -> Result<()> {
        let mut state = self.lock();
        state.call(Operation::Update)?;

        let Some(mut current) = snapshot(&state.collections, doc).data else {
            return Err(Error::NotFound(doc.to_string()));
        };

        current.extend(data);
        state.write(doc, current);

        Ok(())
    }

    async fn delete(&self, doc: &DocRef) -> Result<()> {
        let mut state = self.lock();
        state.call(Operation::Delete)?;

        if let Some(documents) = state.collections.get_mut(&doc.collection) {
            documents.remove(&doc.id);
        }
        state.notify(&doc.collection);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::document::{Direction, server_timestamp};
    use futures::StreamExt;
    use serde_json::{Value, json};

    fn data(value: Value) -> Data {
        match value {
            Value::Object(data) => data,
            _ => panic!("object expected"),
        }
    }

    #[tokio::test]
    async fn document_watch_sees_current_state_then_writes() {
        let store = MemoryStore::new();
        let user = DocRef::user("U1");

        let mut watch = store.watch_document(&user);
        assert!(!watch.next().await.unwrap().unwrap().exists());

        store
            .set(&user, data(json!({"name": "Bob"})))
            .await
            .unwrap();
        let snapshot = watch.next().await.unwrap().unwrap();
        assert_eq!(snapshot.data.unwrap()["name"], json!("Bob"));

        store
            .update(&user, data(json!({"status": "Inactive"})))
            .await
            .unwrap();
        let snapshot = watch.next().await.unwrap().unwrap().data.unwrap();
        assert_eq!(snapshot["name"], json!("Bob"));
        assert_eq!(snapshot["status"], json!("Inactive"));

        store.delete(&user).await.unwrap();
        assert!(!watch.next().await.unwrap().unwrap().exists());
    }

    #[tokio::test]
    async fn cancelling_removes_listener_once() {
        let store = MemoryStore::new();
        let watch = store.watch_document(&DocRef::user("U1"));
        assert_eq!(store.active_watchers(), 1);

        watch.cancel();
        watch.cancel();
        drop(watch);

        assert_eq!(store.active_watchers(), 0);
        assert_eq!(store.cancelled_watchers(), 1);
    }

    #[tokio::test]
    async fn query_watch_follows_collection() {
        let store = MemoryStore::new();
        let query = Query::new("projects")
            .where_eq("owner", "users/U1")
            .order_by("title", Direction::Asc);

        let mut watch = store.watch_query(&query);
        assert!(watch.next().await.unwrap().unwrap().is_empty());

        store
            .create("projects", data(json!({"owner": "users/U1", "title": "b"})))
            .await
            .unwrap();
        store
            .create("projects", data(json!({"owner": "users/U2", "title": "a"})))
            .await
            .unwrap();
        store
            .create("projects", data(json!({"owner": "users/U1", "title": "a"})))
            .await
            .unwrap();

        let mut last = Vec::new();
        for _ in 0..3 {
            last = watch.next().await.unwrap().unwrap();
        }

        let titles = last
            .iter()
            .map(|document| document.get("title").unwrap().as_str().unwrap().to_owned())
            .collect::<Vec<_>>();
        assert_eq!(titles, ["a", "b"]);
    }

    #[tokio::test]
    async fn injected_failure_applies_once() {
        let store = MemoryStore::new();
        store.fail_next(Operation::Create, "quota exceeded");

        let error = store.create("projects", Data::new()).await.unwrap_err();
        assert!(error.to_string().contains("quota exceeded"));

        store.create("projects", Data::new()).await.unwrap();
        assert_eq!(store.len("projects"), 1);
        assert_eq!(store.calls(), 2);
    }

    #[tokio::test]
    async fn server_timestamps_are_filled_on_write() {
        let store = MemoryStore::new();
        let user = DocRef::user("U1");

        store
            .set(&user, data(json!({"createdAt": server_timestamp()})))
            .await
            .unwrap();

        assert!(store.document(&user).unwrap()["createdAt"].is_i64());
    }

    #[tokio::test]
    async fn update_of_missing_document_fails() {
        let store = MemoryStore::new();
        let error = store
            .update(&DocRef::user("nobody"), Data::new())
            .await
            .unwrap_err();

        assert!(matches!(error, Error::NotFound(_)));
    }
}
