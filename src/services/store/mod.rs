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

use serde_json::{self as json, Value};
use url::Url;

use crate::Result;
use crate::config::Config;
use crate::services::types::{Credentials, DocId, DocRef};

pub mod backend;
pub mod document;
pub mod memory;
pub mod subscription;

use backend::http::{HttpBackend, HttpClient};
use backend::ws::{LiveMethod, WsBackend, WsBackendOpts};
pub use document::{
    Data, Direction, Document, DocumentSnapshot, Query, is_server_timestamp, server_timestamp,
};
pub use memory::MemoryStore;
pub use subscription::Subscription;

/// Hosted document database holding profiles and their collections.
pub trait ProfileStore: Send + Sync + 'static {
    fn get(&self, doc: &DocRef) -> impl Future<Output = Result<Option<Document>>> + Send;

    fn query(&self, query: &Query) -> impl Future<Output = Result<Vec<Document>>> + Send;

    /// Current state first, then one snapshot per change.
    fn watch_document(&self, doc: &DocRef) -> Subscription<DocumentSnapshot>;

    /// Current results first, then the full result set after each change.
    fn watch_query(&self, query: &Query) -> Subscription<Vec<Document>>;

    fn create(&self, collection: &str, data: Data) -> impl Future<Output = Result<DocId>> + Send;

    fn set(&self, doc: &DocRef, data: Data) -> impl Future<Output = Result<()>> + Send;

    /// Merges `data` into an existing document; fails when it is absent.
    fn update(&self, doc: &DocRef, data: Data) -> impl Future<Output = Result<()>> + Send;

    fn delete(&self, doc: &DocRef) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Clone)]
pub struct StoreClient {
    http: HttpBackend,
    live: WsBackend,
}

impl StoreClient {
    pub(crate) async fn connect(
        config: &Config,
        http: HttpClient,
        credentials: Credentials,
    ) -> Result<Self> {
        let http = HttpBackend::new(
            http,
            config.store_service.clone(),
            credentials.clone(),
            config.api_key.clone(),
        );
        let live = WsBackend::connect(
            config.store_listen.clone(),
            credentials,
            WsBackendOpts::default(),
        )
        .await?;

        Ok(Self { http, live })
    }

    pub fn base(&self) -> &Url {
        self.http.base()
    }
}

impl ProfileStore for StoreClient {
    async fn get(&self, doc: &DocRef) -> Result<Option<Document>> {
        self.http.get(doc).await
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        self.http.query(query).await
    }

    fn watch_document(&self, doc: &DocRef) -> Subscription<DocumentSnapshot> {
        let id = doc.id.clone();

        self.live
            .listen(LiveMethod::ListenDocument, Value::String(doc.to_string()))
            .map(move |value| snapshot_frame(&id, value))
    }

    fn watch_query(&self, query: &Query) -> Subscription<Vec<Document>> {
        match json::to_value(query) {
            Ok(target) => self
                .live
                .listen(LiveMethod::ListenQuery, target)
                .map(crate::services::from_value),
            Err(error) => Subscription::failed(error.into()),
        }
    }

    async fn create(&self, collection: &str, data: Data) -> Result<DocId> {
        self.http.create(collection, &data).await
    }

    async fn set(&self, doc: &DocRef, data: Data) -> Result<()> {
        self.http.set(doc, &data).await
    }

    async fn update(&self, doc: &DocRef, data: Data) -> Result<()> {
        self.http.update(doc, &data).await
    }

    async fn delete(&self, doc: &DocRef) -> Result<()> {
        self.http.delete(doc).await
    }
}

/// A `null` frame means the document does not exist.
fn snapshot_frame(id: &DocId, value: Value) -> Result<DocumentSnapshot> {
    match value {
        Value::Null => Ok(DocumentSnapshot::missing(id.clone())),
        Value::Object(data) => Ok(DocumentSnapshot {
            id: id.clone(),
            data: Some(data),
        }),
        _ => Err(crate::Error::Other("Unexpected document snapshot")),
    }
}

impl<S: ProfileStore> ProfileStore for std::sync::Arc<S> {
    fn get(&self, doc: &DocRef) -> impl Future<Output = Result<Option<Document>>> + Send {
        (**self).get(doc)
    }

    fn query(&self, query: &Query) -> impl Future<Output = Result<Vec<Document>>> + Send {
        (**self).query(query)
    }

    fn watch_document(&self, doc: &DocRef) -> Subscription<DocumentSnapshot> {
        (**self).watch_document(doc)
    }

    fn watch_query(&self, query: &Query) -> Subscription<Vec<Document>> {
        (**self).watch_query(query)
    }

    fn create(&self, collection: &str, data: Data) -> impl Future<Output = Result<DocId>> + Send {
        (**self).create(collection, data)
    }

    fn set(&self, doc: &DocRef, data: Data) -> impl Future<Output = Result<()>> + Send {
        (**self).set(doc, data)
    }

    fn update(&self, doc: &DocRef, data: Data) -> impl Future<Output = Result<()>> + Send {
        (**self).update(doc, data)
    }

    fn delete(&self, doc: &DocRef) -> impl Future<Output = Result<()>> + Send {
        (**self).delete(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snapshot_frames_map_to_documents() {
        let id = DocId::from("U1");

        let missing = snapshot_frame(&id, Value::Null).unwrap();
        assert_eq!(missing.id, "U1");
        assert!(missing.data.is_none());

        let present = snapshot_frame(&id, json!({"username": "bob"})).unwrap();
        assert_eq!(present.data.unwrap()["username"], "bob");

        assert!(matches!(
            snapshot_frame(&id, json!(["users/U1"])),
            Err(crate::Error::Other(_))
        ));
    }
}
