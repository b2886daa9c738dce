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

//! Section controllers behind the portfolio editing dialogs.
//!
//! Every operation validates its input before touching the network, reports
//! exactly one alert per outcome and holds its [`LoadingFlag`] only while
//! requests are in flight.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{self as json, Value};
use tokio::sync::watch;
use tracing::error;
use url::Url;

use crate::alert::AlertChannel;
use crate::model::Record;
use crate::runtime::tokio;
use crate::services::blob::BlobStore;
use crate::services::store::{Data, ProfileStore, Query, Subscription};
use crate::services::types::DocRef;
use crate::{Error, Result};

mod achievements;
mod auth;
mod directory;
mod gallery;
mod information;
mod projects;

pub use achievements::{AchievementForm, Achievements};
pub use auth::{Auth, SignUpForm};
pub use directory::Directory;
pub use gallery::{Gallery, MAX_GALLERY_IMAGES};
pub use information::{Information, InformationForm};
pub use projects::{ProjectForm, Projects};

pub const USER_REF_NOT_FOUND: &str = "User reference not found";

/// Reference from a section record to its owner's profile.
pub(crate) const OWNER_FIELD: &str = "usID";
const LIST_FAILED: &str = "Something went wrong.";

/// Number of operations in flight for one controller.
#[derive(Debug, Clone)]
pub struct LoadingFlag(Arc<watch::Sender<usize>>);

impl Default for LoadingFlag {
    fn default() -> Self {
        Self(Arc::new(watch::channel(0).0))
    }
}

impl LoadingFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loading(&self) -> bool {
        *self.0.borrow() > 0
    }

    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.0.subscribe()
    }

    /// Raises the flag until the returned guard is dropped.
    pub fn hold(&self) -> LoadingGuard {
        self.0.send_modify(|count| *count += 1);
        LoadingGuard(self.0.clone())
    }
}

#[must_use = "the flag drops as soon as the guard does"]
#[derive(Debug)]
pub struct LoadingGuard(Arc<watch::Sender<usize>>);

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.0.send_modify(|count| *count = count.saturating_sub(1));
    }
}

/// Services shared by the section controllers.
pub struct Sections<S, B> {
    store: Arc<S>,
    blobs: Arc<B>,
    alerts: AlertChannel,
}

impl<S, B> Clone for Sections<S, B> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            blobs: self.blobs.clone(),
            alerts: self.alerts.clone(),
        }
    }
}

impl<S: ProfileStore, B: BlobStore> Sections<S, B> {
    pub fn new(store: Arc<S>, blobs: Arc<B>, alerts: AlertChannel) -> Self {
        Self {
            store,
            blobs,
            alerts,
        }
    }

    pub fn projects(&self) -> Projects<S, B> {
        Projects::new(self.clone())
    }

    pub fn achievements(&self) -> Achievements<S, B> {
        Achievements::new(self.clone())
    }

    pub fn gallery(&self) -> Gallery<S, B> {
        Gallery::new(self.clone())
    }

    pub fn information(&self) -> Information<S, B> {
        Information::new(self.clone())
    }

    pub fn directory(&self) -> Directory<S> {
        Directory::new(self.store.clone(), self.alerts.clone())
    }

    pub fn alerts(&self) -> &AlertChannel {
        &self.alerts
    }

    /// Uploads under `users/{uid}/{folder}/{millis}_{name}`.
    async fn upload(
        &self,
        owner: &DocRef,
        folder: &str,
        upload: &crate::services::blob::Upload,
    ) -> Result<Url> {
        let path = blob_path(owner, folder, &upload.name);
        self.blobs.upload(&path, upload).await
    }

    /// Removes a blob; failures are logged and otherwise ignored.
    async fn discard(&self, url: &str) {
        let result = match Url::parse(url) {
            Ok(url) => self.blobs.delete(&url).await,
            Err(error) => Err(error.into()),
        };

        if let Err(error) = result {
            error!(%url, %error, "blob delete failed");
        }
    }
}

/// True when `value` parses as an absolute URL.
pub fn is_url(value: &str) -> bool {
    Url::parse(value).is_ok()
}

pub(crate) fn blob_path(owner: &DocRef, folder: &str, name: &str) -> String {
    format!(
        "users/{}/{folder}/{}_{name}",
        owner.id,
        chrono::Utc::now().timestamp_millis()
    )
}

pub(crate) fn to_data(value: &impl Serialize) -> Result<Data> {
    match json::to_value(value)? {
        Value::Object(data) => Ok(data),
        _ => Err(Error::Other("Expected a JSON object")),
    }
}

/// Live records matching `query`; every failure is also raised as an alert.
pub(crate) fn live_list<S, R>(store: &S, alerts: &AlertChannel, query: &Query) -> Subscription<Vec<R>>
where
    S: ProfileStore,
    R: Record + Send + 'static,
{
    let alerts = alerts.clone();
    let collection = query.collection.clone();

    store
        .watch_query(query)
        .map(|documents| documents.iter().map(R::from_document).collect())
        .inspect_err(move |error| {
            error!(%collection, %error, "list subscription failed");

            let message = match error.user_message() {
                message if message.is_empty() => LIST_FAILED.to_owned(),
                message => message,
            };
            alerts.danger(message);
        })
}

#[cfg(test)]
pub(crate) mod testing {
    use std::time::Duration;

    use super::*;
    use crate::alert::{Alert, AlertKind};
    use crate::services::blob::MemoryBlobs;
    use crate::services::store::MemoryStore;

    pub fn sections() -> (Arc<MemoryStore>, Arc<MemoryBlobs>, Sections<MemoryStore, MemoryBlobs>) {
        let store = Arc::new(MemoryStore::new());
        let blobs = Arc::new(MemoryBlobs::new());
        let alerts = AlertChannel::new(Duration::from_secs(60));

        let sections = Sections::new(store.clone(), blobs.clone(), alerts);
        (store, blobs, sections)
    }

    /// The single alert raised so far.
    pub fn only_alert(alerts: &AlertChannel) -> (AlertKind, String) {
        match alerts.alerts().as_slice() {
            [Alert { kind, message, .. }] => (*kind, message.clone()),
            other => panic!("exactly one alert expected, got {other:?}"),
        }
    }
}
