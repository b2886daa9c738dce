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

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use reqwest::{Method, header};
use reqwest_middleware::{ClientWithMiddleware as HttpClient, RequestBuilder};
use secrecy::ExposeSecret;
use url::Url;

use crate::services::types::Credentials;
use crate::services::{RequestBuilderExt, Status};
use crate::{Error, Result, config::Config};

/// File picked by the user, not yet uploaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Upload {
    pub name: String,
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

impl Upload {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

pub trait BlobStore: Send + Sync + 'static {
    /// Stores `upload` under `path` and returns its download URL.
    fn upload(&self, path: &str, upload: &Upload) -> impl Future<Output = Result<Url>> + Send;

    fn delete(&self, url: &Url) -> impl Future<Output = Result<()>> + Send;
}

pub struct BlobClient {
    http: HttpClient,
    base: Url,
    credentials: Credentials,
}

impl BlobClient {
    pub fn new(config: &Config, http: HttpClient, credentials: Credentials) -> Self {
        Self {
            http,
            base: config.blob_service.clone(),
            credentials,
        }
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.http.request(method, url);

        match self.credentials.current() {
            Some(credential) => request.bearer_auth(credential.token().expose_secret()),
            None => request,
        }
    }
}

impl BlobStore for BlobClient {
    async fn upload(&self, path: &str, upload: &Upload) -> Result<Url> {
        let url = self.base.join(path)?;
        let content_type = upload
            .content_type
            .as_deref()
            .unwrap_or("application/octet-stream");

        self.request(Method::PUT, url.clone())
            .body(upload.bytes.clone())
            .header(header::CONTENT_TYPE, content_type)
            .send_ext()
            .await?;

        tracing::trace!(%path, bytes = upload.bytes.len(), "upload");

        Ok(url)
    }

    async fn delete(&self, url: &Url) -> Result<()> {
        if !url.as_str().starts_with(self.base.as_str()) {
            return Err(Error::Other("Foreign blob url"));
        }

        self.request(Method::DELETE, url.clone()).send_ext().await?;

        tracing::trace!(%url, "delete");

        Ok(())
    }
}

#[derive(Default)]
struct Bucket {
    blobs: HashMap<Url, Upload>,
    calls: usize,
    fail_uploads: bool,
}

/// In-process blob store serving `memory://blobs/` URLs.
#[derive(Clone, Default)]
pub struct MemoryBlobs {
    bucket: Arc<Mutex<Bucket>>,
}

impl MemoryBlobs {
    pub const BASE: &'static str = "memory://blobs/";

    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Bucket> {
        self.bucket.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every upload fails until called again with `false`.
    pub fn fail_uploads(&self, fail: bool) {
        self.lock().fail_uploads = fail;
    }

    pub fn contains(&self, url: &Url) -> bool {
        self.lock().blobs.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.lock().blobs.len()
    }

    pub fn calls(&self) -> usize {
        self.lock().calls
    }

    pub fn urls(&self) -> Vec<Url> {
        self.lock().blobs.keys().cloned().collect()
    }
}

impl BlobStore for MemoryBlobs {
    async fn upload(&self, path: &str, upload: &Upload) -> Result<Url> {
        let url = Url::parse(Self::BASE)?.join(path)?;

        let mut bucket = self.lock();
        bucket.calls += 1;

        if bucket.fail_uploads {
            return Err(Error::ServiceError(Status::new(
                "storage/unauthorized",
                "upload rejected",
            )));
        }

        bucket.blobs.insert(url.clone(), upload.clone());

        Ok(url)
    }

    async fn delete(&self, url: &Url) -> Result<()> {
        let mut bucket = self.lock();
        bucket.calls += 1;

        match bucket.blobs.remove(url) {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(url.to_string())),
        }
    }
}
