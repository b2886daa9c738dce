use crate::Result;
use crate::services::store::document::{Data, Document, Query};
use crate::services::types::{Credential, Credentials, DocId, DocRef};
use crate::services::{JsonClient, RequestBuilderExt};
use reqwest::{Method, StatusCode};
use reqwest_middleware::{ClientWithMiddleware, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::trace;
use url::Url;

pub type HttpClient = ClientWithMiddleware;

const API_KEY_HEADER: &str = "x-api-key";

struct HttpBackendInner {
    base: Url,
    client: HttpClient,
    credentials: Credentials,
    api_key: Option<SecretString>,
}

/// One-shot document operations over REST.
#[derive(Clone)]
pub struct HttpBackend {
    inner: Arc<HttpBackendInner>,
}

#[derive(Deserialize)]
struct Created {
    id: DocId,
}

impl HttpBackend {
    pub fn new(
        client: HttpClient,
        base: Url,
        credentials: Credentials,
        api_key: Option<SecretString>,
    ) -> Self {
        Self {
            inner: Arc::new(HttpBackendInner {
                base,
                client,
                credentials,
                api_key,
            }),
        }
    }

    pub fn base(&self) -> &Url {
        &self.inner.base
    }

    fn document_url(&self, doc: &DocRef) -> Result<Url> {
        Ok(self
            .base()
            .join(&format!("documents/{}/{}", doc.collection, doc.id))?)
    }

    fn request(&self, method: Method, url: Url, credential: Option<&Credential>) -> RequestBuilder {
        let mut request = self.inner.client.request(method, url);

        if let Some(credential) = credential {
            request = request.bearer_auth(credential.token().expose_secret());
        }

        if let Some(key) = &self.inner.api_key {
            request = request.header(API_KEY_HEADER, key.expose_secret());
        }

        request
    }

    pub async fn get(&self, doc: &DocRef) -> Result<Option<Document>> {
        let credential = self.inner.credentials.current();
        let url = self.document_url(doc)?;

        let response = self
            .request(Method::GET, url, credential.as_ref())
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let data = response.json::<Data>().await?;
                trace!(%doc, "get");
                Ok(Some(Document::new(doc.id.clone(), data)))
            }
            status => Err(crate::Error::HttpError(status, response.text().await?)),
        }
    }

    pub async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        let credential = self.inner.credentials.current();
        let url = self.base().join("query")?;

        JsonClient::post(&self.inner.client, credential.as_ref(), url, query).await
    }

    pub async fn create(&self, collection: &str, data: &Data) -> Result<DocId> {
        let credential = self.inner.credentials.current();
        let url = self.base().join(&format!("documents/{collection}"))?;

        let Created { id } =
            JsonClient::post(&self.inner.client, credential.as_ref(), url, data).await?;

        trace!(%collection, %id, "create");

        Ok(id)
    }

    pub async fn set(&self, doc: &DocRef, data: &Data) -> Result<()> {
        self.write(Method::PUT, doc, Some(data)).await
    }

    pub async fn update(&self, doc: &DocRef, data: &Data) -> Result<()> {
        self.write(Method::PATCH, doc, Some(data)).await
    }

    pub async fn delete(&self, doc: &DocRef) -> Result<()> {
        self.write(Method::DELETE, doc, None).await
    }

    async fn write(&self, method: Method, doc: &DocRef, data: Option<&Data>) -> Result<()> {
        let credential = self.inner.credentials.current();
        let url = self.document_url(doc)?;

        let mut request = self.request(method.clone(), url, credential.as_ref());
        if let Some(data) = data {
            request = request.json(&Value::Object(data.clone()));
        }

        request.send_ext().await?;

        trace!(%doc, %method, "write");

        Ok(())
    }
}
