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
#[cfg(feature = "reqwest_middleware")]
use std::time::Duration;

use reqwest::{self, Response, Url};
#[cfg(feature = "reqwest_middleware")]
use reqwest::{StatusCode, header::HeaderValue};
use reqwest_middleware::ClientBuilder;
use reqwest_middleware::{ClientWithMiddleware as HttpClient, RequestBuilder};
#[cfg(feature = "reqwest_middleware")]
use reqwest_retry::{
    RetryTransientMiddleware, Retryable, RetryableStrategy, default_on_request_failure,
    policies::ExponentialBackoff,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{self as json, Value};
use tracing::*;

pub mod blob;
pub mod identity;
pub mod rpc;
pub mod store;
pub mod types;

use self::blob::BlobClient;
use self::identity::{IdentityClient, IdentityProvider};
use self::store::StoreClient;
use crate::alert::AlertChannel;
use crate::{Error, Result, config::Config};

pub trait RequestBuilderExt {
    fn send_ext(self) -> impl Future<Output = Result<Response>>;
}

pub trait TokenProvider {
    fn provide_token(&self) -> Option<&str>;
}

pub trait BasePathProvider {
    fn provide_base_path(&self) -> &Url;
}

impl RequestBuilderExt for RequestBuilder {
    async fn send_ext(self) -> Result<Response> {
        let response = self.send().await?;

        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await?;

            Err(Error::HttpError(status, body))
        }
    }
}

pub(crate) fn from_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    json::from_value(value).map_err(|error| {
        error!(%error, "Cannot deserialize response");
        Error::Serde(error)
    })
}

pub trait JsonClient {
    fn post<U: TokenProvider, Q: Serialize, R: DeserializeOwned>(
        &self,
        user: U,
        url: Url,
        body: &Q,
    ) -> impl Future<Output = Result<R>>;
}

impl JsonClient for HttpClient {
    #[tracing::instrument(
        level = "trace",
        skip(self, user, url, body),
        fields(%url, method = "post", type = "json")
    )]
    async fn post<U: TokenProvider, Q: Serialize, R: DeserializeOwned>(
        &self,
        user: U,
        url: Url,
        body: &Q,
    ) -> Result<R> {
        let body = json::to_value(body)?;

        trace!(type="json", %url, method="post", %body, "http request");

        let mut request = self.post(url.clone()).json(&body);

        if let Some(token) = user.provide_token() {
            request = request.bearer_auth(token);
        }

        let response = request.send_ext().await?.json::<Value>().await?;

        trace!(type="json", %url, method="post", %response, "http response");

        from_value(response)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, strum::Display)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Ok,
    Info,
    Warning,
    Error,
}

/// Failure reported by a hosted service in place of a result.
#[derive(Deserialize, Serialize, Debug, Clone, thiserror::Error)]
pub struct Status {
    pub severity: Severity,
    pub code: String,

    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl Status {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code: code.into(),
            params: HashMap::from([(String::from("message"), message.into())]),
        }
    }

    pub fn message(&self) -> Option<&str> {
        self.params.get("message").map(String::as_str)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.message() {
            Some(message) => write!(f, "{} {}: {}", self.severity, self.code, message),
            None => write!(f, "{} {}", self.severity, self.code),
        }
    }
}

pub trait ServiceClient {
    fn service<U: TokenProvider + BasePathProvider, R: serde::de::DeserializeOwned>(
        &self,
        user: U,
        method: &str,
        params: impl Serialize,
    ) -> impl Future<Output = Result<R>>;
}

impl ServiceClient for HttpClient {
    async fn service<U: TokenProvider + BasePathProvider, R: DeserializeOwned>(
        &self,
        user: U,
        method: &str,
        params: impl Serialize,
    ) -> Result<R> {
        let url = user.provide_base_path();

        let params = json::to_value(&params)?;

        // params are not logged
        trace!(type="service", %url, %method, "http request");

        #[derive(Serialize, Debug)]
        struct Request<'a> {
            method: &'a str,
            params: json::Value,
        }

        #[derive(Deserialize, Debug)]
        struct Response {
            result: Option<json::Value>,
            error: Option<json::Value>,
        }

        let mut req = self.post(url.clone()).json(&Request { method, params });

        if let Some(token) = user.provide_token() {
            req = req.bearer_auth(token);
        }

        let response = req.send_ext().await?.json::<Value>().await?;

        trace!(type="service", %url, %method, "http response");

        match from_value(response)? {
            Response {
                result: Some(result),
                error: None,
            } => from_value::<R>(result),

            Response {
                result: None,
                error: Some(error),
            } => Err(Error::ServiceError(from_value::<Status>(error)?)),

            Response {
                result: None,
                error: None,
            } => Ok(json::from_value(json::Value::Null)?),

            _ => Err(Error::Other("Unexpected service response")),
        }
    }
}

/// Retry policy of the document store: timeouts and throttling are retried,
/// any other failure status is final.
#[cfg(feature = "reqwest_middleware")]
struct StoreStrategy;

#[cfg(feature = "reqwest_middleware")]
fn classify_store_status(
    status: StatusCode,
    retry_after: Option<&HeaderValue>,
) -> Option<Retryable> {
    match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = retry_after.and_then(|h| h.to_str().ok()).unwrap_or("");
            warn!(code = %status, retry_after, "Transient error");

            Some(Retryable::Transient)
        }
        status if status.is_success() => None,
        _ => Some(Retryable::Fatal),
    }
}

#[cfg(feature = "reqwest_middleware")]
impl RetryableStrategy for StoreStrategy {
    #[tracing::instrument(level = "debug", skip_all)]
    fn handle(
        &self,
        res: &std::result::Result<reqwest::Response, reqwest_middleware::Error>,
    ) -> Option<Retryable> {
        match res {
            Ok(response) => {
                classify_store_status(response.status(), response.headers().get("Retry-After"))
            }
            Err(error) => default_on_request_failure(error),
        }
    }
}

#[cfg(feature = "reqwest_middleware")]
type DirectRateLimiter = governor::RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::MonotonicClock,
    governor::middleware::NoOpMiddleware<
        <governor::clock::MonotonicClock as governor::clock::Clock>::Instant,
    >,
>;

/// Spaces store requests to at most `limit` per second.
#[cfg(feature = "reqwest_middleware")]
struct StoreLimiter(DirectRateLimiter);

#[cfg(feature = "reqwest_middleware")]
impl StoreLimiter {
    fn new(limit: std::num::NonZeroU32) -> Self {
        let quota = governor::Quota::per_second(limit).allow_burst(std::num::NonZeroU32::MIN);
        Self(governor::RateLimiter::direct_with_clock(
            quota,
            governor::clock::MonotonicClock,
        ))
    }
}

#[cfg(feature = "reqwest_middleware")]
impl reqwest_ratelimit::RateLimiter for StoreLimiter {
    async fn acquire_permit(&self) {
        self.0.until_ready().await;
    }
}

#[cfg(feature = "reqwest_middleware")]
fn with_retries<P: reqwest_retry::RetryPolicy + Send + Sync + 'static>(policy: P) -> HttpClient {
    ClientBuilder::new(reqwest::Client::new())
        .with(RetryTransientMiddleware::new_with_policy(policy))
        .build()
}

#[derive(Clone)]
pub struct ServiceFactory {
    config: Config,
    identity_http: HttpClient,
    blob_http: HttpClient,
    store_http: HttpClient,
}

impl ServiceFactory {
    #[cfg(feature = "reqwest_middleware")]
    pub fn new(config: Config) -> Self {
        let identity_http = with_retries(ExponentialBackoff::builder().build_with_max_retries(3));
        let blob_http = with_retries(
            ExponentialBackoff::builder().build_with_total_retry_duration(Duration::from_secs(10)),
        );

        let store_policy =
            ExponentialBackoff::builder().build_with_total_retry_duration(Duration::from_secs(30));
        let store_http = ClientBuilder::new(reqwest::Client::new())
            .with(reqwest_ratelimit::all(StoreLimiter::new(config.store_rate_limit)))
            .with(RetryTransientMiddleware::new_with_policy_and_strategy(
                store_policy,
                StoreStrategy,
            ))
            .build();

        Self {
            config,
            identity_http,
            blob_http,
            store_http,
        }
    }

    #[cfg(not(feature = "reqwest_middleware"))]
    pub fn new(config: Config) -> Self {
        let http = ClientBuilder::new(reqwest::Client::new()).build();

        Self {
            config,
            identity_http: http.clone(),
            blob_http: http.clone(),
            store_http: http,
        }
    }

    pub fn new_identity_client(&self) -> IdentityClient {
        IdentityClient::new(&self.config, self.identity_http.clone())
    }

    pub fn new_blob_client(&self, identity: &IdentityClient) -> BlobClient {
        BlobClient::new(&self.config, self.blob_http.clone(), identity.credentials())
    }

    /// Connects the live channel before returning.
    pub async fn new_store_client(&self, identity: &IdentityClient) -> Result<StoreClient> {
        StoreClient::connect(&self.config, self.store_http.clone(), identity.credentials()).await
    }

    pub fn new_alert_channel(&self) -> AlertChannel {
        AlertChannel::new(self.config.alert_ttl)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[cfg(all(test, feature = "reqwest_middleware"))]
mod tests {
    use super::*;

    #[test]
    fn store_retries_only_timeouts_and_throttling() {
        let retry_after = HeaderValue::from_static("3");

        assert!(matches!(
            classify_store_status(StatusCode::TOO_MANY_REQUESTS, Some(&retry_after)),
            Some(Retryable::Transient)
        ));
        assert!(matches!(
            classify_store_status(StatusCode::REQUEST_TIMEOUT, None),
            Some(Retryable::Transient)
        ));
        assert!(matches!(
            classify_store_status(StatusCode::FORBIDDEN, None),
            Some(Retryable::Fatal)
        ));
        assert!(classify_store_status(StatusCode::OK, None).is_none());
    }
}
