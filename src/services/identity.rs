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

use jsonwebtoken::{DecodingKey, Validation};
use reqwest_middleware::ClientWithMiddleware as HttpClient;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, warn};
use url::Url;

use crate::config::Config;
use crate::runtime::tokio;
use crate::services::types::{Credential, Credentials, Uid};
use crate::services::{BasePathProvider, ServiceClient, Status, TokenProvider};
use crate::{Error, Result};

/// Failure classes reported by the identity provider, parsed from its
/// `auth/<code>` error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum AuthErrorKind {
    InvalidEmail,
    WeakPassword,
    #[strum(serialize = "email-already-in-use")]
    EmailInUse,
    EmailAlreadyExists,
    InvalidPassword,
    IdTokenExpired,
    OperationNotAllowed,
    PhoneNumberAlreadyExists,
    UnauthorizedContinueUri,
    UserNotFound,
    WrongPassword,
    TooManyRequests,
    InvalidCredential,
    UserDisabled,
    #[strum(serialize = "network-request-failed")]
    NetworkFailure,
    #[strum(serialize = "internal-error")]
    Other,
}

impl AuthErrorKind {
    pub fn from_code(code: &str) -> Self {
        code.strip_prefix("auth/")
            .unwrap_or(code)
            .parse()
            .unwrap_or(Self::Other)
    }

    pub fn code(self) -> String {
        format!("auth/{self}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} ({})", .kind.code())]
pub struct AuthError {
    pub kind: AuthErrorKind,
    pub message: String,
}

impl AuthError {
    pub fn new(kind: AuthErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<Status> for AuthError {
    fn from(status: Status) -> Self {
        let message = status.message().unwrap_or(&status.code).to_owned();

        Self::new(AuthErrorKind::from_code(&status.code), message)
    }
}

impl From<Error> for AuthError {
    fn from(error: Error) -> Self {
        match error {
            Error::Auth(error) => error,
            Error::ServiceError(status) => status.into(),
            Error::Reqwest(_) | Error::ReqwestMiddleware(_) => {
                Self::new(AuthErrorKind::NetworkFailure, error.to_string())
            }
            other => Self::new(AuthErrorKind::Other, other.to_string()),
        }
    }
}

/// Hosted identity provider: issues credentials and announces changes.
pub trait IdentityProvider: Send + Sync + 'static {
    fn credentials(&self) -> Credentials;

    /// Current credential first, then every change; latest value wins.
    fn credential_changes(&self) -> WatchStream<Option<Credential>> {
        self.credentials().changes()
    }

    fn current(&self) -> Option<Credential> {
        self.credentials().current()
    }

    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = std::result::Result<Credential, AuthError>> + Send;

    fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = std::result::Result<Credential, AuthError>> + Send;

    fn sign_out(&self) -> impl Future<Output = std::result::Result<(), AuthError>> + Send;
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PasswordParams<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SignOutParams<'a> {
    id_token: &'a str,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    id_token: String,
}

#[derive(Deserialize, Debug)]
struct Claims {
    #[serde(default)]
    sub: Option<Uid>,

    #[serde(default)]
    user_id: Option<Uid>,

    #[serde(default)]
    email: Option<String>,
}

/// Reads uid and email out of an ID token. Only the payload is decoded; the
/// store verifies the signature.
pub(crate) fn decode_id_token(token: &str) -> Result<Credential> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let claims = jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)?
        .claims;

    let uid = claims
        .sub
        .or(claims.user_id)
        .ok_or(Error::Other("ID token carries no user id"))?;

    Ok(Credential::new(uid, claims.email, token.to_owned()))
}

#[derive(Clone)]
pub struct IdentityClient {
    base: Url,
    http: HttpClient,
    api_key: Option<SecretString>,
    credential: Arc<watch::Sender<Option<Credential>>>,
}

impl TokenProvider for &IdentityClient {
    fn provide_token(&self) -> Option<&str> {
        self.api_key.as_ref().map(SecretString::expose_secret)
    }
}

impl BasePathProvider for &IdentityClient {
    fn provide_base_path(&self) -> &Url {
        &self.base
    }
}

impl IdentityClient {
    pub fn new(config: &Config, http: HttpClient) -> Self {
        Self {
            base: config.identity_service.clone(),
            http,
            api_key: config.api_key.clone(),
            credential: Arc::new(watch::channel(None).0),
        }
    }

    async fn exchange(
        &self,
        method: &str,
        email: &str,
        password: &str,
    ) -> std::result::Result<Credential, AuthError> {
        let params = PasswordParams {
            email,
            password,
            return_secure_token: true,
        };

        let TokenResponse { id_token } = self.http.service(self, method, params).await?;
        let credential = decode_id_token(&id_token)?;

        debug!(uid = %credential.uid, %method, "credential issued");
        self.credential.send_replace(Some(credential.clone()));

        Ok(credential)
    }
}

impl IdentityProvider for IdentityClient {
    fn credentials(&self) -> Credentials {
        Credentials::new(self.credential.subscribe())
    }

    async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> std::result::Result<Credential, AuthError> {
        self.exchange("signInWithPassword", email, password).await
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> std::result::Result<Credential, AuthError> {
        self.exchange("signUp", email, password).await
    }

    async fn sign_out(&self) -> std::result::Result<(), AuthError> {
        let current = self.credential.borrow().clone();

        if let Some(credential) = current {
            let params = SignOutParams {
                id_token: credential.token().expose_secret(),
            };

            self.http
                .service::<_, serde_json::Value>(self, "signOut", params)
                .await
                .inspect_err(|error| warn!(%error, "sign out rejected"))?;
        }

        self.credential.send_replace(None);

        Ok(())
    }
}

struct Account {
    uid: Uid,
    password: String,
}

#[derive(Default)]
struct Directory {
    accounts: HashMap<String, Account>,
    issued: u64,
    calls: usize,
    failure: Option<AuthError>,
}

/// In-process identity provider.
#[derive(Clone)]
pub struct MemoryIdentity {
    directory: Arc<Mutex<Directory>>,
    credential: Arc<watch::Sender<Option<Credential>>>,
}

impl Default for MemoryIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIdentity {
    pub fn new() -> Self {
        Self {
            directory: Arc::default(),
            credential: Arc::new(watch::channel(None).0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Directory> {
        self.directory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers an account without signing in; returns its uid.
    pub fn register(&self, email: &str, password: &str) -> Uid {
        let uid = uuid::Uuid::new_v4().simple().to_string();

        self.lock().accounts.insert(
            email.to_owned(),
            Account {
                uid: uid.clone(),
                password: password.to_owned(),
            },
        );

        uid
    }

    /// Replaces the current credential as if the provider had restored or
    /// dropped a session on its own.
    pub fn set_credential(&self, credential: Option<Credential>) {
        self.credential.send_replace(credential);
    }

    /// Signs `uid` in directly, bypassing the password check.
    pub fn assume(&self, uid: &str) -> Credential {
        let credential = self.issue(uid.to_owned(), None);
        self.set_credential(Some(credential.clone()));
        credential
    }

    pub fn fail_next(&self, kind: AuthErrorKind, message: impl Into<String>) {
        self.lock().failure = Some(AuthError::new(kind, message));
    }

    pub fn calls(&self) -> usize {
        self.lock().calls
    }

    fn issue(&self, uid: Uid, email: Option<String>) -> Credential {
        let mut directory = self.lock();
        directory.issued += 1;

        let token = format!("memory.{uid}.{}", directory.issued);
        Credential::new(uid, email, token)
    }

    fn call(&self) -> std::result::Result<(), AuthError> {
        let mut directory = self.lock();
        directory.calls += 1;

        match directory.failure.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn rejected(kind: AuthErrorKind) -> AuthError {
    AuthError::new(kind, format!("Request rejected ({})", kind.code()))
}

impl IdentityProvider for MemoryIdentity {
    fn credentials(&self) -> Credentials {
        Credentials::new(self.credential.subscribe())
    }

    async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> std::result::Result<Credential, AuthError> {
        self.call()?;

        if !email.contains('@') {
            return Err(rejected(AuthErrorKind::InvalidEmail));
        }

        let uid = match self.lock().accounts.get(email) {
            None => return Err(rejected(AuthErrorKind::UserNotFound)),
            Some(account) if account.password != password => {
                return Err(rejected(AuthErrorKind::WrongPassword));
            }
            Some(account) => account.uid.clone(),
        };

        let credential = self.issue(uid, Some(email.to_owned()));
        self.set_credential(Some(credential.clone()));

        Ok(credential)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> std::result::Result<Credential, AuthError> {
        self.call()?;

        if !email.contains('@') {
            return Err(rejected(AuthErrorKind::InvalidEmail));
        }

        if password.len() < 6 {
            return Err(rejected(AuthErrorKind::WeakPassword));
        }

        if self.lock().accounts.contains_key(email) {
            return Err(rejected(AuthErrorKind::EmailInUse));
        }

        let uid = self.register(email, password);
        let credential = self.issue(uid, Some(email.to_owned()));
        self.set_credential(Some(credential.clone()));

        Ok(credential)
    }

    async fn sign_out(&self) -> std::result::Result<(), AuthError> {
        self.call()?;
        self.set_credential(None);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use jsonwebtoken::{EncodingKey, Header};
    use serde_json::json;

    #[test]
    fn error_codes_map_to_kinds() {
        assert_eq!(
            AuthErrorKind::from_code("auth/wrong-password"),
            AuthErrorKind::WrongPassword
        );
        assert_eq!(
            AuthErrorKind::from_code("auth/email-already-in-use"),
            AuthErrorKind::EmailInUse
        );
        assert_eq!(
            AuthErrorKind::from_code("auth/network-request-failed"),
            AuthErrorKind::NetworkFailure
        );
        assert_eq!(
            AuthErrorKind::from_code("auth/operation-not-allowed"),
            AuthErrorKind::OperationNotAllowed
        );
        assert_eq!(
            AuthErrorKind::from_code("auth/id-token-expired"),
            AuthErrorKind::IdTokenExpired
        );
        assert_eq!(
            AuthErrorKind::from_code("auth/unknown-thing"),
            AuthErrorKind::Other
        );
        assert_eq!(AuthErrorKind::UserDisabled.code(), "auth/user-disabled");
    }

    #[test]
    fn service_status_becomes_auth_error() {
        let error = AuthError::from(Error::ServiceError(Status::new(
            "auth/too-many-requests",
            "slow down",
        )));

        assert_eq!(error.kind, AuthErrorKind::TooManyRequests);
        assert_eq!(error.message, "slow down");
    }

    #[test]
    fn id_token_payload_is_decoded() {
        let token = jsonwebtoken::encode(
            &Header::default(),
            &json!({"sub": "U1", "user_id": "U1", "email": "bob@example.com"}),
            &EncodingKey::from_secret(b"whatever"),
        )
        .unwrap();

        let credential = decode_id_token(&token).unwrap();
        assert_eq!(credential.uid, "U1");
        assert_eq!(credential.email.as_deref(), Some("bob@example.com"));
        assert_eq!(credential.token().expose_secret(), token);
    }

    #[test]
    fn id_token_uid_falls_back_to_user_id() {
        let key = EncodingKey::from_secret(b"whatever");

        let token = jsonwebtoken::encode(&Header::default(), &json!({"user_id": "U2"}), &key).unwrap();
        assert_eq!(decode_id_token(&token).unwrap().uid, "U2");

        let token =
            jsonwebtoken::encode(&Header::default(), &json!({"email": "a@b.co"}), &key).unwrap();
        assert!(matches!(decode_id_token(&token), Err(Error::Other(_))));
    }

    #[tokio::test]
    async fn memory_identity_signs_in_and_out() {
        let identity = MemoryIdentity::new();
        let uid = identity.register("bob@example.com", "secret1");

        let mut changes = identity.credential_changes();
        assert_eq!(changes.next().await.unwrap(), None);

        let error = identity
            .sign_in("bob@example.com", "nope")
            .await
            .unwrap_err();
        assert_eq!(error.kind, AuthErrorKind::WrongPassword);

        let credential = identity
            .sign_in("bob@example.com", "secret1")
            .await
            .unwrap();
        assert_eq!(credential.uid, uid);
        assert_eq!(changes.next().await.unwrap(), Some(credential));

        identity.sign_out().await.unwrap();
        assert_eq!(changes.next().await.unwrap(), None);
        assert!(identity.current().is_none());
    }

    #[tokio::test]
    async fn memory_identity_rejects_duplicate_sign_up() {
        let identity = MemoryIdentity::new();
        identity.register("bob@example.com", "secret1");

        let error = identity
            .sign_up("bob@example.com", "secret2")
            .await
            .unwrap_err();
        assert_eq!(error.kind, AuthErrorKind::EmailInUse);

        let error = identity
            .sign_up("carol@example.com", "123")
            .await
            .unwrap_err();
        assert_eq!(error.kind, AuthErrorKind::WeakPassword);
    }
}
