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

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::{debug, error};

use crate::alert::AlertChannel;
use crate::config::Config;
use crate::model::ProfileStatus;
use crate::services::identity::{AuthError, AuthErrorKind, IdentityProvider};
use crate::services::store::{ProfileStore, server_timestamp};
use crate::services::types::DocRef;
use crate::{Error, Result};

use super::{LoadingFlag, to_data};

const MIN_PASSWORD_LEN: usize = 6;

const SIGNED_IN: &str = "Login successful! Welcome back!";
const SIGN_IN_FAILED: &str = "Login failed. Please try again.";
const SIGNED_OUT: &str = "Logout successful! See you soon.";
const SIGN_OUT_FAILED: &str = "Logout failed. Please try again.";
const NETWORK_FAILED: &str = "Network error. Please check your connection and try again.";

const INVALID_CODE: &str = "Invalid confirmation code. Please contact admin.";
const FIELDS_REQUIRED: &str = "Please fill in all fields";
const INVALID_EMAIL: &str = "Please enter a valid email address";
const SHORT_PASSWORD: &str = "Password must be at least 6 characters";
const INVALID_USERNAME: &str = "Username can only contain letters, numbers, and underscores";
const SIGNED_UP: &str = "Account created successfully!";
const EMAIL_TAKEN: &str = "Email address is already in use";
const WEAK_PASSWORD: &str = "Password is too weak";
const SIGN_UP_FAILED: &str = "Failed to create account";

/// Fields of the account creation dialog.
#[derive(Debug, Clone, Default)]
pub struct SignUpForm {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub about: String,
    pub confirmation_code: String,
}

/// Sign-in, sign-out and account creation.
pub struct Auth<I, S> {
    identity: Arc<I>,
    store: Arc<S>,
    alerts: AlertChannel,
    signup_code: Option<SecretString>,
    loading: LoadingFlag,
}

impl<I: IdentityProvider, S: ProfileStore> Auth<I, S> {
    pub fn new(identity: Arc<I>, store: Arc<S>, alerts: AlertChannel, config: &Config) -> Self {
        Self {
            identity,
            store,
            alerts,
            signup_code: config.signup_code.clone(),
            loading: LoadingFlag::new(),
        }
    }

    pub fn loading(&self) -> &LoadingFlag {
        &self.loading
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> bool {
        let _loading = self.loading.hold();

        match self.identity.sign_in(email, password).await {
            Ok(credential) => {
                debug!(uid = %credential.uid, "signed in");
                self.alerts.success(SIGNED_IN);
                true
            }
            Err(error) => {
                error!(%error, "sign in failed");
                self.alerts.danger(sign_in_message(&error));
                false
            }
        }
    }

    pub async fn sign_out(&self) -> bool {
        let _loading = self.loading.hold();

        match self.identity.sign_out().await {
            Ok(()) => {
                self.alerts.success(SIGNED_OUT);
                true
            }
            Err(error) => {
                error!(%error, "sign out failed");

                let message = match error.kind {
                    AuthErrorKind::NetworkFailure => NETWORK_FAILED,
                    _ => SIGN_OUT_FAILED,
                };
                self.alerts.danger(message);
                false
            }
        }
    }

    /// Creates the account and its profile, left `Inactive` until billing
    /// activates it.
    pub async fn sign_up(&self, form: SignUpForm) -> bool {
        if let Err(message) = self.validate(&form) {
            self.alerts.danger(message);
            return false;
        }

        let _loading = self.loading.hold();

        match self.create_account(&form).await {
            Ok(()) => {
                self.alerts.success(SIGNED_UP);
                true
            }
            Err(error) => {
                error!(%error, "account creation failed");
                self.alerts.danger(sign_up_message(&error));
                false
            }
        }
    }

    fn validate(&self, form: &SignUpForm) -> std::result::Result<(), &'static str> {
        let code_matches = self
            .signup_code
            .as_ref()
            .is_some_and(|code| code.expose_secret() == form.confirmation_code);

        if !code_matches {
            return Err(INVALID_CODE);
        }

        if [
            &form.name,
            &form.username,
            &form.email,
            &form.password,
            &form.about,
        ]
        .iter()
        .any(|field| field.is_empty())
        {
            return Err(FIELDS_REQUIRED);
        }

        if !is_email(&form.email) {
            return Err(INVALID_EMAIL);
        }

        if form.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(SHORT_PASSWORD);
        }

        if !is_username(&form.username) {
            return Err(INVALID_USERNAME);
        }

        Ok(())
    }

    async fn create_account(&self, form: &SignUpForm) -> Result<()> {
        let credential = self.identity.sign_up(&form.email, &form.password).await?;

        let profile = to_data(&json!({
            "username": form.username.to_lowercase(),
            "name": form.name,
            "email": form.email,
            "about": form.about,
            "avatar": "",
            "cvUrl": "",
            "title": "",
            "location": "",
            "phone": "",
            "technologies": [],
            "galleryImages": [],
            "github": "",
            "linkedin": "",
            "twitter": "",
            "website": "",
            "status": ProfileStatus::Inactive,
            "createdAt": server_timestamp(),
            "updatedAt": server_timestamp(),
        }))?;

        self.store
            .set(&DocRef::user(credential.uid), profile)
            .await
    }
}

fn sign_in_message(error: &AuthError) -> String {
    let message = match error.kind {
        AuthErrorKind::EmailAlreadyExists => {
            "The provided email is already associated with an existing user. Ensure each user has a unique email address."
        }
        AuthErrorKind::IdTokenExpired => {
            "Your session has expired. Please log in again to continue."
        }
        AuthErrorKind::InvalidEmail => {
            "The email address provided is not valid. Ensure it follows the correct email format."
        }
        AuthErrorKind::InvalidPassword => "The password must be at least six characters long.",
        AuthErrorKind::UserNotFound => {
            "No user record exists for the provided credentials. Verify your login details."
        }
        AuthErrorKind::WrongPassword => "Incorrect password. Please try again.",
        AuthErrorKind::TooManyRequests => {
            "Too many requests have been made from this device. Please wait a few minutes before trying again."
        }
        AuthErrorKind::InvalidCredential => {
            "The credentials provided are invalid or expired. Please reauthenticate."
        }
        AuthErrorKind::OperationNotAllowed => {
            "The requested sign-in method is disabled. Please contact support or enable it in the Firebase Console."
        }
        AuthErrorKind::PhoneNumberAlreadyExists => {
            "The provided phone number is already in use by another user. Ensure phone numbers are unique."
        }
        AuthErrorKind::UnauthorizedContinueUri => {
            "The domain of the continue URL is not whitelisted. Add this domain to the Firebase Console."
        }
        AuthErrorKind::UserDisabled => {
            "This account has been disabled. Contact support for assistance."
        }
        _ if !error.message.is_empty() => return error.message.clone(),
        _ => SIGN_IN_FAILED,
    };

    message.to_owned()
}

fn sign_up_message(error: &Error) -> String {
    match error {
        Error::Auth(AuthError {
            kind: AuthErrorKind::EmailInUse,
            ..
        }) => EMAIL_TAKEN.to_owned(),
        Error::Auth(AuthError {
            kind: AuthErrorKind::WeakPassword,
            ..
        }) => WEAK_PASSWORD.to_owned(),
        other => match other.user_message() {
            message if message.is_empty() => SIGN_UP_FAILED.to_owned(),
            message => message,
        },
    }
}

/// `local@domain.tld` with no whitespace and a single `@`.
fn is_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.contains('@')
        && domain
            .char_indices()
            .any(|(at, c)| c == '.' && at > 0 && at + 1 < domain.len())
}

fn is_username(username: &str) -> bool {
    !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::alert::AlertKind;
    use crate::controllers::testing::only_alert;
    use crate::services::identity::MemoryIdentity;
    use crate::services::store::MemoryStore;
    use crate::services::store::memory::Operation;

    const CODE: &str = "letmein";

    fn auth() -> (
        Arc<MemoryIdentity>,
        Arc<MemoryStore>,
        Auth<MemoryIdentity, MemoryStore>,
    ) {
        let identity = Arc::new(MemoryIdentity::new());
        let store = Arc::new(MemoryStore::new());
        let config = Config {
            signup_code: Some(SecretString::from(CODE)),
            ..Config::default()
        };

        let auth = Auth::new(
            identity.clone(),
            store.clone(),
            AlertChannel::new(Duration::from_secs(60)),
            &config,
        );

        (identity, store, auth)
    }

    fn form() -> SignUpForm {
        SignUpForm {
            name: "Bob".to_owned(),
            username: "Bob_1".to_owned(),
            email: "bob@example.com".to_owned(),
            password: "secret1".to_owned(),
            about: "Builds things".to_owned(),
            confirmation_code: CODE.to_owned(),
        }
    }

    #[test]
    fn email_shape() {
        assert!(is_email("bob@example.com"));
        assert!(is_email("b.o.b@mail.example.co"));
        assert!(!is_email("bob@example"));
        assert!(!is_email("bob@.com"));
        assert!(!is_email("bob@example."));
        assert!(!is_email("@example.com"));
        assert!(!is_email("bob@ex@ample.com"));
        assert!(!is_email("bob @example.com"));
    }

    #[tokio::test]
    async fn sign_up_validates_in_order_without_network() {
        let (identity, store, auth) = auth();

        let cases = [
            (
                SignUpForm {
                    confirmation_code: "nope".to_owned(),
                    email: String::new(),
                    ..form()
                },
                INVALID_CODE,
            ),
            (
                SignUpForm {
                    about: String::new(),
                    email: "bad".to_owned(),
                    ..form()
                },
                FIELDS_REQUIRED,
            ),
            (
                SignUpForm {
                    email: "bad".to_owned(),
                    password: "123".to_owned(),
                    ..form()
                },
                INVALID_EMAIL,
            ),
            (
                SignUpForm {
                    password: "123".to_owned(),
                    username: "bad name".to_owned(),
                    ..form()
                },
                SHORT_PASSWORD,
            ),
            (
                SignUpForm {
                    username: "bad-name".to_owned(),
                    ..form()
                },
                INVALID_USERNAME,
            ),
        ];

        for (form, expected) in cases {
            assert!(!auth.sign_up(form).await);
            let last = auth.alerts.alerts().pop().unwrap();
            assert_eq!((last.kind, last.message.as_str()), (AlertKind::Danger, expected));
        }

        assert_eq!(identity.calls(), 0);
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn sign_up_creates_inactive_profile() {
        let (identity, store, auth) = auth();

        assert!(auth.sign_up(form()).await);
        assert_eq!(
            only_alert(&auth.alerts),
            (AlertKind::Success, SIGNED_UP.to_owned())
        );

        let uid = identity.current().unwrap().uid;
        let profile = store.document(&DocRef::user(uid)).unwrap();

        assert_eq!(profile["username"], "bob_1");
        assert_eq!(profile["status"], "Inactive");
        assert_eq!(profile["avatar"], "");
        assert_eq!(profile["galleryImages"], json!([]));
        assert!(profile["createdAt"].is_i64());
        assert!(!auth.loading().is_loading());
    }

    #[tokio::test]
    async fn provider_errors_map_to_messages() {
        let (identity, _store, auth) = auth();
        identity.register("bob@example.com", "secret1");

        assert!(!auth.sign_up(form()).await);
        assert!(!auth.sign_in("bob@example.com", "wrong").await);
        assert!(!auth.sign_in("alice@example.com", "secret1").await);
        assert!(auth.sign_in("bob@example.com", "secret1").await);

        identity.fail_next(AuthErrorKind::NetworkFailure, "offline");
        assert!(!auth.sign_out().await);
        assert!(auth.sign_out().await);

        let messages = auth
            .alerts
            .alerts()
            .into_iter()
            .map(|alert| alert.message)
            .collect::<Vec<_>>();

        assert_eq!(
            messages,
            [
                EMAIL_TAKEN,
                "Incorrect password. Please try again.",
                "No user record exists for the provided credentials. Verify your login details.",
                SIGNED_IN,
                NETWORK_FAILED,
                SIGNED_OUT,
            ]
        );
    }

    #[tokio::test]
    async fn sign_in_messages_follow_provider_codes() {
        let (identity, _store, auth) = auth();
        identity.register("bob@example.com", "secret1");

        let cases = [
            (
                AuthErrorKind::EmailAlreadyExists,
                "The provided email is already associated with an existing user. Ensure each user has a unique email address.",
            ),
            (
                AuthErrorKind::InvalidPassword,
                "The password must be at least six characters long.",
            ),
            (
                AuthErrorKind::IdTokenExpired,
                "Your session has expired. Please log in again to continue.",
            ),
            (
                AuthErrorKind::OperationNotAllowed,
                "The requested sign-in method is disabled. Please contact support or enable it in the Firebase Console.",
            ),
            (AuthErrorKind::EmailInUse, "raw provider text"),
            (AuthErrorKind::WeakPassword, "raw provider text"),
        ];

        for (kind, expected) in cases {
            identity.fail_next(kind, "raw provider text");
            assert!(!auth.sign_in("bob@example.com", "secret1").await);

            let last = auth.alerts.alerts().pop().unwrap();
            assert_eq!((last.kind, last.message.as_str()), (AlertKind::Danger, expected));
        }

        identity.fail_next(AuthErrorKind::Other, "");
        assert!(!auth.sign_in("bob@example.com", "secret1").await);
        assert_eq!(auth.alerts.alerts().pop().unwrap().message, SIGN_IN_FAILED);
    }

    #[tokio::test]
    async fn profile_write_failure_is_reported() {
        let (_identity, store, auth) = auth();
        store.fail_next(Operation::Set, "permission denied");

        assert!(!auth.sign_up(form()).await);
        assert_eq!(
            only_alert(&auth.alerts),
            (AlertKind::Danger, "permission denied".to_owned())
        );
    }
}
