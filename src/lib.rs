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

pub use reqwest::StatusCode;

pub mod alert;
mod config;
pub mod controllers;
pub mod model;
mod runtime;
pub mod services;
pub mod session;

pub use alert::{Alert, AlertChannel, AlertId, AlertKind};
pub use config::{Config, ConfigBuilder, ConfigBuilderError};
pub use services::ServiceFactory;
pub use services::identity::{AuthError, AuthErrorKind};
pub use session::{SessionHandle, SessionResolver, SessionState, SessionView};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("ServiceError: {0}")]
    ServiceError(#[from] services::Status),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    Ws(#[from] reqwest_websocket::Error),

    #[error(transparent)]
    ReqwestMiddleware(#[from] reqwest_middleware::Error),

    #[error("Subscription closed")]
    SubscriptionClosed,

    #[error(transparent)]
    Url(#[from] url::ParseError),

    #[error("{0}")]
    HttpError(reqwest::StatusCode, String),

    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Config(#[from] ::config::ConfigError),

    #[error("{0}")]
    Validation(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(&'static str),
}

impl Error {
    /// Text suitable for an alert shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::ServiceError(status) => status.message().unwrap_or(&status.code).to_owned(),
            Self::Auth(error) => error.message.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
