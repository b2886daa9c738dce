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

use std::fmt;
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::WatchStream;

use crate::runtime::tokio;
use crate::services::TokenProvider;
use crate::{Error, Result};

pub type Uid = String;
pub type DocId = String;
pub type Timestamp = chrono::DateTime<chrono::Utc>;

#[allow(non_upper_case_globals)]
pub mod collection {
    pub const users: &str = "users";
    pub const projects: &str = "projects";
    pub const achievements: &str = "achievements";
}

/// Path of a single document, `collection/id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocRef {
    pub collection: String,
    pub id: DocId,
}

impl DocRef {
    pub fn new(collection: impl Into<String>, id: impl Into<DocId>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn user(uid: impl Into<Uid>) -> Self {
        Self::new(collection::users, uid)
    }
}

impl fmt::Display for DocRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

impl FromStr for DocRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((collection, id))
                if !collection.is_empty() && !id.is_empty() && !id.contains('/') =>
            {
                Ok(Self::new(collection, id))
            }
            _ => Err(Error::Other("InvalidDocRef")),
        }
    }
}

impl TryFrom<String> for DocRef {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DocRef> for String {
    fn from(value: DocRef) -> Self {
        value.to_string()
    }
}

/// Identity issued by the provider for the signed-in user.
#[derive(Debug, Clone)]
pub struct Credential {
    pub uid: Uid,
    pub email: Option<String>,
    token: SecretString,
}

impl Credential {
    pub fn new(uid: impl Into<Uid>, email: Option<String>, token: impl Into<SecretString>) -> Self {
        Self {
            uid: uid.into(),
            email,
            token: token.into(),
        }
    }

    pub fn token(&self) -> &SecretString {
        &self.token
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid && self.token.expose_secret() == other.token.expose_secret()
    }
}

impl TokenProvider for &Credential {
    fn provide_token(&self) -> Option<&str> {
        Some(self.token.expose_secret())
    }
}

impl TokenProvider for Option<&Credential> {
    fn provide_token(&self) -> Option<&str> {
        self.map(|credential| credential.token.expose_secret())
    }
}

/// Read side of the identity provider's current credential, shared with
/// the clients that need to authenticate their requests.
#[derive(Debug, Clone)]
pub struct Credentials(tokio::sync::watch::Receiver<Option<Credential>>);

impl Credentials {
    pub fn new(rx: tokio::sync::watch::Receiver<Option<Credential>>) -> Self {
        Self(rx)
    }

    pub fn current(&self) -> Option<Credential> {
        self.0.borrow().clone()
    }

    /// Yields the current credential first, then every later change.
    pub fn changes(&self) -> WatchStream<Option<Credential>> {
        WatchStream::new(self.0.clone())
    }
}
