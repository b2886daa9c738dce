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

use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use url::Url;

use crate::{Error, Result};

const PORTFOLIO_SEGMENT: &str = "portfolio";

/// Dialog to open on load, from the `mode` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum DialogMode {
    SignIn,
    Create,
}

/// Location as seen by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Route {
    path: String,
    username: Option<String>,
    dialog: Option<DialogMode>,
}

impl Route {
    /// Parses `path[?query]`; `/portfolio/{username}` carries the username.
    pub fn parse(path_and_query: &str) -> Result<Self> {
        let base = Url::parse("http://localhost/")?;
        let url = base.join(path_and_query)?;

        if url.origin() != base.origin() {
            return Err(Error::Other("Route must be a local path"));
        }

        let segments = url
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect::<Vec<_>>())
            .unwrap_or_default();

        let username = match segments.as_slice() {
            [PORTFOLIO_SEGMENT, username] => Some((*username).to_owned()),
            _ => None,
        };

        let dialog = url
            .query_pairs()
            .find(|(key, _)| key == "mode")
            .and_then(|(_, value)| value.parse().ok());

        Ok(Self {
            path: url.path().to_owned(),
            username,
            dialog,
        })
    }

    pub fn home() -> Self {
        Self {
            path: String::from("/"),
            ..Self::default()
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn dialog(&self) -> Option<DialogMode> {
        self.dialog
    }
}

impl FromStr for Route {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Jump needed to reach `desired` from `current`, if any.
pub fn reconcile<'a>(desired: Option<&'a str>, current: &str) -> Option<&'a str> {
    desired.filter(|desired| *desired != current)
}

/// Host side of navigation.
pub trait Navigator: Send + Sync {
    fn current_path(&self) -> String;

    fn push(&self, path: &str);
}

/// Navigator keeping its history in memory.
#[derive(Debug, Default)]
pub struct HistoryNavigator {
    history: Mutex<Vec<String>>,
}

impl HistoryNavigator {
    pub fn new(start: impl Into<String>) -> Self {
        Self {
            history: Mutex::new(vec![start.into()]),
        }
    }

    pub fn history(&self) -> Vec<String> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Navigator for HistoryNavigator {
    fn current_path(&self) -> String {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
            .unwrap_or_else(|| String::from("/"))
    }

    fn push(&self, path: &str) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_owned());
    }
}
