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

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use crate::runtime::{sleep, tokio};
use crate::services::types::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AlertKind {
    Success,
    Danger,
    Warning,
}

/// Creation time in milliseconds plus a per-channel sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AlertId {
    millis: i64,
    seq: u32,
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.millis, self.seq)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: AlertId,
    pub kind: AlertKind,
    pub message: String,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: Timestamp,
}

struct Inner {
    ttl: Duration,
    alerts: watch::Sender<Vec<Alert>>,
    seq: AtomicU32,
}

impl Inner {
    fn dismiss(&self, id: AlertId) -> bool {
        self.alerts.send_if_modified(|alerts| {
            let before = alerts.len();
            alerts.retain(|alert| alert.id != id);
            alerts.len() != before
        })
    }
}

/// Ephemeral notification queue shared by the resolver and the controllers.
///
/// Alerts are kept in insertion order and removed after the configured
/// time to live or on [`AlertChannel::dismiss`], whichever comes first.
/// Pushing requires a running runtime for the expiry timer.
#[derive(Clone)]
pub struct AlertChannel {
    inner: Arc<Inner>,
}

impl fmt::Debug for AlertChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlertChannel")
            .field("ttl", &self.inner.ttl)
            .field("alerts", &*self.inner.alerts.borrow())
            .finish()
    }
}

impl AlertChannel {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                ttl,
                alerts: watch::channel(Vec::new()).0,
                seq: AtomicU32::new(0),
            }),
        }
    }

    pub fn push(&self, kind: AlertKind, message: impl Into<String>) -> AlertId {
        let created_at = chrono::Utc::now();
        let id = AlertId {
            millis: created_at.timestamp_millis(),
            seq: self.inner.seq.fetch_add(1, Ordering::Relaxed),
        };

        let alert = Alert {
            id,
            kind,
            message: message.into(),
            created_at,
        };

        debug!(%id, %kind, message = %alert.message, "alert");

        self.inner.alerts.send_modify(|alerts| alerts.push(alert));

        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        let ttl = self.inner.ttl;

        tokio::task::spawn(async move {
            sleep(ttl).await;

            if let Some(inner) = inner.upgrade() {
                inner.dismiss(id);
            }
        });

        id
    }

    pub fn success(&self, message: impl Into<String>) -> AlertId {
        self.push(AlertKind::Success, message)
    }

    pub fn danger(&self, message: impl Into<String>) -> AlertId {
        self.push(AlertKind::Danger, message)
    }

    pub fn warning(&self, message: impl Into<String>) -> AlertId {
        self.push(AlertKind::Warning, message)
    }

    /// Removes the alert; false when it is already gone.
    pub fn dismiss(&self, id: AlertId) -> bool {
        self.inner.dismiss(id)
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.inner.alerts.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Alert>> {
        self.inner.alerts.subscribe()
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }
}
