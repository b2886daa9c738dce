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

use serde::{Deserialize, Serialize};
use serde_with::{DefaultOnNull, serde_as};

use crate::services::types::{DocId, Timestamp};

use super::Record;

/// Set at sign-up to `Inactive`; flipped by billing outside this client.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display)]
pub enum ProfileStatus {
    Inactive,
    #[default]
    #[serde(other)]
    Active,
}

#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct SocialLinks {
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub github: String,

    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub linkedin: String,

    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub twitter: String,

    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub website: String,

    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub facebook: String,

    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub instagram: String,
}

/// Profile stored under `users/{uid}`.
#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDocument {
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub username: String,

    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub name: String,

    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub about: String,

    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub email: String,

    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub status: ProfileStatus,

    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub avatar: String,

    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub location: String,

    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub title: String,

    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub phone: String,

    #[serde(flatten)]
    pub social: SocialLinks,

    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub technologies: Vec<String>,

    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub gallery_images: Vec<String>,

    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub cv_url: String,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub created_at: Option<Timestamp>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub updated_at: Option<Timestamp>,
}

impl ProfileDocument {
    pub fn is_inactive(&self) -> bool {
        self.status == ProfileStatus::Inactive
    }

    /// Public address of the portfolio, when a username is set.
    pub fn portfolio_path(&self) -> Option<String> {
        (!self.username.is_empty()).then(|| format!("/portfolio/{}", self.username))
    }
}

/// Entry of the active-user directory shown on the home page.
#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct UserSummary {
    #[serde(skip)]
    pub id: DocId,

    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub username: String,

    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub name: String,

    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub email: String,

    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub about: String,
}

impl Record for UserSummary {
    fn set_id(&mut self, id: DocId) {
        self.id = id;
    }
}
