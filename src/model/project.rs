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

use crate::services::types::{DocId, DocRef};

use super::Record;

#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ProjectRecord {
    #[serde(skip)]
    pub id: DocId,

    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub title: String,

    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub description: String,

    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub image: String,

    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub link: String,

    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub technologies: Vec<String>,

    #[serde(rename = "usID", default, skip_serializing_if = "Option::is_none")]
    pub owner_ref: Option<DocRef>,
}

impl Record for ProjectRecord {
    fn set_id(&mut self, id: DocId) {
        self.id = id;
    }
}
