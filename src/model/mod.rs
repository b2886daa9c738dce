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

use serde::de::DeserializeOwned;

use crate::Result;
use crate::services::store::Document;
use crate::services::types::DocId;

mod achievement;
mod profile;
mod project;

pub use achievement::{AchievementDate, AchievementRecord};
pub use profile::{ProfileDocument, ProfileStatus, SocialLinks, UserSummary};
pub use project::ProjectRecord;

/// Row of a collection whose id lives outside its data.
pub trait Record: DeserializeOwned {
    fn set_id(&mut self, id: DocId);

    fn from_document(document: &Document) -> Result<Self> {
        let mut record = document.decode::<Self>()?;
        record.set_id(document.id.clone());
        Ok(record)
    }
}
