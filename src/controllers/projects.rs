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

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};

use crate::Result;
use crate::model::ProjectRecord;
use crate::services::blob::{BlobStore, Upload};
use crate::services::store::{Direction, ProfileStore, Query, Subscription, server_timestamp};
use crate::services::types::{DocId, DocRef, collection};

use super::{LoadingFlag, OWNER_FIELD, Sections, USER_REF_NOT_FOUND, is_url, live_list, to_data};

const FIELDS_REQUIRED: &str = "Title and description are required";
const ID_NOT_FOUND: &str = "Project ID not found";
const REGISTERED: &str = "Project registered successfully!";
const UPDATED: &str = "Project updated successfully!";
const DELETED: &str = "Project deleted successfully!";
const SAVE_FAILED: &str = "Failed to save project";
const DELETE_FAILED: &str = "Failed to delete project";

/// Editable fields of a project.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectForm {
    pub title: String,
    pub description: String,
    pub image: String,
    pub link: String,
    pub technologies: Vec<String>,
}

impl From<&ProjectRecord> for ProjectForm {
    fn from(record: &ProjectRecord) -> Self {
        Self {
            title: record.title.clone(),
            description: record.description.clone(),
            image: record.image.clone(),
            link: record.link.clone(),
            technologies: record.technologies.clone(),
        }
    }
}

pub struct Projects<S, B> {
    sections: Sections<S, B>,
    loading: LoadingFlag,
}

impl<S: ProfileStore, B: BlobStore> Projects<S, B> {
    pub(crate) fn new(sections: Sections<S, B>) -> Self {
        Self {
            sections,
            loading: LoadingFlag::new(),
        }
    }

    pub fn loading(&self) -> &LoadingFlag {
        &self.loading
    }

    /// Projects of `owner`, ordered by title.
    pub fn list(&self, owner: &DocRef) -> Subscription<Vec<ProjectRecord>> {
        let query = Query::new(collection::projects)
            .where_ref(OWNER_FIELD, owner)
            .order_by("title", Direction::Asc);

        live_list(&*self.sections.store, &self.sections.alerts, &query)
    }

    pub async fn create(
        &self,
        owner: Option<&DocRef>,
        form: ProjectForm,
        image: Option<Upload>,
    ) -> Option<DocId> {
        let alerts = &self.sections.alerts;

        let owner = match validate(owner, &form) {
            Ok(owner) => owner,
            Err(message) => {
                alerts.danger(message);
                return None;
            }
        };

        let _loading = self.loading.hold();

        match self.write(owner, None, form, image).await {
            Ok(id) => {
                debug!(%id, "project created");
                alerts.success(REGISTERED);
                Some(id)
            }
            Err(error) => {
                error!(%error, "project save failed");
                alerts.danger(SAVE_FAILED);
                None
            }
        }
    }

    pub async fn update(
        &self,
        owner: Option<&DocRef>,
        id: &str,
        form: ProjectForm,
        image: Option<Upload>,
    ) -> bool {
        let alerts = &self.sections.alerts;

        let owner = match validate(owner, &form) {
            Ok(_) if id.is_empty() => {
                alerts.danger(ID_NOT_FOUND);
                return false;
            }
            Ok(owner) => owner,
            Err(message) => {
                alerts.danger(message);
                return false;
            }
        };

        let _loading = self.loading.hold();

        match self.write(owner, Some(id), form, image).await {
            Ok(_) => {
                alerts.success(UPDATED);
                true
            }
            Err(error) => {
                error!(%id, %error, "project save failed");
                alerts.danger(SAVE_FAILED);
                false
            }
        }
    }

    /// Deletes the project and, best effort, its uploaded image.
    pub async fn delete(&self, owner: Option<&DocRef>, id: &str, image: Option<&str>) -> bool {
        let alerts = &self.sections.alerts;

        if owner.is_none() {
            alerts.danger(USER_REF_NOT_FOUND);
            return false;
        }

        if id.is_empty() {
            alerts.danger(ID_NOT_FOUND);
            return false;
        }

        let _loading = self.loading.hold();

        if let Some(url) = image.filter(|image| is_url(image)) {
            self.sections.discard(url).await;
        }

        match self
            .sections
            .store
            .delete(&DocRef::new(collection::projects, id))
            .await
        {
            Ok(()) => {
                alerts.success(DELETED);
                true
            }
            Err(error) => {
                error!(%id, %error, "project delete failed");
                alerts.danger(DELETE_FAILED);
                false
            }
        }
    }

    async fn write(
        &self,
        owner: &DocRef,
        id: Option<&str>,
        form: ProjectForm,
        image: Option<Upload>,
    ) -> Result<DocId> {
        let mut data = to_data(&form)?;

        match image {
            Some(upload) => {
                let url = self.sections.upload(owner, "projects", &upload).await?;
                data.insert("image".into(), Value::String(url.into()));
            }
            None if !form.image.is_empty() && !is_url(&form.image) => {
                data.remove("image");
            }
            None => {}
        }

        data.insert(OWNER_FIELD.into(), Value::String(owner.to_string()));
        data.insert("updatedAt".into(), server_timestamp());

        let store = &self.sections.store;

        match id {
            Some(id) => {
                store
                    .update(&DocRef::new(collection::projects, id), data)
                    .await?;
                Ok(id.to_owned())
            }
            None => {
                data.insert("createdAt".into(), server_timestamp());
                store.create(collection::projects, data).await
            }
        }
    }
}

fn validate<'a>(
    owner: Option<&'a DocRef>,
    form: &ProjectForm,
) -> std::result::Result<&'a DocRef, &'static str> {
    let owner = owner.ok_or(USER_REF_NOT_FOUND)?;

    if form.title.trim().is_empty() || form.description.trim().is_empty() {
        return Err(FIELDS_REQUIRED);
    }

    Ok(owner)
}
