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

use tracing::error;

use crate::Result;
use crate::model::{AchievementDate, AchievementRecord};
use crate::services::blob::BlobStore;
use crate::services::store::{Direction, ProfileStore, Query, Subscription, server_timestamp};
use crate::services::types::{DocId, DocRef, collection};

use super::{LoadingFlag, Sections, USER_REF_NOT_FOUND, live_list, to_data};

const FIELDS_REQUIRED: &str = "Please fill in all fields";
const ID_NOT_FOUND: &str = "Achievement ID not found";
const REGISTERED: &str = "Achievement registered successfully!";
const UPDATED: &str = "Achievement updated successfully!";
const DELETED: &str = "Achievement deleted successfully!";
const SAVE_FAILED: &str = "Failed to save achievement";
const DELETE_FAILED: &str = "Failed to delete achievement";

/// Editable fields of an achievement; `date` is a `YYYY-MM-DD` input value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AchievementForm {
    pub title: String,
    pub description: String,
    pub date: String,
}

impl From<&AchievementRecord> for AchievementForm {
    fn from(record: &AchievementRecord) -> Self {
        Self {
            title: record.title.clone(),
            description: record.description.clone(),
            date: record
                .date
                .as_ref()
                .map(AchievementDate::input_value)
                .unwrap_or_default(),
        }
    }
}

pub struct Achievements<S, B> {
    sections: Sections<S, B>,
    loading: LoadingFlag,
}

impl<S: ProfileStore, B: BlobStore> Achievements<S, B> {
    pub(crate) fn new(sections: Sections<S, B>) -> Self {
        Self {
            sections,
            loading: LoadingFlag::new(),
        }
    }

    pub fn loading(&self) -> &LoadingFlag {
        &self.loading
    }

    /// Achievements of `owner`, newest first.
    pub fn list(&self, owner: &DocRef) -> Subscription<Vec<AchievementRecord>> {
        let query = Query::new(collection::achievements)
            .where_ref(super::OWNER_FIELD, owner)
            .order_by("date", Direction::Desc);

        live_list(&*self.sections.store, &self.sections.alerts, &query)
    }

    pub async fn create(&self, owner: Option<&DocRef>, form: AchievementForm) -> Option<DocId> {
        let alerts = &self.sections.alerts;

        let record = match validate(owner, &form) {
            Ok(record) => record,
            Err(message) => {
                alerts.danger(message);
                return None;
            }
        };

        let _loading = self.loading.hold();

        match self.write(None, record).await {
            Ok(id) => {
                alerts.success(REGISTERED);
                Some(id)
            }
            Err(error) => {
                error!(%error, "achievement save failed");
                alerts.danger(SAVE_FAILED);
                None
            }
        }
    }

    pub async fn update(&self, owner: Option<&DocRef>, id: &str, form: AchievementForm) -> bool {
        let alerts = &self.sections.alerts;

        let record = match validate(owner, &form) {
            Ok(_) if id.is_empty() => {
                alerts.danger(ID_NOT_FOUND);
                return false;
            }
            Ok(record) => record,
            Err(message) => {
                alerts.danger(message);
                return false;
            }
        };

        let _loading = self.loading.hold();

        match self.write(Some(id), record).await {
            Ok(_) => {
                alerts.success(UPDATED);
                true
            }
            Err(error) => {
                error!(%id, %error, "achievement save failed");
                alerts.danger(SAVE_FAILED);
                false
            }
        }
    }

    pub async fn delete(&self, owner: Option<&DocRef>, id: &str) -> bool {
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

        match self
            .sections
            .store
            .delete(&DocRef::new(collection::achievements, id))
            .await
        {
            Ok(()) => {
                alerts.success(DELETED);
                true
            }
            Err(error) => {
                error!(%id, %error, "achievement delete failed");
                alerts.danger(DELETE_FAILED);
                false
            }
        }
    }

    async fn write(&self, id: Option<&str>, record: AchievementRecord) -> Result<DocId> {
        let mut data = to_data(&record)?;
        data.insert("updatedAt".into(), server_timestamp());

        let store = &self.sections.store;

        match id {
            Some(id) => {
                store
                    .update(&DocRef::new(collection::achievements, id), data)
                    .await?;
                Ok(id.to_owned())
            }
            None => {
                data.insert("createdAt".into(), server_timestamp());
                store.create(collection::achievements, data).await
            }
        }
    }
}

fn validate(
    owner: Option<&DocRef>,
    form: &AchievementForm,
) -> std::result::Result<AchievementRecord, &'static str> {
    let owner = owner.ok_or(USER_REF_NOT_FOUND)?;

    if [&form.title, &form.description, &form.date]
        .iter()
        .any(|field| field.trim().is_empty())
    {
        return Err(FIELDS_REQUIRED);
    }

    let date = AchievementDate::parse_input(&form.date).map_err(|_| SAVE_FAILED)?;

    Ok(AchievementRecord {
        id: DocId::new(),
        title: form.title.clone(),
        description: form.description.clone(),
        date: Some(date),
        owner_ref: Some(owner.clone()),
    })
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::alert::AlertKind;
    use crate::controllers::testing::{only_alert, sections};

    fn form(title: &str, date: &str) -> AchievementForm {
        AchievementForm {
            title: title.to_owned(),
            description: "Won it".to_owned(),
            date: date.to_owned(),
        }
    }

    #[tokio::test]
    async fn incomplete_or_malformed_input_is_rejected_locally() {
        let (store, _blobs, sections) = sections();
        let achievements = sections.achievements();
        let owner = DocRef::user("U1");

        assert!(
            achievements
                .create(Some(&owner), form("Award", ""))
                .await
                .is_none()
        );
        assert_eq!(
            only_alert(sections.alerts()),
            (AlertKind::Danger, FIELDS_REQUIRED.to_owned())
        );

        assert!(
            achievements
                .create(Some(&owner), form("Award", "March 5"))
                .await
                .is_none()
        );
        assert!(
            achievements
                .create(None, form("Award", "2024-03-05"))
                .await
                .is_none()
        );
        assert!(!achievements.delete(Some(&owner), "").await);

        assert_eq!(store.calls(), 0);
        assert_eq!(sections.alerts().alerts().len(), 4);
    }

    #[tokio::test]
    async fn dates_are_stored_as_timestamps() {
        let (store, _blobs, sections) = sections();
        let achievements = sections.achievements();

        let id = achievements
            .create(Some(&DocRef::user("U1")), form("Award", "2024-03-05"))
            .await
            .unwrap();

        let data = store
            .document(&DocRef::new(collection::achievements, id))
            .unwrap();
        assert_eq!(data["date"], 1_709_596_800_000i64);
        assert_eq!(data["usID"], "users/U1");
        assert!(data["createdAt"].is_i64());
    }

    #[tokio::test]
    async fn list_is_newest_first_and_round_trips_to_form() {
        let (_store, _blobs, sections) = sections();
        let achievements = sections.achievements();
        let owner = DocRef::user("U1");

        achievements
            .create(Some(&owner), form("First", "2020-01-01"))
            .await
            .unwrap();
        let latest = achievements
            .create(Some(&owner), form("Latest", "2024-03-05"))
            .await
            .unwrap();

        let records = achievements.list(&owner).next().await.unwrap().unwrap();
        assert_eq!(records[0].id, latest);
        assert_eq!(records[0].display_date(), "March 05, 2024");
        assert_eq!(records[1].title, "First");

        let edit = AchievementForm::from(&records[0]);
        assert_eq!(edit.date, "2024-03-05");

        assert!(achievements.update(Some(&owner), &latest, edit).await);
        assert!(achievements.delete(Some(&owner), &latest).await);
    }
}
