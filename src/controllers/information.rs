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
use tracing::error;

use crate::Result;
use crate::model::{ProfileDocument, SocialLinks};
use crate::services::blob::{BlobStore, Upload};
use crate::services::store::{ProfileStore, server_timestamp};
use crate::services::types::DocRef;

use super::{LoadingFlag, Sections, USER_REF_NOT_FOUND, is_url, to_data};

const FIELDS_REQUIRED: &str = "Name and email are required";
const UPDATED: &str = "Information updated successfully!";
const UPDATE_FAILED: &str = "Failed to update information";

/// Editable profile fields.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InformationForm {
    pub name: String,
    pub email: String,
    pub title: String,
    pub location: String,
    pub phone: String,
    pub about: String,
    pub avatar: String,
    pub cv_url: String,

    #[serde(flatten)]
    pub social: SocialLinks,

    pub technologies: Vec<String>,
}

impl InformationForm {
    /// Adds a trimmed technology; false when blank or already listed.
    pub fn add_technology(&mut self, technology: &str) -> bool {
        let technology = technology.trim();

        if technology.is_empty() || self.technologies.iter().any(|t| t == technology) {
            return false;
        }

        self.technologies.push(technology.to_owned());
        true
    }

    pub fn remove_technology(&mut self, technology: &str) {
        self.technologies.retain(|t| t != technology);
    }

    fn normalize_technologies(&mut self) {
        let technologies = std::mem::take(&mut self.technologies);
        for technology in &technologies {
            self.add_technology(technology);
        }
    }
}

impl From<&ProfileDocument> for InformationForm {
    fn from(profile: &ProfileDocument) -> Self {
        Self {
            name: profile.name.clone(),
            email: profile.email.clone(),
            title: profile.title.clone(),
            location: profile.location.clone(),
            phone: profile.phone.clone(),
            about: profile.about.clone(),
            avatar: profile.avatar.clone(),
            cv_url: profile.cv_url.clone(),
            social: profile.social.clone(),
            technologies: profile.technologies.clone(),
        }
    }
}

/// Personal details on the profile document, with avatar and CV uploads.
pub struct Information<S, B> {
    sections: Sections<S, B>,
    loading: LoadingFlag,
}

impl<S: ProfileStore, B: BlobStore> Information<S, B> {
    pub(crate) fn new(sections: Sections<S, B>) -> Self {
        Self {
            sections,
            loading: LoadingFlag::new(),
        }
    }

    pub fn loading(&self) -> &LoadingFlag {
        &self.loading
    }

    pub async fn update(
        &self,
        owner: Option<&DocRef>,
        form: InformationForm,
        avatar: Option<Upload>,
        cv: Option<Upload>,
    ) -> bool {
        let alerts = &self.sections.alerts;

        let Some(owner) = owner else {
            alerts.danger(USER_REF_NOT_FOUND);
            return false;
        };

        if form.name.trim().is_empty() || form.email.trim().is_empty() {
            alerts.danger(FIELDS_REQUIRED);
            return false;
        }

        let _loading = self.loading.hold();

        match self.write(owner, form, avatar, cv).await {
            Ok(()) => {
                alerts.success(UPDATED);
                true
            }
            Err(error) => {
                error!(%owner, %error, "information update failed");
                alerts.danger(UPDATE_FAILED);
                false
            }
        }
    }

    async fn write(
        &self,
        owner: &DocRef,
        mut form: InformationForm,
        avatar: Option<Upload>,
        cv: Option<Upload>,
    ) -> Result<()> {
        form.normalize_technologies();
        let mut data = to_data(&form)?;

        for (field, folder, upload, current) in [
            ("avatar", "avatar", avatar, &form.avatar),
            ("cvUrl", "cv", cv, &form.cv_url),
        ] {
            match upload {
                Some(upload) => {
                    let url = self.sections.upload(owner, folder, &upload).await?;
                    data.insert(field.into(), Value::String(url.into()));
                }
                None if !current.is_empty() && !is_url(current) => {
                    data.remove(field);
                }
                None => {}
            }
        }

        data.insert("updatedAt".into(), server_timestamp());

        self.sections.store.update(owner, data).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::alert::AlertKind;
    use crate::controllers::testing::{only_alert, sections};
    use crate::services::store::Data;

    fn stored() -> Data {
        match json!({
            "username": "bob",
            "name": "Bob",
            "email": "bob@example.com",
            "avatar": "https://cdn/bob.png",
            "cvUrl": "https://cdn/bob.pdf",
            "status": "Active",
        }) {
            Value::Object(data) => data,
            _ => unreachable!(),
        }
    }

    #[test]
    fn technologies_are_trimmed_and_unique() {
        let mut form = InformationForm::default();

        assert!(form.add_technology(" Rust "));
        assert!(!form.add_technology("Rust"));
        assert!(!form.add_technology("   "));
        assert!(form.add_technology("Go"));
        assert_eq!(form.technologies, ["Rust", "Go"]);

        form.remove_technology("Rust");
        assert_eq!(form.technologies, ["Go"]);
    }

    #[tokio::test]
    async fn name_and_email_are_required() {
        let (store, blobs, sections) = sections();
        let information = sections.information();

        let form = InformationForm {
            name: "Bob".to_owned(),
            ..InformationForm::default()
        };

        assert!(
            !information
                .update(
                    Some(&DocRef::user("U1")),
                    form,
                    Some(Upload::new("me.png", "png")),
                    None
                )
                .await
        );
        assert_eq!(
            only_alert(sections.alerts()),
            (AlertKind::Danger, FIELDS_REQUIRED.to_owned())
        );
        assert_eq!(store.calls() + blobs.calls(), 0);
    }

    #[tokio::test]
    async fn uploads_replace_links_and_stale_values_are_dropped() {
        let (store, _blobs, sections) = sections();
        let information = sections.information();
        let owner = DocRef::user("U1");
        store.insert(&owner, stored());

        let profile: ProfileDocument = serde_json::from_value(Value::Object(stored())).unwrap();
        let mut form = InformationForm::from(&profile);
        form.title = "Engineer".to_owned();
        form.cv_url = "resume.pdf".to_owned();
        form.technologies = vec![" Rust".to_owned(), "Rust ".to_owned(), "Go".to_owned()];

        assert!(
            information
                .update(Some(&owner), form, Some(Upload::new("new.png", "png")), None)
                .await
        );
        assert_eq!(
            only_alert(sections.alerts()),
            (AlertKind::Success, UPDATED.to_owned())
        );

        let data = store.document(&owner).unwrap();
        assert_eq!(data["title"], "Engineer");
        assert_eq!(data["cvUrl"], "https://cdn/bob.pdf");
        assert_eq!(data["technologies"], json!(["Rust", "Go"]));
        assert_eq!(data["username"], "bob");
        assert!(
            data["avatar"]
                .as_str()
                .unwrap()
                .starts_with("memory://blobs/users/U1/avatar/")
        );
    }
}
