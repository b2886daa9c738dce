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

use futures::future::join_all;
use serde_json::json;
use tracing::error;

use crate::Result;
use crate::services::blob::{BlobStore, Upload};
use crate::services::store::{ProfileStore, server_timestamp};
use crate::services::types::DocRef;

use super::{LoadingFlag, Sections, USER_REF_NOT_FOUND, to_data};

pub const MAX_GALLERY_IMAGES: usize = 10;

const TOO_MANY: &str = "Maximum 10 images allowed in gallery";
const UPDATED: &str = "Gallery updated successfully!";
const UPDATE_FAILED: &str = "Failed to update gallery";

/// Image gallery kept on the profile document.
pub struct Gallery<S, B> {
    sections: Sections<S, B>,
    loading: LoadingFlag,
}

impl<S: ProfileStore, B: BlobStore> Gallery<S, B> {
    pub(crate) fn new(sections: Sections<S, B>) -> Self {
        Self {
            sections,
            loading: LoadingFlag::new(),
        }
    }

    pub fn loading(&self) -> &LoadingFlag {
        &self.loading
    }

    /// Stores `images` plus the optional new upload as the gallery.
    ///
    /// Blobs listed in `deleted` are removed first; failing to remove one
    /// does not fail the update.
    pub async fn update(
        &self,
        owner: Option<&DocRef>,
        images: Vec<String>,
        image: Option<Upload>,
        deleted: &[String],
    ) -> bool {
        let alerts = &self.sections.alerts;

        let Some(owner) = owner else {
            alerts.danger(USER_REF_NOT_FOUND);
            return false;
        };

        if images.len() + usize::from(image.is_some()) > MAX_GALLERY_IMAGES {
            alerts.danger(TOO_MANY);
            return false;
        }

        let _loading = self.loading.hold();

        join_all(deleted.iter().map(|url| self.sections.discard(url))).await;

        match self.write(owner, images, image).await {
            Ok(()) => {
                alerts.success(UPDATED);
                true
            }
            Err(error) => {
                error!(%owner, %error, "gallery update failed");
                alerts.danger(UPDATE_FAILED);
                false
            }
        }
    }

    async fn write(
        &self,
        owner: &DocRef,
        mut images: Vec<String>,
        image: Option<Upload>,
    ) -> Result<()> {
        if let Some(upload) = image {
            let url = self.sections.upload(owner, "gallery", &upload).await?;
            images.push(url.into());
        }

        let data = to_data(&json!({
            "galleryImages": images,
            "updatedAt": server_timestamp(),
        }))?;

        self.sections.store.update(owner, data).await
    }
}
