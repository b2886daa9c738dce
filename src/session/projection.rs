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

use serde_json::Value;

use crate::model::ProfileDocument;
use crate::services::from_value;
use crate::services::store::DocumentSnapshot;
use crate::services::types::{Credential, Uid};

/// Profile as shown to the current viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub id: Uid,
    pub is_owner: bool,
    pub document: ProfileDocument,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Missing,
    Disabled,
    Visible(Profile),
    Unreadable(String),
}

/// Classifies one snapshot of a subscribed profile document.
///
/// Ownership requires both that the document was reached through the
/// viewer's own credential and that the credential names this document.
pub fn project(
    snapshot: DocumentSnapshot,
    credential: Option<&Credential>,
    via_own_credential: bool,
) -> Projection {
    let Some(data) = snapshot.data else {
        return Projection::Missing;
    };

    let document = match from_value::<ProfileDocument>(Value::Object(data)) {
        Ok(document) => document,
        Err(error) => return Projection::Unreadable(error.to_string()),
    };

    if document.is_inactive() {
        return Projection::Disabled;
    }

    let is_owner =
        via_own_credential && credential.is_some_and(|credential| credential.uid == snapshot.id);

    Projection::Visible(Profile {
        id: snapshot.id,
        is_owner,
        document,
    })
}
