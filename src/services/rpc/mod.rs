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

//! Frames spoken on the store's live channel.

use crate::services::Status;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(untagged, rename_all = "camelCase")]
pub enum ReqId {
    Str(String),
    Num(i32),
}

impl From<String> for ReqId {
    fn from(s: String) -> Self {
        ReqId::Str(s)
    }
}

impl From<i32> for ReqId {
    fn from(i: i32) -> Self {
        ReqId::Num(i)
    }
}

#[derive(Serialize, Deserialize, Default, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Response<R> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<R>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<ReqId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Status>,
    /// Set by the server when a listen target is closed on its side
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminate: Option<bool>,
}

impl<R> Response<R> {
    pub fn into_result(self) -> Result<Option<R>, Status> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.result),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Request<P> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<ReqId>,
    pub method: String,
    pub params: Vec<P>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct HelloRequest {
    #[serde(flatten)]
    pub request: Request<()>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct HelloResponse {
    #[serde(flatten)]
    pub response: Response<String>,
    pub server_version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_frame_becomes_status() {
        let frame: Response<serde_json::Value> = serde_json::from_value(json!({
            "id": 3,
            "error": { "severity": "ERROR", "code": "permission-denied" }
        }))
        .unwrap();

        assert_eq!(frame.id, Some(ReqId::Num(3)));
        let status = frame.into_result().unwrap_err();
        assert_eq!(status.code, "permission-denied");
    }
}
