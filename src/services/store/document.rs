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

use std::cmp::Ordering;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{self as json, Value, json};

use crate::Result;
use crate::services::from_value;
use crate::services::types::{DocId, DocRef, Timestamp};

pub type Data = json::Map<String, Value>;

const SERVER_VALUE: &str = ".sv";

/// Placeholder the store replaces with its own clock on write.
pub fn server_timestamp() -> Value {
    json!({ ".sv": "timestamp" })
}

pub fn is_server_timestamp(value: &Value) -> bool {
    value
        .as_object()
        .and_then(|object| object.get(SERVER_VALUE))
        .and_then(Value::as_str)
        == Some("timestamp")
}

/// Replaces every server timestamp placeholder at the top level of `data`.
pub fn resolve_server_timestamps(data: &mut Data, now: Timestamp) {
    for value in data.values_mut() {
        if is_server_timestamp(value) {
            *value = Value::from(now.timestamp_millis());
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocId,

    #[serde(default)]
    pub data: Data,
}

impl Document {
    pub fn new(id: impl Into<DocId>, data: Data) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        from_value(Value::Object(self.data.clone()))
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }
}

/// State of a single document at one point of a live subscription.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub id: DocId,

    #[serde(default)]
    pub data: Option<Data>,
}

impl DocumentSnapshot {
    pub fn missing(id: impl Into<DocId>) -> Self {
        Self {
            id: id.into(),
            data: None,
        }
    }

    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    pub fn into_document(self) -> Option<Document> {
        let id = self.id;
        self.data.map(|data| Document { id, data })
    }
}

impl From<Document> for DocumentSnapshot {
    fn from(document: Document) -> Self {
        Self {
            id: document.id,
            data: Some(document.data),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Equality filter; the only operator the portfolio needs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    pub collection: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Filter>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by: Option<OrderBy>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl Query {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Filters on a reference field, stored as its `collection/id` path.
    pub fn where_ref(self, field: impl Into<String>, target: &DocRef) -> Self {
        self.where_eq(field, target.to_string())
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Documents lacking the order field never match an ordered query.
    pub fn matches(&self, document: &Document) -> bool {
        let ordered = self
            .order_by
            .as_ref()
            .is_none_or(|order| document.get(&order.field).is_some());

        ordered
            && self
                .filters
                .iter()
                .all(|filter| document.get(&filter.field) == Some(&filter.value))
    }

    /// Filters, sorts and truncates `documents` the way the store would.
    pub fn apply(&self, documents: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut matched = documents
            .into_iter()
            .filter(|document| self.matches(document))
            .collect::<Vec<_>>();

        if let Some(order) = &self.order_by {
            matched.sort_by(|a, b| {
                let ordering = compare_values(a.get(&order.field), b.get(&order.field));
                match order.direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                }
            });
        }

        if let Some(limit) = self.limit {
            matched.truncate(limit as usize);
        }

        matched
    }
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (Some(Value::Number(a)), Some(Value::Number(b))) => {
            let (a, b) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
            a.total_cmp(&b)
        }
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}
