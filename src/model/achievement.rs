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

use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_with::{DefaultOnNull, serde_as};

use crate::services::types::{DocId, DocRef, Timestamp};
use crate::{Error, Result};

use super::Record;

/// Stored as epoch milliseconds; older rows carry a preformatted string.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum AchievementDate {
    At(#[serde(with = "chrono::serde::ts_milliseconds")] Timestamp),
    Legacy(String),
}

impl AchievementDate {
    /// Parses a `YYYY-MM-DD` form value as midnight UTC.
    pub fn parse_input(input: &str) -> Result<Self> {
        let date = NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
            .map_err(|_| Error::Validation(format!("Invalid date: {input}")))?;

        Ok(Self::At(date.and_time(NaiveTime::MIN).and_utc()))
    }

    /// Value for a `YYYY-MM-DD` form input; empty for legacy strings.
    pub fn input_value(&self) -> String {
        match self {
            Self::At(at) => at.format("%Y-%m-%d").to_string(),
            Self::Legacy(_) => String::new(),
        }
    }
}

impl fmt::Display for AchievementDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::At(at) => write!(f, "{}", at.format("%B %d, %Y")),
            Self::Legacy(text) => f.write_str(text),
        }
    }
}

#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AchievementRecord {
    #[serde(skip)]
    pub id: DocId,

    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub title: String,

    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub date: Option<AchievementDate>,

    #[serde(rename = "usID", default, skip_serializing_if = "Option::is_none")]
    pub owner_ref: Option<DocRef>,
}

impl AchievementRecord {
    pub fn display_date(&self) -> String {
        self.date
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default()
    }
}

impl Record for AchievementRecord {
    fn set_id(&mut self, id: DocId) {
        self.id = id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dates_display_long_form() {
        let date = AchievementDate::parse_input("2024-03-05").unwrap();
        assert_eq!(date.to_string(), "March 05, 2024");
        assert_eq!(date.input_value(), "2024-03-05");

        assert!(AchievementDate::parse_input("05/03/2024").is_err());
    }

    #[test]
    fn legacy_string_dates_pass_through() {
        let record: AchievementRecord = serde_json::from_value(json!({
            "title": "Award",
            "description": "Won",
            "date": "Spring 2019",
            "usID": "users/U1",
        }))
        .unwrap();

        assert_eq!(record.display_date(), "Spring 2019");
        assert_eq!(record.owner_ref, Some(DocRef::user("U1")));

        let record: AchievementRecord = serde_json::from_value(json!({
            "date": 1_709_596_800_000i64,
        }))
        .unwrap();
        assert_eq!(record.display_date(), "March 05, 2024");
    }
}
