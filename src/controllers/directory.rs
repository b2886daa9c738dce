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

use std::sync::Arc;

use crate::alert::AlertChannel;
use crate::model::{ProfileStatus, UserSummary};
use crate::services::store::{Direction, ProfileStore, Query, Subscription};
use crate::services::types::collection;

use super::live_list;

/// Home page listing of active portfolios.
pub struct Directory<S> {
    store: Arc<S>,
    alerts: AlertChannel,
}

impl<S: ProfileStore> Directory<S> {
    pub fn new(store: Arc<S>, alerts: AlertChannel) -> Self {
        Self { store, alerts }
    }

    /// Active users ordered by name.
    pub fn active_users(&self) -> Subscription<Vec<UserSummary>> {
        let query = Query::new(collection::users)
            .where_eq("status", ProfileStatus::Active.to_string())
            .order_by("name", Direction::Asc);

        live_list(&*self.store, &self.alerts, &query)
    }
}
