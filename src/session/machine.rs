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

use tracing::{debug, trace};

use super::projection::{Profile, Projection, project};
use super::route::Route;
use crate::alert::AlertKind;
use crate::services::store::DocumentSnapshot;
use crate::services::types::{Credential, DocId, DocRef, Uid};

pub const USER_NOT_FOUND: &str = "User not found.";
pub const DOCUMENT_NOT_FOUND: &str = "User document not found.";
pub const BILLING_LAPSED: &str = "Firebase free trial has ended. Your portfolio is temporarily disabled until the Firebase subscription is reactivated.";

const HOME: &str = "/";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    ResolvingByCredential,
    ResolvingByUsername,
    Subscribed {
        uid: Uid,
        via_own_credential: bool,
    },
    NotFound,
    Disabled,
    Error,
}

/// Everything the view layer needs from the resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub credential: Option<Credential>,
    pub profile: Option<Profile>,
    pub profile_ref: Option<DocRef>,
    pub loading: bool,
    pub state: SessionState,

    /// Where the viewer should be; applied through `reconcile`.
    pub redirect: Option<String>,
}

impl Default for SessionView {
    fn default() -> Self {
        Self {
            credential: None,
            profile: None,
            profile_ref: None,
            loading: true,
            state: SessionState::Idle,
            redirect: None,
        }
    }
}

impl SessionView {
    pub fn is_owner(&self) -> bool {
        self.profile.as_ref().is_some_and(|profile| profile.is_owner)
    }
}

/// Side effects requested by the machine, executed by its driver in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    CancelSubscription,
    CancelLookup,
    Subscribe { uid: Uid, via_own_credential: bool },
    Lookup { generation: u64, username: String },
    Alert { kind: AlertKind, message: String },
}

/// Resolution logic of the session, free of any I/O.
///
/// Every resolution bumps the generation; lookup results carrying an older
/// generation are dropped.
#[derive(Debug)]
pub struct SessionMachine {
    reactivation_route: String,
    route: Route,
    generation: u64,
    subscribed: Option<(Uid, bool)>,
    lookup_pending: bool,
    view: SessionView,
}

impl SessionMachine {
    pub fn new(reactivation_route: impl Into<String>, route: Route) -> Self {
        Self {
            reactivation_route: reactivation_route.into(),
            route,
            generation: 0,
            subscribed: None,
            lookup_pending: false,
            view: SessionView::default(),
        }
    }

    pub fn view(&self) -> &SessionView {
        &self.view
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_subscription(&self) -> bool {
        self.subscribed.is_some()
    }

    fn teardown(&mut self, effects: &mut Vec<Effect>) {
        if self.subscribed.take().is_some() {
            effects.push(Effect::CancelSubscription);
        }

        if std::mem::take(&mut self.lookup_pending) {
            effects.push(Effect::CancelLookup);
        }
    }

    fn subscribe(&mut self, uid: Uid, via_own_credential: bool, effects: &mut Vec<Effect>) {
        self.view.profile_ref = Some(DocRef::user(uid.clone()));
        self.view.state = SessionState::Subscribed {
            uid: uid.clone(),
            via_own_credential,
        };
        self.subscribed = Some((uid.clone(), via_own_credential));

        effects.push(Effect::Subscribe {
            uid,
            via_own_credential,
        });
    }

    fn fail(&mut self, state: SessionState, message: String, effects: &mut Vec<Effect>) {
        self.view.state = state;
        self.view.profile = None;
        self.view.redirect = Some(String::from(HOME));
        self.view.loading = false;

        effects.push(Effect::Alert {
            kind: AlertKind::Danger,
            message,
        });
    }

    fn resolve(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.teardown(&mut effects);

        self.generation += 1;
        self.view.profile = None;
        self.view.profile_ref = None;
        self.view.redirect = None;
        self.view.loading = true;

        if let Some(credential) = &self.view.credential {
            let uid = credential.uid.clone();
            debug!(%uid, generation = self.generation, "resolving by credential");

            self.view.state = SessionState::ResolvingByCredential;
            self.subscribe(uid, true, &mut effects);
        } else if let Some(username) = self.route.username() {
            debug!(%username, generation = self.generation, "resolving by username");

            self.view.state = SessionState::ResolvingByUsername;
            self.lookup_pending = true;
            effects.push(Effect::Lookup {
                generation: self.generation,
                username: username.to_owned(),
            });
        } else {
            trace!(path = %self.route.path(), "nothing to resolve");

            self.view.state = SessionState::Idle;
            self.view.loading = false;
            if self.route.path() != self.reactivation_route {
                self.view.redirect = Some(String::from(HOME));
            }
        }

        effects
    }

    /// New identity state; always starts a fresh resolution.
    pub fn credential_changed(&mut self, credential: Option<Credential>) -> Vec<Effect> {
        self.view.credential = credential;
        self.resolve()
    }

    /// Location change; resolution reruns only when the username differs.
    pub fn route_changed(&mut self, route: Route) -> Vec<Effect> {
        let rerun = route.username() != self.route.username();
        self.route = route;

        if rerun { self.resolve() } else { Vec::new() }
    }

    pub fn lookup_finished(
        &mut self,
        generation: u64,
        outcome: Result<Option<DocId>, String>,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();

        if generation != self.generation || !self.lookup_pending {
            trace!(generation, current = self.generation, "stale lookup dropped");
            return effects;
        }

        self.lookup_pending = false;

        match outcome {
            Ok(Some(uid)) => self.subscribe(uid, false, &mut effects),
            Ok(None) => self.fail(
                SessionState::NotFound,
                String::from(USER_NOT_FOUND),
                &mut effects,
            ),
            Err(message) => self.fail(
                SessionState::Error,
                format!("Error fetching user by username: {message}"),
                &mut effects,
            ),
        }

        effects
    }

    /// One item of the open profile subscription.
    pub fn snapshot(&mut self, item: Result<DocumentSnapshot, String>) -> Vec<Effect> {
        let mut effects = Vec::new();

        let Some((uid, via_own_credential)) = self.subscribed.clone() else {
            trace!("snapshot without subscription dropped");
            return effects;
        };

        let snapshot = match item {
            Ok(snapshot) if snapshot.id == uid => snapshot,
            Ok(snapshot) => {
                trace!(id = %snapshot.id, %uid, "snapshot of another document dropped");
                return effects;
            }
            Err(message) => {
                self.fail(
                    SessionState::Error,
                    format!("Error fetching user details: {message}"),
                    &mut effects,
                );
                return effects;
            }
        };

        self.view.loading = false;

        match project(snapshot, self.view.credential.as_ref(), via_own_credential) {
            Projection::Missing => {
                self.view.profile = None;
                self.view.state = SessionState::NotFound;
                effects.push(Effect::Alert {
                    kind: AlertKind::Danger,
                    message: String::from(DOCUMENT_NOT_FOUND),
                });
            }
            Projection::Disabled => {
                self.view.profile = None;
                self.view.state = SessionState::Disabled;
                self.view.redirect = Some(self.reactivation_route.clone());
                effects.push(Effect::Alert {
                    kind: AlertKind::Danger,
                    message: String::from(BILLING_LAPSED),
                });
            }
            Projection::Visible(profile) => {
                self.view.redirect = profile.document.portfolio_path();
                self.view.profile = Some(profile);
                self.view.state = SessionState::Subscribed {
                    uid,
                    via_own_credential,
                };
            }
            Projection::Unreadable(message) => self.fail(
                SessionState::Error,
                format!("Error fetching user details: {message}"),
                &mut effects,
            ),
        }

        effects
    }

    /// Teardown on unmount; later inputs are treated as stale.
    pub fn unmount(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.teardown(&mut effects);
        self.generation += 1;
        effects
    }
}
