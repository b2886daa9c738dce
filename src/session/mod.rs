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

use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, trace, warn};

use crate::alert::AlertChannel;
use crate::config::Config;
use crate::runtime::tokio;
use crate::services::identity::IdentityProvider;
use crate::services::store::{DocumentSnapshot, ProfileStore, Query, Subscription};
use crate::services::types::{Credential, DocId, DocRef, collection};
use crate::{Error, Result};

mod machine;
mod projection;
mod route;

pub use machine::{
    BILLING_LAPSED, DOCUMENT_NOT_FOUND, Effect, SessionMachine, SessionState, SessionView,
    USER_NOT_FOUND,
};
pub use projection::{Profile, Projection, project};
pub use route::{DialogMode, HistoryNavigator, Navigator, Route, reconcile};

enum Command {
    Navigate(Route),
    Unmount,
}

type LookupOutcome = (u64, std::result::Result<Option<DocId>, String>);

/// Mounts resolvers over a shared identity provider and store.
pub struct SessionResolver<I, S> {
    identity: Arc<I>,
    store: Arc<S>,
    alerts: AlertChannel,
    reactivation_route: String,
}

impl<I, S> Clone for SessionResolver<I, S> {
    fn clone(&self) -> Self {
        Self {
            identity: self.identity.clone(),
            store: self.store.clone(),
            alerts: self.alerts.clone(),
            reactivation_route: self.reactivation_route.clone(),
        }
    }
}

impl<I: IdentityProvider, S: ProfileStore> SessionResolver<I, S> {
    pub fn new(identity: Arc<I>, store: Arc<S>, alerts: AlertChannel, config: &Config) -> Self {
        Self {
            identity,
            store,
            alerts,
            reactivation_route: config.reactivation_route.clone(),
        }
    }

    /// Starts resolving for `route`; the returned handle owns the session.
    pub fn mount(&self, route: Route) -> SessionHandle {
        let machine = SessionMachine::new(self.reactivation_route.clone(), route);
        let (view_tx, view_rx) = watch::channel(machine.view().clone());
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let driver = Driver {
            machine,
            store: self.store.clone(),
            alerts: self.alerts.clone(),
            view_tx,
            subscription: None,
            lookup: None,
        };

        let task = tokio::task::spawn(driver.run(self.identity.credential_changes(), cmd_rx));

        SessionHandle {
            view: view_rx,
            commands: cmd_tx,
            task: Some(task),
        }
    }
}

struct Driver<S> {
    machine: SessionMachine,
    store: Arc<S>,
    alerts: AlertChannel,
    view_tx: watch::Sender<SessionView>,
    subscription: Option<Subscription<DocumentSnapshot>>,
    lookup: Option<JoinHandle<()>>,
}

async fn next_snapshot(
    subscription: &mut Option<Subscription<DocumentSnapshot>>,
) -> Option<Result<DocumentSnapshot>> {
    match subscription {
        Some(subscription) => subscription.next().await,
        None => futures::future::pending().await,
    }
}

impl<S: ProfileStore> Driver<S> {
    async fn run(
        mut self,
        mut credentials: WatchStream<Option<Credential>>,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) {
        let (lookup_tx, mut lookup_rx) = mpsc::unbounded_channel::<LookupOutcome>();

        loop {
            let effects = tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(Command::Navigate(route)) => {
                        trace!(path = %route.path(), "navigate");
                        self.machine.route_changed(route)
                    }
                    Some(Command::Unmount) | None => {
                        let effects = self.machine.unmount();
                        self.apply(effects, &lookup_tx);
                        break;
                    }
                },

                Some(credential) = credentials.next() => {
                    debug!(uid = credential.as_ref().map(|c| c.uid.as_str()), "credential changed");
                    self.machine.credential_changed(credential)
                }

                Some((generation, outcome)) = lookup_rx.recv() => {
                    self.machine.lookup_finished(generation, outcome)
                }

                Some(item) = next_snapshot(&mut self.subscription) => {
                    self.machine.snapshot(item.map_err(|error| error.user_message()))
                }
            };

            self.apply(effects, &lookup_tx);
            self.view_tx.send_replace(self.machine.view().clone());
        }

        self.view_tx.send_replace(self.machine.view().clone());
        debug!("session unmounted");
    }

    fn apply(&mut self, effects: Vec<Effect>, lookup_tx: &mpsc::UnboundedSender<LookupOutcome>) {
        for effect in effects {
            match effect {
                Effect::CancelSubscription => {
                    if let Some(subscription) = self.subscription.take() {
                        subscription.cancel();
                    }
                }

                Effect::CancelLookup => {
                    if let Some(lookup) = self.lookup.take() {
                        lookup.abort();
                    }
                }

                Effect::Subscribe { uid, .. } => {
                    if self.subscription.is_some() {
                        warn!(%uid, "subscription replaced without cancel");
                    }

                    self.subscription = Some(self.store.watch_document(&DocRef::user(uid)));
                }

                Effect::Lookup {
                    generation,
                    username,
                } => {
                    let store = self.store.clone();
                    let tx = lookup_tx.clone();

                    self.lookup = Some(tokio::task::spawn(async move {
                        let query = Query::new(collection::users)
                            .where_eq("username", username)
                            .limit(1);

                        let outcome = store
                            .query(&query)
                            .await
                            .map(|documents| documents.into_iter().next().map(|d| d.id))
                            .map_err(|error| error.user_message());

                        let _ = tx.send((generation, outcome));
                    }));
                }

                Effect::Alert { kind, message } => {
                    self.alerts.push(kind, message);
                }
            }
        }
    }
}

/// Live session of one mounted view.
///
/// Dropping the handle unmounts the session, cancelling the credential
/// stream and any open profile subscription.
#[derive(Debug)]
pub struct SessionHandle {
    view: watch::Receiver<SessionView>,
    commands: mpsc::UnboundedSender<Command>,
    task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Navigate(route) => f.debug_tuple("Navigate").field(route).finish(),
            Self::Unmount => f.write_str("Unmount"),
        }
    }
}

impl SessionHandle {
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Waits until the view satisfies `predicate`.
    pub async fn wait_for(
        &mut self,
        predicate: impl FnMut(&SessionView) -> bool,
    ) -> Result<SessionView> {
        self.view
            .wait_for(predicate)
            .await
            .map(|view| view.clone())
            .map_err(|_| Error::SubscriptionClosed)
    }

    pub fn navigate(&self, route: Route) {
        let _ = self.commands.send(Command::Navigate(route));
    }

    /// Pushes the pending redirect to `navigator` when it differs from the
    /// current location, and feeds the new location back to the resolver.
    pub fn follow(&self, navigator: &impl Navigator) -> Result<Option<String>> {
        let view = self.view.borrow().clone();
        let current = navigator.current_path();

        let Some(target) = reconcile(view.redirect.as_deref(), &current) else {
            return Ok(None);
        };

        let route = Route::parse(target)?;
        navigator.push(target);
        self.navigate(route);

        Ok(Some(target.to_owned()))
    }

    pub async fn unmount(mut self) {
        let _ = self.commands.send(Command::Unmount);

        if let Some(task) = self.task.take() {
            if let Err(error) = task.await {
                warn!(%error, "session task failed");
            }
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Unmount);
    }
}
