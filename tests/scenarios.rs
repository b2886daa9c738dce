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

use serde_json::{Value, json};

use portfolio::controllers::{Auth, ProjectForm, Sections};
use portfolio::services::blob::MemoryBlobs;
use portfolio::services::identity::MemoryIdentity;
use portfolio::services::store::{Data, MemoryStore};
use portfolio::services::types::DocRef;
use portfolio::session::{BILLING_LAPSED, HistoryNavigator, Navigator, Route};
use portfolio::{AlertChannel, AlertKind, Config, SessionResolver, SessionState};

struct App {
    identity: Arc<MemoryIdentity>,
    store: Arc<MemoryStore>,
    alerts: AlertChannel,
    config: Config,
    resolver: SessionResolver<MemoryIdentity, MemoryStore>,
}

impl App {
    fn new() -> Self {
        let config = Config::default();
        let identity = Arc::new(MemoryIdentity::new());
        let store = Arc::new(MemoryStore::new());
        let alerts = AlertChannel::new(config.alert_ttl);
        let resolver =
            SessionResolver::new(identity.clone(), store.clone(), alerts.clone(), &config);

        Self {
            identity,
            store,
            alerts,
            config,
            resolver,
        }
    }

    fn profile(&self, uid: &str, value: Value) {
        self.store.insert(&DocRef::user(uid), data(value));
    }
}

fn data(value: Value) -> Data {
    match value {
        Value::Object(data) => data,
        _ => panic!("object expected"),
    }
}

#[tokio::test]
async fn visitor_sees_public_portfolio() -> anyhow::Result<()> {
    let app = App::new();
    app.profile(
        "A1",
        json!({"username": "alice", "name": "Alice", "status": "Active"}),
    );

    let navigator = HistoryNavigator::new("/portfolio/alice");
    let mut session = app.resolver.mount(Route::parse(&navigator.current_path())?);

    let view = session
        .wait_for(|view| view.profile.is_some() && !view.loading)
        .await?;

    assert_eq!(view.profile_ref, Some(DocRef::user("A1")));
    assert!(!view.is_owner());
    assert_eq!(view.redirect.as_deref(), Some("/portfolio/alice"));
    assert_eq!(session.follow(&navigator)?, None);
    assert_eq!(navigator.history(), ["/portfolio/alice"]);
    assert!(app.alerts.alerts().is_empty());

    session.unmount().await;
    assert_eq!(app.store.active_watchers(), 0);

    Ok(())
}

#[tokio::test]
async fn owner_sign_in_redirects_to_own_portfolio() -> anyhow::Result<()> {
    let app = App::new();
    let uid = app.identity.register("bob@example.com", "secret1");
    app.profile(
        &uid,
        json!({"username": "bob", "name": "Bob", "status": "Active"}),
    );

    let navigator = HistoryNavigator::new("/");
    let mut session = app.resolver.mount(Route::home());
    session.wait_for(|view| !view.loading).await?;

    let auth = Auth::new(
        app.identity.clone(),
        app.store.clone(),
        app.alerts.clone(),
        &app.config,
    );
    assert!(auth.sign_in("bob@example.com", "secret1").await);

    let view = session
        .wait_for(|view| view.profile.is_some() && !view.loading)
        .await?;

    assert!(view.is_owner());
    assert_eq!(view.profile_ref, Some(DocRef::user(uid.as_str())));
    assert_eq!(
        session.follow(&navigator)?.as_deref(),
        Some("/portfolio/bob")
    );
    assert_eq!(navigator.current_path(), "/portfolio/bob");

    let sections = Sections::new(
        app.store.clone(),
        Arc::new(MemoryBlobs::new()),
        app.alerts.clone(),
    );
    let form = ProjectForm {
        title: "Site".to_owned(),
        description: "Portfolio site".to_owned(),
        ..ProjectForm::default()
    };
    let owner = session.view().profile_ref;
    assert!(
        sections
            .projects()
            .create(owner.as_ref(), form, None)
            .await
            .is_some()
    );

    let messages = app
        .alerts
        .alerts()
        .into_iter()
        .map(|alert| (alert.kind, alert.message))
        .collect::<Vec<_>>();
    assert_eq!(
        messages,
        [
            (AlertKind::Success, "Login successful! Welcome back!".to_owned()),
            (AlertKind::Success, "Project registered successfully!".to_owned()),
        ]
    );

    Ok(())
}

#[tokio::test]
async fn lapsed_billing_disables_portfolio_for_visitors() -> anyhow::Result<()> {
    let app = App::new();
    app.profile(
        "A1",
        json!({"username": "alice", "name": "Alice", "status": "Active"}),
    );

    let mut session = app.resolver.mount(Route::parse("/portfolio/alice")?);
    session.wait_for(|view| view.profile.is_some()).await?;

    app.profile(
        "A1",
        json!({"username": "alice", "name": "Alice", "status": "Inactive"}),
    );

    let view = session
        .wait_for(|view| view.state == SessionState::Disabled)
        .await?;

    assert_eq!(view.profile, None);
    assert_eq!(
        view.redirect.as_deref(),
        Some(app.config.reactivation_route.as_str())
    );

    let alerts = app.alerts.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, AlertKind::Danger);
    assert_eq!(alerts[0].message, BILLING_LAPSED);

    // The subscription stays open and picks up reactivation.
    assert_eq!(app.store.active_watchers(), 1);
    app.profile(
        "A1",
        json!({"username": "alice", "name": "Alice", "status": "Active"}),
    );
    let view = session.wait_for(|view| view.profile.is_some()).await?;
    assert_eq!(view.redirect.as_deref(), Some("/portfolio/alice"));
    assert_eq!(app.store.opened_watchers(), 1);

    Ok(())
}

#[tokio::test]
async fn unknown_username_reports_not_found() -> anyhow::Result<()> {
    let app = App::new();

    let mut session = app.resolver.mount(Route::parse("/portfolio/nobody")?);
    let view = session
        .wait_for(|view| view.state == SessionState::NotFound)
        .await?;

    assert_eq!(view.redirect.as_deref(), Some("/"));
    assert_eq!(app.store.opened_watchers(), 0);
    assert_eq!(app.alerts.alerts()[0].message, "User not found.");

    Ok(())
}
