//! Session Controller
//!
//! Two states, `Anonymous` and `Authenticated`. The initial state comes from
//! the credential store; no request is made to check it. A bad persisted
//! credential only shows up as `Unauthorized` on the first real request,
//! which [`SessionController::observe`] turns into a logout (unless
//! disabled in config).
//!
//! While authenticated, exactly one tab is active. The Dashboard tab polls
//! statistics; the Settings tab loads once. Leaving a tab or logging out
//! tears its view down and stops its poller.

use chrono::Utc;
use reqwest::Method;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::api::Api;
use crate::config::ClientConfig;
use crate::credential::{Credential, CredentialStore};
use crate::dashboard::{refresh_if_alive, StatsView};
use crate::error::{RequestError, SessionError};
use crate::models::{LoginRequest, LoginResponse, ViewTab};
use crate::poller::{PollHandle, PollingController};
use crate::rest::{to_body, RestClient};
use crate::settings::SettingsView;

pub const LOGIN_PATH: &str = "/login";

/// Session state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticated(Credential),
}

/// Top-level view currently shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveView {
    Login,
    Authenticated(ViewTab),
}

/// View state that only exists while authenticated
enum Workspace {
    Dashboard {
        view: Arc<StatsView>,
        poll: PollHandle,
    },
    Settings {
        view: Arc<SettingsView>,
    },
}

pub struct SessionController {
    store: Arc<dyn CredentialStore>,
    rest: RestClient,
    poller: PollingController,
    poll_interval: Duration,
    logout_on_unauthorized: bool,
    state: SessionState,
    workspace: Option<Workspace>,
}

impl SessionController {
    /// Restore the session from the store.
    ///
    /// Does not activate any view; call [`activate`](Self::activate) from
    /// within a tokio runtime once ready to poll.
    pub fn new(store: Arc<dyn CredentialStore>, rest: RestClient, config: &ClientConfig) -> Self {
        let credential = store.load();
        let state = if credential.is_empty() {
            SessionState::Anonymous
        } else {
            if credential.is_expired_at(Utc::now()) {
                warn!("Persisted credential looks expired; the server will decide");
            }
            SessionState::Authenticated(credential)
        };
        debug!("Session restored: {}", state_name(&state));

        Self {
            store,
            rest,
            poller: PollingController::new(),
            poll_interval: config.poll_interval,
            logout_on_unauthorized: config.logout_on_unauthorized,
            state,
            workspace: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated(_))
    }

    /// Current credential, empty when anonymous
    pub fn credential(&self) -> Credential {
        match &self.state {
            SessionState::Authenticated(credential) => credential.clone(),
            SessionState::Anonymous => Credential::empty(),
        }
    }

    /// Authenticated API handle
    pub fn api(&self) -> Result<Api, SessionError> {
        match &self.state {
            SessionState::Authenticated(credential) => {
                Ok(Api::new(self.rest.clone(), credential.clone()))
            }
            SessionState::Anonymous => Err(SessionError::NotAuthenticated),
        }
    }

    pub fn active_view(&self) -> ActiveView {
        match (&self.state, &self.workspace) {
            (SessionState::Anonymous, _) => ActiveView::Login,
            (_, Some(Workspace::Settings { .. })) => ActiveView::Authenticated(ViewTab::Settings),
            _ => ActiveView::Authenticated(ViewTab::Dashboard),
        }
    }

    /// Store a credential and enter the authenticated state on the
    /// Dashboard tab. Replaces any previous session.
    pub fn login(&mut self, credential: impl Into<Credential>) -> Result<(), SessionError> {
        let credential = credential.into();
        if credential.is_empty() {
            return Err(SessionError::EmptyCredential);
        }
        self.teardown();
        self.store.save(&credential);
        self.state = SessionState::Authenticated(credential);
        info!("Logged in");
        self.activate(ViewTab::Dashboard)?;
        Ok(())
    }

    /// Exchange username and password for a token, then [`login`](Self::login)
    pub async fn authenticate(&mut self, username: &str, password: &str) -> Result<(), SessionError> {
        let body = to_body(&LoginRequest { username, password })?;
        let response: LoginResponse = serde_json::from_value(
            self.rest
                .request(Method::POST, LOGIN_PATH, Some(&body), &Credential::empty())
                .await?,
        )
        .map_err(RequestError::from)?;

        let token = response
            .token
            .filter(|t| !t.is_empty())
            .ok_or(SessionError::MissingToken)?;
        self.login(token)
    }

    /// Drop the credential, stop every poller and return to the login view
    pub fn logout(&mut self) {
        self.teardown();
        self.store.clear();
        if self.is_authenticated() {
            info!("Logged out");
        }
        self.state = SessionState::Anonymous;
    }

    /// Switch tabs. The previous tab's view is torn down first.
    pub fn activate(&mut self, tab: ViewTab) -> Result<(), SessionError> {
        let api = self.api()?;
        self.teardown();

        self.workspace = Some(match tab {
            ViewTab::Dashboard => {
                let view = StatsView::new(api);
                let weak = Arc::downgrade(&view);
                let poll = self
                    .poller
                    .start(self.poll_interval, move || refresh_if_alive(weak.clone()));
                Workspace::Dashboard { view, poll }
            }
            ViewTab::Settings => Workspace::Settings {
                view: SettingsView::new(api),
            },
        });
        debug!("Activated {} tab", tab.as_str());
        Ok(())
    }

    /// Tear down the active tab without leaving the session
    pub fn deactivate(&mut self) {
        self.teardown();
    }

    /// Dashboard view, if that tab is active
    pub fn dashboard(&self) -> Option<Arc<StatsView>> {
        match &self.workspace {
            Some(Workspace::Dashboard { view, .. }) => Some(view.clone()),
            _ => None,
        }
    }

    /// Settings view, if that tab is active
    pub fn settings(&self) -> Option<Arc<SettingsView>> {
        match &self.workspace {
            Some(Workspace::Settings { view }) => Some(view.clone()),
            _ => None,
        }
    }

    pub fn poller(&self) -> &PollingController {
        &self.poller
    }

    /// Feed a request failure back into the session.
    ///
    /// Returns true if it ended the session.
    pub fn observe(&mut self, error: &RequestError) -> bool {
        if !error.is_unauthorized() || !self.is_authenticated() {
            return false;
        }
        if !self.logout_on_unauthorized {
            debug!("Unauthorized response ignored: {}", error);
            return false;
        }
        warn!("Credential rejected by server ({}), logging out", error);
        self.logout();
        true
    }

    fn teardown(&mut self) {
        if let Some(Workspace::Dashboard { poll, .. }) = self.workspace.take() {
            self.poller.stop(poll);
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn state_name(state: &SessionState) -> &'static str {
    match state {
        SessionState::Anonymous => "anonymous",
        SessionState::Authenticated(_) => "authenticated",
    }
}
