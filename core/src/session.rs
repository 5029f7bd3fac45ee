//! Session and connection lifecycle coordination.
//!
//! [`SessionCoordinator`] is the single owner of the [`SessionSnapshot`]. Every
//! mutation happens under one lock and is published both on a watch channel and
//! as a [`SessionEvent`]. Connect attempts run as spawned tasks tagged with an
//! attempt id and the user they target; a completion whose tag no longer matches
//! the active attempt is discarded, and a discarded success is disconnected.
//! Attempts take the backend lane one at a time, so a stale connection is torn
//! down before the next attempt reaches the backend.

use crate::chat::{Channel, ChannelRequest, ChatBackend, ConnectionState};
use crate::config::MessengerSettings;
use crate::directory::{DirectoryEntry, UserDirectory};
use crate::error::{SessionError, SessionResult};
use crate::identity::{Identity, IdentityProvider, Registration};
use crate::navigation::{NavigationController, NavigationTarget, Screen};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub identity: Option<Identity>,
    pub connection_state: ConnectionState,
}

impl SessionSnapshot {
    pub fn user_id(&self) -> Option<&str> {
        self.identity.as_ref().map(|identity| identity.user_id.as_str())
    }

    /// No connection state other than `NotInitialized` without an identity.
    pub fn is_consistent(&self) -> bool {
        self.identity.is_some() || self.connection_state == ConnectionState::NotInitialized
    }
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    SnapshotChanged(SessionSnapshot),
    Failure(SessionError),
}

#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    pub connect_timeout: Duration,
}

impl CoordinatorOptions {
    pub fn from_settings(settings: &MessengerSettings) -> Self {
        Self {
            connect_timeout: settings.connect_timeout(),
        }
    }
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self::from_settings(&MessengerSettings::default())
    }
}

/// External systems the coordinator sequences.
#[derive(Clone)]
pub struct Collaborators {
    pub identity: Arc<dyn IdentityProvider>,
    pub chat: Arc<dyn ChatBackend>,
    pub directory: Arc<dyn UserDirectory>,
    pub navigation: Arc<dyn NavigationController>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ConnectAttempt {
    id: Uuid,
    user_id: String,
}

#[derive(Default)]
struct Inner {
    snapshot: SessionSnapshot,
    attempt: Option<ConnectAttempt>,
}

impl Inner {
    fn is_active(&self, attempt: &ConnectAttempt) -> bool {
        self.attempt.as_ref() == Some(attempt)
            && self.snapshot.user_id() == Some(attempt.user_id.as_str())
    }
}

/// Handle to a spawned connect attempt.
pub struct ConnectTask {
    attempt_id: Uuid,
    user_id: String,
    handle: JoinHandle<()>,
}

impl ConnectTask {
    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Resolves once the attempt's completion has been applied or discarded.
    pub async fn finished(self) {
        if let Err(err) = self.handle.await {
            warn!(attempt = %self.attempt_id, %err, "connect task did not run to completion");
        }
    }
}

#[derive(Clone)]
pub struct SessionCoordinator {
    inner: Arc<Mutex<Inner>>,
    backend_lane: Arc<AsyncMutex<()>>,
    collaborators: Collaborators,
    options: CoordinatorOptions,
    runtime: Handle,
    events_tx: UnboundedSender<SessionEvent>,
    snapshot_tx: Arc<watch::Sender<SessionSnapshot>>,
}

impl SessionCoordinator {
    pub fn new(
        collaborators: Collaborators,
        options: CoordinatorOptions,
        runtime: Handle,
    ) -> (Self, UnboundedReceiver<SessionEvent>) {
        let (events_tx, events_rx) = unbounded_channel();
        let (snapshot_tx, _) = watch::channel(SessionSnapshot::default());
        (
            Self {
                inner: Arc::new(Mutex::new(Inner::default())),
                backend_lane: Arc::new(AsyncMutex::new(())),
                collaborators,
                options,
                runtime,
                events_tx,
                snapshot_tx: Arc::new(snapshot_tx),
            },
            events_rx,
        )
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.lock().snapshot.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn navigation_target(&self) -> NavigationTarget {
        NavigationTarget::for_snapshot(&self.inner.lock().snapshot)
    }

    /// Cold start: resume the provider's session if there is one.
    pub fn on_app_start(&self) -> Option<ConnectTask> {
        match self.collaborators.identity.current_session() {
            Some(identity) => {
                info!(user_id = %identity.user_id, "resuming existing session");
                let task = self.issue_connect(identity);
                self.collaborators.navigation.set_entry_point(Screen::Chat);
                task
            }
            None => {
                info!("no existing session");
                self.collaborators.navigation.set_entry_point(Screen::Login);
                None
            }
        }
    }

    /// Returns `None` when the same user is already connecting or connected.
    pub fn on_auth_success(&self, identity: Identity) -> Option<ConnectTask> {
        let task = self.issue_connect(identity)?;
        self.collaborators.navigation.navigate_to(Screen::Chat);
        Some(task)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> SessionResult<Option<ConnectTask>> {
        match self.collaborators.identity.sign_in(email, password).await {
            Ok(identity) => Ok(self.on_auth_success(identity)),
            Err(err) => Err(self.surface(SessionError::Authentication(SessionError::describe(&err)))),
        }
    }

    pub async fn register(&self, registration: &Registration) -> SessionResult<Option<ConnectTask>> {
        if let Err(err) = registration.validate() {
            return Err(self.surface(err));
        }
        match self.collaborators.identity.register(registration).await {
            Ok(identity) => Ok(self.on_auth_success(identity)),
            Err(err) => Err(self.surface(SessionError::Authentication(format!(
                "registration failed: {}",
                SessionError::describe(&err)
            )))),
        }
    }

    /// Reconnects after a failed attempt. No-op in any other state.
    pub fn retry(&self) -> Option<ConnectTask> {
        let (identity, attempt, supersedes) = {
            let mut inner = self.inner.lock();
            if inner.snapshot.connection_state != ConnectionState::Failed {
                debug!(state = ?inner.snapshot.connection_state, "retry ignored");
                return None;
            }
            let identity = inner.snapshot.identity.clone()?;
            let (attempt, supersedes) = self.begin_attempt(&mut inner, &identity)?;
            (identity, attempt, supersedes)
        };
        info!(user_id = %identity.user_id, "retrying chat connection");
        Some(self.spawn_connect(identity, attempt, supersedes))
    }

    /// Signs out locally even when the provider or the chat backend fails.
    pub async fn logout(&self) {
        info!("logging out");
        self.inner.lock().attempt = None;
        if let Err(err) = self.collaborators.identity.sign_out().await {
            let err = SessionError::SignOut(SessionError::describe(&err));
            warn!(%err, "provider sign-out failed; clearing local session anyway");
            self.surface(err);
        }
        self.teardown().await;
    }

    /// On failure nothing changes and the user stays signed in.
    pub async fn delete_account(&self) -> SessionResult<()> {
        if let Err(err) = self.collaborators.identity.delete_current_account().await {
            let err = SessionError::AccountDeletion(SessionError::describe(&err));
            warn!(%err, "account deletion failed");
            return Err(self.surface(err));
        }
        info!("account deleted");
        self.inner.lock().attempt = None;
        self.teardown().await;
        Ok(())
    }

    pub async fn channels(&self) -> SessionResult<Vec<Channel>> {
        let me = self.connected_user()?;
        self.collaborators
            .chat
            .query_channels(&me)
            .await
            .map_err(|err| self.surface(SessionError::Backend(SessionError::describe(&err))))
    }

    pub async fn open_direct_channel(&self, user_id: &str) -> SessionResult<Channel> {
        let me = self.connected_user()?;
        let other = user_id.trim();
        if other.is_empty() || other == me {
            return Err(self.surface(SessionError::Backend(
                "pick another user to start a conversation".to_string(),
            )));
        }
        let channel = self
            .collaborators
            .chat
            .create_channel(ChannelRequest::direct(&me, other))
            .await
            .map_err(|err| self.surface(SessionError::Backend(SessionError::describe(&err))))?;
        info!(cid = %channel.cid, "direct channel ready");
        Ok(channel)
    }

    /// Blank queries return nothing without touching the directory.
    pub async fn search_users(&self, query: &str) -> SessionResult<Vec<DirectoryEntry>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        self.collaborators
            .directory
            .search(query)
            .await
            .map_err(|err| self.surface(SessionError::Backend(SessionError::describe(&err))))
    }

    fn connected_user(&self) -> SessionResult<String> {
        let user = {
            let inner = self.inner.lock();
            match (&inner.snapshot.identity, inner.snapshot.connection_state) {
                (Some(identity), ConnectionState::Complete) => Some(identity.user_id.clone()),
                _ => None,
            }
        };
        user.ok_or_else(|| self.surface(SessionError::NotConnected))
    }

    fn issue_connect(&self, identity: Identity) -> Option<ConnectTask> {
        let (attempt, supersedes) = {
            let mut inner = self.inner.lock();
            self.begin_attempt(&mut inner, &identity)?
        };
        Some(self.spawn_connect(identity, attempt, supersedes))
    }

    /// Moves to `Initializing` and records a fresh attempt tag. The flag reports
    /// whether another user's connection is being replaced.
    fn begin_attempt(
        &self,
        inner: &mut Inner,
        identity: &Identity,
    ) -> Option<(ConnectAttempt, bool)> {
        let previous_user = inner.snapshot.user_id().map(str::to_string);
        let state = inner.snapshot.connection_state;
        if previous_user.as_deref() == Some(identity.user_id.as_str())
            && matches!(state, ConnectionState::Initializing | ConnectionState::Complete)
        {
            debug!(user_id = %identity.user_id, ?state, "connect already issued");
            return None;
        }
        let supersedes = previous_user.is_some()
            && previous_user.as_deref() != Some(identity.user_id.as_str())
            && matches!(state, ConnectionState::Initializing | ConnectionState::Complete);

        let attempt = ConnectAttempt {
            id: Uuid::new_v4(),
            user_id: identity.user_id.clone(),
        };
        inner.snapshot.identity = Some(identity.clone());
        inner.snapshot.connection_state = ConnectionState::Initializing;
        inner.attempt = Some(attempt.clone());
        self.publish(inner);
        Some((attempt, supersedes))
    }

    fn spawn_connect(&self, identity: Identity, attempt: ConnectAttempt, supersedes: bool) -> ConnectTask {
        let coordinator = self.clone();
        let attempt_id = attempt.id;
        let user_id = attempt.user_id.clone();
        let handle = self.runtime.spawn(async move {
            let _lane = coordinator.backend_lane.lock().await;
            if !coordinator.inner.lock().is_active(&attempt) {
                debug!(attempt = %attempt.id, "attempt superseded before reaching the backend");
                return;
            }
            let outcome = coordinator.connect(&identity, supersedes).await;
            if coordinator.complete_connect(&attempt, outcome) {
                coordinator.drop_stale_connection(&attempt).await;
            }
        });
        ConnectTask {
            attempt_id,
            user_id,
            handle,
        }
    }

    async fn connect(&self, identity: &Identity, supersedes: bool) -> SessionResult<()> {
        let chat = &self.collaborators.chat;
        if supersedes {
            if let Err(err) = chat.disconnect(false).await {
                warn!(error = %SessionError::describe(&err), "failed to drop the previous user's connection");
            }
        }
        let token = chat
            .derive_token(&identity.user_id)
            .map_err(|err| SessionError::Connection(SessionError::describe(&err)))?;
        if token.is_development() {
            warn!(
                user_id = %identity.user_id,
                "connecting with a development token; these are client-derivable and must be replaced by server-issued tokens"
            );
        }
        match timeout(self.options.connect_timeout, chat.connect(identity, &token)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(SessionError::Connection(SessionError::describe(&err))),
            Err(_) => Err(SessionError::ConnectTimeout(self.options.connect_timeout)),
        }
    }

    /// Returns true when a discarded attempt left the backend connected.
    fn complete_connect(&self, attempt: &ConnectAttempt, outcome: SessionResult<()>) -> bool {
        let mut inner = self.inner.lock();
        if !inner.is_active(attempt) {
            debug!(
                attempt = %attempt.id,
                user_id = %attempt.user_id,
                succeeded = outcome.is_ok(),
                "discarding stale connect completion"
            );
            return outcome.is_ok();
        }
        inner.attempt = None;
        match outcome {
            Ok(()) => {
                info!(user_id = %attempt.user_id, "chat session established");
                inner.snapshot.connection_state = ConnectionState::Complete;
                self.publish(&inner);
            }
            Err(err) => {
                warn!(user_id = %attempt.user_id, %err, "chat connection failed");
                inner.snapshot.connection_state = ConnectionState::Failed;
                self.publish(&inner);
                self.surface(err);
            }
        }
        false
    }

    /// Called with the backend lane held, so no newer attempt has reached the
    /// backend yet.
    async fn drop_stale_connection(&self, attempt: &ConnectAttempt) {
        info!(user_id = %attempt.user_id, "disconnecting superseded chat session");
        if let Err(err) = self.collaborators.chat.disconnect(false).await {
            warn!(
                error = %SessionError::describe(&err),
                "failed to drop a superseded chat session"
            );
        }
    }

    async fn teardown(&self) {
        if let Err(err) = self.collaborators.chat.disconnect(false).await {
            warn!(
                error = %SessionError::describe(&err),
                "chat disconnect failed; resetting local state anyway"
            );
        }
        {
            let mut inner = self.inner.lock();
            inner.attempt = None;
            inner.snapshot = SessionSnapshot::default();
            self.publish(&inner);
        }
        let navigation = &self.collaborators.navigation;
        navigation.navigate_to(Screen::Login);
        navigation.clear_history_up_to(Screen::Login);
    }

    fn publish(&self, inner: &Inner) {
        debug_assert!(inner.snapshot.is_consistent());
        self.snapshot_tx.send_replace(inner.snapshot.clone());
        self.events_tx
            .send(SessionEvent::SnapshotChanged(inner.snapshot.clone()))
            .ok();
    }

    fn surface(&self, err: SessionError) -> SessionError {
        self.events_tx.send(SessionEvent::Failure(err.clone())).ok();
        err
    }
}
