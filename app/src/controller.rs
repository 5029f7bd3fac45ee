use overcooked_core::{
    Channel, ConnectTask, ConnectionState, DirectoryEntry, Identity, NavStack,
    NavigationController, NavigationTarget, Registration, Screen, SessionCoordinator,
    SessionEvent,
};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error};

/// Something the user asked for on one of the screens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
    SignIn {
        email: String,
        password: String,
    },
    OpenRegister,
    Register {
        display_name: String,
        email: String,
        password: String,
    },
    RefreshChannels,
    OpenSearch,
    Search(String),
    DirectMessage(String),
    OpenProfile,
    Retry,
    Logout,
    DeleteAccount,
    Back,
    DismissBanner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Turns screen actions into coordinator calls and coordinator events into
/// what the current screen shows.
pub struct MessengerController {
    coordinator: SessionCoordinator,
    navigation: Arc<NavStack>,
    events: UnboundedReceiver<SessionEvent>,
    pending: Vec<ConnectTask>,
    banner: Option<String>,
    search_results: Vec<DirectoryEntry>,
    channels: Vec<Channel>,
    channels_stale: bool,
}

impl MessengerController {
    pub fn new(
        coordinator: SessionCoordinator,
        navigation: Arc<NavStack>,
        events: UnboundedReceiver<SessionEvent>,
    ) -> Self {
        Self {
            coordinator,
            navigation,
            events,
            pending: Vec::new(),
            banner: None,
            search_results: Vec::new(),
            channels: Vec::new(),
            channels_stale: false,
        }
    }

    pub fn start(&mut self) {
        self.track(self.coordinator.on_app_start());
    }

    pub fn current_screen(&self) -> Screen {
        self.navigation.current()
    }

    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn search_results(&self) -> &[DirectoryEntry] {
        &self.search_results
    }

    pub fn identity(&self) -> Option<Identity> {
        self.coordinator.snapshot().identity
    }

    pub fn navigation_target(&self) -> NavigationTarget {
        self.coordinator.navigation_target()
    }

    /// True while a connect attempt is still running.
    pub fn is_busy(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn notify(&mut self, message: impl Into<String>) {
        self.banner = Some(message.into());
    }

    pub async fn handle(&mut self, action: UiAction) -> Flow {
        self.banner = None;
        let signed_in = self.coordinator.snapshot().identity.is_some();
        match action {
            UiAction::SignIn { email, password } => {
                if signed_in {
                    self.notify("Already signed in; log out first.");
                } else if let Ok(task) = self.coordinator.sign_in(&email, &password).await {
                    self.track(task);
                }
            }
            UiAction::OpenRegister => {
                if signed_in {
                    self.notify("Already signed in; log out first.");
                } else {
                    self.navigation.navigate_to(Screen::Register);
                }
            }
            UiAction::Register {
                display_name,
                email,
                password,
            } => {
                if signed_in {
                    self.notify("Already signed in; log out first.");
                } else {
                    let registration = Registration::new(display_name, email, password);
                    if let Ok(task) = self.coordinator.register(&registration).await {
                        self.track(task);
                    }
                }
            }
            UiAction::RefreshChannels => self.channels_stale = true,
            UiAction::OpenSearch => {
                self.open(Screen::UserSearch, signed_in);
            }
            UiAction::Search(query) => {
                if self.open(Screen::UserSearch, signed_in) {
                    if let Ok(results) = self.coordinator.search_users(&query).await {
                        self.search_results = results;
                    }
                }
            }
            UiAction::DirectMessage(user_id) => {
                if let Ok(channel) = self.coordinator.open_direct_channel(&user_id).await {
                    self.notify(format!("Opened {}", channel.cid));
                    while self.navigation.current() != Screen::Chat && self.navigation.pop_back() {}
                    self.channels_stale = true;
                }
            }
            UiAction::OpenProfile => {
                self.open(Screen::Profile, signed_in);
            }
            UiAction::Retry => {
                let task = self.coordinator.retry();
                if task.is_none() {
                    self.notify("Nothing to retry.");
                }
                self.track(task);
            }
            UiAction::Logout => {
                self.coordinator.logout().await;
                self.clear_session_views();
            }
            UiAction::DeleteAccount => {
                if self.coordinator.delete_account().await.is_ok() {
                    self.clear_session_views();
                    self.notify("Account deleted.");
                }
            }
            UiAction::Back => {
                // The channel list is the app's root once signed in.
                if self.navigation.current() == Screen::Chat || !self.navigation.pop_back() {
                    return Flow::Exit;
                }
            }
            UiAction::DismissBanner => {}
        }
        Flow::Continue
    }

    /// Polls without blocking on connects: drops finished tasks, applies
    /// queued events and refreshes a stale channel list.
    pub async fn poll(&mut self) {
        self.pending.retain(|task| !task.is_finished());
        self.process_background_events();
        self.refresh_channels().await;
    }

    /// Waits for outstanding connects, applies queued events and refreshes
    /// the channel list when it is stale.
    pub async fn settle(&mut self) {
        for task in std::mem::take(&mut self.pending) {
            task.finished().await;
        }
        self.process_background_events();
        self.refresh_channels().await;
    }

    async fn refresh_channels(&mut self) {
        let connected =
            self.coordinator.snapshot().connection_state == ConnectionState::Complete;
        if self.channels_stale && connected {
            if let Ok(channels) = self.coordinator.channels().await {
                self.channels = channels;
            }
            self.channels_stale = false;
            self.process_background_events();
        }
    }

    pub fn process_background_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                SessionEvent::Failure(err) => {
                    error!(kind = ?err.kind(), %err, "session failure");
                    self.banner = Some(err.user_message());
                }
                SessionEvent::SnapshotChanged(snapshot) => {
                    debug!(state = ?snapshot.connection_state, "session snapshot changed");
                    if snapshot.connection_state == ConnectionState::Complete {
                        self.channels_stale = true;
                    }
                }
            }
        }
    }

    fn track(&mut self, task: Option<ConnectTask>) {
        if let Some(task) = task {
            self.pending.push(task);
        }
    }

    fn open(&mut self, screen: Screen, signed_in: bool) -> bool {
        if screen.requires_session() && !signed_in {
            self.notify("Sign in first.");
            return false;
        }
        self.navigation.navigate_to(screen);
        true
    }

    fn clear_session_views(&mut self) {
        self.channels.clear();
        self.search_results.clear();
        self.channels_stale = false;
    }
}
