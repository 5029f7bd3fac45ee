use crate::chat::ConnectionState;
use crate::session::SessionSnapshot;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    Login,
    Register,
    Chat,
    Profile,
    UserSearch,
}

impl Screen {
    pub fn route(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Register => "register",
            Self::Chat => "main_chat",
            Self::Profile => "profile",
            Self::UserSearch => "user_search",
        }
    }

    /// Screens that only make sense for a signed-in user.
    pub fn requires_session(&self) -> bool {
        matches!(self, Self::Chat | Self::Profile | Self::UserSearch)
    }
}

/// What the chat entry point should show for a given session snapshot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NavigationTarget {
    Login,
    Loading { retry_available: bool },
    Chat,
}

impl NavigationTarget {
    pub fn for_snapshot(snapshot: &SessionSnapshot) -> Self {
        if snapshot.identity.is_none() {
            return Self::Login;
        }
        match snapshot.connection_state {
            ConnectionState::Complete => Self::Chat,
            ConnectionState::Failed => Self::Loading {
                retry_available: true,
            },
            ConnectionState::NotInitialized | ConnectionState::Initializing => Self::Loading {
                retry_available: false,
            },
        }
    }
}

pub trait NavigationController: Send + Sync {
    /// Replaces the whole history with `screen`.
    fn set_entry_point(&self, screen: Screen);
    /// Pushes `screen` unless it is already on top.
    fn navigate_to(&self, screen: Screen);
    /// Drops every entry beneath the topmost `screen`, making it the root.
    fn clear_history_up_to(&self, screen: Screen);
}

/// Back stack of screens. Never empty.
pub struct NavStack {
    entries: RwLock<Vec<Screen>>,
}

impl NavStack {
    pub fn new(root: Screen) -> Self {
        Self {
            entries: RwLock::new(vec![root]),
        }
    }

    pub fn current(&self) -> Screen {
        let entries = self.entries.read();
        entries.last().copied().unwrap_or(Screen::Login)
    }

    pub fn history(&self) -> Vec<Screen> {
        self.entries.read().clone()
    }

    pub fn contains(&self, screen: Screen) -> bool {
        self.entries.read().contains(&screen)
    }

    /// Returns false at the root, where back leaves the app.
    pub fn pop_back(&self) -> bool {
        let mut entries = self.entries.write();
        if entries.len() <= 1 {
            return false;
        }
        entries.pop();
        true
    }
}

impl Default for NavStack {
    fn default() -> Self {
        Self::new(Screen::Login)
    }
}

impl NavigationController for NavStack {
    fn set_entry_point(&self, screen: Screen) {
        debug!(route = screen.route(), "navigation entry point");
        *self.entries.write() = vec![screen];
    }

    fn navigate_to(&self, screen: Screen) {
        let mut entries = self.entries.write();
        if entries.last() != Some(&screen) {
            debug!(route = screen.route(), "navigate");
            entries.push(screen);
        }
    }

    fn clear_history_up_to(&self, screen: Screen) {
        let mut entries = self.entries.write();
        if let Some(index) = entries.iter().rposition(|entry| *entry == screen) {
            entries.drain(..index);
        }
    }
}
