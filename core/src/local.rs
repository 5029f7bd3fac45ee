use crate::chat::LocalChatBackend;
use crate::config::MessengerSettings;
use crate::identity::LocalIdentityProvider;
use crate::navigation::NavStack;
use crate::session::{Collaborators, CoordinatorOptions, SessionCoordinator, SessionEvent};
use crate::store::SessionStore;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;

/// A coordinator wired to the in-process collaborators, with concrete handles
/// kept for fault injection and inspection.
pub struct LocalStack {
    pub identity: Arc<LocalIdentityProvider>,
    pub chat: Arc<LocalChatBackend>,
    pub navigation: Arc<NavStack>,
    pub coordinator: SessionCoordinator,
}

impl LocalStack {
    pub fn new(
        settings: &MessengerSettings,
        store: Option<SessionStore>,
        runtime: Handle,
    ) -> (Self, UnboundedReceiver<SessionEvent>) {
        let avatar = settings.profile.default_avatar_url.clone();
        let identity = Arc::new(match store {
            Some(store) => LocalIdentityProvider::with_store(store, avatar),
            None => LocalIdentityProvider::new(avatar),
        });
        let chat = Arc::new(LocalChatBackend::new(settings.chat.api_key.clone()));
        Self::from_parts(identity, chat, CoordinatorOptions::from_settings(settings), runtime)
    }

    pub fn from_parts(
        identity: Arc<LocalIdentityProvider>,
        chat: Arc<LocalChatBackend>,
        options: CoordinatorOptions,
        runtime: Handle,
    ) -> (Self, UnboundedReceiver<SessionEvent>) {
        let navigation = Arc::new(NavStack::default());
        let collaborators = Collaborators {
            identity: identity.clone(),
            chat: chat.clone(),
            directory: identity.clone(),
            navigation: navigation.clone(),
        };
        let (coordinator, events) = SessionCoordinator::new(collaborators, options, runtime);
        (
            Self {
                identity,
                chat,
                navigation,
                coordinator,
            },
            events,
        )
    }
}
