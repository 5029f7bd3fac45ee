pub mod chat;
pub mod config;
pub mod directory;
pub mod error;
pub mod identity;
pub mod local;
pub mod navigation;
pub mod session;
pub mod store;
pub mod telemetry;

pub use chat::{Channel, ChannelRequest, ChatBackend, ConnectionState, LocalChatBackend, Token};
pub use config::{MessengerSettings, SettingsError};
pub use directory::{DirectoryEntry, UserDirectory};
pub use error::{FailureKind, SessionError, SessionResult};
pub use identity::{Identity, IdentityProvider, LocalIdentityProvider, Registration};
pub use local::LocalStack;
pub use navigation::{NavStack, NavigationController, NavigationTarget, Screen};
pub use session::{
    Collaborators, ConnectTask, CoordinatorOptions, SessionCoordinator, SessionEvent,
    SessionSnapshot,
};
pub use store::SessionStore;
