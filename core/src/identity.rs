use crate::directory::{matches_prefix, DirectoryEntry, UserDirectory};
use crate::error::SessionError;
use crate::store::SessionStore;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

pub const DEFAULT_AVATAR_URL: &str = "https://i.postimg.cc/vHnXCRGW/jufufu.webp";
const FALLBACK_DISPLAY_NAME: &str = "User";
const MIN_PASSWORD_LEN: usize = 6;

/// The authenticated user as seen by the rest of the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub display_name: String,
    pub avatar_url: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Raw account attributes reported by a provider, before fallbacks are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountProfile {
    pub user_id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            avatar_url: DEFAULT_AVATAR_URL.to_string(),
            email: None,
        }
    }

    /// Builds an identity from provider attributes.
    ///
    /// The display name falls back to the email local part and then to `"User"`;
    /// the avatar falls back to `default_avatar` unless the photo URL is absolute.
    pub fn resolve(profile: &AccountProfile, default_avatar: &str) -> Result<Self> {
        let user_id = profile.user_id.trim();
        if user_id.is_empty() {
            bail!("identity provider returned an empty user id");
        }
        let display_name = profile
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .or_else(|| profile.email.as_deref().and_then(email_local_part))
            .unwrap_or_else(|| FALLBACK_DISPLAY_NAME.to_string());
        let avatar_url = profile
            .photo_url
            .as_deref()
            .filter(|photo| Url::parse(photo).is_ok())
            .unwrap_or(default_avatar)
            .to_string();
        Ok(Self {
            user_id: user_id.to_string(),
            display_name,
            avatar_url,
            email: profile.email.clone(),
        })
    }
}

fn email_local_part(email: &str) -> Option<String> {
    let local = email.split('@').next()?.trim();
    (!local.is_empty()).then(|| local.to_string())
}

/// Sign-up form contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub display_name: String,
    pub email: String,
    pub password: String,
}

impl Registration {
    pub fn new(
        display_name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        if self.display_name.trim().is_empty()
            || self.email.trim().is_empty()
            || self.password.is_empty()
        {
            return Err(SessionError::InvalidRegistration(
                "Please fill all fields".to_string(),
            ));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(SessionError::InvalidRegistration(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Ok(())
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity>;
    async fn register(&self, registration: &Registration) -> Result<Identity>;
    /// Forgets the local session even when the remote sign-out fails.
    async fn sign_out(&self) -> Result<()>;
    async fn delete_current_account(&self) -> Result<()>;
    fn current_session(&self) -> Option<Identity>;
}

struct LocalAccount {
    profile: AccountProfile,
    password: String,
}

/// In-process identity provider used for development and tests.
///
/// Accounts live in memory; the signed-in identity is optionally written
/// through to a [`SessionStore`] so a restarted process can observe it.
pub struct LocalIdentityProvider {
    accounts: RwLock<HashMap<String, LocalAccount>>,
    current: RwLock<Option<Identity>>,
    store: Option<SessionStore>,
    default_avatar: String,
    fail_sign_out: AtomicBool,
    fail_deletion: AtomicBool,
}

impl LocalIdentityProvider {
    pub fn new(default_avatar: impl Into<String>) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            current: RwLock::new(None),
            store: None,
            default_avatar: default_avatar.into(),
            fail_sign_out: AtomicBool::new(false),
            fail_deletion: AtomicBool::new(false),
        }
    }

    pub fn with_store(store: SessionStore, default_avatar: impl Into<String>) -> Self {
        let restored = match store.load_current() {
            Ok(identity) => identity,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "discarding unreadable persisted session");
                None
            }
        };
        let mut provider = Self::new(default_avatar);
        provider.current = RwLock::new(restored);
        provider.store = Some(store);
        provider
    }

    /// Creates an account without signing it in.
    pub fn seed_account(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Identity> {
        let key = account_key(email)?;
        let mut accounts = self.accounts.write();
        if accounts.contains_key(&key) {
            bail!("the email address is already in use by another account");
        }
        let profile = AccountProfile {
            user_id: Uuid::new_v4().simple().to_string(),
            display_name: display_name.map(str::to_string),
            email: Some(email.trim().to_string()),
            photo_url: None,
        };
        let identity = Identity::resolve(&profile, &self.default_avatar)?;
        accounts.insert(
            key,
            LocalAccount {
                profile,
                password: password.to_string(),
            },
        );
        Ok(identity)
    }

    pub fn fail_sign_out(&self, fail: bool) {
        self.fail_sign_out.store(fail, Ordering::SeqCst);
    }

    pub fn fail_account_deletion(&self, fail: bool) {
        self.fail_deletion.store(fail, Ordering::SeqCst);
    }

    pub fn account_count(&self) -> usize {
        self.accounts.read().len()
    }

    fn set_current(&self, identity: Option<Identity>) {
        if let Some(store) = &self.store {
            let persisted = match &identity {
                Some(identity) => store.save_current(identity),
                None => store.clear(),
            };
            if let Err(err) = persisted {
                warn!(error = %format!("{err:#}"), "failed to persist session");
            }
        }
        *self.current.write() = identity;
    }
}

fn account_key(email: &str) -> Result<String> {
    let key = email.trim().to_lowercase();
    if key.is_empty() {
        bail!("an email address is required");
    }
    Ok(key)
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity> {
        let key = account_key(email)?;
        if password.is_empty() {
            bail!("a password is required");
        }
        let identity = {
            let accounts = self.accounts.read();
            let account = accounts
                .get(&key)
                .filter(|account| account.password == password)
                .ok_or_else(|| anyhow!("the supplied credentials are incorrect"))?;
            Identity::resolve(&account.profile, &self.default_avatar)?
        };
        info!(user_id = %identity.user_id, "signed in");
        self.set_current(Some(identity.clone()));
        Ok(identity)
    }

    async fn register(&self, registration: &Registration) -> Result<Identity> {
        registration.validate()?;
        let identity = self.seed_account(
            &registration.email,
            &registration.password,
            Some(registration.display_name.trim()),
        )?;
        info!(user_id = %identity.user_id, "registered account");
        self.set_current(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<()> {
        self.set_current(None);
        if self.fail_sign_out.load(Ordering::SeqCst) {
            bail!("identity provider is unreachable");
        }
        Ok(())
    }

    async fn delete_current_account(&self) -> Result<()> {
        let current = self
            .current_session()
            .ok_or_else(|| anyhow!("no account is signed in"))?;
        if self.fail_deletion.load(Ordering::SeqCst) {
            bail!("this operation requires a recent login");
        }
        self.accounts
            .write()
            .retain(|_, account| account.profile.user_id != current.user_id);
        info!(user_id = %current.user_id, "deleted account");
        self.set_current(None);
        Ok(())
    }

    fn current_session(&self) -> Option<Identity> {
        self.current.read().clone()
    }
}

#[async_trait]
impl UserDirectory for LocalIdentityProvider {
    async fn search(&self, query: &str) -> Result<Vec<DirectoryEntry>> {
        let accounts = self.accounts.read();
        let mut entries: Vec<DirectoryEntry> = accounts
            .values()
            .filter_map(|account| Identity::resolve(&account.profile, &self.default_avatar).ok())
            .filter(|identity| matches_prefix(&identity.display_name, query))
            .map(|identity| DirectoryEntry {
                user_id: identity.user_id,
                display_name: identity.display_name,
                avatar_url: identity.avatar_url,
            })
            .collect();
        entries.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        Ok(entries)
    }
}
