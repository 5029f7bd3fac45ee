use crate::identity::Identity;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

pub const MESSAGING_CHANNEL: &str = "messaging";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    NotInitialized,
    Initializing,
    Complete,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Client-derivable and unverifiable. Never acceptable outside development.
    Development,
    Issued,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    user_id: String,
    value: String,
    kind: TokenKind,
}

impl Token {
    pub fn development(user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        let value = format!("{user_id}.devtoken");
        Self {
            user_id,
            value,
            kind: TokenKind::Development,
        }
    }

    pub fn issued(user_id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            value: value.into(),
            kind: TokenKind::Issued,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn is_development(&self) -> bool {
        self.kind == TokenKind::Development
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("user_id", &self.user_id)
            .field("kind", &self.kind)
            .field("value", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Channel {
    pub cid: String,
    pub channel_type: String,
    pub members: Vec<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Channel {
    /// Title shown in the channel list: the other members, or the creator for a solo channel.
    pub fn title_for(&self, viewer: &str) -> String {
        let others: Vec<&str> = self
            .members
            .iter()
            .map(String::as_str)
            .filter(|member| *member != viewer)
            .collect();
        if others.is_empty() {
            self.created_by.clone()
        } else {
            others.join(", ")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRequest {
    pub channel_type: String,
    pub members: Vec<String>,
    pub created_by: String,
}

impl ChannelRequest {
    /// Two-member messaging channel; distinct per member pair.
    pub fn direct(creator: &str, other: &str) -> Self {
        Self {
            channel_type: MESSAGING_CHANNEL.to_string(),
            members: vec![creator.to_string(), other.to_string()],
            created_by: creator.to_string(),
        }
    }
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn derive_token(&self, user_id: &str) -> Result<Token>;
    async fn connect(&self, identity: &Identity, token: &Token) -> Result<()>;
    async fn disconnect(&self, flush_persistence: bool) -> Result<()>;
    /// Current state first, then every change.
    fn observe_connection_state(&self) -> BoxStream<'static, ConnectionState>;
    async fn create_channel(&self, request: ChannelRequest) -> Result<Channel>;
    async fn query_channels(&self, member: &str) -> Result<Vec<Channel>>;
}

/// In-process chat backend used for development and tests.
///
/// Issues development tokens only. Connects can be held open with
/// [`LocalChatBackend::hold_connects`] to exercise in-flight races, and both
/// connect and disconnect can be made to fail.
pub struct LocalChatBackend {
    api_key: String,
    state_tx: watch::Sender<ConnectionState>,
    gate_tx: watch::Sender<bool>,
    connected_user: RwLock<Option<String>>,
    channels: RwLock<Vec<Channel>>,
    connect_failure: RwLock<Option<String>>,
    fail_disconnect: AtomicBool,
    connect_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
    last_flush: RwLock<Option<bool>>,
}

impl LocalChatBackend {
    pub fn new(api_key: impl Into<String>) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::NotInitialized);
        let (gate_tx, _) = watch::channel(true);
        Self {
            api_key: api_key.into(),
            state_tx,
            gate_tx,
            connected_user: RwLock::new(None),
            channels: RwLock::new(Vec::new()),
            connect_failure: RwLock::new(None),
            fail_disconnect: AtomicBool::new(false),
            connect_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
            last_flush: RwLock::new(None),
        }
    }

    /// Makes every subsequent connect fail with `reason` until cleared with `None`.
    pub fn fail_connects(&self, reason: Option<&str>) {
        *self.connect_failure.write() = reason.map(str::to_string);
    }

    pub fn fail_disconnects(&self, fail: bool) {
        self.fail_disconnect.store(fail, Ordering::SeqCst);
    }

    /// Parks connects until [`LocalChatBackend::release_connects`] is called.
    pub fn hold_connects(&self) {
        self.gate_tx.send_replace(false);
    }

    pub fn release_connects(&self) {
        self.gate_tx.send_replace(true);
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    pub fn last_flush_persistence(&self) -> Option<bool> {
        *self.last_flush.read()
    }

    pub fn connected_user(&self) -> Option<String> {
        self.connected_user.read().clone()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    async fn wait_for_gate(&self) {
        let mut gate = self.gate_tx.subscribe();
        loop {
            let open = *gate.borrow_and_update();
            if open || gate.changed().await.is_err() {
                return;
            }
        }
    }

    fn require_connected(&self) -> Result<String> {
        self.connected_user
            .read()
            .clone()
            .ok_or_else(|| anyhow!("client is not connected"))
    }
}

#[async_trait]
impl ChatBackend for LocalChatBackend {
    fn derive_token(&self, user_id: &str) -> Result<Token> {
        if user_id.trim().is_empty() {
            bail!("cannot derive a token for an empty user id");
        }
        Ok(Token::development(user_id))
    }

    async fn connect(&self, identity: &Identity, token: &Token) -> Result<()> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        self.state_tx.send_replace(ConnectionState::Initializing);
        self.wait_for_gate().await;

        let failure = self.connect_failure.read().clone();
        let rejection = if let Some(reason) = failure {
            Some(reason)
        } else if self.api_key.trim().is_empty() {
            Some("chat api key is not configured".to_string())
        } else if token.value().is_empty() {
            Some("chat token is empty".to_string())
        } else if token.user_id() != identity.user_id {
            Some(format!(
                "token was issued for {} but connect requested {}",
                token.user_id(),
                identity.user_id
            ))
        } else {
            None
        };
        if let Some(reason) = rejection {
            self.state_tx.send_replace(ConnectionState::Failed);
            bail!(reason);
        }

        *self.connected_user.write() = Some(identity.user_id.clone());
        self.state_tx.send_replace(ConnectionState::Complete);
        info!(user_id = %identity.user_id, "chat client connected");
        Ok(())
    }

    async fn disconnect(&self, flush_persistence: bool) -> Result<()> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_flush.write() = Some(flush_persistence);
        if self.fail_disconnect.load(Ordering::SeqCst) {
            bail!("disconnect rejected by chat backend");
        }
        let previous = self.connected_user.write().take();
        self.state_tx.send_replace(ConnectionState::NotInitialized);
        debug!(user_id = ?previous, flush_persistence, "chat client disconnected");
        Ok(())
    }

    fn observe_connection_state(&self) -> BoxStream<'static, ConnectionState> {
        let rx = self.state_tx.subscribe();
        stream::unfold((rx, true), |(mut rx, first)| async move {
            if !first {
                rx.changed().await.ok()?;
            }
            let state = *rx.borrow_and_update();
            Some((state, (rx, false)))
        })
        .boxed()
    }

    async fn create_channel(&self, request: ChannelRequest) -> Result<Channel> {
        let me = self.require_connected()?;
        if request.created_by != me {
            bail!("channels can only be created by the connected user");
        }
        let mut members = request.members;
        if !members.contains(&request.created_by) {
            members.push(request.created_by.clone());
        }
        members.sort();
        members.dedup();

        let mut channels = self.channels.write();
        if let Some(existing) = channels
            .iter()
            .find(|channel| channel.channel_type == request.channel_type && channel.members == members)
        {
            return Ok(existing.clone());
        }
        let channel = Channel {
            cid: format!("{}:{}", request.channel_type, Uuid::new_v4()),
            channel_type: request.channel_type,
            members,
            created_by: request.created_by,
            created_at: Utc::now(),
        };
        channels.push(channel.clone());
        info!(cid = %channel.cid, "channel created");
        Ok(channel)
    }

    async fn query_channels(&self, member: &str) -> Result<Vec<Channel>> {
        self.require_connected()?;
        let mut found: Vec<Channel> = self
            .channels
            .read()
            .iter()
            .filter(|channel| channel.members.iter().any(|m| m == member))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }
}
