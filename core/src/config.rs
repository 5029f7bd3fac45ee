use crate::identity::DEFAULT_AVATAR_URL;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const API_KEY_VAR: &str = "OVERCOOKED_CHAT_API_KEY";
const CONNECT_TIMEOUT_VAR: &str = "OVERCOOKED_CONNECT_TIMEOUT_MS";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessengerSettings {
    #[serde(default)]
    pub chat: ChatSettings,
    #[serde(default)]
    pub profile: ProfileSettings,
    #[serde(default = "MessengerSettings::default_log_filter")]
    pub log_filter: String,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatSettings {
    #[serde(default = "ChatSettings::default_api_key")]
    pub api_key: String,
    #[serde(default = "ChatSettings::default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileSettings {
    #[serde(default = "ProfileSettings::default_avatar_url")]
    pub default_avatar_url: String,
}

#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    #[error("no overcooked.yaml found")]
    Missing,
    #[error("settings invalid: {0}")]
    Invalid(String),
}

impl SettingsError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Missing => "Using built-in defaults; create overcooked.yaml to customize.".to_string(),
            Self::Invalid(detail) => format!("Settings invalid: {detail}. Update overcooked.yaml."),
        }
    }
}

impl Default for MessengerSettings {
    fn default() -> Self {
        Self {
            chat: ChatSettings::default(),
            profile: ProfileSettings::default(),
            log_filter: MessengerSettings::default_log_filter(),
            data_dir: None,
        }
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            api_key: ChatSettings::default_api_key(),
            connect_timeout_ms: ChatSettings::default_connect_timeout_ms(),
        }
    }
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self {
            default_avatar_url: ProfileSettings::default_avatar_url(),
        }
    }
}

impl ChatSettings {
    fn default_api_key() -> String {
        "kpjpryjdzfmt".to_string()
    }

    fn default_connect_timeout_ms() -> u64 {
        15_000
    }
}

impl ProfileSettings {
    fn default_avatar_url() -> String {
        DEFAULT_AVATAR_URL.to_string()
    }
}

impl MessengerSettings {
    fn default_log_filter() -> String {
        "info".to_string()
    }

    /// Loads the first settings file found in the standard locations.
    pub fn load() -> Result<Self, SettingsError> {
        let path = locate_config_file().ok_or(SettingsError::Missing)?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            SettingsError::Invalid(format!("failed to read {}: {err}", path.display()))
        })?;
        debug!(path = %path.display(), "loaded settings file");
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, SettingsError> {
        let settings: MessengerSettings = if contents.trim().is_empty() {
            MessengerSettings::default()
        } else {
            serde_yaml::from_str(contents)
                .map_err(|err| SettingsError::Invalid(format!("invalid overcooked.yaml: {err}")))?
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Explicit path if given, otherwise the standard locations, otherwise defaults.
    /// Environment overrides (including a `.env` file) are applied last.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, SettingsError> {
        let mut settings = match explicit {
            Some(path) => Self::load_from(path)?,
            None => match Self::load() {
                Ok(settings) => settings,
                Err(SettingsError::Missing) => {
                    warn!("{}", SettingsError::Missing.user_message());
                    Self::default()
                }
                Err(err) => return Err(err),
            },
        };
        load_environment_file();
        settings.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(api_key) = lookup(API_KEY_VAR) {
            self.chat.api_key = api_key;
        }
        if let Some(raw) = lookup(CONNECT_TIMEOUT_VAR) {
            self.chat.connect_timeout_ms = raw.trim().parse().map_err(|_| {
                SettingsError::Invalid(format!("{CONNECT_TIMEOUT_VAR} must be a number, got {raw:?}"))
            })?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.chat.api_key.trim().is_empty() {
            return Err(SettingsError::Invalid("missing chat api key".to_string()));
        }
        if self.chat.connect_timeout_ms == 0 {
            return Err(SettingsError::Invalid(
                "chat connect timeout must be greater than zero".to_string(),
            ));
        }
        Url::parse(&self.profile.default_avatar_url).map_err(|err| {
            SettingsError::Invalid(format!(
                "default avatar url {:?} is not absolute: {err}",
                self.profile.default_avatar_url
            ))
        })?;
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.chat.connect_timeout_ms)
    }

    pub fn resolve_data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        BaseDirs::new()
            .map(|base| base.data_local_dir().join("overcooked"))
            .unwrap_or_else(|| PathBuf::from(".overcooked"))
    }
}

fn load_environment_file() {
    match dotenvy::dotenv() {
        Ok(path) => debug!(path = %path.display(), "loaded environment file"),
        Err(err) if err.not_found() => {}
        Err(err) => warn!(%err, "ignoring unreadable environment file"),
    }
}

fn locate_config_file() -> Option<PathBuf> {
    overcooked_yaml_candidates()
        .into_iter()
        .find(|path| path.exists())
}

fn overcooked_yaml_candidates() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(base) = BaseDirs::new() {
        let config_dir = base.config_dir().join("overcooked");
        paths.push(config_dir.join("overcooked.yaml"));
        paths.push(config_dir.join("overcooked.yml"));
        let home_dir = base.home_dir();
        paths.push(home_dir.join(".overcooked").join("overcooked.yaml"));
        paths.push(home_dir.join(".overcooked").join("overcooked.yml"));
    } else {
        paths.push(PathBuf::from("overcooked.yaml"));
        paths.push(PathBuf::from("overcooked.yml"));
    }
    paths
}
