use std::{
    collections::{BTreeMap, BTreeSet},
    fmt, fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    domain::{ChannelName, UserId},
    errors::Error,
    Result,
};

/// The persisted bot document: connection bootstrap plus every managed room.
///
/// Key names match the settings files written by earlier releases.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotSettings {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: String,
    #[serde(default)]
    pub oauth: String,
    #[serde(default, rename = "clientId")]
    pub client_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(
        default = "default_log_level",
        rename = "loglevel",
        deserialize_with = "deserialize_log_level"
    )]
    pub log_level: String,
    #[serde(default, rename = "channelSettings")]
    pub channels: BTreeMap<String, ChannelSettings>,
    #[serde(default, rename = "globaladmins")]
    pub global_admins: BTreeSet<String>,
}

/// Per-room configuration. `id` is the broadcaster's platform id and never changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSettings {
    pub name: String,
    #[serde(rename = "id")]
    pub broadcaster_id: String,
    #[serde(default, rename = "enableAllMods")]
    pub enable_all_mods: bool,
    #[serde(default, rename = "authorizedUsers")]
    pub authorized_users: BTreeSet<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Accepts a level name or the numeric levels of older documents
/// (0 error, 1 warn, 2 info, 3 debug, 4 and up trace).
fn deserialize_log_level<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Level {
        Name(String),
        Number(u64),
    }

    Ok(match Level::deserialize(deserializer)? {
        Level::Name(name) => name,
        Level::Number(n) => match n {
            0 => "error",
            1 => "warn",
            2 => "info",
            3 => "debug",
            _ => "trace",
        }
        .to_string(),
    })
}

impl ChannelSettings {
    pub fn new(name: &ChannelName, broadcaster_id: &UserId) -> Self {
        Self {
            name: name.as_str().to_string(),
            broadcaster_id: broadcaster_id.0.clone(),
            enable_all_mods: false,
            authorized_users: BTreeSet::new(),
        }
    }

    pub fn is_authorized_user(&self, user_id: &UserId) -> bool {
        self.authorized_users.contains(user_id.as_str())
    }
}

impl BotSettings {
    pub fn channel(&self, name: &ChannelName) -> Option<&ChannelSettings> {
        self.channels.get(name.as_str())
    }

    pub fn channel_names(&self) -> Vec<ChannelName> {
        self.channels.keys().map(|k| ChannelName::new(k)).collect()
    }

    /// Startup checks for the fields the transport cannot work without.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("host", &self.host),
            ("port", &self.port),
            ("oauth", &self.oauth),
            ("username", &self.username),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("settings field `{key}` is required")));
            }
        }
        if self.port.trim().parse::<u16>().is_err() {
            return Err(Error::Config(format!(
                "settings field `port` is not a valid port: {}",
                self.port
            )));
        }
        Ok(())
    }

    /// Re-key channels by their normalized name and keep `name` equal to the key.
    fn normalize(&mut self) -> bool {
        let mut changed = false;
        let channels = std::mem::take(&mut self.channels);
        for (key, mut entry) in channels {
            let name = ChannelName::new(&key);
            if name.as_str() != key || entry.name != name.as_str() {
                changed = true;
            }
            entry.name = name.as_str().to_string();
            self.channels.insert(name.as_str().to_string(), entry);
        }
        changed
    }
}

impl fmt::Debug for BotSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("oauth", &"<redacted>")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("log_level", &self.log_level)
            .field("channels", &self.channels)
            .field("global_admins", &self.global_admins)
            .finish()
    }
}

/// Durable storage for [`BotSettings`].
///
/// `save` must not return before the document is durably written; the registry
/// relies on that to commit changes.
pub trait SettingsPersistence: Send + Sync {
    fn save(&self, settings: &BotSettings) -> Result<()>;
}

/// Settings stored as a single pretty-printed JSON file.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the document, filling in and writing back any missing collections.
    pub fn load_or_init(&self) -> Result<BotSettings> {
        let txt = match fs::read_to_string(&self.path) {
            Ok(txt) => txt,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::Config(format!(
                    "settings file not found: {}",
                    self.path.display()
                )));
            }
            Err(e) => return Err(Error::Io(e)),
        };

        let raw: serde_json::Value = serde_json::from_str(&txt)?;
        let missing_collections = ["channelSettings", "globaladmins"]
            .iter()
            .any(|key| raw.get(key).map_or(true, |v| v.is_null()));

        let mut settings: BotSettings = serde_json::from_value(strip_nulls(raw))?;
        let renamed = settings.normalize();

        if missing_collections || renamed {
            self.save(&settings)?;
        }
        Ok(settings)
    }
}

impl SettingsPersistence for JsonFileStore {
    fn save(&self, settings: &BotSettings) -> Result<()> {
        let txt = serde_json::to_string_pretty(settings)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, txt)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Older documents carry `null` for empty collections.
fn strip_nulls(raw: serde_json::Value) -> serde_json::Value {
    match raw {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_nulls(v)))
                .collect(),
        ),
        other => other,
    }
}
