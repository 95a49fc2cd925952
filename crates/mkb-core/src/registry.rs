use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    domain::{ChannelName, UserId},
    errors::Error,
    settings::{BotSettings, ChannelSettings, SettingsPersistence},
    Result,
};

/// Whether a registry operation changed (and persisted) anything.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Change {
    Applied,
    Unchanged,
}

/// Owner of the settings document.
///
/// All reads and writes go through one lock. A mutation is applied to a copy,
/// the copy is persisted, and only then does it replace the live document, so a
/// failed write leaves memory and disk in agreement.
pub struct ChannelRegistry {
    state: Mutex<BotSettings>,
    store: Arc<dyn SettingsPersistence>,
}

impl ChannelRegistry {
    pub fn new(settings: BotSettings, store: Arc<dyn SettingsPersistence>) -> Self {
        Self {
            state: Mutex::new(settings),
            store,
        }
    }

    pub async fn read<R>(&self, f: impl FnOnce(&BotSettings) -> R) -> R {
        let st = self.state.lock().await;
        f(&st)
    }

    pub async fn channel(&self, name: &ChannelName) -> Option<ChannelSettings> {
        self.read(|s| s.channel(name).cloned()).await
    }

    pub async fn contains(&self, name: &ChannelName) -> bool {
        self.read(|s| s.channel(name).is_some()).await
    }

    pub async fn channel_names(&self) -> Vec<ChannelName> {
        self.read(BotSettings::channel_names).await
    }

    pub async fn len(&self) -> usize {
        self.read(|s| s.channels.len()).await
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Register a room. Returns `Unchanged` (and writes nothing) if it already exists.
    pub async fn insert_channel(&self, entry: ChannelSettings) -> Result<Change> {
        let name = ChannelName::new(&entry.name);
        self.mutate(|s| {
            if s.channel(&name).is_some() {
                return Ok(Change::Unchanged);
            }
            let mut entry = entry;
            entry.name = name.as_str().to_string();
            s.channels.insert(name.as_str().to_string(), entry);
            Ok(Change::Applied)
        })
        .await
    }

    /// Unregister a room. The document is rewritten even if the room was absent.
    pub async fn remove_channel(&self, name: &ChannelName) -> Result<Option<ChannelSettings>> {
        let mut st = self.state.lock().await;
        let mut next = st.clone();
        let removed = next.channels.remove(name.as_str());
        self.commit(&mut st, next)?;
        Ok(removed)
    }

    pub async fn set_enable_all_mods(&self, name: &ChannelName, enabled: bool) -> Result<Change> {
        self.mutate(|s| {
            let entry = channel_mut(s, name)?;
            if entry.enable_all_mods == enabled {
                return Ok(Change::Unchanged);
            }
            entry.enable_all_mods = enabled;
            Ok(Change::Applied)
        })
        .await
    }

    pub async fn add_authorized_user(&self, name: &ChannelName, user: &UserId) -> Result<Change> {
        self.mutate(|s| {
            let entry = channel_mut(s, name)?;
            if entry.authorized_users.insert(user.0.clone()) {
                Ok(Change::Applied)
            } else {
                Ok(Change::Unchanged)
            }
        })
        .await
    }

    pub async fn remove_authorized_user(
        &self,
        name: &ChannelName,
        user: &UserId,
    ) -> Result<Change> {
        self.mutate(|s| {
            let entry = channel_mut(s, name)?;
            if entry.authorized_users.remove(user.as_str()) {
                Ok(Change::Applied)
            } else {
                Ok(Change::Unchanged)
            }
        })
        .await
    }

    async fn mutate(
        &self,
        f: impl FnOnce(&mut BotSettings) -> Result<Change>,
    ) -> Result<Change> {
        let mut st = self.state.lock().await;
        let mut next = st.clone();
        let change = f(&mut next)?;
        if change == Change::Applied {
            self.commit(&mut st, next)?;
        }
        Ok(change)
    }

    fn commit(&self, live: &mut BotSettings, next: BotSettings) -> Result<()> {
        self.store
            .save(&next)
            .map_err(|e| Error::Persist(e.to_string()))?;
        *live = next;
        Ok(())
    }
}

fn channel_mut<'a>(s: &'a mut BotSettings, name: &ChannelName) -> Result<&'a mut ChannelSettings> {
    s.channels
        .get_mut(name.as_str())
        .ok_or_else(|| Error::NotFound(format!("channel {name} is not registered")))
}
