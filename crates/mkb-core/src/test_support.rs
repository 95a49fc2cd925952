//! In-memory fakes for the core ports.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    domain::{BroadcastId, ChannelName, UserId, UserIdentity},
    errors::Error,
    messaging::port::ChatTransport,
    ports::{BookmarkOutcome, BookmarkService, UserDirectory},
    settings::{BotSettings, ChannelSettings, SettingsPersistence},
    Result,
};

pub const BOT_NAME: &str = "markersbot";

/// Settings with the bot named [`BOT_NAME`] and one registered channel.
pub fn settings_with_channel(name: &str, broadcaster_id: &str) -> BotSettings {
    let mut s = BotSettings {
        host: "irc.example.test".to_string(),
        port: "6667".to_string(),
        oauth: "token".to_string(),
        username: BOT_NAME.to_string(),
        ..BotSettings::default()
    };
    let name = ChannelName::new(name);
    s.channels.insert(
        name.as_str().to_string(),
        ChannelSettings::new(&name, &UserId(broadcaster_id.to_string())),
    );
    s
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportCall {
    Join(String),
    Leave(String),
    Send(String, String),
}

#[derive(Default)]
pub struct FakeTransport {
    calls: Mutex<Vec<TransportCall>>,
    fail_joins: AtomicBool,
    send_delay: Mutex<Option<Duration>>,
}

impl FakeTransport {
    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sent_to(&self, channel: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                TransportCall::Send(ch, text) if ch == channel => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn fail_joins(&self) {
        self.fail_joins.store(true, Ordering::SeqCst);
    }

    /// Every `send` waits `delay` before it is recorded.
    pub fn slow_sends(&self, delay: Duration) {
        *self.send_delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl ChatTransport for FakeTransport {
    async fn join(&self, channel: &ChannelName) -> Result<()> {
        if self.fail_joins.load(Ordering::SeqCst) {
            return Err(Error::External("join refused".to_string()));
        }
        self.calls
            .lock()
            .unwrap()
            .push(TransportCall::Join(channel.as_str().to_string()));
        Ok(())
    }

    async fn leave(&self, channel: &ChannelName) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(TransportCall::Leave(channel.as_str().to_string()));
        Ok(())
    }

    async fn send(&self, channel: &ChannelName, text: &str) -> Result<()> {
        let delay = *self.send_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.calls.lock().unwrap().push(TransportCall::Send(
            channel.as_str().to_string(),
            text.to_string(),
        ));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeDirectory {
    users: Vec<UserIdentity>,
    live: HashMap<String, String>,
    failing: bool,
    live_delay: Option<Duration>,
    panic_on: Option<String>,
}

impl FakeDirectory {
    pub fn with_user(mut self, id: &str, name: &str) -> Self {
        self.users.push(UserIdentity {
            id: UserId(id.to_string()),
            name: name.to_string(),
        });
        self
    }

    pub fn live(mut self, broadcaster_id: &str, session: &str) -> Self {
        self.live
            .insert(broadcaster_id.to_string(), session.to_string());
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Live-session lookups take `delay`.
    pub fn slow_live(mut self, delay: Duration) -> Self {
        self.live_delay = Some(delay);
        self
    }

    /// Looking up `name` panics the calling task.
    pub fn panicking_on(mut self, name: &str) -> Self {
        self.panic_on = Some(name.to_string());
        self
    }

    fn check(&self) -> Result<()> {
        if self.failing {
            return Err(Error::External("directory unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for FakeDirectory {
    async fn lookup_user_by_name(&self, name: &str) -> Result<Option<UserIdentity>> {
        self.check()?;
        if self
            .panic_on
            .as_deref()
            .is_some_and(|p| p.eq_ignore_ascii_case(name))
        {
            panic!("directory lookup for {name} blew up");
        }
        Ok(self
            .users
            .iter()
            .find(|u| u.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn lookup_channel_by_id(&self, id: &UserId) -> Result<UserIdentity> {
        self.check()?;
        self.users
            .iter()
            .find(|u| &u.id == id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("user id {id}")))
    }

    async fn current_live_session_id(&self, broadcaster: &UserId) -> Result<Option<BroadcastId>> {
        self.check()?;
        if let Some(delay) = self.live_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .live
            .get(broadcaster.as_str())
            .map(|s| BroadcastId(s.clone())))
    }
}

#[derive(Default)]
pub struct FakeBookmarks {
    calls: Mutex<Vec<(String, String)>>,
    reject_code: Option<String>,
    failing: bool,
}

impl FakeBookmarks {
    pub fn rejecting(code: &str) -> Self {
        Self {
            reject_code: Some(code.to_string()),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// `(description, session id)` per call.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BookmarkService for FakeBookmarks {
    async fn create_bookmark(
        &self,
        description: &str,
        session: &BroadcastId,
    ) -> Result<BookmarkOutcome> {
        self.calls
            .lock()
            .unwrap()
            .push((description.to_string(), session.0.clone()));
        if self.failing {
            return Err(Error::External("bookmark endpoint down".to_string()));
        }
        Ok(match &self.reject_code {
            Some(code) => BookmarkOutcome::Rejected { code: code.clone() },
            None => BookmarkOutcome::Created {
                bookmark_id: Some("bm-1".to_string()),
            },
        })
    }
}

#[derive(Default)]
pub struct RecordingStore {
    saves: AtomicUsize,
    last: Mutex<Option<BotSettings>>,
    failing: bool,
}

impl RecordingStore {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn last(&self) -> Option<BotSettings> {
        self.last.lock().unwrap().clone()
    }
}

impl SettingsPersistence for RecordingStore {
    fn save(&self, settings: &BotSettings) -> Result<()> {
        if self.failing {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only settings",
            )));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(settings.clone());
        Ok(())
    }
}
