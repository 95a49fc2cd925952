//! Outbound pacing for the chat connection.
//!
//! The server counts every line a client writes. A regular account that
//! writes more than about 20 lines in 30 seconds gets its lines dropped without
//! any error, and bursts into a single room are trimmed the same way.

use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{domain::ChannelName, messaging::port::ChatTransport, Result};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Gap between two lines on the connection, whatever room they target.
    pub line_spacing: Duration,
    /// Gap between two lines for the same room.
    pub room_spacing: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            line_spacing: Duration::from_millis(1500),
            room_spacing: Duration::from_millis(1050),
        }
    }
}

/// Hands out send times at least `spacing` apart.
#[derive(Debug)]
struct Pacer {
    spacing: Duration,
    free_at: Instant,
}

impl Pacer {
    fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            free_at: Instant::now(),
        }
    }

    /// Claims the earliest free send time; returns how long to wait for it.
    fn next_delay(&mut self) -> Duration {
        let now = Instant::now();
        let slot = self.free_at.max(now);
        self.free_at = slot + self.spacing;
        slot - now
    }
}

/// Paces JOIN, PART and PRIVMSG lines before they reach the wrapped transport.
pub struct ThrottledTransport {
    inner: Arc<dyn ChatTransport>,
    room_spacing: Duration,
    connection: Mutex<Pacer>,
    rooms: Mutex<HashMap<ChannelName, Arc<Mutex<Pacer>>>>,
}

impl ThrottledTransport {
    pub fn new(inner: Arc<dyn ChatTransport>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            room_spacing: cfg.room_spacing,
            connection: Mutex::new(Pacer::new(cfg.line_spacing)),
            rooms: Mutex::new(HashMap::new()),
        }
    }

    async fn room_pacer(&self, channel: &ChannelName) -> Arc<Mutex<Pacer>> {
        let mut rooms = self.rooms.lock().await;
        rooms
            .entry(channel.clone())
            .or_insert_with(|| Arc::new(Mutex::new(Pacer::new(self.room_spacing))))
            .clone()
    }

    async fn pace(&self, channel: &ChannelName) {
        let line_wait = self.connection.lock().await.next_delay();
        let room_wait = {
            let pacer = self.room_pacer(channel).await;
            let mut pacer = pacer.lock().await;
            pacer.next_delay()
        };

        let wait = line_wait.max(room_wait);
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }
}

#[async_trait::async_trait]
impl ChatTransport for ThrottledTransport {
    async fn join(&self, channel: &ChannelName) -> Result<()> {
        self.pace(channel).await;
        self.inner.join(channel).await
    }

    async fn leave(&self, channel: &ChannelName) -> Result<()> {
        self.pace(channel).await;
        self.inner.leave(channel).await
    }

    async fn send(&self, channel: &ChannelName, text: &str) -> Result<()> {
        self.pace(channel).await;
        self.inner.send(channel, text).await
    }
}
