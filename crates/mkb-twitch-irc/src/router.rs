use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use mkb_core::{
    config::Config,
    dispatch::{BotIdentity, Dispatcher},
    domain::ComponentVersion,
    messaging::{port::ChatTransport, throttled::ThrottledTransport},
    ports::{BookmarkService, UserDirectory},
    registry::ChannelRegistry,
    settings::{BotSettings, SettingsPersistence},
    worker::run_event_loop,
};

use crate::{IrcLogin, IrcTransport};

/// Everything the chat loop needs besides the connection itself.
pub struct BotParts {
    pub settings: BotSettings,
    pub store: Arc<dyn SettingsPersistence>,
    pub directory: Arc<dyn UserDirectory>,
    pub bookmarks: Arc<dyn BookmarkService>,
    pub versions: Vec<ComponentVersion>,
}

/// Connect, join every room and serve chat until the connection drops.
pub async fn run(cfg: &Config, parts: BotParts) -> anyhow::Result<()> {
    let BotParts {
        settings,
        store,
        directory,
        bookmarks,
        versions,
    } = parts;

    let port: u16 = settings
        .port
        .trim()
        .parse()
        .with_context(|| format!("invalid port {:?}", settings.port))?;
    let identity = BotIdentity::new(&settings.username);
    let login = IrcLogin {
        username: settings.username.clone(),
        oauth: settings.oauth.clone(),
    };

    let (raw, events) = IrcTransport::connect(&settings.host, port, &login)
        .await
        .with_context(|| format!("connect to {}:{port}", settings.host))?;
    let raw: Arc<dyn ChatTransport> = Arc::new(raw);
    let transport: Arc<dyn ChatTransport> =
        Arc::new(ThrottledTransport::new(raw, cfg.throttle));

    let registry = Arc::new(ChannelRegistry::new(settings, store));

    transport
        .join(&identity.control_room)
        .await
        .context("join control room")?;
    let channels = registry.channel_names().await;
    for channel in &channels {
        if let Err(e) = transport.join(channel).await {
            warn!(channel = %channel, error = %e, "startup join failed");
        }
    }
    info!(
        bot = %identity.username,
        channels = channels.len(),
        "markerbot started"
    );

    let dispatcher = Arc::new(Dispatcher::new(
        identity,
        registry,
        transport,
        directory,
        bookmarks,
        versions,
    ));
    run_event_loop(dispatcher, events).await;

    anyhow::bail!("chat connection lost")
}
