use std::sync::Arc;

use mkb_core::{
    config::Config,
    domain::ComponentVersion,
    settings::{JsonFileStore, SettingsPersistence},
};
use mkb_twitch_api::{ApiCredentials, GqlBookmarks, HelixClient};
use mkb_twitch_irc::router::BotParts;

const COMPONENT: ComponentVersion = ComponentVersion {
    name: "mkb",
    version: env!("CARGO_PKG_VERSION"),
};

#[tokio::main]
async fn main() -> Result<(), mkb_core::Error> {
    let cfg = Config::load();

    let store = JsonFileStore::new(cfg.settings_path.clone());
    let settings = store.load_or_init()?;
    settings.validate()?;

    mkb_core::logging::init("mkb", &settings.log_level, cfg.log_file.as_deref())?;
    tracing::info!(
        settings = %store.path().display(),
        channels = settings.channels.len(),
        "settings loaded"
    );

    let creds = ApiCredentials {
        client_id: settings.client_id.clone(),
        oauth: settings.oauth.clone(),
    };
    let directory = Arc::new(HelixClient::new(
        cfg.helix_base_url.clone(),
        creds.clone(),
        cfg.http_timeout,
    )?);
    let bookmarks = Arc::new(GqlBookmarks::new(
        cfg.gql_base_url.clone(),
        creds,
        cfg.http_timeout,
    )?);
    let store: Arc<dyn SettingsPersistence> = Arc::new(store);

    let parts = BotParts {
        settings,
        store,
        directory,
        bookmarks,
        versions: vec![
            COMPONENT,
            mkb_core::COMPONENT,
            mkb_twitch_api::COMPONENT,
            mkb_twitch_irc::COMPONENT,
        ],
    };

    mkb_twitch_irc::router::run(&cfg, parts).await.map_err(|e| {
        tracing::error!(error = %format!("{e:#}"), "markerbot stopped");
        mkb_core::Error::External(format!("chat bot failed: {e:#}"))
    })?;

    Ok(())
}
