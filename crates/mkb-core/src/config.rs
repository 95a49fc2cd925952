use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::messaging::throttled::ThrottleConfig;

/// Process environment configuration.
///
/// Connection credentials and channel state live in the settings document
/// (see [`crate::settings`]); this only covers where to find things and how
/// the adapters behave.
#[derive(Clone, Debug)]
pub struct Config {
    pub settings_path: PathBuf,
    pub log_file: Option<PathBuf>,

    // Platform APIs
    pub helix_base_url: String,
    pub gql_base_url: String,
    pub http_timeout: Duration,

    // Outbound chat pacing
    pub throttle: ThrottleConfig,
}

impl Config {
    pub fn load() -> Self {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the process environment in `load`).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let settings_path = PathBuf::from(
            lookup("MARKERBOT_SETTINGS")
                .and_then(non_empty)
                .unwrap_or_else(|| "./settings.json".to_string()),
        );
        let log_file = lookup("MARKERBOT_LOG_FILE")
            .and_then(non_empty)
            .map(PathBuf::from);

        let helix_base_url = lookup("MARKERBOT_HELIX_URL")
            .and_then(non_empty)
            .unwrap_or_else(|| "https://api.twitch.tv/helix".to_string());
        let gql_base_url = lookup("MARKERBOT_GQL_URL")
            .and_then(non_empty)
            .unwrap_or_else(|| "https://gql.twitch.tv/gql".to_string());
        let http_timeout = Duration::from_secs(
            parse_u64(lookup("MARKERBOT_HTTP_TIMEOUT_SECS"))
                .unwrap_or(10)
                .max(1),
        );

        let defaults = ThrottleConfig::default();
        let throttle = ThrottleConfig {
            line_spacing: parse_u64(lookup("MARKERBOT_SEND_INTERVAL_MS"))
                .map(Duration::from_millis)
                .unwrap_or(defaults.line_spacing),
            room_spacing: parse_u64(lookup("MARKERBOT_CHANNEL_SEND_INTERVAL_MS"))
                .map(Duration::from_millis)
                .unwrap_or(defaults.room_spacing),
        };

        Self {
            settings_path,
            log_file,
            helix_base_url: helix_base_url.trim_end_matches('/').to_string(),
            gql_base_url,
            http_timeout,
            throttle,
        }
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn parse_u64(v: Option<String>) -> Option<u64> {
    v.and_then(|s| s.trim().parse::<u64>().ok())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
