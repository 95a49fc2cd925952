use std::{fs::OpenOptions, path::Path, sync::Mutex};

use tracing_subscriber::{fmt, EnvFilter};

use crate::{errors::Error, Result};

/// Initialize tracing for the bot.
///
/// `RUST_LOG` wins over `level` (the `loglevel` entry of the settings document).
/// When `log_file` is set, plain lines are appended there instead of stderr.
pub fn init(service_name: &str, level: &str, log_file: Option<&Path>) -> Result<()> {
    let level = match level.trim() {
        "" => "info",
        other => other,
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,mkb={level},mkb_core={level},mkb_twitch_api={level},mkb_twitch_irc={level},{service_name}={level}"
        ))
    });

    let installed = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| Error::InvalidPath {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
            fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_ansi(true)
            .try_init(),
    };

    installed.map_err(|e| Error::Config(format!("logging init failed: {e}")))
}
