//! Streaming platform adapters: Helix identity/status lookups and GraphQL bookmarks.

pub mod gql;
pub mod helix;

use std::time::Duration;

use mkb_core::{domain::ComponentVersion, errors::Error, Result};

pub use gql::GqlBookmarks;
pub use helix::HelixClient;

pub const COMPONENT: ComponentVersion = ComponentVersion {
    name: "mkb-twitch-api",
    version: env!("CARGO_PKG_VERSION"),
};

/// Credentials shared by both platform APIs.
#[derive(Clone)]
pub struct ApiCredentials {
    pub client_id: String,
    pub oauth: String,
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("client_id", &self.client_id)
            .field("oauth", &"<redacted>")
            .finish()
    }
}

fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::External(format!("http client build error: {e}")))
}

/// Read the body and turn non-2xx responses into [`Error::External`].
async fn read_body(api: &str, resp: reqwest::Response) -> Result<String> {
    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| Error::External(format!("{api} read error: {e}")))?;
    if !status.is_success() {
        return Err(Error::External(format!(
            "{api} request failed: {status} {}",
            truncate(&body, 200)
        )));
    }
    Ok(body)
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
