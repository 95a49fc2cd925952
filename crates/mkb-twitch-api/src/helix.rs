//! Helix REST lookups (users and streams).

use std::{sync::OnceLock, time::Duration};

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use mkb_core::{
    domain::{BroadcastId, UserId, UserIdentity},
    errors::Error,
    ports::UserDirectory,
    Result,
};

use crate::{http_client, read_body, ApiCredentials};

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct HelixUser {
    id: String,
    login: String,
}

#[derive(Debug, Deserialize)]
struct HelixStream {
    #[serde(default)]
    id: String,
}

#[derive(Clone, Debug)]
pub struct HelixClient {
    base_url: String,
    creds: ApiCredentials,
    http: reqwest::Client,
}

impl HelixClient {
    pub fn new(
        base_url: impl Into<String>,
        creds: ApiCredentials,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            creds,
            http: http_client(timeout)?,
        })
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<String> {
        let url = format!("{}/{path}", self.base_url);
        debug!(%url, ?query, "helix request");
        let resp = self
            .http
            .get(&url)
            .query(query)
            .header("Client-Id", &self.creds.client_id)
            .bearer_auth(&self.creds.oauth)
            .send()
            .await
            .map_err(|e| Error::External(format!("helix request error: {e}")))?;
        read_body("helix", resp).await
    }

    async fn users(&self, key: &str, value: &str) -> Result<Vec<UserIdentity>> {
        let body = self.get("users", &[(key, value)]).await?;
        parse_users(&body)
    }
}

#[async_trait]
impl UserDirectory for HelixClient {
    async fn lookup_user_by_name(&self, name: &str) -> Result<Option<UserIdentity>> {
        if !is_valid_login(name) {
            debug!(name, "not a valid login name");
            return Ok(None);
        }
        Ok(self.users("login", name).await?.into_iter().next())
    }

    async fn lookup_channel_by_id(&self, id: &UserId) -> Result<UserIdentity> {
        self.users("id", id.as_str())
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("user id {id}")))
    }

    async fn current_live_session_id(&self, broadcaster: &UserId) -> Result<Option<BroadcastId>> {
        let body = self
            .get("streams", &[("user_id", broadcaster.as_str())])
            .await?;
        parse_live_session(&body)
    }
}

/// Platform login grammar; anything else cannot name an account.
pub fn is_valid_login(name: &str) -> bool {
    static LOGIN: OnceLock<Option<Regex>> = OnceLock::new();
    LOGIN
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9_]{1,25}$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(name))
}

fn parse_users(body: &str) -> Result<Vec<UserIdentity>> {
    let page: Page<HelixUser> = serde_json::from_str(body)?;
    Ok(page
        .data
        .into_iter()
        .map(|u| UserIdentity {
            id: UserId(u.id),
            name: u.login,
        })
        .collect())
}

fn parse_live_session(body: &str) -> Result<Option<BroadcastId>> {
    let page: Page<HelixStream> = serde_json::from_str(body)?;
    Ok(page
        .data
        .into_iter()
        .next()
        .filter(|s| !s.id.trim().is_empty())
        .map(|s| BroadcastId(s.id)))
}
