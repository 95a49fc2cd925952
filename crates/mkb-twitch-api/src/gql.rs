//! GraphQL `createVideoBookmark` mutation.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use mkb_core::{
    domain::BroadcastId,
    errors::Error,
    ports::{BookmarkOutcome, BookmarkService},
    Result,
};

use crate::{http_client, read_body, truncate, ApiCredentials};

const CREATE_BOOKMARK: &str = "mutation CreateVideoBookmark($input: CreateVideoBookmarkInput!) { \
     createVideoBookmark(input: $input) { error { code } videoBookmark { id } } }";

#[derive(Debug, Deserialize)]
struct Response {
    data: Option<Data>,
    #[serde(default)]
    errors: Vec<GqlError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Data {
    create_video_bookmark: Option<Payload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Payload {
    error: Option<PayloadError>,
    video_bookmark: Option<VideoBookmark>,
}

#[derive(Debug, Deserialize)]
struct PayloadError {
    #[serde(default)]
    code: String,
}

#[derive(Debug, Deserialize)]
struct VideoBookmark {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GqlError {
    #[serde(default)]
    message: String,
}

#[derive(Clone, Debug)]
pub struct GqlBookmarks {
    url: String,
    creds: ApiCredentials,
    http: reqwest::Client,
}

impl GqlBookmarks {
    pub fn new(url: impl Into<String>, creds: ApiCredentials, timeout: Duration) -> Result<Self> {
        Ok(Self {
            url: url.into(),
            creds,
            http: http_client(timeout)?,
        })
    }
}

#[async_trait]
impl BookmarkService for GqlBookmarks {
    async fn create_bookmark(
        &self,
        description: &str,
        session: &BroadcastId,
    ) -> Result<BookmarkOutcome> {
        debug!(broadcast_id = %session.0, "gql createVideoBookmark");
        let resp = self
            .http
            .post(&self.url)
            .header("Client-Id", &self.creds.client_id)
            .header("Authorization", format!("OAuth {}", self.creds.oauth))
            .json(&request_body(description, session))
            .send()
            .await
            .map_err(|e| Error::External(format!("gql request error: {e}")))?;
        let body = read_body("gql", resp).await?;
        parse_outcome(&body)
    }
}

fn request_body(description: &str, session: &BroadcastId) -> serde_json::Value {
    json!({
        "operationName": "CreateVideoBookmark",
        "query": CREATE_BOOKMARK,
        "variables": {
            "input": {
                "broadcastID": session.0,
                "description": description,
                "medium": "chat",
                "platform": "web",
            }
        }
    })
}

fn parse_outcome(body: &str) -> Result<BookmarkOutcome> {
    let resp: Response = serde_json::from_str(body)?;
    if let Some(first) = resp.errors.first() {
        return Ok(BookmarkOutcome::Rejected {
            code: truncate(&first.message, 200),
        });
    }
    let payload = resp
        .data
        .and_then(|d| d.create_video_bookmark)
        .ok_or_else(|| Error::External("gql response without createVideoBookmark".to_string()))?;
    if let Some(err) = payload.error {
        return Ok(BookmarkOutcome::Rejected { code: err.code });
    }
    Ok(BookmarkOutcome::Created {
        bookmark_id: payload.video_bookmark.map(|b| b.id),
    })
}
