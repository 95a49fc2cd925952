use std::sync::Arc;

use tracing::{error, info, warn};

use crate::{
    domain::{BroadcastId, ChannelName, UserId},
    ports::{BookmarkOutcome, BookmarkService, UserDirectory},
    registry::ChannelRegistry,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MarkerOutcome {
    Created,
    /// No live broadcast could be resolved; the bookmark call was not made.
    NotLive,
    Failed,
}

/// Resolve the live broadcast of a managed room and bookmark it. One attempt per call.
pub struct MarkerService {
    registry: Arc<ChannelRegistry>,
    directory: Arc<dyn UserDirectory>,
    bookmarks: Arc<dyn BookmarkService>,
}

impl MarkerService {
    pub fn new(
        registry: Arc<ChannelRegistry>,
        directory: Arc<dyn UserDirectory>,
        bookmarks: Arc<dyn BookmarkService>,
    ) -> Self {
        Self {
            registry,
            directory,
            bookmarks,
        }
    }

    pub async fn create_marker(
        &self,
        channel: &ChannelName,
        description: &str,
        requester: &str,
    ) -> MarkerOutcome {
        let Some(entry) = self.registry.channel(channel).await else {
            warn!(channel = %channel, "marker requested for unregistered channel");
            return MarkerOutcome::Failed;
        };

        let broadcaster = UserId(entry.broadcaster_id);
        let Some(session) = self.current_broadcast(channel, &broadcaster).await else {
            return MarkerOutcome::NotLive;
        };

        let text = bookmark_text(description, requester);
        match self.bookmarks.create_bookmark(&text, &session).await {
            Ok(BookmarkOutcome::Created { bookmark_id }) => {
                info!(channel = %channel, ?bookmark_id, requester = %requester, "marker created");
                MarkerOutcome::Created
            }
            Ok(BookmarkOutcome::Rejected { code }) => {
                error!(channel = %channel, code = %code, "bookmark rejected by platform");
                MarkerOutcome::Failed
            }
            Err(e) => {
                error!(channel = %channel, error = %e, "bookmark request failed");
                MarkerOutcome::Failed
            }
        }
    }

    async fn current_broadcast(
        &self,
        channel: &ChannelName,
        broadcaster: &UserId,
    ) -> Option<BroadcastId> {
        match self.directory.current_live_session_id(broadcaster).await {
            Ok(Some(id)) if !id.0.trim().is_empty() => Some(id),
            Ok(_) => None,
            Err(e) => {
                error!(channel = %channel, error = %e, "live status lookup failed");
                None
            }
        }
    }
}

/// Description stored on the bookmark: the requested text plus who asked for it.
pub fn bookmark_text(description: &str, requester: &str) -> String {
    let description = description.trim();
    if description.is_empty() {
        format!("by {requester}")
    } else {
        format!("{description} by {requester}")
    }
}
