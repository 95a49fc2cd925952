use async_trait::async_trait;

use crate::{
    domain::{BroadcastId, UserId, UserIdentity},
    Result,
};

/// Identity and live-status lookups against the streaming platform.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// `Ok(None)` when no account has that login name.
    async fn lookup_user_by_name(&self, name: &str) -> Result<Option<UserIdentity>>;

    /// Unknown ids are reported as [`Error::NotFound`](crate::Error::NotFound).
    async fn lookup_channel_by_id(&self, id: &UserId) -> Result<UserIdentity>;

    /// `Ok(None)` when the broadcaster is offline.
    async fn current_live_session_id(&self, broadcaster: &UserId) -> Result<Option<BroadcastId>>;
}

/// Result of a bookmark call that reached the platform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BookmarkOutcome {
    Created { bookmark_id: Option<String> },
    /// The platform answered but refused; `code` is its error identifier.
    Rejected { code: String },
}

#[async_trait]
pub trait BookmarkService: Send + Sync {
    async fn create_bookmark(
        &self,
        description: &str,
        session: &BroadcastId,
    ) -> Result<BookmarkOutcome>;
}
