//! Chat event dispatch.
//!
//! Each event is classified by [`commands::classify`], checked against the
//! authorization rules in [`security`], and handed to its handler. Unknown and
//! unauthorized commands get no reply at all, so a caller cannot tell a missing
//! command from a forbidden one.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::{
    commands::{self, ChannelCommand, ControlCommand, Route},
    domain::{ChannelName, ComponentVersion},
    errors::Error,
    markers::{MarkerOutcome, MarkerService},
    membership::{JoinOutcome, LeaveOutcome, Membership, MembershipTarget},
    messaging::{port::ChatTransport, types::ChatEvent},
    ports::{BookmarkService, UserDirectory},
    registry::{Change, ChannelRegistry},
    replies, security,
};

/// Who the bot is on the chat network.
#[derive(Clone, Debug)]
pub struct BotIdentity {
    /// Name used in replies.
    pub username: String,
    /// The bot's own room.
    pub control_room: ChannelName,
}

impl BotIdentity {
    pub fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
            control_room: ChannelName::new(username),
        }
    }
}

pub struct Dispatcher {
    identity: BotIdentity,
    registry: Arc<ChannelRegistry>,
    transport: Arc<dyn ChatTransport>,
    directory: Arc<dyn UserDirectory>,
    membership: Membership,
    markers: MarkerService,
    versions: Vec<ComponentVersion>,
    started_at: DateTime<Utc>,
}

impl Dispatcher {
    pub fn new(
        identity: BotIdentity,
        registry: Arc<ChannelRegistry>,
        transport: Arc<dyn ChatTransport>,
        directory: Arc<dyn UserDirectory>,
        bookmarks: Arc<dyn BookmarkService>,
        versions: Vec<ComponentVersion>,
    ) -> Self {
        let membership = Membership::new(registry.clone(), transport.clone(), directory.clone());
        let markers = MarkerService::new(registry.clone(), directory.clone(), bookmarks);
        Self {
            identity,
            registry,
            transport,
            directory,
            membership,
            markers,
            versions,
            started_at: Utc::now(),
        }
    }

    pub async fn handle_event(&self, ev: &ChatEvent) {
        let Some(route) = commands::classify(&self.identity.control_room, &ev.channel, &ev.text)
        else {
            return;
        };

        match route {
            Route::Control(cmd) => self.handle_control(ev, cmd).await,
            Route::Channel(cmd) => self.handle_channel(ev, cmd).await,
        }
    }

    // ============== Control room ==============

    async fn handle_control(&self, ev: &ChatEvent, cmd: ControlCommand) {
        let is_admin = self
            .registry
            .read(|s| security::is_global_admin(s, &ev.sender_id))
            .await;
        let bot = self.identity.username.as_str();

        match cmd {
            ControlCommand::Join { target: Some(target) } if !is_admin => {
                self.reply(&ev.channel, &replies::join_not_allowed(bot, &target))
                    .await;
            }
            ControlCommand::Join { target } => {
                let target = match target {
                    Some(name) => MembershipTarget::Named(name),
                    None => MembershipTarget::Caller(ev.sender_id.clone()),
                };
                let text = match self.membership.join(&target).await {
                    JoinOutcome::Joined(name) => replies::joined(bot, name.as_str()),
                    JoinOutcome::AlreadyActive(_) => replies::ALREADY_ACTIVE.to_string(),
                    JoinOutcome::Failed => replies::GENERIC_ERROR.to_string(),
                    JoinOutcome::NotSaved => replies::NOT_SAVED.to_string(),
                };
                self.reply(&ev.channel, &text).await;
            }
            ControlCommand::Leave { target: Some(target) } if !is_admin => {
                self.reply(&ev.channel, &replies::leave_not_allowed(bot, &target))
                    .await;
            }
            ControlCommand::Leave { target } => {
                let target = match target {
                    Some(name) => MembershipTarget::Named(name),
                    None => MembershipTarget::Caller(ev.sender_id.clone()),
                };
                match self.membership.leave(&target).await {
                    LeaveOutcome::Left(name) if name != ev.channel => {
                        self.reply(&ev.channel, &replies::left(name.as_str())).await;
                    }
                    LeaveOutcome::Left(_) => {}
                    LeaveOutcome::Failed => self.reply(&ev.channel, replies::GENERIC_ERROR).await,
                    LeaveOutcome::NotSaved => self.reply(&ev.channel, replies::NOT_SAVED).await,
                }
            }
            ControlCommand::Info if is_admin => {
                let text = self.info_text();
                self.reply(&ev.channel, &text).await;
            }
            ControlCommand::Broadcast { text } if is_admin => {
                self.broadcast(&ev.channel, &text).await;
            }
            ControlCommand::Info | ControlCommand::Broadcast { .. } => {
                debug!(user_id = %ev.sender_id, "ignoring admin command from non-admin");
            }
        }
    }

    async fn broadcast(&self, source: &ChannelName, text: &str) {
        let targets = self.registry.channel_names().await;
        for channel in &targets {
            if let Err(e) = self.transport.send(channel, text).await {
                warn!(channel = %channel, error = %e, "broadcast: send failed");
            }
        }
        info!(count = targets.len(), "broadcast sent");
        self.reply(source, &replies::broadcast_sent(targets.len()))
            .await;
    }

    fn info_text(&self) -> String {
        let components = self
            .versions
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" - ");
        let uptime = (Utc::now() - self.started_at).num_seconds();
        format!("{components} - up {}", format_duration(uptime))
    }

    // ============== Managed rooms ==============

    async fn handle_channel(&self, ev: &ChatEvent, cmd: ChannelCommand) {
        let (registered, may_mark, may_manage) = self
            .registry
            .read(|s| {
                (
                    s.channel(&ev.channel).is_some(),
                    security::may_create_marker(s, &ev.sender_id, &ev.channel, ev.is_moderator),
                    security::may_manage_channel(s, &ev.sender_id, &ev.channel),
                )
            })
            .await;

        if !registered {
            debug!(channel = %ev.channel, "ignoring command in unregistered channel");
            return;
        }

        match cmd {
            ChannelCommand::Marker { description } if may_mark => {
                self.create_marker(ev, &description).await;
            }
            ChannelCommand::Marker { .. } => {
                debug!(channel = %ev.channel, user_id = %ev.sender_id, "marker not authorized");
            }
            _ if !may_manage => {
                debug!(channel = %ev.channel, user_id = %ev.sender_id, "management not authorized");
            }
            ChannelCommand::Leave => {
                if self.membership.depart(&ev.channel).await == LeaveOutcome::NotSaved {
                    self.reply(&ev.channel, replies::NOT_SAVED).await;
                }
            }
            ChannelCommand::ModsEnable => self.set_mods(&ev.channel, true).await,
            ChannelCommand::ModsDisable => self.set_mods(&ev.channel, false).await,
            ChannelCommand::AddUser { username } => {
                self.change_user(&ev.channel, username.as_deref(), UserChange::Add)
                    .await;
            }
            ChannelCommand::RemoveUser { username } => {
                self.change_user(&ev.channel, username.as_deref(), UserChange::Remove)
                    .await;
            }
        }
    }

    async fn create_marker(&self, ev: &ChatEvent, description: &str) {
        let requester = ev.sender_display_name.as_str();
        let text = match self
            .markers
            .create_marker(&ev.channel, description, requester)
            .await
        {
            MarkerOutcome::Created => replies::marker_created(requester, description.trim()),
            MarkerOutcome::NotLive => replies::marker_not_live(requester),
            MarkerOutcome::Failed => replies::marker_failed(requester),
        };
        self.reply(&ev.channel, &text).await;
    }

    async fn set_mods(&self, channel: &ChannelName, enabled: bool) {
        let text = match (self.registry.set_enable_all_mods(channel, enabled).await, enabled) {
            (Ok(Change::Applied), true) => replies::MODS_ENABLED,
            (Ok(Change::Applied), false) => replies::MODS_DISABLED,
            (Ok(Change::Unchanged), true) => replies::MODS_ALREADY_ENABLED,
            (Ok(Change::Unchanged), false) => replies::MODS_ALREADY_DISABLED,
            (Err(e), _) => {
                error!(channel = %channel, error = %e, "mods toggle failed");
                failure_reply(&e)
            }
        };
        self.reply(channel, text).await;
    }

    async fn change_user(&self, channel: &ChannelName, username: Option<&str>, change: UserChange) {
        let Some(username) = username else {
            self.reply(channel, replies::USERNAME_REQUIRED).await;
            return;
        };

        let identity = match self.directory.lookup_user_by_name(username).await {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                error!(channel = %channel, username, "user lookup: no such user");
                self.reply(channel, replies::UNKNOWN_USER).await;
                return;
            }
            Err(e) => {
                error!(channel = %channel, username, error = %e, "user lookup failed");
                self.reply(channel, replies::UNKNOWN_USER).await;
                return;
            }
        };

        let result = match change {
            UserChange::Add => self.registry.add_authorized_user(channel, &identity.id).await,
            UserChange::Remove => {
                self.registry
                    .remove_authorized_user(channel, &identity.id)
                    .await
            }
        };
        let name = identity.name.as_str();
        let text = match (result, change) {
            (Ok(Change::Applied), UserChange::Add) => replies::user_added(name),
            (Ok(Change::Unchanged), UserChange::Add) => replies::user_already_authorized(name),
            (Ok(Change::Applied), UserChange::Remove) => replies::user_removed(name),
            (Ok(Change::Unchanged), UserChange::Remove) => replies::user_already_unauthorized(name),
            (Err(e), _) => {
                error!(
                    channel = %channel,
                    user_id = %identity.id,
                    error = %e,
                    "allow-list update failed"
                );
                failure_reply(&e).to_string()
            }
        };
        self.reply(channel, &text).await;
    }

    async fn reply(&self, channel: &ChannelName, text: &str) {
        if let Err(e) = self.transport.send(channel, text).await {
            warn!(channel = %channel, error = %e, "reply not sent");
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum UserChange {
    Add,
    Remove,
}

fn failure_reply(e: &Error) -> &'static str {
    match e {
        Error::Persist(_) => replies::NOT_SAVED,
        _ => replies::GENERIC_ERROR,
    }
}

fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let mins = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if days > 0 {
        return format!("{days}d {hours}h");
    }
    if hours > 0 {
        return format!("{hours}h {mins}m");
    }
    if mins > 0 {
        return format!("{mins}m {secs}s");
    }
    format!("{secs}s")
}
