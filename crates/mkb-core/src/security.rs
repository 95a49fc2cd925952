use crate::{
    domain::{ChannelName, UserId},
    settings::BotSettings,
};

// ============== Authorization ==============
//
// Pure decisions over a settings snapshot. Global admin and broadcaster checks
// are evaluated before the per-channel allow-list and the moderator toggle.

pub fn is_global_admin(settings: &BotSettings, user_id: &UserId) -> bool {
    settings.global_admins.contains(user_id.as_str())
}

/// Unknown channels never have a broadcaster.
pub fn is_broadcaster(settings: &BotSettings, user_id: &UserId, channel: &ChannelName) -> bool {
    settings
        .channel(channel)
        .is_some_and(|c| c.broadcaster_id == user_id.0)
}

pub fn is_authorized(settings: &BotSettings, user_id: &UserId, channel: &ChannelName) -> bool {
    if is_global_admin(settings, user_id) || is_broadcaster(settings, user_id, channel) {
        return true;
    }
    settings
        .channel(channel)
        .is_some_and(|c| c.is_authorized_user(user_id))
}

/// `!marker` eligibility.
pub fn may_create_marker(
    settings: &BotSettings,
    user_id: &UserId,
    channel: &ChannelName,
    is_moderator: bool,
) -> bool {
    if is_authorized(settings, user_id, channel) {
        return true;
    }
    is_moderator
        && settings
            .channel(channel)
            .is_some_and(|c| c.enable_all_mods)
}

/// Eligibility for the `!markerbot` management family.
pub fn may_manage_channel(settings: &BotSettings, user_id: &UserId, channel: &ChannelName) -> bool {
    is_broadcaster(settings, user_id, channel) || is_global_admin(settings, user_id)
}
