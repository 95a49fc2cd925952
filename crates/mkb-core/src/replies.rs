//! User-facing chat replies.

pub const GENERIC_ERROR: &str = "An error occurred.";
pub const NOT_SAVED: &str = "An error occurred. The change could not be saved.";
pub const ALREADY_ACTIVE: &str = "The bot is already active for this channel.";
pub const GOODBYE: &str = "Goodbye.";

pub const MODS_ENABLED: &str =
    "The moderators of this channel are now authorized to create markers.";
pub const MODS_ALREADY_ENABLED: &str =
    "The moderators of this channel are already authorized to create markers.";
pub const MODS_DISABLED: &str =
    "The moderators of this channel are not authorized to create markers anymore.";
pub const MODS_ALREADY_DISABLED: &str =
    "The moderators of this channel are already not authorized to create markers.";

pub const USERNAME_REQUIRED: &str = "Please provide a username.";
pub const UNKNOWN_USER: &str = "An error occurred. Does this user exist?";

pub fn join_not_allowed(bot: &str, target: &str) -> String {
    format!(
        "You are not allowed to add {bot} to channel {target}. You can only add it to your own channel by typing !join"
    )
}

pub fn leave_not_allowed(bot: &str, target: &str) -> String {
    format!(
        "You are not allowed to remove {bot} from channel {target}. You can only remove it from your own channel by typing !leave"
    )
}

pub fn joined(bot: &str, channel: &str) -> String {
    format!("{bot} added to {channel}.")
}

pub fn left(channel: &str) -> String {
    format!("Left {channel}")
}

pub fn user_added(name: &str) -> String {
    format!("User {name} successfully added.")
}

pub fn user_already_authorized(name: &str) -> String {
    format!("User {name} is already authorized.")
}

pub fn user_removed(name: &str) -> String {
    format!("User {name} successfully removed.")
}

pub fn user_already_unauthorized(name: &str) -> String {
    format!("User {name} is already unauthorized.")
}

pub fn marker_not_live(requester: &str) -> String {
    format!("@{requester} an error occurred for this marker. Is this channel live?")
}

pub fn marker_failed(requester: &str) -> String {
    format!("@{requester} an error occurred for this marker.")
}

pub fn marker_created(requester: &str, description: &str) -> String {
    format!("@{requester} the marker {description} has been added.")
}

pub fn broadcast_sent(count: usize) -> String {
    format!("Sent {count} messages.")
}
