use crate::domain::{ChannelName, UserId};

/// One chat line received in a room the bot is in.
#[derive(Clone, Debug)]
pub struct ChatEvent {
    pub channel: ChannelName,
    pub sender_id: UserId,
    pub sender_display_name: String,
    pub text: String,
    pub is_moderator: bool,
}
