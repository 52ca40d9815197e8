use serenity::all::{ChannelId, MessageId, UserId};
use strum_macros::{Display, EnumIter, EnumString};


/// Weak pointer to a message. Only ever resolved lazily, the message behind it
/// may have been deleted in the meantime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub message_id: MessageId,
    pub channel_id: ChannelId,
}

impl MessageRef {
    pub fn new(channel_id: ChannelId, message_id: MessageId) -> Self {
        MessageRef { message_id, channel_id }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberRecord {
    pub id: UserId,
    pub verified: bool,
    pub last_message: Option<MessageRef>,
}

/// Independent escalation counter namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Track {
    Content,
    Inactivity,
}

impl Track {

    /// Count at which an infraction terminates instead of warning.
    pub fn threshold(&self) -> u32 {
        match self {
            Track::Content    => 3,
            Track::Inactivity => 2,
        }
    }

}

#[derive(Debug, Clone, PartialEq)]
pub struct WarningRecord {
    pub member_id: UserId,
    pub track: Track,
    pub count: u32,
}
