use chrono::{DateTime, Utc};
use serenity::all::{ChannelId, MessageId, RoleId, UserId};

use std::fmt;

use crate::databases::MessageRef;
use crate::utility::logger::Logger;
use crate::utility::mixed::BoxedFuture;


#[derive(Debug, Clone, PartialEq)]
pub enum PlatformError {
    NotFound,
    Forbidden,
    Other(String),
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PlatformError::NotFound       => write!(f, "not found"),
            PlatformError::Forbidden      => write!(f, "forbidden"),
            PlatformError::Other(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for PlatformError {}

pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

/// Swallows a failed side effect after logging it.
pub fn best_effort(result: PlatformResult<()>, action: &str) {
    if let Err(err) = result {
        Logger::warn_long(action, &err.to_string());
    }
}


/// A member of the managed community as the moderation rules see it.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberSnapshot {
    pub id: UserId,
    pub bot: bool,
    pub display_name: String,
    pub roles: Vec<RoleId>,
    pub joined_at: Option<DateTime<Utc>>,
}

impl MemberSnapshot {
    pub fn has_any_role(&self, roles: &[RoleId]) -> bool {
        self.roles.iter().any(|role| roles.contains(role))
    }
}

/// A message read back from the platform (history scan or pointer resolution).
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub author_id: UserId,
    pub created_at: DateTime<Utc>,
    pub link: String,
}

impl HistoryMessage {
    pub fn reference(&self) -> MessageRef {
        MessageRef::new(self.channel_id, self.id)
    }
}

/// A freshly sent guild message, the input of the reactive rules.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub author: MemberSnapshot,
    pub content: String,
}

impl IncomingMessage {
    pub fn reference(&self) -> MessageRef {
        MessageRef::new(self.channel_id, self.id)
    }
}


/// Paginated member enumeration of the managed community.
pub trait Roster: Send + Sync {

    /// Up to `limit` members with ids greater than `after`, in ascending id order.
    fn fetch_members<'a>(&'a self, after: Option<UserId>, limit: u64)
        -> BoxedFuture<'a, PlatformResult<Vec<MemberSnapshot>>>;

    /// Everybody currently holding one of `roles`.
    fn members_with_roles<'a>(&'a self, roles: &'a [RoleId])
        -> BoxedFuture<'a, PlatformResult<Vec<MemberSnapshot>>>;
}

pub trait History: Send + Sync {

    fn text_channels<'a>(&'a self) -> BoxedFuture<'a, PlatformResult<Vec<ChannelId>>>;

    /// The most recent `limit` messages of a channel, newest first. Spans as
    /// many requests as needed.
    fn channel_history<'a>(&'a self, channel: ChannelId, limit: usize)
        -> BoxedFuture<'a, PlatformResult<Vec<HistoryMessage>>>;

    fn resolve_message<'a>(&'a self, reference: MessageRef)
        -> BoxedFuture<'a, PlatformResult<HistoryMessage>>;
}

pub trait Enforcer: Send + Sync {

    fn delete_message<'a>(&'a self, reference: MessageRef) -> BoxedFuture<'a, PlatformResult<()>>;

    fn kick<'a>(&'a self, member: UserId, reason: &'a str) -> BoxedFuture<'a, PlatformResult<()>>;

    fn ban<'a>(&'a self, member: UserId, reason: &'a str) -> BoxedFuture<'a, PlatformResult<()>>;
}

/// Fire-and-forget text delivery. Callers ignore failures.
pub trait Notifier: Send + Sync {

    /// Moderator channel for what the filters matched.
    fn notify_automod<'a>(&'a self, content: String) -> BoxedFuture<'a, PlatformResult<()>>;

    /// Moderator channel for enforcement actions.
    fn notify_log<'a>(&'a self, content: String) -> BoxedFuture<'a, PlatformResult<()>>;

    fn notify_member<'a>(&'a self, member: UserId, content: String) -> BoxedFuture<'a, PlatformResult<()>>;
}

pub trait Platform: Roster + History + Enforcer + Notifier {}

impl<T: Roster + History + Enforcer + Notifier> Platform for T {}
