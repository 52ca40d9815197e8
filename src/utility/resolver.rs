use chrono::{DateTime, Utc};
use futures::stream::{StreamExt, TryStreamExt};
use serenity::all::{
    ChannelId, ChannelType, CreateMessage, GuildId, GuildMemberUpdateEvent, Member,
    Message, RoleId, Timestamp, UserId,
};
use serenity::http::HttpError;
use serenity::prelude::*;

use crate::databases::MessageRef;
use crate::utility::mixed::BoxedFuture;
use crate::utility::traits::*;


impl From<serenity::Error> for PlatformError {
    fn from(err: serenity::Error) -> PlatformError {
        if let serenity::Error::Http(HttpError::UnsuccessfulRequest(response)) = &err {
            match response.status_code.as_u16() {
                404 => return PlatformError::NotFound,
                403 => return PlatformError::Forbidden,
                _   => {}
            }
        }
        PlatformError::Other(err.to_string())
    }
}

fn to_utc(timestamp: Timestamp) -> DateTime<Utc> {
    DateTime::from_timestamp(timestamp.unix_timestamp(), 0).unwrap_or_default()
}

impl From<&Member> for MemberSnapshot {
    fn from(member: &Member) -> MemberSnapshot {
        MemberSnapshot {
            id: member.user.id,
            bot: member.user.bot,
            display_name: member.display_name().to_string(),
            roles: member.roles.clone(),
            joined_at: member.joined_at.map(to_utc),
        }
    }
}

impl From<&GuildMemberUpdateEvent> for MemberSnapshot {
    fn from(event: &GuildMemberUpdateEvent) -> MemberSnapshot {
        MemberSnapshot {
            id: event.user.id,
            bot: event.user.bot,
            display_name: event.nick.clone()
                .unwrap_or_else(|| event.user.display_name().to_string()),
            roles: event.roles.clone(),
            joined_at: Some(to_utc(event.joined_at)),
        }
    }
}

impl From<&Message> for HistoryMessage {
    fn from(message: &Message) -> HistoryMessage {
        HistoryMessage {
            id: message.id,
            channel_id: message.channel_id,
            author_id: message.author.id,
            created_at: to_utc(message.timestamp),
            link: message.link(),
        }
    }
}

/// Builds the moderation view of a freshly sent guild message.
pub fn incoming_message(message: &Message) -> IncomingMessage {
    let (display_name, roles) = match &message.member {
        Some(member) => (
            member.nick.clone().unwrap_or_else(|| message.author.display_name().to_string()),
            member.roles.clone(),
        ),
        None => (message.author.display_name().to_string(), Vec::new()),
    };
    IncomingMessage {
        id: message.id,
        channel_id: message.channel_id,
        author: MemberSnapshot {
            id: message.author.id,
            bot: message.author.bot,
            display_name,
            roles,
            joined_at: message.member.as_ref()
                .and_then(|member| member.joined_at)
                .map(to_utc),
        },
        content: message.content.clone(),
    }
}

/// The managed guild as seen through one gateway context.
#[derive(Clone)]
pub struct Resolver {
    ctx: Context,
    guild: GuildId,
    channel_automod: ChannelId,
    channel_logs: ChannelId,
}

impl Resolver {

    pub fn new(ctx: Context, guild: GuildId, channel_automod: ChannelId, channel_logs: ChannelId) -> Resolver {
        Resolver { ctx, guild, channel_automod, channel_logs }
    }

    async fn say(&self, channel: ChannelId, content: String) -> PlatformResult<()> {
        channel.send_message(&self.ctx, CreateMessage::new().content(content)).await?;
        Ok(())
    }

}

impl Roster for Resolver {

    fn fetch_members<'a>(&'a self, after: Option<UserId>, limit: u64)
        -> BoxedFuture<'a, PlatformResult<Vec<MemberSnapshot>>> {
        Box::pin(async move {
            let members = self.guild.members(&self.ctx.http, Some(limit), after).await?;
            Ok(members.iter().map(MemberSnapshot::from).collect())
        })
    }

    fn members_with_roles<'a>(&'a self, roles: &'a [RoleId])
        -> BoxedFuture<'a, PlatformResult<Vec<MemberSnapshot>>> {
        Box::pin(async move {
            let guild = self.ctx.cache.guild(self.guild).ok_or(PlatformError::NotFound)?;
            Ok(guild.members.values()
                .filter(|member| member.roles.iter().any(|role| roles.contains(role)))
                .map(MemberSnapshot::from)
                .collect())
        })
    }
}

impl History for Resolver {

    fn text_channels<'a>(&'a self) -> BoxedFuture<'a, PlatformResult<Vec<ChannelId>>> {
        Box::pin(async move {
            let channels = self.guild.channels(&self.ctx.http).await?;
            Ok(channels.into_values()
                .filter(|channel| channel.kind == ChannelType::Text)
                .map(|channel| channel.id)
                .collect())
        })
    }

    fn channel_history<'a>(&'a self, channel: ChannelId, limit: usize)
        -> BoxedFuture<'a, PlatformResult<Vec<HistoryMessage>>> {
        Box::pin(async move {
            // pages through the history 100 messages per request
            let messages: Vec<Message> = channel.messages_iter(&self.ctx.http)
                .take(limit)
                .try_collect()
                .await?;
            Ok(messages.iter().map(HistoryMessage::from).collect())
        })
    }

    fn resolve_message<'a>(&'a self, reference: MessageRef)
        -> BoxedFuture<'a, PlatformResult<HistoryMessage>> {
        Box::pin(async move {
            let message = reference.channel_id.message(&self.ctx, reference.message_id).await?;
            Ok(HistoryMessage::from(&message))
        })
    }
}

impl Enforcer for Resolver {

    fn delete_message<'a>(&'a self, reference: MessageRef) -> BoxedFuture<'a, PlatformResult<()>> {
        Box::pin(async move {
            reference.channel_id.delete_message(&self.ctx.http, reference.message_id).await?;
            Ok(())
        })
    }

    fn kick<'a>(&'a self, member: UserId, reason: &'a str) -> BoxedFuture<'a, PlatformResult<()>> {
        Box::pin(async move {
            self.guild.kick_with_reason(&self.ctx.http, member, reason).await?;
            Ok(())
        })
    }

    fn ban<'a>(&'a self, member: UserId, reason: &'a str) -> BoxedFuture<'a, PlatformResult<()>> {
        Box::pin(async move {
            self.guild.ban_with_reason(&self.ctx.http, member, 0, reason).await?;
            Ok(())
        })
    }
}

impl Notifier for Resolver {

    fn notify_automod<'a>(&'a self, content: String) -> BoxedFuture<'a, PlatformResult<()>> {
        Box::pin(self.say(self.channel_automod, content))
    }

    fn notify_log<'a>(&'a self, content: String) -> BoxedFuture<'a, PlatformResult<()>> {
        Box::pin(self.say(self.channel_logs, content))
    }

    fn notify_member<'a>(&'a self, member: UserId, content: String) -> BoxedFuture<'a, PlatformResult<()>> {
        Box::pin(async move {
            member.direct_message(&self.ctx, CreateMessage::new().content(content)).await?;
            Ok(())
        })
    }
}
