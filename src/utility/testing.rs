use chrono::{DateTime, Duration, Utc};
use serenity::all::{ChannelId, MessageId, RoleId, UserId};

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::databases::MessageRef;
use crate::utility::mixed::BoxedFuture;
use crate::utility::traits::*;


#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Deleted(MessageRef),
    Kicked(UserId, String),
    Banned(UserId, String),
    Automod(String),
    Log(String),
    Direct(UserId, String),
}

/// In-memory stand-in for the chat platform that records every side effect.
#[derive(Default)]
pub struct FakePlatform {
    pub members: Vec<MemberSnapshot>,
    /// Channel histories, newest message first.
    pub channels: BTreeMap<ChannelId, Vec<HistoryMessage>>,
    pub resolvable: HashMap<MessageRef, HistoryMessage>,
    pub unreachable: HashSet<MessageRef>,
    pub forbidden_channels: HashSet<ChannelId>,
    pub closed_dms: HashSet<UserId>,
    pub failing_enforcement: bool,
    pub history_calls: AtomicUsize,
    effects: Mutex<Vec<Effect>>,
}

impl FakePlatform {

    pub fn new() -> Self {
        FakePlatform::default()
    }

    pub fn with_member(mut self, member: MemberSnapshot) -> Self {
        self.members.push(member);
        self.members.sort_by_key(|member| member.id);
        self
    }

    /// Adds a message to its channel's history, optionally resolvable by pointer.
    pub fn with_message(mut self, message: HistoryMessage, resolvable: bool) -> Self {
        if resolvable {
            self.resolvable.insert(message.reference(), message.clone());
        }
        let history = self.channels.entry(message.channel_id).or_default();
        history.push(message);
        history.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self
    }

    pub fn with_channel(mut self, channel: ChannelId) -> Self {
        self.channels.entry(channel).or_default();
        self
    }

    pub fn effects(&self) -> Vec<Effect> {
        self.effects.lock().unwrap().clone()
    }

    pub fn directs_to(&self, member: UserId) -> Vec<String> {
        self.effects().into_iter()
            .filter_map(|effect| match effect {
                Effect::Direct(id, content) if id == member => Some(content),
                _ => None,
            })
            .collect()
    }

    pub fn was_banned(&self, member: UserId) -> bool {
        self.effects().iter().any(|effect| matches!(effect, Effect::Banned(id, _) if *id == member))
    }

    pub fn was_kicked(&self, member: UserId) -> bool {
        self.effects().iter().any(|effect| matches!(effect, Effect::Kicked(id, _) if *id == member))
    }

    fn record(&self, effect: Effect) {
        self.effects.lock().unwrap().push(effect);
    }

}

impl Roster for FakePlatform {

    fn fetch_members<'a>(&'a self, after: Option<UserId>, limit: u64)
        -> BoxedFuture<'a, PlatformResult<Vec<MemberSnapshot>>> {
        Box::pin(async move {
            Ok(self.members.iter()
                .filter(|member| after.map_or(true, |after| member.id > after))
                .take(limit as usize)
                .cloned()
                .collect())
        })
    }

    fn members_with_roles<'a>(&'a self, roles: &'a [RoleId])
        -> BoxedFuture<'a, PlatformResult<Vec<MemberSnapshot>>> {
        Box::pin(async move {
            Ok(self.members.iter()
                .filter(|member| member.has_any_role(roles))
                .cloned()
                .collect())
        })
    }
}

impl History for FakePlatform {

    fn text_channels<'a>(&'a self) -> BoxedFuture<'a, PlatformResult<Vec<ChannelId>>> {
        Box::pin(async move { Ok(self.channels.keys().copied().collect()) })
    }

    fn channel_history<'a>(&'a self, channel: ChannelId, limit: usize)
        -> BoxedFuture<'a, PlatformResult<Vec<HistoryMessage>>> {
        Box::pin(async move {
            self.history_calls.fetch_add(1, Ordering::SeqCst);
            if self.forbidden_channels.contains(&channel) {
                return Err(PlatformError::Forbidden);
            }
            Ok(self.channels.get(&channel)
                .map(|history| history.iter().take(limit).cloned().collect())
                .unwrap_or_default())
        })
    }

    fn resolve_message<'a>(&'a self, reference: MessageRef)
        -> BoxedFuture<'a, PlatformResult<HistoryMessage>> {
        Box::pin(async move {
            if self.unreachable.contains(&reference) {
                return Err(PlatformError::Other("gateway timeout".to_string()));
            }
            self.resolvable.get(&reference).cloned().ok_or(PlatformError::NotFound)
        })
    }
}

impl Enforcer for FakePlatform {

    fn delete_message<'a>(&'a self, reference: MessageRef) -> BoxedFuture<'a, PlatformResult<()>> {
        Box::pin(async move {
            if self.failing_enforcement {
                return Err(PlatformError::Forbidden);
            }
            self.record(Effect::Deleted(reference));
            Ok(())
        })
    }

    fn kick<'a>(&'a self, member: UserId, reason: &'a str) -> BoxedFuture<'a, PlatformResult<()>> {
        Box::pin(async move {
            if self.failing_enforcement {
                return Err(PlatformError::Forbidden);
            }
            self.record(Effect::Kicked(member, reason.to_string()));
            Ok(())
        })
    }

    fn ban<'a>(&'a self, member: UserId, reason: &'a str) -> BoxedFuture<'a, PlatformResult<()>> {
        Box::pin(async move {
            if self.failing_enforcement {
                return Err(PlatformError::Forbidden);
            }
            self.record(Effect::Banned(member, reason.to_string()));
            Ok(())
        })
    }
}

impl Notifier for FakePlatform {

    fn notify_automod<'a>(&'a self, content: String) -> BoxedFuture<'a, PlatformResult<()>> {
        Box::pin(async move {
            self.record(Effect::Automod(content));
            Ok(())
        })
    }

    fn notify_log<'a>(&'a self, content: String) -> BoxedFuture<'a, PlatformResult<()>> {
        Box::pin(async move {
            self.record(Effect::Log(content));
            Ok(())
        })
    }

    fn notify_member<'a>(&'a self, member: UserId, content: String) -> BoxedFuture<'a, PlatformResult<()>> {
        Box::pin(async move {
            if self.closed_dms.contains(&member) {
                return Err(PlatformError::Forbidden);
            }
            self.record(Effect::Direct(member, content));
            Ok(())
        })
    }
}


pub fn member(id: u64, name: &str) -> MemberSnapshot {
    MemberSnapshot {
        id: UserId::new(id),
        bot: false,
        display_name: name.to_string(),
        roles: Vec::new(),
        joined_at: None,
    }
}

pub fn history_message(id: u64, channel: u64, author: u64, created_at: DateTime<Utc>) -> HistoryMessage {
    HistoryMessage {
        id: MessageId::new(id),
        channel_id: ChannelId::new(channel),
        author_id: UserId::new(author),
        created_at,
        link: format!("https://discord.com/channels/1/{}/{}", channel, id),
    }
}

pub fn days_ago(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    now - Duration::days(days) - Duration::hours(1)
}
