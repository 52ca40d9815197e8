use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serenity::all::{RoleId, UserId};
use tokio::sync::{watch, OnceCell};

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use crate::databases::*;
use crate::utility::config::{Band, Config, InactivityPolicy};
use crate::utility::escalation::{EscalationTracker, Verdict};
use crate::utility::logger::Logger;
use crate::utility::member_locks::{MemberGuard, MemberLocks};
use crate::utility::mixed::days_between;
use crate::utility::traits::*;


const PAGE_SIZE: u64 = 1000;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    pub scanned: usize,
    pub unknown_activity: usize,
    pub notices: usize,
    pub kicks: usize,
    pub errors: usize,
    pub cancelled: bool,
}

impl SweepReport {
    pub fn summary(&self) -> String {
        format!("{} scanned, {} unknown, {} notices, {} kicks, {} errors{}",
            self.scanned, self.unknown_activity, self.notices, self.kicks, self.errors,
            if self.cancelled { " (cancelled)" } else { "" })
    }
}

#[derive(Debug, PartialEq)]
enum Outcome {
    Exempt,
    Unknown,
    Unchanged,
    Notified,
    Kicked,
    KickFailed,
}

/// Latest message per author across the bounded history of every text channel.
type HistorySnapshot = OnceCell<HashMap<UserId, HistoryMessage>>;

struct RosterWalk<'a> {
    platform: &'a dyn Platform,
    page_size: u64,
    after: Option<UserId>,
    done: bool,
}

impl<'a> RosterWalk<'a> {

    fn new(platform: &'a dyn Platform, page_size: u64) -> Self {
        RosterWalk { platform, page_size, after: None, done: false }
    }

    async fn next_page(&mut self) -> PlatformResult<Option<Vec<MemberSnapshot>>> {
        if self.done {
            return Ok(None);
        }
        let page = self.platform.fetch_members(self.after, self.page_size).await?;
        self.done = (page.len() as u64) < self.page_size;
        self.after = page.last().map(|member| member.id);
        if page.is_empty() {
            return Ok(None);
        }
        Ok(Some(page))
    }

}

/// Periodic full-roster jobs: the inactivity sweep and the verification sweep.
pub struct Sweeper {
    platform: Arc<dyn Platform>,
    members: MembersDB,
    tracker: EscalationTracker,
    locks: MemberLocks,
    admin_roles: Vec<RoleId>,
    verified_role: Option<RoleId>,
    unverified_role: Option<RoleId>,
    policy: InactivityPolicy,
    history_message_limit: usize,
    history_concurrency: usize,
    verification_grace_hours: i64,
    page_size: u64,
}

impl Sweeper {

    pub fn new(config: &Config,
               platform: Arc<dyn Platform>,
               database: &Database,
               locks: MemberLocks
    ) -> Self {
        Sweeper {
            platform,
            members: MembersDB::new(database.clone()),
            tracker: EscalationTracker::new(WarningsDB::new(database.clone())),
            locks,
            admin_roles: config.admin_roles.clone(),
            verified_role: config.verified_role,
            unverified_role: config.unverified_role,
            policy: config.inactivity,
            history_message_limit: config.history_message_limit,
            history_concurrency: config.history_concurrency,
            verification_grace_hours: config.verification_grace_hours,
            page_size: PAGE_SIZE,
        }
    }

    #[cfg(test)]
    fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    fn is_exempt(&self, member: &MemberSnapshot) -> bool {
        member.bot || member.has_any_role(&self.admin_roles)
    }

    fn is_verified(&self, member: &MemberSnapshot) -> bool {
        self.verified_role.map_or(true, |role| member.roles.contains(&role))
            && !self.unverified_role.map_or(false, |role| member.roles.contains(&role))
    }

    pub async fn run_inactivity(&self, now: DateTime<Utc>, shutdown: &watch::Receiver<bool>) -> SweepReport {
        let mut report = SweepReport::default();
        let history = HistorySnapshot::new();
        let mut roster = RosterWalk::new(self.platform.as_ref(), self.page_size);

        loop {
            let page = match roster.next_page().await {
                Ok(Some(page)) => page,
                Ok(None) => break,
                Err(err) => {
                    Logger::err_long("Failed to fetch member roster", &err.to_string());
                    report.errors += 1;
                    break;
                }
            };

            for member in page.iter() {
                if *shutdown.borrow() {
                    report.cancelled = true;
                    return report;
                }
                report.scanned += 1;
                match self.sweep_member(member, now, &history).await {
                    Ok(Outcome::Unknown) => report.unknown_activity += 1,
                    Ok(Outcome::Notified) => report.notices += 1,
                    Ok(Outcome::Kicked) => report.kicks += 1,
                    Ok(Outcome::KickFailed) => report.errors += 1,
                    Ok(_) => {},
                    Err(err) => {
                        Logger::err_long(&format!("Failed to sweep member {}", member.id), &format!("{:#}", err));
                        report.errors += 1;
                    }
                }
            }
        }
        report
    }

    async fn sweep_member(&self,
                          member: &MemberSnapshot,
                          now: DateTime<Utc>,
                          history: &HistorySnapshot
    ) -> anyhow::Result<Outcome> {
        if self.is_exempt(member) {
            return Ok(Outcome::Exempt);
        }
        let guard = self.locks.lock(member.id).await;

        let Some(last) = self.last_activity(&guard, member, history).await? else {
            Logger::debug_long("Unknown activity", &member.display_name);
            return Ok(Outcome::Unknown);
        };
        let days = days_between(last.created_at, now);
        Logger::debug_long("Last activity", &format!("{} ({} days)", member.display_name, days));

        match self.policy.band(days) {
            Band::Active => Ok(Outcome::Unchanged),
            Band::Notice => {
                if !self.tracker.initialize(&guard, Track::Inactivity).await? {
                    return Ok(Outcome::Unchanged);
                }
                self.warn(member, &last, days, 1).await;
                Ok(Outcome::Notified)
            },
            Band::FinalNotice => match self.tracker.advance(&guard, Track::Inactivity).await? {
                Some(count) => {
                    self.warn(member, &last, days, count).await;
                    Ok(Outcome::Notified)
                },
                None => Ok(Outcome::Unchanged),
            },
            Band::Kick => match self.tracker.escalate(&guard, Track::Inactivity).await? {
                Verdict::Warn { count, .. } => {
                    self.warn(member, &last, days, count).await;
                    Ok(Outcome::Notified)
                },
                Verdict::Terminate => {
                    let outcome = self.kick(member, &last, days).await;
                    if outcome == Outcome::Kicked {
                        self.tracker.reset(&guard, Track::Inactivity).await?;
                    }
                    Ok(outcome)
                },
            },
        }
    }

    /// Resolves the member's last message, falling back to the channel history
    /// when there is no pointer or it went stale. A message found in history is
    /// persisted as the new pointer.
    async fn last_activity(&self,
                           guard: &MemberGuard,
                           member: &MemberSnapshot,
                           history: &HistorySnapshot
    ) -> anyhow::Result<Option<HistoryMessage>> {
        let id = guard.id();
        if let Some(record) = self.members.find(id).await? {
            if let Some(reference) = record.last_message {
                match self.platform.resolve_message(reference).await {
                    Ok(message) => return Ok(Some(message)),
                    Err(PlatformError::NotFound) => {
                        Logger::debug_long("Stale last message", &member.display_name);
                        self.members.unset_last_message(id).await?;
                    },
                    Err(err) => return Err(anyhow::Error::new(err)
                        .context(format!("Failed to resolve last message of {}", id))),
                }
            }
        }

        let snapshot = history.get_or_init(|| self.load_history()).await;
        match snapshot.get(&id) {
            Some(message) => {
                let verified = self.verified_role.map_or(false, |role| member.roles.contains(&role));
                self.members.set_last_message(id, message.reference(), verified).await?;
                Ok(Some(message.clone()))
            },
            None => Ok(None),
        }
    }

    async fn load_history(&self) -> HashMap<UserId, HistoryMessage> {
        let mut latest: HashMap<UserId, HistoryMessage> = HashMap::new();
        let channels = match self.platform.text_channels().await {
            Ok(channels) => channels,
            Err(err) => {
                Logger::warn_long("Failed to list text channels", &err.to_string());
                return latest;
            }
        };

        let limit = self.history_message_limit;
        let histories: Vec<_> = stream::iter(channels)
            .map(|channel| async move {
                (channel, self.platform.channel_history(channel, limit).await)
            })
            .buffer_unordered(self.history_concurrency)
            .collect()
            .await;

        for (channel, history) in histories {
            let messages = match history {
                Ok(messages) => messages,
                Err(err) => {
                    Logger::warn_long(&format!("Failed to read history of channel {}", channel), &err.to_string());
                    continue;
                }
            };
            for message in messages {
                match latest.entry(message.author_id) {
                    Entry::Occupied(mut entry) => {
                        if entry.get().created_at < message.created_at {
                            entry.insert(message);
                        }
                    },
                    Entry::Vacant(entry) => {
                        entry.insert(message);
                    },
                }
            }
        }
        latest
    }

    fn deadline(&self, days: i64) -> String {
        match self.policy.kick_days - days {
            left if left > 1 => format!("{} days", left),
            _ => "24 hours".to_string(),
        }
    }

    async fn warn(&self, member: &MemberSnapshot, last: &HistoryMessage, days: i64, count: u32) {
        let max = Track::Inactivity.threshold();
        Logger::info_long("Warning member for inactivity",
            &format!("{} ({} days, warning {}/{})", member.display_name, days, count, max));

        best_effort(self.platform.notify_member(member.id, format!(
            "Hi! This is a friendly reminder that you have been inactive for {} days \
             in the Nerva community server. You have not sent any message since `{}`. \
             If you would like to stay please post something within the next {}, \
             or else I will remove you.",
            days, last.created_at.format("%Y-%m-%d %H:%M UTC"), self.deadline(days))).await,
            "Failed to notify member");
        best_effort(self.platform.notify_log(format!(
            "**{}** has been warned for being inactive for {} days. Warning count: {}/{}.\n\
             Last message: {}",
            member.display_name, days, count, max, last.link)).await,
            "Failed to notify log channel");
    }

    async fn kick(&self, member: &MemberSnapshot, last: &HistoryMessage, days: i64) -> Outcome {
        Logger::info_long("Kicking member for inactivity", &format!("{} ({} days)", member.display_name, days));
        let reason = format!("Inactive for {} days.", days);
        match self.platform.kick(member.id, &reason).await {
            Ok(_) => {
                best_effort(self.platform.notify_log(format!(
                    "**{}** has been kicked for being inactive.\n\
                     Last message: {}\n\
                     Days since last message: {}",
                    member.display_name, last.link, days)).await,
                    "Failed to notify log channel");
                Outcome::Kicked
            },
            Err(err) => {
                Logger::err_long(&format!("Failed to kick {}", member.display_name), &err.to_string());
                best_effort(self.platform.notify_log(format!(
                    "Failed to kick **{}** for being inactive: {}", member.display_name, err)).await,
                    "Failed to notify log channel");
                Outcome::KickFailed
            }
        }
    }

    /// Kicks members that have not verified within the grace period after joining.
    pub async fn run_verification(&self, now: DateTime<Utc>, shutdown: &watch::Receiver<bool>) -> SweepReport {
        let mut report = SweepReport::default();
        if self.verified_role.is_none() && self.unverified_role.is_none() {
            return report;
        }
        let mut roster = RosterWalk::new(self.platform.as_ref(), self.page_size);

        loop {
            let page = match roster.next_page().await {
                Ok(Some(page)) => page,
                Ok(None) => break,
                Err(err) => {
                    Logger::err_long("Failed to fetch member roster", &err.to_string());
                    report.errors += 1;
                    break;
                }
            };

            for member in page.iter() {
                if *shutdown.borrow() {
                    report.cancelled = true;
                    return report;
                }
                report.scanned += 1;
                if self.is_exempt(member) || self.is_verified(member) {
                    continue;
                }
                let Some(joined_at) = member.joined_at else {
                    continue;
                };
                if (now - joined_at).num_hours() < self.verification_grace_hours {
                    continue;
                }

                Logger::info_long("Kicking unverified member", &member.display_name);
                let reason = format!("Not verified within {}h.", self.verification_grace_hours);
                match self.platform.kick(member.id, &reason).await {
                    Ok(_) => {
                        report.kicks += 1;
                        best_effort(self.platform.notify_log(format!(
                            "**{}** has been kicked for not verifying within {}h.",
                            member.display_name, self.verification_grace_hours)).await,
                            "Failed to notify log channel");
                    },
                    Err(err) => {
                        report.errors += 1;
                        Logger::err_long(&format!("Failed to kick {}", member.display_name), &err.to_string());
                    }
                }
            }
        }
        report
    }

}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::utility::testing::*;
    use chrono::Duration as ChronoDuration;
    use serenity::all::{ChannelId, GuildId, MessageId};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    const ADMIN: u64 = 900;
    const VERIFIED: u64 = 901;
    const UNVERIFIED: u64 = 902;

    fn config() -> Config {
        Config {
            token: String::new(),
            guild: GuildId::new(1),
            admin_roles: vec![RoleId::new(ADMIN)],
            verified_role: Some(RoleId::new(VERIFIED)),
            unverified_role: Some(RoleId::new(UNVERIFIED)),
            channel_automod: ChannelId::new(2),
            channel_logs: ChannelId::new(3),
            name_blacklist: Vec::new(),
            message_blacklist: Vec::new(),
            inactivity: InactivityPolicy::default(),
            history_message_limit: 100,
            history_concurrency: 2,
            sweep_interval: Duration::from_secs(60),
            verification_grace_hours: 24,
        }
    }

    struct Setup {
        platform: Arc<FakePlatform>,
        sweeper: Sweeper,
        database: Database,
        locks: MemberLocks,
    }

    fn setup(platform: FakePlatform) -> Setup {
        setup_with(platform, &config())
    }

    fn setup_with(platform: FakePlatform, config: &Config) -> Setup {
        let platform = Arc::new(platform);
        let database = Database::in_memory().unwrap();
        let locks = MemberLocks::new();
        let sweeper = Sweeper::new(config, platform.clone(), &database, locks.clone());
        Setup { platform, sweeper, database, locks }
    }

    fn idle() -> watch::Receiver<bool> {
        watch::channel(false).1
    }

    impl Setup {
        async fn warnings(&self, id: u64) -> u32 {
            let guard = self.locks.lock(UserId::new(id)).await;
            self.sweeper.tracker.current(&guard, Track::Inactivity).await.unwrap()
        }

        async fn set_warnings(&self, id: u64, count: u32) {
            WarningsDB::new(self.database.clone())
                .set(UserId::new(id), Track::Inactivity, count).await.unwrap();
        }

        async fn point_at(&self, id: u64, message: &HistoryMessage) {
            MembersDB::new(self.database.clone())
                .set_last_message(UserId::new(id), message.reference(), true).await.unwrap();
        }

        async fn record(&self, id: u64) -> Option<MemberRecord> {
            MembersDB::new(self.database.clone()).find(UserId::new(id)).await.unwrap()
        }
    }

    /// Member 10 whose last message, known by pointer, is `days` old.
    async fn inactive_for(days: i64, now: DateTime<Utc>) -> Setup {
        let last = history_message(500, 50, 10, days_ago(now, days));
        let setup = setup(FakePlatform::new()
            .with_member(member(10, "alice"))
            .with_message(last.clone(), true));
        setup.point_at(10, &last).await;
        setup
    }

    #[tokio::test]
    async fn recent_activity_takes_no_action() {
        let now = Utc::now();
        let setup = inactive_for(177, now).await;
        let report = setup.sweeper.run_inactivity(now, &idle()).await;
        assert_eq!(report.scanned, 1);
        assert_eq!(report.notices, 0);
        assert_eq!(setup.warnings(10).await, 0);
        assert!(setup.platform.effects().is_empty());
    }

    #[tokio::test]
    async fn first_notice_band_starts_the_track() {
        let now = Utc::now();
        let setup = inactive_for(178, now).await;
        let report = setup.sweeper.run_inactivity(now, &idle()).await;
        assert_eq!(report.notices, 1);
        assert_eq!(setup.warnings(10).await, 1);
        assert!(setup.platform.directs_to(UserId::new(10))[0].contains("within the next 2 days"));

        // a second run on the same day does not warn again
        let report = setup.sweeper.run_inactivity(now, &idle()).await;
        assert_eq!(report.notices, 0);
        assert_eq!(setup.platform.directs_to(UserId::new(10)).len(), 1);
    }

    #[tokio::test]
    async fn final_notice_band_advances_the_track() {
        let now = Utc::now();
        let setup = inactive_for(179, now).await;
        setup.set_warnings(10, 1).await;
        setup.sweeper.run_inactivity(now, &idle()).await;
        assert_eq!(setup.warnings(10).await, 2);
        assert!(setup.platform.directs_to(UserId::new(10))[0].contains("24 hours"));
        assert!(!setup.platform.was_kicked(UserId::new(10)));

        setup.sweeper.run_inactivity(now, &idle()).await;
        assert_eq!(setup.warnings(10).await, 2);
        assert_eq!(setup.platform.directs_to(UserId::new(10)).len(), 1);
    }

    #[tokio::test]
    async fn kick_band_with_two_prior_warnings_kicks() {
        let now = Utc::now();
        let setup = inactive_for(180, now).await;
        setup.set_warnings(10, 2).await;
        let report = setup.sweeper.run_inactivity(now, &idle()).await;
        assert_eq!(report.kicks, 1);
        assert!(setup.platform.was_kicked(UserId::new(10)));
        assert_eq!(setup.warnings(10).await, 0);
        assert!(setup.platform.effects().iter().any(|effect| matches!(effect,
            Effect::Log(content) if content.contains("https://discord.com/channels/1/50/500"))));
    }

    #[tokio::test]
    async fn kick_band_without_warnings_warns_twice_first() {
        let now = Utc::now();
        let setup = inactive_for(300, now).await;
        setup.sweeper.run_inactivity(now, &idle()).await;
        assert!(!setup.platform.was_kicked(UserId::new(10)));
        assert_eq!(setup.warnings(10).await, 1);

        setup.sweeper.run_inactivity(now, &idle()).await;
        assert!(!setup.platform.was_kicked(UserId::new(10)));
        assert_eq!(setup.warnings(10).await, 2);
        assert_eq!(setup.platform.directs_to(UserId::new(10)).len(), 2);

        setup.sweeper.run_inactivity(now, &idle()).await;
        assert!(setup.platform.was_kicked(UserId::new(10)));
        assert_eq!(setup.warnings(10).await, 0);
    }

    #[tokio::test]
    async fn missed_final_notice_still_gets_a_second_warning() {
        let now = Utc::now();
        let setup = inactive_for(200, now).await;
        setup.set_warnings(10, 1).await;

        let report = setup.sweeper.run_inactivity(now, &idle()).await;
        assert_eq!(report.notices, 1);
        assert_eq!(report.kicks, 0);
        assert!(!setup.platform.was_kicked(UserId::new(10)));
        assert_eq!(setup.warnings(10).await, 2);
        assert!(setup.platform.effects().iter().any(|effect| matches!(effect,
            Effect::Log(content) if content.contains("Warning count: 2/2"))));
    }

    #[tokio::test]
    async fn failed_kick_is_retried_on_the_next_sweep() {
        let now = Utc::now();
        let last = history_message(500, 50, 10, days_ago(now, 200));
        let mut platform = FakePlatform::new()
            .with_member(member(10, "alice"))
            .with_message(last.clone(), true);
        platform.failing_enforcement = true;
        let setup = setup(platform);
        setup.point_at(10, &last).await;
        setup.set_warnings(10, 2).await;

        let report = setup.sweeper.run_inactivity(now, &idle()).await;
        assert_eq!(report.errors, 1);
        assert_eq!(setup.warnings(10).await, 2);

        let report = setup.sweeper.run_inactivity(now, &idle()).await;
        assert_eq!(report.errors, 1);
        assert_eq!(report.notices, 0);
        assert!(setup.platform.directs_to(UserId::new(10)).is_empty());
        assert_eq!(setup.warnings(10).await, 2);
    }

    #[tokio::test]
    async fn bootstrap_scan_reads_past_the_first_page() {
        let now = Utc::now();
        let mut platform = FakePlatform::new()
            .with_member(member(10, "alice"))
            .with_message(history_message(1, 50, 10, days_ago(now, 178)), true);
        for id in 2..=150 {
            platform = platform.with_message(history_message(id, 50, 99, days_ago(now, 1)), true);
        }
        let mut config = config();
        config.history_message_limit = 200;
        let setup = setup_with(platform, &config);

        let report = setup.sweeper.run_inactivity(now, &idle()).await;
        assert_eq!(report.unknown_activity, 0);
        assert_eq!(report.notices, 1);
        assert_eq!(setup.record(10).await.unwrap().last_message,
                   Some(MessageRef::new(ChannelId::new(50), MessageId::new(1))));
    }

    #[tokio::test]
    async fn failed_kick_is_reported_and_the_sweep_continues() {
        let now = Utc::now();
        let last = history_message(500, 50, 10, days_ago(now, 200));
        let mut platform = FakePlatform::new()
            .with_member(member(10, "alice"))
            .with_member(member(11, "bob"))
            .with_message(last.clone(), true)
            .with_message(history_message(501, 50, 11, days_ago(now, 178)), true);
        platform.failing_enforcement = true;
        let setup = setup(platform);
        setup.point_at(10, &last).await;
        setup.set_warnings(10, 2).await;

        let report = setup.sweeper.run_inactivity(now, &idle()).await;
        assert_eq!(report.errors, 1);
        assert_eq!(report.notices, 1);
        assert_eq!(setup.warnings(11).await, 1);
    }

    #[tokio::test]
    async fn member_without_any_message_is_skipped() {
        let now = Utc::now();
        let setup = setup(FakePlatform::new()
            .with_member(member(10, "lurker"))
            .with_channel(ChannelId::new(50)));
        let report = setup.sweeper.run_inactivity(now, &idle()).await;
        assert_eq!(report.unknown_activity, 1);
        assert_eq!(setup.warnings(10).await, 0);
        assert!(setup.platform.effects().is_empty());
        assert_eq!(setup.record(10).await, None);
    }

    #[tokio::test]
    async fn bootstrap_scan_persists_the_latest_message() {
        let now = Utc::now();
        let older = history_message(400, 50, 10, days_ago(now, 190));
        let newer = history_message(401, 51, 10, days_ago(now, 178));
        let setup = setup(FakePlatform::new()
            .with_member(member(10, "alice"))
            .with_member(member(11, "bob"))
            .with_message(older, true)
            .with_message(newer.clone(), true)
            .with_message(history_message(402, 51, 11, days_ago(now, 3)), true));

        let report = setup.sweeper.run_inactivity(now, &idle()).await;
        assert_eq!(report.notices, 1);
        assert_eq!(setup.record(10).await.unwrap().last_message, Some(newer.reference()));
        assert!(setup.record(11).await.is_some());

        // history is read once per sweep, and not at all once pointers exist
        assert_eq!(setup.platform.history_calls.load(Ordering::SeqCst), 2);
        setup.sweeper.run_inactivity(now, &idle()).await;
        assert_eq!(setup.platform.history_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn stale_pointer_is_cleared_and_rescanned() {
        let now = Utc::now();
        let deleted = history_message(300, 50, 10, days_ago(now, 10));
        let visible = history_message(301, 50, 10, days_ago(now, 178));
        let setup = setup(FakePlatform::new()
            .with_member(member(10, "alice"))
            .with_message(visible.clone(), true));
        setup.point_at(10, &deleted).await;

        setup.sweeper.run_inactivity(now, &idle()).await;
        assert_eq!(setup.record(10).await.unwrap().last_message, Some(visible.reference()));
        assert_eq!(setup.warnings(10).await, 1);
    }

    #[tokio::test]
    async fn stale_pointer_without_history_clears_and_skips() {
        let now = Utc::now();
        let deleted = history_message(300, 50, 10, days_ago(now, 200));
        let setup = setup(FakePlatform::new()
            .with_member(member(10, "alice"))
            .with_channel(ChannelId::new(50)));
        setup.point_at(10, &deleted).await;

        let report = setup.sweeper.run_inactivity(now, &idle()).await;
        assert_eq!(report.unknown_activity, 1);
        assert_eq!(setup.record(10).await.unwrap().last_message, None);
    }

    #[tokio::test]
    async fn transient_resolution_error_skips_only_that_member() {
        let now = Utc::now();
        let first = history_message(300, 50, 10, days_ago(now, 200));
        let second = history_message(301, 50, 11, days_ago(now, 178));
        let mut platform = FakePlatform::new()
            .with_member(member(10, "alice"))
            .with_member(member(11, "bob"))
            .with_message(second.clone(), true);
        platform.unreachable.insert(first.reference());
        let setup = setup(platform);
        setup.point_at(10, &first).await;
        setup.point_at(11, &second).await;

        let report = setup.sweeper.run_inactivity(now, &idle()).await;
        assert_eq!(report.errors, 1);
        assert_eq!(report.notices, 1);
        // the pointer survives a transient failure
        assert_eq!(setup.record(10).await.unwrap().last_message, Some(first.reference()));
    }

    #[tokio::test]
    async fn forbidden_channels_are_skipped_during_bootstrap() {
        let now = Utc::now();
        let mut platform = FakePlatform::new()
            .with_member(member(10, "alice"))
            .with_message(history_message(400, 50, 10, days_ago(now, 100)), true)
            .with_message(history_message(401, 51, 10, days_ago(now, 178)), true);
        platform.forbidden_channels.insert(ChannelId::new(50));
        let setup = setup(platform);

        setup.sweeper.run_inactivity(now, &idle()).await;
        assert_eq!(setup.record(10).await.unwrap().last_message,
                   Some(MessageRef::new(ChannelId::new(51), MessageId::new(401))));
        assert_eq!(setup.warnings(10).await, 1);
    }

    #[tokio::test]
    async fn roster_is_walked_page_by_page() {
        let now = Utc::now();
        let mut platform = FakePlatform::new().with_channel(ChannelId::new(50));
        for id in 1..=7 {
            platform = platform
                .with_member(member(id, "member"))
                .with_message(history_message(1000 + id, 50, id, days_ago(now, 178)), true);
        }
        let mut setup = setup(platform);
        setup.sweeper = setup.sweeper.with_page_size(3);

        let report = setup.sweeper.run_inactivity(now, &idle()).await;
        assert_eq!(report.scanned, 7);
        assert_eq!(report.notices, 7);
    }

    #[tokio::test]
    async fn bots_and_admins_are_never_swept() {
        let now = Utc::now();
        let mut bot = member(10, "bot");
        bot.bot = true;
        let mut admin = member(11, "admin");
        admin.roles.push(RoleId::new(ADMIN));
        let setup = setup(FakePlatform::new()
            .with_member(bot)
            .with_member(admin)
            .with_message(history_message(1, 50, 10, days_ago(now, 400)), true)
            .with_message(history_message(2, 50, 11, days_ago(now, 400)), true));

        let report = setup.sweeper.run_inactivity(now, &idle()).await;
        assert_eq!(report.scanned, 2);
        assert!(setup.platform.effects().is_empty());
        assert_eq!(setup.platform.history_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancelled_sweep_stops_between_members() {
        let now = Utc::now();
        let setup = inactive_for(178, now).await;
        let (sender, receiver) = watch::channel(false);
        sender.send(true).unwrap();

        let report = setup.sweeper.run_inactivity(now, &receiver).await;
        assert!(report.cancelled);
        assert_eq!(report.scanned, 0);
        assert_eq!(setup.warnings(10).await, 0);
    }

    #[tokio::test]
    async fn unverified_members_are_kicked_after_the_grace_period() {
        let now = Utc::now();
        let mut late = member(10, "late");
        late.joined_at = Some(now - ChronoDuration::hours(25));
        late.roles.push(RoleId::new(UNVERIFIED));
        let mut fresh = member(11, "fresh");
        fresh.joined_at = Some(now - ChronoDuration::hours(2));
        let mut verified = member(12, "verified");
        verified.joined_at = Some(now - ChronoDuration::days(30));
        verified.roles.push(RoleId::new(VERIFIED));
        let mut unknown = member(13, "unknown");
        unknown.joined_at = None;

        let setup = setup(FakePlatform::new()
            .with_member(late)
            .with_member(fresh)
            .with_member(verified)
            .with_member(unknown));

        let report = setup.sweeper.run_verification(now, &idle()).await;
        assert_eq!(report.kicks, 1);
        assert!(setup.platform.was_kicked(UserId::new(10)));
        assert!(!setup.platform.was_kicked(UserId::new(11)));
        assert!(!setup.platform.was_kicked(UserId::new(12)));
        assert!(!setup.platform.was_kicked(UserId::new(13)));
        assert!(setup.platform.effects().contains(
            &Effect::Kicked(UserId::new(10), "Not verified within 24h.".to_string())));
    }

    #[tokio::test]
    async fn verification_kick_reason_follows_the_grace_period() {
        let now = Utc::now();
        let mut late = member(10, "late");
        late.joined_at = Some(now - ChronoDuration::hours(50));
        let mut config = config();
        config.verification_grace_hours = 48;
        let setup = setup_with(FakePlatform::new().with_member(late), &config);

        setup.sweeper.run_verification(now, &idle()).await;
        assert!(setup.platform.effects().contains(
            &Effect::Kicked(UserId::new(10), "Not verified within 48h.".to_string())));
    }
}
