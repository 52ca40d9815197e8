use serenity::all::RoleId;

use std::sync::Arc;

use crate::databases::*;
use crate::utility::chat_filter::{impersonated_name, ChatFilter};
use crate::utility::config::Config;
use crate::utility::escalation::{EscalationTracker, Verdict};
use crate::utility::logger::Logger;
use crate::utility::member_locks::MemberLocks;
use crate::utility::traits::*;


const SELF_CURE_NOTE: &str =
    "Hi! Your post has been noted. Thank you for choosing to stay with us.";

/// Event driven moderation rules: blacklisted names on join and rename,
/// blacklisted messages, and the inactivity self-cure.
pub struct AutoModerator {
    filter: Arc<ChatFilter>,
    members: MembersDB,
    tracker: EscalationTracker,
    locks: MemberLocks,
    admin_roles: Vec<RoleId>,
    verified_role: Option<RoleId>,
}

impl AutoModerator {

    pub fn new(config: &Config,
               filter: Arc<ChatFilter>,
               database: &Database,
               locks: MemberLocks
    ) -> Self {
        AutoModerator {
            filter,
            members: MembersDB::new(database.clone()),
            tracker: EscalationTracker::new(WarningsDB::new(database.clone())),
            locks,
            admin_roles: config.admin_roles.clone(),
            verified_role: config.verified_role,
        }
    }

    fn is_exempt(&self, member: &MemberSnapshot) -> bool {
        member.bot || member.has_any_role(&self.admin_roles)
    }

    fn is_verified(&self, member: &MemberSnapshot) -> bool {
        self.verified_role.map_or(false, |role| member.roles.contains(&role))
    }

    pub async fn on_member_join(&self, platform: &dyn Platform, member: &MemberSnapshot) {
        if self.is_exempt(member) {
            return;
        }
        Logger::debug_long("Member join", &member.display_name);
        self.check_name(platform, member).await;
    }

    /// `old_name` is `None` when the previous state of the member is unknown,
    /// in which case the name rules run as if it had changed.
    pub async fn on_member_update(&self,
                                  platform: &dyn Platform,
                                  old_name: Option<&str>,
                                  member: &MemberSnapshot
    ) -> anyhow::Result<()> {
        if self.is_exempt(member) {
            return Ok(());
        }

        if self.is_verified(member) {
            let _guard = self.locks.lock(member.id).await;
            let record = self.members.find(member.id).await?;
            if !record.map_or(false, |record| record.verified) {
                self.members.set_verified(member.id, true).await?;
                Logger::info_long("Member verified", &member.display_name);
            }
        }

        if old_name == Some(member.display_name.as_str()) {
            return Ok(());
        }
        Logger::debug_long("Member rename", &format!("{:?} -> {}", old_name, member.display_name));

        if self.check_name(platform, member).await {
            return Ok(());
        }

        // impersonating an administrator counts as a blacklisted name
        let admins = platform.members_with_roles(&self.admin_roles).await;
        match admins {
            Ok(admins) => {
                let names = admins.iter()
                    .filter(|admin| admin.id != member.id)
                    .map(|admin| admin.display_name.as_str());
                if let Some(admin_name) = impersonated_name(&member.display_name, names) {
                    self.ban_for_name(platform, member, admin_name, "an admins display name").await;
                }
            },
            Err(err) => Logger::warn_long("Failed to list administrators", &err.to_string()),
        }
        Ok(())
    }

    /// Returns whether the member was banned.
    async fn check_name(&self, platform: &dyn Platform, member: &MemberSnapshot) -> bool {
        match self.filter.match_name(&member.display_name) {
            Some(rule) => {
                self.ban_for_name(platform, member, &rule.pattern, "a blacklisted name").await;
                true
            },
            None => false,
        }
    }

    async fn ban_for_name(&self,
                          platform: &dyn Platform,
                          member: &MemberSnapshot,
                          matched: &str,
                          offence: &str
    ) {
        Logger::info_long("Banning member for display name",
            &format!("{} ({}) matched '{}'", member.display_name, member.id, matched));

        best_effort(platform.notify_automod(
            format!("**{}** matched against `{}`.", member.display_name, matched)).await,
            "Failed to notify automod channel");
        best_effort(platform.notify_member(member.id, format!(
            "You have been banned from the Nerva community server for having {}.", offence)).await,
            "Failed to notify member");

        match platform.ban(member.id, "Blacklisted name match.").await {
            Ok(_) => best_effort(platform.notify_log(format!(
                "**{}** has been banned for having {}.", member.display_name, offence)).await,
                "Failed to notify log channel"),
            Err(err) => {
                Logger::err_long("Failed to ban member", &err.to_string());
                best_effort(platform.notify_log(format!(
                    "Failed to ban **{}** for having {}: {}", member.display_name, offence, err)).await,
                    "Failed to notify log channel");
            }
        }
    }

    pub async fn on_message(&self, platform: &dyn Platform, message: &IncomingMessage) -> anyhow::Result<()> {
        let author = &message.author;
        if self.is_exempt(author) {
            return Ok(());
        }
        let guard = self.locks.lock(author.id).await;

        // any message cancels a pending inactivity kick, even a blacklisted one
        if self.tracker.reset(&guard, Track::Inactivity).await? {
            Logger::info_long("Inactivity warnings cleared", &author.display_name);
            best_effort(platform.notify_member(author.id, SELF_CURE_NOTE.to_string()).await,
                "Failed to notify member");
        }

        if let Some(rule) = self.filter.match_message(&message.content) {
            Logger::info_long("Deleting blacklisted message",
                &format!("{} ({}) matched '{}'", author.display_name, author.id, rule.pattern));

            best_effort(platform.delete_message(message.reference()).await,
                "Failed to delete message");
            best_effort(platform.notify_automod(format!(
                "**{}**'s message matched against - `{}`. Message content:\n```\n{}\n```",
                author.display_name, rule.pattern, message.content)).await,
                "Failed to notify automod channel");
            best_effort(platform.notify_log(format!(
                "**{}**'s message has been deleted for having a blacklisted message.",
                author.display_name)).await,
                "Failed to notify log channel");

            match self.tracker.record_infraction(&guard, Track::Content).await? {
                Verdict::Warn { count, max } => {
                    Logger::info_long("Warning member for blacklisted message",
                        &format!("{} ({}/{})", author.display_name, count, max));
                    best_effort(platform.notify_member(author.id, format!(
                        "Your message has been deleted because it matched a blacklisted message.\n\
                         Please refrain from posting such messages in the future.\n\
                         You have received a warning for this message.\n\
                         Warning count: **{}/{}**\n\
                         If you receive {} warnings, you will be banned from the server.\n\
                         If you believe this was a mistake, please contact a moderator.\n\
                         Your message:\n```\n{}\n```",
                        count, max, max, message.content)).await,
                        "Failed to notify member");
                },
                Verdict::Terminate => {
                    let max = Track::Content.threshold();
                    Logger::info_long("Banning member for blacklisted messages", &author.display_name);
                    best_effort(platform.notify_member(author.id, format!(
                        "You have been banned from the Nerva community server \
                         for receiving {} warnings for blacklisted message matches.", max)).await,
                        "Failed to notify member");
                    let reason = format!("{} warnings for blacklisted message matches.", max);
                    match platform.ban(author.id, &reason).await {
                        Ok(_) => {
                            self.tracker.reset(&guard, Track::Content).await?;
                            best_effort(platform.notify_log(format!(
                                "**{}** has been banned for receiving {} warnings for blacklisted message matches.",
                                author.display_name, max)).await,
                                "Failed to notify log channel");
                        },
                        Err(err) => {
                            Logger::err_long("Failed to ban member", &err.to_string());
                            best_effort(platform.notify_log(format!(
                                "Failed to ban **{}** for receiving {} warnings for blacklisted message matches: {}",
                                author.display_name, max, err)).await,
                                "Failed to notify log channel");
                        },
                    }
                },
            }
        }

        self.members.set_last_message(author.id, message.reference(), self.is_verified(author)).await?;
        Ok(())
    }

}
