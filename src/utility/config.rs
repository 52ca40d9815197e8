use anyhow::{bail, Context};
use serenity::all::{ChannelId, GuildId, RoleId};

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::databases::ConfigDB;


/// Which inactivity band a member falls into, by whole days since their last message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Active,
    Notice,
    FinalNotice,
    Kick,
}

/// Lower bounds (inclusive) of the inactivity bands, in whole days.
///
/// With the defaults, day 178 is the notice band, day 179 alone is the final
/// notice band and day 180 onwards is the kick band. Exactly 180 days is
/// therefore terminal, and a member reaching it has normally been warned on
/// both preceding days.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InactivityPolicy {
    pub notice_days: i64,
    pub final_notice_days: i64,
    pub kick_days: i64,
}

impl Default for InactivityPolicy {
    fn default() -> Self {
        InactivityPolicy {
            notice_days: 178,
            final_notice_days: 179,
            kick_days: 180,
        }
    }
}

impl InactivityPolicy {

    pub fn band(&self, days: i64) -> Band {
        if days >= self.kick_days {
            Band::Kick
        } else if days >= self.final_notice_days {
            Band::FinalNotice
        } else if days >= self.notice_days {
            Band::Notice
        } else {
            Band::Active
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if !(0 < self.notice_days
            && self.notice_days < self.final_notice_days
            && self.final_notice_days < self.kick_days) {
            bail!("Inactivity bands must be strictly increasing ({} < {} < {})",
                self.notice_days, self.final_notice_days, self.kick_days);
        }
        Ok(())
    }

}

#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    pub guild: GuildId,
    pub admin_roles: Vec<RoleId>,
    pub verified_role: Option<RoleId>,
    pub unverified_role: Option<RoleId>,
    pub channel_automod: ChannelId,
    pub channel_logs: ChannelId,
    pub name_blacklist: Vec<String>,
    pub message_blacklist: Vec<String>,
    pub inactivity: InactivityPolicy,
    /// Messages read per text channel when looking for a member's last post.
    pub history_message_limit: usize,
    pub history_concurrency: usize,
    pub sweep_interval: Duration,
    pub verification_grace_hours: i64,
}

impl Config {

    pub async fn load(config: &ConfigDB) -> anyhow::Result<Config> {
        let policy = InactivityPolicy {
            notice_days: optional(config, "inactivity_notice_days").await?
                .unwrap_or(InactivityPolicy::default().notice_days),
            final_notice_days: optional(config, "inactivity_final_notice_days").await?
                .unwrap_or(InactivityPolicy::default().final_notice_days),
            kick_days: optional(config, "inactivity_kick_days").await?
                .unwrap_or(InactivityPolicy::default().kick_days),
        };
        policy.validate()?;

        let history_message_limit: usize = optional(config, "history_message_limit").await?
            .unwrap_or(100);
        let history_concurrency: usize = optional(config, "history_concurrency").await?
            .unwrap_or(4);
        let sweep_interval_hours: u64 = optional(config, "sweep_interval_hours").await?
            .unwrap_or(24);
        if history_message_limit == 0 || history_concurrency == 0 || sweep_interval_hours == 0 {
            bail!("history_message_limit, history_concurrency and sweep_interval_hours must be positive");
        }

        let mut admin_roles = Vec::new();
        for role in config.get_all("role_admin").await? {
            admin_roles.push(parse("role_admin", &role)?);
        }

        Ok(Config {
            token: required(config, "token").await?,
            guild: required(config, "guild_main").await?,
            admin_roles,
            verified_role: optional(config, "role_verified").await?,
            unverified_role: optional(config, "role_unverified").await?,
            channel_automod: required(config, "channel_automod").await?,
            channel_logs: required(config, "channel_logs").await?,
            name_blacklist: config.get_all("blacklist_name").await?,
            message_blacklist: config.get_all("blacklist_message").await?,
            inactivity: policy,
            history_message_limit,
            history_concurrency,
            sweep_interval: Duration::from_secs(sweep_interval_hours * 60 * 60),
            verification_grace_hours: optional(config, "verification_grace_hours").await?
                .unwrap_or(24),
        })
    }

}

fn parse<T>(key: &str, value: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    T::from_str(value.trim())
        .map_err(|err| anyhow::anyhow!("Invalid value '{}' for '{}': {}", value, key, err))
}

async fn optional<T>(config: &ConfigDB, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match config.get(key).await? {
        Some(value) => parse(key, &value).map(Some),
        None        => Ok(None),
    }
}

async fn required<T>(config: &ConfigDB, key: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let value = config.get(key).await?
        .with_context(|| format!("Missing required config key '{}'", key))?;
    parse(key, &value)
}
