use serenity::async_trait;
use serenity::model::channel::Message;
use serenity::model::guild::Member;
use serenity::all::GuildMemberUpdateEvent;
use serenity::model::gateway::Ready;
use serenity::prelude::*;
use tokio::sync::watch;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::databases::*;
use crate::utility::*;


pub struct Handler {
    config: Config,
    database: Database,
    locks: MemberLocks,
    moderator: AutoModerator,
    sweeps_started: AtomicBool,
    shutdown: watch::Receiver<bool>,
}

impl Handler {

    pub fn new(config: Config,
               database: Database,
               filter: ChatFilter,
               shutdown: watch::Receiver<bool>
    ) -> Handler {
        let locks = MemberLocks::new();
        let moderator = AutoModerator::new(&config, Arc::new(filter), &database, locks.clone());
        Handler {
            config,
            database,
            locks,
            moderator,
            sweeps_started: AtomicBool::new(false),
            shutdown,
        }
    }

    fn resolver(&self, ctx: Context) -> Resolver {
        Resolver::new(ctx, self.config.guild, self.config.channel_automod, self.config.channel_logs)
    }

}

#[async_trait]
impl EventHandler for Handler {

    async fn ready(&self, ctx: Context, ready: Ready) {
        Logger::info_long("Connected as", &ready.user.name);

        // ready fires again on every reconnect
        if self.sweeps_started.swap(true, Ordering::SeqCst) {
            return;
        }

        #[cfg(feature = "inactivity")]
        {
            let sweeper = Sweeper::new(&self.config, Arc::new(self.resolver(ctx)), &self.database, self.locks.clone());
            tokio::spawn(periodic_sweeps(Arc::new(sweeper), self.config.sweep_interval, self.shutdown.clone()));
        }
    }

    #[cfg(feature = "auto_moderation")]
    async fn message(&self, ctx: Context, msg: Message) {
        if msg.guild_id != Some(self.config.guild) {
            return;
        }
        let resolver = self.resolver(ctx);
        if let Err(err) = self.moderator.on_message(&resolver, &incoming_message(&msg)).await {
            Logger::err_long("Failed to moderate message", &format!("{:#}", err));
        }
    }

    #[cfg(feature = "auto_moderation")]
    async fn guild_member_addition(&self, ctx: Context, new_member: Member) {
        if new_member.guild_id != self.config.guild {
            return;
        }
        let resolver = self.resolver(ctx);
        self.moderator.on_member_join(&resolver, &MemberSnapshot::from(&new_member)).await;
    }

    #[cfg(feature = "auto_moderation")]
    async fn guild_member_update(&self,
                                 ctx: Context,
                                 old_if_available: Option<Member>,
                                 _new: Option<Member>,
                                 event: GuildMemberUpdateEvent
    ) {
        if event.guild_id != self.config.guild {
            return;
        }
        let resolver = self.resolver(ctx);
        let old_name = old_if_available.as_ref().map(|member| member.display_name().to_string());
        let member = MemberSnapshot::from(&event);
        if let Err(err) = self.moderator.on_member_update(&resolver, old_name.as_deref(), &member).await {
            Logger::err_long("Failed to moderate member update", &format!("{:#}", err));
        }
    }
}
