use anyhow::Context;
use serenity::prelude::{Client, GatewayIntents};
use tokio::sync::watch;

use handler::Handler;
use databases::*;
use utility::*;

mod handler;
mod utility;
mod databases;


#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        Logger::err_long("Fatal", &format!("{:#}", err));
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {

    // setup
    let database = Database::open("nerva")?;
    let config_db = ConfigDB::new(database.clone());

    #[cfg(feature = "db_interface")]
    if std::env::args().any(|arg| arg == "--configure") {
        utility::console::config_interface(config_db.clone()).await;
    }

    let config = Config::load(&config_db).await.context("Failed to load configuration")?;
    let filter = ChatFilter::new(&config.name_blacklist, &config.message_blacklist)
        .context("Invalid blacklist pattern")?;
    Logger::info_long("Loaded blacklist", &format!("{} name patterns, {} message patterns",
        config.name_blacklist.len(), config.message_blacklist.len()));

    let (shutdown_sender, shutdown) = watch::channel(false);
    let token = config.token.clone();
    let handler = Handler::new(config, database, filter, shutdown);

    // start client
    let intents = GatewayIntents::GUILDS                    |
                  GatewayIntents::GUILD_MEMBERS             |
                  GatewayIntents::GUILD_MESSAGES            |
                  GatewayIntents::MESSAGE_CONTENT;
    let mut client = Client::builder(&token, intents)
        .event_handler(handler)
        .await
        .context("Error creating client")?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            Logger::warn_long("Unable to listen for shutdown signal", &err.to_string());
            std::future::pending::<()>().await;
        }
        Logger::info("Shutting down");
        let _ = shutdown_sender.send(true);
        shard_manager.shutdown_all().await;
    });

    client.start().await.context("Client error")?;
    Ok(())
}
