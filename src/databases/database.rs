use anyhow::Context;
use rusqlite::Connection;
use tokio::sync::{Mutex, MutexGuard};

use std::sync::Arc;


const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS config (
        id        INTEGER PRIMARY KEY,
        key       TEXT    NOT NULL,
        value     TEXT    NOT NULL,
        timestamp INTEGER
    );
    CREATE TABLE IF NOT EXISTS members (
        id              TEXT    PRIMARY KEY NOT NULL,
        verified        INTEGER NOT NULL DEFAULT 0,
        last_message_id TEXT    NULL,
        last_channel_id TEXT    NULL
    );
    CREATE TABLE IF NOT EXISTS warnings (
        member_id TEXT    NOT NULL,
        track     TEXT    NOT NULL,
        count     INTEGER NOT NULL,
        PRIMARY KEY (member_id, track)
    );
";

/// Shared handle to the bot's SQLite database. Cloning is cheap, all clones
/// serialize on the same connection.
#[derive(Clone)]
pub struct Database {
    connection: Arc<Mutex<Connection>>,
}

impl Database {

    pub fn open(name: &str) -> anyhow::Result<Self> {
        let path = format!("databases/{}.db", name);
        if let Some(parent) = std::path::Path::new(&path).parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory for '{}'", path))?;
        }
        let connection = Connection::open(&path)
            .with_context(|| format!("Failed to open database '{}'", path))?;
        Database::init(connection)
    }

    pub fn in_memory() -> anyhow::Result<Self> {
        let connection = Connection::open_in_memory()
            .context("Failed to open in-memory database")?;
        Database::init(connection)
    }

    fn init(connection: Connection) -> anyhow::Result<Self> {
        connection.execute_batch(SCHEMA)
            .context("Failed to create tables")?;
        Ok(Database { connection: Arc::new(Mutex::new(connection)) })
    }

    pub async fn connection(&self) -> MutexGuard<'_, Connection> {
        self.connection.lock().await
    }

}
