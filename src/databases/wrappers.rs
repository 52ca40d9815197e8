use anyhow::Context;
use rusqlite::{params, OptionalExtension};
use serenity::all::{ChannelId, MessageId, UserId};

use std::collections::BTreeSet;
use std::fmt::Display;
use std::str::FromStr;

use crate::databases::database::Database;
use crate::databases::records::*;


fn parse_id<T>(value: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    T::from_str(value).map_err(|err| anyhow::anyhow!("Invalid id '{}': {}", value, err))
}


/// Key/value rows of the `config` table. Multi-valued keys keep one row per
/// value, in insertion order.
#[derive(Clone)]
pub struct ConfigDB {
    database: Database,
}

impl ConfigDB {

    pub fn new(database: Database) -> Self {
        ConfigDB { database }
    }

    pub async fn get_keys(&self) -> anyhow::Result<Vec<String>> {
        let connection = self.database.connection().await;
        let mut statement = connection.prepare("SELECT key FROM config")?;
        let rows = statement.query_map([], |row| row.get::<_, String>(0))?;
        let mut keys = BTreeSet::new();
        for key in rows {
            keys.insert(key?);
        }
        Ok(keys.into_iter().collect())
    }

    pub async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let connection = self.database.connection().await;
        connection.query_row(
            "SELECT value FROM config WHERE key = ? ORDER BY id ASC LIMIT 1",
            params![key],
            |row| row.get(0),
        ).optional()
            .with_context(|| format!("Failed to get value for '{}'", key))
    }

    pub async fn get_all(&self, key: &str) -> anyhow::Result<Vec<String>> {
        let connection = self.database.connection().await;
        let mut statement = connection.prepare(
            "SELECT value FROM config WHERE key = ? ORDER BY id ASC")?;
        let rows = statement.query_map(params![key], |row| row.get::<_, String>(0))?;
        let mut values = Vec::new();
        for value in rows {
            values.push(value.with_context(|| format!("Failed to get values for '{}'", key))?);
        }
        Ok(values)
    }

    pub async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let connection = self.database.connection().await;
        connection.execute("DELETE FROM config WHERE key = ?", params![key])
            .with_context(|| format!("Failed to clear '{}'", key))?;
        connection.execute(
            "INSERT INTO config (key, value, timestamp) VALUES (?, ?, ?)",
            params![key, value, chrono::Utc::now().timestamp()],
        ).with_context(|| format!("Failed to set '{}'", key))?;
        Ok(())
    }

    pub async fn append(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let connection = self.database.connection().await;
        connection.execute(
            "INSERT INTO config (key, value, timestamp) VALUES (?, ?, ?)",
            params![key, value, chrono::Utc::now().timestamp()],
        ).with_context(|| format!("Failed to append to '{}'", key))?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> anyhow::Result<()> {
        let connection = self.database.connection().await;
        connection.execute("DELETE FROM config WHERE key = ?", params![key])
            .with_context(|| format!("Failed to delete '{}'", key))?;
        Ok(())
    }

}


#[derive(Clone)]
pub struct MembersDB {
    database: Database,
}

impl MembersDB {

    pub fn new(database: Database) -> Self {
        MembersDB { database }
    }

    pub async fn find(&self, id: UserId) -> anyhow::Result<Option<MemberRecord>> {
        let connection = self.database.connection().await;
        let row = connection.query_row(
            "SELECT verified, last_message_id, last_channel_id FROM members WHERE id = ?",
            params![id.to_string()],
            |row| Ok((
                row.get::<_, bool>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<String>>(2)?,
            )),
        ).optional()
            .with_context(|| format!("Failed to find member {}", id))?;
        drop(connection);

        let Some((verified, message_id, channel_id)) = row else {
            return Ok(None);
        };
        let last_message = match (message_id, channel_id) {
            (Some(message_id), Some(channel_id)) => Some(MessageRef::new(
                parse_id::<ChannelId>(&channel_id)?,
                parse_id::<MessageId>(&message_id)?,
            )),
            _ => None,
        };
        Ok(Some(MemberRecord { id, verified, last_message }))
    }

    /// Points the member's record at `reference`, creating the record with the
    /// given verification state if it does not exist yet.
    pub async fn set_last_message(&self,
                                  id: UserId,
                                  reference: MessageRef,
                                  verified: bool
    ) -> anyhow::Result<()> {
        let connection = self.database.connection().await;
        connection.execute(
            "INSERT INTO members (id, verified, last_message_id, last_channel_id)
                VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                last_message_id = excluded.last_message_id,
                last_channel_id = excluded.last_channel_id",
            params![
                id.to_string(),
                verified,
                reference.message_id.to_string(),
                reference.channel_id.to_string(),
            ],
        ).with_context(|| format!("Failed to set last message of member {}", id))?;
        Ok(())
    }

    pub async fn unset_last_message(&self, id: UserId) -> anyhow::Result<()> {
        let connection = self.database.connection().await;
        connection.execute(
            "UPDATE members SET last_message_id = NULL, last_channel_id = NULL WHERE id = ?",
            params![id.to_string()],
        ).with_context(|| format!("Failed to unset last message of member {}", id))?;
        Ok(())
    }

    pub async fn set_verified(&self, id: UserId, verified: bool) -> anyhow::Result<()> {
        let connection = self.database.connection().await;
        connection.execute(
            "INSERT INTO members (id, verified) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET verified = excluded.verified",
            params![id.to_string(), verified],
        ).with_context(|| format!("Failed to set verification of member {}", id))?;
        Ok(())
    }

}


/// Warning counters keyed by `(member_id, track)`. Every read and write goes
/// through that one composite key.
#[derive(Clone)]
pub struct WarningsDB {
    database: Database,
}

impl WarningsDB {

    pub fn new(database: Database) -> Self {
        WarningsDB { database }
    }

    pub async fn find(&self, member_id: UserId, track: Track) -> anyhow::Result<Option<WarningRecord>> {
        let connection = self.database.connection().await;
        let count = connection.query_row(
            "SELECT count FROM warnings WHERE member_id = ? AND track = ?",
            params![member_id.to_string(), track.to_string()],
            |row| row.get::<_, u32>(0),
        ).optional()
            .with_context(|| format!("Failed to find {} warnings of member {}", track, member_id))?;
        Ok(count.map(|count| WarningRecord { member_id, track, count }))
    }

    pub async fn find_all(&self, member_id: UserId) -> anyhow::Result<Vec<WarningRecord>> {
        let connection = self.database.connection().await;
        let mut statement = connection.prepare(
            "SELECT track, count FROM warnings WHERE member_id = ? ORDER BY track ASC")?;
        let rows = statement.query_map(params![member_id.to_string()], |row| Ok((
            row.get::<_, String>(0)?,
            row.get::<_, u32>(1)?,
        )))?;
        let mut records = Vec::new();
        for row in rows {
            let (track, count) = row?;
            let track = Track::from_str(&track)
                .with_context(|| format!("Unknown warning track '{}'", track))?;
            records.push(WarningRecord { member_id, track, count });
        }
        Ok(records)
    }

    pub async fn set(&self, member_id: UserId, track: Track, count: u32) -> anyhow::Result<()> {
        let connection = self.database.connection().await;
        connection.execute(
            "INSERT INTO warnings (member_id, track, count) VALUES (?1, ?2, ?3)
             ON CONFLICT(member_id, track) DO UPDATE SET count = excluded.count",
            params![member_id.to_string(), track.to_string(), count],
        ).with_context(|| format!("Failed to set {} warnings of member {}", track, member_id))?;
        Ok(())
    }

    /// Increments an existing counter and returns the new count, or `None` if
    /// there was no counter to increment.
    pub async fn increment(&self, member_id: UserId, track: Track) -> anyhow::Result<Option<u32>> {
        let connection = self.database.connection().await;
        connection.query_row(
            "UPDATE warnings SET count = count + 1
             WHERE member_id = ? AND track = ?
             RETURNING count",
            params![member_id.to_string(), track.to_string()],
            |row| row.get::<_, u32>(0),
        ).optional()
            .with_context(|| format!("Failed to increment {} warnings of member {}", track, member_id))
    }

    /// Returns whether a counter was actually removed.
    pub async fn delete(&self, member_id: UserId, track: Track) -> anyhow::Result<bool> {
        let connection = self.database.connection().await;
        let removed = connection.execute(
            "DELETE FROM warnings WHERE member_id = ? AND track = ?",
            params![member_id.to_string(), track.to_string()],
        ).with_context(|| format!("Failed to delete {} warnings of member {}", track, member_id))?;
        Ok(removed > 0)
    }

}
