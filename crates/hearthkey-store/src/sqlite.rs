//! SQLite implementation of the store traits.
//!
//! This is the primary storage backend for Hearthkey. It uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use hearthkey_core::{
    CoreError, EncryptedPrivateKey, Household, HouseholdId, PublicKey, Salt, UserId,
    UserKeyRecord, UserProfile, WrappedKey, WrappedKeyMap,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::now_millis;
use crate::traits::{InsertResult, KeyStore, MembershipDirectory};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Poisoned(e.to_string()))?;
            f(&mut *conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn conversion_error(idx: usize, e: CoreError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn user_id_at(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<UserId> {
    UserId::new(row.get::<_, String>(idx)?).map_err(|e| conversion_error(idx, e))
}

fn household_id_at(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<HouseholdId> {
    HouseholdId::new(row.get::<_, String>(idx)?).map_err(|e| conversion_error(idx, e))
}

fn row_to_user_keys(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserKeyRecord> {
    Ok(UserKeyRecord {
        user_id: user_id_at(row, 0)?,
        public_key: PublicKey::new(row.get::<_, String>(1)?),
        encrypted_private_key: EncryptedPrivateKey::new(row.get::<_, String>(2)?),
        salt: Salt::new(row.get::<_, String>(3)?),
        version: row.get(4)?,
    })
}

fn load_vault(conn: &Connection, household_id: &HouseholdId) -> Result<WrappedKeyMap> {
    let mut stmt = conn.prepare(
        "SELECT member_id, wrapped_key FROM vault_keys WHERE household_id = ?1",
    )?;
    let rows = stmt.query_map(params![household_id.as_str()], |row| {
        Ok((user_id_at(row, 0)?, WrappedKey::new(row.get::<_, String>(1)?)))
    })?;

    let mut keys = WrappedKeyMap::new();
    for row in rows {
        let (member_id, wrapped_key) = row?;
        keys.insert(member_id, wrapped_key);
    }
    Ok(keys)
}

fn load_household(conn: &Connection, household_id: &HouseholdId) -> Result<Option<Household>> {
    let head = conn
        .query_row(
            "SELECT household_id, name, owner_id FROM households WHERE household_id = ?1",
            params![household_id.as_str()],
            |row| {
                Ok((
                    household_id_at(row, 0)?,
                    row.get::<_, String>(1)?,
                    user_id_at(row, 2)?,
                ))
            },
        )
        .optional()?;

    let Some((household_id, name, owner_id)) = head else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT user_id FROM household_members
         WHERE household_id = ?1
         ORDER BY position ASC",
    )?;
    let members = stmt
        .query_map(params![household_id.as_str()], |row| user_id_at(row, 0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(Some(Household {
        household_id,
        name,
        owner_id,
        members,
    }))
}

fn household_exists(conn: &Connection, household_id: &HouseholdId) -> Result<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM households WHERE household_id = ?1",
            params![household_id.as_str()],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

fn insert_member(conn: &Connection, household_id: &HouseholdId, user_id: &UserId) -> Result<bool> {
    let position: i64 = conn.query_row(
        "SELECT COALESCE(MAX(position), -1) + 1 FROM household_members WHERE household_id = ?1",
        params![household_id.as_str()],
        |row| row.get(0),
    )?;
    let changed = conn.execute(
        "INSERT OR IGNORE INTO household_members (household_id, user_id, position, joined_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![household_id.as_str(), user_id.as_str(), position, now_millis()],
    )?;
    Ok(changed == 1)
}

#[async_trait]
impl KeyStore for SqliteStore {
    async fn get_user_keys(&self, user_id: &UserId) -> Result<Option<UserKeyRecord>> {
        let user_id = user_id.clone();
        self.run(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT user_id, public_key, encrypted_private_key, salt, version
                     FROM user_keys WHERE user_id = ?1",
                    params![user_id.as_str()],
                    row_to_user_keys,
                )
                .optional()?)
        })
        .await
    }

    async fn insert_user_keys(&self, record: &UserKeyRecord) -> Result<InsertResult> {
        let record = record.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;

            let existing: Option<String> = tx
                .query_row(
                    "SELECT public_key FROM user_keys WHERE user_id = ?1",
                    params![record.user_id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;

            if existing.is_some_and(|pk| !pk.is_empty()) {
                return Ok(InsertResult::AlreadyExists);
            }

            tx.execute(
                "INSERT OR REPLACE INTO user_keys
                    (user_id, public_key, encrypted_private_key, salt, version, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.user_id.as_str(),
                    record.public_key.as_str(),
                    record.encrypted_private_key.as_str(),
                    record.salt.as_str(),
                    record.version,
                    now_millis(),
                ],
            )?;
            tx.commit()?;

            debug!(user_id = %record.user_id, "stored user key record");
            Ok(InsertResult::Inserted)
        })
        .await
    }

    async fn get_member_key(
        &self,
        household_id: &HouseholdId,
        member_id: &UserId,
    ) -> Result<Option<WrappedKey>> {
        let household_id = household_id.clone();
        let member_id = member_id.clone();
        self.run(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT wrapped_key FROM vault_keys WHERE household_id = ?1 AND member_id = ?2",
                    params![household_id.as_str(), member_id.as_str()],
                    |row| row.get::<_, String>(0),
                )
                .optional()?
                .map(WrappedKey::new))
        })
        .await
    }

    async fn list_member_keys(&self, household_id: &HouseholdId) -> Result<WrappedKeyMap> {
        let household_id = household_id.clone();
        self.run(move |conn| load_vault(conn, &household_id)).await
    }

    async fn put_member_key(
        &self,
        household_id: &HouseholdId,
        member_id: &UserId,
        wrapped_key: &WrappedKey,
    ) -> Result<()> {
        let household_id = household_id.clone();
        let member_id = member_id.clone();
        let wrapped_key = wrapped_key.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO vault_keys (household_id, member_id, wrapped_key, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (household_id, member_id)
                 DO UPDATE SET wrapped_key = excluded.wrapped_key, updated_at = excluded.updated_at",
                params![
                    household_id.as_str(),
                    member_id.as_str(),
                    wrapped_key.as_str(),
                    now_millis(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete_member_key(
        &self,
        household_id: &HouseholdId,
        member_id: &UserId,
    ) -> Result<bool> {
        let household_id = household_id.clone();
        let member_id = member_id.clone();
        self.run(move |conn| {
            let changed = conn.execute(
                "DELETE FROM vault_keys WHERE household_id = ?1 AND member_id = ?2",
                params![household_id.as_str(), member_id.as_str()],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn replace_member_keys(
        &self,
        household_id: &HouseholdId,
        keys: &WrappedKeyMap,
    ) -> Result<()> {
        let household_id = household_id.clone();
        let keys = keys.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM vault_keys WHERE household_id = ?1",
                params![household_id.as_str()],
            )?;

            let now = now_millis();
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO vault_keys (household_id, member_id, wrapped_key, updated_at)
                     VALUES (?1, ?2, ?3, ?4)",
                )?;
                for (member_id, wrapped_key) in &keys {
                    stmt.execute(params![
                        household_id.as_str(),
                        member_id.as_str(),
                        wrapped_key.as_str(),
                        now,
                    ])?;
                }
            }

            tx.commit()?;
            debug!(household_id = %household_id, entries = keys.len(), "replaced vault");
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl MembershipDirectory for SqliteStore {
    async fn get_user(&self, user_id: &UserId) -> Result<Option<UserProfile>> {
        let user_id = user_id.clone();
        self.run(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT user_id, email, name FROM users WHERE user_id = ?1",
                    params![user_id.as_str()],
                    |row| {
                        Ok(UserProfile {
                            user_id: user_id_at(row, 0)?,
                            email: row.get(1)?,
                            name: row.get(2)?,
                        })
                    },
                )
                .optional()?)
        })
        .await
    }

    async fn upsert_user(&self, profile: &UserProfile) -> Result<()> {
        let profile = profile.clone();
        self.run(move |conn| {
            let now = now_millis();
            conn.execute(
                "INSERT INTO users (user_id, email, name, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT (user_id)
                 DO UPDATE SET email = excluded.email, name = excluded.name,
                               updated_at = excluded.updated_at",
                params![profile.user_id.as_str(), profile.email, profile.name, now],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_household(&self, household_id: &HouseholdId) -> Result<Option<Household>> {
        let household_id = household_id.clone();
        self.run(move |conn| load_household(conn, &household_id))
            .await
    }

    async fn create_household(&self, household: &Household) -> Result<()> {
        let household = household.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;

            if household_exists(&tx, &household.household_id)? {
                return Err(StoreError::Conflict(format!(
                    "household {} already exists",
                    household.household_id
                )));
            }

            let now = now_millis();
            tx.execute(
                "INSERT INTO households (household_id, name, owner_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![
                    household.household_id.as_str(),
                    household.name,
                    household.owner_id.as_str(),
                    now,
                ],
            )?;

            insert_member(&tx, &household.household_id, &household.owner_id)?;
            for member in &household.members {
                insert_member(&tx, &household.household_id, member)?;
            }

            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn add_member(&self, household_id: &HouseholdId, user_id: &UserId) -> Result<bool> {
        let household_id = household_id.clone();
        let user_id = user_id.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            if !household_exists(&tx, &household_id)? {
                return Err(StoreError::NotFound(format!("household {}", household_id)));
            }
            let added = insert_member(&tx, &household_id, &user_id)?;
            tx.commit()?;
            Ok(added)
        })
        .await
    }

    async fn remove_member(&self, household_id: &HouseholdId, user_id: &UserId) -> Result<bool> {
        let household_id = household_id.clone();
        let user_id = user_id.clone();
        self.run(move |conn| {
            if !household_exists(conn, &household_id)? {
                return Err(StoreError::NotFound(format!("household {}", household_id)));
            }
            let changed = conn.execute(
                "DELETE FROM household_members WHERE household_id = ?1 AND user_id = ?2",
                params![household_id.as_str(), user_id.as_str()],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn delete_household(&self, household_id: &HouseholdId) -> Result<bool> {
        let household_id = household_id.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let id = household_id.as_str();
            tx.execute("DELETE FROM vault_keys WHERE household_id = ?1", params![id])?;
            tx.execute(
                "DELETE FROM household_members WHERE household_id = ?1",
                params![id],
            )?;
            let deleted =
                tx.execute("DELETE FROM households WHERE household_id = ?1", params![id])?;
            tx.commit()?;
            Ok(deleted > 0)
        })
        .await
    }
}
