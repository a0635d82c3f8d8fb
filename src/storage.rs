use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Key under which the bearer token is persisted.
pub const TOKEN_KEY: &str = "token";
/// Key under which the signed-in user's profile (JSON) is persisted.
pub const PROFILE_KEY: &str = "user";

#[derive(Debug, Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

#[derive(Debug, Clone)]
pub struct Credential {
    pub name: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Clone)]
pub struct Options {
    pub path: Option<PathBuf>,
}

impl Store {
    pub fn open(opts: Options) -> Result<Self> {
        let path = if let Some(path) = opts.path {
            path
        } else {
            default_path().context("storage: resolve default path")?
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("storage: create directory {}", parent.display()))?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("storage: open database at {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("storage: set WAL")?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .context("storage: set busy timeout")?;
        migrate(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("storage: open in-memory database")?;
        migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn close(self) -> Result<()> {
        let conn = Arc::try_unwrap(self.conn)
            .map_err(|_| anyhow!("storage: connection still in use"))?
            .into_inner();
        conn.close()
            .map_err(|(_, err)| err)
            .context("storage: close connection")
    }

    pub fn put_credential(&self, name: &str, value: &str) -> Result<()> {
        if name.trim().is_empty() {
            bail!("storage: credential name required");
        }
        let conn = self.conn.lock();
        conn.execute(
            r#"
INSERT INTO credentials (name, value, updated_at)
VALUES (?1, ?2, ?3)
ON CONFLICT(name) DO UPDATE SET
  value = excluded.value,
  updated_at = excluded.updated_at
"#,
            params![name, value, Utc::now().timestamp()],
        )
        .with_context(|| format!("storage: write credential {name}"))?;
        Ok(())
    }

    pub fn get_credential(&self, name: &str) -> Result<Option<Credential>> {
        let conn = self.conn.lock();
        conn.query_row(
            r#"
SELECT name, value, updated_at
FROM credentials
WHERE name = ?1
"#,
            params![name],
            credential_from_row,
        )
        .optional()
        .with_context(|| format!("storage: query credential {name}"))
    }

    pub fn delete_credential(&self, name: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let removed = conn
            .execute("DELETE FROM credentials WHERE name = ?1", params![name])
            .with_context(|| format!("storage: delete credential {name}"))?;
        Ok(removed > 0)
    }
}

fn credential_from_row(row: &Row<'_>) -> rusqlite::Result<Credential> {
    let updated: i64 = row.get(2)?;
    Ok(Credential {
        name: row.get(0)?,
        value: row.get(1)?,
        updated_at: Utc
            .timestamp_opt(updated, 0)
            .single()
            .unwrap_or_else(Utc::now),
    })
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
  version INTEGER PRIMARY KEY,
  applied_at INTEGER NOT NULL
)
"#,
        [],
    )?;

    let current: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    for (idx, sql) in migrations().iter().enumerate() {
        let version = (idx + 1) as i64;
        if version <= current {
            continue;
        }
        conn.execute_batch(sql)
            .with_context(|| format!("storage: apply migration {version}"))?;
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            params![
                version,
                SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or(Duration::from_secs(0))
                    .as_secs() as i64,
            ],
        )?;
    }
    Ok(())
}

fn migrations() -> Vec<&'static str> {
    vec![r#"
CREATE TABLE IF NOT EXISTS credentials (
  name TEXT PRIMARY KEY,
  value TEXT NOT NULL,
  updated_at INTEGER NOT NULL
);
"#]
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("zutube").join("state.db"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_database_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("state.db");
        let store = Store::open(Options {
            path: Some(path.clone()),
        })
        .unwrap();
        assert!(path.exists());
        store.close().unwrap();
    }

    #[test]
    fn credential_round_trip_and_overwrite() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.get_credential(TOKEN_KEY).unwrap().is_none());

        store.put_credential(TOKEN_KEY, "first").unwrap();
        store.put_credential(TOKEN_KEY, "second").unwrap();
        let token = store.get_credential(TOKEN_KEY).unwrap().unwrap();
        assert_eq!(token.value, "second");

        assert!(store.delete_credential(TOKEN_KEY).unwrap());
        assert!(!store.delete_credential(TOKEN_KEY).unwrap());
        assert!(store.get_credential(TOKEN_KEY).unwrap().is_none());
    }

    #[test]
    fn credentials_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.db");
        {
            let store = Store::open(Options {
                path: Some(path.clone()),
            })
            .unwrap();
            store.put_credential(TOKEN_KEY, "persisted").unwrap();
            store.close().unwrap();
        }
        let store = Store::open(Options { path: Some(path) }).unwrap();
        assert_eq!(
            store.get_credential(TOKEN_KEY).unwrap().unwrap().value,
            "persisted"
        );
    }

    #[test]
    fn empty_name_is_rejected() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.put_credential("  ", "x").is_err());
    }
}
