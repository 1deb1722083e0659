use crate::db::{Store, Updater};
use anyhow::{Context, Result};
use rusqlite::OptionalExtension;
use std::path::Path;
use std::sync::Mutex;

/// One or more SQL statements, each terminated by a semicolon.
static MIGRATIONS: &[&str] = &["
CREATE TABLE brain (
    key TEXT PRIMARY KEY NOT NULL,
    data TEXT NOT NULL
);
"];

pub struct Sqlite {
    conn: Mutex<rusqlite::Connection>,
}

impl Sqlite {
    /// Opens (creating if needed) the database at `path`. `:memory:` gives a
    /// private in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        if path != ":memory:" {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("creating {}", parent.display()))?;
                }
            }
        }
        let conn = rusqlite::Connection::open(path)
            .with_context(|| format!("opening sqlite database {path}"))?;
        Self::from_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory().context("opening in-memory sqlite")?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: rusqlite::Connection) -> Result<Self> {
        run_migrations(&mut conn)?;
        Ok(Sqlite {
            conn: Mutex::new(conn),
        })
    }

    fn load_sync(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let data = conn
            .query_row("SELECT data FROM brain WHERE key = ?1", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
            .with_context(|| format!("selecting `{key}`"))?;
        data.map(|data| serde_json::from_str(&data).with_context(|| format!("parsing `{key}`")))
            .transpose()
    }

    fn update_sync(&self, key: &str, f: &mut Updater<'_>) -> Result<()> {
        let mut conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let tx = conn.transaction().context("starting transaction")?;
        let current = tx
            .query_row("SELECT data FROM brain WHERE key = ?1", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
            .with_context(|| format!("selecting `{key}`"))?
            .map(|data| serde_json::from_str(&data))
            .transpose()
            .with_context(|| format!("parsing `{key}`"))?;
        let new = f(current)?;
        tx.execute(
            "INSERT INTO brain (key, data) VALUES (?1, ?2) \
             ON CONFLICT (key) DO UPDATE SET data = excluded.data",
            rusqlite::params![key, new.to_string()],
        )
        .with_context(|| format!("saving `{key}`"))?;
        tx.commit().context("committing transaction")?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Store for Sqlite {
    async fn load(&self, key: &str) -> Result<Option<serde_json::Value>> {
        self.load_sync(key)
    }

    async fn update(&self, key: &str, f: &mut Updater<'_>) -> Result<()> {
        self.update_sync(key, f)
    }
}

fn run_migrations(conn: &mut rusqlite::Connection) -> Result<()> {
    let version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("reading user_version")?;
    for (idx, migration) in MIGRATIONS.iter().enumerate().skip(version as usize) {
        let tx = conn.transaction()?;
        tx.execute_batch(migration)
            .with_context(|| format!("executing {idx}th migration"))?;
        tx.pragma_update(None, "user_version", idx as i32 + 1)
            .with_context(|| format!("updating user_version to {}", idx + 1))?;
        tx.commit()?;
    }
    Ok(())
}
