//! Durable storage for the bot's state.
//!
//! Everything the bot remembers lives in a small key-value "brain": each key
//! holds one JSON document (a whole collection such as the list of watches).
//! Reads of a key are atomic, and so is every read-modify-write done through
//! [`Store::update`]. There are no transactions spanning several keys.

use anyhow::{Context as _, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub mod aliases;
pub mod postgres;
pub mod sqlite;
pub mod users;
pub mod watches;

/// Callback handed to [`Store::update`]: receives the current document (if
/// any) and returns the document to store.
pub type Updater<'a> = dyn FnMut(Option<serde_json::Value>) -> Result<serde_json::Value> + Send + 'a;

#[async_trait::async_trait]
pub trait Store: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<serde_json::Value>>;

    /// Atomically replaces the document under `key` with the result of `f`.
    ///
    /// If `f` fails nothing is written.
    async fn update(&self, key: &str, f: &mut Updater<'_>) -> Result<()>;
}

pub enum Pool {
    Sqlite(sqlite::Sqlite),
    Postgres(postgres::Postgres),
}

impl Pool {
    pub async fn open(uri: &str) -> Result<Pool> {
        if uri.starts_with("postgres") {
            tracing::info!("connecting to postgres");
            Ok(Pool::Postgres(postgres::Postgres::connect(uri).await?))
        } else {
            tracing::info!("opening sqlite database {uri}");
            Ok(Pool::Sqlite(sqlite::Sqlite::open(uri)?))
        }
    }

    pub async fn new_from_env() -> Result<Pool> {
        let uri = std::env::var("DATABASE_URL").unwrap_or_else(|_| "watchbot.sqlite3".to_string());
        Self::open(&uri).await
    }
}

#[async_trait::async_trait]
impl Store for Pool {
    async fn load(&self, key: &str) -> Result<Option<serde_json::Value>> {
        match self {
            Pool::Sqlite(db) => db.load(key).await,
            Pool::Postgres(db) => db.load(key).await,
        }
    }

    async fn update(&self, key: &str, f: &mut Updater<'_>) -> Result<()> {
        match self {
            Pool::Sqlite(db) => db.update(key, f).await,
            Pool::Postgres(db) => db.update(key, f).await,
        }
    }
}

fn decode<T: DeserializeOwned + Default>(key: &str, value: Option<serde_json::Value>) -> Result<T> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(T::default()),
        Some(value) => {
            serde_json::from_value(value).with_context(|| format!("decoding `{key}` collection"))
        }
    }
}

/// Loads the collection stored under `key`, or its default if never written.
pub async fn load_collection<T>(db: &dyn Store, key: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let value = db.load(key).await?;
    decode(key, value)
}

/// Runs `f` on the collection stored under `key` and writes it back, as one
/// atomic step. Returns what `f` returned.
pub async fn modify_collection<T, R, F>(db: &dyn Store, key: &str, f: F) -> Result<R>
where
    T: DeserializeOwned + Serialize + Default,
    F: FnOnce(&mut T) -> R + Send,
    R: Send,
{
    let mut f = Some(f);
    let mut result = None;
    db.update(key, &mut |value| {
        let mut data: T = decode(key, value)?;
        let f = f.take().context("collection updater invoked twice")?;
        result = Some(f(&mut data));
        serde_json::to_value(&data).with_context(|| format!("encoding `{key}` collection"))
    })
    .await?;
    result.context("collection updater was never invoked")
}
