use crate::db::{Store, Updater};
use anyhow::Context as _;
use anyhow::Result;
use tokio::sync::Mutex;
use tokio_postgres::types::Json;
use tracing::trace;

static MIGRATIONS: &[&str] = &["
CREATE TABLE brain (
    key TEXT PRIMARY KEY,
    data JSONB NOT NULL
);
"];

pub struct Postgres {
    client: Mutex<tokio_postgres::Client>,
}

impl Postgres {
    pub async fn connect(db_url: &str) -> Result<Self> {
        let client = make_client(db_url).await?;
        run_migrations(&client)
            .await
            .context("Cannot run database migrations")?;
        Ok(Postgres {
            client: Mutex::new(client),
        })
    }
}

async fn make_client(db_url: &str) -> Result<tokio_postgres::Client> {
    let (db_client, connection) = match tokio_postgres::connect(db_url, tokio_postgres::NoTls).await
    {
        Ok(v) => v,
        Err(e) => {
            anyhow::bail!("failed to connect to DB: {}", e);
        }
    };
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("database connection error: {}", e);
        }
    });

    Ok(db_client)
}

pub async fn run_migrations(client: &tokio_postgres::Client) -> Result<()> {
    client
        .execute(
            "CREATE TABLE IF NOT EXISTS database_versions (
                zero INTEGER PRIMARY KEY,
                migration_counter INTEGER
            );",
            &[],
        )
        .await
        .context("creating database versioning table")?;

    client
        .execute(
            "INSERT INTO database_versions (zero, migration_counter)
                VALUES (0, 0)
                ON CONFLICT DO NOTHING",
            &[],
        )
        .await
        .context("inserting initial database_versions")?;

    let migration_idx: i32 = client
        .query_one("SELECT migration_counter FROM database_versions", &[])
        .await
        .context("getting migration counter")?
        .get(0);
    let migration_idx = migration_idx as usize;

    for (idx, migration) in MIGRATIONS.iter().enumerate() {
        if idx >= migration_idx {
            client
                .execute(*migration, &[])
                .await
                .with_context(|| format!("executing {}th migration", idx))?;
            client
                .execute(
                    "UPDATE database_versions SET migration_counter = $1",
                    &[&(idx as i32 + 1)],
                )
                .await
                .with_context(|| format!("updating migration counter to {}", idx))?;
        }
    }

    Ok(())
}

#[async_trait::async_trait]
impl Store for Postgres {
    async fn load(&self, key: &str) -> Result<Option<serde_json::Value>> {
        trace!("load(key={})", key);
        let client = self.client.lock().await;
        let data = client
            .query_opt("SELECT data FROM brain WHERE key = $1", &[&key])
            .await
            .with_context(|| format!("selecting `{key}`"))?
            .map(|row| row.get::<usize, Json<serde_json::Value>>(0).0);
        Ok(data)
    }

    async fn update(&self, key: &str, f: &mut Updater<'_>) -> Result<()> {
        trace!("update(key={})", key);
        let mut client = self.client.lock().await;
        let tx = client.transaction().await.context("starting transaction")?;
        // Make sure the row exists so that it can be locked.
        tx.execute(
            "INSERT INTO brain (key, data) VALUES ($1, 'null'::jsonb) ON CONFLICT DO NOTHING",
            &[&key],
        )
        .await
        .with_context(|| format!("reserving `{key}`"))?;
        let current = tx
            .query_one("SELECT data FROM brain WHERE key = $1 FOR UPDATE", &[&key])
            .await
            .with_context(|| format!("locking `{key}`"))?
            .get::<usize, Json<serde_json::Value>>(0)
            .0;
        let current = match current {
            serde_json::Value::Null => None,
            v => Some(v),
        };
        let new = f(current)?;
        tx.execute(
            "UPDATE brain SET data = $2 WHERE key = $1",
            &[&key, &Json(&new)],
        )
        .await
        .with_context(|| format!("saving `{key}`"))?;
        tx.commit().await.context("committing transaction")?;
        Ok(())
    }
}
