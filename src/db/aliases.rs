//! Named project/tracker shortcuts for `create-issue`.

use crate::db::{Store, load_collection, modify_collection};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const ALIASES_KEY: &str = "aliases";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    pub project: String,
    #[serde(default)]
    pub tracker: Option<String>,
}

/// Stores `alias` under `name`, returning what it replaced.
pub async fn register_alias(db: &dyn Store, name: &str, alias: Alias) -> Result<Option<Alias>> {
    tracing::trace!("register_alias(name={})", name);
    let name = name.to_string();
    modify_collection(db, ALIASES_KEY, move |aliases: &mut BTreeMap<String, Alias>| {
        aliases.insert(name, alias)
    })
    .await
}

pub async fn get_alias(db: &dyn Store, name: &str) -> Result<Option<Alias>> {
    let mut aliases: BTreeMap<String, Alias> = load_collection(db, ALIASES_KEY).await?;
    Ok(aliases.remove(name))
}
