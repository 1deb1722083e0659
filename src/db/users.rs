//! Redmine user id to chat handle associations, and the set of users who are
//! currently away and must be skipped when assigning.

use crate::db::{Store, load_collection, modify_collection};
use anyhow::Result;
use serde::{Deserialize, Serialize};

const USERS_KEY: &str = "users";
const ABSENT_USERS_KEY: &str = "absent_users";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// The Redmine user id.
    pub external_id: u64,
    /// Name to mention on Zulip.
    pub chat_handle: String,
}

/// Records a new association. Existing records for the same id are left in
/// place, and [`lookup`] keeps returning the first one.
pub async fn associate(db: &dyn Store, external_id: u64, chat_handle: &str) -> Result<()> {
    tracing::trace!("associate(external_id={}, chat_handle={})", external_id, chat_handle);
    let user = User {
        external_id,
        chat_handle: chat_handle.to_string(),
    };
    modify_collection(db, USERS_KEY, move |users: &mut Vec<User>| users.push(user)).await
}

pub async fn lookup(db: &dyn Store, external_id: u64) -> Result<Option<User>> {
    let users: Vec<User> = load_collection(db, USERS_KEY).await?;
    Ok(users.into_iter().find(|u| u.external_id == external_id))
}

/// Returns `false` if the user was already absent.
pub async fn mark_absent(db: &dyn Store, external_id: u64) -> Result<bool> {
    tracing::trace!("mark_absent(external_id={})", external_id);
    modify_collection(db, ABSENT_USERS_KEY, |absent: &mut Vec<u64>| {
        if absent.contains(&external_id) {
            false
        } else {
            absent.push(external_id);
            true
        }
    })
    .await
}

/// Returns `false` if the user was not absent to begin with.
pub async fn mark_present(db: &dyn Store, external_id: u64) -> Result<bool> {
    tracing::trace!("mark_present(external_id={})", external_id);
    modify_collection(db, ABSENT_USERS_KEY, |absent: &mut Vec<u64>| {
        let before = absent.len();
        absent.retain(|id| *id != external_id);
        absent.len() != before
    })
    .await
}

pub async fn is_absent(db: &dyn Store, external_id: u64) -> Result<bool> {
    Ok(absent_users(db).await?.contains(&external_id))
}

/// Absent user ids, in the order they were marked.
pub async fn absent_users(db: &dyn Store) -> Result<Vec<u64>> {
    load_collection(db, ABSENT_USERS_KEY).await
}
