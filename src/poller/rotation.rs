//! Round-robin selection of assignees.

use crate::db::Store;
use crate::db::users::{self, User};
use crate::db::watches::{self, Watch};
use anyhow::Result;

/// Picks the member of `pool` at `cursor`, skipping everyone in `absent`.
pub fn pick(pool: &[u64], absent: &[u64], cursor: u64) -> Option<u64> {
    let eligible: Vec<u64> = pool
        .iter()
        .copied()
        .filter(|id| !absent.contains(id))
        .collect();
    if eligible.is_empty() {
        return None;
    }
    Some(eligible[(cursor % eligible.len() as u64) as usize])
}

/// Selects the next assignee for a new issue of `watch` and moves its
/// rotation cursor forward.
///
/// The cursor moves on every call with a non-empty pool, even when everyone
/// is absent or the chosen user has no chat handle. `watch.assignee_index`
/// is kept in step with the stored value.
pub async fn next_assignee(db: &dyn Store, watch: &mut Watch) -> Result<Option<User>> {
    if watch.assignees.is_empty() {
        return Ok(None);
    }
    let absent = users::absent_users(db).await?;
    let selected = pick(&watch.assignees, &absent, watch.assignee_index);

    match watches::advance_rotation(db, watch.id).await? {
        Some(index) => watch.assignee_index = index,
        None => tracing::debug!("watch #{} was removed during rotation", watch.id),
    }

    let Some(selected) = selected else {
        tracing::info!("watch #{}: all assignees are absent", watch.id);
        return Ok(None);
    };
    let user = users::lookup(db, selected).await?;
    if user.is_none() {
        tracing::warn!("watch #{}: user {} has no associated chat handle", watch.id, selected);
    }
    Ok(user)
}
