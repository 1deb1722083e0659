use crate::db::users;
use crate::handlers::Context;
use crate::user_error;
use std::fmt::Write;

/// Accepts `jane`, `@jane`, or a pasted `@**Jane Doe**` mention.
fn normalize_handle(handle: &str) -> &str {
    let handle = handle.trim();
    let handle = handle
        .strip_prefix("@_")
        .or_else(|| handle.strip_prefix('@'))
        .unwrap_or(handle);
    handle.trim_matches('*').trim()
}

pub(super) async fn associate(
    ctx: &Context,
    external_id: u64,
    chat_handle: &str,
) -> anyhow::Result<String> {
    let chat_handle = normalize_handle(chat_handle);
    if chat_handle.is_empty() {
        user_error!("The Zulip name must not be empty.");
    }
    users::associate(&*ctx.db, external_id, chat_handle).await?;
    Ok(format!(
        "Redmine user {external_id} is now associated with @**{chat_handle}**."
    ))
}

pub(super) async fn mark_absent(ctx: &Context, external_id: u64) -> anyhow::Result<String> {
    if !users::mark_absent(&*ctx.db, external_id).await? {
        user_error!("User {external_id} is already marked absent.");
    }
    Ok(format!(
        "User {external_id} will not be assigned new issues until marked present."
    ))
}

pub(super) async fn mark_present(ctx: &Context, external_id: u64) -> anyhow::Result<String> {
    if !users::mark_present(&*ctx.db, external_id).await? {
        user_error!("User {external_id} is not marked absent.");
    }
    Ok(format!("User {external_id} is back in the assignment rotation."))
}

pub(super) async fn list_absent(ctx: &Context) -> anyhow::Result<String> {
    let absent = users::absent_users(&*ctx.db).await?;
    if absent.is_empty() {
        return Ok("No users are marked absent.".to_string());
    }
    let mut reply = String::from("Absent users:\n");
    for id in absent {
        match users::lookup(&*ctx.db, id).await? {
            Some(user) => writeln!(reply, "- {id} (@**{}**)", user.chat_handle)?,
            None => writeln!(reply, "- {id}")?,
        }
    }
    Ok(reply)
}
