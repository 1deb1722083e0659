#![allow(clippy::new_without_default)]

use anyhow::Context;

pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod logger;
pub mod poller;
pub mod redmine;
pub mod utils;
pub mod zulip;


/// Deserializes JSON, reporting the path of the offending field on failure.
pub fn deserialize_payload<T: serde::de::DeserializeOwned>(v: &[u8]) -> anyhow::Result<T> {
    let mut deserializer = serde_json::Deserializer::from_slice(v);
    let res: Result<T, _> = serde_path_to_error::deserialize(&mut deserializer);
    match res {
        Ok(r) => Ok(r),
        Err(e) => {
            let ctx = format!("at {}", e.path());
            Err(e.into_inner()).context(ctx)
        }
    }
}
