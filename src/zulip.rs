//! Zulip integration: the outgoing-webhook endpoint that receives chat
//! commands, and message delivery for notifications.

use crate::errors::AppError;
use crate::handlers::{self, Context};
use crate::zulip::api::Message;
use crate::zulip::commands::{ChatCommand, split_words};
use anyhow::Context as _;
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use subtle::ConstantTimeEq;

pub mod api;
pub mod client;
pub mod commands;

pub use client::ZulipClient;

/// Where a message should go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Recipient {
    Stream {
        id: u64,
        #[serde(default)]
        name: String,
        topic: String,
    },
    Private {
        email: String,
    },
}

/// Where a command came from, kept so that later notifications can be sent
/// back to the same place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub recipient: Recipient,
    /// Full name of the person who sent the command.
    pub requester: String,
}

impl Origin {
    pub fn describe(&self) -> String {
        match &self.recipient {
            Recipient::Stream { id, name, topic } if name.is_empty() => {
                format!("stream {id} > {topic}, by {}", self.requester)
            }
            Recipient::Stream { name, topic, .. } => {
                format!("#**{name}>{topic}**, by {}", self.requester)
            }
            Recipient::Private { .. } => format!("private message to {}", self.requester),
        }
    }
}

/// Sends text to chat. Delivery is best effort: failures are logged by the
/// implementation and never reported to the caller.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, origin: &Origin, text: &str);
}

#[derive(Debug, serde::Deserialize)]
pub struct Request {
    /// Markdown body of the sent message.
    data: String,

    /// Metadata about this request.
    message: Message,

    /// Authentication token. The same for all Zulip messages.
    token: String,
}

#[derive(Debug, serde::Serialize)]
pub struct Response {
    content: String,
}

impl Response {
    fn new(content: impl Into<String>) -> Self {
        Response {
            content: content.into(),
        }
    }
}

impl Message {
    fn origin(&self) -> anyhow::Result<Origin> {
        let recipient = if self.type_ == "stream" {
            Recipient::Stream {
                id: self.stream_id.context("stream message without stream_id")?,
                name: self
                    .display_recipient
                    .as_str()
                    .unwrap_or_default()
                    .to_string(),
                topic: self.subject.clone(),
            }
        } else {
            Recipient::Private {
                email: self.sender_email.clone(),
            }
        };
        Ok(Origin {
            recipient,
            requester: self.sender_full_name.clone(),
        })
    }
}

/// The `POST /zulip-hook` endpoint.
pub async fn webhook(
    State(ctx): State<Arc<Context>>,
    body: Bytes,
) -> axum::response::Result<Json<Response>, AppError> {
    let req: Request = crate::deserialize_payload(&body).context("zulip webhook payload")?;
    Ok(Json(respond(&ctx, req).await))
}

/// Handles one outgoing-webhook call and returns the reply.
pub async fn respond(ctx: &Context, req: Request) -> Response {
    let expected = ctx.webhook_token.expose_secret().as_bytes();
    if !bool::from(req.token.as_bytes().ct_eq(expected)) {
        return Response::new("Invalid authorization.");
    }

    tracing::trace!("zulip hook: {:?}", req.message);
    let origin = match req.message.origin() {
        Ok(origin) => origin,
        Err(e) => {
            tracing::warn!("cannot determine origin of message from {}: {e:?}", req.message.sender_id);
            return Response::new("Cannot reply to this kind of message.");
        }
    };

    let command = match ChatCommand::parse_words(split_words(strip_mention(&req.data))) {
        Ok(command) => command,
        Err(e) => return Response::new(format!("```\n{}\n```", e.render())),
    };
    tracing::info!("{} ran {:?}", origin.requester, command);

    Response::new(handlers::handle_command(ctx, &origin, command).await)
}

/// Removes a leading `@**Bot Name**` (or silent `@_**Bot Name**`) mention.
fn strip_mention(text: &str) -> &str {
    let text = text.trim_start();
    let rest = text
        .strip_prefix("@**")
        .or_else(|| text.strip_prefix("@_**"));
    match rest.and_then(|rest| rest.split_once("**")) {
        Some((_, after)) => after,
        None => text,
    }
}
