use crate::config::Config;
use crate::zulip::api::MessageApiResponse;
use crate::zulip::{Notifier, Origin, Recipient};
use anyhow::Context;
use reqwest::{Client, Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::env;
use std::time::Duration;

#[derive(Clone)]
pub struct ZulipClient {
    client: Client,
    instance_url: String,
    bot_email: String,
    bot_api_token: SecretString,
}

impl ZulipClient {
    pub fn new_from_env(config: &Config) -> anyhow::Result<Self> {
        let instance_url = env::var("ZULIP_URL").context("ZULIP_URL is missing")?;
        let bot_email = env::var("ZULIP_BOT_EMAIL").context("ZULIP_BOT_EMAIL is missing")?;
        let token = env::var("ZULIP_API_TOKEN").context("ZULIP_API_TOKEN is missing")?;
        Self::new(instance_url, bot_email, token.into(), config.request_timeout())
    }

    /// Every request made by the returned client gives up after `timeout`.
    pub fn new(
        instance_url: String,
        bot_email: String,
        bot_api_token: SecretString,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            client,
            instance_url: instance_url.trim_end_matches('/').to_string(),
            bot_email,
            bot_api_token,
        })
    }

    pub(crate) async fn send_message(
        &self,
        recipient: &Recipient,
        content: &str,
    ) -> anyhow::Result<MessageApiResponse> {
        #[derive(serde::Serialize)]
        struct SerializedApi<'a> {
            #[serde(rename = "type")]
            type_: &'static str,
            to: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            topic: Option<&'a str>,
            content: &'a str,
        }

        let response = self
            .make_request(Method::POST, "messages")
            .form(&SerializedApi {
                type_: match recipient {
                    Recipient::Stream { .. } => "stream",
                    Recipient::Private { .. } => "private",
                },
                to: match recipient {
                    Recipient::Stream { id, .. } => id.to_string(),
                    Recipient::Private { email } => email.to_string(),
                },
                topic: match recipient {
                    Recipient::Stream { topic, .. } => Some(topic.as_str()),
                    Recipient::Private { .. } => None,
                },
                content,
            })
            .send()
            .await
            .context("fail sending Zulip message")?;

        deserialize_response::<MessageApiResponse>(response).await
    }

    fn make_request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/api/v1/{url}", self.instance_url))
            .basic_auth(&self.bot_email, Some(self.bot_api_token.expose_secret()))
    }
}

#[async_trait::async_trait]
impl Notifier for ZulipClient {
    async fn deliver(&self, origin: &Origin, text: &str) {
        match self.send_message(&origin.recipient, text).await {
            Ok(resp) => tracing::debug!("delivered Zulip message {}", resp.message_id),
            Err(e) => tracing::warn!("failed to deliver message to {}: {e:?}", origin.describe()),
        }
    }
}

async fn deserialize_response<T>(response: Response) -> anyhow::Result<T>
where
    T: DeserializeOwned,
{
    let status = response.status();
    let body = response
        .bytes()
        .await
        .context("failed to read Zulip response")?;
    if !status.is_success() {
        anyhow::bail!(
            "Zulip API request failed with {status}: {}",
            String::from_utf8_lossy(&body)
        );
    }
    crate::deserialize_payload(&body)
        .with_context(|| format!("unexpected Zulip response: {}", String::from_utf8_lossy(&body)))
}
