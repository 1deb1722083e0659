/// Response of `POST /messages`.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct MessageApiResponse {
    #[serde(rename = "id")]
    pub(crate) message_id: u64,
}

/// The message that triggered an outgoing webhook.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct Message {
    pub(crate) sender_id: u64,
    pub(crate) sender_full_name: String,
    pub(crate) sender_email: String,
    /// `stream` or `private`.
    #[serde(rename = "type")]
    pub(crate) type_: String,
    #[serde(default)]
    pub(crate) stream_id: Option<u64>,
    /// The stream name for stream messages; a list of users for private ones.
    #[serde(default)]
    pub(crate) display_recipient: serde_json::Value,
    /// The topic.
    #[serde(default)]
    pub(crate) subject: String,
}
