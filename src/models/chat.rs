use sea_orm::FromQueryResult;
use serde::{Deserialize, Serialize};

/// One row of the history replayed to a joining connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromQueryResult)]
pub struct ChatHistoryEntry {
    pub text: String,
    pub display_name: String,
    pub profile_color: String,
    pub timestamp: i64,
}

/// A freshly persisted message as broadcast to every connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatBroadcast {
    pub user_id: i32,
    pub text: String,
    pub display_name: String,
    pub profile_color: String,
    pub timestamp: i64,
}

/// Frames sent to the browser: `{"event": "...", "data": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "chat history")]
    History(Vec<ChatHistoryEntry>),

    #[serde(rename = "chat message")]
    Message(ChatBroadcast),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientMessage {
    #[serde(default)]
    pub text: String,
}

/// Frames accepted from the browser. Anything else is ignored by the socket loop.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "chat message")]
    Message(ClientMessage),
}
