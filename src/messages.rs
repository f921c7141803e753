use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Control wrapper the chat source puts around `/me` messages.
pub const ACTION_MARKER: &str = "\u{1}ACTION";

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "msg_type")]
pub enum ChatEvent {
    #[serde(rename = "privmsg")]
    Post(PostEvent),
    #[serde(rename = "clearchat")]
    ClearChat(ClearChatEvent),
    #[serde(rename = "clearmsg")]
    ClearMessage(ClearMessageEvent),
    #[serde(other)]
    Unknown,
}

impl ChatEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ChatEvent::Post(_) => "post",
            ChatEvent::ClearChat(event) if event.target().is_none() => "clear-all",
            ChatEvent::ClearChat(_) => "clear-user",
            ChatEvent::ClearMessage(_) => "clear-message",
            ChatEvent::Unknown => "unknown",
        }
    }

    /// The id the event acts on, used to correlate log lines.
    pub fn id(&self) -> Option<&str> {
        match self {
            ChatEvent::Post(event) => Some(&event.message_id),
            ChatEvent::ClearChat(event) => event.target(),
            ChatEvent::ClearMessage(event) => Some(&event.target_message_id),
            ChatEvent::Unknown => None,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
pub struct PostEvent {
    #[serde(rename = "id")]
    pub message_id: String,
    #[serde(rename = "display-name", default)]
    pub display_name: String,
    #[serde(rename = "user-id", default)]
    pub user_id: String,
    /// Lower-case login, the key for pronoun lookups.
    #[serde(rename = "nickname", default)]
    pub login: String,
    #[serde(default)]
    pub color: String,
    #[serde(rename = "msg_text", default)]
    pub text: String,
    #[serde(default, deserialize_with = "url_list")]
    pub badges: Vec<String>,
    #[serde(default)]
    pub emotes: String,
    #[serde(default)]
    pub action: bool,
}

impl PostEvent {
    pub fn author(&self) -> &str {
        if self.display_name.is_empty() {
            &self.login
        } else {
            &self.display_name
        }
    }

    pub fn is_action(&self) -> bool {
        self.action || self.text.contains(ACTION_MARKER)
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ClearChatEvent {
    /// Empty when the whole chat was cleared.
    #[serde(default)]
    pub username: String,
    #[serde(rename = "target-user-id", default)]
    pub target_user_id: String,
}

impl ClearChatEvent {
    pub fn target(&self) -> Option<&str> {
        if self.username.is_empty() {
            None
        } else {
            Some(&self.target_user_id)
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ClearMessageEvent {
    #[serde(rename = "target-msg-id")]
    pub target_message_id: String,
}

// The upstream bot forwards the raw `badges` tag string in some versions;
// anything that is not a list of strings renders no badges.
fn url_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(url) if !url.is_empty() => Some(url),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

#[cfg(test)]
#[path = "messages_test.rs"]
mod tests;
