use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "system" => Some(Self::System),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

/// A single conversation turn as sent to the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty_map")]
    pub metadata: Map<String, Value>,
}

/// Body of a store call. `importance_score` is omitted rather than sent as null.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewConversation {
    pub label: String,
    pub folder: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub importance_score: Option<f64>,
}

/// Conversation as returned by the controller's get-context operation.
///
/// Messages are kept as raw JSON so exports reproduce them exactly as stored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConversationRecord {
    #[serde(default, deserialize_with = "lenient_text")]
    pub conversation_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub id: Option<String>,
    pub label: String,
    pub folder: String,
    pub status: String,
    pub messages: Vec<Value>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub importance_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub word_count: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub session_count: Option<u64>,
}

impl ConversationRecord {
    /// `conversation_id` wins when the controller sends both spellings.
    pub fn resolved_id(&self) -> Option<&str> {
        self.conversation_id.as_deref().or(self.id.as_deref())
    }
}

/// Fields a conversation payload must carry before it can be rendered.
pub const CONVERSATION_REQUIRED_FIELDS: [&str; 4] = ["label", "folder", "status", "messages"];

/// The `{success, data, error}` wrapper every controller response uses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpstreamEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl UpstreamEnvelope {
    pub fn success(data: Map<String, Value>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            message: None,
        }
    }

    /// Returns `data` for a successful envelope. Anything else yields the upstream
    /// error text, if the controller sent one.
    pub fn into_data(self) -> Result<Map<String, Value>, Option<String>> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            _ => Err(self.error.filter(|e| !e.trim().is_empty())),
        }
    }
}

/// One search result. Every field is optional on the wire; the accessors supply the
/// placeholders used when rendering.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SearchHit {
    #[serde(default, deserialize_with = "lenient_text")]
    pub conversation_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub label: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub folder: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub similarity: Option<f64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub created_at: Option<String>,
}

impl SearchHit {
    pub fn id(&self) -> &str {
        self.conversation_id.as_deref().unwrap_or(UNKNOWN_ID)
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(UNTITLED)
    }

    pub fn folder(&self) -> &str {
        self.folder.as_deref().unwrap_or(ROOT_FOLDER)
    }

    pub fn content(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }

    pub fn similarity(&self) -> f64 {
        self.similarity.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PruneSuggestion {
    #[serde(default, deserialize_with = "lenient_text")]
    pub conversation_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub label: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub age_days: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub importance_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub reason: Option<String>,
}

impl PruneSuggestion {
    pub fn id(&self) -> &str {
        self.conversation_id.as_deref().unwrap_or(UNKNOWN_ID)
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(UNTITLED)
    }

    pub fn age_days(&self) -> f64 {
        self.age_days.unwrap_or(0.0)
    }

    pub fn reason(&self) -> &str {
        self.reason.as_deref().unwrap_or(NO_REASON)
    }
}

/// Stats payload. Missing, null or mistyped counters read as zero.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StatsSummary {
    #[serde(default, deserialize_with = "lenient_number")]
    pub total_conversations: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub average_importance: Option<f64>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub folders: Vec<Value>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub estimated_token_savings: Option<f64>,
}

impl StatsSummary {
    pub fn total_conversations(&self) -> f64 {
        self.total_conversations.unwrap_or(0.0)
    }

    pub fn average_importance(&self) -> f64 {
        self.average_importance.unwrap_or(0.0)
    }
}

const UNKNOWN_ID: &str = "unknown";
const UNTITLED: &str = "Untitled";
const ROOT_FOLDER: &str = "/";
const NO_REASON: &str = "No reason provided";

fn null_as_empty_map<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Strings, with bare numbers stringified. Anything else reads as absent.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Finite numbers, including numeric strings. Anything else reads as absent.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(as_number(Option::<Value>::deserialize(deserializer)?))
}

/// Non-negative counts. Fractional values round to the nearest whole count.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    if let Some(n) = value.as_ref().and_then(Value::as_u64) {
        return Ok(Some(n));
    }
    Ok(as_number(value)
        .filter(|n| *n >= 0.0 && *n <= u64::MAX as f64)
        .map(|n| n.round() as u64))
}

fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    })
}

fn as_number(value: Option<Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}
