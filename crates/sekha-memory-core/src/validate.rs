use chrono::{DateTime, NaiveDateTime};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::{Message, MessageRole, NewConversation};

pub const MAX_LABEL_CHARS: usize = 500;
pub const MAX_QUERY_CHARS: usize = 1000;
pub const DEFAULT_SEARCH_LIMIT: u32 = 10;
pub const MAX_SEARCH_LIMIT: u32 = 50;
pub const DEFAULT_PRUNE_THRESHOLD_DAYS: u32 = 30;
pub const MAX_PRUNE_THRESHOLD_DAYS: u32 = 365;
pub const MIN_IMPORTANCE: f64 = 0.0;
pub const MAX_IMPORTANCE: f64 = 10.0;

const UUID_LEN: usize = 36;

/// A tool argument that failed a schema, range, pattern or cross-field check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct ValidationFailure {
    pub field: String,
    pub reason: String,
}

impl ValidationFailure {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Raw tool arguments. A missing or `null` argument value counts as absent.
#[derive(Debug, Clone, Default)]
pub struct ArgumentBag {
    fields: Map<String, Value>,
}

impl ArgumentBag {
    pub fn from_arguments(arguments: Option<Value>) -> Result<Self, ValidationFailure> {
        match arguments {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(Value::Object(fields)) => Ok(Self { fields }),
            Some(_) => Err(ValidationFailure::new(
                "arguments",
                "tool arguments must be a JSON object",
            )),
        }
    }

    fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field).filter(|v| !v.is_null())
    }

    fn required_str(&self, field: &str) -> Result<&str, ValidationFailure> {
        self.optional_str(field)?
            .ok_or_else(|| ValidationFailure::new(field, "is required"))
    }

    fn optional_str(&self, field: &str) -> Result<Option<&str>, ValidationFailure> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(ValidationFailure::new(field, "must be a string")),
        }
    }

    fn optional_number(&self, field: &str) -> Result<Option<f64>, ValidationFailure> {
        match self.get(field) {
            None => Ok(None),
            Some(v) => v
                .as_f64()
                .map(Some)
                .ok_or_else(|| ValidationFailure::new(field, "must be a number")),
        }
    }

    fn optional_integer(&self, field: &str) -> Result<Option<i64>, ValidationFailure> {
        match self.get(field) {
            None => Ok(None),
            Some(v) => v
                .as_i64()
                .map(Some)
                .ok_or_else(|| ValidationFailure::new(field, "must be an integer")),
        }
    }

    fn optional_bool(&self, field: &str) -> Result<Option<bool>, ValidationFailure> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(ValidationFailure::new(field, "must be a boolean")),
        }
    }

    fn optional_array(&self, field: &str) -> Result<Option<&Vec<Value>>, ValidationFailure> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::Array(items)) => Ok(Some(items)),
            Some(_) => Err(ValidationFailure::new(field, "must be an array")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    pub query: String,
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_labels: Option<Vec<String>>,
}

/// Update body: only the fields the caller asked to change are serialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateRequest {
    pub conversation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub importance_score: Option<f64>,
}

impl UpdateRequest {
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.label.is_some() {
            out.push("label");
        }
        if self.folder.is_some() {
            out.push("folder");
        }
        if self.importance_score.is_some() {
            out.push("importance_score");
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextRequest {
    pub conversation_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PruneRequest {
    pub threshold_days: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub importance_threshold: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl ExportFormat {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "markdown" => Some(Self::Markdown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub conversation_id: String,
    pub format: ExportFormat,
    pub include_metadata: bool,
}

impl ExportRequest {
    pub fn context(&self) -> ContextRequest {
        ContextRequest {
            conversation_id: self.conversation_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
}

pub fn validate_store(args: &ArgumentBag) -> Result<NewConversation, ValidationFailure> {
    let label = validate_label("label", args.required_str("label")?)?;
    let folder = validate_folder("folder", args.required_str("folder")?)?;

    let raw_messages = args
        .optional_array("messages")?
        .ok_or_else(|| ValidationFailure::new("messages", "is required"))?;
    if raw_messages.is_empty() {
        return Err(ValidationFailure::new(
            "messages",
            "at least one message is required",
        ));
    }
    let messages = raw_messages
        .iter()
        .enumerate()
        .map(|(idx, raw)| validate_message(idx, raw))
        .collect::<Result<Vec<_>, _>>()?;

    let importance_score = args
        .optional_number("importance_score")?
        .map(|v| validate_importance("importance_score", v))
        .transpose()?;

    Ok(NewConversation {
        label,
        folder,
        messages,
        importance_score,
    })
}

pub fn validate_search(args: &ArgumentBag) -> Result<SearchRequest, ValidationFailure> {
    let query = args.required_str("query")?;
    if query.trim().is_empty() {
        return Err(ValidationFailure::new("query", "search query cannot be empty"));
    }
    if query.chars().count() > MAX_QUERY_CHARS {
        return Err(ValidationFailure::new(
            "query",
            format!("must be at most {MAX_QUERY_CHARS} characters"),
        ));
    }

    let limit = match args.optional_integer("limit")? {
        None => DEFAULT_SEARCH_LIMIT,
        Some(v) => bounded_u32("limit", v, 1, MAX_SEARCH_LIMIT)?,
    };

    let filter_labels = match args.optional_array("filter_labels")? {
        None => None,
        Some(items) => {
            let mut labels = Vec::with_capacity(items.len());
            for (idx, item) in items.iter().enumerate() {
                let field = format!("filter_labels[{idx}]");
                match item.as_str() {
                    Some(s) if !s.is_empty() => labels.push(s.to_string()),
                    Some(_) => return Err(ValidationFailure::new(field, "must not be empty")),
                    None => return Err(ValidationFailure::new(field, "must be a string")),
                }
            }
            Some(labels).filter(|l| !l.is_empty())
        }
    };

    Ok(SearchRequest {
        query: query.to_string(),
        limit,
        filter_labels,
    })
}

pub fn validate_update(args: &ArgumentBag) -> Result<UpdateRequest, ValidationFailure> {
    let conversation_id = validate_conversation_id(args)?;
    let label = args
        .optional_str("label")?
        .map(|v| validate_label("label", v))
        .transpose()?;
    let folder = args
        .optional_str("folder")?
        .map(|v| validate_folder("folder", v))
        .transpose()?;
    let importance_score = args
        .optional_number("importance_score")?
        .map(|v| validate_importance("importance_score", v))
        .transpose()?;

    let request = UpdateRequest {
        conversation_id,
        label,
        folder,
        importance_score,
    };
    if request.changed_fields().is_empty() {
        return Err(ValidationFailure::new(
            "fields",
            "at least one field (label, folder, or importance_score) must be provided",
        ));
    }
    Ok(request)
}

pub fn validate_get_context(args: &ArgumentBag) -> Result<ContextRequest, ValidationFailure> {
    Ok(ContextRequest {
        conversation_id: validate_conversation_id(args)?,
    })
}

pub fn validate_prune(args: &ArgumentBag) -> Result<PruneRequest, ValidationFailure> {
    let threshold_days = match args.optional_integer("threshold_days")? {
        None => DEFAULT_PRUNE_THRESHOLD_DAYS,
        Some(v) => bounded_u32("threshold_days", v, 1, MAX_PRUNE_THRESHOLD_DAYS)?,
    };
    let importance_threshold = args
        .optional_number("importance_threshold")?
        .map(|v| validate_importance("importance_threshold", v))
        .transpose()?;
    Ok(PruneRequest {
        threshold_days,
        importance_threshold,
    })
}

pub fn validate_export(args: &ArgumentBag) -> Result<ExportRequest, ValidationFailure> {
    let conversation_id = validate_conversation_id(args)?;
    let format = match args.optional_str("format")? {
        None => ExportFormat::Json,
        Some(raw) => ExportFormat::parse(raw).ok_or_else(|| {
            ValidationFailure::new(
                "format",
                format!("unsupported format '{raw}', use 'json' or 'markdown'"),
            )
        })?,
    };
    let include_metadata = args.optional_bool("include_metadata")?.unwrap_or(true);
    Ok(ExportRequest {
        conversation_id,
        format,
        include_metadata,
    })
}

pub fn validate_stats(args: &ArgumentBag) -> Result<StatsRequest, ValidationFailure> {
    let folder = args
        .optional_str("folder")?
        .map(|v| validate_folder("folder", v))
        .transpose()?;
    Ok(StatsRequest { folder })
}

/// Exactly 36 characters drawn from hex digits and `-`.
pub fn is_uuid_shaped(raw: &str) -> bool {
    raw.len() == UUID_LEN && raw.chars().all(|c| c.is_ascii_hexdigit() || c == '-')
}

/// Matches `^/[A-Za-z0-9_\-/]*$`.
pub fn is_valid_folder(raw: &str) -> bool {
    raw.starts_with('/')
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '/'))
}

fn validate_conversation_id(args: &ArgumentBag) -> Result<String, ValidationFailure> {
    let raw = args.required_str("conversation_id")?;
    if raw.is_empty() {
        return Err(ValidationFailure::new("conversation_id", "must not be empty"));
    }
    if !is_uuid_shaped(raw) {
        return Err(ValidationFailure::new(
            "conversation_id",
            format!("'{raw}' is not a UUID"),
        ));
    }
    Ok(raw.to_string())
}

fn validate_label(field: &str, raw: &str) -> Result<String, ValidationFailure> {
    let len = raw.chars().count();
    if len == 0 || len > MAX_LABEL_CHARS {
        return Err(ValidationFailure::new(
            field,
            format!("length must be between 1 and {MAX_LABEL_CHARS} characters"),
        ));
    }
    Ok(raw.to_string())
}

fn validate_folder(field: &str, raw: &str) -> Result<String, ValidationFailure> {
    if !is_valid_folder(raw) {
        return Err(ValidationFailure::new(
            field,
            format!("'{raw}' must start with '/' and contain only letters, digits, '_', '-' or '/'"),
        ));
    }
    Ok(raw.to_string())
}

fn validate_importance(field: &str, v: f64) -> Result<f64, ValidationFailure> {
    if (MIN_IMPORTANCE..=MAX_IMPORTANCE).contains(&v) {
        Ok(v)
    } else {
        Err(ValidationFailure::new(
            field,
            format!("must be between {MIN_IMPORTANCE:.1} and {MAX_IMPORTANCE:.1}"),
        ))
    }
}

fn bounded_u32(field: &str, v: i64, min: u32, max: u32) -> Result<u32, ValidationFailure> {
    u32::try_from(v)
        .ok()
        .filter(|n| (min..=max).contains(n))
        .ok_or_else(|| ValidationFailure::new(field, format!("must be between {min} and {max}")))
}

fn validate_message(idx: usize, raw: &Value) -> Result<Message, ValidationFailure> {
    let prefix = format!("messages[{idx}]");
    let Some(obj) = raw.as_object() else {
        return Err(ValidationFailure::new(prefix, "must be an object"));
    };

    let role = match obj.get("role") {
        Some(Value::String(s)) => MessageRole::parse(s).ok_or_else(|| {
            ValidationFailure::new(
                format!("{prefix}.role"),
                format!("'{s}' is not one of user, assistant, system"),
            )
        })?,
        Some(Value::Null) | None => {
            return Err(ValidationFailure::new(format!("{prefix}.role"), "is required"))
        }
        Some(_) => {
            return Err(ValidationFailure::new(
                format!("{prefix}.role"),
                "must be a string",
            ))
        }
    };

    let content = match obj.get("content") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::String(_)) => {
            return Err(ValidationFailure::new(
                format!("{prefix}.content"),
                "must not be empty",
            ))
        }
        Some(Value::Null) | None => {
            return Err(ValidationFailure::new(
                format!("{prefix}.content"),
                "is required",
            ))
        }
        Some(_) => {
            return Err(ValidationFailure::new(
                format!("{prefix}.content"),
                "must be a string",
            ))
        }
    };

    let timestamp = match obj.get("timestamp") {
        Some(Value::String(s)) if is_timestamp(s) => Some(s.clone()),
        Some(Value::Null) | None => None,
        Some(_) => {
            return Err(ValidationFailure::new(
                format!("{prefix}.timestamp"),
                "must be an ISO 8601 date-time",
            ))
        }
    };

    let metadata = match obj.get("metadata") {
        Some(Value::Object(m)) => m.clone(),
        Some(Value::Null) | None => Map::new(),
        Some(_) => {
            return Err(ValidationFailure::new(
                format!("{prefix}.metadata"),
                "must be an object",
            ))
        }
    };

    Ok(Message {
        role,
        content,
        timestamp,
        metadata,
    })
}

fn is_timestamp(raw: &str) -> bool {
    DateTime::parse_from_rfc3339(raw).is_ok()
        || NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
}
