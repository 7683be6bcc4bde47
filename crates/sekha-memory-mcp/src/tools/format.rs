//! Rendering of controller envelopes and local failures into MCP text segments.
//!
//! Every function here is total: malformed or partial upstream data becomes a failure
//! segment, never a panic or an `Err`.

use chrono::{DateTime, SecondsFormat, Utc};
use sekha_memory_controller::GatewayError;
use sekha_memory_core::{
    ConversationRecord, ExportFormat, ExportRequest, PruneSuggestion, SearchHit, StatsSummary,
    UpstreamEnvelope, ValidationFailure, CONVERSATION_REQUIRED_FIELDS,
};
use serde::Serialize;
use serde_json::{Map, Value};

pub const SUCCESS_MARKER: &str = "✅";
pub const FAILURE_MARKER: &str = "❌";
pub const WARNING_MARKER: &str = "⚠️";

const EXCERPT_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Validation,
    Upstream,
    Transport,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Upstream => "upstream",
            Self::Transport => "transport",
        }
    }
}

/// Result of one tool invocation: at least one text segment, plus the failure category
/// when the call did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    segments: Vec<String>,
    failure: Option<FailureKind>,
}

impl ToolOutput {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            segments: vec![text.into()],
            failure: None,
        }
    }

    pub fn failure(kind: FailureKind, text: impl Into<String>) -> Self {
        Self {
            segments: vec![text.into()],
            failure: Some(kind),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure
    }

    pub fn is_error(&self) -> bool {
        self.failure.is_some()
    }

    pub fn text(&self) -> String {
        self.segments.join("\n")
    }
}

/// How a tool words its failures: `❌ <prefix>: <reason>`, with `fallback` standing in
/// when the controller gave no reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureText {
    pub prefix: &'static str,
    pub fallback: &'static str,
}

impl FailureText {
    pub const STORE: Self = Self::new("Failed to store conversation", "Unknown error");
    pub const SEARCH: Self = Self::new("Search failed", "Search failed");
    pub const UPDATE: Self = Self::new("Update failed", "Update failed");
    pub const GET_CONTEXT: Self = Self::new("Conversation not found", "Conversation not found");
    pub const PRUNE: Self = Self::new("Prune check failed", "Prune check failed");
    pub const EXPORT: Self = Self::new("Export failed", "Conversation not found");
    pub const STATS: Self = Self::new("", "Stats retrieval failed");

    const fn new(prefix: &'static str, fallback: &'static str) -> Self {
        Self { prefix, fallback }
    }

    pub fn render(&self, reason: Option<&str>) -> String {
        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(self.fallback);
        if self.prefix.is_empty() {
            format!("{FAILURE_MARKER} {reason}")
        } else {
            format!("{FAILURE_MARKER} {}: {reason}", self.prefix)
        }
    }
}

pub fn validation_failure(err: &ValidationFailure) -> ToolOutput {
    ToolOutput::failure(
        FailureKind::Validation,
        format!("{FAILURE_MARKER} Validation error: {err}"),
    )
}

pub fn gateway_failure(text: FailureText, err: &GatewayError) -> ToolOutput {
    let kind = if err.is_transport() {
        FailureKind::Transport
    } else {
        FailureKind::Upstream
    };
    ToolOutput::failure(kind, text.render(Some(&err.describe())))
}

fn upstream_failure(text: FailureText, reason: Option<&str>) -> ToolOutput {
    ToolOutput::failure(FailureKind::Upstream, text.render(reason))
}

fn malformed(detail: impl std::fmt::Display) -> ToolOutput {
    ToolOutput::failure(
        FailureKind::Upstream,
        format!("{FAILURE_MARKER} Malformed conversation data: {detail}"),
    )
}

/// Unwraps `data` or renders the envelope's failure with the tool's wording.
fn envelope_data(
    envelope: UpstreamEnvelope,
    text: FailureText,
) -> Result<Map<String, Value>, ToolOutput> {
    envelope
        .into_data()
        .map_err(|err| upstream_failure(text, err.as_deref()))
}

fn list_field<T>(data: &Map<String, Value>, field: &str) -> Result<Vec<T>, String>
where
    T: serde::de::DeserializeOwned,
{
    match data.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|err| format!("`{field}` has an unexpected shape: {err}")),
    }
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{word}s")
    }
}

/// Integral scores keep one decimal (`8.0`); others print as-is.
fn score(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

/// Counts print without a decimal point unless the controller sent a fraction.
fn quantity(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

fn excerpt(content: &str) -> String {
    if content.chars().count() > EXCERPT_CHARS {
        let cut: String = content.chars().take(EXCERPT_CHARS).collect();
        format!("{cut}...")
    } else {
        content.to_string()
    }
}

pub fn store(envelope: UpstreamEnvelope) -> ToolOutput {
    let data = match envelope_data(envelope, FailureText::STORE) {
        Ok(data) => data,
        Err(out) => return out,
    };
    let id = data
        .get("conversation_id")
        .or_else(|| data.get("id"))
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let count = data
        .get("message_count")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    ToolOutput::success(format!(
        "{SUCCESS_MARKER} Conversation stored successfully!\nID: {id}\nMessages: {count}"
    ))
}

pub fn search(envelope: UpstreamEnvelope) -> ToolOutput {
    let data = match envelope_data(envelope, FailureText::SEARCH) {
        Ok(data) => data,
        Err(out) => return out,
    };
    let hits: Vec<SearchHit> = match list_field(&data, "results") {
        Ok(hits) => hits,
        Err(detail) => return upstream_failure(FailureText::SEARCH, Some(&detail)),
    };
    if hits.is_empty() {
        return ToolOutput::success("🔍 No matching conversations found.");
    }

    let mut out = format!(
        "🔍 Found {} relevant {}:\n",
        hits.len(),
        plural(hits.len(), "conversation")
    );
    for (i, hit) in hits.iter().enumerate() {
        out.push_str(&format!(
            "\n{}. **{}** (Score: {:.2})\n   📁 {}\n   📝 {}\n   🆔 {}",
            i + 1,
            hit.label(),
            hit.similarity(),
            hit.folder(),
            excerpt(hit.content()),
            hit.id()
        ));
    }
    ToolOutput::success(out)
}

pub fn update(envelope: UpstreamEnvelope) -> ToolOutput {
    let data = match envelope_data(envelope, FailureText::UPDATE) {
        Ok(data) => data,
        Err(out) => return out,
    };
    let fields: Vec<&str> = data
        .get("updated_fields")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    if fields.is_empty() {
        return ToolOutput::success(format!(
            "{WARNING_MARKER} Conversation update completed, but no fields were changed.\n\
             Check if the values are different from current ones."
        ));
    }
    ToolOutput::success(format!(
        "{SUCCESS_MARKER} Conversation updated successfully!\nFields changed: {}",
        fields.join(", ")
    ))
}

/// Checks the fields every conversation rendering needs, then decodes the record.
fn conversation(data: Map<String, Value>) -> Result<ConversationRecord, ToolOutput> {
    let missing: Vec<&str> = CONVERSATION_REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| !data.contains_key(*field))
        .collect();
    if !missing.is_empty() {
        return Err(malformed(format!(
            "missing required fields: {}",
            missing.join(", ")
        )));
    }
    serde_json::from_value(Value::Object(data)).map_err(malformed)
}

fn message_str<'a>(msg: &'a Value, field: &str) -> Option<&'a str> {
    msg.get(field).and_then(Value::as_str)
}

pub fn get_context(envelope: UpstreamEnvelope) -> ToolOutput {
    let data = match envelope_data(envelope, FailureText::GET_CONTEXT) {
        Ok(data) => data,
        Err(out) => return out,
    };
    let record = match conversation(data) {
        Ok(record) => record,
        Err(out) => return out,
    };

    let mut out = String::new();
    out.push_str(&format!("📄 **{}**\n", record.label));
    out.push_str(&format!("📁 Folder: {}\n", record.folder));
    out.push_str(&format!("📊 Status: {}\n", record.status));
    out.push_str(&format!(
        "⭐ Importance: {}\n",
        record
            .importance_score
            .map(score)
            .unwrap_or_else(|| "N/A".to_string())
    ));
    out.push_str(&format!(
        "🕐 Created: {}\n",
        record.created_at.as_deref().unwrap_or("Unknown")
    ));
    out.push_str(&format!("📝 Messages: {}\n", record.messages.len()));
    out.push_str(&"=".repeat(50));
    out.push('\n');

    for (i, msg) in record.messages.iter().enumerate() {
        let role = message_str(msg, "role").unwrap_or("unknown").to_uppercase();
        let content = message_str(msg, "content").unwrap_or_default();
        out.push_str(&format!("{}. **{role}**: {content}\n", i + 1));
    }
    if record.messages.is_empty() {
        out.push_str("\n*No messages found in this conversation*\n");
    }
    ToolOutput::success(out)
}

pub fn prune(envelope: UpstreamEnvelope, threshold_days: u32) -> ToolOutput {
    let data = match envelope_data(envelope, FailureText::PRUNE) {
        Ok(data) => data,
        Err(out) => return out,
    };
    let suggestions: Vec<PruneSuggestion> = match list_field(&data, "suggestions") {
        Ok(s) => s,
        Err(detail) => return upstream_failure(FailureText::PRUNE, Some(&detail)),
    };
    if suggestions.is_empty() {
        return ToolOutput::success(format!(
            "{SUCCESS_MARKER} No conversations need pruning.\n\
             All conversations are within {threshold_days} days or above importance threshold."
        ));
    }

    let mut out = format!(
        "🗑️ Found {} {} to consider pruning:\n",
        suggestions.len(),
        plural(suggestions.len(), "conversation")
    );
    for (i, s) in suggestions.iter().enumerate() {
        out.push_str(&format!(
            "\n{}. **{}** (ID: {})\n   📅 Age: {} days\n   ⭐ Importance: {}/10\n   💭 Reason: {}",
            i + 1,
            s.label(),
            s.id(),
            quantity(s.age_days()),
            s.importance_score.map_or_else(|| "N/A".to_string(), score),
            s.reason()
        ));
    }
    out.push_str(
        "\n\n💡 Tip: Review these conversations before pruning. \
         Consider updating importance scores for valuable old conversations.",
    );
    ToolOutput::success(out)
}

#[derive(Serialize)]
struct JsonExport<'a> {
    conversation_id: Option<&'a str>,
    label: &'a str,
    folder: &'a str,
    status: &'a str,
    importance_score: Option<f64>,
    created_at: Option<&'a str>,
    exported_at: String,
    messages: &'a [Value],
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<ExportMetadata>,
}

#[derive(Serialize)]
struct ExportMetadata {
    word_count: u64,
    session_count: Option<u64>,
}

pub fn export(
    envelope: UpstreamEnvelope,
    request: &ExportRequest,
    exported_at: DateTime<Utc>,
) -> ToolOutput {
    let data = match envelope_data(envelope, FailureText::EXPORT) {
        Ok(data) => data,
        Err(out) => return out,
    };
    let record = match conversation(data) {
        Ok(record) => record,
        Err(out) => return out,
    };
    match request.format {
        ExportFormat::Json => export_json(&record, request.include_metadata, exported_at),
        ExportFormat::Markdown => ToolOutput::success(export_markdown(
            &record,
            request.include_metadata,
            exported_at,
        )),
    }
}

fn export_json(
    record: &ConversationRecord,
    include_metadata: bool,
    exported_at: DateTime<Utc>,
) -> ToolOutput {
    let metadata = record
        .word_count
        .filter(|count| include_metadata && *count > 0)
        .map(|word_count| ExportMetadata {
            word_count,
            session_count: record.session_count,
        });
    let doc = JsonExport {
        conversation_id: record.resolved_id(),
        label: &record.label,
        folder: &record.folder,
        status: &record.status,
        importance_score: record.importance_score,
        created_at: record.created_at.as_deref(),
        exported_at: exported_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        messages: &record.messages,
        metadata,
    };
    match serde_json::to_string_pretty(&doc) {
        Ok(text) => ToolOutput::success(text),
        Err(err) => upstream_failure(FailureText::EXPORT, Some(&err.to_string())),
    }
}

fn capitalize(raw: &str) -> String {
    let lower = raw.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn export_markdown(
    record: &ConversationRecord,
    include_metadata: bool,
    exported_at: DateTime<Utc>,
) -> String {
    let mut lines = vec![
        format!("# {}", record.label),
        String::new(),
        format!(
            "**ID:** `{}`",
            record.resolved_id().unwrap_or("unknown")
        ),
        format!("**Folder:** {}", record.folder),
        format!("**Status:** {}", record.status),
        match record.importance_score {
            Some(v) => format!("**Importance:** {}/10", score(v)),
            None => "**Importance:** N/A".to_string(),
        },
        format!(
            "**Created:** {}",
            record.created_at.as_deref().unwrap_or("Unknown")
        ),
        format!(
            "**Exported:** {} UTC",
            exported_at.format("%Y-%m-%d %H:%M:%S")
        ),
        String::new(),
    ];

    if include_metadata {
        if let Some(words) = record.word_count.filter(|w| *w > 0) {
            lines.push(format!("**Word Count:** {words}"));
        }
        if let Some(sessions) = record.session_count.filter(|s| *s > 0) {
            lines.push(format!("**Sessions:** {sessions}"));
        }
        lines.push(String::new());
    }

    lines.push("## Messages".to_string());
    lines.push(String::new());
    for (i, msg) in record.messages.iter().enumerate() {
        let role = capitalize(message_str(msg, "role").unwrap_or("unknown"));
        lines.push(format!("### {}. {role}", i + 1));
        if let Some(ts) = message_str(msg, "timestamp").filter(|t| !t.is_empty()) {
            lines.push(format!("*{ts}*"));
        }
        lines.push(String::new());
        lines.push(message_str(msg, "content").unwrap_or_default().to_string());
        lines.push(String::new());
    }
    lines.join("\n")
}

pub fn stats(envelope: UpstreamEnvelope) -> ToolOutput {
    let data = match envelope_data(envelope, FailureText::STATS) {
        Ok(data) => data,
        Err(out) => return out,
    };
    let summary: StatsSummary = match serde_json::from_value(Value::Object(data)) {
        Ok(summary) => summary,
        Err(err) => {
            return upstream_failure(
                FailureText::STATS,
                Some(&format!("Stats response has an unexpected shape: {err}")),
            )
        }
    };

    let mut out = String::from("📊 Memory Statistics\n");
    out.push_str(&"=".repeat(30));
    out.push('\n');
    out.push_str(&format!(
        "Total Conversations: {}\n",
        quantity(summary.total_conversations())
    ));
    out.push_str(&format!(
        "Average Importance: {:.1}/10\n",
        summary.average_importance()
    ));
    if !summary.folders.is_empty() {
        out.push_str("\n📁 Folders:\n");
        for folder in &summary.folders {
            match folder {
                Value::String(name) => out.push_str(&format!("  - {name}\n")),
                other => out.push_str(&format!("  - {other}\n")),
            }
        }
    }
    if let Some(tokens) = summary.estimated_token_savings.filter(|t| *t > 0.0) {
        out.push_str(&format!(
            "\n💾 Estimated Storage: {} tokens\n",
            quantity(tokens)
        ));
    }
    ToolOutput::success(out)
}
