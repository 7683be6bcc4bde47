use serde_json::{json, Value};

use super::registry::ToolName;

const FOLDER_PATTERN: &str = "^/[A-Za-z0-9_\\-/]*$";
const UUID_PATTERN: &str = "^[A-Fa-f0-9\\-]{36}$";

fn conversation_id(description: &str) -> Value {
    json!({
        "type": "string",
        "description": description,
        "minLength": 36,
        "maxLength": 36,
        "pattern": UUID_PATTERN
    })
}

fn importance(description: &str) -> Value {
    json!({
        "type": "number",
        "description": description,
        "minimum": 0.0,
        "maximum": 10.0
    })
}

fn folder(description: &str) -> Value {
    json!({
        "type": "string",
        "description": description,
        "pattern": FOLDER_PATTERN
    })
}

fn label(description: &str) -> Value {
    json!({
        "type": "string",
        "description": description,
        "minLength": 1,
        "maxLength": 500
    })
}

/// JSON Schema advertised in `tools/list`. The validator enforces the same rules.
pub(crate) fn input_schema(tool: ToolName) -> Value {
    match tool {
        ToolName::Store => json!({
            "type": "object",
            "required": ["label", "folder", "messages"],
            "properties": {
                "label": label("Conversation title"),
                "folder": folder("Folder path, e.g. /projects/ai"),
                "messages": {
                    "type": "array",
                    "description": "Conversation turns in order",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "required": ["role", "content"],
                        "properties": {
                            "role": {"type": "string", "enum": ["user", "assistant", "system"]},
                            "content": {"type": "string", "minLength": 1},
                            "timestamp": {"type": "string", "format": "date-time"},
                            "metadata": {"type": "object", "default": {}}
                        }
                    }
                },
                "importance_score": importance("Importance from 0.0 to 10.0")
            }
        }),
        ToolName::Search => json!({
            "type": "object",
            "required": ["query"],
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Natural language search query",
                    "minLength": 1,
                    "maxLength": 1000
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum results to return",
                    "default": 10,
                    "minimum": 1,
                    "maximum": 50
                },
                "filter_labels": {
                    "type": "array",
                    "description": "Only search conversations with these labels",
                    "items": {"type": "string", "minLength": 1}
                }
            }
        }),
        ToolName::Update => json!({
            "type": "object",
            "required": ["conversation_id"],
            "minProperties": 2,
            "properties": {
                "conversation_id": conversation_id("Conversation to update"),
                "label": label("New title"),
                "folder": folder("New folder path"),
                "importance_score": importance("New importance from 0.0 to 10.0")
            }
        }),
        ToolName::GetContext => json!({
            "type": "object",
            "required": ["conversation_id"],
            "properties": {
                "conversation_id": conversation_id("Conversation to retrieve")
            }
        }),
        ToolName::Prune => json!({
            "type": "object",
            "properties": {
                "threshold_days": {
                    "type": "integer",
                    "description": "Conversations older than this many days are candidates",
                    "default": 30,
                    "minimum": 1,
                    "maximum": 365
                },
                "importance_threshold": importance("Keep conversations at or above this importance")
            }
        }),
        ToolName::Export => json!({
            "type": "object",
            "required": ["conversation_id"],
            "properties": {
                "conversation_id": conversation_id("Conversation to export"),
                "format": {
                    "type": "string",
                    "enum": ["json", "markdown"],
                    "default": "json"
                },
                "include_metadata": {
                    "type": "boolean",
                    "description": "Include word and session counts",
                    "default": true
                }
            }
        }),
        ToolName::Stats => json!({
            "type": "object",
            "properties": {
                "folder": folder("Restrict statistics to one folder")
            }
        }),
    }
}
