//! Hook payload shapes and how each one is read.
//!
//! Every calling agent sends a JSON document of its own shape. Each source
//! declares its extraction rules up front: which keys may wrap the event,
//! which event names it accepts, and an ordered list of rules per field where
//! the first rule that yields a non-empty value wins.

use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::text::{content_to_text, slug_to_title, truncate};
use crate::config::NotifyConfig;
use crate::error::{MemoryError, Result};
use crate::store::normalize_workspace;

/// Agents we know how to read, plus a catch-all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSource {
    Claude,
    Codex,
    Cursor,
    Antigravity,
    Generic,
}

impl PayloadSource {
    pub fn name(self) -> &'static str {
        match self {
            PayloadSource::Claude => "claude",
            PayloadSource::Codex => "codex",
            PayloadSource::Cursor => "cursor",
            PayloadSource::Antigravity => "antigravity",
            PayloadSource::Generic => "generic",
        }
    }

    /// Guess the source from the payload when the caller gave no hint.
    pub fn detect(payload: &Map<String, Value>) -> Self {
        if payload.contains_key("hook_event_name") {
            PayloadSource::Claude
        } else if payload.get("type").and_then(Value::as_str) == Some("agent-turn-complete")
            || payload.contains_key("input-messages")
        {
            PayloadSource::Codex
        } else {
            PayloadSource::Generic
        }
    }

    fn rules(self) -> &'static ExtractionRules {
        match self {
            PayloadSource::Claude => &CLAUDE,
            PayloadSource::Codex => &CODEX,
            PayloadSource::Cursor => &CURSOR,
            PayloadSource::Antigravity => &ANTIGRAVITY,
            PayloadSource::Generic => &GENERIC,
        }
    }
}

impl fmt::Display for PayloadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PayloadSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "claude" | "claude-code" => Ok(PayloadSource::Claude),
            "codex" => Ok(PayloadSource::Codex),
            "cursor" => Ok(PayloadSource::Cursor),
            "antigravity" => Ok(PayloadSource::Antigravity),
            "generic" | "auto" => Ok(PayloadSource::Generic),
            other => Err(format!(
                "unknown source '{}' (expected claude, codex, cursor, antigravity or generic)",
                other
            )),
        }
    }
}

/// Which event names a source records.
enum EventFilter {
    /// Event name required and must be one of these.
    OneOf(&'static [&'static str]),
    /// Empty event name accepted; otherwise it must contain one of these tokens.
    ContainsAny(&'static [&'static str]),
}

/// One way of producing a text field.
enum Rule {
    /// Non-empty string at this key.
    Key(&'static str),
    /// Messages whose role is in the list (empty list: every message).
    Messages(&'static [&'static str]),
    /// Name of the tool that fired the hook.
    ToolName(&'static str),
}

struct ExtractionRules {
    label: &'static str,
    wrapper_keys: &'static [&'static str],
    event_keys: &'static [&'static str],
    events: EventFilter,
    workspace_keys: &'static [&'static str],
    turn_keys: &'static [&'static str],
    message_keys: &'static [&'static str],
    prompt: &'static [Rule],
    summary: &'static [Rule],
    actions: &'static str,
}

const USER_ROLES: &[&str] = &["user", "human"];
const ASSISTANT_ROLES: &[&str] = &["assistant", "ai"];
const ROLE_KEYS: &[&str] = &["role", "author"];
const CONTENT_KEYS: &[&str] = &["content", "text"];
const TURN_TOKENS: &[&str] = &["turn", "message", "complete"];

const CLAUDE: ExtractionRules = ExtractionRules {
    label: "Claude",
    wrapper_keys: &[],
    event_keys: &["hook_event_name", "type", "event"],
    events: EventFilter::OneOf(&[
        "UserPromptSubmit",
        "PreToolUse",
        "PostToolUse",
        "Notification",
        "Stop",
        "SubagentStop",
        "PreCompact",
        "SessionStart",
        "SessionEnd",
    ]),
    workspace_keys: &["cwd", "workspace", "project_path"],
    turn_keys: &["session_id", "sessionId"],
    message_keys: &["messages", "input", "chat"],
    prompt: &[
        Rule::Key("prompt"),
        Rule::Key("user_prompt"),
        Rule::Key("message"),
        Rule::Key("input"),
        Rule::Messages(USER_ROLES),
    ],
    summary: &[
        Rule::Key("last_assistant_message"),
        Rule::Key("assistant"),
        Rule::Key("response"),
        Rule::Key("output"),
        Rule::Key("tool_response"),
        Rule::ToolName("tool_name"),
        Rule::Messages(ASSISTANT_ROLES),
    ],
    actions: "Auto-captured from Claude Code hook event",
};

const CODEX: ExtractionRules = ExtractionRules {
    label: "Codex",
    wrapper_keys: &[],
    event_keys: &["type"],
    events: EventFilter::OneOf(&["agent-turn-complete"]),
    workspace_keys: &["cwd"],
    turn_keys: &["turn-id"],
    message_keys: &["input-messages"],
    prompt: &[Rule::Messages(&[])],
    summary: &[Rule::Key("last-assistant-message")],
    actions: "Auto-captured from Codex notify hook on",
};

const CURSOR: ExtractionRules = ExtractionRules {
    label: "Cursor",
    wrapper_keys: &[],
    event_keys: &["type", "event"],
    events: EventFilter::ContainsAny(TURN_TOKENS),
    workspace_keys: &["workspace", "cwd", "project"],
    turn_keys: &["turnId", "turn_id", "id"],
    message_keys: &["messages", "chat_messages", "conversation", "transcript"],
    prompt: &[Rule::Messages(USER_ROLES), Rule::Key("prompt")],
    summary: &[
        Rule::Key("assistant_message"),
        Rule::Key("last_assistant_message"),
        Rule::Key("response"),
        Rule::Key("output"),
        Rule::Messages(ASSISTANT_ROLES),
    ],
    actions: "Auto-captured from Cursor hook",
};

const ANTIGRAVITY: ExtractionRules = ExtractionRules {
    label: "Antigravity",
    wrapper_keys: &["data", "event", "payload"],
    event_keys: &["type", "event"],
    events: EventFilter::ContainsAny(TURN_TOKENS),
    workspace_keys: &["cwd", "workspace"],
    turn_keys: &["turn_id", "turnId", "id"],
    message_keys: &["messages", "conversation", "transcript", "turn"],
    prompt: &[Rule::Messages(USER_ROLES), Rule::Key("prompt")],
    summary: &[
        Rule::Key("assistant"),
        Rule::Key("assistant_message"),
        Rule::Key("last_assistant_message"),
        Rule::Key("output"),
        Rule::Key("response"),
        Rule::Messages(ASSISTANT_ROLES),
    ],
    actions: "Auto-captured from Antigravity hook",
};

const GENERIC: ExtractionRules = ExtractionRules {
    label: "Agent",
    wrapper_keys: &["data", "event", "payload"],
    event_keys: &["hook_event_name", "type", "event"],
    events: EventFilter::ContainsAny(TURN_TOKENS),
    workspace_keys: &["cwd", "workspace", "workspace_path", "project_path"],
    turn_keys: &["turn_id", "turnId", "turn-id", "session_id", "id"],
    message_keys: &["messages", "conversation", "transcript"],
    prompt: &[Rule::Key("prompt"), Rule::Messages(USER_ROLES)],
    summary: &[
        Rule::Key("last_assistant_message"),
        Rule::Key("assistant_message"),
        Rule::Key("assistant"),
        Rule::Key("response"),
        Rule::Key("output"),
        Rule::Messages(ASSISTANT_ROLES),
    ],
    actions: "Auto-captured from agent hook",
};

/// Caller-supplied context for reading a payload.
#[derive(Debug, Clone, Default)]
pub struct SourceHints {
    /// Skip detection and read the payload as this source.
    pub source: Option<PayloadSource>,
    /// Used when the payload names no workspace.
    pub workspace: Option<PathBuf>,
    /// Overrides the project name derived from the workspace directory.
    pub project: Option<String>,
}

/// Canonical request to record one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub source: PayloadSource,
    pub event: Option<String>,
    pub workspace: PathBuf,
    pub project_name: String,
    pub title: String,
    pub prompt: Option<String>,
    pub summary: Option<String>,
    pub actions: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Request(RunRequest),
    Skip(String),
}

/// Read a raw hook payload. Never fails: anything unusable becomes `Skip`.
pub fn normalize(raw: &str, hints: &SourceHints, limits: &NotifyConfig) -> Normalized {
    match extract(raw, hints, limits) {
        Ok(normalized) => normalized,
        Err(e) => Normalized::Skip(e.to_string()),
    }
}

fn extract(raw: &str, hints: &SourceHints, limits: &NotifyConfig) -> Result<Normalized> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(MemoryError::MalformedPayload("empty payload".to_string()));
    }
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| MemoryError::MalformedPayload(format!("invalid JSON: {}", e)))?;
    let Value::Object(outer) = value else {
        return Err(MemoryError::MalformedPayload("payload is not a JSON object".to_string()));
    };

    let source = hints.source.unwrap_or_else(|| PayloadSource::detect(&outer));
    let rules = source.rules();
    let view = PayloadView::new(&outer, rules.wrapper_keys);

    let event = view.first_str(rules.event_keys);
    if let Some(reason) = rejected_event(&rules.events, event.as_deref()) {
        return Ok(Normalized::Skip(reason));
    }

    let workspace = view
        .first_str(rules.workspace_keys)
        .map(PathBuf::from)
        .or_else(|| hints.workspace.clone())
        .ok_or_else(|| MemoryError::MalformedPayload("no workspace path in payload".to_string()))?;
    let workspace = normalize_workspace(&workspace)?;

    let project_name = hints
        .project
        .clone()
        .filter(|p| !p.trim().is_empty())
        .or_else(|| {
            workspace
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "Project".to_string());

    let prompt = view
        .apply(rules.prompt, rules.message_keys)
        .map(|p| truncate(&p, limits.prompt_limit));
    let summary = view
        .apply(rules.summary, rules.message_keys)
        .map(|s| truncate(&s, limits.summary_limit));

    let turn = view.first_str(rules.turn_keys);
    let turn_id = match (source, turn, event.as_deref()) {
        (PayloadSource::Claude, Some(session), Some(ev)) => format!("{}:{}", session, ev),
        (PayloadSource::Claude, None, Some(ev)) => format!("unknown-session:{}", ev),
        (_, Some(turn), _) => turn,
        (_, None, _) => "unknown-turn".to_string(),
    };
    let title = slug_to_title(
        &format!("{} Turn {} {}", rules.label, turn_id, prompt.as_deref().unwrap_or("")),
        "Agent Turn Log",
    );

    let actions = match event.as_deref() {
        Some(ev) if source != PayloadSource::Cursor => format!("{} '{}'.", rules.actions, ev),
        _ => format!("{}.", rules.actions),
    };

    Ok(Normalized::Request(RunRequest {
        source,
        event,
        workspace,
        project_name,
        title,
        prompt,
        summary,
        actions,
        tags: vec![source.name().to_string(), "auto-log".to_string()],
    }))
}

fn rejected_event(filter: &EventFilter, event: Option<&str>) -> Option<String> {
    match (filter, event) {
        (EventFilter::OneOf(_), None) => Some("missing event name".to_string()),
        (EventFilter::OneOf(allowed), Some(ev)) if !allowed.contains(&ev) => {
            Some(format!("unsupported event '{}'", ev))
        }
        (EventFilter::ContainsAny(tokens), Some(ev)) => {
            let lower = ev.to_lowercase();
            if tokens.iter().any(|t| lower.contains(t)) {
                None
            } else {
                Some(format!("event '{}' is not a completion/turn event", ev))
            }
        }
        _ => None,
    }
}

/// The payload seen through an optional wrapper object.
///
/// Scalar lookups check the wrapped event first, then the outer document.
struct PayloadView<'a> {
    inner: &'a Map<String, Value>,
    outer: &'a Map<String, Value>,
}

impl<'a> PayloadView<'a> {
    fn new(outer: &'a Map<String, Value>, wrapper_keys: &[&str]) -> Self {
        let inner = wrapper_keys
            .iter()
            .find_map(|k| outer.get(*k).and_then(Value::as_object))
            .unwrap_or(outer);
        Self { inner, outer }
    }

    fn str_at(&self, key: &str) -> Option<String> {
        [self.inner, self.outer]
            .iter()
            .filter_map(|m| m.get(key).and_then(Value::as_str))
            .map(str::trim)
            .find(|s| !s.is_empty())
            .map(String::from)
    }

    fn first_str(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|k| self.str_at(k))
    }

    fn apply(&self, rules: &[Rule], message_keys: &[&str]) -> Option<String> {
        rules.iter().find_map(|rule| match rule {
            Rule::Key(key) => self.str_at(key),
            Rule::ToolName(key) => self
                .str_at(key)
                .map(|tool| format!("Hook event for tool: {}", tool)),
            Rule::Messages(roles) => self.messages_text(message_keys, roles),
        })
    }

    /// Joined text of the first non-empty message list, filtered by role.
    fn messages_text(&self, message_keys: &[&str], roles: &[&str]) -> Option<String> {
        let messages = message_keys.iter().find_map(|k| {
            self.inner
                .get(*k)
                .and_then(Value::as_array)
                .filter(|items| !items.is_empty())
        })?;

        let parts: Vec<String> = messages
            .iter()
            .filter_map(|msg| match msg {
                // bare strings are user input (Codex `input-messages`)
                Value::String(s) if roles.is_empty() || roles.contains(&"user") => Some(s.clone()),
                Value::Object(map) => {
                    let role = ROLE_KEYS
                        .iter()
                        .find_map(|k| map.get(*k).and_then(Value::as_str))
                        .unwrap_or("")
                        .to_lowercase();
                    if !roles.is_empty() && !roles.contains(&role.as_str()) {
                        return None;
                    }
                    CONTENT_KEYS
                        .iter()
                        .filter_map(|k| map.get(*k))
                        .map(content_to_text)
                        .find(|t| !t.trim().is_empty())
                }
                _ => None,
            })
            .filter(|t| !t.trim().is_empty())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }
}
