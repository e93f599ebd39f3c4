//! Intent classification.
//!
//! One LLM call turns raw user text into a structured action descriptor.
//! The reply is requested as a single JSON object at low temperature; it is
//! still parsed defensively (markdown fences, trailing prose) before being
//! validated into a tagged `Action` variant. Required-field validation
//! happens here, at the dispatch boundary, so handlers never see an
//! incomplete descriptor.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{AssistantError, Result};
use crate::llm::{CompletionRequest, LanguageModel};

const CLASSIFIER_SYSTEM_PROMPT: &str = r#"You are a Salesforce command parser. Analyze the user input and categorize it into one of these actions:
- query (for data retrieval)
- update (for record updates)
- create (for new records)
- analyze (for KPIs and trends)
- task (for task/reminder creation)
- favorite (for saving queries)
- help (for assistance)

Return a JSON object with:
{
  "action": "action_type",
  "parameters": {
    // relevant parameters based on action
  },
  "query": "SOQL query if needed"
}

Parameter fields by action:
- update: "objectName", "recordId", "fields" (object of field/value pairs)
- create: "objectName", "fields"
- task: "taskFields" (object of Task field/value pairs)
- favorite: "description" (short description of the saved command)

Output ONLY the JSON object, nothing else."#;

/// A classified, validated user command. Variants are mutually exclusive
/// and exhaustive over the recognized action kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Query { soql: String },
    Analyze { soql: String },
    Update {
        object_name: String,
        record_id: String,
        fields: Map<String, Value>,
    },
    Create {
        object_name: String,
        fields: Map<String, Value>,
    },
    Task { task_fields: Map<String, Value> },
    Favorite { description: String },
    Help,
}

impl Action {
    /// The action kind as the classifier names it.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Query { .. } => "query",
            Action::Analyze { .. } => "analyze",
            Action::Update { .. } => "update",
            Action::Create { .. } => "create",
            Action::Task { .. } => "task",
            Action::Favorite { .. } => "favorite",
            Action::Help => "help",
        }
    }
}

/// The classifier's raw JSON shape, before validation.
#[derive(Debug, Default, Deserialize)]
struct RawDescriptor {
    action: Option<String>,
    #[serde(default)]
    parameters: Map<String, Value>,
    query: Option<String>,
}

/// Parse the LLM's reply into a validated `Action`.
///
/// Handles common LLM quirks: markdown fences and prose around the object.
/// Unparseable replies fail with `MalformedIntent`; a parsed reply without a
/// recognized `action` fails with `UnknownAction`.
pub fn parse_action(raw: &str) -> Result<Action> {
    let cleaned = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let json_str = match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(start), Some(end)) if end > start => &cleaned[start..=end],
        _ => cleaned,
    };

    let descriptor: RawDescriptor = serde_json::from_str(json_str)
        .map_err(|e| AssistantError::MalformedIntent(e.to_string()))?;

    validate(descriptor)
}

fn validate(descriptor: RawDescriptor) -> Result<Action> {
    let RawDescriptor {
        action,
        parameters,
        query,
    } = descriptor;

    let kind = match action {
        Some(kind) => kind,
        None => return Err(AssistantError::UnknownAction(String::new())),
    };

    match kind.as_str() {
        "query" => Ok(Action::Query {
            soql: require_query(query, "query")?,
        }),
        "analyze" => Ok(Action::Analyze {
            soql: require_query(query, "analyze")?,
        }),
        "update" => Ok(Action::Update {
            object_name: require_string(&parameters, "objectName", "update")?,
            record_id: require_string(&parameters, "recordId", "update")?,
            fields: require_object(&parameters, "fields", "update")?,
        }),
        "create" => Ok(Action::Create {
            object_name: require_string(&parameters, "objectName", "create")?,
            fields: require_object(&parameters, "fields", "create")?,
        }),
        "task" => Ok(Action::Task {
            task_fields: require_object(&parameters, "taskFields", "task")?,
        }),
        "favorite" => Ok(Action::Favorite {
            description: require_string(&parameters, "description", "favorite")?,
        }),
        "help" => Ok(Action::Help),
        _ => Err(AssistantError::UnknownAction(kind)),
    }
}

fn require_query(query: Option<String>, action: &'static str) -> Result<String> {
    query
        .filter(|q| !q.trim().is_empty())
        .ok_or(AssistantError::MissingParameter {
            field: "query",
            action,
        })
}

fn require_string(
    parameters: &Map<String, Value>,
    field: &'static str,
    action: &'static str,
) -> Result<String> {
    parameters
        .get(field)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or(AssistantError::MissingParameter { field, action })
}

fn require_object(
    parameters: &Map<String, Value>,
    field: &'static str,
    action: &'static str,
) -> Result<Map<String, Value>> {
    parameters
        .get(field)
        .and_then(|v| v.as_object())
        .cloned()
        .ok_or(AssistantError::MissingParameter { field, action })
}

/// Sends user text through the classifier prompt and validates the reply.
pub struct IntentClassifier {
    llm: Arc<dyn LanguageModel>,
}

impl IntentClassifier {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    pub async fn classify(&self, user_text: &str) -> Result<Action> {
        let request = CompletionRequest::new(CLASSIFIER_SYSTEM_PROMPT, user_text)
            .temperature(0.1)
            .json_only();
        let raw = self.llm.complete(request).await?;

        let action = parse_action(&raw)?;
        tracing::info!(kind = action.kind(), "classified user command");
        Ok(action)
    }
}
