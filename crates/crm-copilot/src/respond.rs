//! Natural-language response generation.
//!
//! Takes the executed action's result plus the running context map and asks
//! the model for a concise business-toned answer. The prompt embeds all
//! three inputs verbatim; the model's text is returned as-is, with a fixed
//! fallback when it comes back empty.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::Result;
use crate::llm::{CompletionRequest, LanguageModel};

pub const EMPTY_RESPONSE_FALLBACK: &str = "No response generated";

fn build_summary_prompt(user_input: &str, result: &Value, context: &Map<String, Value>) -> String {
    format!(
        r#"You are an AI assistant helping with Salesforce data analysis.
User input: {user_input}
Query result: {result}
Context: {context}

Generate a natural language response that:
1. Directly answers the user's question
2. Provides relevant insights from the data
3. Is concise but informative
4. Uses proper business terminology
5. Includes specific numbers/metrics when available
6. Suggests relevant follow-up actions if appropriate

Format numbers appropriately (e.g., currency with 2 decimal places, percentages, etc.).
"#,
        user_input = user_input,
        result = result,
        context = Value::Object(context.clone()),
    )
}

pub struct ResponseGenerator {
    llm: Arc<dyn LanguageModel>,
}

impl ResponseGenerator {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    pub async fn summarize(
        &self,
        user_input: &str,
        result: &Value,
        context: &Map<String, Value>,
    ) -> Result<String> {
        let prompt = build_summary_prompt(user_input, result, context);
        let reply = self
            .llm
            .complete(CompletionRequest::new(prompt, "Generate response"))
            .await?;

        if reply.is_empty() {
            return Ok(EMPTY_RESPONSE_FALLBACK.to_string());
        }
        Ok(reply)
    }
}
