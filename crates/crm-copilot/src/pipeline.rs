//! Command pipeline: the single entry point for a user turn.
//!
//! classify → dispatch on action kind → CRM call(s) → summarize → append the
//! assistant message. Each invocation is one strictly sequential chain of at
//! most three network round-trips. On any failure nothing is appended to the
//! store and the error propagates to the caller, which renders it.

use std::sync::Arc;

use serde_json::{json, Map};

use crate::config::CredentialBackend;
use crate::crm::{CrmApi, RestClient};
use crate::error::Result;
use crate::intent::{Action, IntentClassifier};
use crate::llm::{LanguageModel, OpenAiClient};
use crate::respond::ResponseGenerator;
use crate::store::{ChatRole, ConversationStore};

const HELP_TEXT: &str = "Available commands:\n\
- Query data: \"Show me...\", \"List...\", \"Find...\"\n\
- Update records: \"Update...\", \"Change...\"\n\
- Create records: \"Create...\", \"Add...\"\n\
- Analyze data: \"Calculate...\", \"Compare...\"\n\
- Tasks: \"Remind me...\", \"Create task...\"\n\
- Favorites: \"Save this as favorite...\"";

/// Object type used by the `task` action.
const TASK_OBJECT: &str = "Task";

pub struct Pipeline {
    classifier: IntentClassifier,
    generator: ResponseGenerator,
    crm: Arc<dyn CrmApi>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new(llm: Arc<dyn LanguageModel>, crm: Arc<dyn CrmApi>) -> Self {
        Self {
            classifier: IntentClassifier::new(llm.clone()),
            generator: ResponseGenerator::new(llm),
            crm,
        }
    }

    /// Build a pipeline over stored credentials: the language-model client
    /// comes from the stored API key (`NotInitialized` when absent); the CRM
    /// client re-reads credentials on every call.
    pub fn from_credentials(credentials: Arc<dyn CredentialBackend>) -> Result<Self> {
        let key = credentials.load()?.openai()?.to_string();
        let llm: Arc<dyn LanguageModel> = Arc::new(OpenAiClient::new(&key));
        let crm: Arc<dyn CrmApi> = Arc::new(RestClient::new(credentials));
        Ok(Self::new(llm, crm))
    }

    /// Process one user turn. On success the response is appended to the
    /// store as an assistant message and returned; on failure the store is
    /// left untouched.
    pub async fn process_user_input(
        &self,
        store: &mut ConversationStore,
        input: &str,
    ) -> Result<String> {
        let action = self.classifier.classify(input).await?;
        tracing::info!(kind = action.kind(), "dispatching command");

        let response = match action {
            Action::Query { soql } => {
                let result = self.crm.run_query(&soql).await?;
                let records = json!({
                    "totalSize": result.total_size,
                    "done": result.done,
                    "records": result.records,
                });
                self.generator
                    .summarize(input, &records, store.context())
                    .await?
            }

            Action::Analyze { soql } => {
                let result = self.crm.run_query(&soql).await?;
                let records = json!({
                    "totalSize": result.total_size,
                    "done": result.done,
                    "records": result.records,
                });
                let response = self
                    .generator
                    .summarize(input, &records, store.context())
                    .await?;
                let mut update = Map::new();
                update.insert("lastAnalysis".to_string(), records);
                store.update_context(update);
                response
            }

            Action::Update {
                object_name,
                record_id,
                fields,
            } => {
                self.crm
                    .update_record(&object_name, &record_id, &fields)
                    .await?;
                format!("Updated {} record successfully.", object_name)
            }

            Action::Create {
                object_name,
                fields,
            } => {
                let id = self.crm.create_record(&object_name, &fields).await?;
                format!("Created new {} record with ID: {}", object_name, id)
            }

            Action::Task { task_fields } => {
                let id = self.crm.create_record(TASK_OBJECT, &task_fields).await?;
                format!("Created new task with ID: {}", id)
            }

            Action::Favorite { description } => {
                store.add_favorite(input, description);
                "Command saved to favorites.".to_string()
            }

            Action::Help => HELP_TEXT.to_string(),
        };

        store.add_message(ChatRole::Assistant, response.clone());
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crm::QueryResult;
    use crate::error::AssistantError;
    use crate::llm::CompletionRequest;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted language model: pops one canned reply per call.
    struct ScriptedLlm {
        replies: Mutex<VecDeque<String>>,
        calls: AtomicUsize,
    }

    impl ScriptedLlm {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().map(|s| s.to_string()).collect()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedLlm {
        async fn complete(&self, _request: CompletionRequest) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("scripted LLM ran out of replies"))
        }
    }

    /// Recording CRM mock with configurable results.
    #[derive(Default)]
    struct MockCrm {
        calls: AtomicUsize,
        query_result: Option<QueryResult>,
        query_error: Option<String>,
        created_id: Option<String>,
        last_create: Mutex<Option<(String, Map<String, Value>)>>,
        last_update: Mutex<Option<(String, String)>>,
    }

    #[async_trait]
    impl CrmApi for MockCrm {
        async fn list_queryable_types(&self) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec!["Account".to_string(), "Opportunity".to_string()])
        }

        async fn describe_type(&self, _object_name: &str) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({"fields": []}))
        }

        async fn run_query(&self, _soql: &str) -> Result<QueryResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(message) = &self.query_error {
                return Err(AssistantError::QueryExecution(message.clone()));
            }
            Ok(self.query_result.clone().expect("no query result configured"))
        }

        async fn create_record(
            &self,
            object_name: &str,
            fields: &Map<String, Value>,
        ) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_create.lock().unwrap() =
                Some((object_name.to_string(), fields.clone()));
            Ok(self.created_id.clone().expect("no created id configured"))
        }

        async fn update_record(
            &self,
            object_name: &str,
            record_id: &str,
            _fields: &Map<String, Value>,
        ) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_update.lock().unwrap() =
                Some((object_name.to_string(), record_id.to_string()));
            Ok(())
        }
    }

    fn opportunity_result() -> QueryResult {
        serde_json::from_value(json!({
            "totalSize": 1,
            "done": true,
            "records": [{"StageName": "Prospecting", "total": 5}],
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_query_turn_appends_one_assistant_message() {
        let llm = ScriptedLlm::new(&[
            r#"{"action":"query","query":"SELECT StageName, COUNT(Id) total FROM Opportunity WHERE IsClosed = false GROUP BY StageName"}"#,
            "You have 5 opportunities in Prospecting.",
        ]);
        let crm = Arc::new(MockCrm {
            query_result: Some(opportunity_result()),
            ..Default::default()
        });
        let pipeline = Pipeline::new(llm.clone(), crm.clone());
        let mut store = ConversationStore::new();

        let response = pipeline
            .process_user_input(&mut store, "Show me open opportunities by stage")
            .await
            .unwrap();

        assert_eq!(response, "You have 5 opportunities in Prospecting.");
        assert_eq!(store.messages().len(), 1);
        assert_eq!(store.messages()[0].role, ChatRole::Assistant);
        assert_eq!(store.messages()[0].content, response);
        // classifier + generator
        assert_eq!(llm.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_analyze_merges_last_analysis_into_context() {
        let llm = ScriptedLlm::new(&[
            r#"{"action":"analyze","query":"SELECT SUM(Amount) revenue FROM Opportunity"}"#,
            "Revenue is up.",
        ]);
        let crm = Arc::new(MockCrm {
            query_result: Some(opportunity_result()),
            ..Default::default()
        });
        let pipeline = Pipeline::new(llm, crm);
        let mut store = ConversationStore::new();

        pipeline
            .process_user_input(&mut store, "Compare quarterly revenue")
            .await
            .unwrap();

        let analysis = &store.context()["lastAnalysis"];
        assert_eq!(analysis["totalSize"], json!(1));
        assert_eq!(analysis["records"][0]["StageName"], json!("Prospecting"));
    }

    #[tokio::test]
    async fn test_create_confirmation_embeds_crm_id() {
        let llm = ScriptedLlm::new(&[
            r#"{"action":"create","parameters":{"objectName":"Lead","fields":{"LastName":"Stone","Company":"Acme"}}}"#,
        ]);
        let crm = Arc::new(MockCrm {
            created_id: Some("00Q5f000002XyZAEA0".to_string()),
            ..Default::default()
        });
        let pipeline = Pipeline::new(llm, crm.clone());
        let mut store = ConversationStore::new();

        let response = pipeline
            .process_user_input(&mut store, "Add a lead named Stone at Acme")
            .await
            .unwrap();

        assert_eq!(response, "Created new Lead record with ID: 00Q5f000002XyZAEA0");
        let (object, fields) = crm.last_create.lock().unwrap().clone().unwrap();
        assert_eq!(object, "Lead");
        assert_eq!(fields["Company"], json!("Acme"));
    }

    #[tokio::test]
    async fn test_task_creates_against_fixed_task_type() {
        let llm = ScriptedLlm::new(&[
            r#"{"action":"task","parameters":{"taskFields":{"Subject":"Call Acme"}}}"#,
        ]);
        let crm = Arc::new(MockCrm {
            created_id: Some("00T5f000001abcdEAA".to_string()),
            ..Default::default()
        });
        let pipeline = Pipeline::new(llm, crm.clone());
        let mut store = ConversationStore::new();

        let response = pipeline
            .process_user_input(&mut store, "Remind me to call Acme")
            .await
            .unwrap();

        assert_eq!(response, "Created new task with ID: 00T5f000001abcdEAA");
        let (object, _) = crm.last_create.lock().unwrap().clone().unwrap();
        assert_eq!(object, "Task");
    }

    #[tokio::test]
    async fn test_update_confirmation_names_object_type() {
        let llm = ScriptedLlm::new(&[
            r#"{"action":"update","parameters":{"objectName":"Account","recordId":"001xx000003DGb2","fields":{"Rating":"Hot"}}}"#,
        ]);
        let crm = Arc::new(MockCrm::default());
        let pipeline = Pipeline::new(llm, crm.clone());
        let mut store = ConversationStore::new();

        let response = pipeline
            .process_user_input(&mut store, "Mark the Acme account as hot")
            .await
            .unwrap();

        assert_eq!(response, "Updated Account record successfully.");
        let (object, id) = crm.last_update.lock().unwrap().clone().unwrap();
        assert_eq!(object, "Account");
        assert_eq!(id, "001xx000003DGb2");
    }

    #[tokio::test]
    async fn test_help_makes_no_crm_call_and_one_llm_call() {
        let llm = ScriptedLlm::new(&[r#"{"action":"help"}"#]);
        let crm = Arc::new(MockCrm::default());
        let pipeline = Pipeline::new(llm.clone(), crm.clone());
        let mut store = ConversationStore::new();

        let response = pipeline
            .process_user_input(&mut store, "what can you do")
            .await
            .unwrap();

        assert!(response.contains("Available commands"));
        assert_eq!(crm.calls.load(Ordering::SeqCst), 0);
        // only the classifier ran
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_favorite_saves_original_text_without_network() {
        let llm = ScriptedLlm::new(&[
            r#"{"action":"favorite","parameters":{"description":"Open opportunities by stage"}}"#,
        ]);
        let crm = Arc::new(MockCrm::default());
        let pipeline = Pipeline::new(llm.clone(), crm.clone());
        let mut store = ConversationStore::new();

        let response = pipeline
            .process_user_input(&mut store, "Save this as favorite: open opps by stage")
            .await
            .unwrap();

        assert_eq!(response, "Command saved to favorites.");
        assert_eq!(crm.calls.load(Ordering::SeqCst), 0);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.favorites().len(), 1);
        assert_eq!(
            store.favorites()[0].query,
            "Save this as favorite: open opps by stage"
        );
        assert_eq!(
            store.favorites()[0].description,
            "Open opportunities by stage"
        );
    }

    #[tokio::test]
    async fn test_bogus_action_fails_and_store_is_untouched() {
        let llm = ScriptedLlm::new(&[r#"{"action":"bogus"}"#]);
        let crm = Arc::new(MockCrm::default());
        let pipeline = Pipeline::new(llm, crm);
        let mut store = ConversationStore::new();

        let err = pipeline
            .process_user_input(&mut store, "do something weird")
            .await
            .unwrap_err();

        assert!(matches!(err, AssistantError::UnknownAction(_)));
        assert_eq!(store.messages().len(), 0);
    }

    #[tokio::test]
    async fn test_query_error_propagates_first_crm_message() {
        let llm = ScriptedLlm::new(&[
            r#"{"action":"query","query":"SELECT Id FORM Account"}"#,
        ]);
        let crm = Arc::new(MockCrm {
            query_error: Some("unexpected token: FORM".to_string()),
            ..Default::default()
        });
        let pipeline = Pipeline::new(llm, crm);
        let mut store = ConversationStore::new();

        let err = pipeline
            .process_user_input(&mut store, "show accounts")
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Salesforce query error: unexpected token: FORM"
        );
        assert_eq!(store.messages().len(), 0);
    }

    #[tokio::test]
    async fn test_empty_generator_reply_falls_back() {
        let llm = ScriptedLlm::new(&[
            r#"{"action":"query","query":"SELECT Id FROM Account"}"#,
            "",
        ]);
        let crm = Arc::new(MockCrm {
            query_result: Some(opportunity_result()),
            ..Default::default()
        });
        let pipeline = Pipeline::new(llm, crm);
        let mut store = ConversationStore::new();

        let response = pipeline
            .process_user_input(&mut store, "show accounts")
            .await
            .unwrap();
        assert_eq!(response, "No response generated");
    }

    #[test]
    fn test_from_credentials_requires_api_key() {
        let backend = Arc::new(crate::config::MemoryBackend::default());
        let err = Pipeline::from_credentials(backend).unwrap_err();
        assert!(matches!(err, AssistantError::NotInitialized));
    }
}
