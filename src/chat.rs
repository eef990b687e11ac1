use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::db::{call_blocking, ChatMessage, ChatRole, Database, NewChatMessage, SessionSummary};
use crate::error::GrocerError;
use crate::llm::CompletionProvider;

/// Role definition and allowed topics, prepended to every chat prompt.
const CHAT_PREAMBLE: &str = "You are GrocerAI, a helpful and friendly AI assistant for a grocery shopping platform called GrocerAI. Your role is to help users with:

1. Meal planning and recipe suggestions
2. Grocery shopping advice and product recommendations
3. Nutritional information and dietary guidance
4. Cooking tips and ingredient substitutions
5. Budget-friendly shopping strategies
6. Seasonal produce recommendations
7. Food storage and preservation tips

Please be helpful, concise, and focus on grocery and food-related topics. If users ask about non-food topics, politely redirect them back to grocery and cooking assistance.

Previous conversation:
";

/// One caller-echoed prior turn. The manager trusts the caller's view of
/// recent context instead of re-fetching persisted history; this is an
/// explicit trust boundary, and the slice is still bounded server-side.
#[derive(Clone, Debug, Deserialize)]
pub struct HistoryTurn {
    pub role: String,
    pub content: String,
}

#[derive(Clone, Debug)]
pub struct ChatReply {
    pub reply: String,
    pub session_id: String,
    pub response_time_ms: i64,
}

pub struct ConversationManager {
    db: Arc<Database>,
    llm: Arc<dyn CompletionProvider>,
    max_context_turns: usize,
}

impl ConversationManager {
    pub fn new(
        db: Arc<Database>,
        llm: Arc<dyn CompletionProvider>,
        max_context_turns: usize,
    ) -> Self {
        ConversationManager {
            db,
            llm,
            max_context_turns,
        }
    }

    /// One chat turn: validate, resolve the session, persist the user
    /// message, call the provider, persist the reply.
    ///
    /// The user turn is written before the provider call and is not rolled
    /// back on provider failure, so a session can contain a user message
    /// with no paired reply (see `count_orphaned_user_turns`).
    pub async fn send_message(
        &self,
        user_id: i64,
        message: &str,
        history: &[HistoryTurn],
        session_id: Option<String>,
        category: &str,
    ) -> Result<ChatReply, GrocerError> {
        let started = Instant::now();

        let message = message.trim().to_string();
        if message.is_empty() {
            return Err(GrocerError::Validation(
                "Message is required and must be a non-empty string".into(),
            ));
        }
        if !self.llm.is_configured() {
            return Err(GrocerError::Config(
                "completion provider API key is not configured".into(),
            ));
        }

        // Client-supplied ids are accepted as-is; an unseen id silently
        // starts a fresh thread. Identity is always (user_id, session_id).
        let session_id = session_id
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let user_turn = NewChatMessage {
            user_id,
            session_id: session_id.clone(),
            role: ChatRole::User,
            message_text: message.clone(),
            category: category.to_string(),
            metadata: None,
            response_time_ms: None,
        };
        call_blocking(self.db.clone(), move |db| db.save_chat_message(&user_turn)).await?;

        let prompt = build_prompt(&message, history, self.max_context_turns);
        let reply = self.llm.complete(&prompt).await?;
        let response_time_ms = started.elapsed().as_millis() as i64;

        let assistant_turn = NewChatMessage {
            user_id,
            session_id: session_id.clone(),
            role: ChatRole::Assistant,
            message_text: reply.clone(),
            category: category.to_string(),
            metadata: None,
            response_time_ms: Some(response_time_ms),
        };
        call_blocking(self.db.clone(), move |db| {
            db.save_chat_message(&assistant_turn)
        })
        .await?;

        info!(
            user_id,
            session_id = %session_id,
            category,
            response_time_ms,
            reply_len = reply.len(),
            "chat turn completed"
        );

        Ok(ChatReply {
            reply,
            session_id,
            response_time_ms,
        })
    }

    pub async fn get_history(
        &self,
        user_id: i64,
        limit: usize,
        session_id: Option<String>,
    ) -> Result<Vec<ChatMessage>, GrocerError> {
        call_blocking(self.db.clone(), move |db| {
            db.get_user_chat_history(user_id, limit, session_id.as_deref())
        })
        .await
    }

    pub async fn get_sessions(
        &self,
        user_id: i64,
        limit: usize,
    ) -> Result<Vec<SessionSummary>, GrocerError> {
        call_blocking(self.db.clone(), move |db| {
            db.get_user_chat_sessions(user_id, limit)
        })
        .await
    }

    pub async fn clear_history(
        &self,
        user_id: i64,
        session_id: Option<String>,
    ) -> Result<usize, GrocerError> {
        call_blocking(self.db.clone(), move |db| {
            db.clear_chat_history(user_id, session_id.as_deref())
        })
        .await
    }

    /// Admin capability probe: one of four fixed preambles plus the test
    /// query. Not persisted.
    pub async fn admin_test(&self, message: &str, test_type: &str) -> Result<String, GrocerError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(GrocerError::Validation(
                "Message is required and must be a non-empty string".into(),
            ));
        }
        if !self.llm.is_configured() {
            return Err(GrocerError::Config(
                "completion provider API key is not configured".into(),
            ));
        }
        let prompt = format!("{}{}", admin_preamble(test_type), message);
        self.llm.complete(&prompt).await
    }

    pub async fn count_orphaned_user_turns(
        &self,
        user_id: Option<i64>,
    ) -> Result<i64, GrocerError> {
        call_blocking(self.db.clone(), move |db| {
            db.count_orphaned_user_turns(user_id)
        })
        .await
    }
}

/// Preamble + at most the last `max_turns` caller-supplied turns + the new
/// message + an assistant cue. Older context is dropped, not summarized.
fn build_prompt(message: &str, history: &[HistoryTurn], max_turns: usize) -> String {
    let mut prompt = String::from(CHAT_PREAMBLE);
    let start = history.len().saturating_sub(max_turns);
    for turn in &history[start..] {
        prompt.push_str(render_role(&turn.role));
        prompt.push_str(": ");
        prompt.push_str(&turn.content);
        prompt.push('\n');
    }
    prompt.push_str("User: ");
    prompt.push_str(message);
    prompt.push_str("\nGrocerAI: ");
    prompt
}

fn render_role(role: &str) -> &'static str {
    if role == "user" {
        "User"
    } else {
        "GrocerAI"
    }
}

fn admin_preamble(test_type: &str) -> &'static str {
    match test_type {
        "meal_planning" => {
            "You are GrocerAI, being tested by an admin for meal planning capabilities. Provide detailed, practical meal planning advice focusing on:
- Weekly meal planning strategies
- Balanced nutrition considerations
- Seasonal ingredient recommendations
- Budget-friendly meal options
- Dietary restriction accommodations

Admin test query: "
        }
        "grocery_suggestions" => {
            "You are GrocerAI, being tested by an admin for grocery suggestion capabilities. Provide comprehensive grocery recommendations focusing on:
- Smart shopping lists
- Product substitutions
- Quality indicators for fresh produce
- Storage and preservation tips
- Value-for-money suggestions

Admin test query: "
        }
        "nutrition" => {
            "You are GrocerAI, being tested by an admin for nutritional guidance capabilities. Provide accurate nutritional information focusing on:
- Macro and micronutrient content
- Health benefits of ingredients
- Dietary guidelines compliance
- Special dietary needs
- Portion size recommendations

Admin test query: "
        }
        _ => {
            "You are GrocerAI, being tested by an admin. Demonstrate your grocery and food-related assistance capabilities by providing helpful, accurate, and comprehensive responses to:
- Meal planning and recipes
- Grocery shopping advice
- Nutritional information
- Cooking tips and techniques
- Food storage and safety

Admin test query: "
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every prompt it receives and answers with a fixed reply.
    struct RecordingProvider {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl RecordingProvider {
        fn new(reply: &str) -> Self {
            RecordingProvider {
                reply: reply.into(),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn last_prompt(&self) -> String {
            self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl CompletionProvider for RecordingProvider {
        async fn complete(&self, prompt: &str) -> Result<String, GrocerError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl CompletionProvider for FailingProvider {
        async fn complete(&self, _prompt: &str) -> Result<String, GrocerError> {
            Err(GrocerError::Provider("scripted failure".into()))
        }
    }

    struct UnconfiguredProvider;

    #[async_trait]
    impl CompletionProvider for UnconfiguredProvider {
        async fn complete(&self, _prompt: &str) -> Result<String, GrocerError> {
            panic!("must not be called when unconfigured");
        }

        fn is_configured(&self) -> bool {
            false
        }
    }

    fn test_db() -> (Arc<Database>, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("grocerai_chat_test_{}", uuid::Uuid::new_v4()));
        let db = Arc::new(Database::new(dir.to_str().unwrap()).unwrap());
        (db, dir)
    }

    fn cleanup(dir: &std::path::Path) {
        let _ = std::fs::remove_dir_all(dir);
    }

    fn turns(range: std::ops::RangeInclusive<usize>) -> Vec<HistoryTurn> {
        range
            .map(|i| HistoryTurn {
                role: if i % 2 == 1 { "user" } else { "assistant" }.into(),
                content: format!("message {i}"),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_send_message_persists_both_turns_in_order() {
        let (db, dir) = test_db();
        let provider = Arc::new(RecordingProvider::new("Try the pasta."));
        let manager = ConversationManager::new(db.clone(), provider.clone(), 10);

        let reply = manager
            .send_message(1, "What's for dinner tonight?", &[], None, "general")
            .await
            .unwrap();
        assert_eq!(reply.reply, "Try the pasta.");
        assert!(!reply.session_id.is_empty());
        assert!(reply.response_time_ms >= 0);

        let history = manager
            .get_history(1, 50, Some(reply.session_id.clone()))
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
        // Newest first: assistant row was created strictly after the user row.
        assert_eq!(history[0].role, ChatRole::Assistant);
        assert_eq!(history[1].role, ChatRole::User);
        assert!(history[0].id > history[1].id);
        assert!(history[0].response_time_ms.is_some());
        assert!(history[1].response_time_ms.is_none());
        cleanup(&dir);
    }

    #[tokio::test]
    async fn test_send_message_reuses_supplied_session_id() {
        let (db, dir) = test_db();
        let provider = Arc::new(RecordingProvider::new("ok"));
        let manager = ConversationManager::new(db, provider, 10);

        let reply = manager
            .send_message(1, "hello", &[], Some("my-thread".into()), "general")
            .await
            .unwrap();
        assert_eq!(reply.session_id, "my-thread");

        // Blank ids are treated as absent.
        let reply = manager
            .send_message(1, "hello", &[], Some("   ".into()), "general")
            .await
            .unwrap();
        assert_ne!(reply.session_id, "   ");
        cleanup(&dir);
    }

    #[tokio::test]
    async fn test_prompt_bounded_to_last_ten_turns() {
        let (db, dir) = test_db();
        let provider = Arc::new(RecordingProvider::new("ok"));
        let manager = ConversationManager::new(db, provider.clone(), 10);

        manager
            .send_message(1, "latest question", &turns(1..=15), None, "general")
            .await
            .unwrap();

        let prompt = provider.last_prompt();
        for i in 1..=5 {
            assert!(
                !prompt.contains(&format!("message {i}\n")),
                "turn {i} should have been dropped"
            );
        }
        for i in 6..=15 {
            assert!(
                prompt.contains(&format!("message {i}")),
                "turn {i} should be present"
            );
        }
        assert!(prompt.ends_with("User: latest question\nGrocerAI: "));
        assert!(prompt.starts_with("You are GrocerAI"));
        cleanup(&dir);
    }

    #[tokio::test]
    async fn test_prompt_renders_roles() {
        let (db, dir) = test_db();
        let provider = Arc::new(RecordingProvider::new("ok"));
        let manager = ConversationManager::new(db, provider.clone(), 10);

        let history = vec![
            HistoryTurn {
                role: "user".into(),
                content: "I need dinner ideas".into(),
            },
            HistoryTurn {
                role: "assistant".into(),
                content: "How about stir fry?".into(),
            },
        ];
        manager
            .send_message(1, "something vegetarian", &history, None, "meal_planning")
            .await
            .unwrap();

        let prompt = provider.last_prompt();
        assert!(prompt.contains("User: I need dinner ideas\n"));
        assert!(prompt.contains("GrocerAI: How about stir fry?\n"));
        cleanup(&dir);
    }

    #[tokio::test]
    async fn test_validation_rejects_empty_and_whitespace() {
        let (db, dir) = test_db();
        let provider = Arc::new(RecordingProvider::new("ok"));
        let manager = ConversationManager::new(db.clone(), provider, 10);

        for bad in ["", "   ", "\n\t"] {
            let err = manager
                .send_message(1, bad, &[], None, "general")
                .await
                .unwrap_err();
            assert!(matches!(err, GrocerError::Validation(_)));
        }
        // Zero rows persisted on validation failure.
        assert!(manager.get_history(1, 50, None).await.unwrap().is_empty());
        cleanup(&dir);
    }

    #[tokio::test]
    async fn test_unconfigured_provider_fails_before_persistence() {
        let (db, dir) = test_db();
        let manager = ConversationManager::new(db, Arc::new(UnconfiguredProvider), 10);

        let err = manager
            .send_message(1, "hello", &[], None, "general")
            .await
            .unwrap_err();
        assert!(matches!(err, GrocerError::Config(_)));
        assert!(manager.get_history(1, 50, None).await.unwrap().is_empty());
        cleanup(&dir);
    }

    #[tokio::test]
    async fn test_provider_failure_leaves_orphaned_user_turn() {
        let (db, dir) = test_db();
        let manager = ConversationManager::new(db, Arc::new(FailingProvider), 10);

        let err = manager
            .send_message(1, "hello", &[], Some("s1".into()), "general")
            .await
            .unwrap_err();
        assert!(matches!(err, GrocerError::Provider(_)));

        // The user turn stays; no assistant turn was written.
        let history = manager.get_history(1, 50, Some("s1".into())).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, ChatRole::User);
        assert_eq!(manager.count_orphaned_user_turns(Some(1)).await.unwrap(), 1);
        cleanup(&dir);
    }

    #[tokio::test]
    async fn test_session_continuation_includes_prior_exchange() {
        let (db, dir) = test_db();
        let provider = Arc::new(RecordingProvider::new("Pasta it is."));
        let manager = ConversationManager::new(db, provider.clone(), 10);

        let first = manager
            .send_message(1, "What's for dinner tonight?", &[], None, "general")
            .await
            .unwrap();

        let history = vec![
            HistoryTurn {
                role: "user".into(),
                content: "What's for dinner tonight?".into(),
            },
            HistoryTurn {
                role: "assistant".into(),
                content: "Pasta it is.".into(),
            },
        ];
        manager
            .send_message(
                1,
                "What sides go with that?",
                &history,
                Some(first.session_id.clone()),
                "general",
            )
            .await
            .unwrap();

        let prompt = provider.last_prompt();
        assert!(prompt.contains("User: What's for dinner tonight?"));
        assert!(prompt.contains("GrocerAI: Pasta it is."));

        let stored = manager
            .get_history(1, 50, Some(first.session_id))
            .await
            .unwrap();
        assert_eq!(stored.len(), 4);
        cleanup(&dir);
    }

    #[tokio::test]
    async fn test_admin_test_preambles() {
        let (db, dir) = test_db();
        let provider = Arc::new(RecordingProvider::new("ok"));
        let manager = ConversationManager::new(db, provider.clone(), 10);

        manager
            .admin_test("plan a week of dinners", "meal_planning")
            .await
            .unwrap();
        assert!(provider
            .last_prompt()
            .contains("meal planning capabilities"));
        assert!(provider
            .last_prompt()
            .ends_with("Admin test query: plan a week of dinners"));

        manager.admin_test("probe", "unknown_type").await.unwrap();
        assert!(provider.last_prompt().contains("being tested by an admin."));

        let err = manager.admin_test("  ", "nutrition").await.unwrap_err();
        assert!(matches!(err, GrocerError::Validation(_)));
        cleanup(&dir);
    }
}
