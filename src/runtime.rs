use std::sync::Arc;

use crate::chat::ConversationManager;
use crate::config::Config;
use crate::db::Database;
use crate::llm::{CompletionProvider, GeminiProvider};
use crate::recommend::Recommender;

pub struct AppState {
    pub config: Config,
    pub db: Arc<Database>,
    pub chat: ConversationManager,
    pub recommender: Recommender,
}

impl AppState {
    pub fn new(config: Config, db: Database) -> Self {
        let llm: Arc<dyn CompletionProvider> = Arc::new(GeminiProvider::new(&config));
        Self::with_provider(config, db, llm)
    }

    /// Seam for tests and alternative providers.
    pub fn with_provider(
        config: Config,
        db: Database,
        llm: Arc<dyn CompletionProvider>,
    ) -> Self {
        let db = Arc::new(db);
        let chat = ConversationManager::new(db.clone(), llm.clone(), config.context_window_turns);
        let recommender = Recommender::new(db.clone(), llm);
        AppState {
            config,
            db,
            chat,
            recommender,
        }
    }
}

pub async fn run(config: Config, db: Database) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(config, db));
    crate::web::start_server(state).await
}
