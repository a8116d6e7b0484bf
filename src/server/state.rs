use std::sync::Arc;

use crate::ai::ChatProvider;
use crate::server::database::Store;

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn Store>,
    ai: Arc<dyn ChatProvider>,
    default_model: String,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, ai: Arc<dyn ChatProvider>, default_model: String) -> Self {
        Self { store, ai, default_model }
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn ai(&self) -> &dyn ChatProvider {
        self.ai.as_ref()
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ai::feature::tests::CannedProvider;
    use crate::server::database::MemoryStore;

    #[actix_web::test]
    async fn app_state() {
        let state = AppState::new(
            Arc::new(MemoryStore::new()),
            Arc::new(CannedProvider::replying("{}")),
            "gemini-2.0-flash".to_string(),
        );
        let cloned = state.clone();
        assert!(cloned.store().list_menu().await.unwrap().is_empty());
        assert_eq!(cloned.default_model(), "gemini-2.0-flash");
    }
}
