//! Intent → provider routing
//!
//! Each intent maps to an ordered provider list, loaded from the admin
//! store when available and falling back to the hardcoded table. RAG-owned
//! intents (weather, sports) skip web search entirely unless forced.

use std::collections::HashMap;
use std::sync::Arc;

use hearth_config::AdminClient;

use crate::intent::SearchIntent;
use crate::provider::SearchProvider;

/// Hardcoded fallback table: ordered provider names per intent
fn fallback_providers(intent: SearchIntent) -> &'static [&'static str] {
    match intent {
        SearchIntent::EventSearch => {
            &["ticketmaster", "eventbrite", "duckduckgo", "brave", "searxng"]
        }
        SearchIntent::News => &["brave", "duckduckgo", "searxng"],
        SearchIntent::LocalBusiness => &["brave", "duckduckgo", "searxng"],
        SearchIntent::Sports => &["duckduckgo", "brave", "searxng"],
        SearchIntent::Weather => &["duckduckgo", "brave", "searxng"],
        SearchIntent::General => &["duckduckgo", "brave", "searxng"],
    }
}

const RAG_INTENTS: &[SearchIntent] = &[SearchIntent::Weather, SearchIntent::Sports];

/// Registry of live providers plus the routing policy
pub struct ProviderRouter {
    providers: HashMap<&'static str, Arc<dyn SearchProvider>>,
    admin: Option<Arc<AdminClient>>,
}

impl ProviderRouter {
    pub fn new(admin: Option<Arc<AdminClient>>) -> Self {
        Self {
            providers: HashMap::new(),
            admin,
        }
    }

    /// Register a provider under its own name.
    pub fn register(&mut self, provider: Arc<dyn SearchProvider>) {
        tracing::info!(provider = provider.name(), "search provider registered");
        self.providers.insert(provider.name(), provider);
    }

    pub fn available(&self) -> Vec<&'static str> {
        self.providers.keys().copied().collect()
    }

    /// Ordered providers for an intent, filtered to the ones actually
    /// registered. Falls back to duckduckgo when the list comes up empty.
    pub async fn providers_for_intent(
        &self,
        intent: SearchIntent,
    ) -> Vec<Arc<dyn SearchProvider>> {
        let configured = self.configured_names(intent).await;

        let mut providers: Vec<Arc<dyn SearchProvider>> = configured
            .iter()
            .filter_map(|name| self.providers.get(name.as_str()).cloned())
            .collect();

        if providers.is_empty() {
            tracing::warn!(
                intent = intent.as_str(),
                "no providers available, falling back to duckduckgo"
            );
            if let Some(ddg) = self.providers.get("duckduckgo") {
                providers.push(ddg.clone());
            }
        }

        providers
    }

    async fn configured_names(&self, intent: SearchIntent) -> Vec<String> {
        if let Some(admin) = &self.admin {
            let routing = admin.intent_routing().await;
            if let Some(row) = routing.get(intent.as_str()) {
                if !row.providers.is_empty() {
                    return row.providers.clone();
                }
            }
        }
        fallback_providers(intent)
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Whether a dedicated RAG service owns this intent.
    pub async fn should_use_rag(&self, intent: SearchIntent) -> bool {
        if let Some(admin) = &self.admin {
            let routing = admin.intent_routing().await;
            if let Some(row) = routing.get(intent.as_str()) {
                return row.use_rag;
            }
        }
        RAG_INTENTS.contains(&intent)
    }

    /// Close every provider's HTTP resources.
    pub async fn close_all(&self) {
        for provider in self.providers.values() {
            provider.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::SearchResult;
    use crate::SearchError;
    use async_trait::async_trait;

    struct StubProvider(&'static str);

    #[async_trait]
    impl SearchProvider for StubProvider {
        fn name(&self) -> &'static str {
            self.0
        }
        async fn search(
            &self,
            _query: &str,
            _location: Option<&str>,
            _limit: usize,
        ) -> Result<Vec<SearchResult>, SearchError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_event_intent_prefers_ticketing_apis() {
        let mut router = ProviderRouter::new(None);
        router.register(Arc::new(StubProvider("ticketmaster")));
        router.register(Arc::new(StubProvider("duckduckgo")));

        let providers = router.providers_for_intent(SearchIntent::EventSearch).await;
        // Unregistered providers in the table are skipped; order preserved.
        let names: Vec<_> = providers.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["ticketmaster", "duckduckgo"]);
    }

    #[tokio::test]
    async fn test_rag_intents() {
        let router = ProviderRouter::new(None);
        assert!(router.should_use_rag(SearchIntent::Weather).await);
        assert!(router.should_use_rag(SearchIntent::Sports).await);
        assert!(!router.should_use_rag(SearchIntent::EventSearch).await);
    }

    #[tokio::test]
    async fn test_fallback_to_duckduckgo() {
        let mut router = ProviderRouter::new(None);
        router.register(Arc::new(StubProvider("duckduckgo")));
        // News wants brave first, but only duckduckgo is registered.
        let providers = router.providers_for_intent(SearchIntent::News).await;
        assert_eq!(providers[0].name(), "duckduckgo");
    }
}
