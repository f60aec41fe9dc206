//! Parallel fan-out under a global deadline
//!
//! One task per provider, all launched together. When the deadline
//! elapses, survivors are cancelled and whatever completed is returned.
//! Partial success is normal; a batch only comes back empty when every
//! provider failed or the intent is RAG-owned.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::intent::{IntentClassifier, SearchIntent};
use crate::provider::SearchProvider;
use crate::result::SearchResult;
use crate::router::ProviderRouter;
use crate::SearchError;

pub struct ParallelSearchEngine {
    classifier: IntentClassifier,
    router: ProviderRouter,
    timeout: Duration,
}

impl ParallelSearchEngine {
    pub fn new(classifier: IntentClassifier, router: ProviderRouter, timeout: Duration) -> Self {
        Self {
            classifier,
            router,
            timeout,
        }
    }

    /// Classify, route, fan out, and collect.
    ///
    /// `force_search` overrides the RAG short-circuit; used when a
    /// dedicated RAG service already failed and web search is the backup.
    pub async fn search(
        &self,
        query: &str,
        location: Option<&str>,
        limit_per_provider: usize,
        force_search: bool,
    ) -> (SearchIntent, Vec<SearchResult>) {
        let (intent, confidence) = self.classifier.classify_with_confidence(query);
        let preview: String = query.chars().take(60).collect();
        tracing::info!(
            intent = intent.as_str(),
            confidence,
            query = %preview,
            "search intent classified"
        );

        if !force_search && self.router.should_use_rag(intent).await {
            tracing::info!(intent = intent.as_str(), "intent is RAG-owned, skipping web search");
            return (intent, Vec::new());
        }

        let providers = self.router.providers_for_intent(intent).await;
        if providers.is_empty() {
            tracing::error!(intent = intent.as_str(), "no providers available");
            return (intent, Vec::new());
        }

        let results = self
            .fan_out(providers, query, location, limit_per_provider)
            .await;
        (intent, results)
    }

    async fn fan_out(
        &self,
        providers: Vec<Arc<dyn SearchProvider>>,
        query: &str,
        location: Option<&str>,
        limit: usize,
    ) -> Vec<SearchResult> {
        type ProviderOutcome = (&'static str, Result<Vec<SearchResult>, SearchError>);

        let (tx, mut rx) = mpsc::channel::<ProviderOutcome>(providers.len());
        let per_provider_timeout = self.timeout;

        let handles: Vec<JoinHandle<()>> = providers
            .into_iter()
            .map(|provider| {
                let tx = tx.clone();
                let query = query.to_string();
                let location = location.map(str::to_string);
                tokio::spawn(async move {
                    let name = provider.name();
                    let outcome = match tokio::time::timeout(
                        per_provider_timeout,
                        provider.search(&query, location.as_deref(), limit),
                    )
                    .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(SearchError::Network("provider timeout".to_string())),
                    };
                    let _ = tx.send((name, outcome)).await;
                })
            })
            .collect();
        drop(tx);

        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        let mut all_results = Vec::new();
        let mut completed = 0usize;

        loop {
            tokio::select! {
                outcome = rx.recv() => match outcome {
                    Some((name, Ok(results))) => {
                        tracing::info!(provider = name, count = results.len(), "provider completed");
                        all_results.extend(results);
                        completed += 1;
                    }
                    Some((name, Err(err))) => {
                        // Individual failures never fail the batch.
                        tracing::warn!(provider = name, error = %err, "provider failed");
                        completed += 1;
                    }
                    None => break,
                },
                _ = &mut deadline => {
                    tracing::warn!(completed, "search deadline reached, cancelling survivors");
                    break;
                }
            }
        }

        for handle in handles {
            handle.abort();
        }

        tracing::info!(
            total = all_results.len(),
            providers_completed = completed,
            "parallel search completed"
        );
        all_results
    }

    pub async fn close(&self) {
        self.router.close_all().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct TimedProvider {
        name: &'static str,
        delay: Duration,
    }

    #[async_trait]
    impl SearchProvider for TimedProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn search(
            &self,
            _query: &str,
            _location: Option<&str>,
            _limit: usize,
        ) -> Result<Vec<SearchResult>, SearchError> {
            tokio::time::sleep(self.delay).await;
            Ok(vec![SearchResult::new(self.name, self.name, "result", 0.8)])
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl SearchProvider for FailingProvider {
        fn name(&self) -> &'static str {
            "brave"
        }

        async fn search(
            &self,
            _query: &str,
            _location: Option<&str>,
            _limit: usize,
        ) -> Result<Vec<SearchResult>, SearchError> {
            Err(SearchError::Http {
                status: 500,
                body: "boom".into(),
            })
        }
    }

    fn engine_with(providers: Vec<Arc<dyn SearchProvider>>, timeout: Duration) -> ParallelSearchEngine {
        let mut router = ProviderRouter::new(None);
        for p in providers {
            router.register(p);
        }
        ParallelSearchEngine::new(IntentClassifier::new(), router, timeout)
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_keeps_only_fast_providers() {
        // ticketmaster 0.8s and duckduckgo 0.5s finish, eventbrite 1.2s
        // is cancelled at the 1.0s deadline.
        let engine = engine_with(
            vec![
                Arc::new(TimedProvider { name: "ticketmaster", delay: Duration::from_millis(800) }),
                Arc::new(TimedProvider { name: "eventbrite", delay: Duration::from_millis(1200) }),
                Arc::new(TimedProvider { name: "duckduckgo", delay: Duration::from_millis(500) }),
            ],
            Duration::from_secs(1),
        );

        let (intent, results) = engine
            .search("concerts in baltimore this weekend", Some("Baltimore, MD"), 5, false)
            .await;

        assert_eq!(intent, SearchIntent::EventSearch);
        let mut sources: Vec<_> = results.iter().map(|r| r.source.as_str()).collect();
        sources.sort_unstable();
        assert_eq!(sources, vec!["duckduckgo", "ticketmaster"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rag_intents_short_circuit() {
        let engine = engine_with(
            vec![Arc::new(TimedProvider { name: "duckduckgo", delay: Duration::from_millis(10) })],
            Duration::from_secs(3),
        );

        let (intent, results) = engine.search("ravens score", None, 5, false).await;
        assert_eq!(intent, SearchIntent::Sports);
        assert!(results.is_empty());

        // force_search overrides the RAG short-circuit.
        let (_, results) = engine.search("ravens score", None, 5, true).await;
        assert_eq!(results.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_failures_are_swallowed() {
        let engine = engine_with(
            vec![
                Arc::new(FailingProvider) as Arc<dyn SearchProvider>,
                Arc::new(TimedProvider { name: "duckduckgo", delay: Duration::from_millis(50) }),
            ],
            Duration::from_secs(3),
        );

        let (_, results) = engine.search("latest news headlines", None, 5, false).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, "duckduckgo");
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_providers_failing_returns_empty() {
        // Only the failing provider is registered for the news intent.
        let engine = engine_with(
            vec![Arc::new(FailingProvider) as Arc<dyn SearchProvider>],
            Duration::from_secs(1),
        );
        let (intent, results) = engine.search("breaking news headlines", None, 5, false).await;
        assert_eq!(intent, SearchIntent::News);
        assert!(results.is_empty());
    }
}
