//! Query lifecycle driven through the public service handles.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;

use searchlight_api::Services;
use searchlight_api::database::{Database, InMemoryStore, LibraryRepository};
use searchlight_api::domain::{LibraryFilter, SearchResults, SearchType, SortOrder};
use searchlight_api::events::DisabledNotifier;
use searchlight_api::gateway::{Principal, UnconfiguredIdentity};
use searchlight_api::results::{MockResultProvider, ProviderError, ResultProvider};
use searchlight_api::runtime::{LifecycleState, QueryController, SubmitOutcome, WriteOutcome};
use searchlight_api::view::{ExportFormat, View};

/// Mock results after a short delay, so submissions overlap.
#[derive(Debug)]
struct SlowProvider(Duration);

#[async_trait]
impl ResultProvider for SlowProvider {
    async fn fetch_results(
        &self,
        query: &str,
        mode: SearchType,
        model: &str,
    ) -> Result<SearchResults, ProviderError> {
        tokio::time::sleep(self.0).await;
        MockResultProvider.fetch_results(query, mode, model).await
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}

fn services(store: &InMemoryStore, results: Arc<dyn ResultProvider>) -> Services {
    Services::with_database(
        Database::InMemory(store.clone()),
        results,
        Arc::new(DisabledNotifier),
        Arc::new(UnconfiguredIdentity),
    )
}

fn dana() -> Principal {
    Principal {
        id: "user_dana".into(),
        email: "dana@example.com".into(),
        name: Some("Dana".into()),
    }
}

#[tokio::test]
async fn test_concurrent_submits_write_once() {
    let store = InMemoryStore::default();
    let results: Arc<dyn ResultProvider> = Arc::new(SlowProvider(Duration::from_millis(50)));
    let controller = QueryController::for_principal(services(&store, results), Some(dana()));
    controller.set_query("northern lights");

    let outcomes = join_all((0..5).map(|_| controller.submit())).await;
    let outcomes: Vec<SubmitOutcome> = outcomes.into_iter().map(Result::unwrap).collect();

    let rendered = outcomes
        .iter()
        .filter(|o| matches!(o, SubmitOutcome::Rendered { .. }))
        .count();
    let ignored = outcomes
        .iter()
        .filter(|o| matches!(o, SubmitOutcome::Ignored))
        .count();
    assert_eq!((rendered, ignored), (1, 4));

    let records = store.records();
    assert_eq!(records.len(), 1);
    assert!(records[0].search_results.is_some());
}

#[tokio::test]
async fn test_history_after_several_searches() {
    let store = InMemoryStore::default();
    let controller =
        QueryController::for_principal(services(&store, Arc::new(MockResultProvider)), Some(dana()));

    for (query, kind) in [
        ("aurora forecast", SearchType::Search),
        ("solar wind physics", SearchType::Research),
        ("best viewing spots", SearchType::Search),
    ] {
        controller.set_query(query);
        controller.select_type(kind);
        let outcome = controller.submit().await.unwrap();
        let SubmitOutcome::Rendered { writes, .. } = outcome else {
            panic!("expected Rendered, got {outcome:?}");
        };
        assert!(matches!(writes.enriched, Some(WriteOutcome::Stored { .. })));
    }

    let filter = LibraryFilter::for_user("dana@example.com");
    let newest = store.select(&filter, SortOrder::Newest).await.unwrap();
    assert_eq!(newest[0].search_input, "best viewing spots");

    let research = store
        .select(&filter.with_kind(Some(SearchType::Research)), SortOrder::Newest)
        .await
        .unwrap();
    assert_eq!(research.len(), 1);
    assert_eq!(research[0].search_input, "solar wind physics");

    let session = controller.snapshot();
    assert_eq!(session.state, LifecycleState::Rendered);
    assert!(matches!(View::project(&session), View::Results { .. }));
    let json = controller.export(ExportFormat::Json).unwrap();
    assert!(json.contains("best viewing spots"));
}
