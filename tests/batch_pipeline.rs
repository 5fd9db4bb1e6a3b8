//! Batch orchestration against a scripted backend
//!
//! Covers skip-and-continue on item failure, strategy fallback per item,
//! selection filters, ordered archives under concurrency, listing failures
//! and cancellation.

mod common;

use common::*;
use playlist_dl::{ErrorKind, Event, ProgressStatus, SelectionFilters};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn ids(n: usize) -> Vec<String> {
    (1..=n).map(item_id).collect()
}

fn entry(ordinal: usize, n: usize) -> String {
    format!("{:03}_{}.mp4", ordinal, stub_title(&item_id(n)))
}

#[tokio::test]
async fn failing_item_is_skipped_and_the_rest_are_archived() {
    let backend = Arc::new(
        StubBackend::new()
            .with_collection("PLmix", "Road: Trip", &ids(5))
            .fail_item(&item_id(3), "HTTP Error 403: Forbidden"),
    );
    let dir = TempDir::new().unwrap();
    let config = fast_config(dir.path());
    let (orchestrator, tracker) = create_orchestrator(backend.clone(), &config);

    let result = orchestrator
        .run(
            &collection_url("PLmix"),
            &SelectionFilters::default(),
            dir.path(),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(result.requested(), 5);
    assert_eq!(result.outcomes().len(), 5);
    assert_eq!(result.success_count(), 4);
    assert_eq!(result.failure_count(), 1);
    assert_eq!(result.success_rate(), 80.0);
    assert!(!result.is_failed());
    assert!(!result.was_cancelled());
    assert!(result.total_elapsed().is_some());

    let (failed, failure) = result.failures().next().unwrap();
    assert_eq!(failed.ordinal, 3);
    assert_eq!(failure.kind, ErrorKind::AccessForbidden);
    assert_eq!(failure.attempts, 3);
    assert!(failure.message.ends_with("(after 3 attempt(s))"));
    assert_eq!(backend.calls_for(&item_id(3)), 12, "4 strategies x 3 attempts");
    assert_eq!(backend.calls_for(&item_id(4)), 1, "batch continued after the failure");

    let expected = [entry(1, 1), entry(2, 2), entry(4, 4), entry(5, 5)];
    let expected: Vec<&str> = expected.iter().map(String::as_str).collect();
    assert_archive_entries(&result, &expected);
    assert_eq!(
        result.archive().unwrap().path,
        dir.path().join("Road_ Trip.zip")
    );

    let summary = tracker.summarize();
    assert_eq!(summary.completed, 4);
    assert_eq!(summary.failed, 1);
    let failed_record = tracker.get(&item_id(3)).unwrap();
    assert_eq!(failed_record.status, ProgressStatus::Failed);
    assert!(failed_record.error.unwrap().contains("403"));
}

#[tokio::test]
async fn fallback_strategy_rescues_an_item() {
    let backend = Arc::new(
        StubBackend::new()
            .with_collection("PLfallback", "Fallback", &ids(2))
            .fail_item_strategies(
                &item_id(1),
                &["standard", "reduced_quality"],
                "HTTP Error 403: Forbidden",
            ),
    );
    let dir = TempDir::new().unwrap();
    let config = fast_config(dir.path());
    let (orchestrator, _tracker) = create_orchestrator(backend.clone(), &config);

    let result = orchestrator
        .run(
            &collection_url("PLfallback"),
            &SelectionFilters::default(),
            dir.path(),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(result.success_count(), 2);
    let first = result.outcomes()[0].outcome.success().unwrap();
    assert_eq!(first.strategy, "audio_only");
    assert_eq!(first.attempt, 1);

    let strategies: Vec<String> = backend
        .resolve_calls()
        .into_iter()
        .filter(|(id, _)| *id == item_id(1))
        .map(|(_, strategy)| strategy)
        .collect();
    assert_eq!(strategies, vec!["standard", "reduced_quality", "audio_only"]);
}

#[tokio::test]
async fn not_found_item_is_tried_once() {
    let backend = Arc::new(
        StubBackend::new()
            .with_collection("PLgone", "Gone", &ids(2))
            .fail_item(&item_id(1), "ERROR: [youtube] item0000001: Video unavailable"),
    );
    let dir = TempDir::new().unwrap();
    let config = fast_config(dir.path());
    let (orchestrator, _tracker) = create_orchestrator(backend.clone(), &config);

    let result = orchestrator
        .run(
            &collection_url("PLgone"),
            &SelectionFilters::default(),
            dir.path(),
            &CancellationToken::new(),
        )
        .await;

    let failure = result.outcomes()[0].outcome.failure().unwrap();
    assert_eq!(failure.kind, ErrorKind::NotFound);
    assert_eq!(backend.calls_for(&item_id(1)), 1);
    assert_eq!(result.success_count(), 1);
}

#[tokio::test]
async fn every_item_failing_marks_the_batch_failed() {
    let backend = Arc::new(
        StubBackend::new()
            .with_collection("PLbad", "Bad", &ids(2))
            .fail_item(&item_id(1), "HTTP Error 429: Too Many Requests")
            .fail_item(&item_id(2), "connection reset by peer"),
    );
    let dir = TempDir::new().unwrap();
    let mut config = fast_config(dir.path());
    config.retry.max_attempts = 1;
    let (orchestrator, _tracker) = create_orchestrator(backend, &config);

    let result = orchestrator
        .run(
            &collection_url("PLbad"),
            &SelectionFilters::default(),
            dir.path(),
            &CancellationToken::new(),
        )
        .await;

    assert!(result.is_failed());
    assert!(result.listing_error().is_none());
    assert_eq!(result.failure_count(), 2);
    assert!(result.archive().is_none());

    let kinds: Vec<ErrorKind> = result.failures().map(|(_, f)| f.kind).collect();
    assert_eq!(kinds, vec![ErrorKind::AccessForbidden, ErrorKind::Timeout]);
}

#[tokio::test]
async fn listing_failure_yields_failed_batch_without_outcomes() {
    let backend = Arc::new(
        StubBackend::new().with_listing_error("PLmissing", "ERROR: The playlist does not exist"),
    );
    let dir = TempDir::new().unwrap();
    let config = fast_config(dir.path());
    let (orchestrator, tracker) = create_orchestrator(backend.clone(), &config);

    let result = orchestrator
        .run(
            &collection_url("PLmissing"),
            &SelectionFilters::default(),
            dir.path(),
            &CancellationToken::new(),
        )
        .await;

    assert!(result.is_failed());
    assert!(result.outcomes().is_empty());
    assert!(result.collection().is_none());
    let error = result.listing_error().unwrap();
    assert_eq!(error.kind, ErrorKind::NotFound);
    assert_eq!(error.attempts, 1);
    assert_eq!(backend.list_calls(), 1, "not-found listings are not retried");
    assert!(tracker.snapshot().is_empty());
}

#[tokio::test]
async fn transient_listing_failure_is_retried() {
    let backend = Arc::new(
        StubBackend::new().with_listing_error("PLbusy", "HTTP Error 429: Too Many Requests"),
    );
    let dir = TempDir::new().unwrap();
    let config = fast_config(dir.path());
    let (orchestrator, _tracker) = create_orchestrator(backend.clone(), &config);

    let result = orchestrator
        .run(
            &collection_url("PLbusy"),
            &SelectionFilters::default(),
            dir.path(),
            &CancellationToken::new(),
        )
        .await;

    let error = result.listing_error().unwrap();
    assert_eq!(error.kind, ErrorKind::AccessForbidden);
    assert_eq!(error.attempts, 3);
    assert_eq!(backend.list_calls(), 3);
}

#[tokio::test]
async fn cancellation_interrupts_listing_backoff() {
    let backend = Arc::new(
        StubBackend::new().with_listing_error("PLstuck", "HTTP Error 429: Too Many Requests"),
    );
    let dir = TempDir::new().unwrap();
    let mut config = fast_config(dir.path());
    config.retry.min_backoff = Duration::from_secs(60);
    config.retry.max_backoff = Duration::from_secs(60);
    let (orchestrator, tracker) = create_orchestrator(backend.clone(), &config);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        orchestrator.run(
            &collection_url("PLstuck"),
            &SelectionFilters::default(),
            dir.path(),
            &cancel,
        ),
    )
    .await
    .expect("cancellation should interrupt the listing backoff");

    assert!(result.was_cancelled());
    assert!(result.is_failed());
    let error = result.listing_error().unwrap();
    assert_eq!(error.kind, ErrorKind::Cancelled);
    assert_eq!(error.attempts, 1);
    assert_eq!(backend.list_calls(), 1);
    assert!(tracker.snapshot().is_empty());
}

#[tokio::test]
async fn filters_select_reverse_and_cap() {
    let backend = Arc::new(StubBackend::new().with_collection("PLten", "Ten", &ids(10)));
    let dir = TempDir::new().unwrap();
    let config = fast_config(dir.path());
    let (orchestrator, _tracker) = create_orchestrator(backend.clone(), &config);

    let filters = SelectionFilters {
        start_index: 3,
        end_index: 7,
        reverse_order: true,
        max_items: 3,
    };
    let result = orchestrator
        .run(
            &collection_url("PLten"),
            &filters,
            dir.path(),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(result.requested(), 3);
    assert_eq!(outcome_ids(&result), vec![item_id(7), item_id(6), item_id(5)]);

    let positions: Vec<usize> = result.outcomes().iter().map(|o| o.position).collect();
    assert_eq!(positions, vec![7, 6, 5]);
    let ordinals: Vec<usize> = result.outcomes().iter().map(|o| o.ordinal).collect();
    assert_eq!(ordinals, vec![1, 2, 3]);

    let expected = [entry(1, 7), entry(2, 6), entry(3, 5)];
    let expected: Vec<&str> = expected.iter().map(String::as_str).collect();
    assert_archive_entries(&result, &expected);

    // Items outside the selection are never touched
    assert_eq!(backend.calls_for(&item_id(1)), 0);
    assert_eq!(backend.calls_for(&item_id(8)), 0);
}

#[tokio::test]
async fn empty_selection_is_a_failed_batch() {
    let backend = Arc::new(StubBackend::new().with_collection("PLfew", "Few", &ids(3)));
    let dir = TempDir::new().unwrap();
    let config = fast_config(dir.path());
    let (orchestrator, _tracker) = create_orchestrator(backend.clone(), &config);

    let filters = SelectionFilters {
        start_index: 10,
        ..Default::default()
    };
    let result = orchestrator
        .run(
            &collection_url("PLfew"),
            &filters,
            dir.path(),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(result.requested(), 0);
    assert!(result.outcomes().is_empty());
    assert!(result.is_failed());
    assert!(result.archive().is_none());
    assert!(backend.resolve_calls().is_empty());
}

#[tokio::test]
async fn collection_size_cap_applies_after_filters() {
    let backend = Arc::new(StubBackend::new().with_collection("PLbig", "Big", &ids(8)));
    let dir = TempDir::new().unwrap();
    let mut config = fast_config(dir.path());
    config.batch.max_collection_size = 2;
    let (orchestrator, _tracker) = create_orchestrator(backend, &config);

    let result = orchestrator
        .run(
            &collection_url("PLbig"),
            &SelectionFilters::default(),
            dir.path(),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(result.requested(), 2);
    assert_eq!(outcome_ids(&result), vec![item_id(1), item_id(2)]);
}

#[tokio::test]
async fn archive_can_be_disabled() {
    let backend = Arc::new(StubBackend::new().with_collection("PLnozip", "NoZip", &ids(2)));
    let dir = TempDir::new().unwrap();
    let mut config = fast_config(dir.path());
    config.batch.create_archive = false;
    let (orchestrator, _tracker) = create_orchestrator(backend, &config);

    let result = orchestrator
        .run(
            &collection_url("PLnozip"),
            &SelectionFilters::default(),
            dir.path(),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(result.success_count(), 2);
    assert!(result.archive().is_none());
    assert!(!dir.path().join("NoZip.zip").exists());

    // Artifacts stay in their per-item directories
    let (first, success) = result.successes().next().unwrap();
    assert_eq!(first.ordinal, 1);
    assert_eq!(
        success.path,
        dir.path()
            .join(format!("001_{}", item_id(1)))
            .join(format!("{}.mp4", stub_title(&item_id(1))))
    );
}

#[tokio::test]
async fn item_directories_are_removed_once_archived() {
    let backend = Arc::new(StubBackend::new().with_collection("PLtidy", "Tidy", &ids(2)));
    let dir = TempDir::new().unwrap();
    let config = fast_config(dir.path());
    let (orchestrator, _tracker) = create_orchestrator(backend, &config);

    let result = orchestrator
        .run(
            &collection_url("PLtidy"),
            &SelectionFilters::default(),
            dir.path(),
            &CancellationToken::new(),
        )
        .await;

    let expected = [entry(1, 1), entry(2, 2)];
    let expected: Vec<&str> = expected.iter().map(String::as_str).collect();
    assert_archive_entries(&result, &expected);

    let remaining: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(remaining, vec!["Tidy.zip".to_string()]);
}

#[tokio::test]
async fn item_directories_can_be_kept_next_to_the_archive() {
    let backend = Arc::new(StubBackend::new().with_collection("PLkeep", "Keep", &ids(2)));
    let dir = TempDir::new().unwrap();
    let mut config = fast_config(dir.path());
    config.batch.keep_item_files = true;
    let (orchestrator, _tracker) = create_orchestrator(backend, &config);

    let result = orchestrator
        .run(
            &collection_url("PLkeep"),
            &SelectionFilters::default(),
            dir.path(),
            &CancellationToken::new(),
        )
        .await;

    assert!(result.archive().is_some());
    for (_, success) in result.successes() {
        assert!(success.path.is_file(), "{}", success.path.display());
    }
}

#[tokio::test]
async fn rerun_never_counts_files_from_an_earlier_run() {
    let dir = TempDir::new().unwrap();
    let mut config = fast_config(dir.path());
    config.batch.create_archive = false;

    let first = Arc::new(StubBackend::new().with_collection("PLagain", "Again", &ids(2)));
    let (orchestrator, _tracker) = create_orchestrator(first, &config);
    let result = orchestrator
        .run(
            &collection_url("PLagain"),
            &SelectionFilters::default(),
            dir.path(),
            &CancellationToken::new(),
        )
        .await;
    assert_eq!(result.success_count(), 2);

    // Second run: item 1 now produces nothing, though its old file is still on disk
    let second = Arc::new(
        StubBackend::new()
            .with_collection("PLagain", "Again", &ids(2))
            .without_artifact(&item_id(1)),
    );
    let (orchestrator, _tracker) = create_orchestrator(second, &config);
    let result = orchestrator
        .run(
            &collection_url("PLagain"),
            &SelectionFilters::default(),
            dir.path(),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(result.success_count(), 1);
    let (failed, failure) = result.failures().next().unwrap();
    assert_eq!(failed.ordinal, 1);
    assert_eq!(failure.kind, ErrorKind::Other);

    let (_, success) = result.successes().next().unwrap();
    assert_eq!(
        success.path,
        dir.path()
            .join(format!("002_{} (1)", item_id(2)))
            .join(format!("{}.mp4", stub_title(&item_id(2))))
    );
    assert!(
        dir.path()
            .join(format!("001_{}", item_id(1)))
            .join(format!("{}.mp4", stub_title(&item_id(1))))
            .is_file(),
        "earlier run's files are left untouched"
    );
}

#[tokio::test]
async fn concurrent_batch_keeps_selection_order() {
    // Earlier items take longer, so completion order is the reverse of selection order
    let backend = Arc::new(
        StubBackend::new()
            .with_collection("PLfast", "Parallel", &ids(4))
            .delay_item(&item_id(1), Duration::from_millis(300))
            .delay_item(&item_id(2), Duration::from_millis(200))
            .delay_item(&item_id(3), Duration::from_millis(100)),
    );
    let dir = TempDir::new().unwrap();
    let mut config = fast_config(dir.path());
    config.batch.max_concurrent = 4;
    let (orchestrator, tracker) = create_orchestrator(backend.clone(), &config);
    let mut events = tracker.subscribe();

    let result = orchestrator
        .run(
            &collection_url("PLfast"),
            &SelectionFilters::default(),
            dir.path(),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(result.success_count(), 4);
    assert_eq!(outcome_ids(&result), ids(4));
    assert!(backend.max_active_fetches() > 1, "fetches should overlap");
    assert!(backend.max_active_fetches() <= 4);

    let expected = [entry(1, 1), entry(2, 2), entry(3, 3), entry(4, 4)];
    let expected: Vec<&str> = expected.iter().map(String::as_str).collect();
    assert_archive_entries(&result, &expected);

    let completed: Vec<String> = drain_events(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            Event::Completed { id } => Some(id),
            _ => None,
        })
        .collect();
    assert_eq!(completed.first(), Some(&item_id(4)), "fastest item finished first");
}

#[tokio::test]
async fn concurrency_is_bounded() {
    let mut stub = StubBackend::new().with_collection("PLbound", "Bound", &ids(6));
    for n in 1..=6 {
        stub = stub.delay_item(&item_id(n), Duration::from_millis(50));
    }
    let backend = Arc::new(stub);
    let dir = TempDir::new().unwrap();
    let mut config = fast_config(dir.path());
    config.batch.max_concurrent = 2;
    let (orchestrator, _tracker) = create_orchestrator(backend.clone(), &config);

    let result = orchestrator
        .run(
            &collection_url("PLbound"),
            &SelectionFilters::default(),
            dir.path(),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(result.success_count(), 6);
    assert_eq!(backend.max_active_fetches(), 2);
}

#[tokio::test]
async fn cancellation_leaves_remaining_items_unattempted() {
    let backend = Arc::new(StubBackend::new().with_collection("PLstop", "Stop", &ids(4)));
    let dir = TempDir::new().unwrap();
    let mut config = fast_config(dir.path());
    config.batch.inter_item_delay = Duration::from_secs(30);
    let (orchestrator, tracker) = create_orchestrator(backend.clone(), &config);

    let cancel = CancellationToken::new();
    let mut events = tracker.subscribe();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        wait_for_event(&mut events, Duration::from_secs(10), |e| {
            matches!(e, Event::Completed { .. })
        })
        .await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        orchestrator.run(
            &collection_url("PLstop"),
            &SelectionFilters::default(),
            dir.path(),
            &cancel,
        ),
    )
    .await
    .expect("cancellation should interrupt the inter-item pause");

    assert!(result.was_cancelled());
    assert_eq!(result.requested(), 4);
    assert_eq!(result.outcomes().len(), 1);
    assert_eq!(result.success_count(), 1);
    assert_eq!(backend.calls_for(&item_id(2)), 0);

    // The completed item is still packaged
    let expected = [entry(1, 1)];
    let expected: Vec<&str> = expected.iter().map(String::as_str).collect();
    assert_archive_entries(&result, &expected);

    let summary = tracker.summarize();
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.pending, 3);
}

#[tokio::test]
async fn every_selected_item_is_registered_up_front() {
    let backend = Arc::new(StubBackend::new().with_collection("PLreg", "Reg", &ids(3)));
    let dir = TempDir::new().unwrap();
    let config = fast_config(dir.path());
    let (orchestrator, tracker) = create_orchestrator(backend, &config);
    let mut events = tracker.subscribe();

    orchestrator
        .run(
            &collection_url("PLreg"),
            &SelectionFilters::default(),
            dir.path(),
            &CancellationToken::new(),
        )
        .await;

    let events = drain_events(&mut events);
    let registered: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, Event::Registered { .. }))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(registered, vec![0, 1, 2], "registrations precede any progress");
    assert!(
        events
            .iter()
            .any(|e| matches!(e, Event::Progress { progress, .. } if *progress == 0.5))
    );
    assert_eq!(tracker.clear_completed(), 3);
}
