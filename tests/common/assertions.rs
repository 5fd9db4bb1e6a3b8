//! Custom test assertions

use playlist_dl::{BatchResult, Event};
use std::fs::File;
use std::path::Path;
use std::time::Duration;
use tokio::sync::broadcast;

/// Entry names of a ZIP archive, in archive order
pub fn archive_entries(path: &Path) -> Vec<String> {
    let mut zip = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect()
}

/// Assert that the batch archive lists exactly `expected`, in order
pub fn assert_archive_entries(result: &BatchResult, expected: &[&str]) {
    let archive = result.archive().expect("batch should have produced an archive");
    assert!(archive.path.exists(), "archive {:?} missing", archive.path);
    assert_eq!(archive.entries, expected, "recorded entry names");
    assert_eq!(archive_entries(&archive.path), expected, "entries on disk");
}

/// Item ids of the batch outcomes, in outcome order
pub fn outcome_ids(result: &BatchResult) -> Vec<String> {
    result
        .outcomes()
        .iter()
        .map(|o| o.item.id().to_string())
        .collect()
}

/// Drain every event already buffered on `events`
pub fn drain_events(events: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

/// Wait until `predicate` matches an event, or the timeout elapses
pub async fn wait_for_event<F>(
    events: &mut broadcast::Receiver<Event>,
    timeout: Duration,
    mut predicate: F,
) -> Option<Event>
where
    F: FnMut(&Event) -> bool,
{
    tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(event) if predicate(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}
