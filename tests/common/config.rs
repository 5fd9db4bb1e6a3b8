//! Test configuration helpers

use super::stub::StubBackend;
use playlist_dl::{BatchOrchestrator, Config, Downloader, FetchEngine, ProgressTracker};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Config rooted at `output_dir` with every wait set to zero
pub fn fast_config(output_dir: &Path) -> Config {
    let mut config = Config {
        output_dir: output_dir.to_path_buf(),
        ..Default::default()
    };
    config.retry.min_backoff = Duration::ZERO;
    config.retry.max_backoff = Duration::ZERO;
    config.retry.jitter = false;
    config.batch.inter_item_delay = Duration::ZERO;
    config
}

/// Orchestrator over `backend` with its own tracker
pub fn create_orchestrator(
    backend: Arc<StubBackend>,
    config: &Config,
) -> (BatchOrchestrator, ProgressTracker) {
    let tracker = ProgressTracker::new();
    let engine = FetchEngine::new(backend, config.fetch.clone(), config.retry.clone());
    (
        BatchOrchestrator::new(engine, config, tracker.clone()),
        tracker,
    )
}

/// Downloader over `backend` writing into a fresh temp directory
///
/// Keep the returned `TempDir` alive for the duration of the test.
pub fn create_test_downloader(backend: Arc<StubBackend>) -> (Downloader, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let downloader = Downloader::new(fast_config(temp_dir.path()), backend).unwrap();
    (downloader, temp_dir)
}
