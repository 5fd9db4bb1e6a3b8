//! Thread-safe progress tracking
//!
//! [`ProgressTracker`] is the one piece of state shared between a fetch running on
//! a background task and whoever displays progress. Every operation takes the same
//! lock, so a snapshot never observes a half-applied mutation, and events are
//! broadcast in mutation order.
//!
//! The tracker is an explicit handle: create one per process or session and pass
//! clones to the engine and the display layer.

use crate::types::{Event, ProgressRecord, ProgressStatus, ProgressSummary};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

/// Capacity of the event channel; slow subscribers lag rather than block mutations
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Registry of item progress records, cheap to clone
#[derive(Clone)]
pub struct ProgressTracker {
    records: Arc<Mutex<Vec<ProgressRecord>>>,
    event_tx: broadcast::Sender<Event>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("summary", &self.summarize())
            .finish()
    }
}

impl ProgressTracker {
    /// Create an empty tracker
    #[must_use]
    pub fn new() -> Self {
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            event_tx,
        }
    }

    /// Subscribe to events emitted after each mutation
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ProgressRecord>> {
        // A panic while holding the lock cannot leave a record half-written,
        // so a poisoned lock is still consistent.
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: Event) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    /// Start tracking `id` as Pending
    ///
    /// Returns false (and changes nothing) if `id` is already tracked.
    pub fn register(&self, id: &str, title: &str) -> bool {
        let mut records = self.lock();
        if records.iter().any(|r| r.id == id) {
            return false;
        }

        records.push(ProgressRecord {
            id: id.to_string(),
            title: title.to_string(),
            status: ProgressStatus::Pending,
            progress: 0.0,
            speed: String::new(),
            eta: String::new(),
            size: String::new(),
            error: None,
        });
        self.emit(Event::Registered {
            id: id.to_string(),
            title: title.to_string(),
        });
        true
    }

    /// Replace the display title of `id`
    ///
    /// Returns false for unknown ids and when the title is unchanged.
    pub fn set_title(&self, id: &str, title: &str) -> bool {
        let mut records = self.lock();
        let Some(record) = records.iter_mut().find(|r| r.id == id) else {
            return false;
        };
        if record.title == title {
            return false;
        }

        record.title = title.to_string();
        self.emit(Event::Titled {
            id: id.to_string(),
            title: title.to_string(),
        });
        true
    }

    /// Update progress figures; status becomes Downloading when `progress > 0`
    ///
    /// `progress` is clamped to `[0.0, 1.0]`. Unknown ids are ignored.
    pub fn update(&self, id: &str, progress: f32, speed: &str, eta: &str, size: &str) -> bool {
        let progress = if progress.is_nan() {
            0.0
        } else {
            progress.clamp(0.0, 1.0)
        };

        let mut records = self.lock();
        let Some(record) = records.iter_mut().find(|r| r.id == id) else {
            return false;
        };

        record.progress = progress;
        record.speed = speed.to_string();
        record.eta = eta.to_string();
        record.size = size.to_string();
        if progress > 0.0 {
            record.status = ProgressStatus::Downloading;
        }

        self.emit(Event::Progress {
            id: id.to_string(),
            progress,
            speed: speed.to_string(),
            eta: eta.to_string(),
        });
        true
    }

    /// Mark `id` Completed with progress 1.0
    pub fn complete(&self, id: &str) -> bool {
        let mut records = self.lock();
        let Some(record) = records.iter_mut().find(|r| r.id == id) else {
            return false;
        };

        record.status = ProgressStatus::Completed;
        record.progress = 1.0;
        self.emit(Event::Completed { id: id.to_string() });
        true
    }

    /// Mark `id` Failed with `message`; progress is left as is
    pub fn fail(&self, id: &str, message: &str) -> bool {
        let mut records = self.lock();
        let Some(record) = records.iter_mut().find(|r| r.id == id) else {
            return false;
        };

        record.status = ProgressStatus::Failed;
        record.error = Some(message.to_string());
        self.emit(Event::Failed {
            id: id.to_string(),
            error: message.to_string(),
        });
        true
    }

    /// Point-in-time copy of every record, in registration order
    pub fn snapshot(&self) -> Vec<ProgressRecord> {
        self.lock().clone()
    }

    /// Copy of a single record
    pub fn get(&self, id: &str) -> Option<ProgressRecord> {
        self.lock().iter().find(|r| r.id == id).cloned()
    }

    /// Count records per status
    pub fn summarize(&self) -> ProgressSummary {
        let records = self.lock();
        let mut summary = ProgressSummary::default();
        for record in records.iter() {
            match record.status {
                ProgressStatus::Pending => summary.pending += 1,
                ProgressStatus::Downloading => summary.downloading += 1,
                ProgressStatus::Completed => summary.completed += 1,
                ProgressStatus::Failed => summary.failed += 1,
            }
        }
        summary
    }

    /// Remove every record that is currently Completed; returns how many were removed
    pub fn clear_completed(&self) -> usize {
        let mut records = self.lock();
        let before = records.len();
        records.retain(|r| r.status != ProgressStatus::Completed);
        let removed = before - records.len();

        if removed > 0 {
            self.emit(Event::Cleared { removed });
        }
        removed
    }

    /// Progress reporter bound to one item
    pub fn item(&self, id: &str) -> ItemProgress {
        ItemProgress {
            tracker: self.clone(),
            id: id.to_string(),
        }
    }
}

/// Progress reporter handed to a backend for a single item
#[derive(Clone, Debug)]
pub struct ItemProgress {
    tracker: ProgressTracker,
    id: String,
}

impl ItemProgress {
    /// Identifier this reporter updates
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Replace the display title of the bound item
    pub fn set_title(&self, title: &str) {
        self.tracker.set_title(&self.id, title);
    }

    /// Report progress for the bound item
    pub fn report(&self, progress: f32, speed: &str, eta: &str, size: &str) {
        self.tracker.update(&self.id, progress, speed, eta, size);
    }
}
