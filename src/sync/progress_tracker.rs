//! Progress tracking for event ingestion.
//!
//! This module provides the `IngestProgress` tracker, which counts fetched pages, persisted
//! events and stale entries dropped at pagination boundaries, and remembers the highest persisted
//! position. It logs progress at regular intervals so a long catch-up stays observable.

use crate::sync::Position;
use tracing::info;

/// Persisted events between two progress log lines.
const LOG_EVERY_EVENTS: usize = 1000;

/// Service for tracking ingestion progress
#[derive(Debug, Clone)]
pub struct IngestProgress {
    /// Cursor at the start of this session
    start: Position,
    /// The highest position persisted in this session
    highest_persisted: Position,
    pages_fetched: usize,
    events_seen: usize,
    events_persisted: usize,
    stale_skipped: usize,
    batches_persisted: usize,
    /// Value of `events_persisted` when progress was last logged
    last_logged_events: usize,
}

impl IngestProgress {
    /// Create a new progress tracker starting from the given cursor.
    pub fn new(start: Position) -> Self {
        Self {
            highest_persisted: start.clone(),
            start,
            pages_fetched: 0,
            events_seen: 0,
            events_persisted: 0,
            stale_skipped: 0,
            batches_persisted: 0,
            last_logged_events: 0,
        }
    }

    /// Record a fetched page holding `events` entries
    pub fn record_page(&mut self, events: usize) {
        self.pages_fetched += 1;
        self.events_seen += events;
    }

    /// Record entries dropped because they were at or before the cursor
    pub fn record_stale(&mut self, events: usize) {
        self.stale_skipped += events;
    }

    /// Record a persisted batch and the cursor it produced
    pub fn record_batch(&mut self, events: usize, cursor: &Position) {
        self.batches_persisted += 1;
        self.events_persisted += events;
        if cursor.is_after(&self.highest_persisted) {
            self.highest_persisted = cursor.clone();
        }
    }

    /// Log progress at regular intervals or when forced
    pub fn log_progress(&mut self, force: bool) {
        let since_last_log = self.events_persisted - self.last_logged_events;
        if force || since_last_log >= LOG_EVERY_EVENTS {
            info!(
                "Ingest progress: {} events persisted in {} batches from {} pages, up to {}",
                self.events_persisted,
                self.batches_persisted,
                self.pages_fetched,
                self.highest_persisted
            );
            self.last_logged_events = self.events_persisted;
        }
    }

    pub fn highest_persisted(&self) -> &Position {
        &self.highest_persisted
    }

    /// Get ingestion statistics as an IngestStats struct
    pub fn stats(&self) -> IngestStats {
        IngestStats {
            start: self.start.clone(),
            highest_persisted: self.highest_persisted.clone(),
            pages_fetched: self.pages_fetched,
            events_seen: self.events_seen,
            events_persisted: self.events_persisted,
            stale_skipped: self.stale_skipped,
            batches_persisted: self.batches_persisted,
        }
    }
}

/// Statistics about ingestion progress
#[derive(Debug, Clone, PartialEq)]
pub struct IngestStats {
    pub start: Position,
    pub highest_persisted: Position,
    pub pages_fetched: usize,
    pub events_seen: usize,
    pub events_persisted: usize,
    pub stale_skipped: usize,
    pub batches_persisted: usize,
}

impl IngestStats {
    /// Get a human-readable summary of the ingestion statistics
    pub fn summary(&self) -> String {
        format!(
            "Ingested from {} to {}: {} events in {} batches, {} pages{}",
            self.start,
            self.highest_persisted,
            self.events_persisted,
            self.batches_persisted,
            self.pages_fetched,
            if self.stale_skipped == 0 {
                String::new()
            } else {
                format!(" ({} stale entries skipped)", self.stale_skipped)
            }
        )
    }
}
