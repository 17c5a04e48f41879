//! Draft Persistence
//!
//! Debounced autosave and one-shot restore of in-progress wizard data.
//!
//! Saves are trailing-edge debounced: every [`DraftPersistence::auto_save`]
//! call replaces the pending payload and restarts the window, so a burst of
//! changes produces exactly one write carrying the last payload. The host
//! event loop calls [`DraftPersistence::tick`] to perform writes that are due.
//!
//! Nothing here returns errors to the caller. Unreadable drafts are treated
//! as absent and write failures surface as [`SaveStatus::Failed`].

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use super::clock::Clock;
use super::store::KeyValueStore;
use super::types::{has_step_data, DraftRecord, StepPayload, DRAFT_SCHEMA_VERSION};

/// Default quiet period before a pending draft is written
pub const DEFAULT_DEBOUNCE_MS: u64 = 1_000;

/// Longest accepted quiet period (one day). Larger settings are clamped.
pub const MAX_DEBOUNCE_MS: u64 = 86_400_000;

/// Default namespace for draft keys in a shared store
pub const DEFAULT_KEY_PREFIX: &str = "form-draft:";

/// Autosave status indicator
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SaveStatus {
    /// No changes pending
    Idle,
    /// Changes detected, waiting for debounce
    Pending,
    /// Last save succeeded
    Saved,
    /// Last save failed
    Failed,
}

impl SaveStatus {
    pub fn has_pending(&self) -> bool {
        matches!(self, SaveStatus::Pending)
    }
}

#[derive(Debug)]
struct PendingWrite {
    payload: StepPayload,
    due: DateTime<Utc>,
}

/// Debounced draft writer for one `form_id`.
pub struct DraftPersistence {
    form_id: String,
    key: String,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    debounce: Duration,
    pending: Option<PendingWrite>,
    /// Payload of the last failed write, kept for [`DraftPersistence::flush`]
    failed: Option<StepPayload>,
    status: SaveStatus,
    last_saved: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl DraftPersistence {
    pub fn new(form_id: impl Into<String>, store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        let form_id = form_id.into();
        Self {
            key: format!("{DEFAULT_KEY_PREFIX}{form_id}"),
            form_id,
            store,
            clock,
            debounce: Duration::milliseconds(DEFAULT_DEBOUNCE_MS as i64),
            pending: None,
            failed: None,
            status: SaveStatus::Idle,
            last_saved: None,
            last_error: None,
        }
    }

    pub fn with_debounce_ms(mut self, millis: u64) -> Self {
        if millis > MAX_DEBOUNCE_MS {
            tracing::warn!(
                form_id = %self.form_id,
                requested = millis,
                max = MAX_DEBOUNCE_MS,
                "Debounce window too long, clamping"
            );
        }
        let millis = i64::try_from(millis.min(MAX_DEBOUNCE_MS)).unwrap_or(i64::MAX);
        self.debounce = Duration::milliseconds(millis);
        self
    }

    pub fn with_key_prefix(mut self, prefix: &str) -> Self {
        self.key = format!("{prefix}{}", self.form_id);
        self
    }

    pub fn form_id(&self) -> &str {
        &self.form_id
    }

    /// The only store key this instance reads or writes.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn status(&self) -> SaveStatus {
        self.status
    }

    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.last_saved
    }

    pub fn last_save_failed(&self) -> bool {
        self.status == SaveStatus::Failed
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// When the pending write becomes due.
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.pending.as_ref().map(|p| p.due)
    }

    /// Wall time left until the pending write is due, zero if overdue.
    pub fn time_until_due(&self) -> Option<std::time::Duration> {
        self.next_deadline()
            .map(|due| (due - self.clock.now()).to_std().unwrap_or_default())
    }

    /// Schedule a write of `payload` after the debounce window.
    ///
    /// Returns false without scheduling when no step carries data.
    pub fn auto_save(&mut self, payload: &StepPayload) -> bool {
        if !has_step_data(payload) {
            tracing::trace!(form_id = %self.form_id, "Skipping autosave of empty draft");
            return false;
        }

        let due = self
            .clock
            .now()
            .checked_add_signed(self.debounce)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.pending = Some(PendingWrite {
            payload: payload.clone(),
            due,
        });
        self.status = SaveStatus::Pending;
        true
    }

    /// Perform the pending write if its deadline has passed.
    ///
    /// Returns true when a write was attempted.
    pub fn tick(&mut self) -> bool {
        let due = match &self.pending {
            Some(pending) => pending.due <= self.clock.now(),
            None => false,
        };
        if !due {
            return false;
        }

        match self.pending.take() {
            Some(pending) => {
                self.write(pending.payload);
                true
            }
            None => false,
        }
    }

    /// Write the pending (or last failed) payload immediately.
    pub fn flush(&mut self) -> bool {
        let payload = match self.pending.take() {
            Some(pending) => pending.payload,
            None => match self.failed.take() {
                Some(payload) => payload,
                None => return false,
            },
        };
        self.write(payload);
        true
    }

    fn write(&mut self, payload: StepPayload) {
        let now = self.clock.now();
        let record = DraftRecord::new(self.form_id.clone(), payload, now);

        let result = serde_json::to_string(&record)
            .map_err(|e| e.to_string())
            .and_then(|json| self.store.set(&self.key, &json).map_err(|e| e.to_string()));

        match result {
            Ok(()) => {
                tracing::debug!(form_id = %self.form_id, "Draft saved");
                self.status = SaveStatus::Saved;
                self.last_saved = Some(now);
                self.last_error = None;
                self.failed = None;
            }
            Err(e) => {
                tracing::warn!(form_id = %self.form_id, error = %e, "Draft save failed");
                self.status = SaveStatus::Failed;
                self.last_error = Some(e);
                self.failed = Some(record.payload);
            }
        }
    }

    /// Load the stored draft for this form, if present and readable.
    pub fn restore(&mut self) -> Option<DraftRecord> {
        let raw = match self.store.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(form_id = %self.form_id, error = %e, "Failed to read draft");
                return None;
            }
        };

        let record: DraftRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(form_id = %self.form_id, error = %e, "Discarding corrupted draft");
                self.discard_stored();
                return None;
            }
        };

        if record.form_id != self.form_id {
            tracing::warn!(
                form_id = %self.form_id,
                stored_form_id = %record.form_id,
                "Discarding draft stored for another form"
            );
            self.discard_stored();
            return None;
        }

        if record.schema_version > DRAFT_SCHEMA_VERSION {
            tracing::warn!(
                form_id = %self.form_id,
                schema_version = record.schema_version,
                "Ignoring draft written by a newer version"
            );
            return None;
        }

        tracing::info!(form_id = %self.form_id, saved_at = %record.saved_at, "Draft restored");
        self.last_saved = Some(record.saved_at);
        Some(record)
    }

    /// Remove the stored draft and cancel any pending write.
    pub fn clear(&mut self) {
        self.pending = None;
        self.failed = None;
        self.discard_stored();
        self.status = SaveStatus::Idle;
        self.last_saved = None;
        self.last_error = None;
    }

    /// Drop the pending write without touching the store.
    pub fn cancel(&mut self) {
        if self.pending.take().is_some() {
            tracing::debug!(form_id = %self.form_id, "Pending draft write cancelled");
        }
        if self.status == SaveStatus::Pending {
            self.status = SaveStatus::Idle;
        }
    }

    fn discard_stored(&self) {
        if let Err(e) = self.store.remove(&self.key) {
            tracing::warn!(form_id = %self.form_id, error = %e, "Failed to remove draft");
        }
    }
}

/// Format a save timestamp for display
pub fn format_save_time(saved_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let duration = now.signed_duration_since(saved_at);

    let seconds = duration.num_seconds();
    if seconds < 5 {
        return "just now".to_string();
    }
    if seconds < 60 {
        return format!("{}s ago", seconds);
    }

    let minutes = duration.num_minutes();
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }

    saved_at.format("%H:%M").to_string()
}

// ============================================================================
// Tests
// ============================================================================
