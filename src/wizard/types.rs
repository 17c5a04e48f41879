//! Wizard Domain Types
//!
//! Defines the shared data model of the form wizard:
//! - [`StepDescriptor`]: Declared step (id + payload key)
//! - [`WizardState`]: Snapshot of the current/total step pair
//! - [`HistoryEntry`] / [`EntryTag`]: Tagged state attached to history records
//! - [`DraftRecord`]: Persisted in-progress form data
//!
//! # Serialization
//!
//! History entries and drafts use camelCase JSON so the stored shape stays
//! readable by any host that shares the same history stack or key/value store.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::error::WizardError;

/// Current draft layout version. Drafts with a newer version are ignored.
pub const DRAFT_SCHEMA_VERSION: u32 = 1;

/// Aggregate step data keyed by step key, in declaration order.
/// A `None` value means the step has not been submitted yet.
pub type StepPayload = IndexMap<String, Option<Value>>;

/// Returns true when at least one step carries submitted data.
pub fn has_step_data(payload: &StepPayload) -> bool {
    payload.values().any(Option::is_some)
}

// ============================================================================
// Step Declarations
// ============================================================================

/// A declared wizard step. Ids are 1-based and follow declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDescriptor {
    pub id: u32,
    pub key: String,
}

impl StepDescriptor {
    pub fn new(id: u32, key: impl Into<String>) -> Self {
        Self { id, key: key.into() }
    }
}

/// Validates a step list: non-empty, ids `1..=n` in order, unique non-empty keys.
pub fn validate_steps(steps: &[StepDescriptor]) -> Result<(), WizardError> {
    if steps.is_empty() {
        return Err(WizardError::InvalidSteps("no steps declared".to_string()));
    }

    for (index, step) in steps.iter().enumerate() {
        let expected = index as u32 + 1;
        if step.id != expected {
            return Err(WizardError::InvalidSteps(format!(
                "step '{}' has id {}, expected {}",
                step.key, step.id, expected
            )));
        }
        if step.key.trim().is_empty() {
            return Err(WizardError::InvalidSteps(format!("step {} has an empty key", step.id)));
        }
        if steps[..index].iter().any(|s| s.key == step.key) {
            return Err(WizardError::InvalidSteps(format!("duplicate step key '{}'", step.key)));
        }
    }

    Ok(())
}

/// Builds an all-empty payload for the declared steps.
pub fn empty_payload(steps: &[StepDescriptor]) -> StepPayload {
    steps.iter().map(|s| (s.key.clone(), None)).collect()
}

// ============================================================================
// WizardState
// ============================================================================

/// Snapshot of the step state machine.
///
/// `1 <= current_step <= total_steps` holds for every value handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardState {
    pub current_step: u32,
    pub total_steps: u32,
}

// ============================================================================
// History Entries
// ============================================================================

/// State the wizard attaches to the history records it creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub form_step: i64,
    pub is_form_navigation: bool,
}

impl HistoryEntry {
    pub fn for_step(step: u32) -> Self {
        Self {
            form_step: i64::from(step),
            is_form_navigation: true,
        }
    }

    /// Opaque history state for this entry.
    pub fn to_state(&self) -> Value {
        json!({
            "formStep": self.form_step,
            "isFormNavigation": self.is_form_navigation,
        })
    }
}

/// Classification of a history record's opaque state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryTag {
    /// Created by the wizard. The step is `None` when missing or not an integer.
    Wizard(Option<i64>),
    /// Anything the host application pushed.
    Foreign,
}

impl EntryTag {
    pub fn classify(state: &Value) -> Self {
        let Some(object) = state.as_object() else {
            return EntryTag::Foreign;
        };

        match object.get("isFormNavigation").and_then(Value::as_bool) {
            Some(true) => EntryTag::Wizard(object.get("formStep").and_then(Value::as_i64)),
            _ => EntryTag::Foreign,
        }
    }
}

// ============================================================================
// DraftRecord
// ============================================================================

fn default_schema_version() -> u32 {
    DRAFT_SCHEMA_VERSION
}

/// Persisted in-progress data for one wizard instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftRecord {
    pub form_id: String,
    pub payload: StepPayload,
    pub saved_at: DateTime<Utc>,
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
}

impl DraftRecord {
    pub fn new(form_id: impl Into<String>, payload: StepPayload, saved_at: DateTime<Utc>) -> Self {
        Self {
            form_id: form_id.into(),
            payload,
            saved_at,
            schema_version: DRAFT_SCHEMA_VERSION,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
