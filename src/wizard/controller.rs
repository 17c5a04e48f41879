//! Wizard Controller
//!
//! The single surface step UIs and the host talk to. Composes the
//! [`StepStateMachine`], the [`HistoryBridge`] and [`DraftPersistence`].
//!
//! # Usage
//!
//! ```rust,ignore
//! let steps = vec![StepDescriptor::new(1, "basics"), StepDescriptor::new(2, "details")];
//! let mut wizard = WizardController::mount("culprit-profile", steps, &config.wizard, ports)?;
//!
//! // Step UI submits validated data
//! wizard.complete_step("basics", &json!({ "name": "X" }))?;
//! assert_eq!(wizard.current_step(), 2);
//!
//! // Host event loop
//! wizard.tick();
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::clock::Clock;
use super::error::WizardError;
use super::history::{HistoryBridge, HistoryPort, Navigation, PopOutcome, PopState};
use super::persistence::{DraftPersistence, SaveStatus};
use super::state_machine::StepStateMachine;
use super::store::KeyValueStore;
use super::types::{empty_payload, validate_steps, StepDescriptor, StepPayload, WizardState};
use crate::config::WizardConfig;

/// Host services the wizard depends on.
#[derive(Clone)]
pub struct WizardPorts {
    pub history: Arc<dyn HistoryPort>,
    pub store: Arc<dyn KeyValueStore>,
    pub clock: Arc<dyn Clock>,
}

fn step_complete(steps: &[StepDescriptor], data: &StepPayload, step: u32) -> bool {
    step.checked_sub(1)
        .and_then(|index| steps.get(index as usize))
        .and_then(|descriptor| data.get(&descriptor.key))
        .is_some_and(Option::is_some)
}

/// Root of the wizard. Owns the state machine, history bridge and drafts.
pub struct WizardController {
    form_id: String,
    steps: Vec<StepDescriptor>,
    data: StepPayload,
    machine: StepStateMachine,
    bridge: HistoryBridge,
    drafts: DraftPersistence,
    finished: bool,
    unmounted: bool,
}

impl WizardController {
    /// Mount a wizard: restore any draft, resolve the starting step and tag
    /// the top history entry.
    ///
    /// Fails only when the step declarations are invalid.
    pub fn mount(
        form_id: impl Into<String>,
        steps: Vec<StepDescriptor>,
        config: &WizardConfig,
        ports: WizardPorts,
    ) -> Result<Self, WizardError> {
        validate_steps(&steps)?;
        let form_id = form_id.into();

        let mut drafts = DraftPersistence::new(form_id.clone(), ports.store, ports.clock)
            .with_debounce_ms(config.debounce_ms)
            .with_key_prefix(&config.key_prefix);

        let mut data = empty_payload(&steps);
        if let Some(record) = drafts.restore() {
            for (key, value) in record.payload {
                match data.get_mut(&key) {
                    Some(slot) => *slot = value,
                    None => tracing::debug!(form_id = %form_id, key = %key, "Dropping draft data for undeclared step"),
                }
            }
        }

        let mut machine = StepStateMachine::new(steps.len() as u32);
        let mut bridge = HistoryBridge::new(ports.history, config.step_param.clone());

        if let Some(requested) = bridge.initial_step() {
            let applied = machine.set_step(requested);
            let reachable = machine.can_advance_to(i64::from(applied), |s| step_complete(&steps, &data, s));
            if !reachable {
                tracing::debug!(
                    form_id = %form_id,
                    step = applied,
                    "Requested step not reachable with restored data, starting at step 1"
                );
                machine.set_step(1);
            }
        }

        bridge.mount(&machine);

        tracing::info!(
            form_id = %form_id,
            step = machine.current_step(),
            total_steps = machine.total_steps(),
            "Wizard mounted"
        );

        Ok(Self {
            form_id,
            steps,
            data,
            machine,
            bridge,
            drafts,
            finished: false,
            unmounted: false,
        })
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn form_id(&self) -> &str {
        &self.form_id
    }

    pub fn steps(&self) -> &[StepDescriptor] {
        &self.steps
    }

    pub fn current_step(&self) -> u32 {
        self.machine.current_step()
    }

    pub fn total_steps(&self) -> u32 {
        self.machine.total_steps()
    }

    pub fn state(&self) -> WizardState {
        self.machine.state()
    }

    /// Key of the step currently shown.
    pub fn current_key(&self) -> &str {
        &self.steps[self.machine.current_step() as usize - 1].key
    }

    pub fn is_step_complete(&self, step: u32) -> bool {
        step_complete(&self.steps, &self.data, step)
    }

    /// Aggregate data for all steps.
    pub fn data(&self) -> &StepPayload {
        &self.data
    }

    pub fn step_data(&self, key: &str) -> Option<&Value> {
        self.data.get(key).and_then(Option::as_ref)
    }

    /// Previously submitted (or restored) data for a step UI.
    pub fn initial_data<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.step_data(key)?;
        match serde_json::from_value(value.clone()) {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::warn!(form_id = %self.form_id, key, error = %e, "Stored step data has unexpected shape");
                None
            }
        }
    }

    /// Get progress percentage (0-100)
    pub fn progress_percent(&self) -> u8 {
        let completed = (1..=self.total_steps()).filter(|s| self.is_step_complete(*s)).count();
        ((completed as f32 / self.total_steps() as f32) * 100.0) as u8
    }

    pub fn save_status(&self) -> SaveStatus {
        self.drafts.status()
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.drafts.last_saved()
    }

    pub fn last_save_failed(&self) -> bool {
        self.drafts.last_save_failed()
    }

    /// Wall time until the pending draft write is due.
    pub fn time_until_save(&self) -> Option<std::time::Duration> {
        self.drafts.time_until_due()
    }

    /// False once the wizard was finished, exited or unmounted.
    pub fn is_attached(&self) -> bool {
        self.bridge.is_attached()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Record validated data for `key`, advance one step and schedule a save.
    pub fn complete_step<T: Serialize>(&mut self, key: &str, data: &T) -> Result<Navigation, WizardError> {
        let value = serde_json::to_value(data)?;
        self.complete_step_value(key, value)
    }

    pub fn complete_step_value(&mut self, key: &str, value: Value) -> Result<Navigation, WizardError> {
        let step_id = self
            .steps
            .iter()
            .find(|s| s.key == key)
            .map(|s| s.id)
            .ok_or_else(|| WizardError::UnknownStep(key.to_string()))?;

        if value.is_null() {
            return Err(WizardError::EmptyStepData(key.to_string()));
        }

        if self.finished || self.unmounted {
            tracing::debug!(form_id = %self.form_id, key, "Ignoring step completion, wizard is closed");
            return Ok(Navigation::Rejected);
        }

        if let Some(slot) = self.data.get_mut(key) {
            *slot = Some(value);
        }

        let navigation = match self.machine.next_step() {
            Some(next) => self.navigate_to_step(i64::from(next)),
            None => Navigation::Unchanged,
        };

        self.drafts.auto_save(&self.data);

        tracing::debug!(form_id = %self.form_id, key, step = step_id, ?navigation, "Step completed");
        Ok(navigation)
    }

    /// Explicit navigation. Steps whose predecessors are incomplete are rejected.
    pub fn navigate_to_step(&mut self, step: i64) -> Navigation {
        if self.machine.contains(step) && !self.is_reachable(step) {
            tracing::debug!(form_id = %self.form_id, step, "Navigation rejected, earlier steps incomplete");
            return Navigation::Rejected;
        }
        self.bridge.navigate_to_step(&mut self.machine, step)
    }

    pub fn go_back(&mut self) -> Navigation {
        match self.machine.previous_step() {
            Some(step) => self.bridge.navigate_to_step(&mut self.machine, i64::from(step)),
            None => Navigation::Unchanged,
        }
    }

    pub fn go_next(&mut self) -> Navigation {
        match self.machine.next_step() {
            Some(step) => self.navigate_to_step(i64::from(step)),
            None => Navigation::Unchanged,
        }
    }

    /// Deliver a native back/forward notification.
    pub fn handle_pop_state(&mut self, pop: &PopState) -> PopOutcome {
        let outcome = self.bridge.handle_pop_state(&mut self.machine, pop);

        if let PopOutcome::Synced(step) = outcome {
            if !self.is_reachable(i64::from(step)) {
                tracing::debug!(form_id = %self.form_id, step, "History points past incomplete steps");
                self.bridge.heal(&mut self.machine);
                return PopOutcome::Healed;
            }
        }

        outcome
    }

    /// Discard the draft and all data, and start over on step 1.
    ///
    /// History is only touched while the bridge is attached.
    pub fn reset(&mut self) {
        self.drafts.clear();
        self.data = empty_payload(&self.steps);
        self.finished = false;
        self.bridge.restart(&mut self.machine);
        tracing::info!(form_id = %self.form_id, attached = self.bridge.is_attached(), "Wizard reset");
    }

    /// Successful submit: drop the draft and untag history if still attached.
    pub fn finish(&mut self) {
        self.drafts.clear();
        self.bridge.clear_history();
        self.finished = true;
        tracing::info!(form_id = %self.form_id, "Wizard finished");
    }

    /// Perform a due draft write. Call from the host event loop.
    pub fn tick(&mut self) -> bool {
        self.drafts.tick()
    }

    /// Write the pending (or last failed) draft now.
    pub fn flush(&mut self) -> bool {
        self.drafts.flush()
    }

    /// Cancel pending writes and stop reacting to history.
    pub fn unmount(&mut self) {
        self.unmounted = true;
        self.drafts.cancel();
        self.bridge.detach();
        tracing::debug!(form_id = %self.form_id, "Wizard unmounted");
    }

    fn is_reachable(&self, step: i64) -> bool {
        self.machine
            .can_advance_to(step, |s| step_complete(&self.steps, &self.data, s))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::wizard::{HistoryEntry, ManualClock, MemoryHistory, MemoryStore};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Basics {
        name: String,
    }

    struct Harness {
        history: Arc<MemoryHistory>,
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
    }

    impl Harness {
        fn new(location: &str) -> Self {
            Self {
                history: Arc::new(MemoryHistory::new(location)),
                store: Arc::new(MemoryStore::new()),
                clock: Arc::new(ManualClock::default()),
            }
        }

        fn mount(&self, keys: &[&str]) -> WizardController {
            let steps = keys
                .iter()
                .enumerate()
                .map(|(i, k)| StepDescriptor::new(i as u32 + 1, *k))
                .collect();
            let ports = WizardPorts {
                history: self.history.clone(),
                store: self.store.clone(),
                clock: self.clock.clone(),
            };
            WizardController::mount("culprit-profile", steps, &WizardConfig::default(), ports).unwrap()
        }
    }

    #[test]
    fn test_mount_rejects_invalid_steps() {
        let harness = Harness::new("/profiles/new");
        let ports = WizardPorts {
            history: harness.history.clone(),
            store: harness.store.clone(),
            clock: harness.clock.clone(),
        };
        let result = WizardController::mount("x", Vec::new(), &WizardConfig::default(), ports);
        assert!(matches!(result, Err(WizardError::InvalidSteps(_))));
    }

    #[test]
    fn test_complete_step_advances_and_schedules_save() {
        let harness = Harness::new("/profiles/new");
        let mut wizard = harness.mount(&["basics", "details", "review"]);

        let nav = wizard.complete_step("basics", &Basics { name: "X".into() }).unwrap();
        assert_eq!(nav, Navigation::Moved(2));
        assert_eq!(wizard.current_step(), 2);
        assert_eq!(wizard.current_key(), "details");
        assert!(wizard.is_step_complete(1));
        assert!(!wizard.is_step_complete(2));
        assert_eq!(wizard.save_status(), SaveStatus::Pending);
        assert_eq!(harness.history.state(), HistoryEntry::for_step(2).to_state());

        harness.clock.advance_ms(1_000);
        assert!(wizard.tick());
        assert_eq!(wizard.save_status(), SaveStatus::Saved);
        assert!(wizard.last_saved_at().is_some());
        assert_eq!(wizard.progress_percent(), 33);
    }

    #[test]
    fn test_complete_step_errors() {
        let harness = Harness::new("/profiles/new");
        let mut wizard = harness.mount(&["basics", "details"]);

        assert!(matches!(
            wizard.complete_step_value("missing", json!({})),
            Err(WizardError::UnknownStep(_))
        ));
        assert!(matches!(
            wizard.complete_step_value("basics", Value::Null),
            Err(WizardError::EmptyStepData(_))
        ));
        assert_eq!(wizard.current_step(), 1);
    }

    #[test]
    fn test_last_step_does_not_navigate() {
        let harness = Harness::new("/profiles/new");
        let mut wizard = harness.mount(&["basics", "details"]);
        wizard.complete_step_value("basics", json!({"name": "X"})).unwrap();

        let nav = wizard.complete_step_value("details", json!({"age": 5})).unwrap();
        assert_eq!(nav, Navigation::Unchanged);
        assert_eq!(wizard.current_step(), 2);
        assert_eq!(wizard.progress_percent(), 100);
    }

    #[test]
    fn test_go_next_guarded_by_completion() {
        let harness = Harness::new("/profiles/new");
        let mut wizard = harness.mount(&["basics", "details", "review"]);

        assert_eq!(wizard.go_next(), Navigation::Rejected);
        wizard.complete_step_value("basics", json!({"name": "X"})).unwrap();
        assert_eq!(wizard.go_back(), Navigation::Moved(1));
        assert_eq!(wizard.go_back(), Navigation::Unchanged);
        assert_eq!(wizard.go_next(), Navigation::Moved(2));
        assert_eq!(wizard.navigate_to_step(3), Navigation::Rejected);
    }

    #[test]
    fn test_initial_data_typed() {
        let harness = Harness::new("/profiles/new");
        let mut wizard = harness.mount(&["basics", "details"]);
        wizard.complete_step("basics", &Basics { name: "X".into() }).unwrap();

        assert_eq!(wizard.initial_data::<Basics>("basics"), Some(Basics { name: "X".into() }));
        assert_eq!(wizard.initial_data::<Basics>("details"), None);
        assert_eq!(wizard.initial_data::<Vec<u8>>("basics"), None);
    }

    #[test]
    fn test_forward_into_incomplete_step_is_healed() {
        let harness = Harness::new("/profiles/new");
        let mut wizard = harness.mount(&["basics", "details", "review"]);
        wizard.complete_step_value("basics", json!({"name": "X"})).unwrap();
        wizard.complete_step_value("details", json!({"age": 5})).unwrap();

        let pop = harness.history.back().unwrap();
        assert_eq!(wizard.handle_pop_state(&pop), PopOutcome::Synced(2));
        let pop = harness.history.back().unwrap();
        assert_eq!(wizard.handle_pop_state(&pop), PopOutcome::Synced(1));

        wizard.reset();
        let pop = harness.history.forward().unwrap();
        assert_eq!(wizard.handle_pop_state(&pop), PopOutcome::Healed);
        assert_eq!(wizard.current_step(), 1);
    }

    #[test]
    fn test_remount_uses_history_step_when_reachable() {
        let harness = Harness::new("/profiles/new");
        let mut wizard = harness.mount(&["basics", "details"]);
        wizard.complete_step_value("basics", json!({"name": "X"})).unwrap();
        harness.clock.advance_ms(1_000);
        wizard.tick();
        drop(wizard);

        let wizard = harness.mount(&["basics", "details"]);
        assert_eq!(wizard.current_step(), 2);
    }

    #[test]
    fn test_remount_without_draft_starts_over() {
        let harness = Harness::new("/profiles/new?step=2");
        let wizard = harness.mount(&["basics", "details"]);
        assert_eq!(wizard.current_step(), 1);
        assert_eq!(harness.history.location(), "/profiles/new?step=1");
    }

    #[test]
    fn test_reset_clears_everything() {
        let harness = Harness::new("/profiles/new");
        let mut wizard = harness.mount(&["basics", "details"]);
        wizard.complete_step_value("basics", json!({"name": "X"})).unwrap();
        wizard.flush();
        assert!(!harness.store.is_empty());

        wizard.reset();
        assert!(harness.store.is_empty());
        assert_eq!(wizard.current_step(), 1);
        assert!(!wizard.is_step_complete(1));
        assert!(wizard.is_attached());
        assert_eq!(harness.history.state(), HistoryEntry::for_step(1).to_state());
        assert_eq!(wizard.save_status(), SaveStatus::Idle);
    }

    #[test]
    fn test_unmount_cancels_pending_save() {
        let harness = Harness::new("/profiles/new");
        let mut wizard = harness.mount(&["basics", "details"]);
        wizard.complete_step_value("basics", json!({"name": "X"})).unwrap();

        wizard.unmount();
        harness.clock.advance_ms(5_000);
        assert!(!wizard.tick());
        assert!(harness.store.is_empty());
        assert!(!wizard.is_attached());
    }

    #[test]
    fn test_completing_earlier_step_advances_from_current() {
        let harness = Harness::new("/profiles/new");
        let mut wizard = harness.mount(&["basics", "details", "review"]);
        wizard.complete_step_value("basics", json!({"name": "X"})).unwrap();
        wizard.complete_step_value("details", json!({"age": 5})).unwrap();
        assert_eq!(wizard.current_step(), 3);

        let nav = wizard.complete_step_value("basics", json!({"name": "Y"})).unwrap();
        assert_eq!(nav, Navigation::Unchanged);
        assert_eq!(wizard.current_step(), 3);
        assert_eq!(wizard.step_data("basics"), Some(&json!({"name": "Y"})));

        wizard.go_back();
        let nav = wizard.complete_step_value("basics", json!({"name": "Z"})).unwrap();
        assert_eq!(nav, Navigation::Moved(3));
    }

    #[test]
    fn test_reset_does_not_stack_step_one_entries() {
        let harness = Harness::new("/cases");
        harness.history.visit("/profiles/new");
        let mut wizard = harness.mount(&["basics", "details"]);
        wizard.complete_step_value("basics", json!({"name": "X"})).unwrap();

        wizard.reset();
        let entries = harness.history.entries();
        assert!(entries.windows(2).all(|pair| pair[0].state != pair[1].state));
        assert_eq!(harness.history.index(), 1);
        assert_eq!(harness.history.state(), HistoryEntry::for_step(1).to_state());

        // The next back leaves step 1 instead of landing on a copy of it
        let pop = harness.history.back().unwrap();
        assert_eq!(wizard.handle_pop_state(&pop), PopOutcome::Absorbed);
        let entries = harness.history.entries();
        assert!(entries.windows(2).all(|pair| pair[0].state != pair[1].state));
    }

    #[test]
    fn test_finish_after_exit_keeps_host_entry() {
        let harness = Harness::new("/cases");
        harness.history.visit("/profiles/new");
        let mut wizard = harness.mount(&["basics", "details"]);
        wizard.complete_step_value("basics", json!({"name": "X"})).unwrap();
        wizard.flush();

        let pop = harness.history.back().unwrap();
        assert_eq!(wizard.handle_pop_state(&pop), PopOutcome::Synced(1));
        let pop = harness.history.back().unwrap();
        assert_eq!(wizard.handle_pop_state(&pop), PopOutcome::Absorbed);
        let pop = harness.history.back().unwrap();
        assert_eq!(wizard.handle_pop_state(&pop), PopOutcome::Exited);

        wizard.finish();
        assert!(harness.store.is_empty());
        assert_eq!(harness.history.location(), "/cases");
        assert_eq!(harness.history.state(), Value::Null);
    }

    #[test]
    fn test_closed_wizard_leaves_host_history_alone() {
        let harness = Harness::new("/profiles/new");
        let mut wizard = harness.mount(&["basics", "details"]);
        wizard.complete_step_value("basics", json!({"name": "X"})).unwrap();
        wizard.flush();
        wizard.unmount();
        harness.history.visit("/dashboard");
        let len_before = harness.history.len();

        wizard.reset();
        assert!(harness.store.is_empty());
        assert_eq!(wizard.current_step(), 1);
        assert!(!wizard.is_step_complete(1));
        assert!(!wizard.is_attached());
        assert_eq!(harness.history.location(), "/dashboard");
        assert_eq!(harness.history.state(), Value::Null);
        assert_eq!(harness.history.len(), len_before);

        assert_eq!(
            wizard.complete_step_value("basics", json!({"name": "Y"})).unwrap(),
            Navigation::Rejected
        );
        assert!(!wizard.is_step_complete(1));
        wizard.finish();
        assert_eq!(harness.history.location(), "/dashboard");
        assert!(harness.store.is_empty());
    }

    #[test]
    fn test_finish_ignores_late_completions() {
        let harness = Harness::new("/profiles/new");
        let mut wizard = harness.mount(&["basics"]);
        wizard.complete_step_value("basics", json!({"name": "X"})).unwrap();
        wizard.finish();

        assert!(wizard.is_finished());
        assert_eq!(
            wizard.complete_step_value("basics", json!({"name": "Y"})).unwrap(),
            Navigation::Rejected
        );
        harness.clock.advance_ms(5_000);
        assert!(!wizard.tick());
        assert!(harness.store.is_empty());
    }
}
