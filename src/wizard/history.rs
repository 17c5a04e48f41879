//! History Bridge
//!
//! Keeps the wizard's step mirrored onto the host's navigation history so a
//! native "Back" moves one step instead of leaving the page.
//!
//! # Protocol
//!
//! - **Mount**: an untagged (or out-of-sync) top entry is *replaced* with the
//!   current step. No new entry is created.
//! - **Navigate**: an in-range step different from the current one is applied
//!   to the state machine, then *pushed*. Out-of-range steps are rejected
//!   without touching history.
//! - **Pop**: a tagged entry with a valid step is a pure state sync. A tagged
//!   entry with a bad step resets to step 1 and is *replaced*. A foreign entry
//!   is absorbed once by pushing the current step back; a second consecutive
//!   foreign pop lets the user leave and detaches the bridge.
//! - **Clear**: the top entry is replaced with an untagged entry at the mount
//!   location, so "Back" after submit does not re-enter the wizard.
//! - **Restart**: after a reset the wizard returns to step 1. If the entry
//!   directly below is a step 1 entry this bridge pushed, history moves back
//!   onto it; otherwise the top entry is replaced.
//!
//! A detached bridge (exited, cleared or unmounted) never writes to history:
//! the top entry belongs to the host again.
//!
//! The `?step=N` query parameter mirrors the tagged state so a reload can
//! recover the step from the address alone.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use url::Url;

use super::state_machine::StepStateMachine;
use super::types::{EntryTag, HistoryEntry};

// ============================================================================
// History Port
// ============================================================================

/// Host navigation history. Mirrors the push/replace-state model of a browser.
#[cfg_attr(test, mockall::automock)]
pub trait HistoryPort: Send + Sync {
    /// Opaque state attached to the top entry.
    fn state(&self) -> Value;

    /// Location of the top entry.
    fn location(&self) -> String;

    /// Add an entry on top, discarding any forward entries.
    fn push_state(&self, state: Value, location: &str);

    /// Overwrite the top entry in place.
    fn replace_state(&self, state: Value, location: &str);

    /// Move `delta` entries through the stack without adding or removing any.
    fn go(&self, delta: i64);
}

/// Back/forward notification delivered by the host.
#[derive(Debug, Clone, PartialEq)]
pub struct PopState {
    pub state: Value,
}

impl PopState {
    pub fn new(state: Value) -> Self {
        Self { state }
    }
}

/// Result of an explicit navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// The step changed and a history entry was pushed.
    Moved(u32),
    /// Already on the requested step; nothing happened.
    Unchanged,
    /// Out of range, unreachable, or the bridge is detached.
    Rejected,
}

/// How a back/forward notification was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopOutcome {
    /// Wizard entry with a valid step; state synced without touching history.
    Synced(u32),
    /// Wizard entry with an invalid step; reset to step 1 and replaced.
    Healed,
    /// Foreign entry; the current step was pushed back on top.
    Absorbed,
    /// Second consecutive foreign entry; the user left the wizard.
    Exited,
    /// The bridge is detached and ignores notifications.
    Ignored,
}

// ============================================================================
// Location Helpers
// ============================================================================

const RELATIVE_BASE: &str = "http://relative.invalid";

fn parse_location(location: &str) -> Option<(Url, bool)> {
    match Url::parse(location) {
        Ok(url) => Some((url, false)),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = Url::parse(RELATIVE_BASE).ok()?;
            base.join(location).ok().map(|url| (url, true))
        }
        Err(_) => None,
    }
}

fn render_location(url: &Url, relative: bool) -> String {
    if !relative {
        return url.to_string();
    }

    let mut out = url.path().to_string();
    if let Some(query) = url.query() {
        out.push('?');
        out.push_str(query);
    }
    if let Some(fragment) = url.fragment() {
        out.push('#');
        out.push_str(fragment);
    }
    out
}

/// Rewrite `location` so its `param` query parameter is `step`, or drop it
/// when `step` is `None`. Other parameters are preserved.
pub fn location_with_step(location: &str, param: &str, step: Option<u32>) -> String {
    let Some((mut url, relative)) = parse_location(location) else {
        return location.to_string();
    };

    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| &**k != param)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.set_query(None);
    if !retained.is_empty() || step.is_some() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in &retained {
            pairs.append_pair(key, value);
        }
        if let Some(step) = step {
            pairs.append_pair(param, &step.to_string());
        }
    }

    render_location(&url, relative)
}

/// Read the `param` query parameter of `location` as a step number.
pub fn step_from_location(location: &str, param: &str) -> Option<i64> {
    let (url, _) = parse_location(location)?;
    let step = url
        .query_pairs()
        .find(|(k, _)| &**k == param)
        .and_then(|(_, v)| v.trim().parse::<i64>().ok());
    step
}

// ============================================================================
// History Bridge
// ============================================================================

/// Synchronizes [`StepStateMachine`] transitions with a [`HistoryPort`].
pub struct HistoryBridge {
    history: Arc<dyn HistoryPort>,
    step_param: String,
    mount_location: String,
    attached: bool,
    exit_armed: bool,
    /// Steps of the wizard entries beneath and above the top, nearest last.
    /// Only what this bridge pushed or walked through since mounting is known.
    below: Vec<u32>,
    above: Vec<u32>,
}

impl HistoryBridge {
    pub fn new(history: Arc<dyn HistoryPort>, step_param: impl Into<String>) -> Self {
        let step_param = step_param.into();
        let mount_location = location_with_step(&history.location(), &step_param, None);
        Self {
            history,
            step_param,
            mount_location,
            attached: false,
            exit_armed: false,
            below: Vec::new(),
            above: Vec::new(),
        }
    }

    /// Step the host was showing when the wizard mounted: the tagged state of
    /// the top entry first, then the visible query parameter.
    pub fn initial_step(&self) -> Option<i64> {
        match EntryTag::classify(&self.history.state()) {
            EntryTag::Wizard(Some(step)) => Some(step),
            _ => step_from_location(&self.history.location(), &self.step_param),
        }
    }

    pub fn mount_location(&self) -> &str {
        &self.mount_location
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Tag the top entry with the current step and start reacting to pops.
    pub fn mount(&mut self, machine: &StepStateMachine) {
        self.attached = true;
        self.forget_neighbours();

        let current = machine.current_step();
        match EntryTag::classify(&self.history.state()) {
            EntryTag::Wizard(Some(step)) if step == i64::from(current) => {}
            _ => self.replace_with(current),
        }

        tracing::debug!(step = current, location = %self.mount_location, "History bridge mounted");
    }

    /// Move to `step` and push a history entry for it.
    pub fn navigate_to_step(&mut self, machine: &mut StepStateMachine, step: i64) -> Navigation {
        if !self.attached {
            tracing::debug!(step, "Navigation ignored, history bridge detached");
            return Navigation::Rejected;
        }
        if !machine.contains(step) {
            tracing::debug!(step, total_steps = machine.total_steps(), "Navigation rejected, step out of range");
            return Navigation::Rejected;
        }
        if step == i64::from(machine.current_step()) {
            return Navigation::Unchanged;
        }

        let previous = machine.current_step();
        let applied = machine.set_step(step);
        self.exit_armed = false;

        self.history
            .push_state(HistoryEntry::for_step(applied).to_state(), &self.step_location(applied));
        self.below.push(previous);
        self.above.clear();
        Navigation::Moved(applied)
    }

    /// React to a back/forward notification.
    pub fn handle_pop_state(&mut self, machine: &mut StepStateMachine, pop: &PopState) -> PopOutcome {
        if !self.attached {
            return PopOutcome::Ignored;
        }

        match EntryTag::classify(&pop.state) {
            EntryTag::Wizard(Some(step)) if machine.contains(step) => {
                self.exit_armed = false;
                let left = machine.current_step();
                let arrived = machine.set_step(step);
                self.track_pop(left, arrived);
                PopOutcome::Synced(arrived)
            }
            EntryTag::Wizard(step) => {
                tracing::warn!(?step, "Stale wizard history entry, resetting to step 1");
                self.forget_neighbours();
                self.heal(machine);
                PopOutcome::Healed
            }
            EntryTag::Foreign if self.exit_armed => {
                tracing::debug!("Second back past the wizard, letting navigation through");
                self.detach();
                PopOutcome::Exited
            }
            EntryTag::Foreign => {
                self.forget_neighbours();
                let current = machine.current_step();
                self.history
                    .push_state(HistoryEntry::for_step(current).to_state(), &self.step_location(current));
                self.exit_armed = true;
                PopOutcome::Absorbed
            }
        }
    }

    /// Reset to step 1 and overwrite the top entry to match.
    pub fn heal(&mut self, machine: &mut StepStateMachine) {
        let step = machine.set_step(1);
        self.replace_with(step);
        self.exit_armed = false;
    }

    /// Replace the top entry with an untagged one at the mount location and detach.
    ///
    /// Does not touch history once detached.
    pub fn clear_history(&mut self) {
        if self.attached {
            self.history.replace_state(Value::Null, &self.mount_location);
        } else {
            tracing::debug!("History bridge detached, leaving the top entry to the host");
        }
        self.detach();
    }

    /// Go back to step 1 after a reset without stacking two step 1 entries.
    pub fn restart(&mut self, machine: &mut StepStateMachine) {
        let previous = machine.current_step();
        let step = machine.set_step(1);
        if !self.attached || previous == step {
            return;
        }
        self.exit_armed = false;

        if self.below.last() == Some(&step) {
            self.below.pop();
            self.above.push(previous);
            self.history.go(-1);
        } else {
            self.replace_with(step);
        }
    }

    /// Stop reacting to pops without touching history.
    pub fn detach(&mut self) {
        self.attached = false;
        self.forget_neighbours();
    }

    /// Follow a one-entry move from `left` to `arrived`. Pops do not carry a
    /// direction, so anything ambiguous drops what is known.
    fn track_pop(&mut self, left: u32, arrived: u32) {
        let back = self.below.last() == Some(&arrived);
        let forward = self.above.last() == Some(&arrived);
        match (back, forward) {
            (true, false) => {
                self.below.pop();
                self.above.push(left);
            }
            (false, true) => {
                self.above.pop();
                self.below.push(left);
            }
            _ => {
                self.below.clear();
                self.above.clear();
            }
        }
    }

    fn forget_neighbours(&mut self) {
        self.exit_armed = false;
        self.below.clear();
        self.above.clear();
    }

    fn replace_with(&self, step: u32) {
        self.history
            .replace_state(HistoryEntry::for_step(step).to_state(), &self.step_location(step));
    }

    fn step_location(&self, step: u32) -> String {
        location_with_step(&self.mount_location, &self.step_param, Some(step))
    }
}

// ============================================================================
// In-Memory History
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub state: Value,
    pub location: String,
}

#[derive(Debug)]
struct HistoryStack {
    entries: Vec<HistoryRecord>,
    index: usize,
}

/// Browser-like history stack for hosts without a native one, and for tests.
#[derive(Debug)]
pub struct MemoryHistory {
    inner: Mutex<HistoryStack>,
}

impl MemoryHistory {
    /// Start with a single untagged entry at `location`.
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(HistoryStack {
                entries: vec![HistoryRecord {
                    state: Value::Null,
                    location: location.into(),
                }],
                index: 0,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HistoryStack> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Host-side page navigation: push an untagged entry.
    pub fn visit(&self, location: &str) {
        self.push_state(Value::Null, location);
    }

    /// Move one entry back. `None` when already at the oldest entry.
    pub fn back(&self) -> Option<PopState> {
        let mut stack = self.lock();
        if stack.index == 0 {
            return None;
        }
        stack.index -= 1;
        Some(PopState::new(stack.entries[stack.index].state.clone()))
    }

    /// Move one entry forward. `None` when already at the newest entry.
    pub fn forward(&self) -> Option<PopState> {
        let mut stack = self.lock();
        if stack.index + 1 >= stack.entries.len() {
            return None;
        }
        stack.index += 1;
        Some(PopState::new(stack.entries[stack.index].state.clone()))
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Position of the current entry.
    pub fn index(&self) -> usize {
        self.lock().index
    }

    pub fn entries(&self) -> Vec<HistoryRecord> {
        self.lock().entries.clone()
    }
}

impl HistoryPort for MemoryHistory {
    fn state(&self) -> Value {
        let stack = self.lock();
        stack.entries[stack.index].state.clone()
    }

    fn location(&self) -> String {
        let stack = self.lock();
        stack.entries[stack.index].location.clone()
    }

    fn push_state(&self, state: Value, location: &str) {
        let mut stack = self.lock();
        let keep = stack.index + 1;
        stack.entries.truncate(keep);
        stack.entries.push(HistoryRecord {
            state,
            location: location.to_string(),
        });
        stack.index = keep;
    }

    fn replace_state(&self, state: Value, location: &str) {
        let mut stack = self.lock();
        let index = stack.index;
        stack.entries[index] = HistoryRecord {
            state,
            location: location.to_string(),
        };
    }

    fn go(&self, delta: i64) {
        let mut stack = self.lock();
        let last = stack.entries.len() as i64 - 1;
        stack.index = (stack.index as i64 + delta).clamp(0, last) as usize;
    }
}

// ============================================================================
// Tests
// ============================================================================
