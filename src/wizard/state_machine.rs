//! Step State Machine
//!
//! Owns the current step and total step count. Out-of-range requests are
//! corrected to step 1 rather than rejected, so callers always observe a
//! valid step.

use super::types::WizardState;

/// In-memory step state. Never touches history or storage.
#[derive(Debug, Clone)]
pub struct StepStateMachine {
    current_step: u32,
    total_steps: u32,
}

impl StepStateMachine {
    /// Create a machine positioned on step 1. A total of 0 is corrected to 1.
    pub fn new(total_steps: u32) -> Self {
        Self {
            current_step: 1,
            total_steps: total_steps.max(1),
        }
    }

    pub fn current_step(&self) -> u32 {
        self.current_step
    }

    pub fn total_steps(&self) -> u32 {
        self.total_steps
    }

    pub fn state(&self) -> WizardState {
        WizardState {
            current_step: self.current_step,
            total_steps: self.total_steps,
        }
    }

    /// Check whether `step` lies in `1..=total_steps`
    pub fn contains(&self, step: i64) -> bool {
        step >= 1 && step <= i64::from(self.total_steps)
    }

    /// Set the current step, clamping out-of-range requests to 1.
    ///
    /// Returns the step that was actually applied.
    pub fn set_step(&mut self, requested: i64) -> u32 {
        self.current_step = if self.contains(requested) {
            requested as u32
        } else {
            tracing::debug!(
                requested,
                total_steps = self.total_steps,
                "Step out of range, resetting to step 1"
            );
            1
        };
        self.current_step
    }

    /// True if `step` is in range and every step before it is complete.
    pub fn can_advance_to<F>(&self, step: i64, is_complete: F) -> bool
    where
        F: Fn(u32) -> bool,
    {
        if !self.contains(step) {
            return false;
        }
        (1..step as u32).all(is_complete)
    }

    pub fn next_step(&self) -> Option<u32> {
        (self.current_step < self.total_steps).then(|| self.current_step + 1)
    }

    pub fn previous_step(&self) -> Option<u32> {
        (self.current_step > 1).then(|| self.current_step - 1)
    }

    pub fn is_first(&self) -> bool {
        self.current_step == 1
    }

    pub fn is_last(&self) -> bool {
        self.current_step == self.total_steps
    }
}
