//! Multi-Step Form Wizard
//!
//! Tracks which step of a form the user is on, keeps that step in sync with the
//! host's back/forward history, and persists in-progress data as a draft.
//!
//! # Overview
//!
//! The wizard is composed of four parts:
//! 1. [`StepStateMachine`] - owns the current step and enforces the range
//! 2. [`HistoryBridge`] - mirrors step changes onto a [`HistoryPort`]
//! 3. [`DraftPersistence`] - debounced autosave and one-shot restore
//! 4. [`WizardController`] - wires the three together for step UIs and hosts
//!
//! # Design Principles
//!
//! - **Self-correcting**: bad step numbers are clamped or reset, never returned as errors
//! - **Tagged history**: only entries carrying `isFormNavigation` are treated as wizard steps
//! - **Recoverable**: drafts survive reloads and are restored on the next mount
//! - **Pluggable**: history, storage and time are injected trait objects

mod clock;
mod controller;
mod error;
mod history;
mod persistence;
mod state_machine;
mod store;
mod types;

pub use clock::*;
pub use controller::*;
pub use error::*;
pub use history::*;
pub use persistence::*;
pub use state_machine::*;
pub use store::*;
pub use types::*;
