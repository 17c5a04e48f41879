//! Property-based tests for the form wizard
//!
//! Property tests verify invariants that should hold for all inputs, rather
//! than testing specific cases.
//!
//! ## Running Property Tests
//!
//! ```sh
//! cargo test property --release
//! ```
//!
//! ## Test Modules
//!
//! - `step_machine_props`: Step range invariants
//!   - Any out-of-range request lands on step 1
//!   - Current step always stays within `1..=total`
//!
//! - `history_props`: History synchronization
//!   - Navigate then back restores the previous step
//!   - Random back/forward walks keep state and history in agreement
//!
//! - `draft_props`: Debounced persistence
//!   - A burst of saves yields one write with the last payload
//!
//! ## Configuration
//!
//! By default, proptest runs 256 cases per property. This can be configured
//! via the `PROPTEST_CASES` environment variable.

mod draft_props;
mod history_props;
mod step_machine_props;
