/// form-wizard - Multi-step form wizard controller
///
/// Tracks the current step of a form, keeps it in sync with the host's
/// back/forward history, and persists in-progress data as a recoverable draft.

pub mod config;
pub mod logging;
pub mod wizard;

#[cfg(test)]
mod tests;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
