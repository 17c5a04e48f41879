//! Crate-level tests that exercise more than one module at a time.

mod property;
