//! Execution engine for arrsync
//!
//! For each instance the engine:
//! 1. Plans every configured kind against the live server
//! 2. Displays the plan
//! 3. Applies it, asking before deleting unmanaged resources

pub mod differ;
pub mod executor;

pub use executor::{DeleteGate, PromptGate, RunOptions, run_instance};
