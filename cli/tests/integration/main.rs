//! Integration tests for the cistack CLI
//!
//! These tests spawn the actual binary and test end-to-end behavior.
//! Each test gets its own `CISTACK_HOME`, so platform state never leaks.

mod cli_tests;
mod lifecycle;
