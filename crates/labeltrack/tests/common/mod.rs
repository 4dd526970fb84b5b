//! Shared test utilities for labeltrack integration tests.
//!
//! This module provides:
//! - `TestHarness` for an isolated on-disk database per test
//! - Builders for jobs and transition contexts

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
