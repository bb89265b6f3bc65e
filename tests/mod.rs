//! Main test module for d2cdb
//!
//! This module includes all test suites:
//! - Integration tests for multi-root builds, precedence and determinism
//! - Property-based tests for key derivation and walk order invariants

pub mod integration;
pub mod property;
