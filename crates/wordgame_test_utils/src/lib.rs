//! # Word Game Test Utilities
//!
//! Shared testing utilities for all crates:
//! - Word bank and roster fixtures
//! - Property-based testing strategies
//! - Scripted TCP clients for end-to-end sessions

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod fixtures;
pub mod strategies;

/// Re-export proptest for convenience.
pub use proptest;
