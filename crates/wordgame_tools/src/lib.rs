//! # Word Game Development Tools
//!
//! Command-line checks run before deploying a server:
//! - Dictionary validation
//! - Server config validation

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod validate;
