//! azf-bundle command line interface.
//!
//! - [`cli`] - argument definitions
//! - [`commands`] - build and watch execution
//! - [`logger`] - tracing subscriber setup

pub mod cli;
pub mod commands;
pub mod logger;
