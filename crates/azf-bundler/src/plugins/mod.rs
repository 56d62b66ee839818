//! Bundler plugins.
//!
//! A plugin is a value implementing [`Plugin`]. The driver in
//! [`bundler::build`](crate::bundler::build) calls the hooks in this order:
//!
//! 1. [`Plugin::setup`] once per pass, before anything else, in registration order
//! 2. [`Plugin::on_start`] before the engine runs
//! 3. [`Plugin::on_end`] after the engine, with mutable access to the result
//!
//! All hooks have no-op defaults.

mod on_rebuild;
mod shim;

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use crate::bundler::{BuildOptions, BuildResult, Message};
use crate::error::Result;

pub use on_rebuild::RebuildPlugin;
pub use shim::ShimPlugin;

/// Hook points into a bundler pass.
#[async_trait]
pub trait Plugin: Send + Sync + Debug {
    fn name(&self) -> &str;

    /// Adjust the options before the pass starts.
    fn setup(&self, options: &mut BuildOptions) {
        let _ = options;
    }

    /// Returned messages are treated as build errors and skip the engine.
    async fn on_start(&self, options: &BuildOptions) -> Vec<Message> {
        let _ = options;
        Vec::new()
    }

    /// Inspect or rewrite the result of the pass.
    async fn on_end(&self, result: &mut BuildResult) -> Result<()> {
        let _ = result;
        Ok(())
    }
}

/// Plugins are shared between the options of every pass.
pub type SharedPlugin = Arc<dyn Plugin>;
