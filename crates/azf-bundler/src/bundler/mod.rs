//! Bundler abstraction.
//!
//! The actual bundling is done by an external engine behind [`Bundler`]. This
//! module drives plugins around it: [`build`] runs a single pass and fails on
//! errors, [`context`] produces a [`BuildContext`] that can rebuild on demand
//! or watch the project.

mod context;
mod esbuild;
mod options;
mod result;
mod watcher;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};

pub use context::{BuildContext, DEFAULT_DEBOUNCE, WatchHandle};
pub use esbuild::{ESBUILD_PATH_ENV, EsbuildCli, parse_diagnostics};
pub use options::{BuildOptions, EntryPoints, Format, Platform, SourceMap, merge_options};
pub use result::{BuildResult, Location, Message, OutputFile};
pub use watcher::{FileChange, FileWatcher};

/// An engine that turns options into output.
///
/// Build errors belong in [`BuildResult::errors`]. `Err` is reserved for
/// failures to run the engine at all.
#[async_trait]
pub trait Bundler: Send + Sync {
    async fn bundle(&self, options: &BuildOptions) -> Result<BuildResult>;
}

/// Run one pass: plugin setup, start hooks, the engine, end hooks.
pub(crate) async fn run_pass(engine: &dyn Bundler, options: &BuildOptions) -> Result<BuildResult> {
    let mut options = options.clone();
    let plugins = options.plugins.clone();

    for plugin in &plugins {
        plugin.setup(&mut options);
    }

    let mut start_errors = Vec::new();
    for plugin in &plugins {
        for message in plugin.on_start(&options).await {
            start_errors.push(match message.plugin_name {
                Some(_) => message,
                None => message.with_plugin(plugin.name()),
            });
        }
    }

    let mut result = if start_errors.is_empty() {
        engine.bundle(&options).await?
    } else {
        BuildResult::failed(start_errors)
    };

    for plugin in &plugins {
        plugin.on_end(&mut result).await?;
    }

    Ok(result)
}

/// Run a single pass.
///
/// # Errors
///
/// Returns [`Error::BuildFailed`] when the pass reported errors, plus any
/// error from the engine or a plugin hook.
pub async fn build(engine: &dyn Bundler, options: &BuildOptions) -> Result<BuildResult> {
    let result = run_pass(engine, options).await?;
    if !result.errors.is_empty() {
        return Err(Error::BuildFailed {
            errors: result.errors,
        });
    }
    Ok(result)
}

/// Create a reusable context. `watch_root` is the directory watched for changes.
pub fn context(
    engine: Arc<dyn Bundler>,
    options: BuildOptions,
    watch_root: impl Into<PathBuf>,
) -> BuildContext {
    BuildContext::new(engine, options, watch_root.into())
}
