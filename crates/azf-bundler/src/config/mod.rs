//! Configuration model.
//!
//! A config file is JSON with camelCase keys:
//!
//! ```json
//! {
//!   "project": "./functions",
//!   "exclude": ["legacy"],
//!   "clean": true,
//!   "logLevel": "info",
//!   "bundlerOptions": { "outdir": "dist", "sourcemap": true },
//!   "advancedOptions": { "enableDirnameShim": true }
//! }
//! ```
//!
//! Raw values go through [`validate`] first, which reports every problem at
//! once; only a clean value is converted into [`BuildConfig`].

mod loading;
mod log_level;
mod validation;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::bundler::BuildResult;
use crate::error::InvalidConfigError;
use crate::plugins::SharedPlugin;

pub use loading::load_config;
pub use log_level::LogLevel;
pub use validation::{ValueKind, Violation, ViolationKind, validate};

/// Callback invoked with the raw result of every pass of a watch context.
pub type OnRebuild = Arc<dyn Fn(&BuildResult) + Send + Sync>;

/// Validated configuration for a one-shot build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfig {
    /// Project root; entry points and discovery are relative to it.
    pub project: PathBuf,

    /// Explicit entry points, relative to `project`. Disables discovery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_points: Option<Vec<String>>,

    /// Glob patterns excluded from discovery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,

    /// Options passed through to the bundler, layered over the defaults.
    #[serde(
        default,
        alias = "esbuildOptions",
        skip_serializing_if = "Option::is_none"
    )]
    pub bundler_options: Option<Map<String, Value>>,

    /// Remove the output directory before building.
    #[serde(default)]
    pub clean: bool,

    #[serde(default)]
    pub log_level: LogLevel,

    #[serde(default)]
    pub advanced_options: AdvancedOptions,

    /// Extra bundler plugins, run before the built-in ones.
    #[serde(skip)]
    pub plugins: Vec<SharedPlugin>,
}

/// Opt-in compatibility shims for ESM output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedOptions {
    /// Define `__dirname` and `__filename` in every output file.
    #[serde(default)]
    pub enable_dirname_shim: bool,

    /// Define a CommonJS-style `require` in every output file.
    #[serde(default)]
    pub enable_require_shim: bool,
}

impl BuildConfig {
    /// Configuration with defaults for everything but the project root.
    pub fn new(project: impl Into<PathBuf>) -> Self {
        Self {
            project: project.into(),
            ..Self::default()
        }
    }

    pub fn with_entry_points<I, S>(mut self, entry_points: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entry_points = Some(entry_points.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_exclude<I, S>(mut self, exclude: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = Some(exclude.into_iter().map(Into::into).collect());
        self
    }

    /// Set a single bundler option, e.g. `("outdir", json!("out"))`.
    pub fn with_bundler_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.bundler_options
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }

    pub fn with_clean(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    pub fn with_advanced_options(mut self, advanced: AdvancedOptions) -> Self {
        self.advanced_options = advanced;
        self
    }

    pub fn with_plugin(mut self, plugin: SharedPlugin) -> Self {
        self.plugins.push(plugin);
        self
    }
}

/// Configuration for watch mode.
#[derive(Clone, Default)]
pub struct WatchConfig {
    pub build: BuildConfig,
    pub on_rebuild: Option<OnRebuild>,
}

impl WatchConfig {
    pub fn new(build: BuildConfig) -> Self {
        Self {
            build,
            on_rebuild: None,
        }
    }

    /// Register a callback run after every build pass, successful or not.
    pub fn with_on_rebuild<F>(mut self, callback: F) -> Self
    where
        F: Fn(&BuildResult) + Send + Sync + 'static,
    {
        self.on_rebuild = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for WatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchConfig")
            .field("build", &self.build)
            .field("on_rebuild", &self.on_rebuild.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

/// Validate a raw value as build configuration.
///
/// # Errors
///
/// Returns [`InvalidConfigError`] listing every violated field.
pub fn parse_build_config(raw: &Value) -> Result<BuildConfig, InvalidConfigError> {
    validate(raw).map_err(InvalidConfigError::new)
}

/// Validate a raw value as watch configuration.
///
/// The rebuild callback cannot come from JSON; attach it afterwards with
/// [`WatchConfig::with_on_rebuild`].
///
/// # Errors
///
/// Returns [`InvalidConfigError`] listing every violated field.
pub fn parse_watch_config(raw: &Value) -> Result<WatchConfig, InvalidConfigError> {
    parse_build_config(raw).map(WatchConfig::new)
}
