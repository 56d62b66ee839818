//! # azf-bundler
//!
//! Packages Azure Functions projects for deployment using esbuild.
//!
//! The crate does not bundle anything itself. It finds the function entry
//! points, merges the configured options over sensible defaults for Node ESM
//! output, injects optional compatibility shims, hands everything to an
//! engine implementing [`bundler::Bundler`] and writes the results to disk.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use azf_bundler::{BuildConfig, load_config, parse_build_config};
//!
//! # async fn run() -> azf_bundler::Result<()> {
//! let raw = load_config("azf.config.json").await?;
//! let config: BuildConfig = parse_build_config(&raw)?;
//! azf_bundler::build(config).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Watch mode
//!
//! ```rust,no_run
//! use azf_bundler::{BuildConfig, WatchConfig};
//!
//! # async fn run() -> azf_bundler::Result<()> {
//! let config = WatchConfig::new(BuildConfig::new("./functions"))
//!     .with_on_rebuild(|result| println!("{} error(s)", result.errors.len()));
//! let handle = azf_bundler::watch(config).await?;
//! handle.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod bundler;
pub mod config;
pub mod error;
pub mod fs;
pub mod logger;
pub mod plugins;
pub mod shims;

pub use builder::{Orchestrator, build, watch};
pub use bundler::{BuildOptions, BuildResult, Bundler, EsbuildCli, Message, OutputFile, WatchHandle};
pub use config::{
    AdvancedOptions, BuildConfig, LogLevel, WatchConfig, load_config, parse_build_config,
    parse_watch_config,
};
pub use error::{Error, InvalidConfigError, Result};
pub use logger::{ConsoleSink, LogSink, Logger, MemorySink};
pub use shims::{DIRNAME_SHIM, REQUIRE_SHIM, Shim, build_shim_text};
