//! Build orchestration.
//!
//! [`Orchestrator`] turns a validated configuration into bundler options and
//! runs them once ([`Orchestrator::build`]) or under a watch context
//! ([`Orchestrator::watch`]). Both modes share the same preparation:
//!
//! 1. the project root must be a directory
//! 2. entry points are resolved, or discovered by looking for `index.ts` files
//! 3. defaults, user options and computed values are layered
//! 4. plugins are assembled (user plugins, then the shim plugin if needed)
//! 5. the output directory is optionally cleaned
//! 6. a single entry point gets its own subdirectory of the output directory

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use path_clean::PathClean;

use crate::bundler::{
    self, BuildOptions, BuildResult, Bundler, EntryPoints, EsbuildCli, WatchHandle, merge_options,
};
use crate::config::{BuildConfig, LogLevel, WatchConfig};
use crate::error::{Error, Result};
use crate::fs::{FileSystem, GlobOptions, NativeFs, write_output_files};
use crate::logger::{ConsoleSink, LogSink, Logger};
use crate::plugins::{RebuildPlugin, SharedPlugin, ShimPlugin};
use crate::shims::{DIRNAME_SHIM, REQUIRE_SHIM, Shim};

/// Pattern used to discover entry points when none are configured.
pub const ENTRY_POINT_PATTERN: &str = "**/index.ts";

/// Always excluded from entry point discovery.
pub const NODE_MODULES_PATTERN: &str = "**/node_modules/**";

/// Drives builds against a bundler engine and a file system.
#[derive(Clone)]
pub struct Orchestrator {
    bundler: Arc<dyn Bundler>,
    fs: Arc<dyn FileSystem>,
    sink: Arc<dyn LogSink>,
}

impl Orchestrator {
    /// Orchestrator using the real file system and logging to the terminal.
    pub fn new(bundler: Arc<dyn Bundler>) -> Self {
        Self {
            bundler,
            fs: Arc::new(NativeFs),
            sink: Arc::new(ConsoleSink::default()),
        }
    }

    pub fn with_fs(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    fn logger(&self, level: LogLevel) -> Logger {
        Logger::new(level, self.sink.clone())
    }

    /// Build once and write the output to disk.
    ///
    /// # Errors
    ///
    /// - [`Error::ProjectDirectoryNotFound`] if `project` is not a directory
    /// - [`Error::NoEntryPoints`] if no entry points were configured or found
    /// - [`Error::BuildFailed`] if the bundler reported errors
    /// - [`Error::FileSystem`] if cleaning or writing output fails
    pub async fn build(&self, config: BuildConfig) -> Result<BuildResult> {
        let started = Instant::now();
        let logger = self.logger(config.log_level);

        let options = self.prepare(&config, &logger, Vec::new()).await?;
        let result = bundler::build(self.bundler.as_ref(), &options).await?;

        for warning in &result.warnings {
            logger.warn(warning.to_string());
        }

        write_output_files(self.fs.as_ref(), result.outputs()).await?;

        logger.info(format!(
            "Build complete. Took {}ms",
            started.elapsed().as_millis()
        ));
        Ok(result)
    }

    /// Build, then keep rebuilding whenever the project changes.
    ///
    /// Each pass writes its output and reports through the logger and the
    /// configured callback. A failing pass does not stop watching.
    ///
    /// # Errors
    ///
    /// Preparation errors as for [`Orchestrator::build`], plus
    /// [`Error::Watch`] if the file watcher cannot start.
    pub async fn watch(&self, config: WatchConfig) -> Result<WatchHandle> {
        let WatchConfig { build, on_rebuild } = config;
        let logger = self.logger(build.log_level);

        let rebuild: SharedPlugin = Arc::new(RebuildPlugin::new(
            on_rebuild,
            logger.clone(),
            self.fs.clone(),
        ));
        let options = self.prepare(&build, &logger, vec![rebuild]).await?;

        let root = resolve_path(&build.project, ".");
        let handle = bundler::context(self.bundler.clone(), options, root)
            .watch()
            .await?;
        logger.verbose(format!("Watching {} for changes", build.project.display()));
        Ok(handle)
    }

    /// Resolve entry points and options shared by both modes.
    pub async fn prepare(
        &self,
        config: &BuildConfig,
        logger: &Logger,
        trailing_plugins: Vec<SharedPlugin>,
    ) -> Result<BuildOptions> {
        let project = &config.project;
        logger.verbose(format!("Project root: {}", project.display()));

        if !self.fs.is_dir(project).await {
            return Err(Error::ProjectDirectoryNotFound(project.clone()));
        }

        let entries = self.resolve_entry_points(config, logger).await?;
        if entries.is_empty() {
            return Err(Error::NoEntryPoints(project.clone()));
        }
        logger.verbose(format!("Building {} entry point(s)", entries.len()));

        let mut options = merge_options(config.bundler_options.as_ref())?;
        options.entry_points = EntryPoints::List(entries);
        options.plugins = assemble_plugins(config, trailing_plugins);

        if config.clean {
            logger.verbose(format!("Cleaning {}", options.outdir.display()));
            self.fs.remove_dir_all(&options.outdir).await?;
        }

        nest_single_entry_outdir(&mut options);
        Ok(options)
    }

    async fn resolve_entry_points(&self, config: &BuildConfig, logger: &Logger) -> Result<Vec<PathBuf>> {
        if let Some(entries) = &config.entry_points {
            return Ok(entries
                .iter()
                .map(|entry| resolve_path(&config.project, entry))
                .collect());
        }

        logger.verbose("No entry points specified, looking for index.ts files");

        let mut ignore = vec![NODE_MODULES_PATTERN.to_string()];
        ignore.extend(config.exclude.iter().flatten().cloned());

        let options = GlobOptions {
            cwd: config.project.clone(),
            absolute: true,
            ignore,
        };
        self.fs.glob(ENTRY_POINT_PATTERN, &options).await
    }
}

/// Run a one-shot build with esbuild and the real file system.
pub async fn build(config: BuildConfig) -> Result<BuildResult> {
    Orchestrator::new(Arc::new(EsbuildCli::new().with_project_dir(&config.project)))
        .build(config)
        .await
}

/// Start watch mode with esbuild and the real file system.
pub async fn watch(config: WatchConfig) -> Result<WatchHandle> {
    Orchestrator::new(Arc::new(EsbuildCli::new().with_project_dir(&config.build.project)))
        .watch(config)
        .await
}

/// User plugins first, then the shim plugin when any shim is enabled, then `trailing`.
pub fn assemble_plugins(config: &BuildConfig, trailing: Vec<SharedPlugin>) -> Vec<SharedPlugin> {
    let mut plugins = config.plugins.clone();

    let mut shims: Vec<&Shim> = Vec::new();
    if config.advanced_options.enable_dirname_shim {
        shims.push(&DIRNAME_SHIM);
    }
    if config.advanced_options.enable_require_shim {
        shims.push(&REQUIRE_SHIM);
    }
    if !shims.is_empty() {
        plugins.push(Arc::new(ShimPlugin::new(&shims)));
    }

    plugins.extend(trailing);
    plugins
}

/// With exactly one listed entry point, output goes to
/// `outdir/<name of the entry's directory>` so the function keeps its folder.
pub fn nest_single_entry_outdir(options: &mut BuildOptions) {
    let Some(dir_name) = options
        .entry_points
        .single()
        .and_then(Path::parent)
        .and_then(Path::file_name)
        .map(OsStr::to_os_string)
    else {
        return;
    };
    options.outdir = options.outdir.join(dir_name);
}

/// Resolve `entry` against `project` into a clean absolute path.
pub fn resolve_path(project: &Path, entry: &str) -> PathBuf {
    let joined = project.join(entry);
    std::path::absolute(&joined).unwrap_or(joined).clean()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdvancedOptions;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_single_entry_nests_outdir() {
        let mut options = BuildOptions {
            outdir: PathBuf::from("out"),
            entry_points: EntryPoints::List(vec![PathBuf::from("proj/func1/index.ts")]),
            ..BuildOptions::default()
        };

        nest_single_entry_outdir(&mut options);
        assert_eq!(options.outdir, PathBuf::from("out/func1"));
    }

    #[test]
    fn test_multiple_entries_keep_outdir() {
        let mut options = BuildOptions {
            outdir: PathBuf::from("out"),
            entry_points: EntryPoints::List(vec![
                PathBuf::from("proj/a/index.ts"),
                PathBuf::from("proj/b/index.ts"),
            ]),
            ..BuildOptions::default()
        };

        nest_single_entry_outdir(&mut options);
        assert_eq!(options.outdir, PathBuf::from("out"));
    }

    #[test]
    fn test_named_entry_is_exempt() {
        let mut options = BuildOptions {
            outdir: PathBuf::from("out"),
            entry_points: EntryPoints::Named(IndexMap::from([(
                "api".to_string(),
                PathBuf::from("proj/api/index.ts"),
            )])),
            ..BuildOptions::default()
        };

        nest_single_entry_outdir(&mut options);
        assert_eq!(options.outdir, PathBuf::from("out"));
    }

    #[test]
    fn test_resolve_path_is_absolute_and_clean() {
        let project = Path::new("/srv/app");
        assert_eq!(
            resolve_path(project, "./a/../b/index.ts"),
            PathBuf::from("/srv/app/b/index.ts")
        );
    }

    #[test]
    fn test_no_shims_no_shim_plugin() {
        let plugins = assemble_plugins(&BuildConfig::new("p"), Vec::new());
        assert!(plugins.is_empty());
    }

    #[test]
    fn test_both_shims_share_one_plugin_dirname_first() {
        let config = BuildConfig::new("p").with_advanced_options(AdvancedOptions {
            enable_dirname_shim: true,
            enable_require_shim: true,
        });

        let plugins = assemble_plugins(&config, Vec::new());
        assert_eq!(plugins.len(), 1);
        assert_eq!(plugins[0].name(), ShimPlugin::NAME);

        let expected = ShimPlugin::new(&[&DIRNAME_SHIM, &REQUIRE_SHIM]);
        assert_eq!(format!("{:?}", plugins[0]), format!("{expected:?}"));
    }

    #[test]
    fn test_user_plugins_come_first() {
        let user = Arc::new(ShimPlugin::new(&[]));
        let config = BuildConfig::new("p")
            .with_plugin(user)
            .with_advanced_options(AdvancedOptions {
                enable_dirname_shim: false,
                enable_require_shim: true,
            });
        let trailing: SharedPlugin = Arc::new(ShimPlugin::new(&[&DIRNAME_SHIM]));

        let plugins = assemble_plugins(&config, vec![trailing]);
        assert_eq!(plugins.len(), 3);
        assert_eq!(format!("{:?}", plugins[0]), format!("{:?}", ShimPlugin::new(&[])));
        assert_eq!(
            format!("{:?}", plugins[1]),
            format!("{:?}", ShimPlugin::new(&[&REQUIRE_SHIM]))
        );
    }
}
