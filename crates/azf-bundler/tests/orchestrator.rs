//! Integration tests for build preparation and both run modes.
//!
//! The bundler engine is replaced by a stub that records the options it was
//! called with; the file system is the real one wrapped to record calls.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use azf_bundler::bundler::{BuildOptions, BuildResult, Bundler, EntryPoints, Message, OutputFile};
use azf_bundler::fs::{FileSystem, GlobOptions, NativeFs};
use azf_bundler::plugins::ShimPlugin;
use azf_bundler::{
    AdvancedOptions, BuildConfig, Error, LogLevel, MemorySink, Orchestrator, REQUIRE_SHIM,
    Result, WatchConfig,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

#[derive(Default)]
struct StubBundler {
    calls: Mutex<Vec<BuildOptions>>,
    errors: Vec<Message>,
    no_outputs: bool,
}

impl StubBundler {
    fn without_outputs() -> Self {
        Self {
            no_outputs: true,
            ..Self::default()
        }
    }

    fn failing(text: &str) -> Self {
        Self {
            errors: vec![Message::new(text)],
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<BuildOptions> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Bundler for StubBundler {
    async fn bundle(&self, options: &BuildOptions) -> Result<BuildResult> {
        self.calls.lock().unwrap().push(options.clone());
        if !self.errors.is_empty() {
            return Ok(BuildResult::failed(self.errors.clone()));
        }
        if self.no_outputs {
            return Ok(BuildResult::with_outputs(Vec::new()));
        }
        let files = match &options.entry_points {
            EntryPoints::List(entries) => entries
                .iter()
                .map(|entry| {
                    let dir = entry.parent().and_then(Path::file_name).unwrap_or_default();
                    OutputFile::new(options.outdir.join(dir).join("index.mjs"), "export {};")
                })
                .collect(),
            EntryPoints::Named(_) => Vec::new(),
        };
        Ok(BuildResult::with_outputs(files))
    }
}

#[derive(Default)]
struct RecordingFs {
    globs: Mutex<Vec<(String, GlobOptions)>>,
    removed: Mutex<Vec<PathBuf>>,
    writes: Mutex<Vec<PathBuf>>,
    fixed_glob: Option<Vec<PathBuf>>,
}

impl RecordingFs {
    fn returning(paths: Vec<PathBuf>) -> Self {
        Self {
            fixed_glob: Some(paths),
            ..Self::default()
        }
    }
}

#[async_trait]
impl FileSystem for RecordingFs {
    async fn is_dir(&self, path: &Path) -> bool {
        NativeFs.is_dir(path).await
    }

    async fn glob(&self, pattern: &str, options: &GlobOptions) -> Result<Vec<PathBuf>> {
        self.globs
            .lock()
            .unwrap()
            .push((pattern.to_string(), options.clone()));
        match &self.fixed_glob {
            Some(paths) => Ok(paths.clone()),
            None => NativeFs.glob(pattern, options).await,
        }
    }

    async fn remove_dir_all(&self, path: &Path) -> Result<()> {
        self.removed.lock().unwrap().push(path.to_path_buf());
        NativeFs.remove_dir_all(path).await
    }

    async fn write_file(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.writes.lock().unwrap().push(path.to_path_buf());
        NativeFs.write_file(path, contents).await
    }
}

struct Harness {
    bundler: Arc<StubBundler>,
    fs: Arc<RecordingFs>,
    sink: Arc<MemorySink>,
    orchestrator: Orchestrator,
}

fn harness(bundler: StubBundler, fs: RecordingFs) -> Harness {
    let bundler = Arc::new(bundler);
    let fs = Arc::new(fs);
    let sink = Arc::new(MemorySink::new());
    let orchestrator = Orchestrator::new(bundler.clone())
        .with_fs(fs.clone())
        .with_log_sink(sink.clone());
    Harness {
        bundler,
        fs,
        sink,
        orchestrator,
    }
}

fn touch(root: &Path, rel: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, "export {};").unwrap();
}

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "proj/a/index.ts");
    touch(dir.path(), "proj/b/index.ts");
    dir
}

#[tokio::test]
async fn test_explicit_entry_points_skip_discovery() {
    let dir = project();
    let proj = dir.path().join("proj");
    let h = harness(StubBundler::default(), RecordingFs::default());

    let config = BuildConfig::new(&proj)
        .with_entry_points(["a/index.ts", "b/index.ts"])
        .with_bundler_option("outdir", json!(dir.path().join("out")));
    h.orchestrator.build(config).await.unwrap();

    assert!(h.fs.globs.lock().unwrap().is_empty());
    let calls = h.bundler.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].entry_points,
        EntryPoints::List(vec![proj.join("a/index.ts"), proj.join("b/index.ts")])
    );
}

#[tokio::test]
async fn test_discovery_passes_exclusions() {
    let dir = project();
    let proj = dir.path().join("proj");
    let h = harness(StubBundler::default(), RecordingFs::default());

    let config = BuildConfig::new(&proj)
        .with_exclude(["dirX"])
        .with_bundler_option("outdir", json!(dir.path().join("out")));
    h.orchestrator.build(config).await.unwrap();

    let globs = h.fs.globs.lock().unwrap().clone();
    assert_eq!(globs.len(), 1);
    assert_eq!(globs[0].0, "**/index.ts");
    assert_eq!(
        globs[0].1,
        GlobOptions {
            cwd: proj.clone(),
            absolute: true,
            ignore: vec!["**/node_modules/**".to_string(), "dirX".to_string()],
        }
    );
    assert_eq!(
        h.bundler.calls()[0].entry_points,
        EntryPoints::List(vec![proj.join("a/index.ts"), proj.join("b/index.ts")])
    );
}

#[tokio::test]
async fn test_empty_discovery_fails_before_bundling() {
    let dir = project();
    let proj = dir.path().join("proj");
    let h = harness(StubBundler::default(), RecordingFs::returning(Vec::new()));

    let err = h.orchestrator.build(BuildConfig::new(&proj)).await.unwrap_err();

    match err {
        Error::NoEntryPoints(path) => assert_eq!(path, proj),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(h.bundler.calls().is_empty());
}

#[tokio::test]
async fn test_empty_explicit_list_fails() {
    let dir = project();
    let h = harness(StubBundler::default(), RecordingFs::default());

    let config = BuildConfig::new(dir.path().join("proj")).with_entry_points(Vec::<String>::new());
    let err = h.orchestrator.build(config).await.unwrap_err();

    assert!(matches!(err, Error::NoEntryPoints(_)));
    assert!(h.bundler.calls().is_empty());
}

#[tokio::test]
async fn test_missing_project_directory() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope");
    let h = harness(StubBundler::default(), RecordingFs::default());

    let err = h.orchestrator.build(BuildConfig::new(&missing)).await.unwrap_err();

    assert!(matches!(err, Error::ProjectDirectoryNotFound(ref p) if *p == missing));
    assert!(h.fs.globs.lock().unwrap().is_empty());
    assert!(h.bundler.calls().is_empty());
}

#[tokio::test]
async fn test_clean_twice_succeeds() {
    let dir = project();
    let proj = dir.path().join("proj");
    let outdir = dir.path().join("out");
    touch(&outdir, "stale/index.mjs");
    let h = harness(StubBundler::default(), RecordingFs::default());

    let config = BuildConfig::new(&proj)
        .with_clean(true)
        .with_bundler_option("outdir", json!(outdir));

    h.orchestrator.build(config.clone()).await.unwrap();
    assert!(!outdir.join("stale/index.mjs").exists());

    std::fs::remove_dir_all(&outdir).unwrap();
    h.orchestrator.build(config).await.unwrap();

    assert_eq!(*h.fs.removed.lock().unwrap(), vec![outdir.clone(), outdir]);
}

#[tokio::test]
async fn test_single_entry_output_nested() {
    let dir = project();
    let proj = dir.path().join("proj");
    let outdir = dir.path().join("out");
    let h = harness(StubBundler::default(), RecordingFs::default());

    let config = BuildConfig::new(&proj)
        .with_entry_points(["a/index.ts"])
        .with_bundler_option("outdir", json!(outdir));
    h.orchestrator.build(config).await.unwrap();

    assert_eq!(h.bundler.calls()[0].outdir, outdir.join("a"));
}

#[tokio::test]
async fn test_build_logs_completion_once() {
    let dir = project();
    let proj = dir.path().join("proj");
    let h = harness(StubBundler::default(), RecordingFs::default());

    let config = BuildConfig::new(&proj)
        .with_log_level(LogLevel::Info)
        .with_bundler_option("outdir", json!(dir.path().join("out")));
    h.orchestrator.build(config).await.unwrap();

    let infos = h.sink.messages_at(LogLevel::Info);
    assert_eq!(infos.len(), 1);
    assert!(infos[0].contains("complete"));
    assert!(h.sink.messages_at(LogLevel::Verbose).is_empty());
}

#[tokio::test]
async fn test_build_without_outputs_logs_completion() {
    let dir = TempDir::new().unwrap();
    let proj = dir.path().join("proj");
    touch(&proj, "f/index.ts");
    let h = harness(StubBundler::without_outputs(), RecordingFs::default());

    let config = BuildConfig::new(&proj)
        .with_entry_points(["f/index.ts"])
        .with_log_level(LogLevel::Info);
    let result = h.orchestrator.build(config).await.unwrap();

    assert!(result.outputs().is_empty());
    let infos = h.sink.messages_at(LogLevel::Info);
    assert_eq!(infos.len(), 1);
    assert!(infos[0].contains("complete"));
    assert!(h.fs.writes.lock().unwrap().is_empty());
    assert!(h.fs.globs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_build_writes_outputs() {
    let dir = project();
    let proj = dir.path().join("proj");
    let outdir = dir.path().join("out");
    let h = harness(StubBundler::default(), RecordingFs::default());

    let config = BuildConfig::new(&proj)
        .with_advanced_options(AdvancedOptions {
            enable_dirname_shim: false,
            enable_require_shim: true,
        })
        .with_bundler_option("outdir", json!(outdir));
    h.orchestrator.build(config).await.unwrap();

    let written = std::fs::read_to_string(outdir.join("a/index.mjs")).unwrap();
    assert!(written.starts_with("import __azf_shim_import_MODULE from 'module';"));
    assert!(written.ends_with("\nexport {};"));
    assert_eq!(h.fs.writes.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_bundler_errors_are_fatal_in_build_mode() {
    let dir = project();
    let h = harness(StubBundler::failing("Could not resolve \"x\""), RecordingFs::default());

    let config = BuildConfig::new(dir.path().join("proj"))
        .with_log_level(LogLevel::Info)
        .with_bundler_option("outdir", json!(dir.path().join("out")));
    let err = h.orchestrator.build(config).await.unwrap_err();

    assert!(matches!(err, Error::BuildFailed { ref errors } if errors.len() == 1));
    assert!(h.fs.writes.lock().unwrap().is_empty());
    assert!(h.sink.messages_at(LogLevel::Info).is_empty());
}

#[tokio::test]
async fn test_invalid_bundler_options() {
    let dir = project();
    let h = harness(StubBundler::default(), RecordingFs::default());

    let config = BuildConfig::new(dir.path().join("proj")).with_bundler_option("format", json!(3));
    let err = h.orchestrator.build(config).await.unwrap_err();

    assert!(matches!(err, Error::InvalidBundlerOptions(_)));
    assert!(h.bundler.calls().is_empty());
}

#[tokio::test]
async fn test_user_options_layered_over_defaults() {
    let dir = project();
    let h = harness(StubBundler::default(), RecordingFs::default());

    let config = BuildConfig::new(dir.path().join("proj"))
        .with_bundler_option("outdir", json!(dir.path().join("out")))
        .with_bundler_option("minify", json!(false))
        .with_bundler_option("entryPoints", json!(["ignored.ts"]))
        .with_bundler_option("external", json!(["@azure/functions-core"]));
    h.orchestrator.build(config).await.unwrap();

    let options = &h.bundler.calls()[0];
    assert!(!options.minify);
    assert!(options.bundle);
    assert_eq!(options.entry_points.len(), 2);
    assert_eq!(options.extra.get("external"), Some(&json!(["@azure/functions-core"])));
}

#[tokio::test]
async fn test_discovered_single_entry_with_require_shim() {
    let dir = TempDir::new().unwrap();
    let proj = dir.path().join("proj");
    touch(&proj, "f/index.ts");
    let h = harness(StubBundler::default(), RecordingFs::default());

    let config = BuildConfig::new(&proj)
        .with_advanced_options(AdvancedOptions {
            enable_dirname_shim: false,
            enable_require_shim: true,
        })
        .with_bundler_option("outdir", json!(dir.path().join("out")));
    h.orchestrator.build(config).await.unwrap();

    let options = &h.bundler.calls()[0];
    assert_eq!(options.entry_points, EntryPoints::List(vec![proj.join("f/index.ts")]));
    assert_eq!(options.outdir, dir.path().join("out").join("f"));
    assert_eq!(options.plugins.len(), 1);
    assert_eq!(options.plugins[0].name(), ShimPlugin::NAME);
    assert_eq!(
        format!("{:?}", options.plugins[0]),
        format!("{:?}", ShimPlugin::new(&[&REQUIRE_SHIM]))
    );
}

#[tokio::test]
async fn test_watch_runs_initial_pass_and_reports() {
    let dir = project();
    let proj = dir.path().join("proj");
    let outdir = dir.path().join("out");
    let h = harness(StubBundler::default(), RecordingFs::default());

    let results = Arc::new(Mutex::new(Vec::new()));
    let seen = results.clone();
    let config = WatchConfig::new(
        BuildConfig::new(&proj)
            .with_log_level(LogLevel::Info)
            .with_bundler_option("outdir", json!(outdir)),
    )
    .with_on_rebuild(move |result| seen.lock().unwrap().push(result.clone()));

    let handle = h.orchestrator.watch(config).await.unwrap();

    assert_eq!(results.lock().unwrap().len(), 1);
    assert!(outdir.join("a/index.mjs").exists());
    assert_eq!(
        h.sink.messages_at(LogLevel::Info),
        vec!["Rebuild succeeded".to_string()]
    );

    let plugins = &h.bundler.calls()[0].plugins;
    assert_eq!(plugins.last().map(|p| p.name().to_string()).as_deref(), Some("on-rebuild"));

    tokio::time::timeout(Duration::from_secs(5), handle.stop())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_watch_survives_failed_initial_pass() {
    let dir = project();
    let h = harness(StubBundler::failing("broken"), RecordingFs::default());

    let results = Arc::new(Mutex::new(Vec::new()));
    let seen = results.clone();
    let config = WatchConfig::new(
        BuildConfig::new(dir.path().join("proj"))
            .with_bundler_option("outdir", json!(dir.path().join("out"))),
    )
    .with_on_rebuild(move |result| seen.lock().unwrap().push(result.errors.len()));

    let handle = h.orchestrator.watch(config).await.unwrap();

    assert_eq!(*results.lock().unwrap(), vec![1]);
    assert!(h.fs.writes.lock().unwrap().is_empty());
    assert_eq!(h.sink.messages_at(LogLevel::Error), vec!["Rebuild failed".to_string()]);

    handle.stop().await;
}

#[tokio::test]
async fn test_watch_rebuilds_after_editing_existing_entry() {
    let dir = project();
    let proj = dir.path().canonicalize().unwrap().join("proj");
    let h = harness(StubBundler::default(), RecordingFs::default());

    let passes = Arc::new(Mutex::new(0usize));
    let seen = passes.clone();
    let config = WatchConfig::new(
        BuildConfig::new(&proj).with_bundler_option("outdir", json!(dir.path().join("out"))),
    )
    .with_on_rebuild(move |_| *seen.lock().unwrap() += 1);

    let handle = h.orchestrator.watch(config).await.unwrap();
    assert_eq!(*passes.lock().unwrap(), 1);

    tokio::time::sleep(Duration::from_millis(200)).await;
    std::fs::write(proj.join("a/index.ts"), "export const a = 1;").unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while *passes.lock().unwrap() < 2 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(*passes.lock().unwrap() >= 2, "editing an entry did not trigger a rebuild");

    tokio::time::timeout(Duration::from_secs(5), handle.stop())
        .await
        .unwrap();
}
