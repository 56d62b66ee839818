//! esbuild engine driven through its command line.
//!
//! Options are translated to CLI flags. When the caller wants files back in
//! memory (`write == false`), esbuild writes into a scratch directory and the
//! files are read back with their paths mapped onto the real output
//! directory. Diagnostics are parsed from esbuild's stderr.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use path_clean::PathClean;
use regex::Regex;
use serde_json::Value;
use tokio::process::Command;
use walkdir::WalkDir;
use which::which;

use super::{BuildOptions, BuildResult, Bundler, EntryPoints, Location, Message, OutputFile, SourceMap};
use crate::error::{Error, Result};

/// Environment variable pointing at the esbuild executable.
pub const ESBUILD_PATH_ENV: &str = "AZF_ESBUILD_PATH";

/// Marker of a source map embedded in a JavaScript output file.
const INLINE_MAP_PREFIX: &str = "//# sourceMappingURL=data:application/json;base64,";

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:✘|X|▲)\s+\[(ERROR|WARNING)\]\s+(?:\[plugin ([^\]]+)\]\s+)?(.*)$")
        .expect("diagnostic header regex")
});
static LOCATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s+(.+?):(\d+):(\d+):\s*$").expect("location regex"));
static SNIPPET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s+\d+\s+│\s?(.*)$").expect("snippet regex"));

/// Extra option keys that are handled separately or would break output parsing.
const RESERVED_KEYS: [&str; 5] = ["metafile", "logLevel", "color", "write", "mangleCache"];

/// Runs the `esbuild` executable.
#[derive(Debug, Clone, Default)]
pub struct EsbuildCli {
    program: Option<PathBuf>,
    project_dir: Option<PathBuf>,
}

impl EsbuildCli {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific executable instead of searching for one.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }

    /// Also look for a local install under `dir`, ahead of the working directory.
    pub fn with_project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project_dir = Some(dir.into());
        self
    }

    /// Find the executable to run.
    ///
    /// Checked in order: an explicit program, `AZF_ESBUILD_PATH`,
    /// `node_modules/.bin` in the project directory and then in the working
    /// directory, then `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EsbuildNotFound`] if none of them yields an executable.
    pub fn locate(&self) -> Result<PathBuf> {
        if let Some(program) = &self.program {
            return Ok(program.clone());
        }
        if let Some(program) = std::env::var_os(ESBUILD_PATH_ENV) {
            return Ok(PathBuf::from(program));
        }

        let dirs = self.project_dir.as_deref().into_iter().chain([Path::new("")]);
        if let Some(local) = dirs.map(local_esbuild).find(|path| path.is_file()) {
            return Ok(local);
        }

        which("esbuild").map_err(|_| Error::EsbuildNotFound)
    }

    /// Command line arguments for one run.
    pub fn args(&self, options: &BuildOptions, outdir: &Path, metafile: Option<&Path>) -> Vec<String> {
        let mut args = Vec::new();

        match &options.entry_points {
            EntryPoints::List(entries) => {
                args.extend(entries.iter().map(|entry| entry.display().to_string()));
            }
            EntryPoints::Named(entries) => {
                args.extend(
                    entries
                        .iter()
                        .map(|(name, entry)| format!("{name}={}", entry.display())),
                );
            }
        }

        if options.bundle {
            args.push("--bundle".to_string());
        }
        args.push(format!("--format={}", options.format.as_str()));
        if options.minify {
            args.push("--minify".to_string());
        }
        match options.sourcemap {
            SourceMap::Off => {}
            SourceMap::Linked => args.push("--sourcemap".to_string()),
            SourceMap::Inline => args.push("--sourcemap=inline".to_string()),
            SourceMap::External => args.push("--sourcemap=external".to_string()),
            SourceMap::Both => args.push("--sourcemap=both".to_string()),
        }
        if options.splitting {
            args.push("--splitting".to_string());
        }
        args.push(format!("--platform={}", options.platform.as_str()));
        args.push(format!("--outdir={}", outdir.display()));
        for (from, to) in &options.out_extension {
            args.push(format!("--out-extension:{from}={to}"));
        }
        if !options.target.is_empty() {
            args.push(format!("--target={}", options.target.join(",")));
        }
        if let Some(metafile) = metafile {
            args.push(format!("--metafile={}", metafile.display()));
        }

        for (key, value) in &options.extra {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            args.extend(flags_for(key, value));
        }

        args.push("--log-level=warning".to_string());
        args.push("--color=false".to_string());
        args
    }
}

#[async_trait]
impl Bundler for EsbuildCli {
    async fn bundle(&self, options: &BuildOptions) -> Result<BuildResult> {
        let program = self.locate()?;
        let scratch = tempfile::TempDir::new().map_err(|err| Error::fs(std::env::temp_dir(), err))?;

        let outdir = absolute(&options.outdir);
        let staging = scratch.path().join("out");
        let esbuild_outdir = if options.write { &outdir } else { &staging };
        let metafile = wants_metafile(options).then(|| scratch.path().join("meta.json"));

        let args = self.args(options, esbuild_outdir, metafile.as_deref());
        tracing::debug!(program = %program.display(), ?args, "running esbuild");

        let output = Command::new(&program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| Error::Esbuild {
                program: program.clone(),
                source,
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        let (mut errors, warnings) = parse_diagnostics(&stderr);
        if !output.status.success() && errors.is_empty() {
            let text = match stderr.trim() {
                "" => format!("esbuild exited with {}", output.status),
                text => text.to_string(),
            };
            errors.push(Message::new(text));
        }

        let output_files = match (options.write, errors.is_empty()) {
            (true, _) => None,
            (false, true) => Some(read_outputs(&staging, &outdir).await?),
            (false, false) => Some(Vec::new()),
        };

        let metafile = match metafile {
            Some(path) if errors.is_empty() => read_metafile(&path).await,
            _ => None,
        };

        Ok(BuildResult {
            errors,
            warnings,
            output_files,
            metafile,
            mangle_cache: None,
        })
    }
}

fn local_esbuild(dir: &Path) -> PathBuf {
    dir.join("node_modules")
        .join(".bin")
        .join(if cfg!(windows) { "esbuild.cmd" } else { "esbuild" })
}

fn wants_metafile(options: &BuildOptions) -> bool {
    matches!(options.extra.get("metafile"), Some(Value::Bool(true)))
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Translate a pass-through option into flags.
///
/// `true` becomes `--key`, scalars `--key=value`, arrays repeat `--key:item`
/// and objects become `--key:name=value`. Keys are converted to kebab-case.
fn flags_for(key: &str, value: &Value) -> Vec<String> {
    let flag = kebab_case(key);
    match value {
        Value::Null => Vec::new(),
        Value::Bool(true) => vec![format!("--{flag}")],
        Value::Bool(false) => vec![format!("--{flag}=false")],
        Value::Number(n) => vec![format!("--{flag}={n}")],
        Value::String(s) => vec![format!("--{flag}={s}")],
        Value::Array(items) => items
            .iter()
            .map(|item| format!("--{flag}:{}", scalar(item)))
            .collect(),
        Value::Object(entries) => entries
            .iter()
            .map(|(name, item)| format!("--{flag}:{name}={}", scalar(item)))
            .collect(),
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn kebab_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            out.push('-');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

async fn read_outputs(staging: &Path, outdir: &Path) -> Result<Vec<OutputFile>> {
    if !staging.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(staging).sort_by_file_name() {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(staging).to_path_buf();
            Error::fs(path, std::io::Error::other(err))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(staging) else {
            continue;
        };

        let bytes = tokio::fs::read(entry.path())
            .await
            .map_err(|err| Error::fs(entry.path(), err))?;
        let mut text = String::from_utf8_lossy(&bytes).into_owned();
        let target = outdir.join(rel);

        // esbuild wrote source paths relative to the staging directory.
        if let (Some(from_dir), Some(to_dir)) = (entry.path().parent(), target.parent()) {
            let rebased = if rel.extension() == Some(OsStr::new("map")) {
                rebase_source_map(&text, from_dir, to_dir)
            } else {
                rebase_inline_map(&text, from_dir, to_dir)
            };
            if let Some(rebased) = rebased {
                text = rebased;
            }
        }

        files.push(OutputFile::new(target, text));
    }
    Ok(files)
}

/// Rewrite the relative `sources` of a source map found in `from_dir` so
/// they point at the same files when the map lives in `to_dir`.
///
/// Returns `None` when the map is unreadable or nothing needs to change.
fn rebase_source_map(map: &str, from_dir: &Path, to_dir: &Path) -> Option<String> {
    let mut value: Value = serde_json::from_str(map).ok()?;
    if value
        .get("sourceRoot")
        .and_then(Value::as_str)
        .is_some_and(|root| !root.is_empty())
    {
        return None;
    }

    let mut changed = false;
    for source in value.get_mut("sources")?.as_array_mut()? {
        let Some(rebased) = source
            .as_str()
            .and_then(|path| rebase_source(path, from_dir, to_dir))
        else {
            continue;
        };
        *source = Value::String(rebased);
        changed = true;
    }

    if !changed {
        return None;
    }
    serde_json::to_string(&value).ok()
}

fn rebase_source(source: &str, from_dir: &Path, to_dir: &Path) -> Option<String> {
    // URLs, namespaced and virtual modules stay as they are.
    if source.is_empty()
        || source.contains(':')
        || source.starts_with('<')
        || Path::new(source).is_absolute()
    {
        return None;
    }

    let target = from_dir.join(source).clean();
    let relative = pathdiff::diff_paths(&target, to_dir)?;
    let rebased = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    (rebased != source).then_some(rebased)
}

/// Same as [`rebase_source_map`] for a base64 map embedded in code.
fn rebase_inline_map(code: &str, from_dir: &Path, to_dir: &Path) -> Option<String> {
    let data_start = code.rfind(INLINE_MAP_PREFIX)? + INLINE_MAP_PREFIX.len();
    let data_end = code[data_start..]
        .find(char::is_whitespace)
        .map_or(code.len(), |end| data_start + end);

    let decoded = STANDARD.decode(&code[data_start..data_end]).ok()?;
    let map = String::from_utf8(decoded).ok()?;
    let rebased = rebase_source_map(&map, from_dir, to_dir)?;

    Some(format!(
        "{}{}{}",
        &code[..data_start],
        STANDARD.encode(rebased),
        &code[data_end..]
    ))
}

async fn read_metafile(path: &Path) -> Option<Value> {
    let contents = tokio::fs::read_to_string(path).await.ok()?;
    match serde_json::from_str(&contents) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!("ignoring unreadable esbuild metafile: {err}");
            None
        }
    }
}

/// Split esbuild's stderr into error and warning messages.
///
/// Recognises `✘ [ERROR] text` / `▲ [WARNING] text` headers (with an optional
/// `[plugin name]` prefix) and the `file:line:column:` location and source
/// line that follow them.
pub fn parse_diagnostics(stderr: &str) -> (Vec<Message>, Vec<Message>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut current: Option<(bool, Message)> = None;

    let mut flush = |current: &mut Option<(bool, Message)>| {
        if let Some((is_error, message)) = current.take() {
            if is_error {
                errors.push(message);
            } else {
                warnings.push(message);
            }
        }
    };

    for line in stderr.lines() {
        if let Some(caps) = HEADER_RE.captures(line) {
            flush(&mut current);
            let mut message = Message::new(caps[3].trim());
            if let Some(plugin) = caps.get(2) {
                message = message.with_plugin(plugin.as_str());
            }
            current = Some((&caps[1] == "ERROR", message));
            continue;
        }

        let Some((_, message)) = current.as_mut() else {
            continue;
        };

        match message.location.as_mut() {
            None => {
                if let Some(caps) = LOCATION_RE.captures(line) {
                    message.location = Some(Location {
                        file: caps[1].to_string(),
                        line: caps[2].parse().unwrap_or_default(),
                        column: caps[3].parse().unwrap_or_default(),
                        line_text: None,
                    });
                }
            }
            Some(loc) if loc.line_text.is_none() => {
                if let Some(caps) = SNIPPET_RE.captures(line) {
                    loc.line_text = Some(caps[1].to_string());
                }
            }
            Some(_) => {}
        }
    }
    flush(&mut current);

    (errors, warnings)
}
