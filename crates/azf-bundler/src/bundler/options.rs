//! Bundler-facing build options and the layered merge that produces them.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::plugins::SharedPlugin;

/// Entry modules handed to the bundler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryPoints {
    /// Plain list; output names derive from the input names.
    List(Vec<PathBuf>),
    /// Output name to input path.
    Named(IndexMap<String, PathBuf>),
}

impl Default for EntryPoints {
    fn default() -> Self {
        EntryPoints::List(Vec::new())
    }
}

impl EntryPoints {
    pub fn len(&self) -> usize {
        match self {
            EntryPoints::List(list) => list.len(),
            EntryPoints::Named(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The only entry of a one-element list. Named mappings never qualify.
    pub fn single(&self) -> Option<&Path> {
        match self {
            EntryPoints::List(list) if list.len() == 1 => list.first().map(PathBuf::as_path),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Esm,
    Cjs,
    Iife,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Esm => "esm",
            Format::Cjs => "cjs",
            Format::Iife => "iife",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Node,
    Browser,
    Neutral,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Node => "node",
            Platform::Browser => "browser",
            Platform::Neutral => "neutral",
        }
    }
}

/// Source map mode. Accepts `true`/`false` or one of the mode names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SourceMapRepr", into = "SourceMapRepr")]
pub enum SourceMap {
    #[default]
    Off,
    Linked,
    Inline,
    External,
    Both,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum SourceMapRepr {
    Flag(bool),
    Mode(String),
}

impl TryFrom<SourceMapRepr> for SourceMap {
    type Error = String;

    fn try_from(repr: SourceMapRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            SourceMapRepr::Flag(false) => Ok(SourceMap::Off),
            SourceMapRepr::Flag(true) => Ok(SourceMap::Linked),
            SourceMapRepr::Mode(mode) => match mode.as_str() {
                "linked" => Ok(SourceMap::Linked),
                "inline" => Ok(SourceMap::Inline),
                "external" => Ok(SourceMap::External),
                "both" => Ok(SourceMap::Both),
                other => Err(format!("unknown sourcemap mode '{other}'")),
            },
        }
    }
}

impl From<SourceMap> for SourceMapRepr {
    fn from(mode: SourceMap) -> Self {
        match mode {
            SourceMap::Off => SourceMapRepr::Flag(false),
            SourceMap::Linked => SourceMapRepr::Flag(true),
            SourceMap::Inline => SourceMapRepr::Mode("inline".to_string()),
            SourceMap::External => SourceMapRepr::Mode("external".to_string()),
            SourceMap::Both => SourceMapRepr::Mode("both".to_string()),
        }
    }
}

/// Options for a single bundler invocation.
///
/// Known options are typed. Anything else the user passes through
/// `bundlerOptions` lands in `extra` and is forwarded as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildOptions {
    pub entry_points: EntryPoints,
    pub bundle: bool,
    pub format: Format,
    pub minify: bool,
    pub sourcemap: SourceMap,
    pub splitting: bool,
    pub platform: Platform,
    pub outdir: PathBuf,
    pub out_extension: IndexMap<String, String>,
    #[serde(deserialize_with = "one_or_many")]
    pub target: Vec<String>,
    /// Let the bundler write files itself instead of returning them.
    pub write: bool,
    #[serde(skip)]
    pub plugins: Vec<SharedPlugin>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            entry_points: EntryPoints::default(),
            bundle: true,
            format: Format::Esm,
            minify: true,
            sourcemap: SourceMap::Off,
            splitting: true,
            platform: Platform::Node,
            outdir: PathBuf::from("dist"),
            out_extension: IndexMap::from([(".js".to_string(), ".mjs".to_string())]),
            target: vec!["node14".to_string()],
            write: false,
            plugins: Vec::new(),
            extra: Map::new(),
        }
    }
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(target) => vec![target],
        OneOrMany::Many(targets) => targets,
    })
}

/// Keys that only make sense programmatically and are dropped from user options.
const PROGRAMMATIC_KEYS: [&str; 1] = ["plugins"];

/// Layer user options over the defaults.
///
/// The merge is shallow and key-wise: a user key replaces the default value
/// for that key entirely. Entry points and plugins are set by the caller
/// afterwards, so they always win over both layers.
///
/// # Errors
///
/// Returns [`Error::InvalidBundlerOptions`] when a known option has the wrong
/// shape (e.g. `"format": 3`).
pub fn merge_options(user: Option<&Map<String, Value>>) -> Result<BuildOptions> {
    let mut layered = match serde_json::to_value(BuildOptions::default())
        .map_err(Error::InvalidBundlerOptions)?
    {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    for (key, value) in user.into_iter().flatten() {
        if PROGRAMMATIC_KEYS.contains(&key.as_str()) {
            tracing::warn!("ignoring '{key}' in bundlerOptions; register plugins programmatically");
            continue;
        }
        layered.insert(key.clone(), value.clone());
    }

    serde_json::from_value(Value::Object(layered)).map_err(Error::InvalidBundlerOptions)
}
