use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Source position a message points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub file: String,
    pub line: u32,
    pub column: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_text: Option<String>,
}

/// An error or warning reported by the bundler or a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl Message {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            plugin_name: None,
            location: None,
        }
    }

    pub fn with_plugin(mut self, name: impl Into<String>) -> Self {
        self.plugin_name = Some(name.into());
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(loc) = &self.location {
            write!(f, "{}:{}:{}: ", loc.file, loc.line, loc.column)?;
        }
        if let Some(plugin) = &self.plugin_name {
            write!(f, "[plugin {plugin}] ")?;
        }
        f.write_str(&self.text)
    }
}

/// A generated file held in memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFile {
    /// Destination path of the file.
    pub path: PathBuf,
    pub text: String,
}

impl OutputFile {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }

    /// Source maps are left alone by text-rewriting plugins.
    pub fn is_source_map(&self) -> bool {
        has_map_extension(&self.path)
    }
}

fn has_map_extension(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "map")
}

/// Outcome of one bundler pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResult {
    pub errors: Vec<Message>,
    pub warnings: Vec<Message>,
    /// Present when the bundler did not write to disk itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_files: Option<Vec<OutputFile>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metafile: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mangle_cache: Option<Value>,
}

impl BuildResult {
    /// Result holding only output files.
    pub fn with_outputs(files: Vec<OutputFile>) -> Self {
        Self {
            output_files: Some(files),
            ..Self::default()
        }
    }

    /// Result holding only errors.
    pub fn failed(errors: Vec<Message>) -> Self {
        Self {
            errors,
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Output files, empty when the bundler wrote them itself.
    pub fn outputs(&self) -> &[OutputFile] {
        self.output_files.as_deref().unwrap_or_default()
    }
}
