use async_trait::async_trait;

use super::Plugin;
use crate::bundler::{BuildOptions, BuildResult};
use crate::error::Result;
use crate::shims::{Shim, build_shim_text};

/// Prepends shim code to every generated file except source maps.
///
/// The text is rendered once at construction. Source map line mappings are
/// not adjusted for the added lines.
#[derive(Debug, Clone)]
pub struct ShimPlugin {
    text: String,
}

impl ShimPlugin {
    pub const NAME: &'static str = "shim";

    pub fn new(shims: &[&Shim]) -> Self {
        Self {
            text: build_shim_text(shims),
        }
    }

    /// The rendered shim block.
    pub fn text(&self) -> &str {
        &self.text
    }
}

#[async_trait]
impl Plugin for ShimPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn setup(&self, options: &mut BuildOptions) {
        options.write = false;
    }

    async fn on_end(&self, result: &mut BuildResult) -> Result<()> {
        for file in result.output_files.iter_mut().flatten() {
            if file.is_source_map() {
                continue;
            }
            file.text = format!("{}\n{}", self.text, file.text);
        }
        Ok(())
    }
}
