use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::Plugin;
use crate::bundler::{BuildOptions, BuildResult};
use crate::config::OnRebuild;
use crate::error::Result;
use crate::fs::{FileSystem, write_output_files};
use crate::logger::Logger;

/// Persists the output of every watch pass and reports it.
///
/// A failed pass is logged and nothing is written, leaving the previous
/// output on disk. The user callback runs after either outcome.
pub struct RebuildPlugin {
    on_rebuild: Option<OnRebuild>,
    logger: Logger,
    fs: Arc<dyn FileSystem>,
}

impl RebuildPlugin {
    pub const NAME: &'static str = "on-rebuild";

    pub fn new(on_rebuild: Option<OnRebuild>, logger: Logger, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            on_rebuild,
            logger,
            fs,
        }
    }
}

impl fmt::Debug for RebuildPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RebuildPlugin")
            .field("has_callback", &self.on_rebuild.is_some())
            .field("logger", &self.logger)
            .finish()
    }
}

#[async_trait]
impl Plugin for RebuildPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn setup(&self, options: &mut BuildOptions) {
        options.write = false;
    }

    async fn on_end(&self, result: &mut BuildResult) -> Result<()> {
        let written = if result.is_success() {
            let files = result.outputs();
            let written = write_output_files(self.fs.as_ref(), files).await;
            if written.is_ok() {
                tracing::debug!(files = files.len(), "rebuild output written");
                self.logger.info("Rebuild succeeded");
            }
            written
        } else {
            self.logger.error("Rebuild failed");
            Ok(())
        };

        if let Some(callback) = &self.on_rebuild {
            callback(&*result);
        }

        written
    }
}
