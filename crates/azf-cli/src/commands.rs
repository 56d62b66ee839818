//! Command execution.

use std::sync::Arc;

use azf_bundler::{
    ConsoleSink, EsbuildCli, Orchestrator, Result, WatchConfig, load_config, parse_build_config,
};

use crate::cli::Cli;
use crate::logger::should_use_colors;

/// Load the config and run a build, or watch until Ctrl+C.
pub async fn execute(args: Cli) -> Result<()> {
    let raw = load_config(&args.config).await?;
    let config = parse_build_config(&raw)?;

    let mut engine = EsbuildCli::new().with_project_dir(&config.project);
    if let Some(program) = args.esbuild {
        engine = engine.with_program(program);
    }

    let color = !args.no_color && should_use_colors();
    let orchestrator =
        Orchestrator::new(Arc::new(engine)).with_log_sink(Arc::new(ConsoleSink::new(color)));

    if args.watch {
        watch(&orchestrator, WatchConfig::new(config)).await
    } else {
        orchestrator.build(config).await?;
        Ok(())
    }
}

async fn watch(orchestrator: &Orchestrator, config: WatchConfig) -> Result<()> {
    let mut handle = orchestrator.watch(config).await?;

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(err) = signal {
                tracing::warn!("unable to listen for Ctrl+C: {err}");
            }
        }
        _ = handle.stopped() => {}
    }

    tracing::debug!("stopping watch mode");
    handle.stop().await;
    Ok(())
}
