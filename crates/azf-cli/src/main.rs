//! azf-bundle - package Azure Functions projects with esbuild.
//!
//! Parses arguments, sets up diagnostics and reports failures through miette.

use azf_cli::{cli, commands, logger};
use clap::Parser;
use miette::{MietteHandlerOpts, Result};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    logger::init_logger(args.verbose, args.no_color);

    let color = !args.no_color && logger::should_use_colors();
    miette::set_hook(Box::new(move |_| {
        Box::new(MietteHandlerOpts::new().color(color).wrap_lines(false).build())
    }))?;

    commands::execute(args).await.map_err(miette::Report::new)
}
