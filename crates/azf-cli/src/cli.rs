//! Command-line interface definition.

use std::path::PathBuf;

use clap::Parser;

/// Config file looked up when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "azf.config.json";

/// azf-bundle - package Azure Functions projects with esbuild
#[derive(Parser, Debug)]
#[command(
    name = "azf-bundle",
    version,
    about = "Package Azure Functions projects with esbuild",
    long_about = "Discovers function entry points, bundles them with esbuild into Node ESM output\n\
                  and optionally injects __dirname / require shims. Use --watch to rebuild on change."
)]
pub struct Cli {
    /// Path to the JSON config file
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Rebuild whenever a file in the project changes
    #[arg(short, long)]
    pub watch: bool,

    /// esbuild executable to use instead of searching for one
    #[arg(long, value_name = "PATH", env = "AZF_ESBUILD_PATH")]
    pub esbuild: Option<PathBuf>,

    /// Show internal debug diagnostics
    #[arg(long)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["azf-bundle"]).unwrap();
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_FILE));
        assert!(!cli.watch);
    }

    #[test]
    fn test_short_flags() {
        let cli = Cli::try_parse_from(["azf-bundle", "-c", "custom.json", "-w"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("custom.json"));
        assert!(cli.watch);
    }

    #[test]
    fn test_long_flags() {
        let cli = Cli::try_parse_from([
            "azf-bundle",
            "--config",
            "custom.json",
            "--watch",
            "--esbuild",
            "/opt/esbuild",
            "--no-color",
        ])
        .unwrap();
        assert_eq!(cli.esbuild, Some(PathBuf::from("/opt/esbuild")));
        assert!(cli.no_color);
    }
}
