use clap::Parser;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

/// Default configuration document, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "simulation.json";

#[derive(Parser, Debug)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version,
    about = "Metro++ CLI - Runs a Metropolis Monte Carlo simulation of charged and dipolar particles described by a JSON (or TOML) configuration document.",
    help_template = HELP_TEMPLATE,
)]
pub struct Cli {
    /// Path to the simulation configuration (JSON, or TOML by extension).
    #[arg(short, long, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Resume from this state file instead of the one named in the configuration.
    #[arg(short, long, value_name = "PATH")]
    pub state: Option<PathBuf>,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads used inside energy evaluations.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn author_comes_from_package_metadata() {
        let command = Cli::command();
        assert_eq!(command.get_author(), Some(env!("CARGO_PKG_AUTHORS")));
        assert_eq!(command.get_author(), Some("The Metro++ Developers"));
    }

    #[test]
    fn no_arguments_uses_defaults() {
        let cli = Cli::try_parse_from(["metro"]).unwrap();
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_FILE));
        assert!(cli.state.is_none());
        assert_eq!(cli.verbose, 0);
        assert!(!cli.quiet);
        assert!(cli.threads.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let cli = Cli::try_parse_from([
            "metro", "--config", "bulk.toml", "--state", "old.state", "-vv", "-j", "4",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("bulk.toml"));
        assert_eq!(cli.state, Some(PathBuf::from("old.state")));
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.threads, Some(4));
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["metro", "-q", "-v"]).is_err());
    }
}
