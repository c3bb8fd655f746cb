//! The command-line arguments and configuration system for the `bumpfix` binary.

use bumpfix_core::BumpResult;
use bumpfix_core::config::Config;
use clap::{Args, Parser, Subcommand};
use config::Environment;
use config::FileFormat::Toml;
use config::builder::{ConfigBuilder, DefaultState};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "bumpfix")]
#[command(about = "Reproduce breaking dependency updates, repair them with an LLM, report what was fixed", long_about = None)]
pub struct Cli {
    /// Set a configuration value; format $NAME=$VALUE.
    #[arg(long, short, global = true)]
    pub config: Vec<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Process a batch of benchmark datapoints.
    Run(RunArgs),
    /// Print the diagnostics found in a build log as JSON.
    Extract {
        /// Build log to read.
        log: PathBuf,
    },
    /// Print which diagnostics were fixed between two build logs as JSON.
    Reconcile {
        /// Build log from before the repair.
        pre: PathBuf,
        /// Build log from after the repair.
        post: PathBuf,
    },
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Directory containing the benchmark JSON files.
    pub input: Option<PathBuf>,

    /// Directory that receives logs, file copies and reports.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Process only this benchmark file.
    #[arg(long, value_name = "FILE")]
    pub specific_file: Option<PathBuf>,

    /// Only process datapoints with this failure category.
    #[arg(long)]
    pub category: Option<String>,

    /// Process at most this many randomly chosen datapoints.
    #[arg(long)]
    pub limit: Option<usize>,

    /// Seed for choosing datapoints with --limit.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Build the pre-update commit first and skip datapoints where it fails.
    #[arg(long)]
    pub check_pre_commit: bool,

    /// Reuse previously fetched source files instead of downloading them again.
    #[arg(long)]
    pub no_download: bool,

    /// Prints out the location of the config file.
    #[arg(long)]
    pub print_config_path: bool,
}

/// Loads and validates the config for `bumpfix run`.
///
/// Returns None if a flag that calls for an early exit (such as --print-config-path) was given.
pub fn initialize(cli: &Cli, args: &RunArgs) -> BumpResult<Option<Config>> {
    let dirs = ProjectDirs::from("", "", "bumpfix").ok_or("no home directory")?;
    if args.print_config_path {
        println!("Config file location: {:?}", config_file(dirs.config_dir()));
        return Ok(None);
    }
    let config = load_config(&cli.config, args, dirs.config_dir(), true)?;
    config.validate();
    Ok(Some(config))
}

fn load_config(
    overrides: &[String],
    args: &RunArgs,
    config_dir: &Path,
    use_environment: bool,
) -> Result<Config, config::ConfigError> {
    let mut settings = ConfigBuilder::<DefaultState>::default()
        .add_source(config::File::from_str(
            include_str!("../default_config.toml"),
            Toml,
        ))
        .add_source(config::File::from(config_file(config_dir)).required(false))
        .add_source(config::File::from(PathBuf::from("config.toml")).required(false));
    if use_environment {
        settings = settings.add_source(
            Environment::with_prefix("BUMPFIX")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );
    }
    for config_arg in overrides {
        let Some((name, value)) = config_arg.split_once('=') else {
            return Err(config::ConfigError::Message(format!(
                "failed to parse config value {config_arg:?}; no '=' found"
            )));
        };
        settings = settings.set_override(name, value)?;
    }
    if let Some(ref category) = args.category {
        settings = settings.set_override("category", category.as_str())?;
    }
    if args.check_pre_commit {
        settings = settings.set_override("check_pre_commit", true)?;
    }
    if args.no_download {
        settings = settings.set_override("download_files", false)?;
    }

    let mut config: Config = settings.build()?.try_deserialize()?;
    // Paths, and integers the config crate cannot take as overrides losslessly, are applied after
    // deserialization.
    if let Some(ref input) = args.input {
        config.input = input.clone();
    }
    if let Some(ref output) = args.output {
        config.output = output.clone();
    }
    if args.limit.is_some() {
        config.limit = args.limit;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    Ok(config)
}

/// Returns the config file path, given the config directory.
fn config_file(config_dir: &Path) -> PathBuf {
    [config_dir, "bumpfix.toml".as_ref()].iter().collect()
}

#[cfg(test)]
mod tests {
    #[cfg(not(miri))]
    #[test]
    fn load_config_test() {
        use super::*;
        use bumpfix_core::outcome::StderrPolicy;
        use bumpfix_core::test_util::tempdir;
        use std::{fs, io::Write as _};

        fn load(argv: &[&str], config_dir: &Path) -> Config {
            let cli = Cli::parse_from(argv);
            let Command::Run(ref args) = cli.command else {
                panic!("expected the run subcommand");
            };
            load_config(&cli.config, args, config_dir, false).unwrap()
        }

        let config_dir = tempdir().unwrap();
        let defaults = load(&["", "run", "a"], config_dir.path());
        assert_eq!(defaults.input, AsRef::<Path>::as_ref("a"));
        assert_eq!(defaults.build_timeout_secs, 1200);
        assert_eq!(defaults.stderr_policy, StderrPolicy::Ignore);
        assert_eq!(defaults.category, "COMPILATION_FAILURE");
        assert!(defaults.download_files);
        assert!(defaults.unknown.is_empty());
        assert!(defaults.tools.contains_key("remote_docker"));

        fs::File::create(config_file(config_dir.path()))
            .unwrap()
            .write_all(
                br#"
                    input = "b"
                    stderr_policy = "fail"
                    mystery = 1
                    [tools.upgrade_fix_llm]
                    model = "gpt-4o"
                "#,
            )
            .unwrap();
        let user = load(&["", "run"], config_dir.path());
        assert_eq!(user.input, AsRef::<Path>::as_ref("b"));
        assert_eq!(user.stderr_policy, StderrPolicy::Fail);
        assert!(user.unknown.contains_key("mystery"));
        // Tables merge with the defaults rather than replacing them.
        assert_eq!(user.tools["upgrade_fix_llm"]["model"], "gpt-4o");
        assert_eq!(user.tools["upgrade_fix_llm"]["backend"], "openai");

        // Verify the --config flag overrides the user's config file.
        assert_eq!(
            load(&["", "run", "--config", "input=c"], config_dir.path()).input,
            AsRef::<Path>::as_ref("c")
        );
        // Verify the positional input overrides all the configuration options.
        assert_eq!(
            load(&["", "--config", "input=d", "run", "e"], config_dir.path()).input,
            AsRef::<Path>::as_ref("e")
        );

        let flags = load(
            &[
                "",
                "run",
                "--category",
                "DEPENDENCY_RESOLUTION_FAILURE",
                "--limit",
                "5",
                "--seed",
                "7",
                "--no-download",
                "--check-pre-commit",
                "--output=/tmp/out",
            ],
            config_dir.path(),
        );
        assert_eq!(flags.category, "DEPENDENCY_RESOLUTION_FAILURE");
        assert_eq!((flags.limit, flags.seed), (Some(5), Some(7)));
        assert!(!flags.download_files);
        assert!(flags.check_pre_commit);
        assert_eq!(flags.output, AsRef::<Path>::as_ref("/tmp/out"));
    }

    #[test]
    fn malformed_override_is_an_error() {
        use super::*;
        use bumpfix_core::test_util::tempdir;
        let config_dir = tempdir().unwrap();
        let cli = Cli::parse_from(["", "run", "--config", "no_equals_sign"]);
        let Command::Run(ref args) = cli.command else {
            panic!("expected the run subcommand");
        };
        assert!(load_config(&cli.config, args, config_dir.path(), false).is_err());
    }
}
