//! CLI argument parsing and validation module
//!
//! Handles command-line interface using clap, including:
//! - `validate`: run the preflight checks against a saved configuration
//! - `channels`: show the channel selection tree
//! - `select`: change the selection, validate, save
//! - Skip flags (`-s <N>`), output format and logging options

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, ArgGroup, ArgMatches, Command};

use logagent_config::constants::{DEFAULT_NETWORK_TIMEOUT, STANDARD_STEP_COUNT};
use logagent_config::validation::SkipSet;

/// Which subcommand was requested
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Validate,
    Channels,
    Select(SelectionChange),
}

/// Requested edit to the channel selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionChange {
    All,
    None,
    /// Check each path; with `clear`, the result is exactly these paths
    Paths { paths: Vec<String>, clear: bool },
}

/// Parsed command line
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub command: CliCommand,
    pub config_path: Option<PathBuf>,
    pub channels_file: Option<PathBuf>,
    pub cert_dir: Option<PathBuf>,
    pub skip: SkipSet,
    pub timeout: Duration,
    pub json_output: bool,
    pub verbose: bool,
    pub debug_log: Option<PathBuf>,
}

fn config_arg() -> Arg {
    Arg::new("config")
        .long("config")
        .value_name("FILE")
        .help("Configuration file [default: <config dir>/logagent/config.toml]")
        .value_parser(clap::value_parser!(PathBuf))
}

fn channels_arg(required: bool) -> Arg {
    Arg::new("channels")
        .long("channels")
        .value_name("FILE")
        .help("Text file listing the available channels, one path per line")
        .required(required)
        .value_parser(clap::value_parser!(PathBuf))
}

fn json_arg() -> Arg {
    Arg::new("json")
        .short('j')
        .long("json")
        .help("Output in JSON format")
        .action(ArgAction::SetTrue)
}

fn check_args() -> [Arg; 3] {
    [
        Arg::new("skip")
            .short('s')
            .long("skip")
            .value_name("N")
            .help("Skip validation step N (1-15); may be repeated")
            .action(ArgAction::Append)
            .value_parser(clap::value_parser!(u8).range(1..=i64::from(STANDARD_STEP_COUNT))),
        Arg::new("cert-dir")
            .long("cert-dir")
            .value_name("DIR")
            .help("Directory holding primary.cert and secondary.cert [default: next to the configuration file]")
            .value_parser(clap::value_parser!(PathBuf)),
        Arg::new("timeout")
            .long("timeout")
            .value_name("SECS")
            .help("Timeout for each network check in seconds")
            .default_value("10")
            .value_parser(clap::value_parser!(u64).range(1..=300)),
    ]
}

fn build_command() -> Command {
    Command::new("logagent-config")
        .version(env!("LOGAGENT_CONFIG_VERSION"))
        .long_version(concat!(env!("LOGAGENT_CONFIG_VERSION"), " (", env!("GIT_HASH"), ")"))
        .about("Configure a Windows event-log forwarding agent")
        .long_about("Select the event-log channels to forward and check a configuration before it is saved: host format and reachability, server certificate identity, API key acceptance and field ranges.")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log progress to stderr")
                .global(true)
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("debug-log")
                .long("debug-log")
                .value_name("FILE")
                .help("Append debug logging to FILE")
                .global(true)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .subcommand(
            Command::new("validate")
                .about("Run the validation steps against the saved configuration")
                .arg(config_arg())
                .arg(channels_arg(false))
                .args(check_args())
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("channels")
                .about("Show the channel tree with the saved selection")
                .arg(config_arg())
                .arg(channels_arg(true))
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("select")
                .about("Change the channel selection, validate and save")
                .arg(config_arg())
                .arg(channels_arg(true))
                .arg(
                    Arg::new("all")
                        .long("all")
                        .help("Select every channel")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("none")
                        .long("none")
                        .help("Deselect every channel")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("path")
                        .short('p')
                        .long("path")
                        .value_name("CHANNEL")
                        .help("Select a channel or channel group")
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("clear")
                        .long("clear")
                        .help("Deselect everything before applying --path")
                        .requires("path")
                        .action(ArgAction::SetTrue),
                )
                .group(
                    ArgGroup::new("selection")
                        .args(["all", "none", "path"])
                        .required(true)
                        .multiple(false),
                )
                .args(check_args())
                .arg(json_arg()),
        )
}

/// Parse command line arguments and return configuration
pub fn parse_args() -> Result<CliConfig> {
    config_from_matches(&build_command().get_matches())
}

fn optional_path(matches: &ArgMatches, id: &str) -> Option<PathBuf> {
    matches.try_get_one::<PathBuf>(id).ok().flatten().cloned()
}

fn flag(matches: &ArgMatches, id: &str) -> bool {
    matches.try_get_one::<bool>(id).ok().flatten().copied().unwrap_or(false)
}

fn config_from_matches(matches: &ArgMatches) -> Result<CliConfig> {
    let (name, sub) = matches
        .subcommand()
        .ok_or_else(|| anyhow!("No command given"))?;

    let command = match name {
        "validate" => CliCommand::Validate,
        "channels" => CliCommand::Channels,
        "select" => {
            let change = if flag(sub, "all") {
                SelectionChange::All
            } else if flag(sub, "none") {
                SelectionChange::None
            } else {
                SelectionChange::Paths {
                    paths: sub
                        .get_many::<String>("path")
                        .map(|values| values.cloned().collect())
                        .unwrap_or_default(),
                    clear: flag(sub, "clear"),
                }
            };
            CliCommand::Select(change)
        }
        other => return Err(anyhow!("Unknown command: {}", other)),
    };

    let skip: SkipSet = sub
        .try_get_many::<u8>("skip")
        .ok()
        .flatten()
        .map(|values| values.map(|ordinal| usize::from(*ordinal)).collect())
        .unwrap_or_default();

    let timeout = sub
        .try_get_one::<u64>("timeout")
        .ok()
        .flatten()
        .map(|secs| Duration::from_secs(*secs))
        .unwrap_or(DEFAULT_NETWORK_TIMEOUT);

    Ok(CliConfig {
        command,
        config_path: optional_path(sub, "config"),
        channels_file: optional_path(sub, "channels"),
        cert_dir: optional_path(sub, "cert-dir"),
        skip,
        timeout,
        json_output: flag(sub, "json"),
        verbose: flag(sub, "verbose"),
        debug_log: optional_path(sub, "debug-log"),
    })
}
