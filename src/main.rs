#![forbid(unsafe_code)]

mod cli;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};

use cli::{CliCommand, CliConfig, SelectionChange};
use logagent_config::logging;
use logagent_config::models::{ConfigurationSnapshot, ValidationReport};
use logagent_config::output::{self, ChannelListing, ValidationOutput};
use logagent_config::session::ConfigSession;
use logagent_config::store::{ConfigStore, FileChannelCatalog, TomlConfigStore};
use logagent_config::validation::standard::{run_deadline, standard_pipeline, Collaborators};
use logagent_config::validation::run_in_background;

fn main() -> Result<ExitCode> {
    let config = cli::parse_args()?;
    logging::init(config.verbose, config.debug_log.as_deref())?;

    let config_path = match &config.config_path {
        Some(path) => path.clone(),
        None => TomlConfigStore::default_path()?,
    };
    info!("Using configuration {}", config_path.display());
    let store = TomlConfigStore::new(&config_path);

    match &config.command {
        CliCommand::Channels => list_channels(&config, store),
        CliCommand::Validate => validate(&config, &config_path, store),
        CliCommand::Select(change) => select(&config, &config_path, store, change),
    }
}

fn channels_file(config: &CliConfig) -> Result<&Path> {
    config
        .channels_file
        .as_deref()
        .context("--channels <FILE> is required for this command")
}

fn open_session(store: TomlConfigStore, channels_file: &Path) -> Result<ConfigSession<TomlConfigStore>> {
    let persisted = store.read()?;
    let catalog = FileChannelCatalog::new(channels_file, persisted.channels.selected);
    Ok(ConfigSession::open(store, &catalog)?)
}

fn list_channels(config: &CliConfig, store: TomlConfigStore) -> Result<ExitCode> {
    let session = open_session(store, channels_file(config)?)?;

    if config.json_output {
        println!("{}", output::to_json(&ChannelListing::new(session.tree()))?);
    } else {
        print!("{}", output::render_tree(session.tree()));
    }
    Ok(ExitCode::SUCCESS)
}

fn validate(config: &CliConfig, config_path: &Path, store: TomlConfigStore) -> Result<ExitCode> {
    // Without a channel list the persisted selection is taken as is
    let snapshot = match &config.channels_file {
        Some(file) => open_session(store, file)?.snapshot(),
        None => {
            let persisted = store.read()?;
            ConfigurationSnapshot::from_configuration(&persisted, persisted.channels.selected.clone())
        }
    };

    let (report, snapshot) = run_pipeline(config, config_path, snapshot)?;
    print_report(config, &report, &snapshot, false)?;
    Ok(exit_code(&report))
}

fn select(
    config: &CliConfig,
    config_path: &Path,
    store: TomlConfigStore,
    change: &SelectionChange,
) -> Result<ExitCode> {
    let mut session = open_session(store, channels_file(config)?)?;

    match change {
        SelectionChange::All => session.set_all_channels(true),
        SelectionChange::None => session.set_all_channels(false),
        SelectionChange::Paths { paths, clear } => {
            if *clear {
                session.set_all_channels(false);
            }
            for path in paths {
                if !session.set_channel_checked(path, true) {
                    warn!("Channel '{}' is not in the channel list", path);
                }
            }
        }
    }

    let (report, snapshot) = run_pipeline(config, config_path, session.snapshot())?;
    let saved = report.is_success();
    if saved {
        session.commit(&snapshot)?;
        info!("Saved {} selected channels", snapshot.selected_channels.len());
    }

    print_report(config, &report, &snapshot, saved)?;
    Ok(exit_code(&report))
}

fn run_pipeline(
    config: &CliConfig,
    config_path: &Path,
    snapshot: ConfigurationSnapshot,
) -> Result<(ValidationReport, ConfigurationSnapshot)> {
    let cert_dir = config.cert_dir.clone().unwrap_or_else(|| {
        config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    });

    // Built outside the runtime: the blocking HTTP client owns one of its own
    let collaborators = Collaborators::live(config.timeout, cert_dir)?;
    let pipeline = standard_pipeline(&collaborators);

    let runtime = tokio::runtime::Runtime::new().context("Failed to start the validation runtime")?;
    let result = runtime.block_on(run_in_background(
        pipeline,
        snapshot,
        config.skip.clone(),
        run_deadline(config.timeout),
    ));
    runtime.shutdown_timeout(Duration::from_secs(1));
    result
}

fn print_report(
    config: &CliConfig,
    report: &ValidationReport,
    snapshot: &ConfigurationSnapshot,
    saved: bool,
) -> Result<()> {
    let output = ValidationOutput {
        report,
        invalid_fields: snapshot.invalid_fields(),
        saved,
    };

    if config.json_output {
        println!("{}", output::to_json(&output)?);
    } else {
        print!("{}", output::render_report(&output));
    }
    Ok(())
}

fn exit_code(report: &ValidationReport) -> ExitCode {
    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
