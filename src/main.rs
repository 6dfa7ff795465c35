mod config;
mod delivery;
mod error;
mod event;
mod handler;
mod payload;
mod status;

use anyhow::{Context, Result};
use clap::Parser;
use config::Settings;
use event::MonitoringEvent;
use std::io::{self, Read};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "slackhook", about = "Post monitoring check results to a Slack incoming webhook", version)]
struct Cli {
    /// Name of the settings block to use
    #[arg(short = 'j', long = "json", default_value = "slack")]
    json_config: String,

    /// Settings file (TOML, or JSON when the extension is .json)
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Read the event from this file instead of stdin
    #[arg(short, long)]
    event: Option<PathBuf>,

    /// Print the payload(s) that would be sent and exit
    #[arg(long)]
    dry_run: bool,

    /// Print the resolved settings block and exit
    #[arg(long)]
    print_config: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    // stdout carries --dry-run / --print-config output
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = load_settings(&cli)?;

    if cli.print_config {
        return run_print_config(&settings);
    }

    let event = read_event(cli.event.as_deref())?;
    debug!(incident = %event.incident_key(), status = event.check.status, "Event received");

    if cli.dry_run {
        return run_dry_run(&event, &settings);
    }

    let report = handler::handle(&event, &settings)?;
    debug!(channels = report.delivered.len(), "All channels delivered");
    Ok(())
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let path = cli.settings.clone()
        .or_else(Settings::default_path)
        .context("no settings file given and no config directory available")?;
    debug!(path = %path.display(), block = %cli.json_config, "Loading settings");
    Ok(Settings::load(&path, &cli.json_config)?)
}

fn read_event(path: Option<&std::path::Path>) -> Result<MonitoringEvent> {
    let text = match path {
        Some(p) => std::fs::read_to_string(p)
            .with_context(|| format!("cannot read event file {}", p.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf).context("cannot read event from stdin")?;
            buf
        }
    };
    MonitoringEvent::from_json(&text).context("event is not a valid check result")
}

fn run_dry_run(event: &MonitoringEvent, settings: &Settings) -> Result<()> {
    let payloads = handler::preview(event, settings)?;
    println!("{}", serde_json::to_string_pretty(&payloads)?);
    Ok(())
}

fn run_print_config(settings: &Settings) -> Result<()> {
    let mut shown = settings.clone();
    if shown.webhook_url.is_some() {
        shown.webhook_url = Some("(configured)".into());
    }
    print!("{}", toml::to_string_pretty(&shown)?);
    Ok(())
}
