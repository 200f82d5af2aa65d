mod config;
mod hook;
mod notion;
mod phases;
mod render;
mod transcript;
mod trigger;
mod types;

use anyhow::{Context, Result};
use clap::Parser;
use config::{Config, TriggerConfig};
use hook::{Delivery, LogHook, Outcome};
use std::io::{self, Read};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use trigger::TriggerFilter;
use types::PostToolUseInput;

const LOG_ENV: &str = "TDD_NOTION_LOG";

/// PostToolUse hook that appends a Red/Green/Refactor summary to a Notion
/// page whenever a test run passes.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Config file to use instead of `<cwd>/.claude/tdd-notion-logger.toml`.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print the request body instead of sending it.
    #[arg(long)]
    dry_run: bool,
}

fn read_stdin() -> Result<String> {
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("reading hook input from stdin")?;
    Ok(buffer)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .init();
}

/// Whether a configuration problem is worth reporting for this event: only
/// when the event is a passing test run. Falls back to the default trigger
/// when the configured one is missing or doesn't compile.
fn would_trigger(input: &PostToolUseInput, trigger: Option<&TriggerConfig>) -> bool {
    trigger
        .and_then(|t| TriggerFilter::new(t).ok())
        .or_else(|| TriggerFilter::new(&TriggerConfig::default()).ok())
        .is_none_or(|filter| filter.check(input).is_ok())
}

fn run(cli: Cli) -> Result<()> {
    let raw = read_stdin()?;
    let input: PostToolUseInput =
        serde_json::from_str(&raw).context("parsing hook input")?;
    debug!(
        session = ?input.session_id,
        event = ?input.hook_event_name,
        tool = %input.tool_name,
        "received hook input"
    );

    let config = match Config::load(cli.config.as_deref(), input.cwd.as_deref()) {
        Ok(config) => config,
        Err(err) if !would_trigger(&input, None) => {
            debug!("ignoring config error for ineligible event: {err:#}");
            return Ok(());
        }
        Err(err) => return Err(err),
    };
    let delivery = Delivery::from_env(cli.dry_run, &config.notion);
    let trigger = config.trigger.clone();
    let hook = match LogHook::new(config) {
        Ok(hook) => hook,
        Err(err) if !would_trigger(&input, Some(&trigger)) => {
            debug!("ignoring config error for ineligible event: {err:#}");
            return Ok(());
        }
        Err(err) => return Err(err),
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;
    match runtime.block_on(hook.handle(&input, delivery))? {
        Outcome::Ineligible(reason) => debug!(%reason, "nothing logged"),
        outcome => debug!(?outcome, "done"),
    }
    Ok(())
}

fn main() {
    init_tracing();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Help and version go to stdout; usage errors are reported and
            // ignored so the agent is never blocked.
            let _ = err.print();
            return;
        }
    };

    if let Err(err) = run(cli) {
        tracing::error!("{err:#}");
    }
}
