//! stovelink CLI entry point.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::debug;

use stovelink_client::cli::{Cli, Command};
use stovelink_client::error::ClientResult;
use stovelink_client::stove::StoveClient;
use stovelink_core::{
    BurnPhase, CadenceTier, Command as StoveCommand, ConnectionState, LogFormat, StoveUpdate,
    StoveValue, TracingConfig, init_tracing,
};

/// How long the one-shot subcommands wait for their data.
const POPULATE_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing_config = if cli.debug {
        TracingConfig::debug()
    } else {
        TracingConfig::default()
    };
    let tracing_config = if cli.json {
        tracing_config.with_format(LogFormat::Json)
    } else {
        tracing_config
    };
    if let Err(err) = init_tracing(tracing_config) {
        eprintln!("error: {}", err);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let config = cli.resolve_config()?;
    debug!(addr = %config.addr(), "starting client");
    let client = StoveClient::new(config);

    let result = match cli.command {
        Command::Watch => watch(&client, cli.json).await,
        Command::Snapshot => {
            print_commands(&client, CadenceTier::State, cli.json).await
        }
        Command::Info => print_commands(&client, CadenceTier::Info, cli.json).await,
    };

    client.close().await;
    result
}

/// Streams updates and state changes until Ctrl-C.
async fn watch(client: &StoveClient, json: bool) -> ClientResult<()> {
    let mut updates = client.subscribe();
    let mut states = client.state_changes();

    loop {
        tokio::select! {
            received = updates.recv() => match received {
                Ok(update) => print_update(&update, json),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    debug!(missed, "update stream lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *states.borrow_and_update();
                print_state(state, json);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

/// Waits for one tier to populate, prints it, returns.
async fn print_commands(client: &StoveClient, tier: CadenceTier, json: bool) -> ClientResult<()> {
    let names = StoveCommand::for_tier(tier).map(|cmd| cmd.name);
    let snapshot = client.wait_until_populated(names, POPULATE_TIMEOUT).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }
    for command in StoveCommand::for_tier(tier) {
        if let Some(entry) = snapshot.get(command.name) {
            println!("{:<16} {}", label(command), render(command.name, &entry.value));
        }
    }
    Ok(())
}

fn print_update(update: &StoveUpdate, json: bool) {
    if json {
        match serde_json::to_string(update) {
            Ok(line) => println!("{}", line),
            Err(err) => debug!(error = %err, "cannot serialize update"),
        }
        return;
    }
    match StoveCommand::find(&update.command) {
        Some(command) => println!(
            "{:<16} {}",
            label(command),
            render(&update.command, &update.value)
        ),
        None => println!("{:<16} {}", update.command, update.value),
    }
}

fn print_state(state: ConnectionState, json: bool) {
    if json {
        println!("{{\"connection_state\":\"{}\"}}", state);
    } else {
        println!("[{}]", state);
    }
}

fn label(command: &StoveCommand) -> String {
    match command.alias() {
        Some(alias) => format!("{} ({})", alias, command.name),
        None => command.name.to_string(),
    }
}

/// Renders a value, translating phase codes to their labels.
fn render(name: &str, value: &StoveValue) -> String {
    if name == "appPhase"
        && let Some(code) = value.as_integer()
        && let Some(phase) = BurnPhase::from_code(code)
    {
        return format!("{} ({})", phase, code);
    }
    value.to_string()
}
