use std::path::Path;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use nbdebug_config::{load_config, Config, SessionConfig};
use nbdebug_dap::{Connection, ContinueOutcome, DebugSession, SessionOptions, Toggle};

use crate::args::Args;
use crate::console::{self, ConsoleCommand};
use crate::logging::init_logging;

/// Load config, connect to the backend and run the console until `quit`
/// or end of input.
pub fn run_debugger(args: Args) -> Result<()> {
    let config_dir = nbdebug_config::paths::config_dir()?;
    let project_dir = std::env::current_dir().ok();
    let (config, config_error) = match load_config(&config_dir, project_dir.as_deref()) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    let log_path = init_logging(&config)?;
    if let Some(e) = config_error {
        error!("config load failed, using defaults: {}", e);
    }
    info!(log = %log_path.display(), "logging initialized");

    let source = read_source(&args.source)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    runtime.block_on(console_loop(args, config, source))
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read: {}", path.display()))
}

fn session_options(config: &SessionConfig) -> SessionOptions {
    SessionOptions {
        cwd: config.cwd.clone(),
        just_my_code: config.just_my_code,
        cell_id: config.cell_id,
        next_id: config.next_id,
        adapter_id: config.adapter_id.clone(),
    }
}

async fn console_loop(args: Args, config: Config, source: String) -> Result<()> {
    let address = args
        .connect
        .clone()
        .unwrap_or_else(|| config.backend.address.clone());
    let connection = Connection::connect_tcp(address.as_str(), config.backend.channel_capacity)
        .await
        .with_context(|| format!("failed to connect to {address}"))?;

    let mut session = DebugSession::new(connection, session_options(&config.session));
    session.set_source(source.clone());
    for line in &args.breaks {
        session.toggle_breakpoint(*line, console::line_text(&source, *line));
    }

    let mut notifications = session.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match notifications.recv().await {
                Ok(event) => println!("{}", console::describe_event(&event)),
                Err(RecvError::Lagged(skipped)) => warn!("dropped {skipped} notifications"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    println!("connected to {address}, 'help' lists commands");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match console::parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("error: {e:#}");
                continue;
            }
        };
        if command == ConsoleCommand::Quit {
            break;
        }
        if let Err(e) = run_command(&mut session, &source, command).await {
            println!("error: {e}");
        }
    }

    let result = session.dispose().await;
    printer.abort();
    if let Err(e) = result {
        warn!("disconnect on exit failed: {e}");
    }
    info!("nbdebug exited cleanly");
    Ok(())
}

async fn run_command(
    session: &mut DebugSession,
    source: &str,
    command: ConsoleCommand,
) -> Result<(), nbdebug_dap::DapError> {
    match command {
        ConsoleCommand::Start => {
            session.start().await?;
            if let Some(path) = session.source_path() {
                println!("debugging {path}");
            }
        }
        ConsoleCommand::Toggle(line) => {
            match session.toggle_breakpoint(line, console::line_text(source, line)) {
                Toggle::Added => println!("breakpoint set at line {line}"),
                Toggle::Removed => println!("breakpoint removed from line {line}"),
            }
        }
        ConsoleCommand::List => println!("{}", console::format_breakpoints(&session.breakpoints())),
        ConsoleCommand::Continue => match session.continue_execution().await? {
            ContinueOutcome::Continued => println!("continuing"),
            ContinueOutcome::Finished => println!("execution finished"),
        },
        ConsoleCommand::Next => session.step_over().await?,
        ConsoleCommand::Variables => {
            let variables = session.get_variables().await?;
            println!("{}", console::format_variables(&variables));
        }
        ConsoleCommand::Print(expression) => {
            let result = session.evaluate(expression).await?;
            println!("{}", result.result);
        }
        ConsoleCommand::Stop => session.stop().await?,
        ConsoleCommand::Help => println!("{}", console::HELP),
        ConsoleCommand::Quit => {}
    }
    Ok(())
}
