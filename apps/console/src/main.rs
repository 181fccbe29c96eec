use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{ControllerEvent, DispatchOutcome, RobotController, SessionEndReason};
use shared::{domain::SessionId, protocol::BackendSettings};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    signal,
    sync::broadcast::{
        self,
        error::{RecvError, TryRecvError},
    },
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod render;

use render::EventPrinter;

const DEFAULT_LOG_FILTER: &str = "info,robot_console::log=off";

#[derive(Parser, Debug)]
#[command(name = "robot-console", version, about = "Operator console for the robot motion backend")]
struct Args {
    /// Config file; defaults to ./console.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    backend_url: Option<String>,
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval_ms: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send one command batch and follow the motion it starts.
    Send {
        /// Read the batch from a file, one command per line.
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,
        #[arg(required_unless_present = "file")]
        text: Vec<String>,
    },
    /// Query robot status once.
    Status,
    /// Poll robot status until motion completes or Ctrl-C.
    Watch {
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        interval_ms: Option<u64>,
    },
    /// Print the link other devices can use to reach the backend.
    Share,
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Interactive session: one batch per line, plus :stop, :status, :log, :quit.
    Repl,
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    Show,
    /// Upload a settings document (JSON, or TOML by extension).
    Apply { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = config::load_settings(args.config.as_deref())?;
    if let Some(url) = args.backend_url {
        settings.backend_url = url;
    }
    if let Some(ms) = args.poll_interval_ms {
        settings.poll_interval = Duration::from_millis(ms);
    }
    info!(backend_url = %settings.backend_url, "console: starting");

    let controller = RobotController::new(settings).context("invalid controller settings")?;
    let mut console = Console::new(&controller);

    match args.command {
        Command::Send { file, text } => {
            let batch = match file {
                Some(path) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("failed to read command file '{}'", path.display()))?,
                None => text.join(" "),
            };
            send(&controller, &mut console, &batch).await
        }
        Command::Status => {
            let result = controller.refresh_status().await;
            console.drain();
            result?;
            Ok(())
        }
        Command::Watch { interval_ms } => {
            let interval = interval_ms
                .map(Duration::from_millis)
                .unwrap_or(controller.settings().poll_interval);
            let session_id = controller.start_polling(interval);
            let reason = console.follow_session(&controller, session_id).await;
            ensure_not_failed(reason)
        }
        Command::Share => {
            let url = controller.share_url().await?;
            println!("{url}");
            Ok(())
        }
        Command::Settings { action } => match action {
            SettingsAction::Show => {
                let result = controller.fetch_backend_settings().await;
                console.drain();
                println!("{}", serde_json::to_string_pretty(&result?)?);
                Ok(())
            }
            SettingsAction::Apply { file } => {
                let backend_settings = read_backend_settings(&file).await?;
                let result = controller.update_backend_settings(&backend_settings).await;
                console.drain();
                result?;
                Ok(())
            }
        },
        Command::Repl => repl(&controller, &mut console).await,
    }
}

async fn send(controller: &Arc<RobotController>, console: &mut Console, batch: &str) -> Result<()> {
    let outcome = match controller.dispatch(batch).await {
        Ok(outcome) => outcome,
        Err(err) => {
            console.drain();
            return Err(err.into());
        }
    };
    match outcome {
        DispatchOutcome::MonitoringStarted(session_id) => {
            let reason = console.follow_session(controller, session_id).await;
            ensure_not_failed(reason)
        }
        DispatchOutcome::Completed => {
            console.drain();
            Ok(())
        }
    }
}

async fn repl(controller: &Arc<RobotController>, console: &mut Console) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);
    println!("One command batch per line. :stop  :status  :log  :quit");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                match line.trim() {
                    ":quit" | ":q" => break,
                    ":stop" => {
                        if !controller.stop_polling() {
                            println!("not monitoring");
                        }
                    }
                    ":status" => {
                        if let Err(err) = controller.refresh_status().await {
                            debug!(error = %err, "repl: status query failed");
                        }
                    }
                    ":log" => {
                        for entry in controller.log_entries().iter().rev() {
                            println!("{}", render::format_log_entry(entry));
                        }
                    }
                    "" => {}
                    batch => {
                        if let Err(err) = controller.dispatch(batch).await {
                            debug!(error = %err, "repl: dispatch failed");
                        }
                    }
                }
                console.drain();
            }
            event = console.events.recv() => {
                if !console.handle_recv(event) {
                    break;
                }
            }
            _ = &mut ctrl_c => break,
        }
    }

    controller.stop_polling();
    console.drain();
    Ok(())
}

async fn read_backend_settings(path: &Path) -> Result<BackendSettings> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let settings = if is_toml {
        toml::from_str(&raw).with_context(|| format!("invalid TOML in '{}'", path.display()))?
    } else {
        serde_json::from_str(&raw).with_context(|| format!("invalid JSON in '{}'", path.display()))?
    };
    Ok(settings)
}

fn ensure_not_failed(reason: SessionEndReason) -> Result<()> {
    if reason == SessionEndReason::Failed {
        bail!("monitoring ended because a status query failed");
    }
    Ok(())
}

/// Prints controller events to stdout as they arrive.
struct Console {
    printer: EventPrinter,
    events: broadcast::Receiver<ControllerEvent>,
}

impl Console {
    fn new(controller: &RobotController) -> Self {
        Self {
            printer: EventPrinter::default(),
            events: controller.subscribe_events(),
        }
    }

    fn show(&mut self, event: &ControllerEvent) {
        if let Some(line) = self.printer.render(event) {
            println!("{line}");
        }
    }

    /// Returns `false` once the channel is closed.
    fn handle_recv(&mut self, event: Result<ControllerEvent, RecvError>) -> bool {
        match event {
            Ok(event) => {
                self.show(&event);
                true
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "console: output fell behind, events dropped");
                true
            }
            Err(RecvError::Closed) => false,
        }
    }

    fn drain(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(event) => self.show(&event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "console: output fell behind, events dropped");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    }

    async fn follow_session(
        &mut self,
        controller: &RobotController,
        session_id: SessionId,
    ) -> SessionEndReason {
        let ctrl_c = signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                event = self.events.recv() => {
                    let ended = match &event {
                        Ok(ControllerEvent::SessionEnded {
                            session_id: ended,
                            reason,
                        }) if *ended == session_id => Some(*reason),
                        _ => None,
                    };
                    if !self.handle_recv(event) {
                        return SessionEndReason::Stopped;
                    }
                    if let Some(reason) = ended {
                        self.drain();
                        return reason;
                    }
                }
                _ = &mut ctrl_c => {
                    controller.stop_polling();
                    self.drain();
                    return SessionEndReason::Stopped;
                }
            }
        }
    }
}
