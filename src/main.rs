use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers, MouseEventKind};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use zeroclick::clock::{Clock, SystemClock};
use zeroclick::config::{self, Config, SpeechConfig};
use zeroclick::layout::rule_layout;
use zeroclick::pointer::PointerTracker;
use zeroclick::render::{Renderer, Ui};
use zeroclick::session::{Session, SessionCommand, SessionEvent};
use zeroclick::speech::{CommandSpeaker, LogSpeaker, Speaker};
use zeroclick::suggest::{self, SuggestionRequester};

#[derive(Parser)]
#[command(name = "zeroclick", about = "Dwell and switch keyboard for AAC")]
struct Cli {
    /// Config file (missing file means defaults)
    #[arg(long, default_value = config::DEFAULT_PATH)]
    config: PathBuf,
    /// Write logs here instead of stderr
    #[arg(long)]
    log: Option<PathBuf>,
    /// Start in switch scanning mode
    #[arg(long)]
    switch: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the rule-based layout chosen for a sentence
    Layout { sentence: Vec<String> },
}

#[hotpath::main]
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log.as_deref())?;

    let mut config = Config::load(&cli.config)?;
    if cli.switch {
        config.scan.start_enabled = true;
    }

    if let Some(Command::Layout { sentence }) = cli.command {
        print_layout(&sentence.join(" "));
        return Ok(());
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(config))
}

fn init_logging(path: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn print_layout(sentence: &str) {
    let id = rule_layout(sentence);
    println!("{}", id);
    for row in id.keys().chunks(6) {
        let labels: Vec<&str> = row.iter().map(|k| k.label).collect();
        println!("  {}", labels.join(" | "));
    }
}

async fn run(config: Config) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let pointer = PointerTracker::new();
    let speaker: Arc<dyn Speaker> = match &config.speech {
        SpeechConfig::Log => Arc::new(LogSpeaker),
        SpeechConfig::Command { command, args } => {
            Arc::new(CommandSpeaker::new(command.clone(), args.clone()))
        }
    };

    let mut session = Session::new(&config, pointer.clone(), Arc::clone(&speaker));
    if let Some(provider) = &config.suggestions.provider {
        match suggest::build_provider(provider, config.suggestions.max) {
            Ok(provider) => {
                session = session.with_suggestions(SuggestionRequester::new(
                    provider,
                    config.suggestions.timeout(),
                    config.suggestions.max,
                ));
            }
            Err(e) => warn!(error = %e, "suggestions disabled"),
        }
    }

    let (ui, ui_rx) = Ui::new();
    let mut renderer = Renderer::new().context("failed to set up terminal")?;

    // Terminal input thread: mouse moves go straight to the pointer cell,
    // everything else is queued for the loop below
    let (cmd_tx, cmd_rx) = flume::unbounded::<SessionCommand>();
    let input_pointer = Arc::clone(&pointer);
    thread::spawn(move || input_loop(input_pointer, cmd_tx));

    let mut ticker = tokio::time::interval(config.ui.tick());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(switch = config.scan.start_enabled, "keyboard ready");

    let result: Result<()> = loop {
        tokio::select! {
            biased;

            Ok(command) = cmd_rx.recv_async() => {
                let events = session.handle(command, clock.now());
                report(&ui, &events);
                if session.exit_requested() {
                    break Ok(());
                }
            }

            _ = ticker.tick() => {
                let now = clock.now();
                let events = session.on_tick(now);
                report(&ui, &events);
                if session.exit_requested() {
                    break Ok(());
                }
                ui.show_frame(session.frame(now));
            }

            Ok(ui_event) = ui_rx.recv_async() => {
                if let Err(e) = renderer.handle(ui_event) {
                    break Err(e.into());
                }
            }
        }
    };

    speaker.stop();
    renderer.restore()?;
    result
}

fn report(ui: &Ui, events: &[SessionEvent]) {
    for event in events {
        match event {
            SessionEvent::SwitchMode(enabled) => {
                ui.set_status(format!("switch mode {}", if *enabled { "ON" } else { "OFF" }));
            }
            SessionEvent::Committed { target_id, .. } => {
                ui.set_status(format!("selected {}", target_id));
            }
            SessionEvent::HoverChanged(_) | SessionEvent::LayoutChanged(_) | SessionEvent::Exit => {}
        }
    }
}

fn input_loop(pointer: Arc<PointerTracker>, tx: flume::Sender<SessionCommand>) {
    loop {
        let event = match event::read() {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "terminal input closed");
                break;
            }
        };

        let command = match event {
            Event::Mouse(mouse) => {
                if let MouseEventKind::Moved | MouseEventKind::Drag(_) = mouse.kind {
                    // Centre of the cell under the cursor
                    pointer.update(mouse.column as f32 + 0.5, mouse.row as f32 + 0.5);
                }
                None
            }
            Event::FocusLost => {
                pointer.clear();
                None
            }
            Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    Some(SessionCommand::Quit)
                }
                KeyCode::Char(' ') | KeyCode::Enter => Some(SessionCommand::Switch),
                KeyCode::Char('s') | KeyCode::Char('S') => Some(SessionCommand::ToggleSwitchMode),
                KeyCode::Char('+') | KeyCode::Char('=') => Some(SessionCommand::AdjustDwell(250)),
                KeyCode::Char('-') => Some(SessionCommand::AdjustDwell(-250)),
                KeyCode::Char(']') => Some(SessionCommand::AdjustScanInterval(500)),
                KeyCode::Char('[') => Some(SessionCommand::AdjustScanInterval(-500)),
                KeyCode::Char('q') | KeyCode::Esc => Some(SessionCommand::Quit),
                _ => None,
            },
            _ => None,
        };

        if let Some(command) = command
            && tx.send(command).is_err()
        {
            break;
        }
    }
}
