//! sorter - interactive jelly bean sorting session
//!
//! This binary:
//! 1. Opens the flavor detector (falls back to inactive on failure)
//! 2. Opens the motion controller (falls back to a simulated actuator)
//! 3. Streams detections and keeps a ranked flavor table
//! 4. Reads operator commands from stdin (start, stop, snapshot, pick, auto, ...)
//! 5. Releases the serial port on quit or Ctrl-C

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{BufRead, IsTerminal};
use std::sync::mpsc::{self, TryRecvError};
use std::time::Duration;

use bean_sorter::console::HELP;
use bean_sorter::render::format_table;
use bean_sorter::session::{AutoPickStop, TickOutcome};
use bean_sorter::{
    open_detector, ConsoleCommand, CycleError, Session, SessionState, SorterConfig,
};

#[path = "../ui.rs"]
mod ui;

const IDLE_POLL: Duration = Duration::from_millis(50);

#[derive(Parser, Debug)]
#[command(author, version, about = "Detect jelly bean flavors and pick them with a G-code machine")]
struct Args {
    /// Serial device of the motion controller.
    #[arg(long)]
    port: Option<String>,

    /// Use the simulated actuator even if the serial device exists.
    #[arg(long)]
    simulate: bool,

    /// Detector source: sim://tray?beans=N&seed=S, http(s)://..., or a JSON-lines replay file.
    #[arg(long)]
    detector: Option<String>,

    /// Stay idle on launch instead of streaming immediately.
    #[arg(long, env = "SORTER_START_PAUSED")]
    paused: bool,

    /// Check that the detector accepts the configured API key, then exit.
    #[arg(long)]
    check_key: bool,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

enum Input {
    Line(String),
    Eof,
    Interrupt,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = SorterConfig::load()?;
    if let Some(port) = args.port.clone() {
        cfg.actuator.port = port;
    }
    if args.simulate {
        cfg.actuator.simulate = true;
    }
    if let Some(source) = args.detector.clone() {
        cfg.detector.source = source;
    }
    cfg.validate()?;

    if args.check_key {
        return check_key(&cfg);
    }

    let ui = ui::Ui::from_args(&args.ui, std::io::stderr().is_terminal());
    let mut session = {
        let _stage = ui.stage("Open detector + actuator");
        Session::from_config(&cfg)
    };

    let (tx, rx) = mpsc::channel();
    let interrupt_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = interrupt_tx.send(Input::Interrupt);
    })
    .context("error setting Ctrl-C handler")?;

    // Blocking stdin reads stay off the session thread; the session itself
    // is only ever touched from main.
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(Input::Line(line)).is_err() {
                return;
            }
        }
        let _ = tx.send(Input::Eof);
    });

    if !args.paused {
        let _ = session.start();
    }
    eprintln!("{}", HELP);

    let mut last_rows: Option<usize> = None;
    let mut inactive_reported = false;
    loop {
        match rx.try_recv() {
            Ok(Input::Line(line)) => {
                if !handle_line(&mut session, &ui, &line) {
                    break;
                }
            }
            Ok(Input::Eof) => {
                log::info!("stdin closed");
                break;
            }
            Ok(Input::Interrupt) => {
                log::info!("shutdown signal received");
                break;
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => break,
        }

        match session.tick() {
            Ok(TickOutcome::Rendered { rows }) => {
                if last_rows != Some(rows) {
                    log::info!("{} flavor(s) in view", rows);
                    last_rows = Some(rows);
                }
            }
            Ok(TickOutcome::Skipped) => {}
            Err(CycleError::Inactive) => {
                if !inactive_reported {
                    log::warn!("streaming without a detector; nothing to poll");
                    inactive_reported = true;
                }
            }
            // Already on the message log; keep streaming.
            Err(_) => {}
        }

        let pause = if session.state() == SessionState::Streaming {
            cfg.session.tick_interval
        } else {
            IDLE_POLL
        };
        std::thread::sleep(pause);
    }

    session.shutdown();
    log::info!("sorter stopped");
    Ok(())
}

fn check_key(cfg: &SorterConfig) -> Result<()> {
    let mut detector = open_detector(&cfg.detector, &cfg.frame)?;
    match detector.warm_up() {
        Ok(()) if detector.name() == "http" => {
            println!("API key is valid!");
            Ok(())
        }
        Ok(()) => {
            println!("detector '{}' is ready and uses no API key", detector.name());
            Ok(())
        }
        Err(err) => Err(err.context(format!("detector '{}' check failed", detector.name()))),
    }
}

/// Returns false when the operator asked to quit.
fn handle_line(session: &mut Session, ui: &ui::Ui, line: &str) -> bool {
    let command = match ConsoleCommand::parse(line) {
        Ok(Some(command)) => command,
        Ok(None) => return true,
        Err(err) => {
            eprintln!("{}", err);
            return true;
        }
    };
    match command {
        ConsoleCommand::Start => report_transition(session.start()),
        ConsoleCommand::Stop => report_transition(session.stop()),
        ConsoleCommand::Snapshot => report_transition(session.snapshot()),
        ConsoleCommand::Pick(flavor) => {
            let stage = ui.stage("Pick flavor");
            match session.pick_selected(flavor.as_deref()) {
                Ok(report) => stage.step(&format!(
                    "{} at x{:.3} y{:.3}",
                    report.label, report.target.x_mm, report.target.y_mm
                )),
                Err(err) => stage.step(&err.to_string()),
            }
        }
        ConsoleCommand::AutoPick => {
            let stage = ui.stage("Auto pick");
            let report = session.auto_pick();
            let reason = match report.stop {
                AutoPickStop::Exhausted => "tray empty",
                AutoPickStop::LimitReached => "pick limit reached",
                AutoPickStop::DetectorFailed => "detector failed",
                AutoPickStop::DispatchFailed => "dispatch failed",
            };
            stage.step(&format!("{} picked, {}", report.picked.len(), reason));
        }
        ConsoleCommand::Maintenance(action) => {
            let stage = ui.stage(action.message().trim_end_matches('.'));
            match session.maintenance(action) {
                Ok(response) => stage.step(&format!("response: {}", response)),
                Err(err) => stage.step(&format!("failed: {:#}", err)),
            }
        }
        ConsoleCommand::Table => {
            print!("{}", format_table(&session.table()));
        }
        ConsoleCommand::Help => eprintln!("{}", HELP),
        ConsoleCommand::Quit => return false,
    }
    true
}

fn report_transition(result: Result<(), bean_sorter::TransitionError>) {
    if let Err(err) = result {
        eprintln!("{}", err);
    }
}
