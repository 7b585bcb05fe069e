//! gcode_send - one-shot commands to the motion controller
//!
//! Sends maintenance actions (home, zero, reset) and raw G-code lines in
//! order, printing each response. Falls back to the simulated actuator when
//! the serial device cannot be opened.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::time::Duration;

use bean_sorter::{Command, Dispatcher, MaintenanceAction, SorterConfig};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about = "Send maintenance actions or raw G-code to the sorter machine")]
struct Args {
    /// Serial device of the motion controller.
    #[arg(long)]
    port: Option<String>,

    /// Serial baud rate.
    #[arg(long)]
    baud: Option<u32>,

    /// Settle delay after each command, in milliseconds.
    #[arg(long)]
    settle_ms: Option<u64>,

    /// Use the simulated actuator.
    #[arg(long)]
    simulate: bool,

    /// Wake the controller before sending.
    #[arg(long)]
    wake: bool,

    /// Maintenance action to send first (home|zero|reset). Repeatable.
    #[arg(long = "action", value_name = "ACTION")]
    actions: Vec<MaintenanceAction>,

    /// Raw G-code lines, sent after the actions.
    #[arg(value_name = "GCODE")]
    commands: Vec<String>,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut commands: Vec<Command> = args.actions.iter().map(|a| a.command()).collect();
    for raw in &args.commands {
        commands.push(Command::new(raw).map_err(|e| anyhow!("'{}': {}", raw, e))?);
    }
    if commands.is_empty() {
        return Err(anyhow!("nothing to send; pass --action or G-code lines"));
    }

    let mut cfg = SorterConfig::load()?;
    if let Some(port) = args.port {
        cfg.actuator.port = port;
    }
    if let Some(baud) = args.baud {
        cfg.actuator.baud_rate = baud;
    }
    if let Some(settle_ms) = args.settle_ms {
        cfg.actuator.settle_delay = Duration::from_millis(settle_ms);
    }
    if args.simulate {
        cfg.actuator.simulate = true;
    }
    cfg.validate()?;

    let ui = ui::Ui::from_args(&args.ui, std::io::stderr().is_terminal());
    let mut dispatcher = {
        let _stage = ui.stage("Open actuator");
        Dispatcher::open(&cfg.actuator)
    };
    println!(
        "gcode_send: {} endpoint ({})",
        dispatcher.endpoint(),
        dispatcher.describe()
    );

    if args.wake {
        let _stage = ui.stage("Wake controller");
        dispatcher.wake()?;
    }

    {
        let stage = ui.stage("Send commands");
        for command in &commands {
            stage.step(command.as_str());
            let response = dispatcher.send_command(command)?;
            println!("{} -> {}", command, response);
        }
    }

    dispatcher.close()?;
    Ok(())
}
