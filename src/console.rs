//! Operator console commands.
//!
//! One command per line on stdin stands in for the button panel:
//! `start`, `stop`, `snapshot`, `pick [flavor]`, `auto`, `home`, `zero`,
//! `reset`, `table`, `help`, `quit`.

use anyhow::{anyhow, Result};

use crate::gcode::MaintenanceAction;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsoleCommand {
    Start,
    Stop,
    Snapshot,
    /// `None` when no flavor was given.
    Pick(Option<String>),
    AutoPick,
    Maintenance(MaintenanceAction),
    Table,
    Help,
    Quit,
}

pub const HELP: &str = concat!(
    "commands: start | stop | snapshot | pick <flavor> | auto | ",
    "home | zero | reset | table | help | quit"
);

impl ConsoleCommand {
    /// Parse one console line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        let command = match verb.to_ascii_lowercase().as_str() {
            "start" => ConsoleCommand::Start,
            "stop" => ConsoleCommand::Stop,
            "snapshot" | "snap" => ConsoleCommand::Snapshot,
            "pick" => {
                let flavor = (!rest.is_empty()).then(|| rest.to_string());
                ConsoleCommand::Pick(flavor)
            }
            "auto" => ConsoleCommand::AutoPick,
            "home" | "zero" | "reset" => ConsoleCommand::Maintenance(verb.parse()?),
            "table" | "stats" => ConsoleCommand::Table,
            "help" | "?" => ConsoleCommand::Help,
            "quit" | "exit" => ConsoleCommand::Quit,
            other => return Err(anyhow!("unknown command '{}'; {}", other, HELP)),
        };
        if !rest.is_empty() && !matches!(command, ConsoleCommand::Pick(_)) {
            return Err(anyhow!("'{}' takes no arguments", verb));
        }
        Ok(Some(command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_actions() {
        assert_eq!(
            ConsoleCommand::parse("start").unwrap(),
            Some(ConsoleCommand::Start)
        );
        assert_eq!(
            ConsoleCommand::parse("  SNAPSHOT ").unwrap(),
            Some(ConsoleCommand::Snapshot)
        );
        assert_eq!(
            ConsoleCommand::parse("home").unwrap(),
            Some(ConsoleCommand::Maintenance(MaintenanceAction::Home))
        );
        assert_eq!(
            ConsoleCommand::parse("reset").unwrap(),
            Some(ConsoleCommand::Maintenance(MaintenanceAction::Reset))
        );
        assert_eq!(ConsoleCommand::parse("").unwrap(), None);
    }

    #[test]
    fn pick_with_and_without_flavor() {
        assert_eq!(
            ConsoleCommand::parse("pick very_cherry").unwrap(),
            Some(ConsoleCommand::Pick(Some("very_cherry".to_string())))
        );
        assert_eq!(
            ConsoleCommand::parse("pick").unwrap(),
            Some(ConsoleCommand::Pick(None))
        );
    }

    #[test]
    fn rejects_unknown_and_extra_arguments() {
        assert!(ConsoleCommand::parse("dance").is_err());
        assert!(ConsoleCommand::parse("stop now").is_err());
    }
}
