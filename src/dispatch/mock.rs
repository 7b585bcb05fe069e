//! Simulated actuator endpoint.
//!
//! Accepts every command and answers `ok`. Tracks where the machine would be
//! from the G-code it sees so runs without hardware still log something useful.

use anyhow::Result;
use regex::Regex;
use std::sync::{Arc, Mutex, OnceLock};

use super::channel::Channel;

pub const MOCK_ACK: &str = "ok";

/// Simulated machine state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MockMachine {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub gripper_engaged: bool,
    /// Every command received, without terminator.
    pub received: Vec<String>,
}

pub struct MockChannel {
    machine: Arc<Mutex<MockMachine>>,
}

impl MockChannel {
    pub fn new() -> Self {
        log::info!("MockChannel: initialized simulated actuator");
        Self {
            machine: Arc::new(Mutex::new(MockMachine::default())),
        }
    }

    /// Shared handle to the simulated machine, for status output and tests.
    pub fn machine(&self) -> Arc<Mutex<MockMachine>> {
        self.machine.clone()
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl Channel for MockChannel {
    fn describe(&self) -> String {
        "simulated actuator".to_string()
    }

    fn write_line(&mut self, line: &[u8]) -> Result<()> {
        let text = String::from_utf8_lossy(line).trim().to_string();
        if text.is_empty() {
            return Ok(());
        }
        log::info!("MockChannel: received command: {}", text);
        let mut machine = self
            .machine
            .lock()
            .map_err(|_| anyhow::anyhow!("mock machine lock poisoned"))?;
        apply_gcode(&mut machine, &text);
        machine.received.push(text);
        Ok(())
    }

    fn read_line(&mut self) -> Result<String> {
        Ok(format!("{}\n", MOCK_ACK))
    }

    fn close(&mut self) -> Result<()> {
        log::info!("MockChannel: connection closed");
        Ok(())
    }
}

fn axis_word_re() -> &'static Regex {
    static AXIS_WORD_RE: OnceLock<Regex> = OnceLock::new();
    AXIS_WORD_RE.get_or_init(|| Regex::new(r"(?i)\b([xyz])(-?\d+(?:\.\d+)?)").unwrap())
}

fn apply_gcode(machine: &mut MockMachine, text: &str) {
    let upper = text.to_ascii_uppercase();
    let mut words = upper.split_whitespace();
    match words.next() {
        Some("G01") | Some("G1") | Some("G00") | Some("G0") => {
            for caps in axis_word_re().captures_iter(text) {
                let Ok(value) = caps[2].parse::<f64>() else {
                    continue;
                };
                match caps[1].to_ascii_lowercase().as_str() {
                    "x" => machine.x = value,
                    "y" => machine.y = value,
                    "z" => machine.z = value,
                    _ => {}
                }
            }
        }
        Some("M08") | Some("M8") => machine.gripper_engaged = true,
        Some("M09") | Some("M9") => machine.gripper_engaged = false,
        Some("G28") | Some("$H") => {
            machine.x = 0.0;
            machine.y = 0.0;
            machine.z = 0.0;
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_position_and_gripper() {
        let mut channel = MockChannel::new();
        let machine = channel.machine();

        channel.write_line(b"G01 x1.5 y2.62 f300\n").unwrap();
        assert_eq!(channel.read_line().unwrap().trim_end(), MOCK_ACK);
        channel.write_line(b"M08\n").unwrap();
        channel.write_line(b"G01 z0.325 f300\n").unwrap();

        let state = machine.lock().unwrap().clone();
        assert_eq!(state.x, 1.5);
        assert_eq!(state.y, 2.62);
        assert_eq!(state.z, 0.325);
        assert!(state.gripper_engaged);
        assert_eq!(state.received.len(), 3);
    }

    #[test]
    fn home_resets_position() {
        let mut channel = MockChannel::new();
        channel.write_line(b"G01 x-1 y2 f300\n").unwrap();
        channel.write_line(b"$h\n").unwrap();
        let state = channel.machine().lock().unwrap().clone();
        assert_eq!((state.x, state.y, state.z), (0.0, 0.0, 0.0));
    }
}
