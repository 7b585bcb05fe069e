//! Command dispatch to the actuator.
//!
//! One command in flight at a time: frame, write, block for one response line.
//! Real hardware gives no motion-complete signal, so the dispatcher waits a
//! fixed settle delay after every command. The simulated endpoint skips it.

mod channel;
mod mock;
mod serial;

pub use channel::Channel;
pub use mock::{MockChannel, MockMachine, MOCK_ACK};
pub use serial::SerialChannel;

use anyhow::{anyhow, Context, Result};
use std::time::Duration;

use crate::config::ActuatorSettings;
use crate::gcode::Command;

/// GRBL-style wake-up: two blank lines, then let the controller boot.
const WAKE_SEQUENCE: &[u8] = b"\r\n\r\n";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Physical,
    Simulated,
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Physical => write!(f, "physical"),
            Endpoint::Simulated => write!(f, "simulated"),
        }
    }
}

pub struct Dispatcher {
    channel: Box<dyn Channel>,
    endpoint: Endpoint,
    settle_delay: Duration,
    wake_delay: Duration,
    closed: bool,
}

impl Dispatcher {
    /// Open the configured serial device, falling back to the simulated endpoint.
    ///
    /// Never fails: without hardware the rest of the application stays usable.
    pub fn open(settings: &ActuatorSettings) -> Self {
        if settings.simulate {
            log::info!("actuator simulation requested; not opening {}", settings.port);
            return Self::simulated();
        }
        match SerialChannel::open(&settings.port, settings.baud_rate) {
            Ok(channel) => Self::with_channel(
                Box::new(channel),
                Endpoint::Physical,
                settings.settle_delay,
                settings.wake_delay,
            ),
            Err(err) => {
                log::warn!("actuator not found on {}: {:#}", settings.port, err);
                log::warn!("falling back to simulated actuator");
                Self::simulated()
            }
        }
    }

    pub fn simulated() -> Self {
        Self::with_channel(
            Box::new(MockChannel::new()),
            Endpoint::Simulated,
            Duration::ZERO,
            Duration::ZERO,
        )
    }

    pub fn with_channel(
        channel: Box<dyn Channel>,
        endpoint: Endpoint,
        settle_delay: Duration,
        wake_delay: Duration,
    ) -> Self {
        Self {
            channel,
            endpoint,
            settle_delay,
            wake_delay,
            closed: false,
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub fn is_simulated(&self) -> bool {
        self.endpoint == Endpoint::Simulated
    }

    pub fn describe(&self) -> String {
        self.channel.describe()
    }

    /// Send one command and return its trimmed response line.
    pub fn send(&mut self, text: &str) -> Result<String> {
        let command = Command::new(text).map_err(|e| anyhow!("invalid command: {}", e))?;
        self.send_command(&command)
    }

    pub fn send_command(&mut self, command: &Command) -> Result<String> {
        if self.closed {
            return Err(anyhow!("dispatcher is closed"));
        }
        self.channel
            .write_line(&command.to_wire())
            .with_context(|| format!("failed to send '{}'", command))?;
        let response = self
            .channel
            .read_line()
            .with_context(|| format!("no response to '{}'", command))?;
        let response = response.trim_end().to_string();
        log::debug!("'{}' -> '{}'", command, response);
        if self.endpoint == Endpoint::Physical && !self.settle_delay.is_zero() {
            std::thread::sleep(self.settle_delay);
        }
        Ok(response)
    }

    /// Send commands in order, stopping at the first failure.
    pub fn send_all(&mut self, commands: &[Command]) -> Result<Vec<String>> {
        let mut responses = Vec::with_capacity(commands.len());
        for command in commands {
            responses.push(self.send_command(command)?);
        }
        Ok(responses)
    }

    /// Nudge a freshly opened controller awake and drop its boot banner.
    pub fn wake(&mut self) -> Result<()> {
        if self.closed {
            return Err(anyhow!("dispatcher is closed"));
        }
        if self.endpoint == Endpoint::Simulated {
            return Ok(());
        }
        self.channel
            .write_line(WAKE_SEQUENCE)
            .context("failed to wake actuator")?;
        std::thread::sleep(self.wake_delay);
        self.channel.discard_input()
    }

    /// Release the channel. Also runs on drop.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.channel.close()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::warn!("failed to close actuator channel: {}", err);
        }
    }
}
