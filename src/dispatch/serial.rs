//! Serial device channel.
//!
//! 8N1, no flow control, at the configured baud rate. Reads block for up to
//! `RESPONSE_TIMEOUT` waiting for the controller's reply line.

use anyhow::{anyhow, Context, Result};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{BufRead, BufReader, Write};
use std::time::Duration;

use super::channel::Channel;

/// Long moves at low feed rates take a while to be acknowledged.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(60);

pub struct SerialChannel {
    path: String,
    baud_rate: u32,
    writer: Option<Box<dyn SerialPort>>,
    reader: Option<BufReader<Box<dyn SerialPort>>>,
}

impl SerialChannel {
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(RESPONSE_TIMEOUT)
            .open()
            .with_context(|| format!("failed to open serial device {}", path))?;
        let reader = port
            .try_clone()
            .with_context(|| format!("failed to clone serial handle {}", path))?;
        log::info!("SerialChannel: opened {} at {} baud", path, baud_rate);
        Ok(Self {
            path: path.to_string(),
            baud_rate,
            writer: Some(port),
            reader: Some(BufReader::new(reader)),
        })
    }

    fn writer(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.writer
            .as_mut()
            .ok_or_else(|| anyhow!("serial device {} is closed", self.path))
    }

    fn reader(&mut self) -> Result<&mut BufReader<Box<dyn SerialPort>>> {
        self.reader
            .as_mut()
            .ok_or_else(|| anyhow!("serial device {} is closed", self.path))
    }
}

impl Channel for SerialChannel {
    fn describe(&self) -> String {
        format!("serial {} @ {} baud", self.path, self.baud_rate)
    }

    fn write_line(&mut self, line: &[u8]) -> Result<()> {
        let writer = self.writer()?;
        writer.write_all(line).context("serial write failed")?;
        writer.flush().context("serial flush failed")?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<String> {
        let mut buf = String::new();
        let read = self
            .reader()?
            .read_line(&mut buf)
            .context("serial read failed")?;
        if read == 0 {
            return Err(anyhow!("serial device closed (EOF)"));
        }
        Ok(buf)
    }

    fn discard_input(&mut self) -> Result<()> {
        self.writer()?
            .clear(ClearBuffer::Input)
            .context("failed to clear serial input")?;
        // Bytes already pulled into the buffer predate the clear.
        if let Some(reader) = self.reader.take() {
            self.reader = Some(BufReader::new(reader.into_inner()));
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.writer.take().is_some() {
            self.reader = None;
            log::info!("SerialChannel: closed {}", self.path);
        }
        Ok(())
    }
}
