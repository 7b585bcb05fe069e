use anyhow::Result;

/// Line-oriented byte channel to the actuator.
///
/// The dispatcher owns exactly one channel for its lifetime and never has more
/// than one request in flight.
pub trait Channel: Send {
    /// Human readable endpoint description for status messages.
    fn describe(&self) -> String;

    /// Write one already-framed line (terminator included).
    fn write_line(&mut self, line: &[u8]) -> Result<()>;

    /// Block until one response line arrives. The terminator may be included.
    fn read_line(&mut self) -> Result<String>;

    /// Drop any unread input (used after waking the controller).
    fn discard_input(&mut self) -> Result<()> {
        Ok(())
    }

    /// Release the underlying device.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
