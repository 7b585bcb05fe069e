//! G-code commands and the pickup macro.

use serde::{Deserialize, Serialize};

use crate::MachineCoordinate;

/// Rejected command text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandError {
    Empty,
    MultiLine,
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::Empty => write!(f, "command is empty"),
            CommandError::MultiLine => write!(f, "command contains a line break"),
        }
    }
}

impl std::error::Error for CommandError {}

/// One line-oriented actuator command.
///
/// Non-empty and free of line breaks. The newline terminator is only added
/// on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Command(String);

impl Command {
    pub fn new(text: impl AsRef<str>) -> Result<Self, CommandError> {
        let trimmed = text.as_ref().trim();
        if trimmed.is_empty() {
            return Err(CommandError::Empty);
        }
        if trimmed.contains(['\n', '\r']) {
            return Err(CommandError::MultiLine);
        }
        Ok(Self(trimmed.to_string()))
    }

    // Constructors below always produce valid single-line text.
    fn unchecked(text: String) -> Self {
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_wire(&self) -> Vec<u8> {
        let mut wire = Vec::with_capacity(self.0.len() + 1);
        wire.extend_from_slice(self.0.as_bytes());
        wire.push(b'\n');
        wire
    }

    pub fn linear_move(x: f64, y: f64, feed: u32) -> Self {
        Self::unchecked(format!("G01 x{} y{} f{}", x, y, feed))
    }

    pub fn z_move(z: f64, feed: u32) -> Self {
        Self::unchecked(format!("G01 z{} f{}", z, feed))
    }

    /// Return to the machine origin in the XY plane.
    pub fn park(feed: u32) -> Self {
        Self::linear_move(0.0, 0.0, feed)
    }

    pub fn gripper_engage() -> Self {
        Self::unchecked("M08".to_string())
    }

    pub fn gripper_disengage() -> Self {
        Self::unchecked("M09".to_string())
    }

    pub fn home() -> Self {
        Self::unchecked("$h".to_string())
    }

    pub fn zero() -> Self {
        Self::unchecked("G28".to_string())
    }

    pub fn unlock() -> Self {
        Self::unchecked("$x".to_string())
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::new(s)
    }
}

/// Travel range of each machine axis, in machine units.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TravelBounds {
    pub x: (f64, f64),
    pub y: (f64, f64),
    pub z: (f64, f64),
}

impl Default for TravelBounds {
    fn default() -> Self {
        Self {
            x: (0.0, 3.45),
            y: (0.0, 3.6),
            z: (0.0, 0.325),
        }
    }
}

impl TravelBounds {
    pub fn contains(&self, target: MachineCoordinate) -> bool {
        self.axes_outside(target).is_empty()
    }

    /// Names of the axes on which `target` lies outside travel.
    pub fn axes_outside(&self, target: MachineCoordinate) -> Vec<&'static str> {
        let mut out = Vec::new();
        if target.x_mm < self.x.0 || target.x_mm > self.x.1 {
            out.push("x");
        }
        if target.y_mm < self.y.0 || target.y_mm > self.y.1 {
            out.push("y");
        }
        out
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MachineProfile {
    pub bounds: TravelBounds,
    pub feed_rate: u32,
}

impl Default for MachineProfile {
    fn default() -> Self {
        Self {
            bounds: TravelBounds::default(),
            feed_rate: 300,
        }
    }
}

/// Build the fixed pickup macro for a target position.
///
/// Order matters to the machine: move over the bean, engage, lift to full Z
/// travel, drop back to Z0, return to the origin, release. Only the first
/// command depends on `target`.
pub fn build_sequence(target: MachineCoordinate, profile: &MachineProfile) -> Vec<Command> {
    let feed = profile.feed_rate;
    vec![
        Command::linear_move(target.x_mm, target.y_mm, feed),
        Command::gripper_engage(),
        Command::z_move(profile.bounds.z.1, feed),
        Command::z_move(0.0, feed),
        Command::park(feed),
        Command::gripper_disengage(),
    ]
}

/// Operator maintenance commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaintenanceAction {
    Home,
    Zero,
    Reset,
}

impl MaintenanceAction {
    pub fn command(self) -> Command {
        match self {
            MaintenanceAction::Home => Command::home(),
            MaintenanceAction::Zero => Command::zero(),
            MaintenanceAction::Reset => Command::unlock(),
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            MaintenanceAction::Home => "Homing machine...",
            MaintenanceAction::Zero => "Setting machine zero point...",
            MaintenanceAction::Reset => "Resetting machine...",
        }
    }
}

impl std::str::FromStr for MaintenanceAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "home" => Ok(MaintenanceAction::Home),
            "zero" => Ok(MaintenanceAction::Zero),
            "reset" | "unlock" => Ok(MaintenanceAction::Reset),
            other => Err(anyhow::anyhow!(
                "unknown maintenance action '{}'; expected home, zero or reset",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pickup_macro_is_six_commands_in_order() {
        let seq = build_sequence(
            MachineCoordinate {
                x_mm: 1.5,
                y_mm: 2.62,
            },
            &MachineProfile::default(),
        );
        let text: Vec<&str> = seq.iter().map(Command::as_str).collect();
        assert_eq!(
            text,
            vec![
                "G01 x1.5 y2.62 f300",
                "M08",
                "G01 z0.325 f300",
                "G01 z0 f300",
                "G01 x0 y0 f300",
                "M09",
            ]
        );
    }

    #[test]
    fn only_first_command_depends_on_target() {
        let profile = MachineProfile::default();
        let a = build_sequence(MachineCoordinate { x_mm: 0.1, y_mm: 0.2 }, &profile);
        let b = build_sequence(MachineCoordinate { x_mm: 3.0, y_mm: 1.0 }, &profile);
        assert_ne!(a[0], b[0]);
        assert_eq!(a[1..], b[1..]);
    }

    #[test]
    fn lift_uses_configured_z_travel() {
        let profile = MachineProfile {
            bounds: TravelBounds {
                z: (0.0, 1.25),
                ..TravelBounds::default()
            },
            feed_rate: 120,
        };
        let seq = build_sequence(MachineCoordinate::default(), &profile);
        assert_eq!(seq[2].as_str(), "G01 z1.25 f120");
        assert_eq!(seq[4].as_str(), "G01 x0 y0 f120");
    }

    #[test]
    fn command_rejects_empty_and_multiline() {
        assert_eq!(Command::new("   "), Err(CommandError::Empty));
        assert_eq!(Command::new("G28\nM08"), Err(CommandError::MultiLine));
        assert_eq!(Command::new("  $h \r\n").unwrap().as_str(), "$h");
    }

    #[test]
    fn wire_form_is_newline_terminated() {
        assert_eq!(Command::gripper_engage().to_wire(), b"M08\n".to_vec());
    }

    #[test]
    fn bounds_report_axes_outside_travel() {
        let bounds = TravelBounds::default();
        assert!(bounds.contains(MachineCoordinate { x_mm: 1.0, y_mm: 1.0 }));
        assert_eq!(
            bounds.axes_outside(MachineCoordinate { x_mm: 4.0, y_mm: -0.1 }),
            vec!["x", "y"]
        );
    }

    #[test]
    fn maintenance_commands() {
        assert_eq!(MaintenanceAction::Home.command().as_str(), "$h");
        assert_eq!(MaintenanceAction::Zero.command().as_str(), "G28");
        assert_eq!(MaintenanceAction::Reset.command().as_str(), "$x");
        assert_eq!(
            "unlock".parse::<MaintenanceAction>().unwrap(),
            MaintenanceAction::Reset
        );
        assert!("spin".parse::<MaintenanceAction>().is_err());
    }
}
