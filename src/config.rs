use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::gcode::{MachineProfile, TravelBounds};
use crate::mapping::{AxisTransform, CoordinateMapper, Orientation};

const DEFAULT_FRAME_WIDTH: u32 = 640;
const DEFAULT_FRAME_HEIGHT: u32 = 640;
const DEFAULT_SCALE: [f64; 2] = [0.41, -0.41];
const DEFAULT_OFFSET: [f64; 2] = [150.0, 262.0];
const DEFAULT_DIVISOR: f64 = 100.0;
const DEFAULT_FEED_RATE: u32 = 300;
const DEFAULT_SERIAL_PORT: &str = "/dev/ttyACM0";
const DEFAULT_BAUD_RATE: u32 = 9600;
const DEFAULT_SETTLE_MS: u64 = 1000;
const DEFAULT_WAKE_MS: u64 = 2000;
const DEFAULT_DETECTOR_SOURCE: &str = "sim://tray";
const DEFAULT_MODEL: &str = "jellybelly5";
const DEFAULT_MODEL_VERSION: &str = "1";
const DEFAULT_CONFIDENCE: f64 = 0.10;
const DEFAULT_OVERLAP: f64 = 0.5;
const DEFAULT_TICK_MS: u64 = 1;
const DEFAULT_AUTO_PICK_LIMIT: usize = 64;

#[derive(Debug, Deserialize, Default)]
struct SorterConfigFile {
    frame: Option<FrameConfigFile>,
    mapping: Option<MappingConfigFile>,
    machine: Option<MachineConfigFile>,
    actuator: Option<ActuatorConfigFile>,
    detector: Option<DetectorConfigFile>,
    session: Option<SessionConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct FrameConfigFile {
    width: Option<u32>,
    height: Option<u32>,
    flip_x: Option<bool>,
    flip_y: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct MappingConfigFile {
    scale: Option<[f64; 2]>,
    offset: Option<[f64; 2]>,
    divisor: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct MachineConfigFile {
    x_travel: Option<(f64, f64)>,
    y_travel: Option<(f64, f64)>,
    z_travel: Option<(f64, f64)>,
    feed_rate: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ActuatorConfigFile {
    port: Option<String>,
    baud_rate: Option<u32>,
    settle_ms: Option<u64>,
    wake_ms: Option<u64>,
    simulate: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    source: Option<String>,
    model: Option<String>,
    version: Option<String>,
    api_key_path: Option<PathBuf>,
    confidence: Option<f64>,
    overlap: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct SessionConfigFile {
    tick_ms: Option<u64>,
    auto_pick_limit: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct SorterConfig {
    pub frame: FrameSettings,
    pub mapping: MappingSettings,
    pub machine: MachineProfile,
    pub actuator: ActuatorSettings,
    pub detector: DetectorSettings,
    pub session: SessionSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameSettings {
    pub width: u32,
    pub height: u32,
    pub orientation: Orientation,
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            width: DEFAULT_FRAME_WIDTH,
            height: DEFAULT_FRAME_HEIGHT,
            orientation: Orientation::MIRRORED,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MappingSettings {
    pub x: AxisTransform,
    pub y: AxisTransform,
    pub divisor: f64,
}

impl Default for MappingSettings {
    fn default() -> Self {
        Self {
            x: AxisTransform::new(DEFAULT_SCALE[0], DEFAULT_OFFSET[0]),
            y: AxisTransform::new(DEFAULT_SCALE[1], DEFAULT_OFFSET[1]),
            divisor: DEFAULT_DIVISOR,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActuatorSettings {
    pub port: String,
    pub baud_rate: u32,
    /// Pause after each command on real hardware.
    pub settle_delay: Duration,
    /// Pause after the wake-up line before a manual pick.
    pub wake_delay: Duration,
    /// Skip the serial device entirely and use the simulated endpoint.
    pub simulate: bool,
}

impl Default for ActuatorSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_SERIAL_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_MS),
            wake_delay: Duration::from_millis(DEFAULT_WAKE_MS),
            simulate: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorSettings {
    /// `sim://tray?beans=N&seed=S`, `http(s)://...`, or a JSON-lines replay file.
    pub source: String,
    pub model: String,
    pub version: String,
    pub api_key: Option<String>,
    pub confidence: f64,
    pub overlap: f64,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            source: DEFAULT_DETECTOR_SOURCE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            version: DEFAULT_MODEL_VERSION.to_string(),
            api_key: None,
            confidence: DEFAULT_CONFIDENCE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub tick_interval: Duration,
    pub auto_pick_limit: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(DEFAULT_TICK_MS),
            auto_pick_limit: DEFAULT_AUTO_PICK_LIMIT,
        }
    }
}

impl Default for SorterConfig {
    fn default() -> Self {
        Self {
            frame: FrameSettings::default(),
            mapping: MappingSettings::default(),
            machine: MachineProfile::default(),
            actuator: ActuatorSettings::default(),
            detector: DetectorSettings::default(),
            session: SessionSettings::default(),
        }
    }
}

impl SorterConfig {
    /// Load from `SORTER_CONFIG` (if set), then apply `SORTER_*` overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SORTER_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SorterConfigFile) -> Result<Self> {
        let frame_file = file.frame.unwrap_or_default();
        let frame = FrameSettings {
            width: frame_file.width.unwrap_or(DEFAULT_FRAME_WIDTH),
            height: frame_file.height.unwrap_or(DEFAULT_FRAME_HEIGHT),
            orientation: Orientation {
                flip_x: frame_file.flip_x.unwrap_or(true),
                flip_y: frame_file.flip_y.unwrap_or(true),
            },
        };

        let mapping_file = file.mapping.unwrap_or_default();
        let scale = mapping_file.scale.unwrap_or(DEFAULT_SCALE);
        let offset = mapping_file.offset.unwrap_or(DEFAULT_OFFSET);
        let mapping = MappingSettings {
            x: AxisTransform::new(scale[0], offset[0]),
            y: AxisTransform::new(scale[1], offset[1]),
            divisor: mapping_file.divisor.unwrap_or(DEFAULT_DIVISOR),
        };

        let machine_file = file.machine.unwrap_or_default();
        let default_bounds = TravelBounds::default();
        let machine = MachineProfile {
            bounds: TravelBounds {
                x: machine_file.x_travel.unwrap_or(default_bounds.x),
                y: machine_file.y_travel.unwrap_or(default_bounds.y),
                z: machine_file.z_travel.unwrap_or(default_bounds.z),
            },
            feed_rate: machine_file.feed_rate.unwrap_or(DEFAULT_FEED_RATE),
        };

        let actuator_file = file.actuator.unwrap_or_default();
        let actuator = ActuatorSettings {
            port: actuator_file
                .port
                .unwrap_or_else(|| DEFAULT_SERIAL_PORT.to_string()),
            baud_rate: actuator_file.baud_rate.unwrap_or(DEFAULT_BAUD_RATE),
            settle_delay: Duration::from_millis(
                actuator_file.settle_ms.unwrap_or(DEFAULT_SETTLE_MS),
            ),
            wake_delay: Duration::from_millis(actuator_file.wake_ms.unwrap_or(DEFAULT_WAKE_MS)),
            simulate: actuator_file.simulate.unwrap_or(false),
        };

        let detector_file = file.detector.unwrap_or_default();
        let api_key = match detector_file.api_key_path.as_deref() {
            Some(path) => Some(read_api_key(path)?),
            None => None,
        };
        let detector = DetectorSettings {
            source: detector_file
                .source
                .unwrap_or_else(|| DEFAULT_DETECTOR_SOURCE.to_string()),
            model: detector_file
                .model
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            version: detector_file
                .version
                .unwrap_or_else(|| DEFAULT_MODEL_VERSION.to_string()),
            api_key,
            confidence: detector_file.confidence.unwrap_or(DEFAULT_CONFIDENCE),
            overlap: detector_file.overlap.unwrap_or(DEFAULT_OVERLAP),
        };

        let session_file = file.session.unwrap_or_default();
        let session = SessionSettings {
            tick_interval: Duration::from_millis(session_file.tick_ms.unwrap_or(DEFAULT_TICK_MS)),
            auto_pick_limit: session_file
                .auto_pick_limit
                .unwrap_or(DEFAULT_AUTO_PICK_LIMIT),
        };

        Ok(Self {
            frame,
            mapping,
            machine,
            actuator,
            detector,
            session,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(port) = std::env::var("SORTER_SERIAL_PORT") {
            if !port.trim().is_empty() {
                self.actuator.port = port;
            }
        }
        if let Ok(baud) = std::env::var("SORTER_BAUD_RATE") {
            self.actuator.baud_rate = baud
                .trim()
                .parse()
                .map_err(|_| anyhow!("SORTER_BAUD_RATE must be an integer"))?;
        }
        if let Ok(settle) = std::env::var("SORTER_SETTLE_MS") {
            let millis: u64 = settle.trim().parse().map_err(|_| {
                anyhow!("SORTER_SETTLE_MS must be an integer number of milliseconds")
            })?;
            self.actuator.settle_delay = Duration::from_millis(millis);
        }
        if let Ok(simulate) = std::env::var("SORTER_SIMULATE") {
            self.actuator.simulate = parse_flag(&simulate);
        }
        if let Ok(source) = std::env::var("SORTER_DETECTOR_SOURCE") {
            if !source.trim().is_empty() {
                self.detector.source = source;
            }
        }
        if let Ok(confidence) = std::env::var("SORTER_CONFIDENCE") {
            self.detector.confidence = confidence
                .trim()
                .parse()
                .map_err(|_| anyhow!("SORTER_CONFIDENCE must be a number in [0, 1]"))?;
        }
        if let Ok(key) = std::env::var("SORTER_API_KEY") {
            if !key.trim().is_empty() {
                self.detector.api_key = Some(key.trim().to_string());
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame.width == 0 || self.frame.height == 0 {
            return Err(anyhow!("frame dimensions must be non-zero"));
        }
        if self.mapping.divisor == 0.0 || !self.mapping.divisor.is_finite() {
            return Err(anyhow!("mapping divisor must be a non-zero number"));
        }
        if self.machine.feed_rate == 0 {
            return Err(anyhow!("feed rate must be greater than zero"));
        }
        for (axis, (min, max)) in [
            ("x", self.machine.bounds.x),
            ("y", self.machine.bounds.y),
            ("z", self.machine.bounds.z),
        ] {
            if min > max {
                return Err(anyhow!(
                    "{} travel bounds are inverted ({} > {})",
                    axis,
                    min,
                    max
                ));
            }
        }
        if self.actuator.baud_rate == 0 {
            return Err(anyhow!("baud rate must be greater than zero"));
        }
        for (name, value) in [
            ("confidence", self.detector.confidence),
            ("overlap", self.detector.overlap),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("detector {} threshold must be in [0, 1]", name));
            }
        }
        if self.session.auto_pick_limit == 0 {
            return Err(anyhow!("auto pick limit must be greater than zero"));
        }
        Ok(())
    }

    pub fn mapper(&self) -> CoordinateMapper {
        CoordinateMapper::new(
            self.frame.width,
            self.frame.height,
            self.frame.orientation,
            self.mapping.x,
            self.mapping.y,
            self.mapping.divisor,
        )
    }
}

fn read_config_file(path: &Path) -> Result<SorterConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn read_api_key(path: &Path) -> Result<String> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read api key file {}: {}", path.display(), e))?;
    let key = raw.trim();
    if key.is_empty() {
        return Err(anyhow!("api key file {} is empty", path.display()));
    }
    Ok(key.to_string())
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
