//! Sorting session controller.
//!
//! Owns the run state and wires detector, aggregator, mapper, sequencer and
//! dispatcher together. Everything runs on the caller's thread: one `tick` is
//! one blocking poll-aggregate-render cycle, and a pick blocks until every
//! command of the macro has been acknowledged.
//!
//! Failures never tear the session down. Each one is turned into a message on
//! the session's `MessageLog` and returned as a typed error to the caller.

use std::collections::VecDeque;

use crate::aggregate::{aggregate, FlavorStat};
use crate::config::{SessionSettings, SorterConfig};
use crate::detect::{open_detector, Detector, Frame};
use crate::dispatch::Dispatcher;
use crate::gcode::{build_sequence, Command, MachineProfile, MaintenanceAction};
use crate::mapping::CoordinateMapper;
use crate::render::{draw_markers, render_table, TableRow};
use crate::{MachineCoordinate, PixelCoord};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Streaming,
    /// Polling paused; the last rendered frame and stats stay on display.
    Snapshot,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionAction {
    Start,
    Stop,
    Snapshot,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransitionError {
    pub from: SessionState,
    pub action: SessionAction,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cannot {:?} while {:?}", self.action, self.from)
    }
}

impl std::error::Error for TransitionError {}

/// The only legal state changes.
pub fn transition(
    from: SessionState,
    action: SessionAction,
) -> Result<SessionState, TransitionError> {
    use SessionAction as A;
    use SessionState as S;
    match (from, action) {
        (S::Idle, A::Start) => Ok(S::Streaming),
        (S::Streaming, A::Stop) => Ok(S::Idle),
        (S::Streaming, A::Snapshot) => Ok(S::Snapshot),
        (S::Snapshot, A::Start) => Ok(S::Streaming),
        (S::Snapshot, A::Stop) => Ok(S::Idle),
        _ => Err(TransitionError { from, action }),
    }
}

/// Which stage of a poll cycle failed.
#[derive(Debug)]
pub enum CycleError {
    /// No detector is available.
    Inactive,
    Detector(anyhow::Error),
    Render(anyhow::Error),
}

impl std::fmt::Display for CycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleError::Inactive => write!(f, "detector is inactive"),
            CycleError::Detector(err) => write!(f, "detector error: {:#}", err),
            CycleError::Render(err) => write!(f, "render error: {:#}", err),
        }
    }
}

impl std::error::Error for CycleError {}

#[derive(Debug)]
pub enum PickError {
    NoSelection,
    UnknownFlavor(String),
    Dispatch(anyhow::Error),
}

impl std::fmt::Display for PickError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PickError::NoSelection => write!(f, "no flavor selected"),
            PickError::UnknownFlavor(label) => {
                write!(f, "no coordinates known for flavor '{}'", label)
            }
            PickError::Dispatch(err) => write!(f, "dispatch failed: {:#}", err),
        }
    }
}

impl std::error::Error for PickError {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not streaming; nothing polled.
    Skipped,
    Rendered { rows: usize },
}

#[derive(Clone, Debug)]
pub struct PickReport {
    pub label: String,
    pub target: MachineCoordinate,
    pub commands: Vec<Command>,
    pub responses: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AutoPickStop {
    /// No rows left: the tray is empty.
    Exhausted,
    LimitReached,
    DetectorFailed,
    DispatchFailed,
}

#[derive(Clone, Debug)]
pub struct AutoPickReport {
    pub picked: Vec<String>,
    pub stop: AutoPickStop,
}

/// Messages kept on the log before the oldest are dropped.
pub const MESSAGE_LOG_CAPACITY: usize = 256;

/// User-visible message history.
///
/// Bounded: past `capacity` entries the oldest is dropped. A message equal to
/// the latest entry is counted instead of stored again, and the count is
/// flushed as one summary line when a different message arrives.
#[derive(Clone, Debug)]
pub struct MessageLog {
    entries: VecDeque<String>,
    capacity: usize,
    repeats: usize,
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::with_capacity(MESSAGE_LOG_CAPACITY)
    }
}

impl MessageLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(MESSAGE_LOG_CAPACITY)),
            capacity: capacity.max(1),
            repeats: 0,
        }
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.record(message.into(), log::Level::Info);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.record(message.into(), log::Level::Warn);
    }

    fn record(&mut self, message: String, level: log::Level) {
        if self.last() == Some(message.as_str()) {
            self.repeats += 1;
            log::debug!("{} (repeat {})", message, self.repeats);
            return;
        }
        if self.repeats > 0 {
            let summary = format!("(last message repeated {} more times)", self.repeats);
            self.repeats = 0;
            log::log!(level, "{}", summary);
            self.append(summary);
        }
        log::log!(level, "{}", message);
        self.append(message);
    }

    fn append(&mut self, message: String) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(message);
    }

    pub fn last(&self) -> Option<&str> {
        self.entries.back().map(String::as_str)
    }

    /// Oldest first.
    pub fn entries(&self) -> Vec<&str> {
        self.entries.iter().map(String::as_str).collect()
    }

    pub fn contains(&self, message: &str) -> bool {
        self.entries.iter().any(|entry| entry == message)
    }

    /// Times the latest entry was repeated since it was stored.
    pub fn repeats(&self) -> usize {
        self.repeats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct Session {
    state: SessionState,
    detector: Option<Box<dyn Detector>>,
    dispatcher: Dispatcher,
    mapper: CoordinateMapper,
    profile: MachineProfile,
    auto_pick_limit: usize,
    stats: Vec<FlavorStat>,
    frame: Option<Frame>,
    messages: MessageLog,
}

impl Session {
    pub fn new(
        detector: Option<Box<dyn Detector>>,
        dispatcher: Dispatcher,
        mapper: CoordinateMapper,
        profile: MachineProfile,
        settings: &SessionSettings,
    ) -> Self {
        let mut session = Self {
            state: SessionState::Idle,
            detector,
            dispatcher,
            mapper,
            profile,
            auto_pick_limit: settings.auto_pick_limit,
            stats: Vec::new(),
            frame: None,
            messages: MessageLog::default(),
        };
        let detector_status = match &session.detector {
            Some(detector) => format!("Detector '{}' is active!", detector.name()),
            None => "Detector is inactive!".to_string(),
        };
        session.messages.push(detector_status);
        let endpoint_status = if session.dispatcher.is_simulated() {
            "Using simulated actuator (testing mode)".to_string()
        } else {
            format!("Using actuator on {}", session.dispatcher.describe())
        };
        session.messages.push(endpoint_status);
        session
    }

    /// Open detector and dispatcher from configuration.
    ///
    /// A detector that cannot be built or warmed up leaves the session running
    /// with the detector inactive. The dispatcher falls back to simulation.
    pub fn from_config(cfg: &SorterConfig) -> Self {
        let detector = match open_detector(&cfg.detector, &cfg.frame) {
            Ok(mut detector) => match detector.warm_up() {
                Ok(()) => Some(detector),
                Err(err) => {
                    log::error!("detector warm-up failed: {:#}", err);
                    None
                }
            },
            Err(err) => {
                log::error!("detector initialization failed: {:#}", err);
                None
            }
        };
        let dispatcher = Dispatcher::open(&cfg.actuator);
        Self::new(
            detector,
            dispatcher,
            cfg.mapper(),
            cfg.machine,
            &cfg.session,
        )
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn detector_active(&self) -> bool {
        self.detector.is_some()
    }

    pub fn stats(&self) -> &[FlavorStat] {
        &self.stats
    }

    /// Frame currently on display (frozen while in snapshot).
    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    pub fn messages(&self) -> &MessageLog {
        &self.messages
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn table(&self) -> Vec<TableRow> {
        render_table(&self.stats, &self.mapper)
    }

    fn apply(&mut self, action: SessionAction) -> Result<SessionState, TransitionError> {
        let from = self.state;
        match transition(from, action) {
            Ok(next) => {
                log::debug!("session {:?} -> {:?}", from, next);
                self.state = next;
                Ok(next)
            }
            Err(err) => {
                log::debug!("rejected transition: {}", err);
                Err(err)
            }
        }
    }

    pub fn start(&mut self) -> Result<(), TransitionError> {
        self.apply(SessionAction::Start)?;
        Ok(())
    }

    /// Stop polling. Leaving a live stream clears the display; leaving a
    /// snapshot keeps the frozen frame.
    pub fn stop(&mut self) -> Result<(), TransitionError> {
        let from = self.state;
        self.apply(SessionAction::Stop)?;
        if from == SessionState::Streaming {
            self.stats.clear();
            self.frame = None;
        }
        Ok(())
    }

    pub fn snapshot(&mut self) -> Result<(), TransitionError> {
        self.apply(SessionAction::Snapshot)?;
        self.messages.push("Snapshot taken");
        Ok(())
    }

    /// One poll-aggregate-render cycle. No-op unless streaming.
    pub fn tick(&mut self) -> Result<TickOutcome, CycleError> {
        if self.state != SessionState::Streaming {
            return Ok(TickOutcome::Skipped);
        }
        let detector = self.detector.as_mut().ok_or(CycleError::Inactive)?;
        let polled = match detector.next_frame() {
            Ok(polled) => polled,
            Err(err) => {
                self.messages.warn(format!("Video feed error: {:#}", err));
                return Err(CycleError::Detector(err));
            }
        };

        self.stats = aggregate(&polled.detections);

        let mut frame = polled.frame;
        if let Err(err) = draw_markers(&mut frame, &self.stats) {
            self.messages.warn(format!("Render error: {:#}", err));
            return Err(CycleError::Render(err));
        }
        self.frame = Some(frame);
        Ok(TickOutcome::Rendered {
            rows: self.stats.len(),
        })
    }

    /// Pick the bean of the selected flavor at its last-seen position.
    pub fn pick_selected(&mut self, selection: Option<&str>) -> Result<PickReport, PickError> {
        let Some(label) = selection.map(str::trim).filter(|label| !label.is_empty()) else {
            self.messages.warn("No flavor selected!");
            return Err(PickError::NoSelection);
        };
        let Some(coord) = self
            .stats
            .iter()
            .find(|stat| stat.label == label)
            .map(|stat| stat.last_coord)
        else {
            self.messages
                .warn(format!("Coordinates for '{}' don't exist!", label));
            return Err(PickError::UnknownFlavor(label.to_string()));
        };
        let label = label.to_string();

        if let Err(err) = self.dispatcher.wake() {
            self.messages
                .warn(format!("Could not wake actuator: {:#}", err));
            return Err(PickError::Dispatch(err));
        }
        self.pick_at(&label, coord)
    }

    fn pick_at(&mut self, label: &str, coord: PixelCoord) -> Result<PickReport, PickError> {
        let target = self.mapper.map_coord(coord);
        let outside = self.profile.bounds.axes_outside(target);
        if !outside.is_empty() {
            log::warn!(
                "pick target ({}, {}) is outside travel on axis {}; sending unclamped",
                target.x_mm,
                target.y_mm,
                outside.join(",")
            );
        }

        let commands = build_sequence(target, &self.profile);
        self.messages.push(format!("Picking up: {}", label));
        let mut responses = Vec::with_capacity(commands.len());
        for command in &commands {
            self.messages.push(format!("Sending:\t{}", command));
            match self.dispatcher.send_command(command) {
                Ok(response) => responses.push(response),
                Err(err) => {
                    self.messages
                        .warn(format!("Dispatch failed for '{}': {:#}", command, err));
                    return Err(PickError::Dispatch(err));
                }
            }
        }
        if let Some(detector) = self.detector.as_mut() {
            detector.notify_picked(label, coord);
        }
        Ok(PickReport {
            label: label.to_string(),
            target,
            commands,
            responses,
        })
    }

    /// Greedily pick the best-ranked flavor until no rows remain.
    ///
    /// Each round freezes the view, picks the top row, resumes streaming and
    /// polls once to refresh the ranking. Ends with a park move.
    pub fn auto_pick(&mut self) -> AutoPickReport {
        let mut picked = Vec::new();
        let stop = loop {
            let Some(top) = self.stats.first().cloned() else {
                break AutoPickStop::Exhausted;
            };
            if picked.len() >= self.auto_pick_limit {
                self.messages.warn(format!(
                    "Auto pick stopped after {} picks",
                    self.auto_pick_limit
                ));
                break AutoPickStop::LimitReached;
            }
            if self.state == SessionState::Streaming {
                // Cannot fail from Streaming.
                let _ = self.snapshot();
            }
            if self.pick_at(&top.label, top.last_coord).is_err() {
                break AutoPickStop::DispatchFailed;
            }
            picked.push(top.label);

            if self.state != SessionState::Streaming {
                let _ = self.start();
            }
            match self.tick() {
                Ok(_) => {}
                Err(CycleError::Render(_)) => {}
                Err(err) => {
                    // Stale rows would re-pick the bean that was just removed.
                    self.messages.warn(format!("Auto pick aborted: {}", err));
                    self.stats.clear();
                    break AutoPickStop::DetectorFailed;
                }
            }
        };

        let park = Command::park(self.profile.feed_rate);
        if let Err(err) = self.dispatcher.send_command(&park) {
            self.messages
                .warn(format!("Dispatch failed for '{}': {:#}", park, err));
        }
        self.messages
            .push(format!("Auto pick finished: {} picked", picked.len()));
        AutoPickReport { picked, stop }
    }

    pub fn maintenance(&mut self, action: MaintenanceAction) -> anyhow::Result<String> {
        self.messages.push(action.message());
        let command = action.command();
        match self.dispatcher.send_command(&command) {
            Ok(response) => Ok(response),
            Err(err) => {
                self.messages
                    .warn(format!("Dispatch failed for '{}': {:#}", command, err));
                Err(err)
            }
        }
    }

    /// Release the actuator channel.
    pub fn shutdown(&mut self) {
        if let Err(err) = self.dispatcher.close() {
            log::warn!("failed to close actuator: {:#}", err);
        }
    }
}
