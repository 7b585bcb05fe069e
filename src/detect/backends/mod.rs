#[cfg(feature = "detector-http")]
pub mod http;
pub mod replay;
pub mod scripted;
pub mod tray;

#[cfg(feature = "detector-http")]
pub use http::{classify_status, HttpDetector, KeyStatus};
pub use replay::ReplayDetector;
pub use scripted::ScriptedDetector;
pub use tray::SimulatedTray;
