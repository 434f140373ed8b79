//! # stepctl
//!
//! Configure and control USB stepper motor controllers.
//!
//! ## Features
//!
//! - **Settings engine**: typed settings record, TOML file round-trip, and
//!   a repair pass that warns instead of failing
//! - **Quantization**: current limits and baud rates land on values the
//!   hardware can actually hit, never above what was asked for
//! - **Session controller**: connection state machine with working/cached
//!   settings, derived dirty state, and resilient polling
//! - **Transport seam**: the whole command set rides on one
//!   control-transfer-shaped trait, so tests run without hardware
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stepctl::session::Session;
//!
//! let info = stepctl::usb::find_device(None)?;
//! let mut session = Session::new();
//! let warnings = session.connect(info.open()?)?;
//! for warning in &warnings {
//!     eprintln!("Warning: {warning}");
//! }
//!
//! session.settings_mut().unwrap().current_limit = 1000;
//! session.apply()?;
//! session.resume()?;
//! session.set_target_position(4000)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `usb`: rusb-backed transport and device discovery
//! - `cli`: the `stepctl` command-line tool (implies `usb`)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod device;
pub mod error;
pub mod protocol;
pub mod quant;
pub mod session;
pub mod settings;
pub mod transport;
#[cfg(feature = "usb")]
pub mod usb;
pub mod variables;

// Re-exports for ergonomic API
pub use device::Device;
pub use error::{Error, Result};
pub use session::{Session, SessionState};
pub use settings::{
    ControlMode, DecayMode, Pin, PinFunc, PinSettings, Product, ScalingDegree, Settings,
    SoftErrorResponse, StepMode,
};
pub use transport::{Direction, Transport, TransportError};
pub use variables::{OperationState, PinState, PlanningMode, Variables};
