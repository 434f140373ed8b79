//! Connection state machine tying settings, variables, and a device
//! together.
//!
//! A [`Session`] owns at most one [`Device`] and tracks two settings
//! records: the *cached* record (what the device holds) and the *working*
//! record (what the user has edited).  "Unapplied changes" is never a
//! stored flag; it is always derived by comparing the two, so it cannot go
//! stale.  Illegal combinations (variables without a device, a dirty flag
//! while disconnected) are unrepresentable by construction.

use std::mem;
use std::time::Duration;

use tracing::{debug, warn};

use crate::device::Device;
use crate::error::{Error, Result};
use crate::settings::{Product, Settings};
use crate::transport::Transport;
use crate::variables::Variables;

/// How long the firmware needs to rewrite its EEPROM after a
/// restore-defaults command.
const RESTORE_DEFAULTS_WAIT: Duration = Duration::from_millis(1500);

/// An established connection and everything scoped to it.
pub struct Link<T: Transport> {
    device: Device<T>,
    working: Settings,
    cached: Settings,
    variables: Option<Variables>,
    poll_failures: u32,
    last_poll_failed: bool,
}

/// Where a session currently stands.
pub enum SessionState<T: Transport> {
    /// No device.
    Disconnected,
    /// A connection was lost or refused; the message says why.
    ConnectionError {
        /// Description of the failure.
        message: String,
        /// The working settings at the time of the failure, kept so edits
        /// survive a reconnect.
        retained: Option<Settings>,
    },
    /// A live connection.
    Connected(Link<T>),
}

/// The controller session: one device, its settings, and its latest
/// variables snapshot.
///
/// All operations take `&mut self`, so polling and applying cannot race.
pub struct Session<T: Transport> {
    state: SessionState<T>,
}

impl<T: Transport> Default for Session<T> {
    fn default() -> Self {
        Session::new()
    }
}

impl<T: Transport> Session<T> {
    /// A session with no device.
    pub fn new() -> Self {
        Session {
            state: SessionState::Disconnected,
        }
    }

    /// Current state.
    pub fn state(&self) -> &SessionState<T> {
        &self.state
    }

    /// Whether a device is connected.
    pub fn is_connected(&self) -> bool {
        matches!(self.state, SessionState::Connected(_))
    }

    /// The connection failure message, if the session is in the error
    /// state.
    pub fn connection_error(&self) -> Option<&str> {
        match &self.state {
            SessionState::ConnectionError { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Working settings retained from before a connection failure.
    pub fn retained_settings(&self) -> Option<&Settings> {
        match &self.state {
            SessionState::ConnectionError { retained, .. } => retained.as_ref(),
            _ => None,
        }
    }

    /// Take ownership of a device: read its settings, repair them, and
    /// take a first variables snapshot.
    ///
    /// Returns repair warnings.  On failure the session lands in the
    /// connection error state.
    pub fn connect(&mut self, device: Device<T>) -> Result<Vec<String>> {
        let product = device.product();
        debug!(%product, "connecting");
        match Self::open_link(device) {
            Ok((link, warnings)) => {
                debug!(%product, "connected");
                self.state = SessionState::Connected(link);
                Ok(warnings)
            }
            Err(e) => {
                warn!(%product, error = %e, "connection failed");
                self.state = SessionState::ConnectionError {
                    message: e.to_string(),
                    retained: None,
                };
                Err(e)
            }
        }
    }

    fn open_link(mut device: Device<T>) -> Result<(Link<T>, Vec<String>)> {
        let mut warnings = Vec::new();
        let cached = device.get_settings(&mut warnings)?;
        // The cached record stays as-read; repairs live in the working
        // copy, so a misconfigured device shows up as unapplied changes.
        let mut working = cached.clone();
        working.fix(&mut warnings);
        let variables = device.get_variables(false)?;
        Ok((
            Link {
                device,
                working,
                cached,
                variables: Some(variables),
                poll_failures: 0,
                last_poll_failed: false,
            },
            warnings,
        ))
    }

    /// Drop the device, discarding any unapplied changes.
    pub fn disconnect(&mut self) {
        debug!("disconnecting");
        self.state = SessionState::Disconnected;
    }

    /// The settings the device currently holds.
    pub fn cached_settings(&self) -> Option<&Settings> {
        self.link().map(|link| &link.cached).ok()
    }

    /// The settings being edited.
    pub fn settings(&self) -> Option<&Settings> {
        self.link().map(|link| &link.working).ok()
    }

    /// Edit the working settings.  Changes take effect on [`Session::apply`].
    pub fn settings_mut(&mut self) -> Option<&mut Settings> {
        match &mut self.state {
            SessionState::Connected(link) => Some(&mut link.working),
            _ => None,
        }
    }

    /// Whether the working settings differ from what the device holds.
    pub fn has_unapplied_changes(&self) -> bool {
        self.link()
            .map(|link| link.working != link.cached)
            .unwrap_or(false)
    }

    /// The latest variables snapshot.
    pub fn variables(&self) -> Option<&Variables> {
        self.link().ok().and_then(|link| link.variables.as_ref())
    }

    /// The connected product.
    pub fn product(&self) -> Option<Product> {
        self.link().map(|link| link.device.product()).ok()
    }

    /// Whether the most recent poll failed.
    pub fn communication_lost(&self) -> bool {
        self.link().map(|link| link.last_poll_failed).unwrap_or(false)
    }

    /// How many polls have failed since connecting.
    pub fn poll_failures(&self) -> u32 {
        self.link().map(|link| link.poll_failures).unwrap_or(0)
    }

    /// Refresh the variables snapshot.
    ///
    /// A failed poll increments the failure counter and raises
    /// [`Session::communication_lost`], but never changes the session
    /// state; the retained snapshot stays visible and the next poll may
    /// succeed.
    pub fn poll(&mut self) -> Result<()> {
        let link = self.link_mut()?;
        match link.device.get_variables(false) {
            Ok(variables) => {
                link.variables = Some(variables);
                link.last_poll_failed = false;
                Ok(())
            }
            Err(e) => {
                link.poll_failures += 1;
                link.last_poll_failed = true;
                warn!(failures = link.poll_failures, error = %e, "poll failed");
                Err(e)
            }
        }
    }

    /// Repair the working settings and write them to the device.
    ///
    /// With no unapplied changes this is a success no-op that performs no
    /// I/O.  Returns repair warnings.  On transport failure the session
    /// lands in the connection error state with the working settings
    /// retained field-for-field as they were before the call.
    pub fn apply(&mut self) -> Result<Vec<String>> {
        let state = mem::replace(&mut self.state, SessionState::Disconnected);
        let mut link = match state {
            SessionState::Connected(link) => link,
            other => {
                self.state = other;
                return Err(Error::NotConnected);
            }
        };
        if link.working == link.cached {
            self.state = SessionState::Connected(link);
            return Ok(Vec::new());
        }
        let mut warnings = Vec::new();
        // Repair a copy; the working record itself is only replaced on
        // success, so a failed apply loses no edits, not even illegal ones.
        let mut fixed = link.working.clone();
        fixed.fix(&mut warnings);
        debug!(warnings = warnings.len(), "applying settings");
        // Read back after writing; the device's own record becomes the
        // new cached copy.
        let written = link
            .device
            .apply_settings(&fixed)
            .and_then(|()| link.device.get_settings(&mut warnings));
        match written {
            Ok(cached) => {
                link.working = fixed;
                link.cached = cached;
                self.state = SessionState::Connected(link);
                Ok(warnings)
            }
            Err(e) => {
                warn!(error = %e, "apply failed");
                self.state = SessionState::ConnectionError {
                    message: e.to_string(),
                    retained: Some(link.working),
                };
                Err(e)
            }
        }
    }

    /// Re-read settings from the device, discarding the working copy.
    ///
    /// Callers should check [`Session::has_unapplied_changes`] first and
    /// confirm with the user when it is set.  Returns repair warnings.
    pub fn reload(&mut self) -> Result<Vec<String>> {
        let state = mem::replace(&mut self.state, SessionState::Disconnected);
        let mut link = match state {
            SessionState::Connected(link) => link,
            other => {
                self.state = other;
                return Err(Error::NotConnected);
            }
        };
        let mut warnings = Vec::new();
        match link.device.get_settings(&mut warnings) {
            Ok(cached) => {
                let mut working = cached.clone();
                working.fix(&mut warnings);
                link.working = working;
                link.cached = cached;
                self.state = SessionState::Connected(link);
                Ok(warnings)
            }
            Err(e) => {
                warn!(error = %e, "reload failed");
                self.state = SessionState::ConnectionError {
                    message: e.to_string(),
                    retained: None,
                };
                Err(e)
            }
        }
    }

    /// Restore the device's factory default settings, then reload.
    ///
    /// Blocks for about 1.5 seconds while the firmware rewrites its
    /// EEPROM.
    pub fn restore_defaults(&mut self) -> Result<Vec<String>> {
        self.with_device(|device| device.restore_defaults())?;
        std::thread::sleep(RESTORE_DEFAULTS_WAIT);
        self.reload()
    }

    /// Set the target position, in microsteps.
    pub fn set_target_position(&mut self, position: i32) -> Result<()> {
        self.with_device(|device| device.set_target_position(position))
    }

    /// Set the target velocity, in microsteps per 10000 s.
    pub fn set_target_velocity(&mut self, velocity: i32) -> Result<()> {
        self.with_device(|device| device.set_target_velocity(velocity))
    }

    /// Stop abruptly and hold.
    pub fn halt_and_hold(&mut self) -> Result<()> {
        self.with_device(|device| device.halt_and_hold())
    }

    /// Stop abruptly and declare the current position.
    pub fn halt_and_set_position(&mut self, position: i32) -> Result<()> {
        self.with_device(|device| device.halt_and_set_position(position))
    }

    /// Turn the motor outputs on.
    pub fn energize(&mut self) -> Result<()> {
        self.with_device(|device| device.energize())
    }

    /// Turn the motor outputs off.
    pub fn de_energize(&mut self) -> Result<()> {
        self.with_device(|device| device.deenergize())
    }

    /// Energize and leave safe start, so motion commands take effect.
    pub fn resume(&mut self) -> Result<()> {
        self.with_device(|device| {
            device.energize()?;
            device.exit_safe_start()
        })
    }

    /// Clear a latched motor driver error.
    pub fn clear_driver_error(&mut self) -> Result<()> {
        self.with_device(|device| device.clear_driver_error())
    }

    /// Read the firmware's debug data block.
    pub fn debug_data(&mut self) -> Result<Vec<u8>> {
        self.with_device(|device| device.get_debug_data())
    }

    /// Run one device operation; a failure tears the connection down into
    /// the error state, retaining the working settings.
    fn with_device<R>(&mut self, op: impl FnOnce(&mut Device<T>) -> Result<R>) -> Result<R> {
        let link = self.link_mut()?;
        match op(&mut link.device) {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!(error = %e, "device command failed");
                let state = mem::replace(&mut self.state, SessionState::Disconnected);
                if let SessionState::Connected(link) = state {
                    self.state = SessionState::ConnectionError {
                        message: e.to_string(),
                        retained: Some(link.working),
                    };
                }
                Err(e)
            }
        }
    }

    fn link(&self) -> Result<&Link<T>> {
        match &self.state {
            SessionState::Connected(link) => Ok(link),
            _ => Err(Error::NotConnected),
        }
    }

    fn link_mut(&mut self) -> Result<&mut Link<T>> {
        match &mut self.state {
            SessionState::Connected(link) => Ok(link),
            _ => Err(Error::NotConnected),
        }
    }
}
