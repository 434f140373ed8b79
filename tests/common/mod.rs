//! In-memory device for integration tests.
//!
//! `MockTransport` emulates enough of the firmware to drive the session
//! controller: a settings image, a variables block, and the reinitialize
//! command.  Handles are cheap clones over shared state, so a test can
//! keep one and inspect or sabotage the device after handing the other to
//! a session.

use std::cell::{RefCell, RefMut};
use std::rc::Rc;

use stepctl::protocol::{self, cmd, var};
use stepctl::transport::{Direction, Transport, TransportError};
use stepctl::{Product, Settings};

/// Shared state behind a [`MockTransport`].
pub struct MockState {
    /// The emulated EEPROM image.
    pub settings: [u8; protocol::SETTINGS_SIZE],
    /// The emulated variables block.
    pub variables: [u8; protocol::VARIABLES_SIZE],
    /// Every request byte seen, in order.
    pub requests: Vec<u8>,
    /// Number of host-to-device transfers seen.
    pub out_transfers: usize,
    /// When set, every transfer fails.
    pub fail: bool,
}

#[derive(Clone)]
pub struct MockTransport(Rc<RefCell<MockState>>);

impl MockTransport {
    /// A mock holding factory-default settings and a plausible idle
    /// variables block.
    pub fn new() -> Self {
        let mut settings = Settings::new(Product::Drv8825);
        settings.fill_with_defaults();

        let mut variables = [0u8; protocol::VARIABLES_SIZE];
        variables[var::OPERATION_STATE] = 10; // normal
        variables[var::MISC_FLAGS] = 1; // energized
        variables[var::VIN_VOLTAGE..var::VIN_VOLTAGE + 2]
            .copy_from_slice(&12_000u16.to_le_bytes());
        variables[var::CURRENT_LIMIT_CODE] = 6;

        MockTransport(Rc::new(RefCell::new(MockState {
            settings: settings.to_buffer(),
            variables,
            requests: Vec::new(),
            out_transfers: 0,
            fail: false,
        })))
    }

    pub fn state(&self) -> RefMut<'_, MockState> {
        self.0.borrow_mut()
    }
}

impl Transport for MockTransport {
    fn control(
        &mut self,
        direction: Direction,
        request: u8,
        value: u16,
        index: u16,
        data: &mut [u8],
    ) -> Result<usize, TransportError> {
        let mut state = self.0.borrow_mut();
        if state.fail {
            return Err(TransportError("simulated transport failure".to_string()));
        }
        state.requests.push(request);
        if direction == Direction::Out {
            state.out_transfers += 1;
        }
        match request {
            cmd::GET_SETTING => {
                let offset = index as usize;
                data.copy_from_slice(&state.settings[offset..offset + data.len()]);
                Ok(data.len())
            }
            cmd::SET_SETTING => {
                state.settings[index as usize] = value as u8;
                Ok(0)
            }
            cmd::GET_VARIABLE | cmd::GET_VARIABLE_AND_CLEAR_ERRORS_OCCURRED => {
                data.copy_from_slice(&state.variables[..data.len()]);
                if request == cmd::GET_VARIABLE_AND_CLEAR_ERRORS_OCCURRED {
                    state.variables[var::ERRORS_OCCURRED..var::ERRORS_OCCURRED + 4].fill(0);
                }
                Ok(data.len())
            }
            cmd::REINITIALIZE => {
                // Emulate the firmware's restore-defaults path.
                if state.settings[0] != 0 {
                    let mut defaults = Settings::new(Product::Drv8825);
                    defaults.fill_with_defaults();
                    state.settings = defaults.to_buffer();
                }
                Ok(0)
            }
            _ => Ok(data.len()),
        }
    }
}
