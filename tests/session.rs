//! Session state machine integration tests, driven through the mock
//! device.

mod common;

use common::MockTransport;
use stepctl::protocol::{cmd, setting};
use stepctl::session::{Session, SessionState};
use stepctl::{Device, OperationState, Product, Settings};

fn connected_session() -> (Session<MockTransport>, MockTransport) {
    let transport = MockTransport::new();
    let device = Device::new(transport.clone(), Product::Drv8825);
    let mut session = Session::new();
    let warnings = session.connect(device).unwrap();
    assert!(warnings.is_empty(), "{warnings:?}");
    (session, transport)
}

fn default_settings() -> Settings {
    let mut settings = Settings::new(Product::Drv8825);
    settings.fill_with_defaults();
    settings
}

#[test]
fn connect_reads_settings_and_takes_first_snapshot() {
    let (session, _transport) = connected_session();
    assert!(session.is_connected());
    assert_eq!(session.settings(), Some(&default_settings()));
    assert!(!session.has_unapplied_changes());

    let variables = session.variables().expect("first poll happened");
    assert_eq!(variables.operation_state, OperationState::Normal);
    assert!(variables.energized());
    assert_eq!(variables.vin_voltage, 12_000);
}

#[test]
fn connect_surfaces_repair_warnings_for_a_misconfigured_device() {
    let transport = MockTransport::new();
    transport.state().settings[setting::SERIAL_DEVICE_NUMBER as usize] = 200;
    let device = Device::new(transport.clone(), Product::Drv8825);

    let mut session = Session::new();
    let warnings = session.connect(device).unwrap();
    assert!(warnings.iter().any(|w| w.contains("device number")));
    // The working copy is already repaired.
    assert_eq!(session.settings().unwrap().serial_device_number, 127);
    // Repairs are not silently written back.
    assert_eq!(
        transport.state().settings[setting::SERIAL_DEVICE_NUMBER as usize],
        200
    );
    assert!(session.has_unapplied_changes());
}

#[test]
fn connect_failure_lands_in_connection_error() {
    let transport = MockTransport::new();
    transport.state().fail = true;
    let device = Device::new(transport, Product::Drv8825);

    let mut session = Session::new();
    assert!(session.connect(device).is_err());
    assert!(!session.is_connected());
    let message = session.connection_error().expect("in the error state");
    assert!(message.contains("simulated transport failure"));
    assert!(session.retained_settings().is_none());
}

#[test]
fn dirty_is_derived_from_comparison() {
    let (mut session, _transport) = connected_session();
    let original = session.settings().unwrap().current_limit;

    session.settings_mut().unwrap().current_limit = 992;
    assert!(session.has_unapplied_changes());

    // Editing back to the cached value makes the session clean again.
    session.settings_mut().unwrap().current_limit = original;
    assert!(!session.has_unapplied_changes());
}

#[test]
fn apply_from_clean_performs_no_io() {
    let (mut session, transport) = connected_session();
    let transfers_before = transport.state().requests.len();
    let warnings = session.apply().unwrap();
    assert!(warnings.is_empty());
    assert_eq!(transport.state().requests.len(), transfers_before);
    assert_eq!(transport.state().out_transfers, 0);
}

#[test]
fn apply_writes_fixed_settings_and_reinitializes() {
    let (mut session, transport) = connected_session();
    session.settings_mut().unwrap().current_limit = 1000; // not on the grid

    let warnings = session.apply().unwrap();
    assert!(warnings.is_empty(), "{warnings:?}");
    assert!(!session.has_unapplied_changes());
    // Quantized down before writing.
    assert_eq!(session.settings().unwrap().current_limit, 992);

    let state = transport.state();
    assert_eq!(
        state.settings,
        session.cached_settings().unwrap().to_buffer()
    );
    // Write, reinitialize, then read back as the new cached copy.
    let reinit_at = state
        .requests
        .iter()
        .rposition(|&r| r == cmd::REINITIALIZE)
        .unwrap();
    assert!(state.requests[reinit_at + 1..]
        .iter()
        .all(|&r| r == cmd::GET_SETTING));
    assert!(!state.requests[reinit_at + 1..].is_empty());
}

#[test]
fn apply_failure_retains_the_working_settings() {
    let (mut session, transport) = connected_session();
    session.settings_mut().unwrap().current_limit = 992;
    session.settings_mut().unwrap().serial_device_number = 7;
    let edited = session.settings().unwrap().clone();

    transport.state().fail = true;
    assert!(session.apply().is_err());

    assert!(!session.is_connected());
    assert!(session.connection_error().is_some());
    // Field for field, the edits survive for a later reconnect.
    assert_eq!(session.retained_settings(), Some(&edited));
}

#[test]
fn apply_failure_keeps_even_illegal_edits_unrepaired() {
    let (mut session, transport) = connected_session();
    // An edit past the hardware ceiling: the repair pass would clamp it
    // to 3968, but a failed apply must not.
    session.settings_mut().unwrap().current_limit = 5000;
    let edited = session.settings().unwrap().clone();

    transport.state().fail = true;
    assert!(session.apply().is_err());

    let retained = session.retained_settings().expect("in the error state");
    assert_eq!(retained.current_limit, 5000);
    assert_eq!(retained, &edited);
}

#[test]
fn poll_failure_is_not_a_state_transition() {
    let (mut session, transport) = connected_session();

    transport.state().fail = true;
    assert!(session.poll().is_err());
    assert!(session.is_connected());
    assert!(session.communication_lost());
    assert_eq!(session.poll_failures(), 1);
    // The stale snapshot stays visible.
    assert!(session.variables().is_some());

    transport.state().fail = false;
    session.poll().unwrap();
    assert!(!session.communication_lost());
    assert_eq!(session.poll_failures(), 1);
}

#[test]
fn poll_picks_up_device_changes() {
    let (mut session, transport) = connected_session();
    transport.state().variables[stepctl::protocol::var::OPERATION_STATE] = 2;
    session.poll().unwrap();
    assert_eq!(
        session.variables().unwrap().operation_state,
        OperationState::DeEnergized
    );
}

#[test]
fn reload_discards_unapplied_changes() {
    let (mut session, _transport) = connected_session();
    session.settings_mut().unwrap().serial_device_number = 7;
    assert!(session.has_unapplied_changes());

    let warnings = session.reload().unwrap();
    assert!(warnings.is_empty(), "{warnings:?}");
    assert!(!session.has_unapplied_changes());
    assert_eq!(session.settings(), Some(&default_settings()));
}

#[test]
fn disconnect_drops_everything() {
    let (mut session, _transport) = connected_session();
    session.disconnect();
    assert!(!session.is_connected());
    assert!(session.settings().is_none());
    assert!(session.variables().is_none());
    assert!(matches!(session.state(), SessionState::Disconnected));
}

#[test]
fn operations_require_a_connection() {
    let mut session: Session<MockTransport> = Session::new();
    assert!(session.apply().is_err());
    assert!(session.reload().is_err());
    assert!(session.poll().is_err());
    assert!(session.set_target_position(100).is_err());
}

#[test]
fn resume_energizes_then_exits_safe_start() {
    let (mut session, transport) = connected_session();
    session.resume().unwrap();
    let state = transport.state();
    let tail = &state.requests[state.requests.len() - 2..];
    assert_eq!(tail, &[cmd::ENERGIZE, cmd::EXIT_SAFE_START]);
}

#[test]
fn motion_command_failure_retains_the_working_settings() {
    let (mut session, transport) = connected_session();
    session.settings_mut().unwrap().serial_device_number = 7;
    let edited = session.settings().unwrap().clone();

    transport.state().fail = true;
    assert!(session.halt_and_hold().is_err());
    assert!(!session.is_connected());
    assert_eq!(session.retained_settings(), Some(&edited));
}

#[test]
fn motion_commands_reach_the_wire() {
    let (mut session, transport) = connected_session();
    session.set_target_position(-5000).unwrap();
    session.set_target_velocity(2_000_000).unwrap();
    session.halt_and_set_position(0).unwrap();
    session.de_energize().unwrap();
    session.clear_driver_error().unwrap();

    let state = transport.state();
    for request in [
        cmd::SET_TARGET_POSITION,
        cmd::SET_TARGET_VELOCITY,
        cmd::HALT_AND_SET_POSITION,
        cmd::DEENERGIZE,
        cmd::CLEAR_DRIVER_ERROR,
    ] {
        assert!(state.requests.contains(&request));
    }
}
