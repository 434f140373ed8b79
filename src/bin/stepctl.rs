//! Command-line shell for the stepper motor controllers.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use stepctl::session::Session;
use stepctl::settings::Settings;
use stepctl::usb::{self, UsbTransport};
use stepctl::variables::{error_names, Variables};
use stepctl::{Error, Pin, Product, Result};

#[derive(Parser)]
#[command(name = "stepctl", version, about = "Configure and control USB stepper motor controllers.")]
struct Cli {
    /// Serial number of the device to use.
    #[arg(short = 'd', long = "device", global = true, value_name = "SERIAL")]
    serial: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the connected devices.
    List,
    /// Show the device's current status.
    Status {
        /// Also show pin states and raw readings.
        #[arg(long)]
        full: bool,
    },
    /// Read the device's settings into a file.
    GetSettings {
        /// File to write.
        file: PathBuf,
    },
    /// Write settings from a file to the device.
    SetSettings {
        /// File to read.
        file: PathBuf,
    },
    /// Repair a settings file without touching any device.
    FixSettings {
        /// File to read.
        input: PathBuf,
        /// File to write.
        output: PathBuf,
    },
    /// Restore the device's factory default settings.
    RestoreDefaults,
    /// Set the target position, in microsteps.
    Position {
        value: i32,
    },
    /// Set the target velocity, in microsteps per 10000 s.
    Velocity {
        value: i32,
    },
    /// Stop abruptly and hold position.
    HaltAndHold,
    /// Stop abruptly and declare the given position to be the current one.
    HaltAndSetPosition {
        value: i32,
    },
    /// Turn the motor outputs on.
    Energize,
    /// Turn the motor outputs off.
    DeEnergize,
    /// Energize and exit safe start, so motion commands take effect.
    Resume,
    /// Clear a latched motor driver error.
    ClearDriverError,
    /// Dump the firmware's debug data block.
    DebugData,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::List => {
            for info in usb::list_devices()? {
                println!("{}  {}", info.serial_number, info.product);
            }
            Ok(())
        }
        Command::FixSettings { input, output } => fix_settings(&input, &output),
        Command::Status { full } => {
            let session = open_session(cli.serial.as_deref())?;
            let product = session.product().ok_or(Error::NotConnected)?;
            let variables = session.variables().ok_or(Error::NotConnected)?;
            print_status(product, variables, full);
            Ok(())
        }
        Command::GetSettings { file } => {
            let session = open_session(cli.serial.as_deref())?;
            let settings = session.settings().ok_or(Error::NotConnected)?;
            std::fs::write(&file, settings.to_text())?;
            Ok(())
        }
        Command::SetSettings { file } => {
            let text = std::fs::read_to_string(&file)?;
            let mut warnings = Vec::new();
            let parsed = Settings::from_text(&text, &mut warnings)?;
            print_warnings(&warnings);

            let mut session = open_session(cli.serial.as_deref())?;
            let product = session.product().ok_or(Error::NotConnected)?;
            if parsed.product != product {
                return Err(Error::SettingsParse(format!(
                    "the file is for a {} but the connected device is a {}",
                    parsed.product, product
                )));
            }
            if let Some(working) = session.settings_mut() {
                *working = parsed;
            }
            print_warnings(&session.apply()?);
            Ok(())
        }
        Command::RestoreDefaults => {
            let mut session = open_session(cli.serial.as_deref())?;
            print_warnings(&session.restore_defaults()?);
            Ok(())
        }
        Command::Position { value } => {
            open_session(cli.serial.as_deref())?.set_target_position(value)
        }
        Command::Velocity { value } => {
            open_session(cli.serial.as_deref())?.set_target_velocity(value)
        }
        Command::HaltAndHold => open_session(cli.serial.as_deref())?.halt_and_hold(),
        Command::HaltAndSetPosition { value } => {
            open_session(cli.serial.as_deref())?.halt_and_set_position(value)
        }
        Command::Energize => open_session(cli.serial.as_deref())?.energize(),
        Command::DeEnergize => open_session(cli.serial.as_deref())?.de_energize(),
        Command::Resume => open_session(cli.serial.as_deref())?.resume(),
        Command::ClearDriverError => open_session(cli.serial.as_deref())?.clear_driver_error(),
        Command::DebugData => {
            let mut session = open_session(cli.serial.as_deref())?;
            let data = session.debug_data()?;
            for chunk in data.chunks(16) {
                let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02X}")).collect();
                println!("{}", hex.join(" "));
            }
            Ok(())
        }
    }
}

fn open_session(serial: Option<&str>) -> Result<Session<UsbTransport>> {
    let info = usb::find_device(serial)?;
    let device = info.open()?;
    let mut session = Session::new();
    print_warnings(&session.connect(device)?);
    Ok(session)
}

fn fix_settings(input: &Path, output: &Path) -> Result<()> {
    let text = std::fs::read_to_string(input)?;
    let mut warnings = Vec::new();
    let mut settings = Settings::from_text(&text, &mut warnings)?;
    settings.fix(&mut warnings);
    print_warnings(&warnings);
    std::fs::write(output, settings.to_text())?;
    Ok(())
}

fn print_warnings(warnings: &[String]) {
    for warning in warnings {
        eprintln!("Warning: {warning}");
    }
}

fn print_status(product: Product, v: &Variables, full: bool) {
    println!("Product:                 {product}");
    println!("Operation state:         {}", v.operation_state.name());
    println!("Energized:               {}", yes_no(v.energized()));
    println!("Position uncertain:      {}", yes_no(v.position_uncertain()));
    print_errors("Errors active:", v.error_status as u32);
    print_errors("Errors occurred:", v.errors_occurred);
    println!("Planning mode:           {:?}", v.planning_mode);
    println!("Current position:        {}", v.current_position);
    println!("Current velocity:        {}", v.current_velocity);
    println!("Target position:         {}", v.target_position);
    println!("Target velocity:         {}", v.target_velocity);
    println!("VIN voltage:             {:.3} V", v.vin_voltage as f64 / 1000.0);
    println!("Up time:                 {} ms", v.up_time);
    println!("Current limit:           {} mA", v.current_limit(product));
    if !full {
        return;
    }
    println!("Last reset cause:        {}", v.device_reset.name());
    println!("Encoder position:        {}", v.encoder_position);
    println!("Speed max:               {}", v.speed_max);
    println!("Starting speed:          {}", v.starting_speed);
    println!("Accel max:               {}", v.accel_max);
    println!("Decel max:               {}", v.decel_max);
    match v.step_mode {
        Some(mode) => println!("Step mode:               1/{}", mode.microsteps()),
        None => println!("Step mode:               unknown"),
    }
    match v.decay_mode {
        Some(mode) => println!("Decay mode:              {mode}"),
        None => println!("Decay mode:              unknown"),
    }
    match v.rc_pulse_width() {
        Some(width) => println!("RC pulse width:          {:.2} us", width as f64 / 12.0),
        None => println!("RC pulse width:          none"),
    }
    for pin in Pin::ALL {
        let analog = match v.analog_reading(pin) {
            Some(reading) => format!("analog {reading}"),
            None => "analog n/a".to_string(),
        };
        println!(
            "Pin {:<4} {:?}, digital {}, {}, switch {}",
            pin.name(),
            v.pin_state(pin),
            v.digital_reading(pin) as u8,
            analog,
            yes_no(v.switch_active(pin)),
        );
    }
}

fn print_errors(label: &str, mask: u32) {
    let names = error_names(mask);
    if names.is_empty() {
        println!("{label:<24} none");
    } else {
        println!("{label:<24} {}", names.join(", "));
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
