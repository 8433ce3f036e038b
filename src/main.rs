// in-crate modules
mod config;
mod lux;
mod telemetry;
mod tsl2591;

// in-crate imports
use config::*;
use lux::compute_lux;
use telemetry::format_reading;
use tsl2591::Tsl2591;

// STD
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use std::{thread, time};

// 3rd party libraries
use anyhow::Context;
use clap::{Parser, Subcommand};
use embedded_hal::i2c::I2c;
use ftdi_embedded_hal as hal;

const DEFAULT_CONFIG_PATH: &str = "lux-telemetry.ron";

const DEFAULT_CONFIG: &str = r#"
(
gain: Medium,
integration_time: Ms200,
poll_period_ms: 1000,
telemetry: Stdout,
)
"#;

#[derive(Debug, Subcommand, PartialEq)]
enum Command {
    #[command(
        about = "(default) Poll the light sensor and forward lux readings to the telemetry target."
    )]
    Run,

    #[command(
        about = "Check configuration file syntax and verify the sensor is present on the bus."
    )]
    Check,

    #[command(about = "Generate a default config file")]
    GenConfig,
}

#[derive(Debug, Parser, PartialEq)]
#[command(
    about = "Polls a TSL2591 light sensor and forwards calibrated lux readings to a telemetry endpoint",
    version
)]
struct Args {
    #[arg(
        global = true,
        short,
        long = "config",
        help = format!("Path to configuration file. Defaults to `{DEFAULT_CONFIG_PATH}` in the working directory."),
    )]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Args {
    /// Get the config path and verify the file exists. Either the path passed
    /// as an arg, or the default location if not specified.
    ///
    /// This returns error if the path does not exist.
    fn get_config_path(&self) -> anyhow::Result<PathBuf> {
        let path = self
            .config_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        path.canonicalize()
            .with_context(|| format!("Could not open config file `{0}`", path.display()))
    }
}

/// Load the configuration based on arguments.
/// Uses the file supplied to the CLI, or in the default location if not specified, or the default config if there is no file.
fn get_config(args: &Args) -> anyhow::Result<Config> {
    match args.get_config_path() {
        Ok(path) => {
            println!("Reading config from {path}", path = path.display());
            Config::read_from_file(path)
        }
        Err(err) => {
            eprintln!("Config file not found, using default configuration.");
            eprintln!("  Config search error: {err}");
            Config::from_str(DEFAULT_CONFIG)
        }
    }
}

/// Open the FTDI bridge and bind the sensor on its I2C bus.
fn open_sensor() -> anyhow::Result<Tsl2591<impl I2c>> {
    let device = ftdi::find_by_vid_pid(0x0403, 0x6014)
        .interface(ftdi::Interface::A)
        .open()
        .with_context(|| "Could not open FTDI bridge (is the adapter plugged in?)")?;
    let i2c = hal::FtHal::init_default(device)?.i2c()?;

    Tsl2591::new(i2c).with_context(|| "Sensor initialization failed")
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.command {
        // Primary behaviour: repeatedly sample the sensor and forward lux readings
        None | Some(Command::Run) => main_loop(&args),

        // Test config file and sensor presence
        Some(Command::Check) => check(&args),

        // Generate config file: if the file does not already exist, write
        Some(Command::GenConfig) => gen_config_file(&args),
    }
}

/// Verify the config file parses and the sensor answers on the bus.
fn check(args: &Args) -> anyhow::Result<()> {
    let path = args
        .get_config_path()
        .with_context(|| "Failed to find config file")?;

    println!("Attempting to load config from `{0}`", path.display());
    let config = Config::read_from_file(path).with_context(|| "Failed to parse configuration")?;
    println!("Successfully read config: {config:#?}");

    println!("\nLooking for the sensor...");
    let mut sensor = open_sensor()?;
    println!("Found TSL2591, device ID {:#04x}", sensor.id()?);

    let (gain, integration) = sensor.read_config()?;
    println!("Device currently configured: gain={gain:?}, integration time={integration:?}");

    // Take one reading with the configured settings to prove the whole path works.
    sensor.power_up()?;
    sensor.set_gain(config.gain, config.integration_time)?;
    thread::sleep(time::Duration::from_millis(
        config.integration_time.as_millis() as u64,
    ));
    let lux = sensor.read_lux()?;
    println!(
        "Test reading: {} lux (gain={:?}, integration time={:?})",
        format_reading(lux),
        config.gain,
        config.integration_time
    );
    sensor.power_down()?;

    Ok(())
}

/// Generate a default configuration file at the expected location.
fn gen_config_file(args: &Args) -> anyhow::Result<()> {
    let path = args
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    // Create parent directory path if applicable
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).with_context(|| {
                format!(
                    "Failed to create parent directory of the new config file {0}",
                    path.display()
                )
            })?
        }
        _ => { /* do nothing if no parent */ }
    };

    // Create the new file and write the default contents
    let mut file = File::create_new(&path)
        .with_context(|| format!("Failed to create new config file {0}", path.display()))?;

    write!(file, "{}", DEFAULT_CONFIG)
        .with_context(|| format!("Failed to write the new config file {0}", path.display()))?;

    Ok(())
}

/// Default daemon behaviour: bring the sensor up, then sample and forward
/// lux readings forever.
fn main_loop(args: &Args) -> anyhow::Result<()> {
    let config = get_config(args)?;
    println!("Loaded configuration: {config:?}");

    let mut sender = telemetry::for_target(&config.telemetry)?;

    let mut sensor = open_sensor()?;
    sensor.power_up()?;
    sensor.set_gain(config.gain, config.integration_time)?;

    // Let the first integration cycle complete before trusting the data registers.
    thread::sleep(time::Duration::from_millis(
        config.integration_time.as_millis() as u64,
    ));

    let period = time::Duration::from_millis(config.poll_period_ms);

    // Main loop: sample, convert, forward, sleep. Any bus or delivery error
    // terminates the process; supervision is the service manager's job.
    loop {
        let sample = sensor.read_raw()?;
        let lux = compute_lux(
            sample.channel0,
            sample.channel1,
            config.gain,
            config.integration_time,
        )?;

        sender.send(&format_reading(lux))?;

        thread::sleep(period);
    }
}
