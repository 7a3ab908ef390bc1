//! Tilt Sensor Agent CLI
//!
//! Runs the tilt module on the host against a simulated accelerometer, and
//! inspects or edits its persisted configuration.

use chrono::Local;
use clap::{Parser, Subcommand};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tilt_sensor_agent::{
    config::ConfigStore,
    control::{ConsoleCommand, ConsoleOutcome},
    core::Notification,
    module::{ModuleHandle, TiltModule},
    sensor::{Axes, SensorAdapter, SensorParams, SimulatedAccelerometer},
    stats::{create_shared_stats_with_persistence, PersistedStats},
    storage::{default_data_dir, FileStorage},
    MODULE_NAME, VERSION,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tilt-sensor")]
#[command(version = VERSION)]
#[command(about = "Periodic tilt sampling with debounced alerts", long_about = None)]
struct Cli {
    /// Directory for persisted configuration and statistics
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the module against a simulated accelerometer
    Run {
        /// I2C bus index handed to the sensor driver
        #[arg(long, default_value = "0")]
        bus: u8,

        /// 7-bit sensor address (hex)
        #[arg(long, default_value = "53", value_parser = parse_hex_byte)]
        address: u8,
    },

    /// Show the persisted configuration
    Config,

    /// Set the persisted sampling period (0 disables autonomous sampling)
    Period { seconds: u8 },

    /// Restore the default configuration
    Reset,

    /// Show cumulative statistics from previous runs
    Status,
}

/// One line typed at the interactive shell.
#[derive(Parser)]
#[command(name = "tilt", no_binary_name = true)]
struct ShellLine {
    #[command(subcommand)]
    command: ShellCommand,
}

#[derive(Subcommand)]
enum ShellCommand {
    /// Get results now
    Get,
    /// Get and send results now
    Send,
    /// Set period to N seconds
    Period { seconds: u8 },
    /// Reset settings to default
    Reset,
    /// Simulate a button press
    Press,
    /// Set the simulated acceleration in milli-g
    #[command(allow_negative_numbers = true)]
    Axes { x: i32, y: i32, z: i32 },
    /// Inject a command frame (hex bytes) and print the reply
    Cmd {
        #[arg(value_parser = parse_hex_byte)]
        bytes: Vec<u8>,
    },
    /// Show configuration and statistics
    Status,
    /// Stop the module
    Quit,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);

    let result = match cli.command {
        Commands::Run { bus, address } => cmd_run(data_dir, SensorParams { bus, address }),
        Commands::Config => cmd_config(&data_dir),
        Commands::Period { seconds } => cmd_period(&data_dir, seconds),
        Commands::Reset => cmd_reset(&data_dir),
        Commands::Status => cmd_status(&data_dir),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn cmd_run(data_dir: PathBuf, params: SensorParams) -> anyhow::Result<()> {
    println!("Tilt Sensor Agent v{VERSION}");
    println!();

    let stats = create_shared_stats_with_persistence(data_dir.join("stats.json"));
    let storage = FileStorage::new(data_dir.join("nvram"));
    let sim = SimulatedAccelerometer::new(Axes::new(0, 0, 1000));
    let sensor = SensorAdapter::new(sim.clone()).with_params(params);

    let module = TiltModule::new(sensor, storage, print_notification)
        .with_stats(stats.clone())
        .start()?;

    let config = module.config();
    println!("  Sensor: bus {} address {:#04x}", params.bus, params.address);
    match config.period() {
        Some(_) => println!("  Period: {}s", config.sampling_period_secs),
        None => println!("  Period: disabled"),
    }
    println!();
    println!("Type '{MODULE_NAME}' for commands, 'quit' or Ctrl+C to stop");
    println!();

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());

    let lines = spawn_stdin_reader();
    let mut stdin_open = true;

    while running.load(Ordering::SeqCst) {
        if !stdin_open {
            thread::sleep(Duration::from_millis(100));
            continue;
        }

        match lines.recv_timeout(Duration::from_millis(100)) {
            Ok(line) => {
                if !handle_line(&module, &sim, &line) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                // Keep sampling autonomously until Ctrl+C
                stdin_open = false;
            }
        }
    }

    println!();
    println!("Stopping module...");
    module.shutdown();

    if let Err(e) = stats.save() {
        eprintln!("Warning: Could not save statistics: {e}");
    }

    println!();
    println!("{}", stats.summary());
    Ok(())
}

/// Returns false when the shell asked to quit.
fn handle_line(module: &ModuleHandle, sim: &SimulatedAccelerometer, line: &str) -> bool {
    let mut words: Vec<&str> = line.split_whitespace().collect();
    if words.first() == Some(&MODULE_NAME) {
        words.remove(0);
        if words.is_empty() {
            run_console(module, ConsoleCommand::Usage);
            return true;
        }
    }
    if words.is_empty() {
        return true;
    }

    let parsed = match ShellLine::try_parse_from(words) {
        Ok(parsed) => parsed,
        Err(e) => {
            let _ = e.print();
            return true;
        }
    };

    match parsed.command {
        ShellCommand::Get => run_console(module, ConsoleCommand::Get),
        ShellCommand::Send => run_console(module, ConsoleCommand::Send),
        ShellCommand::Period { seconds } => run_console(module, ConsoleCommand::Period(seconds)),
        ShellCommand::Reset => run_console(module, ConsoleCommand::Reset),
        ShellCommand::Press => {
            module.press_button();
            println!("Button pressed");
        }
        ShellCommand::Axes { x, y, z } => {
            sim.set_axes(Axes::new(x, y, z));
            println!("Simulated acceleration: X {x} mg, Y {y} mg, Z {z} mg");
        }
        ShellCommand::Cmd { bytes } => match module.dispatch(&bytes) {
            Some(reply) => println!("Reply: {:02x?}", reply.to_bytes()),
            None => println!("No reply; the result follows on the uplink"),
        },
        ShellCommand::Status => {
            println!(
                "Configuration: {}",
                serde_json::to_string(&module.config()).unwrap_or_else(|_| "Error".to_string())
            );
            println!(
                "{}",
                serde_json::to_string_pretty(&module.stats())
                    .unwrap_or_else(|_| "Error".to_string())
            );
        }
        ShellCommand::Quit => return false,
    }
    true
}

fn run_console(module: &ModuleHandle, command: ConsoleCommand) {
    match module.console(command) {
        Ok(ConsoleOutcome::Usage(text)) => {
            println!("{text}");
            println!("press - simulate a button press");
            println!("axes <X> <Y> <Z> - set simulated acceleration in mg");
            println!("cmd <hex bytes> - inject a command frame");
            println!("status - show configuration and statistics");
            println!("quit - stop the module");
        }
        Ok(ConsoleOutcome::Sampled(probe)) => {
            println!("Acceleration: {}", probe.sample);
            if probe.is_alert {
                println!("Significant tilt detected: {}", probe.sample.tilt_angle);
            }
        }
        Ok(ConsoleOutcome::Queued) => println!("Sample requested"),
        Ok(ConsoleOutcome::Configured(config)) => match config.period() {
            Some(_) => println!("Period set to {} sec", config.sampling_period_secs),
            None => println!("Timer stopped"),
        },
        Err(e) => eprintln!("Error: {e}"),
    }
}

fn print_notification(notification: &Notification) {
    let kind = match notification {
        Notification::Report(result) if result.is_alert => "ALERT",
        Notification::Report(_) => "report",
        Notification::Fault { .. } => "FAULT",
    };
    println!(
        "[{}] {} payload {:02x?} {}",
        Local::now().format("%H:%M:%S"),
        kind,
        notification.payload(),
        serde_json::to_string(notification).unwrap_or_default()
    );
}

fn cmd_config(data_dir: &std::path::Path) -> anyhow::Result<()> {
    let storage = FileStorage::new(data_dir.join("nvram"));
    let root = storage.root().to_path_buf();
    let mut store = ConfigStore::new(Box::new(storage));
    let config = store.load();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Storage: {root:?}");
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn cmd_period(data_dir: &std::path::Path, seconds: u8) -> anyhow::Result<()> {
    let mut store = ConfigStore::new(Box::new(FileStorage::new(data_dir.join("nvram"))));
    store.load();
    store.set_period(seconds);

    if store.load().sampling_period_secs != seconds {
        anyhow::bail!("period was not persisted");
    }
    match seconds {
        0 => println!("Autonomous sampling disabled."),
        n => println!("Period set to {n} sec."),
    }
    Ok(())
}

fn cmd_reset(data_dir: &std::path::Path) -> anyhow::Result<()> {
    let mut store = ConfigStore::new(Box::new(FileStorage::new(data_dir.join("nvram"))));
    store.reset_to_default();
    store.save();
    println!(
        "Configuration reset (period {} sec).",
        store.current().sampling_period_secs
    );
    Ok(())
}

fn cmd_status(data_dir: &std::path::Path) -> anyhow::Result<()> {
    println!("Tilt Sensor Agent Status");
    println!("========================");
    println!();

    let stats_path = data_dir.join("stats.json");
    if !stats_path.exists() {
        println!("No previous session data found.");
        return Ok(());
    }

    let content = std::fs::read_to_string(&stats_path)?;
    let stats: PersistedStats = serde_json::from_str(&content)?;
    println!("{}", stats.summary());
    Ok(())
}

/// Forward stdin lines to the main loop.
fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = unbounded();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });
    rx
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");
}

/// Parse a byte written in hex, with or without a `0x` prefix.
fn parse_hex_byte(s: &str) -> Result<u8, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u8::from_str_radix(digits, 16).map_err(|e| format!("invalid hex byte '{s}': {e}"))
}
