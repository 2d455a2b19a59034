use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use printer_temp_monitor::{
    CancellationController, MonitorLoop, MonitorSettings, Result, SerialPortTransport,
};

const DEFAULT_CONFIG: &str = "config.json";

#[derive(Parser, Debug)]
#[command(name = "printer-temp-monitor")]
#[command(about = "Monitor 3D printer temperature stability over a serial link")]
struct Args {
    /// Path to the JSON settings file (defaults to ./config.json if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial port override
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate override
    #[arg(short, long)]
    baud: Option<u32>,

    /// Stop after this many minutes instead of waiting for Ctrl+C
    #[arg(short, long)]
    duration_minutes: Option<f64>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,

    /// List available serial ports and exit
    #[arg(long)]
    list_ports: bool,
}

fn load_settings(args: &Args) -> Result<MonitorSettings> {
    let mut settings = match &args.config {
        Some(path) => MonitorSettings::load(path)?,
        None if Path::new(DEFAULT_CONFIG).exists() => MonitorSettings::load(DEFAULT_CONFIG)?,
        None => MonitorSettings::default(),
    };

    if let Some(port) = &args.port {
        settings.serial.port = port.clone();
    }
    if let Some(baud) = args.baud {
        settings.serial.baud_rate = baud;
    }
    if let Some(minutes) = args.duration_minutes {
        settings.monitoring.duration_minutes = Some(minutes);
    }

    settings.validate()?;
    Ok(settings)
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if args.list_ports {
        return match SerialPortTransport::available_ports() {
            Ok(ports) if ports.is_empty() => {
                println!("No serial ports found");
                ExitCode::SUCCESS
            }
            Ok(ports) => {
                for port in ports {
                    println!("{port}");
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {e}");
                ExitCode::FAILURE
            }
        };
    }

    let settings = match load_settings(&args) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if args.print_config {
        println!("{}", settings.summary());
        return ExitCode::SUCCESS;
    }

    match run(settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(settings: MonitorSettings) -> Result<()> {
    println!("3D Printer Temperature Monitor");
    println!("{}", "=".repeat(60));
    println!("{}", settings.summary());
    println!("Press Ctrl+C to stop and see final statistics\n");

    let mut controller = CancellationController::new();
    controller.install_interrupt_handler()?;

    let transport = SerialPortTransport::new(&settings);
    let monitor = MonitorLoop::new(&settings, transport, controller.token(), std::io::stdout())?;

    let outcome = monitor.run().await?;
    tracing::info!(
        "Monitor finished after {} readings: {}",
        outcome.reading_count,
        outcome.reason
    );

    Ok(())
}
