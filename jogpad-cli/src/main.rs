mod device;
mod logger;
mod monitor;

use anyhow::Result;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use jogpad_core::config::{USB_PID, USB_VID};
use jogpad_core::MatrixConfig;
use std::time::Duration;

use device::{DeviceId, Jogpad};
use monitor::Monitor;

#[derive(Parser)]
#[command(name = "jogpad-cli")]
#[command(about = "Jogpad encoder/keypad host tool")]
struct Cli {
    /// USB vendor ID (hex)
    #[arg(long, global = true, value_parser = parse_hex_u16, default_value = "16c0")]
    vid: u16,

    /// USB product ID (hex)
    #[arg(long, global = true, value_parser = parse_hex_u16, default_value = "05df")]
    pid: u16,

    /// More log output (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect whether a jogpad is connected
    Detect,
    /// Stream and decode reports from the jogpad
    Monitor {
        /// Stop after this many reports
        #[arg(long)]
        count: Option<u64>,

        /// Read timeout per transfer in milliseconds
        #[arg(long, default_value_t = 1000)]
        timeout_ms: u64,
    },
}

/// Parse a 16-bit hex value, with or without a `0x` prefix.
fn parse_hex_u16(s: &str) -> Result<u16, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u16::from_str_radix(digits, 16).map_err(|e| format!("invalid hex ID '{}': {}", s, e))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    // Only fails if a logger is already installed.
    let _ = logger::init(cli.verbose);

    let id = DeviceId {
        vid: cli.vid,
        pid: cli.pid,
    };
    if (id.vid, id.pid) != (USB_VID, USB_PID) {
        log::info!("using custom device ID {:04x}:{:04x}", id.vid, id.pid);
    }

    match cli.command {
        Command::Detect => {
            let devices = device::find(id)?;
            if devices.is_empty() {
                println!("No jogpad detected ({:04x}:{:04x}).", id.vid, id.pid);
            }
            for dev in devices {
                println!(
                    "Jogpad detected on bus {} address {}.",
                    dev.bus_number(),
                    dev.address()
                );
            }
        }
        Command::Monitor { count, timeout_ms } => {
            let pad = Jogpad::open(id)?;
            monitor(&pad, count, Duration::from_millis(timeout_ms))?;
        }
    }

    Ok(())
}

fn monitor(pad: &Jogpad, count: Option<u64>, timeout: Duration) -> Result<()> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner} {msg}")
            .unwrap(),
    );
    pb.set_message("waiting for reports");
    pb.enable_steady_tick(Duration::from_millis(100));

    let mut mon = Monitor::new(MatrixConfig::JOGPAD);
    let mut received = 0u64;

    while count.map_or(true, |n| received < n) {
        let Some(report) = pad.read_report(timeout)? else {
            log::debug!("no report within {:?}", timeout);
            continue;
        };

        received += 1;
        pb.println(mon.line(&report));
        pb.set_message(format!(
            "{} reports, position {}",
            received, report.encoder.position
        ));
    }

    pb.finish_and_clear();
    Ok(())
}
