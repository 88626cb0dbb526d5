use buffered_serial::config::{unescape, Config, ConfigLoader};
use buffered_serial::logging::init_logging;
use buffered_serial::{available_ports, BufferedPort, ReadTimeout};
use clap::Parser;
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "buffered-serial",
    version,
    about = "Monitor a serial port through a continuously buffered reader.",
    long_about = "Opens a serial port, drains it into memory on a background thread and prints every received line. Settings come from buffered-serial.toml, BUFFERED_SERIAL_* environment variables and the flags below, in increasing order of priority."
)]
struct Args {
    /// Port to open, or an alias from the config file.
    port: Option<String>,

    /// List available serial ports and exit.
    #[arg(short, long)]
    list: bool,

    /// Baud rate.
    #[arg(short, long)]
    baud: Option<u32>,

    /// Per-line read timeout in milliseconds. 0 polls once, negative waits
    /// indefinitely.
    #[arg(short, long, allow_hyphen_values = true)]
    timeout_ms: Option<i64>,

    /// Line delimiter. Escapes such as \r\n and \x03 are decoded.
    #[arg(short, long)]
    delimiter: Option<String>,

    /// Configuration file to use instead of the standard locations.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Text written to the port right after it opens. Escapes are decoded.
    #[arg(long)]
    send: Option<String>,

    /// Stop after this many lines.
    #[arg(short = 'n', long)]
    lines: Option<u64>,

    /// Stop after this many seconds.
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Print lines and the final metrics as JSON.
    #[arg(long)]
    json: bool,

    /// Log filter, e.g. "debug" or "buffered_serial=trace".
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ConfigLoader::load_from(path)?.into_config(),
        None => ConfigLoader::load()?.into_config(),
    };
    apply_cli_overrides(&mut config, &args);

    init_logging(&config.logging, args.log_level.as_deref())?;

    if args.list {
        return list_ports(args.json);
    }

    let requested = args
        .port
        .clone()
        .or_else(|| config.serial.port.clone())
        .ok_or("no port given; pass one on the command line or set serial.port")?;
    let port_name = config.serial.resolve_port(&requested);

    let settings = config.port_settings()?;
    let delimiter = settings.delimiter.clone();
    let timeout = settings.timeout;
    let poll_interval = settings.poll_interval;

    let mut port = BufferedPort::serial(&port_name, config.serial.port_configuration(), settings)?;
    port.open()?;
    info!(port = %port_name, baud = config.serial.baud_rate, "monitoring");

    if let Some(text) = &args.send {
        let written = port.write(&unescape(text))?;
        debug!(bytes = written, "sent");
    }

    let deadline = args.duration_secs.and_then(monitor_deadline);
    let mut received = 0u64;
    let stdout = std::io::stdout();

    while args.lines.map_or(true, |limit| received < limit) {
        let wait = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                clip_timeout(timeout, remaining)
            }
            None => timeout,
        };

        let line = port.read_line_timeout(&delimiter, wait)?;
        if line.is_empty() {
            if wait == ReadTimeout::NonBlocking {
                thread::sleep(poll_interval);
            }
            continue;
        }
        received += 1;

        let payload = line
            .strip_suffix(delimiter.as_slice())
            .unwrap_or(&line[..]);
        let text = String::from_utf8_lossy(payload);
        let mut out = stdout.lock();
        if args.json {
            writeln!(out, "{}", json!({ "line": text, "bytes": line.len() }))?;
        } else {
            writeln!(out, "{}", text)?;
        }
    }

    port.close()?;

    let metrics = port.metrics();
    if args.json {
        println!("{}", serde_json::to_string(&metrics)?);
    } else {
        println!(
            "{}: {} lines, {} bytes received, {} delivered, {} written, {} left in buffer",
            metrics.port_name,
            received,
            metrics.bytes_received_total,
            metrics.bytes_delivered_total,
            metrics.bytes_written_total,
            metrics.in_waiting,
        );
    }

    Ok(())
}

fn apply_cli_overrides(config: &mut Config, args: &Args) {
    if let Some(baud) = args.baud {
        config.serial.baud_rate = baud;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.buffer.timeout_ms = timeout_ms;
    }
    if let Some(delimiter) = &args.delimiter {
        config.buffer.delimiter = delimiter.clone();
    }
}

/// Never wait past the end of the monitoring window.
/// End of the `--duration-secs` window, `None` when it lies beyond what the
/// clock can represent.
fn monitor_deadline(secs: u64) -> Option<Instant> {
    Instant::now().checked_add(Duration::from_secs(secs))
}

fn clip_timeout(timeout: ReadTimeout, remaining: Duration) -> ReadTimeout {
    match timeout {
        ReadTimeout::NonBlocking => ReadTimeout::NonBlocking,
        ReadTimeout::After(d) => ReadTimeout::After(d.min(remaining)),
        ReadTimeout::Infinite => ReadTimeout::After(remaining),
    }
}

fn list_ports(as_json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let ports = available_ports()?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&ports)?);
        return Ok(());
    }
    if ports.is_empty() {
        println!("No serial ports found.");
    }
    for port in ports {
        println!("{:<24} {}", port.name, port.kind);
    }
    Ok(())
}
