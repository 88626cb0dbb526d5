//! Example demonstrating buffered reads against a simulated device.
//!
//! A `MockTransport` stands in for a serial device that answers AT commands
//! in bursts, slower than the reader asks for them. Run with:
//!
//! ```bash
//! cargo run --example mock_loopback
//! ```

use buffered_serial::{BufferedPort, MockTransport, PortSettings, ReadTimeout};
use std::thread;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Buffered Port Example ===\n");

    let device = MockTransport::new("MOCK0");
    let settings = PortSettings::default()
        .with_timeout(Duration::from_millis(500))
        .with_delimiter(b"\r\n".to_vec());
    let mut port = BufferedPort::open_with(device.clone(), settings)?;

    // Simulated modem: answers each command after a delay, in two pieces.
    let modem = {
        let device = device.clone();
        thread::spawn(move || {
            for reply in [&b"OK"[..], b"+GMR: 1.7.4", b"ERROR"] {
                thread::sleep(Duration::from_millis(120));
                let (head, tail) = reply.split_at(reply.len() / 2);
                device.push_incoming(head);
                thread::sleep(Duration::from_millis(40));
                device.push_incoming(tail);
                device.push_incoming(b"\r\n");
            }
        })
    };

    println!("1. Line reads with a 500 ms timeout:");
    for command in ["AT", "AT+GMR", "AT+BOGUS"] {
        port.write(format!("{command}\r\n").as_bytes())?;
        let reply = port.next_line()?;
        println!(
            "  {:<10} -> {}",
            command,
            String::from_utf8_lossy(&reply).trim_end()
        );
    }
    modem.join().map_err(|_| "modem thread panicked")?;

    println!("\n2. Short read on timeout:");
    device.push_incoming(b"xyz");
    thread::sleep(Duration::from_millis(150));
    let data = port.read_timeout(10, Duration::from_millis(100));
    println!("  asked for 10 bytes, got {:?}", String::from_utf8_lossy(&data));

    println!("\n3. Non-blocking read on an empty buffer:");
    let data = port.read_timeout(5, ReadTimeout::NonBlocking);
    println!("  got {} bytes", data.len());

    port.close()?;
    println!("\n4. Metrics after close:");
    println!("  {}", serde_json::to_string_pretty(&port.metrics())?);

    println!("\n=== Example complete ===");
    Ok(())
}
