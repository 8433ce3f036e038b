/// The outbound side of the daemon: a narrow sender interface and the
/// line-oriented writer used to implement it.
///
/// Delivery is fire-and-forget from the driver's point of view: a failed send
/// propagates to the polling loop, nothing is retried or queued here.
use crate::config::TelemetryTarget;

use anyhow::Context;
use std::io::{self, Write};
use std::net::TcpStream;

/// Accepts one formatted reading per call.
pub trait TelemetrySender {
    fn send(&mut self, payload: &str) -> anyhow::Result<()>;
}

/// Writes each payload as its own line and flushes, so a collector on the
/// other end sees readings as they happen rather than buffered in bulk.
pub struct LineSender<W: Write> {
    out: W,
}

impl<W: Write> LineSender<W> {
    pub fn new(out: W) -> Self {
        LineSender { out }
    }
}

impl<W: Write> TelemetrySender for LineSender<W> {
    fn send(&mut self, payload: &str) -> anyhow::Result<()> {
        self.out.write_all(payload.as_bytes())?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}

/// Construct the sender named by the configuration. The TCP connection is
/// established once, up front; there is no reconnect logic.
pub fn for_target(target: &TelemetryTarget) -> anyhow::Result<Box<dyn TelemetrySender>> {
    match target {
        TelemetryTarget::Stdout => Ok(Box::new(LineSender::new(io::stdout()))),
        TelemetryTarget::Tcp(addr) => {
            let stream = TcpStream::connect(addr)
                .with_context(|| format!("Could not connect to telemetry collector at {addr}"))?;
            Ok(Box::new(LineSender::new(stream)))
        }
    }
}

/// A lux reading as sent over the wire: fixed two-decimal formatting.
pub fn format_reading(lux: f64) -> String {
    format!("{lux:.2}")
}
